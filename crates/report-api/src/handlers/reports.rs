// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Report handlers.
//!
//! Every handler passes the caller's principal to [`report_core::ReportService`],
//! which runs the gate. A report that does not exist and one the caller may
//! not see produce the same 403.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use report_core::{NewReport, ReportFilter, ReportUpdate, StatusChange};

use crate::error::ApiResult;
use crate::extractors::{Auth, Pagination, ReportIdPath, ValidatedJson};
use crate::response::{ApiResponse, ResponseMeta};
use crate::state::AppState;

/// GET /api/v1/reports
///
/// Lists the reports the caller may read. Supports `owner`, `status`,
/// `page` and `per_page` query parameters.
pub async fn list_reports(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    Query(filter): Query<ReportFilter>,
    Pagination(page): Pagination,
) -> ApiResult<impl IntoResponse> {
    let reports = state.reports.list(&ctx.principal(), &filter).await?;
    let meta = ResponseMeta::pagination(reports.len() as u64, page.page, page.per_page);

    Ok(Json(ApiResponse::success(page.apply(reports)).with_meta(meta)))
}

/// POST /api/v1/reports
pub async fn create_report(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ValidatedJson(input): ValidatedJson<NewReport>,
) -> ApiResult<impl IntoResponse> {
    let report = state.reports.create(&ctx.principal(), input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(report))))
}

/// GET /api/v1/reports/{id}
pub async fn get_report(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ReportIdPath(id): ReportIdPath,
) -> ApiResult<impl IntoResponse> {
    let report = state.reports.fetch(&ctx.principal(), id).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// PUT /api/v1/reports/{id}
pub async fn update_report(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ReportIdPath(id): ReportIdPath,
    ValidatedJson(update): ValidatedJson<ReportUpdate>,
) -> ApiResult<impl IntoResponse> {
    let report = state.reports.update(&ctx.principal(), id, update).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// DELETE /api/v1/reports/{id}
pub async fn delete_report(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ReportIdPath(id): ReportIdPath,
) -> ApiResult<impl IntoResponse> {
    state.reports.delete(&ctx.principal(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/reports/{id}/status
pub async fn change_report_status(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ReportIdPath(id): ReportIdPath,
    ValidatedJson(change): ValidatedJson<StatusChange>,
) -> ApiResult<impl IntoResponse> {
    let report = state.reports.change_status(&ctx.principal(), id, change).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// GET /api/v1/reports/{id}/render
///
/// Hands the report to the configured renderer after a read check.
pub async fn render_report(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ReportIdPath(id): ReportIdPath,
) -> ApiResult<impl IntoResponse> {
    let rendered = state.reports.render(&ctx.principal(), id).await?;
    Ok(([(header::CONTENT_TYPE, rendered.content_type)], rendered.body))
}
