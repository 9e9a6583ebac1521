// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Hand-off to the report rendering collaborator.

use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::report::Report;

/// A rendered report body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedReport {
    /// MIME type of `body`.
    pub content_type: String,
    /// Encoded output.
    pub body: Vec<u8>,
}

/// Turns an authorized report into an output format.
///
/// Called only after the gate has allowed a read.
pub trait ReportRenderer: Send + Sync {
    /// Short format name, e.g. `json`.
    fn format(&self) -> &'static str;

    /// Renders the report.
    fn render(&self, report: &Report) -> CoreResult<RenderedReport>;
}

/// Emits the report itself as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl ReportRenderer for JsonRenderer {
    fn format(&self) -> &'static str {
        "json"
    }

    fn render(&self, report: &Report) -> CoreResult<RenderedReport> {
        let body = serde_json::to_vec_pretty(report)
            .map_err(|e| CoreError::internal(format!("report serialization failed: {e}")))?;
        Ok(RenderedReport {
            content_type: "application/json".to_string(),
            body,
        })
    }
}
