// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Logging and tracing initialization.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::LogFormat;

/// Noisy dependencies held at a fixed level.
const DEPENDENCY_DIRECTIVES: &[&str] = &[
    "hyper=warn",
    "tower=warn",
    "tower_http=info",
    "sqlx=warn",
    "axum=info",
];

/// Initializes the global subscriber.
///
/// `RUST_LOG`, when set, replaces `level`. Calling this twice keeps the first
/// subscriber.
///
/// ```ignore
/// use report_bin::{cli::LogFormat, logging::init_logging};
///
/// init_logging("info", LogFormat::Text);
/// ```
pub fn init_logging(level: &str, format: LogFormat) {
    let filter = build_filter(level);

    let result = match format {
        LogFormat::Text => {
            let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true).with_ansi(is_terminal))
                .try_init()
        }
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
        LogFormat::Compact => {
            let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_ansi(is_terminal),
                )
                .try_init()
        }
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {e}");
    }
}

fn build_filter(level: &str) -> EnvFilter {
    let base = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    DEPENDENCY_DIRECTIVES
        .iter()
        .filter_map(|d| d.parse().ok())
        .fold(base, |filter, directive| filter.add_directive(directive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_falls_back() {
        // Must not panic on garbage.
        let filter = build_filter("not[a=level");
        assert!(filter.to_string().contains("hyper=warn"));
    }
}
