// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use report_config::{AppConfig, ConfigError, StoreBackend};
use report_core::RevocationMode;
use serde::Serialize;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Result of a successful validation.
#[derive(Debug, Serialize)]
struct ValidationReport<'a> {
    valid: bool,
    config_path: String,
    summary: Summary,
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<&'a AppConfig>,
}

#[derive(Debug, Serialize)]
struct Summary {
    listen: String,
    store_backend: StoreBackend,
    revocation_mode: RevocationMode,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
    allow_registration: bool,
}

/// Loads and validates the configuration without opening the store.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;
    if !config_path.exists() {
        return Err(ConfigError::file_not_found(config_path).into());
    }

    let config = report_config::load_config(config_path)
        .map_err(|e| BinError::from(e).with_context("Configuration validation failed"))?;

    let report = ValidationReport {
        valid: true,
        config_path: config_path.display().to_string(),
        summary: Summary {
            listen: config.server.socket_addr().to_string(),
            store_backend: config.store.backend,
            revocation_mode: config.auth.revocation_mode,
            access_ttl_secs: config.auth.access_ttl_secs,
            refresh_ttl_secs: config.auth.refresh_ttl_secs,
            allow_registration: config.auth.allow_registration,
        },
        warnings: warnings(&config),
        config: args.show_config.then_some(&config),
    };

    match args.format {
        OutputFormat::Text => print_text(&report)?,
        OutputFormat::Json => {
            let out = serde_json::to_string_pretty(&report)
                .map_err(|e| BinError::io(format!("Failed to serialize report: {e}")))?;
            println!("{out}");
        }
        OutputFormat::Yaml => {
            let out = serde_yaml::to_string(&report)
                .map_err(|e| BinError::io(format!("Failed to serialize report: {e}")))?;
            print!("{out}");
        }
    }

    Ok(())
}

/// Settings that load fine but are likely mistakes.
fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.store.backend == StoreBackend::Memory {
        warnings.push("store.backend is memory; users and sessions are lost on restart".into());
    }
    if config.auth.revocation_mode == RevocationMode::Stateless {
        warnings.push(format!(
            "revocation_mode is stateless; logged-out access tokens stay valid for up to {}s",
            config.auth.access_ttl_secs
        ));
    }
    if config.server.cors_origins.iter().any(|o| o == "*") {
        warnings.push("server.cors_origins allows any origin".into());
    }
    if !config.authorization.override_roles.is_empty() {
        warnings.push(format!(
            "authorization.override_roles {:?} bypass every role requirement",
            config.authorization.override_roles
        ));
    }
    if config.store.purge_interval().is_none() {
        warnings.push("store.purge_interval_secs is 0; expired refresh tokens are never purged".into());
    }

    warnings
}

fn print_text(report: &ValidationReport<'_>) -> BinResult<()> {
    let s = &report.summary;
    println!("Configuration is valid: {}", report.config_path);
    println!();
    println!("Summary:");
    println!("  Listen:          {}", s.listen);
    println!("  Store:           {:?}", s.store_backend);
    println!("  Revocation mode: {}", s.revocation_mode.as_str());
    println!("  Access TTL:      {}s", s.access_ttl_secs);
    println!("  Refresh TTL:     {}s", s.refresh_ttl_secs);
    println!(
        "  Registration:    {}",
        if s.allow_registration { "open" } else { "closed" }
    );

    if !report.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &report.warnings {
            println!("  - {warning}");
        }
    }

    if let Some(config) = report.config {
        let out = serde_yaml::to_string(config)
            .map_err(|e| BinError::io(format!("Failed to serialize config: {e}")))?;
        println!();
        println!("Effective configuration (secrets omitted):");
        print!("{out}");
    }

    Ok(())
}
