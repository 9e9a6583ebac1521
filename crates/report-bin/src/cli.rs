// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `run`: Start the gateway (default)
//! - `validate`: Validate a configuration file
//! - `version`: Show version information
//! - `gen-key`: Generate a token signing key
//! - `add-user`: Provision a user with explicit roles

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use report_config::{LogFormat as ConfigLogFormat, LoggingConfig};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// Report gateway with token-based access control.
#[derive(Parser, Debug)]
#[command(
    name = "report-gateway",
    author = "Sylvex <contact@sylvex.io>",
    version = report_core::VERSION,
    about = "Report gateway with token-based access control",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "report.yaml",
        env = "REPORT_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log format. Overrides the config file.
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the gateway server
    ///
    /// This is the default command when no subcommand is specified.
    Run(RunArgs),

    /// Validate the configuration file
    ///
    /// Loads, applies environment overrides and validates without binding
    /// a socket or opening the store.
    Validate(ValidateArgs),

    /// Show version information
    Version,

    /// Generate a random token signing key
    #[command(name = "gen-key")]
    GenKey(GenKeyArgs),

    /// Create a user with explicit roles
    #[command(name = "add-user")]
    AddUser(AddUserArgs),
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `run` command.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Override the listening port
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Default, Clone)]
pub struct ValidateArgs {
    /// Print the effective configuration (secrets omitted)
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `gen-key` command.
#[derive(Args, Debug, Clone)]
pub struct GenKeyArgs {
    /// Number of random bytes
    #[arg(short, long, default_value_t = 48)]
    pub bytes: usize,

    /// Output file path (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the `add-user` command.
#[derive(Args, Debug, Clone)]
pub struct AddUserArgs {
    /// Login handle
    pub handle: String,

    /// Display name (defaults to the handle)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Comma-separated roles
    #[arg(short, long, value_delimiter = ',', default_value = "student")]
    pub roles: Vec<String>,

    /// Password
    #[arg(long, env = "REPORT_NEW_USER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Read the password from stdin
    #[arg(long, conflicts_with = "password")]
    pub password_stdin: bool,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<ConfigLogFormat> for LogFormat {
    fn from(format: ConfigLogFormat) -> Self {
        match format {
            ConfigLogFormat::Text => LogFormat::Text,
            ConfigLogFormat::Json => LogFormat::Json,
            ConfigLogFormat::Compact => LogFormat::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
    /// YAML format
    Yaml,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Run` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Resolves the log level: flags, then `--log-level`, then the file.
    pub fn effective_log_level(&self, file: Option<&LoggingConfig>) -> String {
        if self.quiet {
            "warn".to_string()
        } else if self.verbose {
            "debug".to_string()
        } else if let Some(level) = &self.log_level {
            level.clone()
        } else {
            file.map_or("info", |l| l.level.as_str()).to_string()
        }
    }

    /// Resolves the log format: `--log-format`, then the file.
    pub fn effective_log_format(&self, file: Option<&LoggingConfig>) -> LogFormat {
        self.log_format
            .or_else(|| file.map(|l| l.format.into()))
            .unwrap_or_default()
    }
}

impl Default for GenKeyArgs {
    fn default() -> Self {
        Self {
            bytes: 48,
            output: None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
