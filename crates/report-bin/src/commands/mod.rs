// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `run`: Start the gateway server
//! - `validate`: Validate a configuration file
//! - `version`: Show version information
//! - `gen-key`: Generate a token signing key
//! - `add-user`: Provision a user with explicit roles

mod add_user;
mod gen_key;
mod run;
mod validate;
mod version;

pub use add_user::add_user;
pub use gen_key::gen_key;
pub use run::run;
pub use validate::validate;
pub use version::version;

use report_config::AppConfig;

use crate::cli::{Cli, Commands};
use crate::error::{BinError, BinResult};
use crate::logging::init_logging;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Run(args) => run::run(&cli, args).await,
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Version => version::version(&cli),
        Commands::GenKey(args) => gen_key::gen_key(&cli, args),
        Commands::AddUser(args) => add_user::add_user(&cli, args).await,
    }
}

/// Loads the configuration file and starts logging with its settings.
pub(crate) fn load_and_init_logging(cli: &Cli) -> BinResult<AppConfig> {
    let config = report_config::load_config(&cli.config).map_err(|e| {
        BinError::from(e).with_context(format!("Failed to load {}", cli.config.display()))
    })?;
    init_logging(
        &cli.effective_log_level(Some(&config.logging)),
        cli.effective_log_format(Some(&config.logging)),
    );
    Ok(config)
}
