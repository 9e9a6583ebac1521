// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use crate::cli::{Cli, RunArgs};
use crate::commands::load_and_init_logging;
use crate::error::BinResult;
use crate::runtime::GatewayRuntime;

/// Starts the gateway and blocks until it shuts down.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    let config = load_and_init_logging(cli)?;
    GatewayRuntime::new(config).run(args.port).await
}
