// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Prints version information.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("report-gateway {}", crate::VERSION);
    println!();
    println!("Components:");
    println!("  report-core: {}", report_core::VERSION);
    println!("  report-api:  {}", report_api::VERSION);
    println!("  report-bin:  {}", crate::VERSION);
    println!();
    println!("Target: {} / {}", std::env::consts::ARCH, std::env::consts::OS);
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
