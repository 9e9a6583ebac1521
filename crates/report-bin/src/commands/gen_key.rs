// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `gen-key` command.

use std::fs;

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use report_config::MIN_SIGNING_KEY_LEN;

use crate::cli::{Cli, GenKeyArgs};
use crate::error::{BinError, BinResult};

/// Generates a random signing key, base64 encoded.
pub fn gen_key(_cli: &Cli, args: GenKeyArgs) -> BinResult<()> {
    let key = generate_key(args.bytes)?;

    if let Some(path) = &args.output {
        fs::write(path, &key)
            .map_err(|e| BinError::io(format!("Failed to write key file: {e}")))?;
        eprintln!("Key written to: {}", path.display());
        eprintln!("Reference it with auth.signing_key_file or REPORT_AUTH_SIGNING_KEY_FILE.");
    } else {
        println!("{key}");
    }

    Ok(())
}

/// Returns `bytes` random bytes as standard base64.
pub(crate) fn generate_key(bytes: usize) -> BinResult<String> {
    // The encoded key is what gets configured, and it must meet the minimum.
    if bytes < MIN_SIGNING_KEY_LEN {
        return Err(BinError::usage(format!(
            "key must be at least {MIN_SIGNING_KEY_LEN} bytes, got {bytes}"
        )));
    }
    let mut raw = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut raw);
    Ok(STANDARD.encode(raw))
}
