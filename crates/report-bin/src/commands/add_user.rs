// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `add-user` command.

use std::io::{self, BufRead};

use report_core::{CredentialStore, SecretHasher};

use crate::cli::{AddUserArgs, Cli};
use crate::commands::load_and_init_logging;
use crate::error::{BinError, BinResult};
use crate::runtime::Stores;

/// Creates a user with the given roles in the configured store.
pub async fn add_user(cli: &Cli, args: AddUserArgs) -> BinResult<()> {
    let config = load_and_init_logging(cli)?;
    let password = read_password(&args)?;

    let stores = Stores::open(&config.store).await?;
    let credentials = CredentialStore::new(
        stores.users.clone(),
        SecretHasher::new(config.auth.hashing),
    );

    let name = args.name.as_deref().unwrap_or(&args.handle);
    let result = credentials
        .provision(&args.handle, name, &password, &args.roles)
        .await;
    stores.close().await;

    let user = result?;
    println!("Created user '{}' with roles: {}", user.handle, user.roles.join(", "));
    Ok(())
}

fn read_password(args: &AddUserArgs) -> BinResult<String> {
    if args.password_stdin {
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| BinError::io(format!("Failed to read password from stdin: {e}")))?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }
    args.password.clone().ok_or_else(|| {
        BinError::usage("no password given; use --password-stdin or REPORT_NEW_USER_PASSWORD")
    })
}
