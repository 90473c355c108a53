// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `oci-resolve <provider> <accountId>`
//!
//! Resolves linked profiles with settings from `OCI_*` environment variables
//! and prints them as JSON. `oci-resolve recipient <address>` lists the
//! recipient's attestations instead.

use std::process::ExitCode;

use oci_resolver::{
    telemetry, ChainRegistry, DefaultProfileResolver, Provider, ResolverConfig, ResolverError,
};
use tokio_util::sync::CancellationToken;

const USAGE: &str = "usage: oci-resolve <discord|google|address> <accountId>\n       oci-resolve recipient <address>";

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [command, account_id] = args.as_slice() else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };

    match run(command, account_id).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(stage = e.stage(), error = %e, "Resolution failed");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: &str, account_id: &str) -> Result<String, ResolverError> {
    let config = ResolverConfig::from_env()?;
    let resolver = DefaultProfileResolver::from_config(config, &ChainRegistry::builtin())?;

    let output = if command == "recipient" {
        let summaries = resolver.get_user_attestations_by_recipient(account_id).await?;
        serde_json::to_string_pretty(&summaries)
    } else {
        let provider: Provider = command.parse()?;

        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_signal.cancel();
            }
        });

        let profiles = resolver
            .get_user_profiles_until(provider, account_id, cancel)
            .await;
        resolver.shutdown().await;
        serde_json::to_string_pretty(&profiles?)
    };

    output.map_err(|e| ResolverError::Validation(format!("failed to render output: {e}")))
}
