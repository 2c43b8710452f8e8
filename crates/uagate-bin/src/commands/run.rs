// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use tracing::info;

use crate::cli::{Cli, RunArgs};
use crate::error::BinResult;
use crate::logging::init_logging;
use crate::runtime::RuntimeBuilder;

/// Executes the `run` command to start the gateway.
///
/// The configuration is loaded first so its logging section can take effect
/// before anything else is logged.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    let config = uagate_config::load_config(&cli.config)?;

    init_logging(
        cli.effective_log_level(config.logging.level.as_str()),
        cli.effective_log_format(config.logging.format),
    );
    info!(config = %cli.config.display(), "Configuration loaded");

    let runtime = RuntimeBuilder::new()
        .config(config)
        .restore(!args.no_restore)
        .build()?;

    runtime.run().await
}
