// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `run`: Start the gateway
//! - `validate`: Validate the configuration and the stored descriptions
//! - `assets`: List the stored asset descriptions
//! - `version`: Show version information

mod assets;
mod run;
mod validate;
mod version;

pub use assets::{assets, inspect_descriptions, StoredAsset};
pub use run::run;
pub use validate::validate;
pub use version::version;

use crate::cli::{Cli, Commands, LogFormat};
use crate::error::BinResult;
use crate::logging::init_logging;

/// Level used by the one-shot commands unless `-l`, `-q` or `-v` say otherwise.
const TOOL_LOG_LEVEL: &str = "warn";

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Run(args) => run::run(&cli, args).await,
        command => {
            init_logging(
                cli.effective_log_level(TOOL_LOG_LEVEL),
                cli.log_format.unwrap_or(LogFormat::Text),
            );
            match command {
                Commands::Validate(args) => validate::validate(&cli, args),
                Commands::Assets(args) => assets::assets(&cli, args),
                _ => version::version(&cli),
            }
        }
    }
}
