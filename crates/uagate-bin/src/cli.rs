// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command line of the `uagate` executable.
//!
//! Without a subcommand the gateway runs. `validate` and `assets` only
//! inspect the configuration file and the settings directory.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Exposes Modbus, OPC UA, S7, MC protocol, EtherNet/IP, ADS and BACnet
/// devices as typed variables built from asset descriptions.
#[derive(Parser, Debug)]
#[command(
    name = "uagate",
    author = "Sylvex <contact@sylvex.io>",
    version = uagate_core::VERSION,
    about = "Industrial protocol gateway runtime",
    propagate_version = true
)]
pub struct Cli {
    /// Gateway configuration (yaml, toml or json)
    #[arg(short, long, env = "UAGATE_CONFIG", default_value = "uagate.yaml", global = true)]
    pub config: PathBuf,

    /// Level filter such as `debug`, replacing `logging.level`
    #[arg(short = 'l', long, global = true)]
    pub log_level: Option<String>,

    /// Output format, replacing `logging.format`
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormat>,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// What to do, `run` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// `uagate` subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the gateway until SIGTERM or SIGINT (default)
    ///
    /// Descriptions stored in the settings directory are configured again
    /// before the gateway reports ready.
    Run(RunArgs),

    /// Check the configuration and every stored description
    Validate(ValidateArgs),

    /// List the descriptions stored in the settings directory
    Assets(AssetsArgs),

    /// Print versions and the supported connectors
    Version,
}

/// Options of `uagate run`.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Start with no assets, ignoring the stored descriptions
    #[arg(long)]
    pub no_restore: bool,
}

/// Options of `uagate validate`.
#[derive(Args, Debug, Default, Clone)]
pub struct ValidateArgs {
    /// Also print the configuration as loaded, defaults included
    #[arg(short, long)]
    pub show_config: bool,

    /// Report format
    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Options of `uagate assets`.
#[derive(Args, Debug, Default, Clone)]
pub struct AssetsArgs {
    /// Listing format
    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One line per event with target
    #[default]
    Text,
    /// One JSON object per event
    Json,
    /// Short lines without target
    Compact,
}

impl From<uagate_config::LogFormat> for LogFormat {
    fn from(format: uagate_config::LogFormat) -> Self {
        match format {
            uagate_config::LogFormat::Text => LogFormat::Text,
            uagate_config::LogFormat::Json => LogFormat::Json,
            uagate_config::LogFormat::Compact => LogFormat::Compact,
        }
    }
}

/// Report layout of `validate` and `assets`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// For people
    #[default]
    Text,
    /// For scripts
    Json,
}

impl Cli {
    /// Parses `std::env::args`, exiting on usage errors.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The subcommand, `run` when none was given.
    pub fn effective_command(&self) -> Commands {
        match &self.command {
            Some(command) => command.clone(),
            None => Commands::Run(RunArgs::default()),
        }
    }

    /// `-q` and `-v` beat `-l`, which beats the configured level.
    pub fn effective_log_level<'a>(&'a self, configured: &'a str) -> &'a str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (_, true) => "debug",
            _ => self.log_level.as_deref().unwrap_or(configured),
        }
    }

    /// `--log-format`, else the configured format.
    pub fn effective_log_format(&self, configured: uagate_config::LogFormat) -> LogFormat {
        self.log_format.unwrap_or_else(|| configured.into())
    }
}
