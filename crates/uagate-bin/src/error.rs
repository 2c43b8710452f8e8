// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Errors of the `uagate` binary and the process exit codes they map to.
//!
//! | Code | Cause |
//! |------|-------|
//! | 1 | configuration missing or invalid, broken stored descriptions |
//! | 2 | settings directory unusable |
//! | 3 | runtime failure |
//! | 4 | I/O failure |
//! | 5 | gateway core error |

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for uagate-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors surfaced by the `uagate` commands.
#[derive(Debug, Error)]
pub enum BinError {
    /// No usable configuration was provided.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The configuration file failed to load.
    #[error(transparent)]
    Config(#[from] uagate_config::ConfigError),

    /// The settings directory cannot be created or read.
    #[error("Settings directory {}: {source}", path.display())]
    SettingsDir {
        /// Configured settings directory.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Stored descriptions that would be skipped on restore.
    #[error("{count} stored description(s) would be skipped on restore")]
    InvalidDescriptions {
        /// Number of broken descriptions.
        count: usize,
    },

    /// Failure while the gateway is running.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O failure outside the settings directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Gateway core error.
    #[error("Gateway error: {0}")]
    Gateway(#[from] uagate_core::GatewayError),
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a settings directory error.
    pub fn settings_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SettingsDir {
            path: path.into(),
            source,
        }
    }

    /// Creates a runtime error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Returns the process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Config(_) | Self::InvalidDescriptions { .. } => 1,
            Self::SettingsDir { .. } => 2,
            Self::Runtime(_) => 3,
            Self::Io(_) => 4,
            Self::Gateway(_) => 5,
        }
    }
}

impl From<anyhow::Error> for BinError {
    fn from(err: anyhow::Error) -> Self {
        // `{:#}` keeps the whole context chain on one line.
        Self::Runtime(format!("{:#}", err))
    }
}

impl From<serde_json::Error> for BinError {
    fn from(err: serde_json::Error) -> Self {
        Self::Runtime(format!("Failed to render JSON: {}", err))
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Prints an error and its causes to stderr.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }
}

/// Reports an error and exits with its code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

// =============================================================================
// Tests
// =============================================================================
