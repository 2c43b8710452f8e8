// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for uagate.
//!
//! # Schema Structure
//!
//! ```text
//! UagateConfig
//! ├── gateway: GatewayConfig        name, settings and trust directories
//! ├── logging: LoggingConfig        level and output format
//! └── connectors: ConnectorsConfig  timeouts and transport ports
//! ```

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uagate_core::connector::ConnectorSettings;

// =============================================================================
// Constants
// =============================================================================

/// Default connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Default operation timeout in milliseconds.
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 3000;

/// Maximum accepted timeout in milliseconds (10 minutes).
pub const MAX_TIMEOUT_MS: u64 = 600_000;

/// Default source AMS port for ADS requests.
pub const DEFAULT_ADS_SOURCE_PORT: u16 = 32905;

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration structure for uagate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UagateConfig {
    /// Gateway configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Connector transport configuration.
    #[serde(default)]
    pub connectors: ConnectorsConfig,
}

impl UagateConfig {
    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.gateway.validate()?;
        self.connectors.validate()?;
        Ok(())
    }
}

// =============================================================================
// Gateway Configuration
// =============================================================================

/// Gateway identification and storage locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Human-readable gateway name.
    #[serde(default = "default_gateway_name")]
    pub name: String,

    /// Directory holding the persisted asset descriptions (`*.jsonld`).
    #[serde(default = "default_settings_dir")]
    pub settings_dir: PathBuf,

    /// Directory of trusted certificates. Provisioning mode while empty or missing.
    #[serde(default = "default_trust_dir")]
    pub trust_dir: PathBuf,
}

fn default_gateway_name() -> String {
    "uagate".to_string()
}

/// Returns the default settings directory.
pub fn default_settings_dir() -> PathBuf {
    PathBuf::from("./settings")
}

/// Returns the default trust directory.
pub fn default_trust_dir() -> PathBuf {
    PathBuf::from("./pki/trusted")
}

impl GatewayConfig {
    /// Validates the gateway configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::validation("gateway.name", "cannot be empty"));
        }
        if self.name.len() > 64 {
            return Err(ConfigError::validation("gateway.name", "cannot exceed 64 characters"));
        }
        if self.settings_dir.as_os_str().is_empty() {
            return Err(ConfigError::validation("gateway.settings_dir", "cannot be empty"));
        }
        if self.trust_dir.as_os_str().is_empty() {
            return Err(ConfigError::validation("gateway.trust_dir", "cannot be empty"));
        }
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: default_gateway_name(),
            settings_dir: default_settings_dir(),
            trust_dir: default_trust_dir(),
        }
    }
}

// =============================================================================
// Connector Configuration
// =============================================================================

/// Transport settings applied to every connector factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectorsConfig {
    /// Session open timeout in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Request/response timeout in milliseconds.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_ms: u64,

    /// Local UDP port for BACnet/IP (0 = ephemeral).
    #[serde(default)]
    pub bacnet_local_port: u16,

    /// Source AMS port announced in ADS requests.
    #[serde(default = "default_ads_source_port")]
    pub ads_source_port: u16,
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_operation_timeout() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_MS
}

fn default_ads_source_port() -> u16 {
    DEFAULT_ADS_SOURCE_PORT
}

impl ConnectorsConfig {
    /// Validates the connector configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [
            ("connectors.connect_timeout_ms", self.connect_timeout_ms),
            ("connectors.operation_timeout_ms", self.operation_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::validation(field, "must be greater than 0"));
            }
            if value > MAX_TIMEOUT_MS {
                return Err(ConfigError::validation(
                    field,
                    format!("cannot exceed {} ms", MAX_TIMEOUT_MS),
                ));
            }
        }
        if self.ads_source_port == 0 {
            return Err(ConfigError::validation("connectors.ads_source_port", "must be greater than 0"));
        }
        Ok(())
    }

    /// Returns the connect timeout as Duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the operation timeout as Duration.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Returns the settings handed to the connector factories.
    pub fn settings(&self) -> ConnectorSettings {
        ConnectorSettings {
            connect_timeout: self.connect_timeout(),
            operation_timeout: self.operation_timeout(),
        }
    }
}

impl Default for ConnectorsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
            bacnet_local_port: 0,
            ads_source_port: DEFAULT_ADS_SOURCE_PORT,
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses a level name, accepting `warning` for `warn`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON lines for log collectors.
    Json,
    /// Single-line compact text.
    Compact,
}

impl LogFormat {
    /// Returns the format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Compact => "compact",
        }
    }

    /// Parses a format name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "pretty" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            "compact" => Some(LogFormat::Compact),
            _ => None,
        }
    }
}
