// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uagate-config
//!
//! Configuration and on-disk state for the uagate gateway.
//!
//! ## Features
//!
//! - **Schema**: gateway, logging and connector sections with validation
//! - **Multi-Format Support**: YAML, TOML and JSON configuration files
//! - **Environment Overrides**: `UAGATE_*` variables and `${VAR}` placeholders
//! - **Description Store**: accepted asset descriptions as `*.jsonld` files
//! - **Provisioning Gate**: provisioning mode while the trust directory is empty
//!
//! ## Quick Start
//!
//! ```no_run
//! use uagate_config::loader::load_config;
//!
//! let config = load_config("uagate.yaml").unwrap();
//!
//! println!("Gateway: {}", config.gateway.name);
//! println!("Settings: {}", config.gateway.settings_dir.display());
//! ```
//!
//! ## Configuration File
//!
//! ```yaml
//! gateway:
//!   name: edge-gateway
//!   settings_dir: ./settings
//!   trust_dir: ./pki/trusted
//! logging:
//!   level: info
//!   format: text
//! connectors:
//!   connect_timeout_ms: 5000
//!   operation_timeout_ms: 3000
//!   bacnet_local_port: 0
//!   ads_source_port: 32905
//! ```
//!
//! Values may reference environment variables:
//!
//! ```yaml
//! gateway:
//!   name: "${GATEWAY_NAME:edge-gateway}"
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod loader;
pub mod provisioning;
pub mod schema;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader, ConfigLoaderBuilder};
pub use provisioning::TrustDirectoryGate;
pub use schema::{ConnectorsConfig, GatewayConfig, LogFormat, LogLevel, LoggingConfig, UagateConfig};
pub use store::FileDescriptionStore;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
