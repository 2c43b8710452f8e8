// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uagate-modbus
//!
//! Modbus TCP connector for the uagate gateway.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     ModbusConnector                             │
//! │                (uagate_core::Connector impl)                    │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  tokio-modbus TCP context                       │
//! │            (per-request unit id, operation timeout)             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tag addresses use `?address=<n>&quantity=<m>` with the register table in
//! the form's entity. Payloads are handed to the codec in wire order; the
//! codec applies the Modbus byte swap.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use uagate_core::connector::{ConnectorRegistry, ConnectorSettings};
//! use uagate_modbus::ModbusConnectorFactory;
//!
//! let mut connectors = ConnectorRegistry::new();
//! connectors.register(Box::new(ModbusConnectorFactory::new(ConnectorSettings::default())));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{ModbusConnector, ModbusConnectorFactory};
pub use error::{ModbusError, ModbusResult};
pub use types::{ModbusAddress, RegisterKind};
