// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uagate-core
//!
//! Translation core of the uagate industrial protocol gateway.
//!
//! An asset is a field device described by a WoT Thing Description. The core
//! turns each description into a connector, a set of polled tags and the
//! variables consumers read and write:
//!
//! - **Types**: `AssetId`, `VariableId`, `Value`, semantic and structured types
//! - **Address**: base address and per-tag address parsing
//! - **Codec**: byte-level conversion between device payloads and values
//! - **Connector**: the device I/O trait and a registry of factories
//! - **Description**: the Thing Description model
//! - **Registry**: tags and the variable store behind one lock
//! - **Scheduler**: one polling worker per asset on a 1 s tick
//! - **Lifecycle**: create, delete, read and write assets
//! - **Service**: the consumer-facing management operations
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use uagate_core::prelude::*;
//!
//! let registry = Arc::new(Registry::new(Arc::new(InMemoryAddressSpace::new())));
//! let manager = Arc::new(AssetManager::new(registry, Arc::new(connectors)));
//! let service = ManagementService::new(manager, store, gate);
//!
//! let asset = service.configure_asset(Some(&text)).await?;
//! let (value, timestamp) = service.read_variable(&asset.variable("pressure"))?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Core Modules
// =============================================================================

pub mod address;
pub mod error;
pub mod status;
pub mod types;

// =============================================================================
// Translation Modules
// =============================================================================

pub mod codec;
pub mod connector;
pub mod description;
pub mod address_space;

// =============================================================================
// Runtime Modules
// =============================================================================

pub mod registry;
pub mod scheduler;
pub mod lifecycle;
pub mod service;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use address::{BaseAddress, DeviceAddress};
pub use error::{GatewayError, GatewayResult, ServiceError};
pub use status::StatusCode;
pub use types::{AssetId, ConnectorKind, DataTypeDescriptor, SemanticType, Value, VariableId};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::address::{BaseAddress, DeviceAddress};
    pub use crate::address_space::{
        AddressSpace, InMemoryAddressSpace, ProvisioningGate, StaticProvisioningGate,
    };
    pub use crate::connector::{
        Connector, ConnectorFactory, ConnectorRegistry, ConnectorSettings, RemoteEndpoint,
    };
    pub use crate::description::ThingDescription;
    pub use crate::error::{
        AddressError, CodecError, ConnectorError, GatewayError, GatewayResult, RegistryError,
        ServiceError,
    };
    pub use crate::lifecycle::AssetManager;
    pub use crate::registry::Registry;
    pub use crate::service::{DescriptionStore, InMemoryDescriptionStore, ManagementService};
    pub use crate::status::StatusCode;
    pub use crate::types::{
        AssetId, ByteOrder, ConnectorKind, DataTypeDescriptor, SemanticType, Value, VariableId,
    };
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
