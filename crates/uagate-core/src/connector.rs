// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Protocol connector abstraction.
//!
//! A [`Connector`] owns the live socket or session of one asset and moves raw
//! bytes to and from the device. Interpretation of those bytes is left to the
//! [codec](crate::codec); connectors only hand over the payload in the byte
//! order their [`ConnectorKind`] declares.
//!
//! # Design Principles
//!
//! - **One variant per protocol**: the kind is selected once from the base
//!   address scheme via the [`ConnectorRegistry`]
//! - **Exclusive access**: connectors take `&mut self` and are shared as a
//!   [`ConnectorHandle`], so one I/O exchange runs at a time per asset
//! - **Fail fast**: tag addresses are validated at asset creation
//!
//! # Example
//!
//! ```rust,ignore
//! use uagate_core::connector::ConnectorRegistry;
//!
//! let mut registry = ConnectorRegistry::new();
//! registry.register(Box::new(ModbusConnectorFactory::default()));
//!
//! let base = BaseAddress::parse("modbus+tcp://10.0.0.5:502/1")?;
//! let mut connector = registry.create(&base)?;
//! connector.connect(&base.host, base.port).await?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::address::{BaseAddress, DeviceAddress};
use crate::error::{AddressError, ConnectorError};
use crate::types::ConnectorKind;

/// Shared, exclusively lockable connector of one asset.
///
/// The lock is a `tokio` mutex because it is held across device I/O.
pub type ConnectorHandle = Arc<tokio::sync::Mutex<Box<dyn Connector>>>;

/// Wraps a connector into a [`ConnectorHandle`].
pub fn into_handle(connector: Box<dyn Connector>) -> ConnectorHandle {
    Arc::new(tokio::sync::Mutex::new(connector))
}

// =============================================================================
// Connector Trait
// =============================================================================

/// The capability every protocol connector implements.
///
/// # Lifecycle
///
/// 1. Created by a [`ConnectorFactory`] from the asset's base address
/// 2. `connect()` opens the session; failure aborts asset creation
/// 3. `read()` / `write()` exchange raw payloads
/// 4. On a failed poll the scheduler calls [`reconnect`]
/// 5. `disconnect()` when the asset is deleted
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns the protocol variant of this connector.
    fn kind(&self) -> ConnectorKind;

    /// Checks that a tag address follows this protocol's syntax.
    ///
    /// Called once per tag at asset creation.
    fn validate_address(&self, address: &DeviceAddress) -> Result<(), AddressError> {
        let _ = address;
        Ok(())
    }

    /// Opens the session to `host:port`.
    ///
    /// # Errors
    ///
    /// [`ConnectorError::Connection`] if the endpoint is unreachable or the
    /// protocol handshake fails.
    async fn connect(&mut self, host: &str, port: u16) -> Result<(), ConnectorError>;

    /// Closes the session. Closing an already closed connector is not an error.
    async fn disconnect(&mut self) -> Result<(), ConnectorError>;

    /// Returns `true` while a session is open.
    fn is_connected(&self) -> bool;

    /// Reads the raw payload at `address`.
    ///
    /// # Errors
    ///
    /// [`ConnectorError::Read`] on protocol faults and malformed responses,
    /// [`ConnectorError::Timeout`] or [`ConnectorError::NotConnected`] otherwise.
    async fn read(&mut self, address: &DeviceAddress) -> Result<Vec<u8>, ConnectorError>;

    /// Writes a raw payload to `address`.
    ///
    /// `is_coil` selects single-bit writes on protocols that distinguish them.
    async fn write(
        &mut self,
        address: &DeviceAddress,
        data: &[u8],
        is_coil: bool,
    ) -> Result<(), ConnectorError>;

    /// Returns the endpoint of the last successful `connect`.
    fn remote_endpoint(&self) -> Option<RemoteEndpoint>;
}

/// Reconnects a connector to its last known endpoint.
///
/// Disconnect errors are ignored; the session is being replaced anyway.
///
/// # Errors
///
/// [`ConnectorError::NotConnected`] if the connector was never connected,
/// or the error of the new `connect`.
pub async fn reconnect(connector: &mut dyn Connector) -> Result<(), ConnectorError> {
    let endpoint = connector
        .remote_endpoint()
        .ok_or(ConnectorError::NotConnected)?;

    if let Err(e) = connector.disconnect().await {
        tracing::debug!(endpoint = %endpoint, error = %e, "Disconnect before reconnect failed");
    }
    connector.connect(&endpoint.host, endpoint.port).await
}

/// Host and port a connector is (or was last) connected to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteEndpoint {
    /// Host name or IP address.
    pub host: String,
    /// TCP or UDP port.
    pub port: u16,
}

impl RemoteEndpoint {
    /// Creates a new endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Connector Settings
// =============================================================================

/// Transport settings shared by every connector factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorSettings {
    /// Timeout for opening a session.
    pub connect_timeout: Duration,
    /// Timeout for one request/response exchange.
    pub operation_timeout: Duration,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(3),
        }
    }
}

// =============================================================================
// Connector Factory
// =============================================================================

/// Creates connectors of one protocol variant.
pub trait ConnectorFactory: Send + Sync {
    /// Returns the variant this factory creates.
    fn kind(&self) -> ConnectorKind;

    /// Creates an unconnected connector for `base`.
    ///
    /// Protocol-specific parts of the base address (rack/slot, AMS net id,
    /// device instance) are validated here.
    fn create(&self, base: &BaseAddress) -> Result<Box<dyn Connector>, ConnectorError>;
}

// =============================================================================
// Connector Registry
// =============================================================================

/// A registry of connector factories keyed by [`ConnectorKind`].
pub struct ConnectorRegistry {
    factories: HashMap<ConnectorKind, Box<dyn ConnectorFactory>>,
}

impl ConnectorRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers a factory, replacing any previous one of the same kind.
    pub fn register(&mut self, factory: Box<dyn ConnectorFactory>) {
        let kind = factory.kind();
        self.factories.insert(kind, factory);
        tracing::debug!(%kind, "Registered connector factory");
    }

    /// Creates a connector for the base address.
    ///
    /// # Errors
    ///
    /// [`AddressError::UnsupportedScheme`] if no factory serves the address
    /// kind, or the factory's own error.
    pub fn create(&self, base: &BaseAddress) -> Result<Box<dyn Connector>, ConnectorError> {
        let factory = self
            .factories
            .get(&base.kind)
            .ok_or_else(|| AddressError::unsupported_scheme(&base.scheme))?;
        factory.create(base)
    }

    /// Returns the registered kinds.
    pub fn supported_kinds(&self) -> Vec<ConnectorKind> {
        let mut kinds: Vec<_> = self.factories.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }

    /// Returns `true` if a factory is registered for `kind`.
    pub fn supports(&self, kind: ConnectorKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Returns the number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` if no factories are registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("kinds", &self.supported_kinds())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
