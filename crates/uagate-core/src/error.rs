// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Unified error hierarchy for uagate.
//!
//! This module defines the error taxonomy of the translation core:
//!
//! - Malformed base or tag addresses fail fast at asset creation
//! - Transient device errors are retryable and drive the reconnect policy
//! - Codec errors are fatal to the single operation that raised them
//! - Every error maps onto the [`StatusCode`] returned to consumers
//!
//! # Error Hierarchy
//!
//! ```text
//! GatewayError (root)
//! ├── AddressError       - Malformed base or tag address
//! ├── ConnectorError     - Connection, device read and device write failures
//! ├── CodecError         - Unsupported types and malformed payloads
//! ├── RegistryError      - Duplicate bindings and unknown assets/variables
//! ├── DescriptionError   - Unparseable asset descriptions
//! └── AddressSpaceError  - Rejected node operations of the hosting framework
//!
//! ServiceError           - Consumer-facing failures of the management surface
//! ```
//!
//! # Examples
//!
//! ```
//! use uagate_core::error::{ConnectorError, GatewayError};
//! use uagate_core::status::StatusCode;
//! use std::time::Duration;
//!
//! let error = ConnectorError::timeout(Duration::from_secs(5));
//! assert!(error.is_retryable());
//!
//! let gateway_error: GatewayError = error.into();
//! assert_eq!(gateway_error.status_code(), StatusCode::BadCommunicationError);
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::status::StatusCode;

/// Result alias using [`GatewayError`].
pub type GatewayResult<T> = Result<T, GatewayError>;

// =============================================================================
// GatewayError - Root Error Type
// =============================================================================

/// The root error type for uagate.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Address error.
    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    /// Connector error.
    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    /// Codec error.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Registry error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Description error.
    #[error("Description error: {0}")]
    Description(#[from] DescriptionError),

    /// Address space error.
    #[error("Address space error: {0}")]
    AddressSpace(#[from] AddressSpaceError),
}

impl GatewayError {
    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Connector(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns the error type as a string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::Address(_) => "address",
            GatewayError::Connector(e) => e.error_type(),
            GatewayError::Codec(_) => "codec",
            GatewayError::Registry(_) => "registry",
            GatewayError::Description(_) => "description",
            GatewayError::AddressSpace(_) => "address_space",
        }
    }

    /// Returns the status code reported to consumers.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Address(_) => StatusCode::BadConfigurationError,
            GatewayError::Connector(_) => StatusCode::BadCommunicationError,
            GatewayError::Codec(e) => e.status_code(),
            GatewayError::Registry(e) => e.status_code(),
            GatewayError::Description(_) => StatusCode::BadInvalidArgument,
            GatewayError::AddressSpace(_) => StatusCode::BadInternalError,
        }
    }
}

// =============================================================================
// AddressError
// =============================================================================

/// Malformed base or tag addresses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The address does not follow the protocol's syntax.
    #[error("Invalid address format '{address}': {message}")]
    InvalidFormat {
        /// The offending address.
        address: String,
        /// What was expected.
        message: String,
    },

    /// The base address scheme is not served by any connector.
    #[error("Unsupported address scheme '{scheme}'")]
    UnsupportedScheme {
        /// The scheme.
        scheme: String,
    },
}

impl AddressError {
    /// Creates an invalid format error.
    pub fn invalid(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported scheme error.
    pub fn unsupported_scheme(scheme: impl Into<String>) -> Self {
        Self::UnsupportedScheme {
            scheme: scheme.into(),
        }
    }
}

// =============================================================================
// ConnectorError
// =============================================================================

/// Errors raised by protocol connectors.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The endpoint is unreachable or the protocol handshake failed.
    #[error("Connection to {endpoint} failed: {message}")]
    Connection {
        /// `host:port` of the device.
        endpoint: String,
        /// Error message.
        message: String,
        /// Underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A device read failed.
    #[error("Read of '{address}' failed: {message}")]
    Read {
        /// Device address.
        address: String,
        /// Error message.
        message: String,
    },

    /// A device write failed.
    #[error("Write of '{address}' failed: {message}")]
    Write {
        /// Device address.
        address: String,
        /// Error message.
        message: String,
    },

    /// The operation timed out.
    #[error("Operation timed out after {duration:?}")]
    Timeout {
        /// The timeout duration.
        duration: Duration,
    },

    /// The connector has no live session.
    #[error("Connector is not connected")]
    NotConnected,

    /// The tag address was rejected by the connector.
    #[error(transparent)]
    Address(#[from] AddressError),
}

impl ConnectorError {
    /// Creates a connection error.
    pub fn connection(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            endpoint: endpoint.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a connection error with a source.
    pub fn connection_with<E>(
        endpoint: impl Into<String>,
        message: impl Into<String>,
        source: E,
    ) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connection {
            endpoint: endpoint.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a device read error.
    pub fn read(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Read {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Creates a device write error.
    pub fn write(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Returns `true` if this error is transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ConnectorError::Address(_))
    }

    /// Returns the error type for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            ConnectorError::Connection { .. } => "connection",
            ConnectorError::Read { .. } => "device_read",
            ConnectorError::Write { .. } => "device_write",
            ConnectorError::Timeout { .. } => "timeout",
            ConnectorError::NotConnected => "not_connected",
            ConnectorError::Address(_) => "address",
        }
    }
}

// =============================================================================
// CodecError
// =============================================================================

/// Errors raised while encoding or decoding device payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The semantic type is not supported on this path.
    #[error("Unsupported type: {type_name}")]
    UnsupportedType {
        /// Name of the type.
        type_name: String,
    },

    /// A structured-type field has a kind the codec cannot handle.
    #[error("Unsupported kind '{kind}' of field '{field}'")]
    UnsupportedFieldKind {
        /// Field name.
        field: String,
        /// Field kind.
        kind: String,
    },

    /// The payload is shorter than the type requires.
    #[error("Insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData {
        /// Required byte count.
        expected: usize,
        /// Available byte count.
        actual: usize,
    },

    /// The structured type has no field of that name.
    #[error("Structured type '{type_name}' has no field '{field}'")]
    UnknownField {
        /// Type name.
        type_name: String,
        /// Field name.
        field: String,
    },

    /// The value cannot be represented as the target type.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Target type.
        expected: String,
        /// Actual value type.
        actual: String,
    },

    /// A string payload is not valid UTF-8.
    #[error("Invalid UTF-8 string payload")]
    InvalidUtf8,
}

impl CodecError {
    /// Creates an unsupported type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    /// Creates an insufficient data error.
    pub fn insufficient(expected: usize, actual: usize) -> Self {
        Self::InsufficientData { expected, actual }
    }

    /// Creates a type mismatch error.
    pub fn mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Returns the status code reported to consumers.
    pub fn status_code(&self) -> StatusCode {
        match self {
            CodecError::TypeMismatch { .. } | CodecError::InvalidUtf8 => StatusCode::BadTypeMismatch,
            _ => StatusCode::BadConfigurationError,
        }
    }
}

// =============================================================================
// RegistryError
// =============================================================================

/// Errors raised by the tag registry and variable store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A variable with this ID already exists.
    #[error("Duplicate variable binding: {variable_id}")]
    DuplicateBinding {
        /// The duplicated variable ID.
        variable_id: String,
    },

    /// An asset with this ID is already registered.
    #[error("Asset already exists: {asset_id}")]
    AssetExists {
        /// The duplicated asset ID.
        asset_id: String,
    },

    /// No asset with this ID is registered.
    #[error("Asset not found: {asset_id}")]
    AssetNotFound {
        /// The asset ID.
        asset_id: String,
    },

    /// No variable with this ID exists.
    #[error("Variable not found: {variable_id}")]
    VariableNotFound {
        /// The variable ID.
        variable_id: String,
    },

    /// The variable is read-only.
    #[error("Variable is not writable: {variable_id}")]
    NotWritable {
        /// The variable ID.
        variable_id: String,
    },
}

impl RegistryError {
    /// Creates a duplicate binding error.
    pub fn duplicate(variable_id: impl Into<String>) -> Self {
        Self::DuplicateBinding {
            variable_id: variable_id.into(),
        }
    }

    /// Creates an asset not found error.
    pub fn asset_not_found(asset_id: impl Into<String>) -> Self {
        Self::AssetNotFound {
            asset_id: asset_id.into(),
        }
    }

    /// Creates a variable not found error.
    pub fn variable_not_found(variable_id: impl Into<String>) -> Self {
        Self::VariableNotFound {
            variable_id: variable_id.into(),
        }
    }

    /// Returns the status code reported to consumers.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RegistryError::DuplicateBinding { .. } | RegistryError::AssetExists { .. } => {
                StatusCode::BadNodeIdExists
            }
            RegistryError::AssetNotFound { .. } | RegistryError::VariableNotFound { .. } => {
                StatusCode::BadNotFound
            }
            RegistryError::NotWritable { .. } => StatusCode::BadNotWritable,
        }
    }
}

// =============================================================================
// DescriptionError
// =============================================================================

/// Errors raised while reading an asset description.
#[derive(Debug, Error)]
pub enum DescriptionError {
    /// The description is not valid JSON or does not match the model.
    #[error("Failed to parse description: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field is missing or empty.
    #[error("Missing required field: {field}")]
    MissingField {
        /// Field name.
        field: String,
    },

    /// The description uses a format that is not accepted.
    #[error("Unsupported description format: {format}")]
    UnsupportedFormat {
        /// Detected format.
        format: String,
    },

    /// A property or form is invalid.
    #[error("Invalid property '{property}': {message}")]
    InvalidProperty {
        /// Property key.
        property: String,
        /// Error message.
        message: String,
    },
}

impl DescriptionError {
    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an invalid property error.
    pub fn invalid_property(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidProperty {
            property: property.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// AddressSpaceError
// =============================================================================

/// Errors reported by the hosting address-space framework.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressSpaceError {
    /// A node with this identifier already exists.
    #[error("Node already exists: {node}")]
    NodeExists {
        /// Node identifier.
        node: String,
    },

    /// The framework rejected the operation.
    #[error("Address space rejected operation: {message}")]
    Rejected {
        /// Error message.
        message: String,
    },
}

// =============================================================================
// ServiceError
// =============================================================================

/// Failures returned by the management surface and gated variable access.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A required argument was missing or empty.
    #[error("Missing or empty argument: {argument}")]
    InvalidArgument {
        /// Argument name.
        argument: String,
    },

    /// Variable reads are disabled while provisioning.
    #[error("Variable '{variable_id}' is not readable in provisioning mode")]
    NotReadable {
        /// Variable id.
        variable_id: String,
    },

    /// Variable writes are disabled while provisioning.
    #[error("Variable '{variable_id}' is not writable in provisioning mode")]
    NotWritable {
        /// Variable id.
        variable_id: String,
    },

    /// The underlying operation failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ServiceError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(argument: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
        }
    }

    /// Returns the status code reported to consumers.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidArgument { .. } => StatusCode::BadInvalidArgument,
            ServiceError::NotReadable { .. } => StatusCode::BadNotReadable,
            ServiceError::NotWritable { .. } => StatusCode::BadNotWritable,
            ServiceError::Gateway(e) => e.status_code(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
