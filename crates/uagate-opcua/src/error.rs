// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client error types.
//!
//! ```text
//! OpcUaError
//! ├── Connection   - Endpoint discovery and session activation
//! ├── NodeId       - Malformed or unresolvable node ids
//! ├── Operation    - Service faults and bad status codes
//! ├── Conversion   - Payloads that do not fit the node's value type
//! ├── Timeout      - No answer within the operation timeout
//! └── NotConnected - No session
//! ```

use std::time::Duration;
use thiserror::Error;

use uagate_core::error::{AddressError, ConnectorError};

/// Result alias using [`OpcUaError`].
pub type OpcUaResult<T> = Result<T, OpcUaError>;

/// Errors raised by the Generic connector.
#[derive(Debug, Error)]
pub enum OpcUaError {
    /// The session could not be established.
    #[error("Connection to {endpoint} failed: {message}")]
    Connection {
        /// Endpoint URL.
        endpoint: String,
        /// Error message.
        message: String,
    },

    /// A node id could not be parsed or resolved.
    #[error("Invalid node id '{node}': {message}")]
    NodeId {
        /// The node id as written.
        node: String,
        /// Error message.
        message: String,
    },

    /// A read or write failed on the server.
    #[error("{operation} of '{node}' failed: {message}")]
    Operation {
        /// `read` or `write`.
        operation: &'static str,
        /// Node id.
        node: String,
        /// Error message or status code.
        message: String,
    },

    /// A payload does not match the node's value type.
    #[error("Conversion failed: {message}")]
    Conversion {
        /// Error message.
        message: String,
    },

    /// The server did not answer in time.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// Failed operation.
        operation: &'static str,
        /// The timeout.
        duration: Duration,
    },

    /// No session is open.
    #[error("Not connected")]
    NotConnected,
}

impl OpcUaError {
    /// Creates a connection error.
    pub fn connection(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a node id error.
    pub fn node_id(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NodeId {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Creates a read failure.
    pub fn read(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation {
            operation: "read",
            node: node.into(),
            message: message.into(),
        }
    }

    /// Creates a write failure.
    pub fn write(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation {
            operation: "write",
            node: node.into(),
            message: message.into(),
        }
    }

    /// Creates a conversion error.
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }
}

impl From<OpcUaError> for ConnectorError {
    fn from(error: OpcUaError) -> Self {
        match error {
            OpcUaError::Connection { endpoint, message } => ConnectorError::connection(endpoint, message),
            OpcUaError::NodeId { node, message } => AddressError::invalid(node, message).into(),
            OpcUaError::Operation {
                operation: "write",
                node,
                message,
            } => ConnectorError::write(node, message),
            OpcUaError::Operation { node, message, .. } => ConnectorError::read(node, message),
            OpcUaError::Conversion { message } => ConnectorError::write("conversion", message),
            OpcUaError::Timeout { duration, .. } => ConnectorError::timeout(duration),
            OpcUaError::NotConnected => ConnectorError::NotConnected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_conversion() {
        let err: ConnectorError = OpcUaError::write("ns=2;s=Speed", "BadTypeMismatch").into();
        assert_eq!(err.error_type(), "device_write");
        let err: ConnectorError = OpcUaError::read("ns=2;s=Speed", "BadNodeIdUnknown").into();
        assert_eq!(err.error_type(), "device_read");
        let err: ConnectorError = OpcUaError::node_id("ns=x", "bad namespace").into();
        assert!(!err.is_retryable());
    }
}
