// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types shared by the PLC connectors.
//!
//! ```text
//! PlcError
//! ├── Connection   - TCP connect, session or handshake failures
//! ├── Address      - Tag or base addresses the protocol cannot express
//! ├── Frame        - Malformed or unexpected responses
//! ├── Device       - Error codes reported by the controller
//! ├── Timeout      - No response within the operation timeout
//! ├── Io           - Socket errors after the session was established
//! └── NotConnected - No session
//! ```

use std::time::Duration;
use thiserror::Error;

use uagate_core::error::{AddressError, ConnectorError};

/// Result alias using [`PlcError`].
pub type PlcResult<T> = Result<T, PlcError>;

/// Errors raised by the PLC connectors.
#[derive(Debug, Error)]
pub enum PlcError {
    /// The session could not be established.
    #[error("Connection to {endpoint} failed: {message}")]
    Connection {
        /// `host:port`.
        endpoint: String,
        /// Error message.
        message: String,
    },

    /// The address cannot be expressed in the protocol.
    #[error("Invalid address '{address}': {message}")]
    Address {
        /// The address as written.
        address: String,
        /// Error message.
        message: String,
    },

    /// A response could not be parsed.
    #[error("Malformed {protocol} frame: {message}")]
    Frame {
        /// Protocol name.
        protocol: &'static str,
        /// Error message.
        message: String,
    },

    /// The controller rejected the request.
    #[error("{protocol} {operation} of '{address}' rejected with code 0x{code:04X}: {message}")]
    Device {
        /// Protocol name.
        protocol: &'static str,
        /// `read` or `write`.
        operation: &'static str,
        /// Tag address.
        address: String,
        /// Protocol error code.
        code: u32,
        /// Error description.
        message: String,
    },

    /// No response within the operation timeout.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// Failed operation.
        operation: &'static str,
        /// The timeout.
        duration: Duration,
    },

    /// Socket error on an established session.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No session is open.
    #[error("Not connected")]
    NotConnected,
}

impl PlcError {
    /// Creates a connection error.
    pub fn connection(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates an address error.
    pub fn address(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Address {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Creates a frame error.
    pub fn frame(protocol: &'static str, message: impl Into<String>) -> Self {
        Self::Frame {
            protocol,
            message: message.into(),
        }
    }

    /// Creates a device error.
    pub fn device(
        protocol: &'static str,
        operation: &'static str,
        address: impl Into<String>,
        code: u32,
        message: impl Into<String>,
    ) -> Self {
        Self::Device {
            protocol,
            operation,
            address: address.into(),
            code,
            message: message.into(),
        }
    }

    /// Returns `true` if a reconnect may clear the error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Timeout { .. } | Self::Io(_) | Self::NotConnected
        )
    }

    /// Converts into a connector error of a failed read.
    pub fn into_read(self, address: &str) -> ConnectorError {
        self.into_connector(address, false)
    }

    /// Converts into a connector error of a failed write.
    pub fn into_write(self, address: &str) -> ConnectorError {
        self.into_connector(address, true)
    }

    fn into_connector(self, address: &str, write: bool) -> ConnectorError {
        match self {
            Self::Device {
                operation: "write", ..
            } => ConnectorError::write(address, self.to_string()),
            Self::Frame { .. } | Self::Device { .. } | Self::Io(_) if write => {
                ConnectorError::write(address, self.to_string())
            }
            Self::Frame { .. } | Self::Device { .. } | Self::Io(_) => {
                ConnectorError::read(address, self.to_string())
            }
            other => other.into(),
        }
    }
}

impl From<PlcError> for ConnectorError {
    fn from(error: PlcError) -> Self {
        match error {
            PlcError::Connection { endpoint, message } => ConnectorError::connection(endpoint, message),
            PlcError::Address { address, message } => AddressError::invalid(address, message).into(),
            PlcError::Timeout { duration, .. } => ConnectorError::timeout(duration),
            PlcError::NotConnected => ConnectorError::NotConnected,
            PlcError::Device {
                operation: "write",
                ref address,
                ..
            } => ConnectorError::write(address.clone(), error.to_string()),
            PlcError::Device { ref address, .. } => ConnectorError::read(address.clone(), error.to_string()),
            other => ConnectorError::read("plc", other.to_string()),
        }
    }
}

impl From<PlcError> for AddressError {
    fn from(error: PlcError) -> Self {
        match error {
            PlcError::Address { address, message } => AddressError::invalid(address, message),
            other => AddressError::invalid("", other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(PlcError::NotConnected.is_retryable());
        assert!(PlcError::connection("10.0.0.1:102", "refused").is_retryable());
        assert!(!PlcError::frame("S7", "short header").is_retryable());
        assert!(!PlcError::address("DB1", "missing byte offset").is_retryable());
    }

    #[test]
    fn test_connector_conversion() {
        let err = PlcError::device("ADS", "read", "0x4020:0", 0x0702, "index offset not valid");
        assert!(err.to_string().contains("0x0702"));
        assert_eq!(ConnectorError::from(err).error_type(), "device_read");

        let err = PlcError::frame("MC", "short response").into_write("D100");
        assert_eq!(err.error_type(), "device_write");

        let err: ConnectorError = PlcError::address("DB1", "missing byte offset").into();
        assert_eq!(err.error_type(), "address");
        assert!(matches!(ConnectorError::from(PlcError::NotConnected), ConnectorError::NotConnected));
    }
}
