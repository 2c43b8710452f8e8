// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus error types.
//!
//! # Error Categories
//!
//! ```text
//! ModbusError
//! ├── Connection    - TCP connect, DNS resolution, closed sessions
//! ├── Exception     - Exception responses sent by the device
//! ├── Transport     - I/O and framing failures of an exchange
//! ├── Timeout       - No response within the operation timeout
//! └── ReadOnly      - Writes to discrete inputs or input registers
//! ```
//!
//! Every variant converts into [`ConnectorError`] at the connector boundary.

use std::time::Duration;
use thiserror::Error;

use uagate_core::error::ConnectorError;

/// Result alias using [`ModbusError`].
pub type ModbusResult<T> = Result<T, ModbusError>;

// =============================================================================
// ModbusError
// =============================================================================

/// Errors raised by the Modbus connector.
#[derive(Debug, Error)]
pub enum ModbusError {
    /// The TCP session could not be opened.
    #[error("Connection to {host}:{port} failed: {message}")]
    Connection {
        /// Device host.
        host: String,
        /// Device port.
        port: u16,
        /// Error message.
        message: String,
    },

    /// The device answered with an exception response.
    #[error("{operation} at {address}: exception 0x{code:02X} ({name})")]
    Exception {
        /// Failed operation.
        operation: &'static str,
        /// Start address.
        address: u16,
        /// Modbus exception code.
        code: u8,
        /// Human-readable exception name.
        name: &'static str,
    },

    /// The exchange failed below the Modbus layer.
    #[error("{operation} at {address} failed: {message}")]
    Transport {
        /// Failed operation.
        operation: &'static str,
        /// Start address.
        address: u16,
        /// Error message.
        message: String,
    },

    /// No response arrived in time.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// Failed operation.
        operation: &'static str,
        /// The timeout.
        duration: Duration,
    },

    /// The register kind cannot be written.
    #[error("{kind} is read-only")]
    ReadOnly {
        /// Register kind name.
        kind: &'static str,
    },

    /// No session is open.
    #[error("Not connected")]
    NotConnected,
}

impl ModbusError {
    /// Creates a connection error.
    pub fn connection(host: impl Into<String>, port: u16, message: impl Into<String>) -> Self {
        Self::Connection {
            host: host.into(),
            port,
            message: message.into(),
        }
    }

    /// Creates an exception error from a raw exception code.
    pub fn exception(operation: &'static str, address: u16, code: u8) -> Self {
        Self::Exception {
            operation,
            address,
            code,
            name: exception_name(code),
        }
    }

    /// Creates a transport error.
    pub fn transport(operation: &'static str, address: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            address,
            message: message.into(),
        }
    }

    /// Returns `true` if a reconnect may resolve the error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Exception { code, .. } => matches!(code, 0x05 | 0x06 | 0x0B),
            Self::ReadOnly { .. } => false,
            _ => true,
        }
    }

    /// Converts into a connector read error.
    pub fn into_read(self, address: impl Into<String>) -> ConnectorError {
        match self {
            Self::Timeout { duration, .. } => ConnectorError::timeout(duration),
            Self::NotConnected => ConnectorError::NotConnected,
            other => ConnectorError::read(address, other.to_string()),
        }
    }

    /// Converts into a connector write error.
    pub fn into_write(self, address: impl Into<String>) -> ConnectorError {
        match self {
            Self::Timeout { duration, .. } => ConnectorError::timeout(duration),
            Self::NotConnected => ConnectorError::NotConnected,
            other => ConnectorError::write(address, other.to_string()),
        }
    }
}

impl From<ModbusError> for ConnectorError {
    fn from(error: ModbusError) -> Self {
        match error {
            ModbusError::Connection { host, port, message } => {
                ConnectorError::connection(format!("{}:{}", host, port), message)
            }
            ModbusError::Timeout { duration, .. } => ConnectorError::timeout(duration),
            ModbusError::NotConnected => ConnectorError::NotConnected,
            other => ConnectorError::read("modbus", other.to_string()),
        }
    }
}

/// Returns the name of a Modbus exception code.
pub fn exception_name(code: u8) -> &'static str {
    match code {
        0x01 => "Illegal Function",
        0x02 => "Illegal Data Address",
        0x03 => "Illegal Data Value",
        0x04 => "Server Device Failure",
        0x05 => "Acknowledge",
        0x06 => "Server Device Busy",
        0x08 => "Memory Parity Error",
        0x0A => "Gateway Path Unavailable",
        0x0B => "Gateway Target Device Failed to Respond",
        _ => "Unknown Exception",
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_display() {
        let err = ModbusError::exception("read_holding_registers", 40, 0x02);
        assert_eq!(
            err.to_string(),
            "read_holding_registers at 40: exception 0x02 (Illegal Data Address)"
        );
        assert!(!err.is_retryable());
        assert!(ModbusError::exception("read_coils", 0, 0x06).is_retryable());
    }

    #[test]
    fn test_connector_conversion() {
        let err: ConnectorError = ModbusError::connection("10.0.0.5", 502, "refused").into();
        assert_eq!(err.error_type(), "connection");

        let err = ModbusError::Timeout {
            operation: "read_coils",
            duration: Duration::from_secs(3),
        }
        .into_read("0@1[1]");
        assert_eq!(err.error_type(), "timeout");

        let err = ModbusError::ReadOnly { kind: "InputRegister" }.into_write("4@1[2]");
        assert_eq!(err.error_type(), "device_write");
    }
}
