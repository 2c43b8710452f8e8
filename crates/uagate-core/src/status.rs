// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Service status codes returned to the hosting address-space framework.
//!
//! The numeric values are the OPC UA status codes the hosting server puts on
//! the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result status of a consumer-facing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    /// The operation succeeded.
    Good,
    /// An argument was missing or invalid.
    BadInvalidArgument,
    /// The requested asset or variable does not exist.
    BadNotFound,
    /// Reads are rejected, e.g. while provisioning mode is active.
    BadNotReadable,
    /// Writes are rejected, e.g. read-only variable or provisioning mode.
    BadNotWritable,
    /// The value does not match the variable's data type.
    BadTypeMismatch,
    /// Communication with the field device failed.
    BadCommunicationError,
    /// The description or one of its addresses is malformed.
    BadConfigurationError,
    /// A node with the same identifier already exists.
    BadNodeIdExists,
    /// An internal error occurred.
    BadInternalError,
}

impl StatusCode {
    /// Returns the OPC UA numeric status code.
    pub fn code(&self) -> u32 {
        match self {
            StatusCode::Good => 0x0000_0000,
            StatusCode::BadInternalError => 0x8002_0000,
            StatusCode::BadCommunicationError => 0x8005_0000,
            StatusCode::BadConfigurationError => 0x8089_0000,
            StatusCode::BadNotReadable => 0x803A_0000,
            StatusCode::BadNotWritable => 0x803B_0000,
            StatusCode::BadNotFound => 0x803E_0000,
            StatusCode::BadNodeIdExists => 0x805E_0000,
            StatusCode::BadTypeMismatch => 0x8074_0000,
            StatusCode::BadInvalidArgument => 0x80AB_0000,
        }
    }

    /// Returns the symbolic name.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Good => "Good",
            StatusCode::BadInvalidArgument => "BadInvalidArgument",
            StatusCode::BadNotFound => "BadNotFound",
            StatusCode::BadNotReadable => "BadNotReadable",
            StatusCode::BadNotWritable => "BadNotWritable",
            StatusCode::BadTypeMismatch => "BadTypeMismatch",
            StatusCode::BadCommunicationError => "BadCommunicationError",
            StatusCode::BadConfigurationError => "BadConfigurationError",
            StatusCode::BadNodeIdExists => "BadNodeIdExists",
            StatusCode::BadInternalError => "BadInternalError",
        }
    }

    /// Returns `true` for [`StatusCode::Good`].
    #[inline]
    pub fn is_good(&self) -> bool {
        matches!(self, StatusCode::Good)
    }

    /// Returns `true` for every bad status.
    #[inline]
    pub fn is_bad(&self) -> bool {
        !self.is_good()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.as_str(), self.code())
    }
}
