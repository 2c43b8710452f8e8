// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Conversion between OPC UA variants and raw payloads.
//!
//! Numeric payloads are little-endian at their native width, booleans one
//! byte, strings raw UTF-8. The codec in `uagate-core` reads them with the
//! `Native` byte order.

use std::fmt;
use std::str::FromStr;

use opcua::types::{UAString, Variant};

use crate::error::{OpcUaError, OpcUaResult};

/// Scalar value types the connector exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Boolean.
    Boolean,
    /// SByte.
    SByte,
    /// Byte.
    Byte,
    /// Int16.
    Int16,
    /// UInt16.
    UInt16,
    /// Int32.
    Int32,
    /// UInt32.
    UInt32,
    /// Int64.
    Int64,
    /// UInt64.
    UInt64,
    /// Float.
    Float,
    /// Double.
    Double,
    /// String.
    String,
}

impl ValueType {
    /// Returns the value type of a scalar variant.
    pub fn of(variant: &Variant) -> Option<Self> {
        Some(match variant {
            Variant::Boolean(_) => Self::Boolean,
            Variant::SByte(_) => Self::SByte,
            Variant::Byte(_) => Self::Byte,
            Variant::Int16(_) => Self::Int16,
            Variant::UInt16(_) => Self::UInt16,
            Variant::Int32(_) => Self::Int32,
            Variant::UInt32(_) => Self::UInt32,
            Variant::Int64(_) => Self::Int64,
            Variant::UInt64(_) => Self::UInt64,
            Variant::Float(_) => Self::Float,
            Variant::Double(_) => Self::Double,
            Variant::String(_) => Self::String,
            _ => return None,
        })
    }
}

impl FromStr for ValueType {
    type Err = OpcUaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("xsd:").unwrap_or(&lower);
        Ok(match name {
            "boolean" | "bool" => Self::Boolean,
            "sbyte" | "int8" => Self::SByte,
            "byte" | "uint8" | "unsignedbyte" => Self::Byte,
            "int16" | "short" => Self::Int16,
            "uint16" | "unsignedshort" => Self::UInt16,
            "int32" | "int" | "integer" => Self::Int32,
            "uint32" | "unsignedint" => Self::UInt32,
            "int64" | "long" => Self::Int64,
            "uint64" | "unsignedlong" => Self::UInt64,
            "float" | "number" => Self::Float,
            "double" => Self::Double,
            "string" => Self::String,
            _ => return Err(OpcUaError::conversion(format!("unknown value type '{}'", s))),
        })
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Converts a scalar variant into its payload.
///
/// # Errors
///
/// [`OpcUaError::Conversion`] for empty, array and non-scalar variants.
pub fn variant_to_bytes(variant: &Variant) -> OpcUaResult<Vec<u8>> {
    Ok(match variant {
        Variant::Boolean(v) => vec![u8::from(*v)],
        Variant::SByte(v) => v.to_le_bytes().to_vec(),
        Variant::Byte(v) => vec![*v],
        Variant::Int16(v) => v.to_le_bytes().to_vec(),
        Variant::UInt16(v) => v.to_le_bytes().to_vec(),
        Variant::Int32(v) => v.to_le_bytes().to_vec(),
        Variant::UInt32(v) => v.to_le_bytes().to_vec(),
        Variant::Int64(v) => v.to_le_bytes().to_vec(),
        Variant::UInt64(v) => v.to_le_bytes().to_vec(),
        Variant::Float(v) => v.to_le_bytes().to_vec(),
        Variant::Double(v) => v.to_le_bytes().to_vec(),
        Variant::String(v) => v.as_ref().as_bytes().to_vec(),
        Variant::Empty => return Err(OpcUaError::conversion("node has no value")),
        other => return Err(OpcUaError::conversion(format!("unsupported variant {:?}", other))),
    })
}

/// Builds a variant of `value_type` from a payload.
///
/// # Errors
///
/// [`OpcUaError::Conversion`] if the payload is shorter than the type.
pub fn bytes_to_variant(bytes: &[u8], value_type: ValueType) -> OpcUaResult<Variant> {
    fn take<const N: usize>(bytes: &[u8], value_type: ValueType) -> OpcUaResult<[u8; N]> {
        bytes
            .get(..N)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| {
                OpcUaError::conversion(format!(
                    "{} needs {} bytes, got {}",
                    value_type,
                    N,
                    bytes.len()
                ))
            })
    }

    Ok(match value_type {
        ValueType::Boolean => Variant::Boolean(take::<1>(bytes, value_type)?[0] != 0),
        ValueType::SByte => Variant::SByte(i8::from_le_bytes(take(bytes, value_type)?)),
        ValueType::Byte => Variant::Byte(take::<1>(bytes, value_type)?[0]),
        ValueType::Int16 => Variant::Int16(i16::from_le_bytes(take(bytes, value_type)?)),
        ValueType::UInt16 => Variant::UInt16(u16::from_le_bytes(take(bytes, value_type)?)),
        ValueType::Int32 => Variant::Int32(i32::from_le_bytes(take(bytes, value_type)?)),
        ValueType::UInt32 => Variant::UInt32(u32::from_le_bytes(take(bytes, value_type)?)),
        ValueType::Int64 => Variant::Int64(i64::from_le_bytes(take(bytes, value_type)?)),
        ValueType::UInt64 => Variant::UInt64(u64::from_le_bytes(take(bytes, value_type)?)),
        ValueType::Float => Variant::Float(f32::from_le_bytes(take(bytes, value_type)?)),
        ValueType::Double => Variant::Double(f64::from_le_bytes(take(bytes, value_type)?)),
        ValueType::String => {
            let text = std::str::from_utf8(bytes)
                .map_err(|_| OpcUaError::conversion("string payload is not UTF-8"))?;
            Variant::String(UAString::from(text))
        }
    })
}
