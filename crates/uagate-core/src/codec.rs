// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Type codec between raw device bytes and typed values.
//!
//! Scalars are encoded little-endian. On the Modbus path ([`ByteOrder::Swapped`])
//! the whole buffer is reversed before decoding and after encoding, which turns
//! the big-endian register image into native order and back. Strings are never
//! swapped.
//!
//! Structured bodies are a concatenation of their fields in descriptor order:
//!
//! ```text
//! float32 → 4 bytes LE      int32  → 4 bytes LE
//! bool    → 1 byte (0/1)    string → i32 LE length (-1 = null) + UTF-8 bytes
//! ```
//!
//! # Examples
//!
//! ```
//! use uagate_core::codec::{decode_scalar, encode_scalar};
//! use uagate_core::types::{ByteOrder, SemanticType, Value};
//!
//! // Holding registers 0x4148 0x0000 as they arrive from a Modbus device
//! let wire = [0x41, 0x48, 0x00, 0x00];
//! let value = decode_scalar(&wire, SemanticType::Float, ByteOrder::Swapped).unwrap();
//! assert_eq!(value, Value::Float32(12.5));
//!
//! let bytes = encode_scalar(&value, SemanticType::Float, ByteOrder::Swapped).unwrap();
//! assert_eq!(bytes, wire);
//! ```

use crate::error::CodecError;
use crate::types::{ByteOrder, FieldKind, SemanticType, StructuredTypeDescriptor, Value};

// =============================================================================
// Scalars
// =============================================================================

/// Decodes a device payload into a value of `semantic` type.
///
/// Payloads longer than the type's width are accepted; the leading bytes of
/// the (normalized) buffer are used.
pub fn decode_scalar(bytes: &[u8], semantic: SemanticType, order: ByteOrder) -> Result<Value, CodecError> {
    if semantic == SemanticType::String {
        return decode_string(bytes);
    }

    let normalized = normalize(bytes, order);
    let width = semantic.byte_width().unwrap_or(0);
    if normalized.len() < width {
        return Err(CodecError::insufficient(width, normalized.len()));
    }
    let b = &normalized[..width];

    let value = match semantic {
        SemanticType::Float => Value::Float32(f32::from_le_bytes(array(b))),
        SemanticType::Boolean => Value::Bool(b[0] != 0),
        SemanticType::Integer => Value::Int32(i32::from_le_bytes(array(b))),
        SemanticType::Int8 => Value::Int8(i8::from_le_bytes(array(b))),
        SemanticType::Int16 => Value::Int16(i16::from_le_bytes(array(b))),
        SemanticType::Int64 => Value::Int64(i64::from_le_bytes(array(b))),
        SemanticType::UInt8 => Value::UInt8(b[0]),
        SemanticType::UInt16 => Value::UInt16(u16::from_le_bytes(array(b))),
        SemanticType::UInt32 => Value::UInt32(u32::from_le_bytes(array(b))),
        SemanticType::UInt64 => Value::UInt64(u64::from_le_bytes(array(b))),
        SemanticType::Double => Value::Float64(f64::from_le_bytes(array(b))),
        SemanticType::String => return decode_string(bytes),
    };
    Ok(value)
}

/// Strings are not byte-swapped; trailing NUL padding is dropped.
fn decode_string(bytes: &[u8]) -> Result<Value, CodecError> {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    std::str::from_utf8(&bytes[..end])
        .map(|s| Value::String(s.to_string()))
        .map_err(|_| CodecError::InvalidUtf8)
}

/// Encodes a value as a device payload of `semantic` type.
///
/// Numeric values are converted to the target type when they fit.
pub fn encode_scalar(value: &Value, semantic: SemanticType, order: ByteOrder) -> Result<Vec<u8>, CodecError> {
    let native = match coerce(value, semantic)? {
        Value::String(s) => return Ok(s.into_bytes()),
        Value::Float32(v) => v.to_le_bytes().to_vec(),
        Value::Bool(v) => vec![u8::from(v)],
        Value::Int32(v) => v.to_le_bytes().to_vec(),
        Value::Int8(v) => v.to_le_bytes().to_vec(),
        Value::Int16(v) => v.to_le_bytes().to_vec(),
        Value::Int64(v) => v.to_le_bytes().to_vec(),
        Value::UInt8(v) => vec![v],
        Value::UInt16(v) => v.to_le_bytes().to_vec(),
        Value::UInt32(v) => v.to_le_bytes().to_vec(),
        Value::UInt64(v) => v.to_le_bytes().to_vec(),
        Value::Float64(v) => v.to_le_bytes().to_vec(),
        other => return Err(CodecError::mismatch(semantic.as_str(), other.type_name())),
    };
    Ok(normalize(&native, order))
}

/// Converts `value` into the variant matching `semantic`.
///
/// # Errors
///
/// [`CodecError::TypeMismatch`] if the value cannot be represented.
pub fn coerce(value: &Value, semantic: SemanticType) -> Result<Value, CodecError> {
    let mismatch = || CodecError::mismatch(semantic.as_str(), value.type_name());
    let int = |v: &Value| v.as_i64().filter(|_| !matches!(v, Value::Float32(_) | Value::Float64(_)));

    let coerced = match semantic {
        SemanticType::Float => Value::Float32(value.as_f64().ok_or_else(mismatch)? as f32),
        SemanticType::Double => Value::Float64(value.as_f64().ok_or_else(mismatch)?),
        SemanticType::Boolean => match value {
            Value::Bool(v) => Value::Bool(*v),
            other => Value::Bool(int(other).ok_or_else(mismatch)? != 0),
        },
        SemanticType::String => Value::String(value.as_str().ok_or_else(mismatch)?.to_string()),
        SemanticType::Integer => Value::Int32(narrow(int(value), mismatch)?),
        SemanticType::Int8 => Value::Int8(narrow(int(value), mismatch)?),
        SemanticType::Int16 => Value::Int16(narrow(int(value), mismatch)?),
        SemanticType::Int64 => Value::Int64(int(value).ok_or_else(mismatch)?),
        SemanticType::UInt8 => Value::UInt8(narrow(int(value), mismatch)?),
        SemanticType::UInt16 => Value::UInt16(narrow(int(value), mismatch)?),
        SemanticType::UInt32 => Value::UInt32(narrow(int(value), mismatch)?),
        SemanticType::UInt64 => match value {
            Value::UInt64(v) => Value::UInt64(*v),
            other => Value::UInt64(narrow(int(other), mismatch)?),
        },
    };
    Ok(coerced)
}

fn narrow<T: TryFrom<i64>>(
    value: Option<i64>,
    mismatch: impl Fn() -> CodecError,
) -> Result<T, CodecError> {
    value
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(mismatch)
}

fn normalize(bytes: &[u8], order: ByteOrder) -> Vec<u8> {
    match order {
        ByteOrder::Native => bytes.to_vec(),
        ByteOrder::Swapped => bytes.iter().rev().copied().collect(),
    }
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

// =============================================================================
// Structured Types
// =============================================================================

/// Decodes every field of a structured body, in descriptor order.
pub fn decode_structure(
    body: &[u8],
    descriptor: &StructuredTypeDescriptor,
) -> Result<Vec<(String, Value)>, CodecError> {
    let mut cursor = 0usize;
    let mut fields = Vec::with_capacity(descriptor.fields.len());

    for field in &descriptor.fields {
        let rest = &body[cursor.min(body.len())..];
        let (value, used) = match &field.kind {
            FieldKind::Float => (Value::Float32(f32::from_le_bytes(take(rest)?)), 4),
            FieldKind::Int32 => (Value::Int32(i32::from_le_bytes(take(rest)?)), 4),
            FieldKind::Boolean => {
                let [b] = take::<1>(rest)?;
                (Value::Bool(b != 0), 1)
            }
            FieldKind::String => {
                let len = i32::from_le_bytes(take(rest)?);
                if len < 0 {
                    (Value::String(String::new()), 4)
                } else {
                    let len = len as usize;
                    if rest.len() < 4 + len {
                        return Err(CodecError::insufficient(4 + len, rest.len()));
                    }
                    let s = std::str::from_utf8(&rest[4..4 + len]).map_err(|_| CodecError::InvalidUtf8)?;
                    (Value::String(s.to_string()), 4 + len)
                }
            }
            FieldKind::Unsupported(kind) => {
                return Err(CodecError::UnsupportedFieldKind {
                    field: field.name.clone(),
                    kind: kind.clone(),
                })
            }
        };
        cursor += used;
        fields.push((field.name.clone(), value));
    }

    Ok(fields)
}

/// Encodes field values, one per descriptor field, into a structured body.
pub fn encode_structure(
    values: &[Value],
    descriptor: &StructuredTypeDescriptor,
) -> Result<Vec<u8>, CodecError> {
    if values.len() != descriptor.fields.len() {
        return Err(CodecError::mismatch(
            format!("{} fields", descriptor.fields.len()),
            format!("{} values", values.len()),
        ));
    }

    let mut body = Vec::new();
    for (field, value) in descriptor.fields.iter().zip(values) {
        match &field.kind {
            FieldKind::Float => {
                let v = coerce(value, SemanticType::Float)?;
                body.extend_from_slice(&encode_scalar(&v, SemanticType::Float, ByteOrder::Native)?);
            }
            FieldKind::Int32 => {
                body.extend_from_slice(&encode_scalar(value, SemanticType::Integer, ByteOrder::Native)?);
            }
            FieldKind::Boolean => {
                body.extend_from_slice(&encode_scalar(value, SemanticType::Boolean, ByteOrder::Native)?);
            }
            FieldKind::String => {
                let s = encode_scalar(value, SemanticType::String, ByteOrder::Native)?;
                let len = i32::try_from(s.len()).map_err(|_| CodecError::mismatch("string", "oversized string"))?;
                body.extend_from_slice(&len.to_le_bytes());
                body.extend_from_slice(&s);
            }
            FieldKind::Unsupported(kind) => {
                return Err(CodecError::UnsupportedFieldKind {
                    field: field.name.clone(),
                    kind: kind.clone(),
                })
            }
        }
    }
    Ok(body)
}

/// Returns the body of a structured instance with every field at its default.
pub fn default_structure(descriptor: &StructuredTypeDescriptor) -> Result<Vec<u8>, CodecError> {
    let defaults: Vec<Value> = descriptor
        .fields
        .iter()
        .map(|f| match f.kind {
            FieldKind::Float => Value::Float32(0.0),
            FieldKind::Boolean => Value::Bool(false),
            FieldKind::Int32 => Value::Int32(0),
            FieldKind::String => Value::String(String::new()),
            FieldKind::Unsupported(_) => Value::Null,
        })
        .collect();
    encode_structure(&defaults, descriptor)
}

/// Decodes the single field `field` of a structured body.
pub fn decode_structured_field(
    body: &[u8],
    descriptor: &StructuredTypeDescriptor,
    field: &str,
) -> Result<Value, CodecError> {
    ensure_field(descriptor, field)?;
    decode_structure(body, descriptor)?
        .into_iter()
        .find(|(name, _)| name == field)
        .map(|(_, value)| value)
        .ok_or_else(|| unknown_field(descriptor, field))
}

/// Replaces the single field `field` of a structured body.
///
/// The full body is decoded, the one field overwritten and the full body
/// re-encoded, so every other field keeps its last value.
pub fn encode_structured_field(
    body: &[u8],
    descriptor: &StructuredTypeDescriptor,
    field: &str,
    value: &Value,
) -> Result<Vec<u8>, CodecError> {
    ensure_field(descriptor, field)?;
    let values: Vec<Value> = decode_structure(body, descriptor)?
        .into_iter()
        .map(|(name, old)| if name == field { value.clone() } else { old })
        .collect();
    encode_structure(&values, descriptor)
}

fn ensure_field(descriptor: &StructuredTypeDescriptor, field: &str) -> Result<(), CodecError> {
    descriptor
        .field(field)
        .map(|_| ())
        .ok_or_else(|| unknown_field(descriptor, field))
}

fn unknown_field(descriptor: &StructuredTypeDescriptor, field: &str) -> CodecError {
    CodecError::UnknownField {
        type_name: descriptor.name.clone(),
        field: field.to_string(),
    }
}

fn take<const N: usize>(bytes: &[u8]) -> Result<[u8; N], CodecError> {
    if bytes.len() < N {
        return Err(CodecError::insufficient(N, bytes.len()));
    }
    Ok(array(bytes))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pump_state() -> StructuredTypeDescriptor {
        StructuredTypeDescriptor::new("PumpState")
            .with_field("speed", FieldKind::Float)
            .with_field("running", FieldKind::Boolean)
            .with_field("starts", FieldKind::Int32)
            .with_field("label", FieldKind::String)
    }

    #[test]
    fn test_scalar_round_trip_both_orders() {
        let cases = [
            (Value::Float32(-17.25), SemanticType::Float),
            (Value::Bool(true), SemanticType::Boolean),
            (Value::Bool(false), SemanticType::Boolean),
            (Value::Int32(-123_456), SemanticType::Integer),
            (Value::String("pump 1".into()), SemanticType::String),
        ];
        for order in [ByteOrder::Native, ByteOrder::Swapped] {
            for (value, semantic) in &cases {
                let bytes = encode_scalar(value, *semantic, order).unwrap();
                assert_eq!(&decode_scalar(&bytes, *semantic, order).unwrap(), value);
            }
        }
    }

    #[test]
    fn test_generic_subtypes_round_trip() {
        let cases = [
            (Value::Int8(-5), SemanticType::Int8),
            (Value::Int16(-300), SemanticType::Int16),
            (Value::Int64(-9_000_000_000), SemanticType::Int64),
            (Value::UInt8(250), SemanticType::UInt8),
            (Value::UInt16(65_000), SemanticType::UInt16),
            (Value::UInt32(4_000_000_000), SemanticType::UInt32),
            (Value::UInt64(18_000_000_000_000_000_000), SemanticType::UInt64),
            (Value::Float64(std::f64::consts::PI), SemanticType::Double),
        ];
        for (value, semantic) in &cases {
            let bytes = encode_scalar(value, *semantic, ByteOrder::Native).unwrap();
            assert_eq!(bytes.len(), semantic.byte_width().unwrap());
            assert_eq!(&decode_scalar(&bytes, *semantic, ByteOrder::Native).unwrap(), value);
        }
    }

    #[test]
    fn test_modbus_float_is_byte_swapped() {
        // 12.5f32 == 0x41480000, registers arrive as 0x4148 0x0000
        let wire = [0x41, 0x48, 0x00, 0x00];
        assert_eq!(
            decode_scalar(&wire, SemanticType::Float, ByteOrder::Swapped).unwrap(),
            Value::Float32(12.5)
        );
        // Native order reads the same bytes as a denormal, not 12.5
        assert_ne!(
            decode_scalar(&wire, SemanticType::Float, ByteOrder::Native).unwrap(),
            Value::Float32(12.5)
        );
        assert_eq!(
            decode_scalar(&[0x00, 0x00, 0x48, 0x41], SemanticType::Float, ByteOrder::Native).unwrap(),
            Value::Float32(12.5)
        );
    }

    #[test]
    fn test_string_is_never_swapped() {
        let bytes = encode_scalar(&Value::from("AB"), SemanticType::String, ByteOrder::Swapped).unwrap();
        assert_eq!(bytes, b"AB");
        assert_eq!(
            decode_scalar(b"AB\0\0", SemanticType::String, ByteOrder::Swapped).unwrap(),
            Value::from("AB")
        );
    }

    #[test]
    fn test_decode_insufficient_data() {
        assert_eq!(
            decode_scalar(&[0x01, 0x02], SemanticType::Float, ByteOrder::Native),
            Err(CodecError::insufficient(4, 2))
        );
        assert!(decode_scalar(&[0xff, 0xfe], SemanticType::String, ByteOrder::Native).is_err());
    }

    #[test]
    fn test_encode_coerces_numeric_values() {
        let bytes = encode_scalar(&Value::Int32(3), SemanticType::Float, ByteOrder::Native).unwrap();
        assert_eq!(bytes, 3.0f32.to_le_bytes());

        let bytes = encode_scalar(&Value::Int64(7), SemanticType::Integer, ByteOrder::Native).unwrap();
        assert_eq!(bytes, 7i32.to_le_bytes());

        assert!(encode_scalar(&Value::Int64(i64::MAX), SemanticType::Integer, ByteOrder::Native).is_err());
        assert!(encode_scalar(&Value::Float32(1.5), SemanticType::Integer, ByteOrder::Native).is_err());
        assert!(encode_scalar(&Value::from("1"), SemanticType::Float, ByteOrder::Native).is_err());
        assert!(encode_scalar(&Value::Null, SemanticType::Boolean, ByteOrder::Native).is_err());
    }

    #[test]
    fn test_structured_field_round_trip_preserves_others() {
        let descriptor = pump_state();
        let body = encode_structure(
            &[
                Value::Float32(1450.0),
                Value::Bool(true),
                Value::Int32(12),
                Value::from("P-101"),
            ],
            &descriptor,
        )
        .unwrap();

        let updated =
            encode_structured_field(&body, &descriptor, "starts", &Value::Int32(13)).unwrap();
        assert_eq!(
            decode_structured_field(&updated, &descriptor, "starts").unwrap(),
            Value::Int32(13)
        );
        assert_eq!(
            decode_structured_field(&updated, &descriptor, "speed").unwrap(),
            Value::Float32(1450.0)
        );
        assert_eq!(
            decode_structured_field(&updated, &descriptor, "running").unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            decode_structured_field(&updated, &descriptor, "label").unwrap(),
            Value::from("P-101")
        );

        let relabeled =
            encode_structured_field(&updated, &descriptor, "label", &Value::from("P-101 spare")).unwrap();
        assert_eq!(
            decode_structured_field(&relabeled, &descriptor, "label").unwrap(),
            Value::from("P-101 spare")
        );
        assert_eq!(
            decode_structured_field(&relabeled, &descriptor, "starts").unwrap(),
            Value::Int32(13)
        );
    }

    #[test]
    fn test_default_structure() {
        let descriptor = pump_state();
        let body = default_structure(&descriptor).unwrap();
        // 4 + 1 + 4 + (4 + 0)
        assert_eq!(body.len(), 13);
        let fields = decode_structure(&body, &descriptor).unwrap();
        assert_eq!(fields[0], ("speed".to_string(), Value::Float32(0.0)));
        assert_eq!(fields[3], ("label".to_string(), Value::String(String::new())));
    }

    #[test]
    fn test_null_string_field_decodes_empty() {
        let descriptor = StructuredTypeDescriptor::new("Tagged").with_field("name", FieldKind::String);
        let body = (-1i32).to_le_bytes();
        assert_eq!(
            decode_structured_field(&body, &descriptor, "name").unwrap(),
            Value::String(String::new())
        );
    }

    #[test]
    fn test_unknown_field_kind_is_fatal() {
        let descriptor = StructuredTypeDescriptor::new("Odd")
            .with_field("speed", FieldKind::Float)
            .with_field("when", FieldKind::Unsupported("DateTime".into()));
        let body = 1.0f32.to_le_bytes();

        assert!(matches!(
            decode_structured_field(&body, &descriptor, "speed"),
            Err(CodecError::UnsupportedFieldKind { .. })
        ));
        assert!(matches!(
            encode_structured_field(&body, &descriptor, "speed", &Value::Float32(2.0)),
            Err(CodecError::UnsupportedFieldKind { .. })
        ));
        assert!(matches!(
            default_structure(&descriptor),
            Err(CodecError::UnsupportedFieldKind { .. })
        ));
    }

    #[test]
    fn test_unknown_field_name() {
        let descriptor = pump_state();
        let body = default_structure(&descriptor).unwrap();
        assert!(matches!(
            encode_structured_field(&body, &descriptor, "torque", &Value::Float32(1.0)),
            Err(CodecError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_truncated_body() {
        let descriptor = pump_state();
        assert!(matches!(
            decode_structure(&[0, 0, 0x80, 0x3f, 1], &descriptor),
            Err(CodecError::InsufficientData { .. })
        ));
    }
}
