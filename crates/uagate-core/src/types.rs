// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core data types for uagate.
//!
//! This module provides the protocol-agnostic data model shared by the codec,
//! the connectors and the asset registry: identifiers, the [`Value`] enum,
//! semantic tag types and the data type descriptors of address-space variables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

// =============================================================================
// Identifiers
// =============================================================================

/// A unique identifier for an asset.
///
/// Asset IDs are derived from the description name and stay stable across
/// restarts of the gateway.
///
/// # Examples
///
/// ```
/// use uagate_core::types::AssetId;
///
/// let id = AssetId::new("pump-01");
/// assert_eq!(id.as_str(), "pump-01");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Creates a new asset ID.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the ID and returns the inner string.
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns the ID of the variable `name` namespaced under this asset.
    pub fn variable(&self, name: &str) -> VariableId {
        VariableId(format!("{}{}{}", self.0, VariableId::SEPARATOR, name))
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for AssetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A globally unique identifier for an address-space variable.
///
/// Variable IDs are namespaced under their asset (`"<asset>/<property>"`),
/// which is what makes them unique across all assets.
///
/// # Examples
///
/// ```
/// use uagate_core::types::{AssetId, VariableId};
///
/// let id = AssetId::new("pump-01").variable("pressure");
/// assert_eq!(id.as_str(), "pump-01/pressure");
/// assert!(id.belongs_to(&AssetId::new("pump-01")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableId(String);

impl VariableId {
    /// Separator between the asset part and the variable name.
    pub const SEPARATOR: char = '/';

    /// Creates a new variable ID from a raw string.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this variable is namespaced under `asset`.
    pub fn belongs_to(&self, asset: &AssetId) -> bool {
        self.0
            .strip_prefix(asset.as_str())
            .is_some_and(|rest| rest.starts_with(Self::SEPARATOR))
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VariableId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VariableId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for VariableId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Value Types
// =============================================================================

/// A protocol-agnostic data value.
///
/// Scalars cover every built-in type a connector can produce. A structured
/// variable carries its encoded body in [`Value::Structured`].
///
/// # Examples
///
/// ```
/// use uagate_core::types::Value;
///
/// let temp = Value::Float32(25.5);
/// assert_eq!(temp.as_f64(), Some(25.5));
///
/// let status = Value::Bool(true);
/// assert_eq!(status.as_bool(), Some(true));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// Boolean value
    Bool(bool),

    /// Signed 8-bit integer
    Int8(i8),

    /// Signed 16-bit integer
    Int16(i16),

    /// Signed 32-bit integer
    Int32(i32),

    /// Signed 64-bit integer
    Int64(i64),

    /// Unsigned 8-bit integer
    UInt8(u8),

    /// Unsigned 16-bit integer
    UInt16(u16),

    /// Unsigned 32-bit integer
    UInt32(u32),

    /// Unsigned 64-bit integer
    UInt64(u64),

    /// 32-bit floating point
    Float32(f32),

    /// 64-bit floating point
    Float64(f64),

    /// UTF-8 string
    String(String),

    /// Encoded body of a structured type instance
    Structured(Vec<u8>),

    /// No value has been received yet
    #[default]
    Null,
}

impl Value {
    /// Returns the type name of this value.
    ///
    /// # Examples
    ///
    /// ```
    /// use uagate_core::types::Value;
    ///
    /// assert_eq!(Value::Float32(1.0).type_name(), "float32");
    /// assert_eq!(Value::Bool(true).type_name(), "bool");
    /// ```
    #[inline]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int8(_) => "int8",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::UInt8(_) => "uint8",
            Value::UInt16(_) => "uint16",
            Value::UInt32(_) => "uint32",
            Value::UInt64(_) => "uint64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
            Value::Structured(_) => "structured",
            Value::Null => "null",
        }
    }

    /// Returns `true` if this is a null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Attempts to convert this value to a boolean.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempts to convert this value to an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Int8(v) => Some(i64::from(*v)),
            Value::Int16(v) => Some(i64::from(*v)),
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            Value::UInt8(v) => Some(i64::from(*v)),
            Value::UInt16(v) => Some(i64::from(*v)),
            Value::UInt32(v) => Some(i64::from(*v)),
            Value::UInt64(v) => i64::try_from(*v).ok(),
            Value::Float32(v) => Some(*v as i64),
            Value::Float64(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Attempts to convert this value to an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Value::Int8(v) => Some(f64::from(*v)),
            Value::Int16(v) => Some(f64::from(*v)),
            Value::Int32(v) => Some(f64::from(*v)),
            Value::Int64(v) => Some(*v as f64),
            Value::UInt8(v) => Some(f64::from(*v)),
            Value::UInt16(v) => Some(f64::from(*v)),
            Value::UInt32(v) => Some(f64::from(*v)),
            Value::UInt64(v) => Some(*v as f64),
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempts to get this value as a string reference.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Attempts to get the encoded body of a structured value.
    #[inline]
    pub fn as_structured(&self) -> Option<&[u8]> {
        match self {
            Value::Structured(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int8(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt8(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Structured(v) => write!(f, "<structured, {} bytes>", v.len()),
            Value::Null => write!(f, "null"),
        }
    }
}

macro_rules! impl_from_for_value {
    ($variant:ident, $type:ty) => {
        impl From<$type> for Value {
            fn from(v: $type) -> Self {
                Value::$variant(v)
            }
        }
    };
}

impl_from_for_value!(Bool, bool);
impl_from_for_value!(Int8, i8);
impl_from_for_value!(Int16, i16);
impl_from_for_value!(Int32, i32);
impl_from_for_value!(Int64, i64);
impl_from_for_value!(UInt8, u8);
impl_from_for_value!(UInt16, u16);
impl_from_for_value!(UInt32, u32);
impl_from_for_value!(UInt64, u64);
impl_from_for_value!(Float32, f32);
impl_from_for_value!(Float64, f64);
impl_from_for_value!(String, String);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

// =============================================================================
// Semantic Types
// =============================================================================

/// The semantic type of a tag, i.e. how its raw device bytes are interpreted.
///
/// The four base types are available on every connector. The remaining
/// numeric subtypes are only produced by the generic fieldbus connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    /// 32-bit IEEE 754 float.
    Float,
    /// Boolean.
    Boolean,
    /// 32-bit signed integer.
    Integer,
    /// UTF-8 string.
    String,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 64-bit signed integer.
    Int64,
    /// 8-bit unsigned integer.
    UInt8,
    /// 16-bit unsigned integer.
    UInt16,
    /// 32-bit unsigned integer.
    UInt32,
    /// 64-bit unsigned integer.
    UInt64,
    /// 64-bit IEEE 754 float.
    Double,
}

impl SemanticType {
    /// Returns the canonical name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Float => "float",
            SemanticType::Boolean => "boolean",
            SemanticType::Integer => "integer",
            SemanticType::String => "string",
            SemanticType::Int8 => "int8",
            SemanticType::Int16 => "int16",
            SemanticType::Int64 => "int64",
            SemanticType::UInt8 => "uint8",
            SemanticType::UInt16 => "uint16",
            SemanticType::UInt32 => "uint32",
            SemanticType::UInt64 => "uint64",
            SemanticType::Double => "double",
        }
    }

    /// Returns the encoded width in bytes, or `None` for variable-length strings.
    pub fn byte_width(&self) -> Option<usize> {
        match self {
            SemanticType::Boolean | SemanticType::Int8 | SemanticType::UInt8 => Some(1),
            SemanticType::Int16 | SemanticType::UInt16 => Some(2),
            SemanticType::Float | SemanticType::Integer | SemanticType::UInt32 => Some(4),
            SemanticType::Int64 | SemanticType::UInt64 | SemanticType::Double => Some(8),
            SemanticType::String => None,
        }
    }

    /// Returns `true` for the numeric subtypes reserved to the generic connector.
    pub fn is_generic_only(&self) -> bool {
        !matches!(
            self,
            SemanticType::Float | SemanticType::Boolean | SemanticType::Integer | SemanticType::String
        )
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SemanticType {
    type Err = String;

    /// Parses the protocol binding type names used in descriptions,
    /// with or without an `xsd:` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("xsd:").unwrap_or(&lower);
        match name {
            "float" | "real" | "number" => Ok(SemanticType::Float),
            "boolean" | "bool" => Ok(SemanticType::Boolean),
            "integer" | "int" | "int32" | "dint" => Ok(SemanticType::Integer),
            "string" => Ok(SemanticType::String),
            "int8" | "byte" | "sbyte" | "sint" => Ok(SemanticType::Int8),
            "int16" | "short" => Ok(SemanticType::Int16),
            "int64" | "long" | "lint" => Ok(SemanticType::Int64),
            "uint8" | "unsignedbyte" | "usint" => Ok(SemanticType::UInt8),
            "uint16" | "unsignedshort" | "uint" | "word" => Ok(SemanticType::UInt16),
            "uint32" | "unsignedint" | "udint" | "dword" => Ok(SemanticType::UInt32),
            "uint64" | "unsignedlong" | "ulint" => Ok(SemanticType::UInt64),
            "double" | "lreal" => Ok(SemanticType::Double),
            _ => Err(s.to_string()),
        }
    }
}

// =============================================================================
// Structured Types
// =============================================================================

/// The built-in kind of one structured-type field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// 32-bit float.
    Float,
    /// Boolean, one byte.
    Boolean,
    /// 32-bit signed integer.
    Int32,
    /// Length-prefixed UTF-8 string.
    String,
    /// A kind the codec cannot encode. Kept so the failure surfaces on use.
    Unsupported(String),
}

impl FieldKind {
    /// Returns the semantic type a field of this kind decodes to.
    pub fn semantic_type(&self) -> Option<SemanticType> {
        match self {
            FieldKind::Float => Some(SemanticType::Float),
            FieldKind::Boolean => Some(SemanticType::Boolean),
            FieldKind::Int32 => Some(SemanticType::Integer),
            FieldKind::String => Some(SemanticType::String),
            FieldKind::Unsupported(_) => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Float => write!(f, "float32"),
            FieldKind::Boolean => write!(f, "bool"),
            FieldKind::Int32 => write!(f, "int32"),
            FieldKind::String => write!(f, "string"),
            FieldKind::Unsupported(name) => write!(f, "{}", name),
        }
    }
}

/// One named field of a structured type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredField {
    /// Field name.
    pub name: String,
    /// Built-in kind of the field.
    pub kind: FieldKind,
}

impl StructuredField {
    /// Creates a new field.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered field list describing how a structured body is encoded.
///
/// # Examples
///
/// ```
/// use uagate_core::types::{FieldKind, StructuredTypeDescriptor};
///
/// let descriptor = StructuredTypeDescriptor::new("PumpState")
///     .with_field("speed", FieldKind::Float)
///     .with_field("running", FieldKind::Boolean);
/// assert_eq!(descriptor.fields.len(), 2);
/// assert!(descriptor.field("speed").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredTypeDescriptor {
    /// Type name, for diagnostics.
    pub name: String,
    /// Fields in encoding order.
    pub fields: Vec<StructuredField>,
}

impl StructuredTypeDescriptor {
    /// Creates an empty descriptor.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field.
    pub fn with_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(StructuredField::new(name, kind));
        self
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&StructuredField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// The data type of an address-space variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataTypeDescriptor {
    /// A built-in scalar type.
    Scalar {
        /// The scalar type.
        semantic: SemanticType,
    },
    /// A structured type with an ordered field list.
    Structured {
        /// The structured type layout.
        descriptor: StructuredTypeDescriptor,
    },
}

impl DataTypeDescriptor {
    /// Shorthand for a scalar descriptor.
    pub fn scalar(semantic: SemanticType) -> Self {
        DataTypeDescriptor::Scalar { semantic }
    }

    /// Shorthand for a structured descriptor.
    pub fn structured(descriptor: StructuredTypeDescriptor) -> Self {
        DataTypeDescriptor::Structured { descriptor }
    }

    /// Returns the structured layout, if any.
    pub fn as_structured(&self) -> Option<&StructuredTypeDescriptor> {
        match self {
            DataTypeDescriptor::Structured { descriptor } => Some(descriptor),
            DataTypeDescriptor::Scalar { .. } => None,
        }
    }

    /// Returns the scalar type, if any.
    pub fn as_scalar(&self) -> Option<SemanticType> {
        match self {
            DataTypeDescriptor::Scalar { semantic } => Some(*semantic),
            DataTypeDescriptor::Structured { .. } => None,
        }
    }
}

// =============================================================================
// Connector Kinds
// =============================================================================

/// Byte order applied by the codec on a connector's data path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Platform-native little-endian, used as-is.
    Native,
    /// Reversed relative to native before decoding and after encoding.
    Swapped,
}

/// Supported connector variants, selected once from the base address scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorKind {
    /// Modbus TCP.
    Modbus,
    /// Generic fieldbus client (OPC UA).
    Generic,
    /// Siemens S7 over ISO-on-TCP.
    Siemens,
    /// Mitsubishi MELSEC MC protocol (3E frame).
    Mitsubishi,
    /// Rockwell Logix over EtherNet/IP.
    Rockwell,
    /// Beckhoff TwinCAT ADS.
    Beckhoff,
    /// BACnet/IP.
    BacNet,
}

impl ConnectorKind {
    /// All connector kinds.
    pub const ALL: [ConnectorKind; 7] = [
        ConnectorKind::Modbus,
        ConnectorKind::Generic,
        ConnectorKind::Siemens,
        ConnectorKind::Mitsubishi,
        ConnectorKind::Rockwell,
        ConnectorKind::Beckhoff,
        ConnectorKind::BacNet,
    ];

    /// Returns the connector name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectorKind::Modbus => "modbus",
            ConnectorKind::Generic => "generic",
            ConnectorKind::Siemens => "siemens",
            ConnectorKind::Mitsubishi => "mitsubishi",
            ConnectorKind::Rockwell => "rockwell",
            ConnectorKind::Beckhoff => "beckhoff",
            ConnectorKind::BacNet => "bacnet",
        }
    }

    /// Maps a base address scheme to its connector kind.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "modbus" | "modbus+tcp" | "modbus.tcp" => Some(ConnectorKind::Modbus),
            "opc.tcp" => Some(ConnectorKind::Generic),
            "s7" => Some(ConnectorKind::Siemens),
            "mcp" | "melsec" => Some(ConnectorKind::Mitsubishi),
            "eip" | "logix" => Some(ConnectorKind::Rockwell),
            "ads" => Some(ConnectorKind::Beckhoff),
            "bacnet" => Some(ConnectorKind::BacNet),
            _ => None,
        }
    }

    /// Returns the default TCP/UDP port of the protocol.
    pub fn default_port(&self) -> u16 {
        match self {
            ConnectorKind::Modbus => 502,
            ConnectorKind::Generic => 4840,
            ConnectorKind::Siemens => 102,
            ConnectorKind::Mitsubishi => 5007,
            ConnectorKind::Rockwell => 44818,
            ConnectorKind::Beckhoff => 48898,
            ConnectorKind::BacNet => 47808,
        }
    }

    /// Returns the byte order the codec applies on this connector's data path.
    ///
    /// Only Modbus swaps; every other connector hands over native-order bytes.
    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        match self {
            ConnectorKind::Modbus => ByteOrder::Swapped,
            _ => ByteOrder::Native,
        }
    }

    /// Returns `true` if the connector produces the generic numeric subtypes.
    #[inline]
    pub fn supports_numeric_subtypes(&self) -> bool {
        matches!(self, ConnectorKind::Generic)
    }

    /// Returns the read quantity used when a tag address does not specify one.
    ///
    /// Units are protocol specific: registers for Modbus, words for
    /// Mitsubishi, bytes for Siemens and Beckhoff, elements otherwise.
    pub fn default_quantity(&self, semantic: SemanticType, entity: &str) -> u16 {
        let bytes = semantic.byte_width().unwrap_or(32);
        match self {
            ConnectorKind::Modbus => {
                let entity = entity.to_ascii_lowercase();
                if entity == "coil" || entity == "discreteinput" {
                    1
                } else {
                    bytes.div_ceil(2) as u16
                }
            }
            ConnectorKind::Mitsubishi => bytes.div_ceil(2) as u16,
            ConnectorKind::Siemens | ConnectorKind::Beckhoff => bytes as u16,
            ConnectorKind::Generic | ConnectorKind::Rockwell | ConnectorKind::BacNet => 1,
        }
    }
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_id() {
        let id = AssetId::new("boiler");
        assert_eq!(id.as_str(), "boiler");
        assert_eq!(format!("{}", id), "boiler");
    }

    #[test]
    fn test_variable_namespacing() {
        let asset = AssetId::new("boiler");
        let var = asset.variable("temperature");
        assert_eq!(var.as_str(), "boiler/temperature");
        assert!(var.belongs_to(&asset));
        assert!(!var.belongs_to(&AssetId::new("boil")));
        assert!(!var.belongs_to(&AssetId::new("boiler2")));
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::Int32(42).as_i64(), Some(42));
        assert_eq!(Value::Int32(42).as_f64(), Some(42.0));
        assert_eq!(Value::Float32(2.5).as_f64(), Some(2.5));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::String("test".into()).as_str(), Some("test"));
        assert_eq!(Value::UInt64(u64::MAX).as_i64(), None);
        assert!(Value::default().is_null());
    }

    #[test]
    fn test_value_serde_tagged() {
        let json = serde_json::to_string(&Value::Float32(1.5)).unwrap();
        assert_eq!(json, r#"{"type":"Float32","value":1.5}"#);
    }

    #[test]
    fn test_semantic_type_parsing() {
        assert_eq!("xsd:float".parse::<SemanticType>(), Ok(SemanticType::Float));
        assert_eq!("Float".parse::<SemanticType>(), Ok(SemanticType::Float));
        assert_eq!("boolean".parse::<SemanticType>(), Ok(SemanticType::Boolean));
        assert_eq!("xsd:int".parse::<SemanticType>(), Ok(SemanticType::Integer));
        assert_eq!("xsd:unsignedShort".parse::<SemanticType>(), Ok(SemanticType::UInt16));
        assert_eq!("double".parse::<SemanticType>(), Ok(SemanticType::Double));
        assert!("decimal128".parse::<SemanticType>().is_err());
    }

    #[test]
    fn test_generic_only_subtypes() {
        assert!(!SemanticType::Float.is_generic_only());
        assert!(!SemanticType::String.is_generic_only());
        assert!(SemanticType::Int16.is_generic_only());
        assert!(SemanticType::Double.is_generic_only());
    }

    #[test]
    fn test_connector_kind_from_scheme() {
        assert_eq!(ConnectorKind::from_scheme("modbus+tcp"), Some(ConnectorKind::Modbus));
        assert_eq!(ConnectorKind::from_scheme("MODBUS"), Some(ConnectorKind::Modbus));
        assert_eq!(ConnectorKind::from_scheme("opc.tcp"), Some(ConnectorKind::Generic));
        assert_eq!(ConnectorKind::from_scheme("ads"), Some(ConnectorKind::Beckhoff));
        assert_eq!(ConnectorKind::from_scheme("http"), None);
    }

    #[test]
    fn test_byte_order_only_swaps_modbus() {
        for kind in ConnectorKind::ALL {
            let expected = if kind == ConnectorKind::Modbus {
                ByteOrder::Swapped
            } else {
                ByteOrder::Native
            };
            assert_eq!(kind.byte_order(), expected, "{}", kind);
        }
    }

    #[test]
    fn test_default_quantity() {
        assert_eq!(ConnectorKind::Modbus.default_quantity(SemanticType::Float, "holdingregister"), 2);
        assert_eq!(ConnectorKind::Modbus.default_quantity(SemanticType::Boolean, "coil"), 1);
        assert_eq!(ConnectorKind::Siemens.default_quantity(SemanticType::Float, ""), 4);
        assert_eq!(ConnectorKind::Mitsubishi.default_quantity(SemanticType::Integer, ""), 2);
        assert_eq!(ConnectorKind::BacNet.default_quantity(SemanticType::Float, ""), 1);
    }
}
