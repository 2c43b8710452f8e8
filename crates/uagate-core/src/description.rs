// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Asset descriptions (W3C WoT Thing Descriptions).
//!
//! A description declares one asset: its base address and a map of properties,
//! each bound to the device through one or more forms.
//!
//! ```text
//! {
//!   "@context": ["https://www.w3.org/2022/wot/td/v1.1", ...],
//!   "name": "pump-01",
//!   "title": "Feed Pump",
//!   "base": "modbus+tcp://10.0.0.5:502/1",
//!   "properties": {
//!     "pressure": {
//!       "readOnly": true,
//!       "forms": [{
//!         "href": "?address=40001&quantity=2",
//!         "op": ["readproperty", "observeproperty"],
//!         "modv:type": "xsd:float",
//!         "modv:entity": "HoldingRegister",
//!         "modv:pollingTime": 1000,
//!         "opcua:type": "nsu=http://opcfoundation.org/UA/;i=10"
//!       }]
//!     }
//!   }
//! }
//! ```
//!
//! Property order is preserved; it is the registration order of the tags.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::DescriptionError;
use crate::types::{AssetId, SemanticType};

/// Context marker of DTDL interface documents, which are not accepted.
pub const DTDL_CONTEXT: &str = "dtmi:dtdl:context;2";

/// Namespace URI of the built-in OPC UA types.
pub const UA_NAMESPACE: &str = "http://opcfoundation.org/UA/";

/// Polling interval used when a form does not declare one.
pub const DEFAULT_POLLING_MS: u64 = 1000;

// =============================================================================
// Thing Description
// =============================================================================

/// A parsed asset description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThingDescription {
    /// JSON-LD context.
    #[serde(rename = "@context", default)]
    pub context: serde_json::Value,

    /// Optional URN of the thing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Machine name; becomes the asset id.
    #[serde(default)]
    pub name: String,

    /// Human-readable title.
    #[serde(default)]
    pub title: String,

    /// Base address of the device.
    #[serde(default)]
    pub base: String,

    /// Existing object node the asset should be placed at.
    #[serde(rename = "opcua:objectNode", default, skip_serializing_if = "Option::is_none")]
    pub object_node: Option<String>,

    /// Parent node of a newly created asset object.
    #[serde(rename = "opcua:parentNode", default, skip_serializing_if = "Option::is_none")]
    pub parent_node: Option<String>,

    /// Type definition of a newly created asset object.
    #[serde(rename = "opcua:objectType", default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,

    /// Declared properties, in document order.
    #[serde(default)]
    pub properties: IndexMap<String, Property>,
}

impl ThingDescription {
    /// Parses and checks a description document.
    ///
    /// # Errors
    ///
    /// - [`DescriptionError::UnsupportedFormat`] for DTDL documents
    /// - [`DescriptionError::Json`] for malformed JSON
    /// - [`DescriptionError::MissingField`] if `base` or both `name` and
    ///   `title` are empty
    pub fn parse(text: &str) -> Result<Self, DescriptionError> {
        let raw: serde_json::Value = serde_json::from_str(text)?;
        if is_dtdl(raw.get("@context")) {
            return Err(DescriptionError::UnsupportedFormat {
                format: "DTDL".to_string(),
            });
        }

        let td: ThingDescription = serde_json::from_value(raw)?;
        if td.base.trim().is_empty() {
            return Err(DescriptionError::missing_field("base"));
        }
        if td.name.trim().is_empty() && td.title.trim().is_empty() {
            return Err(DescriptionError::missing_field("name"));
        }
        Ok(td)
    }

    /// Returns the asset id: `name`, or `title` when `name` is empty.
    pub fn asset_id(&self) -> AssetId {
        if self.name.trim().is_empty() {
            AssetId::new(self.title.trim())
        } else {
            AssetId::new(self.name.trim())
        }
    }

    /// Returns the display name, `"{title} [{name}]"`.
    pub fn display_name(&self) -> String {
        format!("{} [{}]", self.title, self.name)
    }

    /// Returns the namespace URI of the asset's nodes.
    pub fn namespace_uri(&self) -> String {
        format!("{}{}/", UA_NAMESPACE, self.asset_id())
    }
}

fn is_dtdl(context: Option<&serde_json::Value>) -> bool {
    match context {
        Some(serde_json::Value::String(s)) => s.starts_with("dtmi:dtdl:"),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .any(|item| item.as_str().is_some_and(|s| s.starts_with("dtmi:dtdl:"))),
        _ => false,
    }
}

// =============================================================================
// Property
// =============================================================================

/// One declared property of an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// JSON schema type (`number`, `boolean`, `integer`, `string`, `object`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,

    /// Read-only marker. Absent means read-only.
    #[serde(rename = "readOnly", default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,

    /// Observable marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observable: Option<bool>,

    /// Protocol bindings.
    #[serde(default)]
    pub forms: Vec<Form>,
}

impl Property {
    /// Returns `true` if the description explicitly allows writes.
    pub fn is_writable(&self) -> bool {
        self.read_only == Some(false)
            || self
                .forms
                .iter()
                .any(|f| f.ops().iter().any(|op| op.eq_ignore_ascii_case("writeproperty")))
    }

    /// Returns the semantic type implied by the JSON schema type.
    pub fn schema_semantic(&self) -> Option<SemanticType> {
        match self.schema_type.as_deref()? {
            "number" => Some(SemanticType::Float),
            "integer" => Some(SemanticType::Integer),
            "boolean" => Some(SemanticType::Boolean),
            "string" => Some(SemanticType::String),
            _ => None,
        }
    }
}

// =============================================================================
// Form
// =============================================================================

/// One protocol binding of a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    /// Device address, absolute or relative to the base.
    pub href: String,

    /// Operation types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<OneOrMany>,

    /// Protocol binding value type (`xsd:float`, `REAL`, ...).
    #[serde(
        rename = "modv:type",
        alias = "modbus:type",
        alias = "type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub binding_type: Option<String>,

    /// Protocol sub-addressing (`HoldingRegister`, `Coil`, CIP type, ...).
    #[serde(
        rename = "modv:entity",
        alias = "modbus:entity",
        alias = "entity",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub entity: Option<String>,

    /// Polling interval in milliseconds.
    #[serde(
        rename = "modv:pollingTime",
        alias = "modbus:pollingTime",
        alias = "pollingTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub polling_time: Option<serde_json::Value>,

    /// Address-space data type, `nsu=<uri>;i=<n>`.
    #[serde(rename = "opcua:type", default, skip_serializing_if = "Option::is_none")]
    pub opcua_type: Option<String>,

    /// Field of a structured data type this form fills.
    #[serde(rename = "opcua:fieldPath", default, skip_serializing_if = "Option::is_none")]
    pub field_path: Option<String>,
}

impl Form {
    /// Returns the declared operations.
    pub fn ops(&self) -> Vec<&str> {
        match &self.op {
            Some(OneOrMany::One(op)) => vec![op.as_str()],
            Some(OneOrMany::Many(ops)) => ops.iter().map(String::as_str).collect(),
            None => Vec::new(),
        }
    }

    /// Returns the entity, empty if not declared.
    pub fn entity(&self) -> &str {
        self.entity.as_deref().unwrap_or("")
    }

    /// Returns the field path, if the form fills one structured field.
    pub fn field_path(&self) -> Option<&str> {
        self.field_path.as_deref().filter(|f| !f.is_empty())
    }

    /// Returns the polling interval in milliseconds.
    ///
    /// Accepts numbers and numeric strings; absent means 1000 ms.
    ///
    /// # Errors
    ///
    /// [`DescriptionError::InvalidProperty`] for zero, negative or non-numeric
    /// values.
    pub fn polling_interval_ms(&self, property: &str) -> Result<u64, DescriptionError> {
        let invalid = |v: &serde_json::Value| {
            DescriptionError::invalid_property(property, format!("invalid polling time {}", v))
        };
        let interval = match &self.polling_time {
            None | Some(serde_json::Value::Null) => return Ok(DEFAULT_POLLING_MS),
            Some(v @ serde_json::Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
                .ok_or_else(|| invalid(v))?,
            Some(v @ serde_json::Value::String(s)) => s.trim().parse::<u64>().map_err(|_| invalid(v))?,
            Some(v) => return Err(invalid(v)),
        };
        if interval == 0 {
            return Err(DescriptionError::invalid_property(property, "polling time must be > 0"));
        }
        Ok(interval)
    }

    /// Returns the semantic type named by the binding type.
    ///
    /// `Ok(None)` when the form does not declare one.
    ///
    /// # Errors
    ///
    /// [`DescriptionError::InvalidProperty`] for an unknown type name.
    pub fn binding_semantic(&self, property: &str) -> Result<Option<SemanticType>, DescriptionError> {
        match self.binding_type.as_deref() {
            None => Ok(None),
            Some(name) => name.parse::<SemanticType>().map(Some).map_err(|name| {
                DescriptionError::invalid_property(property, format!("unsupported type '{}'", name))
            }),
        }
    }

    /// Returns the parsed `opcua:type` reference, if well formed.
    pub fn type_ref(&self) -> Option<TypeRef> {
        self.opcua_type.as_deref().and_then(TypeRef::parse)
    }
}

/// A JSON value that may be a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    /// A single string.
    One(String),
    /// An array of strings.
    Many(Vec<String>),
}

// =============================================================================
// Type References
// =============================================================================

/// A numeric data type node reference, `nsu=<namespace-uri>;i=<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    /// Namespace URI.
    pub namespace_uri: String,
    /// Numeric node id within the namespace.
    pub id: u32,
}

impl TypeRef {
    /// Parses `nsu=<uri>;i=<n>`. Returns `None` for anything else.
    ///
    /// # Examples
    ///
    /// ```
    /// use uagate_core::description::TypeRef;
    ///
    /// let r = TypeRef::parse("nsu=http://opcfoundation.org/UA/;i=10").unwrap();
    /// assert_eq!(r.id, 10);
    /// assert!(TypeRef::parse("i=10").is_none());
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        let rest = s.trim().strip_prefix("nsu=")?;
        let (uri, id) = rest.rsplit_once(";i=")?;
        if uri.is_empty() {
            return None;
        }
        Some(Self {
            namespace_uri: uri.to_string(),
            id: id.parse().ok()?,
        })
    }

    /// Returns the built-in scalar type, for references into the base namespace.
    pub fn builtin(&self) -> Option<SemanticType> {
        if self.namespace_uri != UA_NAMESPACE {
            return None;
        }
        match self.id {
            1 => Some(SemanticType::Boolean),
            2 => Some(SemanticType::Int8),
            3 => Some(SemanticType::UInt8),
            4 => Some(SemanticType::Int16),
            5 => Some(SemanticType::UInt16),
            6 => Some(SemanticType::Integer),
            7 => Some(SemanticType::UInt32),
            8 => Some(SemanticType::Int64),
            9 => Some(SemanticType::UInt64),
            10 => Some(SemanticType::Float),
            11 => Some(SemanticType::Double),
            12 => Some(SemanticType::String),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
