// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Builders
//!
//! Builders producing Thing Description text the way a consumer would send
//! it to `ConfigureAsset`.

use serde_json::{json, Map, Value as Json};

const WOT_CONTEXT: &str = "https://www.w3.org/2022/wot/td/v1.1";

// =============================================================================
// DescriptionBuilder
// =============================================================================

/// Builder for a Thing Description document.
#[derive(Debug, Clone)]
pub struct DescriptionBuilder {
    name: String,
    title: String,
    base: String,
    properties: Map<String, Json>,
}

impl DescriptionBuilder {
    /// Creates a builder for an asset named `name` on a default Modbus base.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: String::new(),
            base: "modbus+tcp://10.0.0.5:502/1".to_string(),
            properties: Map::new(),
        }
    }

    /// Sets the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the base address.
    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    /// Adds a property.
    pub fn property(mut self, name: impl Into<String>, property: PropertyBuilder) -> Self {
        self.properties.insert(name.into(), property.build());
        self
    }

    /// Builds the document as JSON.
    pub fn build_json(self) -> Json {
        let mut doc = Map::new();
        doc.insert("@context".into(), json!([WOT_CONTEXT]));
        if !self.name.is_empty() {
            doc.insert("name".into(), Json::String(self.name));
        }
        if !self.title.is_empty() {
            doc.insert("title".into(), Json::String(self.title));
        }
        doc.insert("base".into(), Json::String(self.base));
        doc.insert("properties".into(), Json::Object(self.properties));
        Json::Object(doc)
    }

    /// Builds the document text.
    pub fn build(self) -> String {
        self.build_json().to_string()
    }
}

// =============================================================================
// PropertyBuilder
// =============================================================================

/// Builder for one property with a single form.
#[derive(Debug, Clone, Default)]
pub struct PropertyBuilder {
    read_only: Option<bool>,
    schema_type: Option<String>,
    form: Map<String, Json>,
}

impl PropertyBuilder {
    /// A property whose form points at `href`.
    pub fn node(href: impl Into<String>) -> Self {
        let mut builder = Self::default();
        builder.form.insert("href".into(), Json::String(href.into()));
        builder
    }

    /// Modbus holding registers.
    pub fn holding_register(address: u16, quantity: u16) -> Self {
        Self::node(format!("?address={}&quantity={}", address, quantity)).entity("HoldingRegister")
    }

    /// One Modbus coil, boolean.
    pub fn coil(address: u16) -> Self {
        Self::node(format!("?address={}&quantity=1", address))
            .entity("Coil")
            .binding_type("xsd:boolean")
    }

    /// Sets the binding type to `xsd:float`.
    pub fn float(self) -> Self {
        self.binding_type("xsd:float")
    }

    /// Sets the protocol binding type.
    pub fn binding_type(mut self, binding_type: &str) -> Self {
        self.form.insert("modv:type".into(), Json::String(binding_type.into()));
        self
    }

    /// Sets the protocol entity.
    pub fn entity(mut self, entity: &str) -> Self {
        self.form.insert("modv:entity".into(), Json::String(entity.into()));
        self
    }

    /// Sets the polling interval in milliseconds.
    pub fn polling_ms(mut self, interval: u64) -> Self {
        self.form.insert("modv:pollingTime".into(), json!(interval));
        self
    }

    /// Sets the JSON schema type of the property.
    pub fn schema_type(mut self, schema_type: &str) -> Self {
        self.schema_type = Some(schema_type.into());
        self
    }

    /// Marks the property writable (`readOnly: false`).
    pub fn writable(mut self) -> Self {
        self.read_only = Some(false);
        self
    }

    /// Sets the form's `op` list.
    pub fn ops(mut self, ops: &[&str]) -> Self {
        self.form.insert("op".into(), json!(ops));
        self
    }

    /// Builds the property JSON.
    pub fn build(self) -> Json {
        let mut property = Map::new();
        if let Some(schema_type) = self.schema_type {
            property.insert("type".into(), Json::String(schema_type));
        }
        if let Some(read_only) = self.read_only {
            property.insert("readOnly".into(), Json::Bool(read_only));
        }
        property.insert("forms".into(), json!([Json::Object(self.form)]));
        Json::Object(property)
    }
}

// =============================================================================
// Tests
// =============================================================================
