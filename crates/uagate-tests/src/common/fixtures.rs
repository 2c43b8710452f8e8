// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Ready-made Thing Descriptions, device payloads and configuration files.

use std::time::Duration;

use crate::common::builders::{DescriptionBuilder, PropertyBuilder};

/// Long enough for exactly one scheduler tick to fire.
pub const ONE_POLL: Duration = Duration::from_millis(1500);

// =============================================================================
// Description Fixtures
// =============================================================================

/// Fixture providing standard asset descriptions.
pub struct DescriptionFixtures;

impl DescriptionFixtures {
    /// Base address of [`modbus_pump`](Self::modbus_pump).
    pub const PUMP_BASE: &'static str = "modbus+tcp://10.0.0.5:502/1";

    /// A Modbus pump: read-only `pressure` at register 0, writable `setpoint`
    /// at register 10 and a writable `running` coil at 5.
    pub fn modbus_pump(name: &str) -> String {
        DescriptionBuilder::new(name)
            .title("Feed Pump")
            .base(Self::PUMP_BASE)
            .property("pressure", PropertyBuilder::holding_register(0, 2).float())
            .property(
                "setpoint",
                PropertyBuilder::holding_register(10, 2).float().writable(),
            )
            .property("running", PropertyBuilder::coil(5).writable())
            .build()
    }

    /// An OPC UA drive with one writable double `speed`.
    pub fn opcua_drive(name: &str) -> String {
        DescriptionBuilder::new(name)
            .title("Conveyor Drive")
            .base("opc.tcp://10.0.0.9:4840")
            .property(
                "speed",
                PropertyBuilder::node("ns=2;s=Drive.Speed")
                    .binding_type("xsd:double")
                    .writable(),
            )
            .build()
    }

    /// A Siemens S7 asset with one `temperature` REAL.
    pub fn siemens_oven(name: &str) -> String {
        DescriptionBuilder::new(name)
            .title("Oven")
            .base("s7://10.0.0.7:102/0/1")
            .property(
                "temperature",
                PropertyBuilder::node("DB1.DBD0").binding_type("xsd:float"),
            )
            .build()
    }

    /// A description with only a title.
    pub fn titled_only(title: &str) -> String {
        DescriptionBuilder::new("")
            .title(title)
            .base(Self::PUMP_BASE)
            .property("pressure", PropertyBuilder::holding_register(0, 2).float())
            .build()
    }

    /// A Digital Twins Definition Language document.
    pub fn dtdl() -> String {
        serde_json::json!({
            "@context": "dtmi:dtdl:context;2",
            "@id": "dtmi:com:example:Pump;1",
            "@type": "Interface",
            "displayName": "Pump",
            "contents": []
        })
        .to_string()
    }
}

// =============================================================================
// Payload Fixtures
// =============================================================================

/// Device payloads in the byte order each connector hands over.
pub struct PayloadFixtures;

impl PayloadFixtures {
    /// A float as two Modbus registers (big-endian words).
    pub fn modbus_f32(value: f32) -> Vec<u8> {
        value.to_be_bytes().to_vec()
    }

    /// A float in native (little-endian) order.
    pub fn native_f32(value: f32) -> Vec<u8> {
        value.to_le_bytes().to_vec()
    }

    /// A double in native (little-endian) order.
    pub fn native_f64(value: f64) -> Vec<u8> {
        value.to_le_bytes().to_vec()
    }

    /// A float as Modbus register words.
    pub fn registers_f32(value: f32) -> [u16; 2] {
        let bits = value.to_bits();
        [(bits >> 16) as u16, bits as u16]
    }
}

// =============================================================================
// Config Fixtures
// =============================================================================

/// Fixture providing configuration file contents.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// A complete YAML configuration.
    pub fn full_yaml() -> &'static str {
        r#"
gateway:
  name: line-4
  settings_dir: ./state/settings
  trust_dir: ./pki/trusted
logging:
  level: debug
  format: json
connectors:
  connect_timeout_ms: 2000
  operation_timeout_ms: 1000
  bacnet_local_port: 47809
  ads_source_port: 32906
"#
    }

    /// The same configuration in TOML.
    pub fn full_toml() -> &'static str {
        r#"
[gateway]
name = "line-4"
settings_dir = "./state/settings"
trust_dir = "./pki/trusted"

[logging]
level = "debug"
format = "json"

[connectors]
connect_timeout_ms = 2000
operation_timeout_ms = 1000
bacnet_local_port = 47809
ads_source_port = 32906
"#
    }

    /// A YAML configuration with an unknown key.
    pub fn unknown_key_yaml() -> &'static str {
        "gateway:\n  name: line-4\n  default_namespace: urn:x\n"
    }
}
