// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Generic connector integration tests.
//!
//! Tests that talk to a real server are ignored by default. Start any OPC UA
//! simulator with anonymous access and no security, then run:
//!
//! ```bash
//! OPCUA_TEST_ENDPOINT=opc.tcp://localhost:4840 \
//!     cargo test -p uagate-opcua --test opcua_integration -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `OPCUA_TEST_ENDPOINT`: server endpoint (default: opc.tcp://localhost:4840)
//! - `OPCUA_TEST_NAMESPACE`: namespace index of the simulation nodes (default: 2)
//! - `OPCUA_TEST_NODE`: writable Double node (default: s=Demo.Static.Scalar.Double)

use std::time::Duration;

use uagate_core::address::{BaseAddress, DeviceAddress};
use uagate_core::connector::{Connector, ConnectorFactory, ConnectorSettings};
use uagate_core::error::ConnectorError;
use uagate_core::types::ConnectorKind;
use uagate_opcua::{GenericConnector, GenericConnectorFactory};

// =============================================================================
// Test Configuration
// =============================================================================

const DEFAULT_TEST_ENDPOINT: &str = "opc.tcp://localhost:4840";
const DEFAULT_TEST_NAMESPACE: u16 = 2;
const DEFAULT_TEST_NODE: &str = "s=Demo.Static.Scalar.Double";

fn test_endpoint() -> String {
    std::env::var("OPCUA_TEST_ENDPOINT").unwrap_or_else(|_| DEFAULT_TEST_ENDPOINT.to_string())
}

fn test_node() -> String {
    let ns = std::env::var("OPCUA_TEST_NAMESPACE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_TEST_NAMESPACE);
    let node = std::env::var("OPCUA_TEST_NODE").unwrap_or_else(|_| DEFAULT_TEST_NODE.to_string());
    format!("ns={};{}", ns, node)
}

fn tag(address: &str, entity: &str) -> DeviceAddress {
    DeviceAddress {
        address: address.to_string(),
        unit_id: 0,
        entity: entity.to_string(),
        quantity: 1,
    }
}

fn settings() -> ConnectorSettings {
    ConnectorSettings {
        connect_timeout: Duration::from_secs(5),
        operation_timeout: Duration::from_secs(3),
    }
}

async fn connected() -> Box<dyn Connector> {
    let base = BaseAddress::parse(&test_endpoint()).expect("invalid OPCUA_TEST_ENDPOINT");
    let mut connector = GenericConnectorFactory::new(settings()).create(&base).unwrap();
    connector
        .connect(&base.host, base.port)
        .await
        .expect("Failed to connect to OPC UA server");
    connector
}

// =============================================================================
// Without a server
// =============================================================================

#[test]
fn test_factory_kind() {
    let factory = GenericConnectorFactory::default();
    assert_eq!(factory.kind(), ConnectorKind::Generic);
}

#[tokio::test]
async fn test_connect_refused() {
    // Nothing listens on port 1.
    let mut connector = GenericConnector::new(settings(), "");
    let err = connector.connect("127.0.0.1", 1).await.unwrap_err();
    assert_eq!(err.error_type(), "connection");
    assert!(!connector.is_connected());
}

#[tokio::test]
async fn test_write_requires_session() {
    let mut connector = GenericConnector::new(settings(), "");
    let err = connector
        .write(&tag("ns=2;s=Speed", "Double"), &1.5f64.to_le_bytes(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectorError::NotConnected));
}

// =============================================================================
// Real server
// =============================================================================

#[tokio::test]
#[ignore = "Requires OPC UA simulator"]
async fn test_real_server_connection() {
    let mut connector = connected().await;
    assert!(connector.is_connected());
    assert!(connector.remote_endpoint().is_some());
    connector.disconnect().await.expect("Failed to disconnect");
    assert!(!connector.is_connected());
}

#[tokio::test]
#[ignore = "Requires OPC UA simulator"]
async fn test_real_server_read_server_status() {
    let mut connector = connected().await;
    // Server_ServerStatus_State is an Int32 enumeration.
    let payload = connector.read(&tag("i=2259", "")).await.expect("Failed to read");
    assert_eq!(payload.len(), 4);
    connector.disconnect().await.unwrap();
}

#[tokio::test]
#[ignore = "Requires OPC UA simulator"]
async fn test_real_server_write_read_back() {
    let mut connector = connected().await;
    let address = tag(&test_node(), "Double");

    connector
        .write(&address, &42.25f64.to_le_bytes(), false)
        .await
        .expect("Failed to write");
    let payload = connector.read(&address).await.expect("Failed to read");
    let value = f64::from_le_bytes(payload.as_slice().try_into().unwrap());
    assert!((value - 42.25).abs() < f64::EPSILON);

    connector.disconnect().await.unwrap();
}

#[tokio::test]
#[ignore = "Requires OPC UA simulator"]
async fn test_real_server_unknown_node() {
    let mut connector = connected().await;
    let err = connector.read(&tag("ns=2;s=Does.Not.Exist", "")).await.unwrap_err();
    assert_eq!(err.error_type(), "device_read");
    connector.disconnect().await.unwrap();
}
