// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Polling and write-through behavior, on a paused clock.

use std::time::Duration;

use uagate_core::status::StatusCode;
use uagate_core::types::Value;
use uagate_tests::prelude::*;

const ONE_SECOND: Duration = Duration::from_secs(1);

/// A Modbus asset with a single float tag at register 0.
fn single_tag(name: &str, polling_ms: Option<u64>) -> String {
    let mut pressure = PropertyBuilder::holding_register(0, 2).float();
    if let Some(interval) = polling_ms {
        pressure = pressure.polling_ms(interval);
    }
    DescriptionBuilder::new(name).property("pressure", pressure).build()
}

#[tokio::test(start_paused = true)]
async fn test_poll_updates_value_and_timestamp() {
    let gateway = TestGateway::new();
    gateway.device.set_payload("0", PayloadFixtures::modbus_f32(12.5));
    let asset = gateway
        .service
        .configure_asset(Some(&single_tag("pump-01", None)))
        .await
        .unwrap();
    let pressure = asset.variable("pressure");

    tokio::time::sleep(ONE_POLL).await;

    let (value, timestamp) = gateway.service.read_variable(&pressure).unwrap();
    assert_eq!(value, Value::Float32(12.5));
    let first = timestamp.expect("polled value carries a timestamp");

    gateway.device.set_payload("0", PayloadFixtures::modbus_f32(-3.25));
    tokio::time::sleep(ONE_SECOND).await;

    let (value, timestamp) = gateway.service.read_variable(&pressure).unwrap();
    assert_float(&value, -3.25);
    assert!(timestamp.unwrap() >= first);

    let metrics = gateway.service.manager().asset_info(&asset).unwrap().metrics;
    assert_eq!(metrics.polls, 2);
    assert_eq!(metrics.poll_failures, 0);
    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_polling_interval_is_respected() {
    let gateway = TestGateway::new();
    gateway.device.set_payload("0", PayloadFixtures::modbus_f32(1.0));
    gateway
        .service
        .configure_asset(Some(&single_tag("pump-01", Some(2000))))
        .await
        .unwrap();

    tokio::time::sleep(ONE_POLL).await;
    assert_eq!(gateway.device.reads_of("0"), 0);

    tokio::time::sleep(ONE_SECOND).await;
    assert_eq!(gateway.device.reads_of("0"), 1);

    // Ticks 3 and 4
    tokio::time::sleep(2 * ONE_SECOND).await;
    assert_eq!(gateway.device.reads_of("0"), 2);
    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_sub_second_interval_fires_once_per_tick() {
    let gateway = TestGateway::new();
    gateway.device.set_payload("0", PayloadFixtures::modbus_f32(1.0));
    gateway
        .service
        .configure_asset(Some(&single_tag("pump-01", Some(500))))
        .await
        .unwrap();

    tokio::time::sleep(ONE_POLL + 2 * ONE_SECOND).await;
    assert_eq!(gateway.device.reads_of("0"), 3);
    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_read_failure_reconnects_and_keeps_last_value() {
    let gateway = TestGateway::new();
    gateway.device.set_payload("0", PayloadFixtures::modbus_f32(12.5));
    let asset = gateway
        .service
        .configure_asset(Some(&single_tag("pump-01", None)))
        .await
        .unwrap();
    let pressure = asset.variable("pressure");

    tokio::time::sleep(ONE_POLL).await;
    let (_, polled_at) = gateway.service.read_variable(&pressure).unwrap();
    assert_eq!(gateway.device.connect_count(), 1);

    gateway.device.fail_reads(true);
    tokio::time::sleep(ONE_SECOND).await;

    let (value, timestamp) = gateway.service.read_variable(&pressure).unwrap();
    assert_eq!(value, Value::Float32(12.5));
    assert_eq!(timestamp, polled_at);
    assert_eq!(gateway.device.connect_count(), 2);
    assert_eq!(gateway.device.disconnect_count(), 1);
    let endpoints = gateway.device.endpoints();
    assert_eq!(endpoints[0], endpoints[1]);

    gateway.device.fail_reads(false);
    gateway.device.set_payload("0", PayloadFixtures::modbus_f32(13.0));
    tokio::time::sleep(ONE_SECOND).await;
    assert_eq!(
        gateway.service.read_variable(&pressure).unwrap().0,
        Value::Float32(13.0)
    );

    let metrics = gateway.service.manager().asset_info(&asset).unwrap().metrics;
    assert_eq!(metrics.poll_failures, 1);
    assert_eq!(metrics.reconnects, 1);
    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_undecodable_payload_is_discarded() {
    let gateway = TestGateway::new();
    gateway.device.set_payload("0", vec![0x41]);
    let asset = gateway
        .service
        .configure_asset(Some(&single_tag("pump-01", None)))
        .await
        .unwrap();

    tokio::time::sleep(ONE_POLL).await;

    let (value, timestamp) = gateway.service.read_variable(&asset.variable("pressure")).unwrap();
    assert_eq!(value, Value::Null);
    assert!(timestamp.is_none());
    // A short payload is not a connection problem
    assert_eq!(gateway.device.connect_count(), 1);
    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_native_payloads_for_generic_connector() {
    let gateway = TestGateway::new();
    gateway
        .device
        .set_payload("ns=2;s=Drive.Speed", PayloadFixtures::native_f64(1450.5));
    let asset = gateway
        .service
        .configure_asset(Some(&DescriptionFixtures::opcua_drive("drive-01")))
        .await
        .unwrap();

    tokio::time::sleep(ONE_POLL).await;

    assert_eq!(
        gateway.service.read_variable(&asset.variable("speed")).unwrap().0,
        Value::Float64(1450.5)
    );
    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_delete_stops_polling() {
    let gateway = TestGateway::new();
    gateway.device.set_payload("0", PayloadFixtures::modbus_f32(1.0));
    gateway
        .service
        .configure_asset(Some(&single_tag("pump-01", None)))
        .await
        .unwrap();

    tokio::time::sleep(ONE_POLL).await;
    assert_eq!(gateway.device.reads_of("0"), 1);

    gateway.service.delete_asset(Some("pump-01")).await.unwrap();
    assert_eq!(gateway.service.manager().worker_count(), 0);

    tokio::time::sleep(3 * ONE_SECOND).await;
    assert_eq!(gateway.device.reads_of("0"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reconfigure_within_one_tick_keeps_one_worker() {
    let gateway = TestGateway::new();
    gateway.device.set_payload("0", PayloadFixtures::modbus_f32(1.0));
    let description = single_tag("pump-01", Some(2000));
    gateway.service.configure_asset(Some(&description)).await.unwrap();

    tokio::time::sleep(ONE_POLL).await;
    gateway.service.delete_asset(Some("pump-01")).await.unwrap();
    let asset = gateway.service.configure_asset(Some(&description)).await.unwrap();
    assert_eq!(gateway.service.manager().worker_count(), 1);

    // Four ticks of the new worker: the 2000 ms tag fires on ticks 2 and 4
    tokio::time::sleep(4 * ONE_SECOND + Duration::from_millis(100)).await;
    assert_eq!(gateway.device.reads_of("0"), 2);
    let metrics = gateway.service.manager().asset_info(&asset).unwrap().metrics;
    assert_eq!(metrics.poll_tick, 4);
    assert_eq!(metrics.polls, 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_workers_but_keeps_assets() {
    let gateway = TestGateway::new();
    gateway.device.set_payload("0", PayloadFixtures::modbus_f32(1.0));
    gateway
        .service
        .configure_asset(Some(&single_tag("pump-01", None)))
        .await
        .unwrap();
    assert_eq!(gateway.service.manager().worker_count(), 1);

    gateway.shutdown().await;
    assert_eq!(gateway.service.manager().worker_count(), 0);
    assert_eq!(gateway.service.get_configured_assets_joined(), "pump-01");

    tokio::time::sleep(3 * ONE_SECOND).await;
    assert_eq!(gateway.device.reads_of("0"), 0);
}

// =============================================================================
// Writes
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_write_goes_to_device_then_store() {
    let gateway = TestGateway::new();
    let asset = gateway
        .service
        .configure_asset(Some(&DescriptionFixtures::modbus_pump("pump-01")))
        .await
        .unwrap();

    gateway
        .service
        .write_variable(&asset.variable("setpoint"), Value::Float64(42.0))
        .await
        .unwrap();
    gateway
        .service
        .write_variable(&asset.variable("running"), Value::Bool(true))
        .await
        .unwrap();

    let history = gateway.device.write_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].address, "10");
    assert_eq!(history[0].data, PayloadFixtures::modbus_f32(42.0));
    assert!(!history[0].is_coil);
    assert_eq!(history[1].address, "5");
    assert_eq!(history[1].data, vec![1]);
    assert!(history[1].is_coil);

    let (value, timestamp) = gateway.service.read_variable(&asset.variable("setpoint")).unwrap();
    assert_eq!(value, Value::Float32(42.0));
    assert!(timestamp.is_some());
    assert_eq!(
        gateway.service.read_variable(&asset.variable("running")).unwrap().0,
        Value::Bool(true)
    );

    let metrics = gateway.service.manager().asset_info(&asset).unwrap().metrics;
    assert_eq!(metrics.writes, 2);
    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_rejected_writes_leave_store_unchanged() {
    let gateway = TestGateway::new();
    let asset = gateway
        .service
        .configure_asset(Some(&DescriptionFixtures::modbus_pump("pump-01")))
        .await
        .unwrap();
    let setpoint = asset.variable("setpoint");

    assert_status(
        gateway
            .service
            .write_variable(&asset.variable("pressure"), Value::Float32(1.0))
            .await,
        StatusCode::BadNotWritable,
    );
    assert_status(
        gateway
            .service
            .write_variable(&setpoint, Value::String("fast".into()))
            .await,
        StatusCode::BadTypeMismatch,
    );
    assert_status(
        gateway
            .service
            .write_variable(&asset.variable("missing"), Value::Float32(1.0))
            .await,
        StatusCode::BadNotFound,
    );

    gateway.device.fail_writes(true);
    assert_status(
        gateway.service.write_variable(&setpoint, Value::Float32(5.0)).await,
        StatusCode::BadCommunicationError,
    );

    let (value, timestamp) = gateway.service.read_variable(&setpoint).unwrap();
    assert_eq!(value, Value::Null);
    assert!(timestamp.is_none());
    assert!(gateway.device.write_history().is_empty());

    let metrics = gateway.service.manager().asset_info(&asset).unwrap().metrics;
    assert_eq!(metrics.write_failures, 1);
    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_written_value_is_polled_back() {
    let gateway = TestGateway::new();
    gateway.device.set_payload("0", PayloadFixtures::modbus_f32(0.0));
    gateway.device.set_payload("5", vec![0]);
    gateway.device.set_payload("10", PayloadFixtures::modbus_f32(0.0));
    let asset = gateway
        .service
        .configure_asset(Some(&DescriptionFixtures::modbus_pump("pump-01")))
        .await
        .unwrap();

    gateway
        .service
        .write_variable(&asset.variable("setpoint"), Value::Float32(7.5))
        .await
        .unwrap();
    tokio::time::sleep(ONE_POLL).await;

    assert_eq!(
        gateway.service.read_variable(&asset.variable("setpoint")).unwrap().0,
        Value::Float32(7.5)
    );
    assert_eq!(
        gateway.service.read_variable(&asset.variable("running")).unwrap().0,
        Value::Bool(false)
    );
    gateway.shutdown().await;
}

// =============================================================================
// Change notifications
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_changes_are_published() {
    let gateway = TestGateway::new();
    let mut changes = gateway.address_space.subscribe();
    gateway.device.set_payload("0", PayloadFixtures::modbus_f32(12.5));
    let asset = gateway
        .service
        .configure_asset(Some(&single_tag("pump-01", None)))
        .await
        .unwrap();

    tokio::time::sleep(ONE_POLL).await;

    let change = changes.try_recv().expect("poll publishes a change");
    assert_eq!(change.variable_id, asset.variable("pressure"));
    assert_eq!(change.value, Value::Float32(12.5));
    assert!(changes.try_recv().is_none());
    assert_eq!(gateway.address_space.notification_count(), 1);

    let node = gateway.address_space.variable(&asset.variable("pressure")).unwrap();
    assert_eq!(node.value, Value::Float32(12.5));
    assert_eq!(node.timestamp, Some(change.timestamp));
    gateway.shutdown().await;
}
