// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-asset polling workers.
//!
//! Every asset gets one [`PollingWorker`] task driven by a coarse 1 s tick:
//!
//! ```text
//!  Running ──(asset unregistered | shutdown)──▶ Stopped
//!
//!  loop:
//!    sleep 1000 ms
//!    tick += 1
//!    asset gone or replaced?  → stop
//!    for tag in tags (registration order):
//!      (tick * 1000) % interval == 0 ?
//!        read → decode → commit (store only, fresh timestamp)
//!        read failed → log, reconnect to the last endpoint
//! ```
//!
//! Intervals are not timed individually. A tag with a 500 ms interval fires
//! once per tick, and intervals that do not divide a multiple of 1000 fire
//! only on the ticks where the product happens to be divisible.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::codec;
use crate::connector;
use crate::error::{CodecError, GatewayResult};
use crate::registry::{AssetEntry, AssetMetrics, Registry, Tag};
use crate::types::AssetId;

/// Length of one scheduler tick.
pub const TICK: Duration = Duration::from_millis(1000);

/// Returns `true` if a tag with `interval_ms` fires on `tick`.
///
/// # Examples
///
/// ```
/// use uagate_core::scheduler::fires_at;
///
/// assert!(fires_at(1, 1000));
/// assert!(fires_at(1, 500));
/// assert!(!fires_at(1, 2000));
/// assert!(fires_at(2, 2000));
/// ```
#[inline]
pub fn fires_at(tick: u64, interval_ms: u64) -> bool {
    interval_ms > 0 && tick.wrapping_mul(1000) % interval_ms == 0
}

// =============================================================================
// PollingWorker
// =============================================================================

/// The polling loop of one asset.
///
/// A worker belongs to one install of its asset. Once that install is
/// removed the worker stops, even if an asset with the same id was created
/// again in the meantime.
pub struct PollingWorker {
    asset: AssetId,
    install: Arc<AssetMetrics>,
    registry: Arc<Registry>,
    shutdown: broadcast::Receiver<()>,
}

impl PollingWorker {
    /// Creates a worker for an installed asset entry.
    pub fn new(entry: &AssetEntry, registry: Arc<Registry>, shutdown: broadcast::Receiver<()>) -> Self {
        Self {
            asset: entry.id.clone(),
            install: Arc::clone(&entry.metrics),
            registry,
            shutdown,
        }
    }

    /// The registered entry, if it is still the install this worker polls.
    fn current(&self) -> Option<AssetEntry> {
        self.registry
            .asset(&self.asset)
            .filter(|entry| Arc::ptr_eq(&entry.metrics, &self.install))
    }

    fn is_current(&self) -> bool {
        self.current().is_some()
    }

    /// Spawns the worker onto the runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until the asset is unregistered or shutdown is signalled.
    pub async fn run(mut self) {
        tracing::info!(asset_id = %self.asset, "Polling worker started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(TICK) => {}
                _ = self.shutdown.recv() => {
                    tracing::debug!(asset_id = %self.asset, "Shutdown signalled");
                    break;
                }
            }

            let Some(entry) = self.current() else {
                break;
            };
            let tick = entry.metrics.next_tick();
            let Some(tags) = self.registry.tags(&self.asset) else {
                break;
            };
            tracing::trace!(asset_id = %self.asset, tick, "Tick");

            if !self.poll_tick(&entry, &tags, tick).await {
                break;
            }
        }

        tracing::info!(asset_id = %self.asset, "Polling worker stopped");
    }

    /// Polls every tag that fires on `tick`.
    ///
    /// Returns `false` once this install is no longer registered.
    async fn poll_tick(&self, entry: &AssetEntry, tags: &[Tag], tick: u64) -> bool {
        for tag in tags.iter().filter(|t| fires_at(tick, t.polling_interval_ms)) {
            if !self.is_current() {
                return false;
            }
            self.poll_tag(entry, tag).await;
        }
        true
    }

    async fn poll_tag(&self, entry: &AssetEntry, tag: &Tag) {
        let result = {
            let mut connector = entry.connector.lock().await;
            connector.read(&tag.address).await
        };

        match result {
            Ok(bytes) => {
                entry.metrics.record_poll(true);
                // A replacement asset reuses the variable ids
                if !self.is_current() {
                    return;
                }
                if let Err(e) = commit(&self.registry, entry, tag, &bytes) {
                    tracing::warn!(
                        asset_id = %self.asset,
                        tag = %tag.name,
                        error = %e,
                        "Discarding polled value"
                    );
                }
            }
            Err(e) => {
                entry.metrics.record_poll(false);
                tracing::warn!(
                    asset_id = %self.asset,
                    tag = %tag.name,
                    address = %tag.address,
                    error = %e,
                    "Tag read failed"
                );
                self.reconnect(entry).await;
            }
        }
    }

    async fn reconnect(&self, entry: &AssetEntry) {
        let mut connector = entry.connector.lock().await;
        // A concurrent delete already disconnected this connector
        if !self.is_current() {
            return;
        }
        entry.metrics.record_reconnect();
        match connector::reconnect(&mut **connector).await {
            Ok(()) => tracing::info!(asset_id = %self.asset, "Reconnected"),
            Err(e) => tracing::error!(asset_id = %self.asset, error = %e, "Reconnect failed"),
        }
    }
}

/// Decodes a polled payload and commits it to the store.
///
/// Structured tags update only their own field of the variable's body.
pub fn commit(registry: &Registry, entry: &AssetEntry, tag: &Tag, bytes: &[u8]) -> GatewayResult<()> {
    let order = entry.base.kind.byte_order();
    let decoded = codec::decode_scalar(bytes, tag.semantic, order)?;
    let now = Utc::now();

    if let Some(field) = &tag.field_path {
        return registry.write_structured_field(&tag.variable_id, field, &decoded, now);
    }

    let variable = registry.variable(&tag.variable_id).ok_or_else(|| {
        crate::error::RegistryError::variable_not_found(tag.variable_id.as_str())
    })?;
    let semantic = variable
        .data_type
        .as_scalar()
        .ok_or_else(|| CodecError::mismatch("scalar", "structured"))?;
    let value = codec::coerce(&decoded, semantic)?;
    registry.write_variable_internal(&tag.variable_id, value, now)?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{BaseAddress, DeviceAddress};
    use crate::address_space::{AssetNode, InMemoryAddressSpace};
    use crate::connector::{into_handle, ConnectorFactory};
    use crate::registry::{AssetInstall, VariableSpec};
    use crate::testing::{Script, ScriptedFactory};
    use crate::types::{ConnectorKind, DataTypeDescriptor, SemanticType, Value, VariableId};
    use std::sync::atomic::Ordering;

    fn tag(name: &str, interval: u64) -> Tag {
        Tag {
            name: name.to_string(),
            address: DeviceAddress {
                address: "0".into(),
                unit_id: 1,
                entity: "holdingregister".into(),
                quantity: 2,
            },
            semantic: SemanticType::Float,
            polling_interval_ms: interval,
            variable_id: AssetId::new("pump").variable(name),
            field_path: None,
        }
    }

    async fn install(registry: &Registry, script: Arc<Script>, tags: Vec<Tag>) -> AssetEntry {
        let base = BaseAddress::parse("modbus+tcp://10.0.0.5:502/1").unwrap();
        let factory = ScriptedFactory {
            kind: ConnectorKind::Modbus,
            script,
        };
        let mut connector = factory.create(&base).unwrap();
        connector.connect(&base.host, base.port).await.unwrap();

        let asset = AssetId::new("pump");
        let variables = tags
            .iter()
            .map(|t| VariableSpec {
                id: t.variable_id.clone(),
                data_type: DataTypeDescriptor::scalar(SemanticType::Float),
                writable: false,
            })
            .collect();
        registry
            .install_asset(AssetInstall {
                node: AssetNode {
                    id: asset.clone(),
                    display_name: "Pump [pump]".into(),
                    namespace_uri: String::new(),
                    object_node: None,
                    parent_node: None,
                    object_type: None,
                },
                entry: AssetEntry::new(asset.clone(), "Pump [pump]", base, into_handle(connector)),
                variables,
                tags,
            })
            .unwrap();
        registry.asset(&asset).unwrap()
    }

    fn registry() -> Arc<Registry> {
        Arc::new(Registry::new(Arc::new(InMemoryAddressSpace::new())))
    }

    #[test]
    fn test_fires_at() {
        for tick in 1..=10 {
            assert!(fires_at(tick, 1000));
            assert!(fires_at(tick, 500));
            assert!(fires_at(tick, 250));
            assert_eq!(fires_at(tick, 2000), tick % 2 == 0);
            assert_eq!(fires_at(tick, 5000), tick % 5 == 0);
        }
        // 1000 * tick divisible by 300 only when tick is a multiple of 3
        assert!(!fires_at(1, 300));
        assert!(!fires_at(2, 300));
        assert!(fires_at(3, 300));
        assert!(fires_at(3, 1500));
        assert!(!fires_at(2, 1500));
        assert!(!fires_at(1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_tick_reads_once_and_stores_swapped_float() {
        let registry = registry();
        let script = Script::with_payload(vec![0x41, 0x48, 0x00, 0x00]);
        let entry = install(&registry, script.clone(), vec![tag("pressure", 1000)]).await;

        let (_tx, rx) = broadcast::channel(1);
        let worker = PollingWorker::new(&entry, registry.clone(), rx).spawn();

        let id = VariableId::new("pump/pressure");
        assert_eq!(registry.read_variable(&id).unwrap().1, None);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(script.reads(), 1);
        let (value, timestamp) = registry.read_variable(&id).unwrap();
        assert_eq!(value, Value::Float32(12.5));
        assert!(timestamp.is_some());

        worker.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_intervals_follow_coarse_tick() {
        let registry = registry();
        let script = Script::with_payload(vec![0x41, 0x48, 0x00, 0x00]);
        let entry = install(
            &registry,
            script.clone(),
            vec![tag("fast", 500), tag("slow", 2000)],
        )
        .await;

        let (_tx, rx) = broadcast::channel(1);
        let worker = PollingWorker::new(&entry, registry.clone(), rx).spawn();

        // Ticks 1..=4: "fast" fires 4 times, "slow" on ticks 2 and 4
        tokio::time::sleep(Duration::from_millis(4500)).await;
        assert_eq!(script.reads(), 6);
        assert_eq!(registry.asset(&AssetId::new("pump")).unwrap().metrics.tick(), 4);

        worker.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_reconnects_and_keeps_last_value() {
        let registry = registry();
        let script = Script::with_payload(vec![0x41, 0x48, 0x00, 0x00]);
        let entry = install(&registry, script.clone(), vec![tag("pressure", 1000)]).await;

        let (_tx, rx) = broadcast::channel(1);
        let worker = PollingWorker::new(&entry, registry.clone(), rx).spawn();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let id = VariableId::new("pump/pressure");
        let good = registry.read_variable(&id).unwrap();

        script.fail_reads.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2000)).await;

        // Two failed ticks, each followed by disconnect + connect
        assert_eq!(script.reads(), 3);
        assert_eq!(script.connects(), 3);
        assert_eq!(script.disconnects(), 2);
        assert_eq!(registry.read_variable(&id).unwrap(), good);

        let metrics = registry.asset(&AssetId::new("pump")).unwrap().metrics.snapshot();
        assert_eq!(metrics.poll_failures, 2);
        assert_eq!(metrics.reconnects, 2);

        // The worker survives and recovers
        script.fail_reads.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(script.reads(), 4);
        assert!(!worker.is_finished());
        worker.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_stops_after_asset_removed() {
        let registry = registry();
        let script = Script::with_payload(vec![0x41, 0x48, 0x00, 0x00]);
        let entry = install(&registry, script.clone(), vec![tag("pressure", 1000)]).await;

        let (_tx, rx) = broadcast::channel(1);
        let worker = PollingWorker::new(&entry, registry.clone(), rx).spawn();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        registry.remove_asset(&AssetId::new("pump")).unwrap();

        tokio::time::timeout(TICK * 2, worker).await.unwrap().unwrap();
        assert_eq!(script.reads(), 1);
        assert_eq!(registry.variable_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_stops_when_asset_is_replaced() {
        let registry = registry();
        let old_script = Script::with_payload(vec![0x41, 0x48, 0x00, 0x00]);
        let old = install(&registry, old_script.clone(), vec![tag("pressure", 1000)]).await;

        let (_tx, rx) = broadcast::channel(1);
        let worker = PollingWorker::new(&old, registry.clone(), rx).spawn();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        registry.remove_asset(&AssetId::new("pump")).unwrap();
        let new_script = Script::with_payload(vec![0x41, 0x48, 0x00, 0x00]);
        let new = install(&registry, new_script.clone(), vec![tag("pressure", 1000)]).await;

        // Same id, different install: the old worker must not poll it
        tokio::time::timeout(TICK * 2, worker).await.unwrap().unwrap();
        assert_eq!(old_script.reads(), 1);
        assert_eq!(new_script.reads(), 0);
        assert_eq!(new.metrics.tick(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_stops_on_shutdown() {
        let registry = registry();
        let entry = install(&registry, Script::with_payload(vec![0; 4]), vec![tag("pressure", 1000)]).await;

        let (tx, rx) = broadcast::channel(1);
        let worker = PollingWorker::new(&entry, registry.clone(), rx).spawn();
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_millis(10), worker)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_commit_rejects_undecodable_payload() {
        let registry = registry();
        let entry = install(&registry, Script::with_payload(vec![]), vec![tag("pressure", 1000)]).await;

        let result = commit(&registry, &entry, &tag("pressure", 1000), &[0x01]);
        assert!(result.is_err());
        assert!(registry
            .read_variable(&VariableId::new("pump/pressure"))
            .unwrap()
            .0
            .is_null());
    }
}
