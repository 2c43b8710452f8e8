// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Management surface exposed to consumers.
//!
//! ```text
//! ConfigureAsset(text)   → asset id    BadInvalidArgument without payload
//! DeleteAsset(id)        → ()          BadNotFound for unknown ids
//! GetConfiguredAssets()  → [id, ...]   creation order
//! read / write variable                BadNotReadable / BadNotWritable while
//!                                      provisioning, before any store access
//! ```
//!
//! Accepted descriptions are persisted through a [`DescriptionStore`] so the
//! gateway can recreate its assets at startup.

use std::io;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::address_space::ProvisioningGate;
use crate::description::ThingDescription;
use crate::error::{GatewayError, ServiceError};
use crate::lifecycle::AssetManager;
use crate::types::{AssetId, Value, VariableId};

/// Result alias using [`ServiceError`].
pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// Description Store
// =============================================================================

/// A description read back from persistent storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDescription {
    /// Where the description came from, for logging.
    pub source: String,
    /// Raw description text.
    pub text: String,
}

/// Persistent storage of accepted asset descriptions.
pub trait DescriptionStore: Send + Sync {
    /// Stores the description of a newly created asset.
    fn save(&self, asset: &AssetId, text: &str) -> io::Result<()>;

    /// Removes the description of a deleted asset. Unknown assets are ignored.
    fn remove(&self, asset: &AssetId) -> io::Result<()>;

    /// Returns every stored description.
    fn load_all(&self) -> io::Result<Vec<StoredDescription>>;
}

/// Keeps descriptions in memory only.
#[derive(Debug, Default)]
pub struct InMemoryDescriptionStore {
    entries: Mutex<IndexMap<AssetId, String>>,
}

impl InMemoryDescriptionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored description of an asset.
    pub fn get(&self, asset: &AssetId) -> Option<String> {
        self.entries.lock().get(asset).cloned()
    }

    /// Returns the number of stored descriptions.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl DescriptionStore for InMemoryDescriptionStore {
    fn save(&self, asset: &AssetId, text: &str) -> io::Result<()> {
        self.entries.lock().insert(asset.clone(), text.to_string());
        Ok(())
    }

    fn remove(&self, asset: &AssetId) -> io::Result<()> {
        self.entries.lock().shift_remove(asset);
        Ok(())
    }

    fn load_all(&self) -> io::Result<Vec<StoredDescription>> {
        Ok(self
            .entries
            .lock()
            .iter()
            .map(|(asset, text)| StoredDescription {
                source: format!("memory:{}", asset),
                text: text.clone(),
            })
            .collect())
    }
}

// =============================================================================
// Management Service
// =============================================================================

/// Consumer-facing operations of the gateway.
pub struct ManagementService {
    manager: Arc<AssetManager>,
    store: Arc<dyn DescriptionStore>,
    gate: Arc<dyn ProvisioningGate>,
}

impl ManagementService {
    /// Creates the service.
    pub fn new(
        manager: Arc<AssetManager>,
        store: Arc<dyn DescriptionStore>,
        gate: Arc<dyn ProvisioningGate>,
    ) -> Self {
        Self {
            manager,
            store,
            gate,
        }
    }

    /// Returns the asset manager.
    pub fn manager(&self) -> &Arc<AssetManager> {
        &self.manager
    }

    /// Creates an asset from a description and persists the description.
    ///
    /// # Errors
    ///
    /// [`ServiceError::InvalidArgument`] when no payload was given, otherwise
    /// the creation error.
    pub async fn configure_asset(&self, payload: Option<&str>) -> ServiceResult<AssetId> {
        let text = payload
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ServiceError::invalid_argument("description"))?;

        let td = ThingDescription::parse(text).map_err(GatewayError::from)?;
        let asset = self.manager.create_asset(&td).await?;

        if let Err(e) = self.store.save(&asset, text) {
            tracing::warn!(asset_id = %asset, error = %e, "Failed to persist description");
        }
        Ok(asset)
    }

    /// Deletes an asset and its persisted description.
    ///
    /// # Errors
    ///
    /// [`ServiceError::InvalidArgument`] without an id; `BadNotFound` for
    /// unknown assets.
    pub async fn delete_asset(&self, asset_id: Option<&str>) -> ServiceResult<()> {
        let asset = asset_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(AssetId::new)
            .ok_or_else(|| ServiceError::invalid_argument("asset_id"))?;

        self.manager.delete_asset(&asset).await?;

        if let Err(e) = self.store.remove(&asset) {
            tracing::warn!(asset_id = %asset, error = %e, "Failed to remove persisted description");
        }
        Ok(())
    }

    /// Returns the configured asset ids in creation order.
    pub fn get_configured_assets(&self) -> Vec<AssetId> {
        self.manager.list_assets()
    }

    /// Returns the configured asset ids as one comma-separated string.
    pub fn get_configured_assets_joined(&self) -> String {
        self.get_configured_assets()
            .iter()
            .map(AssetId::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Reads a variable.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotReadable`] in provisioning mode.
    pub fn read_variable(&self, id: &VariableId) -> ServiceResult<(Value, Option<DateTime<Utc>>)> {
        if self.gate.is_active() {
            return Err(ServiceError::NotReadable {
                variable_id: id.to_string(),
            });
        }
        Ok(self.manager.read_variable(id)?)
    }

    /// Writes a variable through to its device.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotWritable`] in provisioning mode.
    pub async fn write_variable(&self, id: &VariableId, value: Value) -> ServiceResult<()> {
        if self.gate.is_active() {
            return Err(ServiceError::NotWritable {
                variable_id: id.to_string(),
            });
        }
        Ok(self.manager.write_variable(id, value).await?)
    }

    /// Recreates every stored asset. Returns the number of assets created.
    ///
    /// Descriptions that fail to load are logged and skipped.
    pub async fn restore(&self) -> usize {
        let stored = match self.store.load_all() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read stored descriptions");
                return 0;
            }
        };

        let mut created = 0;
        for description in stored {
            let result = match ThingDescription::parse(&description.text) {
                Ok(td) => self.manager.create_asset(&td).await,
                Err(e) => Err(e.into()),
            };
            match result {
                Ok(asset) => {
                    tracing::info!(asset_id = %asset, source = %description.source, "Asset restored");
                    created += 1;
                }
                Err(e) => {
                    tracing::error!(source = %description.source, error = %e, "Skipping stored description");
                }
            }
        }
        created
    }
}

impl std::fmt::Debug for ManagementService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagementService")
            .field("manager", &self.manager)
            .field("provisioning", &self.gate.is_active())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_space::{InMemoryAddressSpace, StaticProvisioningGate};
    use crate::connector::ConnectorRegistry;
    use crate::registry::Registry;
    use crate::status::StatusCode;
    use crate::testing::{Script, ScriptedFactory};
    use crate::types::ConnectorKind;

    fn description(name: &str) -> String {
        format!(
            r#"{{
                "name": "{}",
                "base": "modbus+tcp://10.0.0.5:502/1",
                "properties": {{
                    "level": {{
                        "readOnly": false,
                        "forms": [{{
                            "href": "?address=4&quantity=2",
                            "modv:type": "xsd:float",
                            "modv:entity": "HoldingRegister"
                        }}]
                    }}
                }}
            }}"#,
            name
        )
    }

    fn service() -> (ManagementService, Arc<InMemoryDescriptionStore>, StaticProvisioningGate) {
        let script = Script::with_payload(vec![]);
        let mut connectors = ConnectorRegistry::new();
        connectors.register(Box::new(ScriptedFactory {
            kind: ConnectorKind::Modbus,
            script,
        }));
        let registry = Arc::new(Registry::new(Arc::new(InMemoryAddressSpace::new())));
        let manager = Arc::new(AssetManager::new(registry, Arc::new(connectors)));
        let store = Arc::new(InMemoryDescriptionStore::new());
        let gate = StaticProvisioningGate::new(false);
        let service = ManagementService::new(manager, store.clone(), Arc::new(gate.clone()));
        (service, store, gate)
    }

    #[tokio::test]
    async fn test_configure_requires_payload() {
        let (service, store, _gate) = service();
        for payload in [None, Some(""), Some("   ")] {
            let err = service.configure_asset(payload).await.unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BadInvalidArgument);
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_configure_list_delete() {
        let (service, store, _gate) = service();
        let a = service.configure_asset(Some(&description("tank-a"))).await.unwrap();
        let b = service.configure_asset(Some(&description("tank-b"))).await.unwrap();

        assert_eq!(service.get_configured_assets(), vec![a.clone(), b.clone()]);
        assert_eq!(service.get_configured_assets_joined(), "tank-a,tank-b");
        assert_eq!(store.len(), 2);

        service.delete_asset(Some("tank-a")).await.unwrap();
        assert_eq!(service.get_configured_assets(), vec![b]);
        assert!(store.get(&a).is_none());
    }

    #[tokio::test]
    async fn test_delete_unknown_asset() {
        let (service, store, _gate) = service();
        service.configure_asset(Some(&description("tank-a"))).await.unwrap();

        let err = service.delete_asset(Some("unknown-id")).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BadNotFound);
        assert_eq!(service.get_configured_assets_joined(), "tank-a");
        assert_eq!(store.len(), 1);

        let err = service.delete_asset(None).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BadInvalidArgument);
    }

    #[tokio::test]
    async fn test_provisioning_gate() {
        let (service, _store, gate) = service();
        let asset = service.configure_asset(Some(&description("tank-a"))).await.unwrap();
        let level = asset.variable("level");

        gate.set_active(true);
        let err = service.read_variable(&level).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BadNotReadable);
        let err = service.write_variable(&level, Value::Float32(1.0)).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BadNotWritable);

        // Gate is checked before lookup
        let err = service.read_variable(&VariableId::new("nope/x")).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BadNotReadable);

        gate.set_active(false);
        service.write_variable(&level, Value::Float32(1.0)).await.unwrap();
        assert_eq!(service.read_variable(&level).unwrap().0, Value::Float32(1.0));
    }

    #[tokio::test]
    async fn test_restore_skips_bad_descriptions() {
        let (service, store, _gate) = service();
        store.save(&AssetId::new("tank-a"), &description("tank-a")).unwrap();
        store.save(&AssetId::new("broken"), "{ not json").unwrap();
        store
            .save(&AssetId::new("bad-base"), &description("bad").replace("10.0.0.5:502/1", "10.0.0.5"))
            .unwrap();

        assert_eq!(service.restore().await, 1);
        assert_eq!(service.get_configured_assets_joined(), "tank-a");
    }
}
