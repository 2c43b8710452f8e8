// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Asset lifecycle management.
//!
//! The [`AssetManager`] turns descriptions into running assets and back:
//!
//! ```text
//! create_asset(td)
//!   ├─ parse base address         → InvalidAddressFormat / UnsupportedScheme
//!   ├─ create connector (factory) → by ConnectorKind
//!   ├─ plan variables and tags    → addresses validated, types resolved
//!   ├─ connect                    → failure aborts, nothing registered
//!   ├─ install (one lock)         → nodes + variables + tags, all or nothing
//!   └─ spawn PollingWorker
//!
//! delete_asset(id)
//!   ├─ remove (one lock)          → worker of this install stops
//!   └─ disconnect                 → errors logged, never block removal
//! ```
//!
//! Consumer writes go to the device first and are committed to the store only
//! when the device accepted them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::address::{BaseAddress, DeviceAddress};
use crate::address_space::{resolve_data_type, AssetNode};
use crate::codec;
use crate::connector::{into_handle, Connector, ConnectorRegistry};
use crate::description::ThingDescription;
use crate::error::{CodecError, DescriptionError, GatewayResult, RegistryError};
use crate::registry::{AssetEntry, AssetInstall, AssetMetricsSnapshot, Registry, Tag, VariableSpec};
use crate::scheduler::PollingWorker;
use crate::types::{AssetId, ConnectorKind, DataTypeDescriptor, Value, VariableId};

/// Diagnostic view of one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Asset id.
    pub id: AssetId,
    /// Display name.
    pub display_name: String,
    /// Base address as configured.
    pub base: String,
    /// Connector variant.
    pub kind: ConnectorKind,
    /// Number of tags.
    pub tag_count: usize,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Counters.
    pub metrics: AssetMetricsSnapshot,
}

// =============================================================================
// AssetManager
// =============================================================================

/// Creates, deletes and serves assets.
pub struct AssetManager {
    registry: Arc<Registry>,
    connectors: Arc<ConnectorRegistry>,
    workers: DashMap<AssetId, JoinHandle<()>>,
    shutdown: broadcast::Sender<()>,
}

impl AssetManager {
    /// Creates a manager over `registry` using the given connector factories.
    pub fn new(registry: Arc<Registry>, connectors: Arc<ConnectorRegistry>) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            registry,
            connectors,
            workers: DashMap::new(),
            shutdown,
        }
    }

    /// Returns the registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    // =========================================================================
    // Create / Delete
    // =========================================================================

    /// Creates an asset from its description and starts polling it.
    ///
    /// # Errors
    ///
    /// Any address, description, codec or connection error aborts the
    /// creation; the asset is then not registered and its connector closed.
    pub async fn create_asset(&self, td: &ThingDescription) -> GatewayResult<AssetId> {
        let asset = td.asset_id();
        if self.registry.contains_asset(&asset) {
            return Err(RegistryError::AssetExists {
                asset_id: asset.to_string(),
            }
            .into());
        }

        let base = BaseAddress::parse(&td.base)?;
        let mut connector = self.connectors.create(&base)?;
        let (variables, tags) = self.plan(td, &base, connector.as_ref())?;

        connector.connect(&base.host, base.port).await?;
        tracing::debug!(asset_id = %asset, endpoint = %base.endpoint(), "Connected");

        let handle = into_handle(connector);
        let entry = AssetEntry::new(asset.clone(), td.display_name(), base, handle.clone());
        let worker = PollingWorker::new(&entry, self.registry.clone(), self.shutdown.subscribe());
        let install = AssetInstall {
            entry,
            node: AssetNode::from_description(td),
            variables,
            tags,
        };
        let tag_count = install.tags.len();
        if let Err(e) = self.registry.install_asset(install) {
            if let Err(disconnect) = handle.lock().await.disconnect().await {
                tracing::debug!(asset_id = %asset, error = %disconnect, "Disconnect after failed install");
            }
            return Err(e);
        }

        if let Some(stale) = self.workers.insert(asset.clone(), worker.spawn()) {
            stale.abort();
        }

        tracing::info!(asset_id = %asset, tags = tag_count, "Asset created");
        Ok(asset)
    }

    /// Deletes an asset.
    ///
    /// The in-memory state is removed first; a failing disconnect is logged.
    ///
    /// # Errors
    ///
    /// [`RegistryError::AssetNotFound`] for unknown ids, with the registry
    /// unchanged.
    pub async fn delete_asset(&self, id: &AssetId) -> GatewayResult<()> {
        let entry = self
            .registry
            .remove_asset(id)
            .ok_or_else(|| RegistryError::asset_not_found(id.as_str()))?;

        if let Some((_, worker)) = self.workers.remove(id) {
            worker.abort();
        }

        if let Err(e) = entry.connector.lock().await.disconnect().await {
            tracing::warn!(asset_id = %id, error = %e, "Disconnect failed during delete");
        }
        tracing::info!(asset_id = %id, "Asset deleted");
        Ok(())
    }

    /// Builds the variables and tags of a description.
    fn plan(
        &self,
        td: &ThingDescription,
        base: &BaseAddress,
        connector: &dyn Connector,
    ) -> GatewayResult<(Vec<VariableSpec>, Vec<Tag>)> {
        let asset = td.asset_id();
        let space = self.registry.address_space();
        let mut variables: Vec<VariableSpec> = Vec::new();
        let mut tags = Vec::new();

        for (key, property) in &td.properties {
            if property.forms.is_empty() {
                tracing::warn!(asset_id = %asset, property = %key, "Property has no forms, skipped");
                continue;
            }
            let variable_id = asset.variable(key);

            for form in &property.forms {
                let binding = form.binding_semantic(key)?;
                let data_type = match variables.iter().find(|v| v.id == variable_id) {
                    Some(existing) => existing.data_type.clone(),
                    None => {
                        let data_type = resolve_data_type(space.as_ref(), property, form, binding);
                        variables.push(VariableSpec {
                            id: variable_id.clone(),
                            data_type: data_type.clone(),
                            writable: property.is_writable(),
                        });
                        data_type
                    }
                };

                let semantic = match (form.field_path(), &data_type) {
                    (None, DataTypeDescriptor::Scalar { semantic }) => binding.unwrap_or(*semantic),
                    (Some(field), DataTypeDescriptor::Structured { descriptor }) => {
                        let kind = descriptor
                            .field(field)
                            .map(|f| f.kind.clone())
                            .ok_or_else(|| CodecError::UnknownField {
                                type_name: descriptor.name.clone(),
                                field: field.to_string(),
                            })?;
                        let field_semantic = kind.semantic_type().ok_or_else(|| {
                            CodecError::UnsupportedFieldKind {
                                field: field.to_string(),
                                kind: kind.to_string(),
                            }
                        })?;
                        binding.unwrap_or(field_semantic)
                    }
                    (Some(_), DataTypeDescriptor::Scalar { .. }) => {
                        return Err(DescriptionError::invalid_property(
                            key,
                            "opcua:fieldPath requires a structured opcua:type",
                        )
                        .into());
                    }
                    (None, DataTypeDescriptor::Structured { .. }) => {
                        return Err(DescriptionError::invalid_property(
                            key,
                            "structured opcua:type requires opcua:fieldPath",
                        )
                        .into());
                    }
                };
                if semantic.is_generic_only() && !base.kind.supports_numeric_subtypes() {
                    return Err(CodecError::unsupported_type(format!(
                        "{} on {} connector",
                        semantic, base.kind
                    ))
                    .into());
                }

                let address = DeviceAddress::from_href(&form.href, base, form.entity(), semantic)?;
                connector.validate_address(&address)?;

                let name = match form.field_path() {
                    Some(field) => format!("{}_{}", key, field),
                    None => key.clone(),
                };
                tags.push(Tag {
                    name,
                    address,
                    semantic,
                    polling_interval_ms: form.polling_interval_ms(key)?,
                    variable_id: variable_id.clone(),
                    field_path: form.field_path().map(str::to_string),
                });
            }
        }

        Ok((variables, tags))
    }

    // =========================================================================
    // Consumer Reads & Writes
    // =========================================================================

    /// Returns the last stored value and timestamp of a variable.
    pub fn read_variable(&self, id: &VariableId) -> GatewayResult<(Value, Option<DateTime<Utc>>)> {
        Ok(self.registry.read_variable(id)?)
    }

    /// Writes a value to the device and, on success, to the store.
    ///
    /// Structured values are written field by field through the tags bound
    /// to each field; the store is only updated when every field was
    /// accepted.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotWritable`] for read-only variables, codec errors
    /// for values that do not fit the data type, and the device error of a
    /// rejected write. The stored value and timestamp are then unchanged.
    pub async fn write_variable(&self, id: &VariableId, value: Value) -> GatewayResult<()> {
        let target = self.registry.write_target(id)?;
        if target.tags.is_empty() {
            return Err(RegistryError::NotWritable {
                variable_id: id.to_string(),
            }
            .into());
        }

        let (committed, writes) = match &target.variable.data_type {
            DataTypeDescriptor::Scalar { semantic } => {
                let coerced = codec::coerce(&value, *semantic)?;
                let tag = &target.tags[0];
                (coerced.clone(), vec![(tag, coerced)])
            }
            DataTypeDescriptor::Structured { descriptor } => {
                let body = value
                    .as_structured()
                    .ok_or_else(|| CodecError::mismatch("structured", value.type_name()))?;
                let fields = codec::decode_structure(body, descriptor)?;
                let writes = target
                    .tags
                    .iter()
                    .filter_map(|tag| {
                        let field = tag.field_path.as_deref()?;
                        fields
                            .iter()
                            .find(|(name, _)| name == field)
                            .map(|(_, v)| (tag, v.clone()))
                    })
                    .collect();
                (value.clone(), writes)
            }
        };

        let result = {
            let mut connector = target.connector.lock().await;
            let order = connector.kind().byte_order();
            let mut result = Ok(());
            for (tag, field_value) in &writes {
                let bytes = codec::encode_scalar(field_value, tag.semantic, order)?;
                if let Err(e) = connector.write(&tag.address, &bytes, tag.address.is_coil()).await {
                    result = Err(e);
                    break;
                }
            }
            result
        };

        target.metrics.record_write(result.is_ok());
        if let Err(e) = result {
            tracing::warn!(variable_id = %id, error = %e, "Device write failed");
            return Err(e.into());
        }

        self.registry.write_variable_internal(id, committed, Utc::now())?;
        tracing::debug!(variable_id = %id, "Variable written");
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Returns all asset ids in creation order.
    pub fn list_assets(&self) -> Vec<AssetId> {
        self.registry.asset_ids()
    }

    /// Returns a diagnostic view of an asset.
    pub fn asset_info(&self, id: &AssetId) -> Option<AssetInfo> {
        let entry = self.registry.asset(id)?;
        let tag_count = self.registry.tags(id).map_or(0, |t| t.len());
        Some(AssetInfo {
            id: entry.id.clone(),
            display_name: entry.display_name.clone(),
            base: entry.base.raw.clone(),
            kind: entry.base.kind,
            tag_count,
            created_at: entry.created_at,
            metrics: entry.metrics.snapshot(),
        })
    }

    /// Returns the number of running workers.
    pub fn worker_count(&self) -> usize {
        self.workers.iter().filter(|w| !w.value().is_finished()).count()
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Stops every worker and disconnects every connector.
    ///
    /// Assets stay registered so their descriptions can be reloaded.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(());

        let ids: Vec<AssetId> = self.workers.iter().map(|w| w.key().clone()).collect();
        for id in ids {
            if let Some((_, handle)) = self.workers.remove(&id) {
                if let Err(e) = handle.await {
                    tracing::warn!(asset_id = %id, error = %e, "Worker terminated abnormally");
                }
            }
        }

        for id in self.registry.asset_ids() {
            if let Some(entry) = self.registry.asset(&id) {
                if let Err(e) = entry.connector.lock().await.disconnect().await {
                    tracing::warn!(asset_id = %id, error = %e, "Disconnect failed during shutdown");
                }
            }
        }
        tracing::info!("Asset manager stopped");
    }
}

impl std::fmt::Debug for AssetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetManager")
            .field("registry", &self.registry)
            .field("connectors", &self.connectors)
            .field("workers", &self.workers.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
