// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Asset tag registry and variable store.
//!
//! Assets, their tags and the variable store live in one [`RegistryState`]
//! behind a single `parking_lot::Mutex`. The address-space nodes are created
//! and removed under the same lock, so no concurrent poll or read ever observes
//! half of an asset.
//!
//! ```text
//! ┌─────────────────────────── Registry (one lock) ───────────────────────────┐
//! │ assets:    AssetId    → AssetEntry { base, connector, metrics }           │
//! │ tags:      AssetId    → [Tag, Tag, ...]     (registration order)          │
//! │ variables: VariableId → Variable { data_type, value, timestamp, writable }│
//! └───────────────────────────────────────────────────────────────────────────┘
//!                  │ notify_changed / create / remove nodes
//!                  ▼
//!             AddressSpace
//! ```
//!
//! The lock is never held across an `.await`. Callers copy what they need
//! (a [`ConnectorHandle`], a tag list) and release it before device I/O.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::address::{BaseAddress, DeviceAddress};
use crate::address_space::{AddressSpace, AssetNode};
use crate::codec;
use crate::connector::ConnectorHandle;
use crate::error::{GatewayError, GatewayResult, RegistryError};
use crate::types::{AssetId, DataTypeDescriptor, SemanticType, Value, VariableId};

// =============================================================================
// Tag & Variable
// =============================================================================

/// One device-resident data point bound to a variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    /// Name, unique within the asset.
    pub name: String,
    /// Device address.
    pub address: DeviceAddress,
    /// How the device bytes are interpreted.
    pub semantic: SemanticType,
    /// Polling interval in milliseconds, always > 0.
    pub polling_interval_ms: u64,
    /// The variable this tag updates.
    pub variable_id: VariableId,
    /// Structured field this tag fills, if any.
    pub field_path: Option<String>,
}

impl Tag {
    /// Returns the protocol sub-addressing of the tag.
    pub fn entity(&self) -> &str {
        &self.address.entity
    }
}

/// An address-space visible typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Globally unique id, `"<asset>/<property>"`.
    pub id: VariableId,
    /// Data type.
    pub data_type: DataTypeDescriptor,
    /// Current value. Structured variables hold their encoded body.
    pub value: Value,
    /// Time of the last update, `None` until the first one.
    pub timestamp: Option<DateTime<Utc>>,
    /// Whether consumers may write.
    pub writable: bool,
}

/// Declaration of a variable to create.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    /// Variable id.
    pub id: VariableId,
    /// Data type.
    pub data_type: DataTypeDescriptor,
    /// Whether consumers may write.
    pub writable: bool,
}

// =============================================================================
// Asset Entry & Metrics
// =============================================================================

/// A registered asset.
#[derive(Clone)]
pub struct AssetEntry {
    /// Asset id.
    pub id: AssetId,
    /// Display name.
    pub display_name: String,
    /// Parsed base address.
    pub base: BaseAddress,
    /// The asset's connector.
    pub connector: ConnectorHandle,
    /// Poll tick and counters.
    pub metrics: Arc<AssetMetrics>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl AssetEntry {
    /// Creates a new entry.
    pub fn new(
        id: AssetId,
        display_name: impl Into<String>,
        base: BaseAddress,
        connector: ConnectorHandle,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            base,
            connector,
            metrics: Arc::new(AssetMetrics::default()),
            created_at: Utc::now(),
        }
    }
}

impl fmt::Debug for AssetEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetEntry")
            .field("id", &self.id)
            .field("base", &self.base.raw)
            .field("kind", &self.base.kind)
            .finish()
    }
}

/// Lock-free per-asset counters.
#[derive(Debug, Default)]
pub struct AssetMetrics {
    poll_tick: AtomicU64,
    polls: AtomicU64,
    poll_failures: AtomicU64,
    reconnects: AtomicU64,
    writes: AtomicU64,
    write_failures: AtomicU64,
}

impl AssetMetrics {
    /// Increments the poll tick and returns the new value.
    pub fn next_tick(&self) -> u64 {
        self.poll_tick.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Returns the current poll tick.
    pub fn tick(&self) -> u64 {
        self.poll_tick.load(Ordering::Relaxed)
    }

    /// Records a tag read.
    pub fn record_poll(&self, success: bool) {
        self.polls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.poll_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a reconnect attempt.
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a consumer write.
    pub fn record_write(&self, success: bool) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.write_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns a point-in-time copy of the counters.
    pub fn snapshot(&self) -> AssetMetricsSnapshot {
        AssetMetricsSnapshot {
            poll_tick: self.poll_tick.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of [`AssetMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetricsSnapshot {
    /// Current poll tick.
    pub poll_tick: u64,
    /// Tag reads performed.
    pub polls: u64,
    /// Tag reads that failed.
    pub poll_failures: u64,
    /// Reconnect attempts.
    pub reconnects: u64,
    /// Consumer writes.
    pub writes: u64,
    /// Consumer writes that failed.
    pub write_failures: u64,
}

/// Everything needed to install one asset atomically.
#[derive(Debug)]
pub struct AssetInstall {
    /// The asset entry.
    pub entry: AssetEntry,
    /// Its address-space object node.
    pub node: AssetNode,
    /// Variables to create, in order.
    pub variables: Vec<VariableSpec>,
    /// Tags to register, in order.
    pub tags: Vec<Tag>,
}

/// The device side of a consumer write.
#[derive(Clone)]
pub struct WriteTarget {
    /// The variable being written.
    pub variable: Variable,
    /// Tags bound to the variable, in registration order.
    pub tags: Vec<Tag>,
    /// Connector of the owning asset.
    pub connector: ConnectorHandle,
    /// Counters of the owning asset.
    pub metrics: Arc<AssetMetrics>,
}

// =============================================================================
// Registry
// =============================================================================

/// The state guarded by the registry lock.
#[derive(Default)]
pub struct RegistryState {
    assets: IndexMap<AssetId, AssetEntry>,
    tags: HashMap<AssetId, Vec<Tag>>,
    variables: HashMap<VariableId, Variable>,
}

/// Process-wide tag registry and variable store.
pub struct Registry {
    state: Mutex<RegistryState>,
    space: Arc<dyn AddressSpace>,
}

impl Registry {
    /// Creates an empty registry publishing into `space`.
    pub fn new(space: Arc<dyn AddressSpace>) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            space,
        }
    }

    /// Returns the address space.
    pub fn address_space(&self) -> &Arc<dyn AddressSpace> {
        &self.space
    }

    // =========================================================================
    // Tags & Variables
    // =========================================================================

    /// Appends a tag to an asset's list, creating the list on first use.
    ///
    /// # Errors
    ///
    /// [`RegistryError::VariableNotFound`] if the tag's variable does not exist,
    /// [`RegistryError::DuplicateBinding`] if the asset already has a tag of
    /// that name.
    pub fn register_tag(&self, asset: &AssetId, tag: Tag) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        Self::check_tag(&state, asset, &tag)?;
        state.tags.entry(asset.clone()).or_default().push(tag);
        Ok(())
    }

    /// Creates a variable and its address-space node.
    ///
    /// Scalar variables start as [`Value::Null`]; structured variables start
    /// with every field at its default.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateBinding`] if the id exists, a codec error for
    /// structured types with unsupported fields, or the address space's error.
    pub fn create_variable(
        &self,
        asset: &AssetId,
        spec: VariableSpec,
    ) -> GatewayResult<Variable> {
        let mut state = self.state.lock();
        if state.variables.contains_key(&spec.id) {
            return Err(RegistryError::duplicate(spec.id.as_str()).into());
        }
        let variable = Self::new_variable(spec)?;
        self.space
            .create_variable_node(asset, &variable.id, &variable.data_type, variable.writable)?;
        state.variables.insert(variable.id.clone(), variable.clone());
        Ok(variable)
    }

    /// Returns the value and timestamp of a variable.
    pub fn read_variable(&self, id: &VariableId) -> Result<(Value, Option<DateTime<Utc>>), RegistryError> {
        let state = self.state.lock();
        state
            .variables
            .get(id)
            .map(|v| (v.value.clone(), v.timestamp))
            .ok_or_else(|| RegistryError::variable_not_found(id.as_str()))
    }

    /// Returns a copy of a variable.
    pub fn variable(&self, id: &VariableId) -> Option<Variable> {
        self.state.lock().variables.get(id).cloned()
    }

    /// Commits a value to the store without touching the device.
    ///
    /// Publishes the change to the address space. Fails with
    /// [`RegistryError::VariableNotFound`] if the variable was removed in the
    /// meantime; the value is then discarded.
    pub fn write_variable_internal(
        &self,
        id: &VariableId,
        value: Value,
        timestamp: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        let variable = state
            .variables
            .get_mut(id)
            .ok_or_else(|| RegistryError::variable_not_found(id.as_str()))?;
        variable.value = value;
        variable.timestamp = Some(timestamp);
        self.space.notify_changed(id, &variable.value, timestamp);
        Ok(())
    }

    /// Replaces one field of a structured variable and commits the new body.
    ///
    /// Decoding, updating and committing happen under the lock so concurrent
    /// updates of different fields never lose each other.
    pub fn write_structured_field(
        &self,
        id: &VariableId,
        field: &str,
        value: &Value,
        timestamp: DateTime<Utc>,
    ) -> GatewayResult<()> {
        let mut state = self.state.lock();
        let variable = state
            .variables
            .get_mut(id)
            .ok_or_else(|| RegistryError::variable_not_found(id.as_str()))?;
        let descriptor = variable.data_type.as_structured().ok_or_else(|| {
            crate::error::CodecError::mismatch("structured", variable.data_type_name())
        })?;
        let body = variable.value.as_structured().unwrap_or_default();
        let updated = codec::encode_structured_field(body, descriptor, field, value)?;

        variable.value = Value::Structured(updated);
        variable.timestamp = Some(timestamp);
        self.space.notify_changed(id, &variable.value, timestamp);
        Ok(())
    }

    // =========================================================================
    // Assets
    // =========================================================================

    /// Installs an asset with all its nodes, variables and tags.
    ///
    /// Either everything is installed or nothing is: all ids are checked
    /// before the first mutation, and address-space nodes created before a
    /// failure are removed again.
    pub fn install_asset(&self, install: AssetInstall) -> GatewayResult<()> {
        let AssetInstall {
            entry,
            node,
            variables,
            tags,
        } = install;
        let asset = entry.id.clone();
        let mut state = self.state.lock();

        if state.assets.contains_key(&asset) {
            return Err(RegistryError::AssetExists {
                asset_id: asset.to_string(),
            }
            .into());
        }
        let mut created = Vec::with_capacity(variables.len());
        for spec in variables {
            if state.variables.contains_key(&spec.id) || created.iter().any(|v: &Variable| v.id == spec.id) {
                return Err(RegistryError::duplicate(spec.id.as_str()).into());
            }
            created.push(Self::new_variable(spec)?);
        }
        let mut names: Vec<&str> = Vec::with_capacity(tags.len());
        for tag in &tags {
            if !created.iter().any(|v| v.id == tag.variable_id) {
                return Err(RegistryError::variable_not_found(tag.variable_id.as_str()).into());
            }
            if names.contains(&tag.name.as_str()) {
                return Err(RegistryError::duplicate(asset.variable(&tag.name).as_str()).into());
            }
            names.push(&tag.name);
        }

        self.space.create_asset_node(&node)?;
        for variable in &created {
            if let Err(e) = self
                .space
                .create_variable_node(&asset, &variable.id, &variable.data_type, variable.writable)
            {
                self.space.remove_asset_nodes(&asset);
                return Err(e.into());
            }
        }

        for variable in created {
            state.variables.insert(variable.id.clone(), variable);
        }
        state.tags.insert(asset.clone(), tags);
        state.assets.insert(asset, entry);
        Ok(())
    }

    /// Unregisters an asset and purges its tags, variables and nodes.
    ///
    /// Returns the removed entry so the caller can disconnect the connector
    /// after the lock is released.
    pub fn remove_asset(&self, id: &AssetId) -> Option<AssetEntry> {
        let mut state = self.state.lock();
        let entry = state.assets.shift_remove(id)?;
        state.tags.remove(id);
        state.variables.retain(|vid, _| !vid.belongs_to(id));
        self.space.remove_asset_nodes(id);
        Some(entry)
    }

    /// Returns a copy of an asset entry.
    pub fn asset(&self, id: &AssetId) -> Option<AssetEntry> {
        self.state.lock().assets.get(id).cloned()
    }

    /// Returns `true` if the asset is registered.
    pub fn contains_asset(&self, id: &AssetId) -> bool {
        self.state.lock().assets.contains_key(id)
    }

    /// Returns all asset ids in creation order.
    pub fn asset_ids(&self) -> Vec<AssetId> {
        self.state.lock().assets.keys().cloned().collect()
    }

    /// Returns a copy of an asset's tags, or `None` if it is not registered.
    pub fn tags(&self, id: &AssetId) -> Option<Vec<Tag>> {
        let state = self.state.lock();
        if !state.assets.contains_key(id) {
            return None;
        }
        Some(state.tags.get(id).cloned().unwrap_or_default())
    }

    /// Looks up everything a consumer write needs.
    ///
    /// # Errors
    ///
    /// [`RegistryError::VariableNotFound`] for unknown variables and
    /// [`RegistryError::NotWritable`] for read-only ones.
    pub fn write_target(&self, id: &VariableId) -> Result<WriteTarget, RegistryError> {
        let state = self.state.lock();
        let variable = state
            .variables
            .get(id)
            .ok_or_else(|| RegistryError::variable_not_found(id.as_str()))?;
        if !variable.writable {
            return Err(RegistryError::NotWritable {
                variable_id: id.to_string(),
            });
        }
        let (asset, entry) = state
            .assets
            .iter()
            .find(|(asset, _)| id.belongs_to(asset))
            .ok_or_else(|| RegistryError::variable_not_found(id.as_str()))?;
        let tags = state
            .tags
            .get(asset)
            .map(|tags| tags.iter().filter(|t| &t.variable_id == id).cloned().collect())
            .unwrap_or_default();

        Ok(WriteTarget {
            variable: variable.clone(),
            tags,
            connector: entry.connector.clone(),
            metrics: entry.metrics.clone(),
        })
    }

    /// Returns the total number of tags.
    pub fn tag_count(&self) -> usize {
        self.state.lock().tags.values().map(Vec::len).sum()
    }

    /// Returns the total number of variables.
    pub fn variable_count(&self) -> usize {
        self.state.lock().variables.len()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn check_tag(state: &RegistryState, asset: &AssetId, tag: &Tag) -> Result<(), RegistryError> {
        if !state.variables.contains_key(&tag.variable_id) {
            return Err(RegistryError::variable_not_found(tag.variable_id.as_str()));
        }
        let exists = state
            .tags
            .get(asset)
            .is_some_and(|tags| tags.iter().any(|t| t.name == tag.name));
        if exists {
            return Err(RegistryError::duplicate(asset.variable(&tag.name).as_str()));
        }
        Ok(())
    }

    fn new_variable(spec: VariableSpec) -> Result<Variable, GatewayError> {
        let value = match spec.data_type.as_structured() {
            Some(descriptor) => Value::Structured(codec::default_structure(descriptor)?),
            None => Value::Null,
        };
        Ok(Variable {
            id: spec.id,
            data_type: spec.data_type,
            value,
            timestamp: None,
            writable: spec.writable,
        })
    }
}

impl Variable {
    fn data_type_name(&self) -> &'static str {
        match self.data_type.as_scalar() {
            Some(semantic) => semantic.as_str(),
            None => "structured",
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Registry")
            .field("assets", &state.assets.len())
            .field("tags", &state.tags.values().map(Vec::len).sum::<usize>())
            .field("variables", &state.variables.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
