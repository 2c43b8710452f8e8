// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Seams to the hosting address-space framework.
//!
//! The gateway does not implement an address-space server. It creates and
//! removes nodes, looks up structured-type metadata and publishes value
//! changes through the [`AddressSpace`] trait, and asks a [`ProvisioningGate`]
//! whether consumer reads and writes are currently allowed.
//!
//! [`InMemoryAddressSpace`] is a self-contained implementation used by the
//! binary and the tests. Value changes fan out over a `tokio::sync::broadcast`
//! channel:
//!
//! ```text
//! Registry ──notify_changed──▶ InMemoryAddressSpace ──broadcast──▶ ChangeSubscriber(s)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::description::{Form, Property, ThingDescription, TypeRef};
use crate::error::AddressSpaceError;
use crate::types::{AssetId, DataTypeDescriptor, SemanticType, StructuredTypeDescriptor, Value, VariableId};

// =============================================================================
// Nodes
// =============================================================================

/// The object node of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetNode {
    /// Asset id.
    pub id: AssetId,
    /// Display name, `"{title} [{name}]"`.
    pub display_name: String,
    /// Namespace URI of the asset's nodes.
    pub namespace_uri: String,
    /// Existing object node to place the asset at.
    pub object_node: Option<String>,
    /// Parent node of a new asset object.
    pub parent_node: Option<String>,
    /// Type definition of a new asset object.
    pub object_type: Option<String>,
}

impl AssetNode {
    /// Builds the asset node of a description.
    pub fn from_description(td: &ThingDescription) -> Self {
        Self {
            id: td.asset_id(),
            display_name: td.display_name(),
            namespace_uri: td.namespace_uri(),
            object_node: td.object_node.clone(),
            parent_node: td.parent_node.clone(),
            object_type: td.object_type.clone(),
        }
    }
}

/// A variable node as seen by the address space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableNode {
    /// Variable id.
    pub id: VariableId,
    /// Owning asset.
    pub asset: AssetId,
    /// Data type.
    pub data_type: DataTypeDescriptor,
    /// Whether consumers may write.
    pub writable: bool,
    /// Last published value.
    pub value: Value,
    /// Last published timestamp.
    pub timestamp: Option<DateTime<Utc>>,
}

/// A published value change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotification {
    /// Changed variable.
    pub variable_id: VariableId,
    /// New value.
    pub value: Value,
    /// Source timestamp.
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// AddressSpace Trait
// =============================================================================

/// Node primitives consumed from the hosting framework.
///
/// All methods are synchronous and cheap; they are called while the registry
/// lock is held so node mutation and registry mutation stay atomic together.
pub trait AddressSpace: Send + Sync {
    /// Creates the object node of an asset.
    fn create_asset_node(&self, node: &AssetNode) -> Result<(), AddressSpaceError>;

    /// Creates a variable node under an asset.
    fn create_variable_node(
        &self,
        asset: &AssetId,
        id: &VariableId,
        data_type: &DataTypeDescriptor,
        writable: bool,
    ) -> Result<(), AddressSpaceError>;

    /// Looks up the layout of a structured data type.
    fn find_structured_type(&self, type_ref: &TypeRef) -> Option<StructuredTypeDescriptor>;

    /// Publishes a value change to subscribers.
    fn notify_changed(&self, id: &VariableId, value: &Value, timestamp: DateTime<Utc>);

    /// Removes the asset node and every variable node under it.
    fn remove_asset_nodes(&self, asset: &AssetId);
}

/// Resolves the data type of a property's variable.
///
/// - Built-in ids of the base namespace map to scalars
/// - Other namespaces are looked up as structured types
/// - A present but unresolvable reference defaults to Float
/// - Without a reference the scalar follows the binding type, then the
///   schema type, then Float
pub fn resolve_data_type(
    space: &dyn AddressSpace,
    property: &Property,
    form: &Form,
    binding: Option<SemanticType>,
) -> DataTypeDescriptor {
    if form.opcua_type.is_some() {
        let resolved = form.type_ref().and_then(|type_ref| match type_ref.builtin() {
            Some(semantic) => Some(DataTypeDescriptor::scalar(semantic)),
            None => space
                .find_structured_type(&type_ref)
                .map(DataTypeDescriptor::structured),
        });
        return resolved.unwrap_or_else(|| {
            tracing::debug!(opcua_type = ?form.opcua_type, "Unresolvable data type, using Float");
            DataTypeDescriptor::scalar(SemanticType::Float)
        });
    }

    let semantic = binding
        .or_else(|| property.schema_semantic())
        .unwrap_or(SemanticType::Float);
    DataTypeDescriptor::scalar(semantic)
}

// =============================================================================
// InMemoryAddressSpace
// =============================================================================

/// Default capacity of the change notification channel.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 1024;

/// A self-contained address space backed by concurrent maps.
pub struct InMemoryAddressSpace {
    assets: DashMap<AssetId, AssetNode>,
    variables: DashMap<VariableId, VariableNode>,
    types: DashMap<TypeRef, StructuredTypeDescriptor>,
    sender: broadcast::Sender<ChangeNotification>,
    notifications: AtomicU64,
}

impl InMemoryAddressSpace {
    /// Creates an empty address space.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_NOTIFICATION_CAPACITY)
    }

    /// Creates an empty address space with a notification buffer of `capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            assets: DashMap::new(),
            variables: DashMap::new(),
            types: DashMap::new(),
            sender,
            notifications: AtomicU64::new(0),
        }
    }

    /// Registers the layout of a structured data type.
    pub fn register_structured_type(&self, type_ref: TypeRef, descriptor: StructuredTypeDescriptor) {
        tracing::debug!(type_name = %descriptor.name, id = type_ref.id, "Registered structured type");
        self.types.insert(type_ref, descriptor);
    }

    /// Subscribes to value changes.
    pub fn subscribe(&self) -> ChangeSubscriber {
        ChangeSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Returns a copy of an asset node.
    pub fn asset(&self, id: &AssetId) -> Option<AssetNode> {
        self.assets.get(id).map(|n| n.clone())
    }

    /// Returns a copy of a variable node.
    pub fn variable(&self, id: &VariableId) -> Option<VariableNode> {
        self.variables.get(id).map(|n| n.clone())
    }

    /// Returns the number of asset nodes.
    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    /// Returns the number of variable nodes.
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Returns the number of published changes.
    pub fn notification_count(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryAddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryAddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryAddressSpace")
            .field("assets", &self.assets.len())
            .field("variables", &self.variables.len())
            .field("types", &self.types.len())
            .finish()
    }
}

impl AddressSpace for InMemoryAddressSpace {
    fn create_asset_node(&self, node: &AssetNode) -> Result<(), AddressSpaceError> {
        match self.assets.entry(node.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(AddressSpaceError::NodeExists {
                node: node.id.to_string(),
            }),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(node.clone());
                Ok(())
            }
        }
    }

    fn create_variable_node(
        &self,
        asset: &AssetId,
        id: &VariableId,
        data_type: &DataTypeDescriptor,
        writable: bool,
    ) -> Result<(), AddressSpaceError> {
        if !self.assets.contains_key(asset) {
            return Err(AddressSpaceError::Rejected {
                message: format!("no asset node '{}' for variable '{}'", asset, id),
            });
        }
        match self.variables.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(AddressSpaceError::NodeExists {
                node: id.to_string(),
            }),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(VariableNode {
                    id: id.clone(),
                    asset: asset.clone(),
                    data_type: data_type.clone(),
                    writable,
                    value: Value::Null,
                    timestamp: None,
                });
                Ok(())
            }
        }
    }

    fn find_structured_type(&self, type_ref: &TypeRef) -> Option<StructuredTypeDescriptor> {
        self.types.get(type_ref).map(|d| d.clone())
    }

    fn notify_changed(&self, id: &VariableId, value: &Value, timestamp: DateTime<Utc>) {
        if let Some(mut node) = self.variables.get_mut(id) {
            node.value = value.clone();
            node.timestamp = Some(timestamp);
        }
        self.notifications.fetch_add(1, Ordering::Relaxed);
        // No subscribers is fine
        let _ = self.sender.send(ChangeNotification {
            variable_id: id.clone(),
            value: value.clone(),
            timestamp,
        });
    }

    fn remove_asset_nodes(&self, asset: &AssetId) {
        self.assets.remove(asset);
        self.variables.retain(|_, node| &node.asset != asset);
    }
}

/// A subscriber to value changes.
pub struct ChangeSubscriber {
    receiver: broadcast::Receiver<ChangeNotification>,
}

impl ChangeSubscriber {
    /// Receives the next change. Returns `None` once the address space is dropped.
    pub async fn recv(&mut self) -> Option<ChangeNotification> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    tracing::warn!(count, "Change subscriber lagged, notifications dropped");
                }
            }
        }
    }

    /// Returns the next change without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeNotification> {
        loop {
            match self.receiver.try_recv() {
                Ok(change) => return Some(change),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

// =============================================================================
// Provisioning Gate
// =============================================================================

/// Deployment-security gate in front of every consumer read and write.
pub trait ProvisioningGate: Send + Sync {
    /// Returns `true` while the gateway is in provisioning mode.
    fn is_active(&self) -> bool;
}

/// A gate switched explicitly, e.g. by tests or an operator command.
#[derive(Debug, Default, Clone)]
pub struct StaticProvisioningGate {
    active: Arc<AtomicBool>,
}

impl StaticProvisioningGate {
    /// Creates a gate in the given state.
    pub fn new(active: bool) -> Self {
        Self {
            active: Arc::new(AtomicBool::new(active)),
        }
    }

    /// Switches provisioning mode on or off.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl ProvisioningGate for StaticProvisioningGate {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldKind;

    fn node(id: &str) -> AssetNode {
        AssetNode {
            id: AssetId::new(id),
            display_name: format!("{} [{}]", id, id),
            namespace_uri: format!("http://opcfoundation.org/UA/{}/", id),
            object_node: None,
            parent_node: None,
            object_type: None,
        }
    }

    fn form(json: &str) -> Form {
        serde_json::from_str(json).unwrap()
    }

    fn property() -> Property {
        serde_json::from_str(r#"{"type": "integer", "forms": []}"#).unwrap()
    }

    #[test]
    fn test_node_lifecycle() {
        let space = InMemoryAddressSpace::new();
        let asset = AssetId::new("pump");
        let var = asset.variable("pressure");
        let float = DataTypeDescriptor::scalar(SemanticType::Float);

        assert!(space.create_variable_node(&asset, &var, &float, false).is_err());

        space.create_asset_node(&node("pump")).unwrap();
        assert!(matches!(
            space.create_asset_node(&node("pump")),
            Err(AddressSpaceError::NodeExists { .. })
        ));

        space.create_variable_node(&asset, &var, &float, false).unwrap();
        assert!(space.create_variable_node(&asset, &var, &float, false).is_err());
        assert_eq!(space.variable_count(), 1);

        space.remove_asset_nodes(&asset);
        assert_eq!(space.asset_count(), 0);
        assert_eq!(space.variable_count(), 0);
    }

    #[tokio::test]
    async fn test_change_notifications() {
        let space = InMemoryAddressSpace::new();
        let asset = AssetId::new("pump");
        let var = asset.variable("pressure");
        space.create_asset_node(&node("pump")).unwrap();
        space
            .create_variable_node(&asset, &var, &DataTypeDescriptor::scalar(SemanticType::Float), false)
            .unwrap();

        let mut subscriber = space.subscribe();
        let now = Utc::now();
        space.notify_changed(&var, &Value::Float32(12.5), now);

        let change = subscriber.recv().await.unwrap();
        assert_eq!(change.variable_id, var);
        assert_eq!(change.value, Value::Float32(12.5));
        assert_eq!(space.variable(&var).unwrap().timestamp, Some(now));
        assert_eq!(space.notification_count(), 1);
        assert!(subscriber.try_recv().is_none());
    }

    #[test]
    fn test_resolve_data_type() {
        let space = InMemoryAddressSpace::new();
        let pump_type = TypeRef::parse("nsu=http://example.com/Pumps/;i=3005").unwrap();
        let descriptor = StructuredTypeDescriptor::new("PumpState")
            .with_field("speed", FieldKind::Float)
            .with_field("running", FieldKind::Boolean);
        space.register_structured_type(pump_type, descriptor.clone());

        let builtin = form(r#"{"href": "x", "opcua:type": "nsu=http://opcfoundation.org/UA/;i=1"}"#);
        assert_eq!(
            resolve_data_type(&space, &property(), &builtin, None),
            DataTypeDescriptor::scalar(SemanticType::Boolean)
        );

        let structured = form(r#"{"href": "x", "opcua:type": "nsu=http://example.com/Pumps/;i=3005"}"#);
        assert_eq!(
            resolve_data_type(&space, &property(), &structured, None),
            DataTypeDescriptor::structured(descriptor)
        );

        for unresolvable in [
            r#"{"href": "x", "opcua:type": "nsu=http://example.com/Other/;i=1"}"#,
            r#"{"href": "x", "opcua:type": "garbage"}"#,
            r#"{"href": "x", "opcua:type": "nsu=http://opcfoundation.org/UA/;i=999"}"#,
        ] {
            assert_eq!(
                resolve_data_type(&space, &property(), &form(unresolvable), Some(SemanticType::Integer)),
                DataTypeDescriptor::scalar(SemanticType::Float)
            );
        }

        let untyped = form(r#"{"href": "x"}"#);
        assert_eq!(
            resolve_data_type(&space, &property(), &untyped, Some(SemanticType::String)),
            DataTypeDescriptor::scalar(SemanticType::String)
        );
        assert_eq!(
            resolve_data_type(&space, &property(), &untyped, None),
            DataTypeDescriptor::scalar(SemanticType::Integer)
        );
    }

    #[test]
    fn test_static_gate() {
        let gate = StaticProvisioningGate::new(true);
        assert!(gate.is_active());
        let shared = gate.clone();
        shared.set_active(false);
        assert!(!gate.is_active());
    }
}
