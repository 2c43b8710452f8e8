// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Generic fieldbus connector: an OPC UA client session per asset.
//!
//! The `opcua` client API is blocking, so every service call runs on the
//! blocking pool under the operation timeout. Reads return the node value as
//! a native-order payload; writes rebuild a variant of the tag's value type
//! (the form entity, or the type of the node's current value when the entity
//! is empty).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use opcua::client::prelude::*;
use opcua::sync::RwLock as SessionLock;
use opcua::types::{DataValue, NodeId, QualifiedName, UAString, Variant};

use uagate_core::address::{BaseAddress, DeviceAddress};
use uagate_core::connector::{Connector, ConnectorFactory, ConnectorSettings, RemoteEndpoint};
use uagate_core::error::{AddressError, ConnectorError};
use uagate_core::types::ConnectorKind;

use crate::convert::{bytes_to_variant, variant_to_bytes, ValueType};
use crate::error::{OpcUaError, OpcUaResult};
use crate::node::NodeRef;

type SharedSession = Arc<SessionLock<Session>>;

/// Numeric id of `Server_NamespaceArray`.
const NAMESPACE_ARRAY: u32 = 2255;

/// Certificate store of the client sessions. Sessions are unsecured, so
/// no keypair is generated, but the stack still lays out its directories.
pub fn client_pki_dir() -> PathBuf {
    std::env::temp_dir().join("uagate-opcua-pki")
}

/// Client settings shared by every session: anonymous, no security, no
/// session retries.
fn client_builder(pki_dir: &Path) -> ClientBuilder {
    ClientBuilder::new()
        .application_name("uagate")
        .application_uri("urn:uagate")
        .product_uri("urn:uagate")
        .pki_dir(pki_dir)
        .create_sample_keypair(false)
        .trust_server_certs(true)
        .session_retry_limit(0)
}

// =============================================================================
// GenericConnector
// =============================================================================

/// OPC UA client connector.
pub struct GenericConnector {
    settings: ConnectorSettings,
    path: String,
    session: Option<SharedSession>,
    namespaces: Vec<String>,
    endpoint: Option<RemoteEndpoint>,
}

impl GenericConnector {
    /// Creates an unconnected connector. `path` is appended to the endpoint URL.
    pub fn new(settings: ConnectorSettings, path: impl Into<String>) -> Self {
        Self {
            settings,
            path: path.into(),
            session: None,
            namespaces: Vec::new(),
            endpoint: None,
        }
    }

    /// Returns the endpoint URL for `host:port`.
    pub fn endpoint_url(&self, host: &str, port: u16) -> String {
        if self.path.is_empty() {
            format!("opc.tcp://{}:{}", host, port)
        } else {
            format!("opc.tcp://{}:{}/{}", host, port, self.path)
        }
    }

    fn session(&self) -> OpcUaResult<SharedSession> {
        self.session.clone().ok_or(OpcUaError::NotConnected)
    }

    fn resolve(&self, address: &DeviceAddress) -> OpcUaResult<NodeId> {
        address.address.parse::<NodeRef>()?.resolve(&self.namespaces)
    }

    /// Runs a blocking session call under the operation timeout.
    async fn call<T, F>(&self, operation: &'static str, f: F) -> OpcUaResult<T>
    where
        T: Send + 'static,
        F: FnOnce(SharedSession) -> OpcUaResult<T> + Send + 'static,
    {
        let session = self.session()?;
        let duration = self.settings.operation_timeout;
        match tokio::time::timeout(duration, tokio::task::spawn_blocking(move || f(session))).await {
            Err(_) => Err(OpcUaError::Timeout { operation, duration }),
            Ok(Err(join)) => Err(OpcUaError::read(operation, join.to_string())),
            Ok(Ok(result)) => result,
        }
    }

    async fn read_variant(&self, node: NodeId, label: String) -> OpcUaResult<Variant> {
        self.call("read", move |session| {
            let request = ReadValueId {
                node_id: node,
                attribute_id: AttributeId::Value as u32,
                index_range: UAString::null(),
                data_encoding: QualifiedName::null(),
            };
            let results = session
                .read()
                .read(&[request], TimestampsToReturn::Neither, 0.0)
                .map_err(|status| OpcUaError::read(&label, format!("{}", status)))?;
            let data_value = results
                .into_iter()
                .next()
                .ok_or_else(|| OpcUaError::read(&label, "empty response"))?;
            if let Some(status) = data_value.status {
                if !status.is_good() {
                    return Err(OpcUaError::read(&label, format!("{}", status)));
                }
            }
            data_value
                .value
                .ok_or_else(|| OpcUaError::read(&label, "no value"))
        })
        .await
    }

    async fn load_namespaces(&mut self) -> OpcUaResult<()> {
        let variant = self
            .read_variant(NodeId::new(0, NAMESPACE_ARRAY), "NamespaceArray".into())
            .await?;
        self.namespaces = match variant {
            Variant::Array(array) => array
                .values
                .iter()
                .map(|v| match v {
                    Variant::String(s) => s.as_ref().to_string(),
                    _ => String::new(),
                })
                .collect(),
            _ => Vec::new(),
        };
        tracing::debug!(count = self.namespaces.len(), "Loaded server namespace array");
        Ok(())
    }
}

#[async_trait]
impl Connector for GenericConnector {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Generic
    }

    fn validate_address(&self, address: &DeviceAddress) -> Result<(), AddressError> {
        address
            .address
            .parse::<NodeRef>()
            .map_err(|e| AddressError::invalid(&address.address, e.to_string()))?;
        if !address.entity.is_empty() {
            address
                .entity
                .parse::<ValueType>()
                .map_err(|e| AddressError::invalid(&address.address, e.to_string()))?;
        }
        Ok(())
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<(), ConnectorError> {
        let url = self.endpoint_url(host, port);
        let connect_url = url.clone();
        let connecting = tokio::task::spawn_blocking(move || -> OpcUaResult<SharedSession> {
            let mut client = client_builder(&client_pki_dir())
                .client()
                .ok_or_else(|| OpcUaError::connection(&connect_url, "invalid client configuration"))?;
            client
                .connect_to_endpoint(
                    (
                        connect_url.as_str(),
                        SecurityPolicy::None.to_str(),
                        MessageSecurityMode::None,
                        UserTokenPolicy::anonymous(),
                    ),
                    IdentityToken::Anonymous,
                )
                .map_err(|status| OpcUaError::connection(&connect_url, format!("{}", status)))
        });

        let session = tokio::time::timeout(self.settings.connect_timeout, connecting)
            .await
            .map_err(|_| OpcUaError::connection(&url, "connect timed out"))?
            .map_err(|e| OpcUaError::connection(&url, e.to_string()))??;

        self.session = Some(session);
        self.endpoint = Some(RemoteEndpoint::new(host, port));
        if let Err(e) = self.load_namespaces().await {
            tracing::warn!(endpoint = %url, error = %e, "Namespace array unavailable, nsu= node ids will not resolve");
        }

        tracing::info!(endpoint = %url, "Connected to OPC UA server");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ConnectorError> {
        if let Some(session) = self.session.take() {
            let closing = tokio::task::spawn_blocking(move || session.read().disconnect());
            if let Err(e) = closing.await {
                tracing::debug!(error = %e, "Error closing OPC UA session");
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    async fn read(&mut self, address: &DeviceAddress) -> Result<Vec<u8>, ConnectorError> {
        let node = self.resolve(address)?;
        let variant = self.read_variant(node, address.address.clone()).await?;
        variant_to_bytes(&variant).map_err(|e| ConnectorError::read(&address.address, e.to_string()))
    }

    async fn write(
        &mut self,
        address: &DeviceAddress,
        data: &[u8],
        _is_coil: bool,
    ) -> Result<(), ConnectorError> {
        let node = self.resolve(address)?;
        let value_type = if address.entity.is_empty() {
            let current = self.read_variant(node.clone(), address.address.clone()).await?;
            ValueType::of(&current).ok_or_else(|| {
                ConnectorError::write(&address.address, "node value type is not a supported scalar")
            })?
        } else {
            address.entity.parse::<ValueType>()?
        };
        let variant = bytes_to_variant(data, value_type)?;

        let label = address.address.clone();
        self.call("write", move |session| {
            let request = WriteValue {
                node_id: node,
                attribute_id: AttributeId::Value as u32,
                index_range: UAString::null(),
                value: DataValue::new_now(variant),
            };
            let results = session
                .read()
                .write(&[request])
                .map_err(|status| OpcUaError::write(&label, format!("{}", status)))?;
            match results.first() {
                Some(status) if status.is_good() => Ok(()),
                Some(status) => Err(OpcUaError::write(&label, format!("{}", status))),
                None => Err(OpcUaError::write(&label, "empty response")),
            }
        })
        .await?;
        Ok(())
    }

    fn remote_endpoint(&self) -> Option<RemoteEndpoint> {
        self.endpoint.clone()
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Creates [`GenericConnector`]s for `opc.tcp://` base addresses.
#[derive(Debug, Clone, Default)]
pub struct GenericConnectorFactory {
    settings: ConnectorSettings,
}

impl GenericConnectorFactory {
    /// Creates a factory with the given transport settings.
    pub fn new(settings: ConnectorSettings) -> Self {
        Self { settings }
    }
}

impl ConnectorFactory for GenericConnectorFactory {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Generic
    }

    fn create(&self, base: &BaseAddress) -> Result<Box<dyn Connector>, ConnectorError> {
        Ok(Box::new(GenericConnector::new(self.settings, base.path.join("/"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(address: &str, entity: &str) -> DeviceAddress {
        DeviceAddress {
            address: address.to_string(),
            unit_id: 0,
            entity: entity.to_string(),
            quantity: 1,
        }
    }

    #[test]
    fn test_endpoint_url() {
        let factory = GenericConnectorFactory::default();
        let base = BaseAddress::parse("opc.tcp://10.0.0.9:4840/UA/Line1").unwrap();
        let connector = factory.create(&base).unwrap();
        assert_eq!(connector.kind(), ConnectorKind::Generic);

        let connector = GenericConnector::new(ConnectorSettings::default(), "UA/Line1");
        assert_eq!(connector.endpoint_url("10.0.0.9", 4840), "opc.tcp://10.0.0.9:4840/UA/Line1");
        let connector = GenericConnector::new(ConnectorSettings::default(), "");
        assert_eq!(connector.endpoint_url("plc", 4840), "opc.tcp://plc:4840");
    }

    #[test]
    fn test_validate_address() {
        let connector = GenericConnector::new(ConnectorSettings::default(), "");
        assert!(connector.validate_address(&tag("ns=2;s=Speed", "Float")).is_ok());
        assert!(connector.validate_address(&tag("ns=2;s=Speed", "")).is_ok());
        assert!(connector.validate_address(&tag("Speed", "Float")).is_err());
        assert!(connector.validate_address(&tag("ns=2;s=Speed", "Decimal")).is_err());
    }

    #[tokio::test]
    async fn test_not_connected() {
        let mut connector = GenericConnector::new(ConnectorSettings::default(), "");
        let err = connector.read(&tag("ns=2;s=Speed", "Float")).await.unwrap_err();
        assert!(matches!(err, ConnectorError::NotConnected));
        assert!(connector.remote_endpoint().is_none());
        connector.disconnect().await.unwrap();
    }

    #[test]
    fn test_client_keeps_pki_out_of_working_dir() {
        let config = client_builder(&client_pki_dir()).config();
        assert!(!config.create_sample_keypair);
        assert_eq!(config.pki_dir, std::env::temp_dir().join("uagate-opcua-pki"));
        assert_ne!(config.pki_dir, PathBuf::from("pki"));
    }
}
