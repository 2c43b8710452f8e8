// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Node id parsing.
//!
//! Supported forms:
//!
//! - `ns=2;i=1001`, `ns=2;s=Tag`, `ns=2;g=<uuid>`
//! - `nsu=<uri>;s=Tag`, resolved against the server's namespace array
//! - `i=2258`, `s=Tag` in namespace 0

use std::fmt;
use std::str::FromStr;

use opcua::types::{Guid, NodeId};

use crate::error::{OpcUaError, OpcUaResult};

/// Namespace part of a node reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Namespace index.
    Index(u16),
    /// Namespace URI, resolved at use.
    Uri(String),
}

/// Identifier part of a node reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// `i=`
    Numeric(u32),
    /// `s=`
    String(String),
    /// `g=`
    Guid(uuid::Uuid),
}

/// A parsed node id that may still reference its namespace by URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    /// Namespace.
    pub namespace: Namespace,
    /// Identifier.
    pub identifier: Identifier,
}

impl NodeRef {
    /// Resolves the reference to a wire node id.
    ///
    /// # Errors
    ///
    /// [`OpcUaError::NodeId`] if a namespace URI is not in `namespaces`.
    pub fn resolve(&self, namespaces: &[String]) -> OpcUaResult<NodeId> {
        let index = match &self.namespace {
            Namespace::Index(i) => *i,
            Namespace::Uri(uri) => namespaces
                .iter()
                .position(|ns| ns == uri)
                .and_then(|i| u16::try_from(i).ok())
                .ok_or_else(|| OpcUaError::node_id(self.to_string(), "namespace URI not found on server"))?,
        };
        Ok(match &self.identifier {
            Identifier::Numeric(v) => NodeId::new(index, *v),
            Identifier::String(v) => NodeId::new(index, v.clone()),
            Identifier::Guid(v) => {
                let guid = Guid::from_str(&v.to_string())
                    .map_err(|_| OpcUaError::node_id(self.to_string(), "invalid GUID identifier"))?;
                NodeId::new(index, guid)
            }
        })
    }
}

impl FromStr for NodeRef {
    type Err = OpcUaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (namespace, identifier) = match s.split_once(';') {
            Some((ns, id)) => {
                let namespace = if let Some(index) = ns.strip_prefix("ns=") {
                    Namespace::Index(
                        index
                            .parse()
                            .map_err(|_| OpcUaError::node_id(s, "invalid namespace index"))?,
                    )
                } else if let Some(uri) = ns.strip_prefix("nsu=") {
                    Namespace::Uri(uri.to_string())
                } else {
                    return Err(OpcUaError::node_id(s, "expected ns= or nsu="));
                };
                (namespace, id)
            }
            None => (Namespace::Index(0), s),
        };

        let identifier = match identifier.split_once('=') {
            Some(("i", v)) => Identifier::Numeric(
                v.parse()
                    .map_err(|_| OpcUaError::node_id(s, "invalid numeric identifier"))?,
            ),
            Some(("s", v)) if !v.is_empty() => Identifier::String(v.to_string()),
            Some(("g", v)) => Identifier::Guid(
                uuid::Uuid::parse_str(v).map_err(|_| OpcUaError::node_id(s, "invalid GUID identifier"))?,
            ),
            _ => return Err(OpcUaError::node_id(s, "expected i=, s= or g= identifier")),
        };

        Ok(Self {
            namespace,
            identifier,
        })
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Namespace::Index(0) => {}
            Namespace::Index(i) => write!(f, "ns={};", i)?,
            Namespace::Uri(uri) => write!(f, "nsu={};", uri)?,
        }
        match &self.identifier {
            Identifier::Numeric(v) => write!(f, "i={}", v),
            Identifier::String(v) => write!(f, "s={}", v),
            Identifier::Guid(v) => write!(f, "g={}", v),
        }
    }
}
