// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Generic connector for uagate: reads and writes variables on a downstream
//! OPC UA server.
//!
//! Each asset whose base address uses the `opc.tcp://` scheme gets one
//! [`GenericConnector`] with its own client session. Form hrefs carry node ids
//! (`ns=2;s=Line1.Speed`, `nsu=<uri>;i=7`) and the form entity names the
//! value type written back to the server.
//!
//! ```text
//! OpcUaError
//! ├── Connection   - Endpoint and session activation
//! ├── NodeId       - Node id syntax and namespace resolution
//! ├── Operation    - Read/write faults
//! ├── Conversion   - Payload and variant mismatches
//! ├── Timeout      - Operation timeout
//! └── NotConnected - No session
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use uagate_core::connector::ConnectorRegistry;
//! use uagate_opcua::GenericConnectorFactory;
//!
//! let mut connectors = ConnectorRegistry::new();
//! connectors.register(Box::new(GenericConnectorFactory::default()));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod connector;
pub mod convert;
pub mod error;
pub mod node;

pub use connector::{GenericConnector, GenericConnectorFactory};
pub use convert::ValueType;
pub use error::{OpcUaError, OpcUaResult};
pub use node::NodeRef;
