// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uagate-plc
//!
//! Native PLC and building-automation connectors for the uagate gateway.
//!
//! | Scheme              | Connector              | Protocol                    | Default port |
//! |---------------------|------------------------|-----------------------------|--------------|
//! | `s7://`             | [`SiemensConnector`]    | S7comm over ISO-on-TCP      | 102          |
//! | `mcp://`, `melsec://` | [`MitsubishiConnector`] | MC protocol, binary 3E frame | 5007       |
//! | `eip://`, `logix://`  | [`RockwellConnector`]   | EtherNet/IP, CIP tag services | 44818     |
//! | `ads://`            | [`BeckhoffConnector`]   | ADS over AMS/TCP            | 48898        |
//! | `bacnet://`         | [`BacnetConnector`]     | BACnet/IP confirmed services | 47808       |
//!
//! ## Payloads
//!
//! Every connector hands the codec payloads in little-endian native order.
//! Big-endian wire formats (S7, BACnet) are converted here; text and raw
//! byte payloads are never reordered.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use uagate_core::connector::{ConnectorRegistry, ConnectorSettings};
//! use uagate_plc::PlcOptions;
//!
//! let mut connectors = ConnectorRegistry::new();
//! uagate_plc::register_all(&mut connectors, ConnectorSettings::default(), PlcOptions::default());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod bacnet;
pub mod beckhoff;
pub mod error;
pub mod mitsubishi;
pub mod rockwell;
pub mod siemens;

mod transport;

pub use bacnet::{BacnetConnector, BacnetConnectorFactory, PropertyRef};
pub use beckhoff::{AdsTarget, AmsAddress, AmsNetId, BeckhoffConnector, BeckhoffConnectorFactory};
pub use error::{PlcError, PlcResult};
pub use mitsubishi::{MelsecAddress, MitsubishiConnector, MitsubishiConnectorFactory};
pub use rockwell::{CipType, RockwellConnector, RockwellConnectorFactory};
pub use siemens::{S7Address, S7Area, SiemensConnector, SiemensConnectorFactory};

use uagate_core::connector::{ConnectorRegistry, ConnectorSettings};

/// Transport options that only some PLC connectors use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlcOptions {
    /// Local UDP port for BACnet/IP (0 = ephemeral).
    pub bacnet_local_port: u16,
    /// Source AMS port announced by ADS requests.
    pub ads_source_port: u16,
}

impl Default for PlcOptions {
    fn default() -> Self {
        Self {
            bacnet_local_port: 0,
            ads_source_port: beckhoff::DEFAULT_SOURCE_PORT,
        }
    }
}

/// Registers the factories of every connector in this crate.
pub fn register_all(registry: &mut ConnectorRegistry, settings: ConnectorSettings, options: PlcOptions) {
    registry.register(Box::new(SiemensConnectorFactory::new(settings)));
    registry.register(Box::new(MitsubishiConnectorFactory::new(settings)));
    registry.register(Box::new(RockwellConnectorFactory::new(settings)));
    registry.register(Box::new(
        BeckhoffConnectorFactory::new(settings).with_source_port(options.ads_source_port),
    ));
    registry.register(Box::new(
        BacnetConnectorFactory::new(settings).with_local_port(options.bacnet_local_port),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use uagate_core::types::ConnectorKind;

    #[test]
    fn test_register_all() {
        let mut registry = ConnectorRegistry::new();
        register_all(&mut registry, ConnectorSettings::default(), PlcOptions::default());
        for kind in [
            ConnectorKind::Siemens,
            ConnectorKind::Mitsubishi,
            ConnectorKind::Rockwell,
            ConnectorKind::Beckhoff,
            ConnectorKind::BacNet,
        ] {
            assert!(registry.supports(kind), "{:?} not registered", kind);
        }
        assert!(!registry.supports(ConnectorKind::Modbus));
    }
}
