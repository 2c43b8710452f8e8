// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Base and tag address parsing.
//!
//! An asset's base address selects the connector variant and the endpoint:
//!
//! ```text
//! modbus+tcp://10.0.0.5:502/1
//! └──┬─────┘   └───┬──┘ └┬┘ └ path segments (unit id, rack/slot, AMS net id, ...)
//!  scheme         host  port
//! ```
//!
//! Each tag form carries an `href` relative to the base. Modbus hrefs follow
//! `[/unit]?address=<n>&quantity=<m>`; every other protocol puts its native
//! address before an optional `?quantity=<m>` query.
//!
//! # Examples
//!
//! ```
//! use uagate_core::address::BaseAddress;
//! use uagate_core::types::ConnectorKind;
//!
//! let base: BaseAddress = "modbus+tcp://10.0.0.5:502/1".parse().unwrap();
//! assert_eq!(base.kind, ConnectorKind::Modbus);
//! assert_eq!(base.endpoint(), "10.0.0.5:502");
//! assert_eq!(base.unit_id(), 1);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;
use crate::types::{ConnectorKind, SemanticType};

// =============================================================================
// BaseAddress
// =============================================================================

/// The parsed base address of an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseAddress {
    /// The original string.
    pub raw: String,
    /// The connector variant selected by the scheme.
    pub kind: ConnectorKind,
    /// The scheme as written.
    pub scheme: String,
    /// Host name or IP address.
    pub host: String,
    /// TCP/UDP port.
    pub port: u16,
    /// Path segments after `host:port`.
    pub path: Vec<String>,
}

impl BaseAddress {
    /// Parses a base address.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let trimmed = raw.trim();
        let (scheme, rest) = trimmed
            .split_once("://")
            .ok_or_else(|| AddressError::invalid(raw, "expected <scheme>://ipaddress:port"))?;

        let kind = ConnectorKind::from_scheme(scheme)
            .ok_or_else(|| AddressError::unsupported_scheme(scheme))?;
        let format_hint = format!(
            "expected {} address in the format {}://ipaddress:port",
            kind, scheme
        );

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, path),
            None => (rest, ""),
        };

        let segments: Vec<&str> = authority.split(':').collect();
        if segments.len() != 2 {
            return Err(AddressError::invalid(raw, format_hint));
        }
        let host = segments[0];
        if host.is_empty() {
            return Err(AddressError::invalid(raw, format_hint));
        }
        let port = segments[1]
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| AddressError::invalid(raw, format!("invalid port '{}'", segments[1])))?;

        let path: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if kind == ConnectorKind::Modbus {
            if path.len() > 1 {
                return Err(AddressError::invalid(
                    raw,
                    format!("{}/<unit id> allows a single path segment", format_hint),
                ));
            }
            if let Some(unit) = path.first() {
                unit.parse::<u8>().map_err(|_| {
                    AddressError::invalid(raw, format!("invalid unit id '{}'", unit))
                })?;
            }
        }

        Ok(Self {
            raw: trimmed.to_string(),
            kind,
            scheme: scheme.to_string(),
            host: host.to_string(),
            port,
            path,
        })
    }

    /// Returns `host:port`.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the unit/station id carried by the first path segment.
    ///
    /// Modbus defaults to unit 1, every other protocol to 0.
    pub fn unit_id(&self) -> u8 {
        let default = if self.kind == ConnectorKind::Modbus { 1 } else { 0 };
        self.path
            .first()
            .and_then(|s| s.parse::<u8>().ok())
            .unwrap_or(default)
    }
}

impl FromStr for BaseAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BaseAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

// =============================================================================
// DeviceAddress
// =============================================================================

/// The device-side address of one tag, as handed to a connector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceAddress {
    /// Protocol-specific address (register, DB offset, node id, symbol, ...).
    pub address: String,
    /// Modbus unit id or PLC station number.
    pub unit_id: u8,
    /// Protocol sub-addressing: register kind, CIP type, value type.
    pub entity: String,
    /// Number of protocol units to read.
    pub quantity: u16,
}

impl DeviceAddress {
    /// Parses a form `href` relative to `base`.
    ///
    /// `quantity` defaults to the width of `semantic` when the href omits it.
    pub fn from_href(
        href: &str,
        base: &BaseAddress,
        entity: &str,
        semantic: SemanticType,
    ) -> Result<Self, AddressError> {
        let relative = href.strip_prefix(base.raw.as_str()).unwrap_or(href).trim();
        let (path, query) = match relative.split_once('?') {
            Some((path, query)) => (path, query),
            None => (relative, ""),
        };
        let params = parse_query(href, query)?;
        let param = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| *v)
        };

        let quantity = match param("quantity") {
            Some(q) => q
                .parse::<u16>()
                .ok()
                .filter(|q| *q > 0)
                .ok_or_else(|| AddressError::invalid(href, format!("invalid quantity '{}'", q)))?,
            None => base.kind.default_quantity(semantic, entity),
        };

        if base.kind == ConnectorKind::Modbus {
            let unit_id = match path.trim_matches('/') {
                "" => base.unit_id(),
                unit => unit
                    .parse::<u8>()
                    .map_err(|_| AddressError::invalid(href, format!("invalid unit id '{}'", unit)))?,
            };
            let address = param("address").ok_or_else(|| {
                AddressError::invalid(href, "expected /<unit>?address=<n>&quantity=<m>")
            })?;
            address.parse::<u16>().map_err(|_| {
                AddressError::invalid(href, format!("invalid register address '{}'", address))
            })?;
            return Ok(Self {
                address: address.to_string(),
                unit_id,
                entity: entity.to_string(),
                quantity,
            });
        }

        let address = path.trim_start_matches('/');
        if address.is_empty() {
            return Err(AddressError::invalid(href, "missing device address"));
        }
        Ok(Self {
            address: address.to_string(),
            unit_id: base.unit_id(),
            entity: entity.to_string(),
            quantity,
        })
    }

    /// Returns `true` if the entity addresses a single Modbus coil.
    pub fn is_coil(&self) -> bool {
        self.entity.eq_ignore_ascii_case("coil")
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}[{}]", self.address, self.unit_id, self.quantity)
    }
}

fn parse_query<'a>(href: &str, query: &'a str) -> Result<Vec<(&'a str, &'a str)>, AddressError> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            pair.split_once('=')
                .ok_or_else(|| AddressError::invalid(href, format!("malformed query parameter '{}'", pair)))
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modbus_base() {
        let base = BaseAddress::parse("modbus+tcp://10.0.0.5:502/1").unwrap();
        assert_eq!(base.kind, ConnectorKind::Modbus);
        assert_eq!(base.host, "10.0.0.5");
        assert_eq!(base.port, 502);
        assert_eq!(base.unit_id(), 1);

        let base = BaseAddress::parse("modbus://192.168.0.10:5020").unwrap();
        assert_eq!(base.unit_id(), 1);
        assert_eq!(base.endpoint(), "192.168.0.10:5020");
    }

    #[test]
    fn test_parse_base_rejects_malformed() {
        assert!(matches!(
            BaseAddress::parse("modbus://10.0.0.5"),
            Err(AddressError::InvalidFormat { .. })
        ));
        assert!(matches!(
            BaseAddress::parse("modbus://:502"),
            Err(AddressError::InvalidFormat { .. })
        ));
        assert!(matches!(
            BaseAddress::parse("10.0.0.5:502"),
            Err(AddressError::InvalidFormat { .. })
        ));
        assert!(matches!(
            BaseAddress::parse("modbus://10.0.0.5:502/1/2"),
            Err(AddressError::InvalidFormat { .. })
        ));
        assert!(matches!(
            BaseAddress::parse("modbus://10.0.0.5:port"),
            Err(AddressError::InvalidFormat { .. })
        ));
        assert!(matches!(
            BaseAddress::parse("http://10.0.0.5:80"),
            Err(AddressError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn test_parse_other_bases() {
        let base = BaseAddress::parse("s7://10.0.0.7:102/0/1").unwrap();
        assert_eq!(base.kind, ConnectorKind::Siemens);
        assert_eq!(base.path, vec!["0", "1"]);

        let base = BaseAddress::parse("ads://10.0.0.8:48898/5.12.34.56.1.1:851").unwrap();
        assert_eq!(base.kind, ConnectorKind::Beckhoff);
        assert_eq!(base.path, vec!["5.12.34.56.1.1:851"]);

        let base = BaseAddress::parse("opc.tcp://server:4840/UA/Plant").unwrap();
        assert_eq!(base.kind, ConnectorKind::Generic);
        assert_eq!(base.unit_id(), 0);
    }

    #[test]
    fn test_modbus_href() {
        let base = BaseAddress::parse("modbus+tcp://10.0.0.5:502/1").unwrap();

        let addr = DeviceAddress::from_href(
            "/3?address=40001&quantity=2",
            &base,
            "holdingregister",
            SemanticType::Float,
        )
        .unwrap();
        assert_eq!(addr.address, "40001");
        assert_eq!(addr.unit_id, 3);
        assert_eq!(addr.quantity, 2);

        let addr =
            DeviceAddress::from_href("?address=7", &base, "holdingregister", SemanticType::Float)
                .unwrap();
        assert_eq!(addr.unit_id, 1);
        assert_eq!(addr.quantity, 2);

        let addr = DeviceAddress::from_href("?address=7", &base, "coil", SemanticType::Boolean)
            .unwrap();
        assert!(addr.is_coil());
        assert_eq!(addr.quantity, 1);
    }

    #[test]
    fn test_modbus_href_rejects_malformed() {
        let base = BaseAddress::parse("modbus://10.0.0.5:502").unwrap();
        for href in ["/1?quantity=2", "/x?address=1", "?address=abc", "?address=1&quantity=0", "?address"] {
            assert!(
                DeviceAddress::from_href(href, &base, "holdingregister", SemanticType::Float).is_err(),
                "{}",
                href
            );
        }
    }

    #[test]
    fn test_generic_href() {
        let base = BaseAddress::parse("s7://10.0.0.7:102").unwrap();
        let addr =
            DeviceAddress::from_href("DB1.4?quantity=4", &base, "", SemanticType::Float).unwrap();
        assert_eq!(addr.address, "DB1.4");
        assert_eq!(addr.quantity, 4);

        let addr = DeviceAddress::from_href("s7://10.0.0.7:102/M10", &base, "", SemanticType::Boolean)
            .unwrap();
        assert_eq!(addr.address, "M10");
        assert_eq!(addr.quantity, 1);

        assert!(DeviceAddress::from_href("?quantity=2", &base, "", SemanticType::Float).is_err());
    }
}
