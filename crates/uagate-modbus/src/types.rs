// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus register kinds, tag addresses and payload packing.
//!
//! Register payloads travel as big-endian words in register order; bit
//! payloads are packed LSB first, eight coils per byte, as on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

use uagate_core::address::DeviceAddress;
use uagate_core::error::AddressError;

// =============================================================================
// RegisterKind
// =============================================================================

/// The four Modbus data tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterKind {
    /// Read/write single bit (FC 1, 5, 15).
    Coil,
    /// Read-only single bit (FC 2).
    DiscreteInput,
    /// Read/write 16-bit word (FC 3, 6, 16).
    HoldingRegister,
    /// Read-only 16-bit word (FC 4).
    InputRegister,
}

impl RegisterKind {
    /// Parses the entity of a tag form, ignoring case and separators.
    ///
    /// `Holdingregister`, `holding_register` and `HoldingRegister` are the
    /// same kind.
    pub fn parse(entity: &str) -> Option<Self> {
        let normalized: String = entity
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "coil" | "coils" => Some(Self::Coil),
            "discreteinput" | "discreteinputs" => Some(Self::DiscreteInput),
            "holdingregister" | "holdingregisters" => Some(Self::HoldingRegister),
            "inputregister" | "inputregisters" => Some(Self::InputRegister),
            _ => None,
        }
    }

    /// Returns `true` for coils and holding registers.
    #[inline]
    pub const fn is_writable(&self) -> bool {
        matches!(self, Self::Coil | Self::HoldingRegister)
    }

    /// Returns `true` for the 1-bit tables.
    #[inline]
    pub const fn is_bit(&self) -> bool {
        matches!(self, Self::Coil | Self::DiscreteInput)
    }

    /// Maximum number of items in one read request.
    #[inline]
    pub const fn max_read_count(&self) -> u16 {
        match self {
            Self::Coil | Self::DiscreteInput => 2000,
            Self::HoldingRegister | Self::InputRegister => 125,
        }
    }

    /// Returns the table name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Coil => "Coil",
            Self::DiscreteInput => "DiscreteInput",
            Self::HoldingRegister => "HoldingRegister",
            Self::InputRegister => "InputRegister",
        }
    }
}

impl fmt::Display for RegisterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// ModbusAddress
// =============================================================================

/// A validated Modbus tag address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModbusAddress {
    /// Data table.
    pub kind: RegisterKind,
    /// Zero-based start address.
    pub address: u16,
    /// Number of registers or bits.
    pub quantity: u16,
    /// Unit id of the request.
    pub unit_id: u8,
}

impl ModbusAddress {
    /// Validates a tag address.
    ///
    /// # Errors
    ///
    /// [`AddressError::InvalidFormat`] for unknown entities, non-numeric
    /// addresses and ranges beyond the protocol limits.
    pub fn from_device(device: &DeviceAddress) -> Result<Self, AddressError> {
        let kind = RegisterKind::parse(&device.entity).ok_or_else(|| {
            AddressError::invalid(
                device.to_string(),
                format!(
                    "unknown Modbus entity '{}', expected Coil, DiscreteInput, HoldingRegister or InputRegister",
                    device.entity
                ),
            )
        })?;
        let address = device.address.parse::<u16>().map_err(|_| {
            AddressError::invalid(device.to_string(), "register address must be 0..=65535")
        })?;

        let quantity = device.quantity;
        if quantity == 0 || quantity > kind.max_read_count() {
            return Err(AddressError::invalid(
                device.to_string(),
                format!("quantity must be 1..={} for {}", kind.max_read_count(), kind),
            ));
        }
        if u32::from(address) + u32::from(quantity) > 0x1_0000 {
            return Err(AddressError::invalid(device.to_string(), "range exceeds register space"));
        }

        Ok(Self {
            kind,
            address,
            quantity,
            unit_id: device.unit_id,
        })
    }
}

impl fmt::Display for ModbusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}[{}]", self.kind, self.address, self.unit_id, self.quantity)
    }
}

// =============================================================================
// Payload Packing
// =============================================================================

/// Flattens registers into big-endian bytes.
pub fn registers_to_bytes(registers: &[u16]) -> Vec<u8> {
    registers.iter().flat_map(|r| r.to_be_bytes()).collect()
}

/// Splits bytes into big-endian registers.
///
/// A single byte is a boolean or byte value and lands in the low byte of one
/// register. Longer odd payloads are strings and get a trailing NUL.
pub fn bytes_to_registers(bytes: &[u8]) -> Vec<u16> {
    if let [single] = bytes {
        return vec![u16::from(*single)];
    }
    bytes
        .chunks(2)
        .map(|chunk| match chunk {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [hi] => u16::from_be_bytes([*hi, 0]),
            _ => 0,
        })
        .collect()
}

/// Packs bits LSB first, eight per byte.
pub fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, bit)| if *bit { acc | (1 << i) } else { acc })
        })
        .collect()
}

/// Unpacks `count` bits from LSB-first bytes.
pub fn bytes_to_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| bytes.get(i / 8).map_or(false, |b| b & (1 << (i % 8)) != 0))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn device(address: &str, entity: &str, quantity: u16) -> DeviceAddress {
        DeviceAddress {
            address: address.to_string(),
            unit_id: 1,
            entity: entity.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_register_kind_parse() {
        assert_eq!(RegisterKind::parse("Holdingregister"), Some(RegisterKind::HoldingRegister));
        assert_eq!(RegisterKind::parse("holding_register"), Some(RegisterKind::HoldingRegister));
        assert_eq!(RegisterKind::parse("InputRegister"), Some(RegisterKind::InputRegister));
        assert_eq!(RegisterKind::parse("coil"), Some(RegisterKind::Coil));
        assert_eq!(RegisterKind::parse("DiscreteInput"), Some(RegisterKind::DiscreteInput));
        assert_eq!(RegisterKind::parse("bogus"), None);
        assert!(!RegisterKind::InputRegister.is_writable());
    }

    #[test]
    fn test_address_validation() {
        let addr = ModbusAddress::from_device(&device("40", "HoldingRegister", 2)).unwrap();
        assert_eq!(addr.kind, RegisterKind::HoldingRegister);
        assert_eq!(addr.address, 40);
        assert_eq!(addr.to_string(), "HoldingRegister:40@1[2]");

        assert!(ModbusAddress::from_device(&device("40", "Register", 2)).is_err());
        assert!(ModbusAddress::from_device(&device("x", "coil", 1)).is_err());
        assert!(ModbusAddress::from_device(&device("0", "HoldingRegister", 126)).is_err());
        assert!(ModbusAddress::from_device(&device("65535", "HoldingRegister", 2)).is_err());
        assert!(ModbusAddress::from_device(&device("0", "coil", 2000)).is_ok());
    }

    #[test]
    fn test_register_packing() {
        assert_eq!(registers_to_bytes(&[0x4148, 0x0000]), vec![0x41, 0x48, 0x00, 0x00]);
        assert_eq!(bytes_to_registers(&[0x41, 0x48, 0x00, 0x00]), vec![0x4148, 0x0000]);
        assert_eq!(bytes_to_registers(&[0x01]), vec![0x0001]);
        assert_eq!(bytes_to_registers(&[0x01, 0x02, 0x03]), vec![0x0102, 0x0300]);
    }

    #[test]
    fn test_bit_packing() {
        let bits = [true, false, true, false, false, false, false, false, true];
        let bytes = bits_to_bytes(&bits);
        assert_eq!(bytes, vec![0b0000_0101, 0b0000_0001]);
        assert_eq!(bytes_to_bits(&bytes, 9), bits.to_vec());
        assert_eq!(bytes_to_bits(&[1], 3), vec![true, false, false]);
    }
}
