// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Mitsubishi MELSEC connector (MC protocol, binary 3E frame).
//!
//! ```text
//! request:  50 00 | net pc io(2) st | len(2) | timer(2) | cmd(2) sub(2) | dev(3) code | points(2) | data
//! response: D0 00 | net pc io(2) st | len(2) | end code(2) | data
//! ```
//!
//! All multi-byte fields are little-endian, so word payloads already are in
//! native order. Bit devices are read in bit units, two points per byte
//! (first point in the high nibble), and returned as one byte per point.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use uagate_core::address::{BaseAddress, DeviceAddress};
use uagate_core::connector::{Connector, ConnectorFactory, ConnectorSettings, RemoteEndpoint};
use uagate_core::error::{AddressError, ConnectorError};
use uagate_core::types::ConnectorKind;

use crate::error::{PlcError, PlcResult};
use crate::transport::{le_u16, TcpLink};

const PROTOCOL: &str = "MC";

const RESPONSE_HEADER: usize = 9;
const COMMAND_BATCH_READ: u16 = 0x0401;
const COMMAND_BATCH_WRITE: u16 = 0x1401;
const SUBCOMMAND_WORD: u16 = 0x0000;
const SUBCOMMAND_BIT: u16 = 0x0001;
/// Monitoring timer in 250 ms units.
const MONITORING_TIMER: u16 = 0x0010;

/// Maximum points of a batch word access.
pub const MAX_WORD_POINTS: u16 = 960;
/// Maximum points of a batch bit access.
pub const MAX_BIT_POINTS: u16 = 7168;

// =============================================================================
// Devices
// =============================================================================

/// MELSEC device families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    /// Data register (word).
    D,
    /// Link register (word, hex numbered).
    W,
    /// File register (word).
    R,
    /// Internal relay (bit).
    M,
    /// Link relay (bit, hex numbered).
    B,
    /// Input (bit, hex numbered).
    X,
    /// Output (bit, hex numbered).
    Y,
}

impl Device {
    /// Returns the binary device code.
    pub fn code(&self) -> u8 {
        match self {
            Device::D => 0xA8,
            Device::W => 0xB4,
            Device::R => 0xAF,
            Device::M => 0x90,
            Device::B => 0xA0,
            Device::X => 0x9C,
            Device::Y => 0x9D,
        }
    }

    /// Returns `true` for bit devices.
    pub fn is_bit(&self) -> bool {
        matches!(self, Device::M | Device::B | Device::X | Device::Y)
    }

    /// Returns `true` if device numbers are hexadecimal.
    pub fn is_hex(&self) -> bool {
        matches!(self, Device::W | Device::B | Device::X | Device::Y)
    }

    fn from_prefix(prefix: char) -> Option<Self> {
        Some(match prefix {
            'D' => Device::D,
            'W' => Device::W,
            'R' => Device::R,
            'M' => Device::M,
            'B' => Device::B,
            'X' => Device::X,
            'Y' => Device::Y,
            _ => return None,
        })
    }
}

/// A device address such as `D100` or `X1F`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MelsecAddress {
    /// Device family.
    pub device: Device,
    /// Head device number.
    pub number: u32,
}

impl FromStr for MelsecAddress {
    type Err = PlcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_ascii_uppercase();
        let mut chars = text.chars();
        let device = chars
            .next()
            .and_then(Device::from_prefix)
            .ok_or_else(|| PlcError::address(s, "expected device D, W, R, M, B, X or Y"))?;
        let digits = chars.as_str();
        let radix = if device.is_hex() { 16 } else { 10 };
        let number = u32::from_str_radix(digits, radix)
            .ok()
            .filter(|n| *n <= 0xFF_FFFF)
            .ok_or_else(|| PlcError::address(s, "invalid device number"))?;
        Ok(Self { device, number })
    }
}

impl fmt::Display for MelsecAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.device.is_hex() {
            write!(f, "{:?}{:X}", self.device, self.number)
        } else {
            write!(f, "{:?}{}", self.device, self.number)
        }
    }
}

// =============================================================================
// Frames
// =============================================================================

fn request(station: u8, command: u16, address: &MelsecAddress, points: u16, data: &[u8]) -> Vec<u8> {
    let subcommand = if address.device.is_bit() {
        SUBCOMMAND_BIT
    } else {
        SUBCOMMAND_WORD
    };
    let body_len = 2 + 2 + 2 + 3 + 1 + 2 + data.len();

    let mut frame = Vec::with_capacity(9 + body_len);
    frame.extend_from_slice(&[0x50, 0x00, 0x00, 0xFF, 0xFF, 0x03, station]);
    frame.extend_from_slice(&(body_len as u16).to_le_bytes());
    frame.extend_from_slice(&MONITORING_TIMER.to_le_bytes());
    frame.extend_from_slice(&command.to_le_bytes());
    frame.extend_from_slice(&subcommand.to_le_bytes());
    frame.extend_from_slice(&address.number.to_le_bytes()[..3]);
    frame.push(address.device.code());
    frame.extend_from_slice(&points.to_le_bytes());
    frame.extend_from_slice(data);
    frame
}

/// Builds a batch read request for `points` words or bits.
pub fn read_request(station: u8, address: &MelsecAddress, points: u16) -> Vec<u8> {
    request(station, COMMAND_BATCH_READ, address, points, &[])
}

/// Builds a batch write request from a native-order payload.
pub fn write_request(station: u8, address: &MelsecAddress, payload: &[u8]) -> Vec<u8> {
    if address.device.is_bit() {
        let packed: Vec<u8> = payload
            .chunks(2)
            .map(|pair| {
                let high = u8::from(pair[0] != 0) << 4;
                let low = pair.get(1).map_or(0, |b| u8::from(*b != 0));
                high | low
            })
            .collect();
        request(station, COMMAND_BATCH_WRITE, address, payload.len() as u16, &packed)
    } else {
        let mut words = payload.to_vec();
        if words.len() % 2 == 1 {
            words.push(0);
        }
        request(station, COMMAND_BATCH_WRITE, address, (words.len() / 2) as u16, &words)
    }
}

/// Validates a response and returns the data after the end code.
pub fn parse_response<'a>(frame: &'a [u8], operation: &'static str, address: &str) -> PlcResult<&'a [u8]> {
    if frame.len() < RESPONSE_HEADER + 2 || frame[0] != 0xD0 || frame[1] != 0x00 {
        return Err(PlcError::frame(PROTOCOL, "not a 3E binary response"));
    }
    let end_code = le_u16(frame, RESPONSE_HEADER, PROTOCOL)?;
    if end_code != 0 {
        let message = match end_code {
            0xC051..=0xC054 => "point count out of range",
            0xC056 => "device range exceeded",
            0xC059 => "command or subcommand not supported",
            0xC05B | 0xC05C => "device cannot be accessed",
            0xC061 => "request data length mismatch",
            _ => "request rejected",
        };
        return Err(PlcError::device(PROTOCOL, operation, address, u32::from(end_code), message));
    }
    Ok(&frame[RESPONSE_HEADER + 2..])
}

fn unpack_bits(data: &[u8], points: u16) -> Vec<u8> {
    (0..usize::from(points))
        .map(|i| {
            let byte = data.get(i / 2).copied().unwrap_or(0);
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0F };
            u8::from(nibble != 0)
        })
        .collect()
}

fn response_body_len(header: &[u8]) -> PlcResult<usize> {
    Ok(usize::from(le_u16(header, 7, PROTOCOL)?))
}

// =============================================================================
// MitsubishiConnector
// =============================================================================

/// MC protocol connector for one controller.
pub struct MitsubishiConnector {
    settings: ConnectorSettings,
    link: Option<TcpLink>,
    endpoint: Option<RemoteEndpoint>,
}

impl MitsubishiConnector {
    /// Creates an unconnected connector.
    pub fn new(settings: ConnectorSettings) -> Self {
        Self {
            settings,
            link: None,
            endpoint: None,
        }
    }

    async fn transact(&mut self, operation: &'static str, request: Vec<u8>) -> PlcResult<Vec<u8>> {
        let link = self.link.as_mut().ok_or(PlcError::NotConnected)?;
        link.transact(operation, &request, RESPONSE_HEADER, response_body_len)
            .await
    }
}

#[async_trait]
impl Connector for MitsubishiConnector {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Mitsubishi
    }

    fn validate_address(&self, address: &DeviceAddress) -> Result<(), AddressError> {
        let parsed: MelsecAddress = address.address.parse()?;
        let max = if parsed.device.is_bit() {
            MAX_BIT_POINTS
        } else {
            MAX_WORD_POINTS
        };
        if address.quantity > max {
            return Err(AddressError::invalid(
                &address.address,
                format!("quantity {} exceeds {} points", address.quantity, max),
            ));
        }
        Ok(())
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<(), ConnectorError> {
        let link =
            TcpLink::connect(host, port, self.settings.connect_timeout, self.settings.operation_timeout).await?;
        self.link = Some(link);
        self.endpoint = Some(RemoteEndpoint::new(host, port));
        tracing::info!(host = %host, port = port, "Connected to MELSEC controller");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ConnectorError> {
        if let Some(link) = self.link.take() {
            link.close().await;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    async fn read(&mut self, address: &DeviceAddress) -> Result<Vec<u8>, ConnectorError> {
        let parsed: MelsecAddress = address.address.parse()?;
        let frame = self
            .transact("read", read_request(address.unit_id, &parsed, address.quantity))
            .await
            .map_err(|e| e.into_read(&address.address))?;
        let data = parse_response(&frame, "read", &address.address).map_err(|e| e.into_read(&address.address))?;

        if parsed.device.is_bit() {
            return Ok(unpack_bits(data, address.quantity));
        }
        let expected = usize::from(address.quantity) * 2;
        if data.len() < expected {
            return Err(PlcError::frame(PROTOCOL, format!("expected {} bytes, got {}", expected, data.len()))
                .into_read(&address.address));
        }
        Ok(data[..expected].to_vec())
    }

    async fn write(
        &mut self,
        address: &DeviceAddress,
        data: &[u8],
        _is_coil: bool,
    ) -> Result<(), ConnectorError> {
        let parsed: MelsecAddress = address.address.parse()?;
        let frame = self
            .transact("write", write_request(address.unit_id, &parsed, data))
            .await
            .map_err(|e| e.into_write(&address.address))?;
        parse_response(&frame, "write", &address.address).map_err(|e| e.into_write(&address.address))?;
        Ok(())
    }

    fn remote_endpoint(&self) -> Option<RemoteEndpoint> {
        self.endpoint.clone()
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Creates [`MitsubishiConnector`]s for `mcp://` and `melsec://` base addresses.
#[derive(Debug, Clone, Default)]
pub struct MitsubishiConnectorFactory {
    settings: ConnectorSettings,
}

impl MitsubishiConnectorFactory {
    /// Creates a factory with the given transport settings.
    pub fn new(settings: ConnectorSettings) -> Self {
        Self { settings }
    }
}

impl ConnectorFactory for MitsubishiConnectorFactory {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Mitsubishi
    }

    fn create(&self, base: &BaseAddress) -> Result<Box<dyn Connector>, ConnectorError> {
        if let Some(station) = base.path.first() {
            station
                .parse::<u8>()
                .map_err(|_| AddressError::invalid(&base.raw, format!("invalid station '{}'", station)))?;
        }
        Ok(Box::new(MitsubishiConnector::new(self.settings)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn tag(address: &str, quantity: u16) -> DeviceAddress {
        DeviceAddress {
            address: address.to_string(),
            unit_id: 0,
            entity: String::new(),
            quantity,
        }
    }

    #[test]
    fn test_parse_devices() {
        let addr: MelsecAddress = "D100".parse().unwrap();
        assert_eq!(addr.device, Device::D);
        assert_eq!(addr.number, 100);

        let addr: MelsecAddress = "x1f".parse().unwrap();
        assert_eq!(addr.device, Device::X);
        assert_eq!(addr.number, 0x1F);
        assert_eq!(addr.to_string(), "X1F");

        assert_eq!("W10".parse::<MelsecAddress>().unwrap().number, 0x10);
        assert_eq!("R0".parse::<MelsecAddress>().unwrap().device, Device::R);
        assert!("D1A".parse::<MelsecAddress>().is_err());
        assert!("Z10".parse::<MelsecAddress>().is_err());
        assert!("M".parse::<MelsecAddress>().is_err());
    }

    #[test]
    fn test_read_request_layout() {
        let addr: MelsecAddress = "D100".parse().unwrap();
        assert_eq!(
            read_request(0, &addr, 2),
            vec![
                0x50, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00, // subheader, route
                0x0C, 0x00, 0x10, 0x00, // length, timer
                0x01, 0x04, 0x00, 0x00, // batch read, word units
                0x64, 0x00, 0x00, 0xA8, 0x02, 0x00, // D100, 2 points
            ]
        );
    }

    #[test]
    fn test_bit_write_packs_nibbles() {
        let addr: MelsecAddress = "M10".parse().unwrap();
        let frame = write_request(0, &addr, &[1, 0, 1]);
        assert_eq!(&frame[13..15], &[0x01, 0x00]);
        assert_eq!(&frame[19..21], &[0x03, 0x00]);
        assert_eq!(&frame[21..], &[0x10, 0x10]);
        assert_eq!(unpack_bits(&[0x10, 0x10], 3), vec![1, 0, 1]);
    }

    #[test]
    fn test_odd_word_write_is_padded() {
        let addr: MelsecAddress = "D0".parse().unwrap();
        let frame = write_request(0, &addr, &[0x07]);
        assert_eq!(&frame[19..], &[0x01, 0x00, 0x07, 0x00]);
    }

    #[test]
    fn test_parse_response_end_code() {
        let ok = [0xD0, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00, 0x04, 0x00, 0x00, 0x00, 0x2A, 0x00];
        assert_eq!(parse_response(&ok, "read", "D0").unwrap(), &[0x2A, 0x00]);

        let rejected = [0xD0, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00, 0x02, 0x00, 0x56, 0xC0];
        let err = parse_response(&rejected, "read", "D99999").unwrap_err();
        assert!(matches!(err, PlcError::Device { code: 0xC056, .. }));
    }

    #[tokio::test]
    async fn test_read_write_against_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut memory = vec![0u8; 8];
            memory[..4].copy_from_slice(&750.0f32.to_le_bytes());
            let mut commands = Vec::new();
            loop {
                let mut header = [0u8; 9];
                if socket.read_exact(&mut header).await.is_err() {
                    return (commands, memory);
                }
                let mut body = vec![0u8; usize::from(u16::from_le_bytes([header[7], header[8]]))];
                socket.read_exact(&mut body).await.unwrap();
                let command = u16::from_le_bytes([body[2], body[3]]);
                let start = usize::from(body[6]) * 2;
                let points = usize::from(u16::from_le_bytes([body[10], body[11]]));
                commands.push(command);

                let mut reply = vec![0xD0, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00];
                let data = if command == COMMAND_BATCH_READ {
                    memory[start..start + points * 2].to_vec()
                } else {
                    memory[start..start + points * 2].copy_from_slice(&body[12..]);
                    Vec::new()
                };
                reply.extend_from_slice(&((data.len() + 2) as u16).to_le_bytes());
                reply.extend_from_slice(&[0x00, 0x00]);
                reply.extend_from_slice(&data);
                socket.write_all(&reply).await.unwrap();
            }
        });

        let base = BaseAddress::parse(&format!("mcp://127.0.0.1:{}", port)).unwrap();
        let mut connector = MitsubishiConnectorFactory::default().create(&base).unwrap();
        connector.connect("127.0.0.1", port).await.unwrap();

        let payload = connector.read(&tag("D0", 2)).await.unwrap();
        assert_eq!(payload, 750.0f32.to_le_bytes().to_vec());

        connector.write(&tag("D2", 1), &[0x34, 0x12], false).await.unwrap();
        connector.disconnect().await.unwrap();

        let (commands, memory) = server.await.unwrap();
        assert_eq!(commands, vec![COMMAND_BATCH_READ, COMMAND_BATCH_WRITE]);
        assert_eq!(&memory[4..6], &[0x34, 0x12]);
    }
}
