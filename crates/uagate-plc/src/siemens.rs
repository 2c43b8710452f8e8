// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Siemens S7 connector (S7comm over ISO-on-TCP).
//!
//! ```text
//! ┌──────────┬─────────────┬───────────────────────────┬──────────┬────────┐
//! │ TPKT (4) │ COTP DT (3) │ S7 header (10 job/12 ack) │ params   │ data   │
//! │ 03 00 len│ 02 F0 80    │ 32 rosctr .. ref plen dlen│ fn items │ values │
//! └──────────┴─────────────┴───────────────────────────┴──────────┴────────┘
//! ```
//!
//! The session opens with a COTP connection request addressed to
//! `rack * 0x20 + slot`, followed by the S7 setup-communication job that
//! negotiates the PDU size. Controllers store values big-endian; numeric
//! payloads are reversed into native order, strings (entity `string`) pass
//! through untouched.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use uagate_core::address::{BaseAddress, DeviceAddress};
use uagate_core::connector::{Connector, ConnectorFactory, ConnectorSettings, RemoteEndpoint};
use uagate_core::error::{AddressError, ConnectorError};
use uagate_core::types::ConnectorKind;

use crate::error::{PlcError, PlcResult};
use crate::transport::{be_u16, TcpLink};

const PROTOCOL: &str = "S7";

const TPKT_HEADER: usize = 4;
const COTP_CONNECT_REQUEST: u8 = 0xE0;
const COTP_CONNECT_CONFIRM: u8 = 0xD0;
const ROSCTR_JOB: u8 = 0x01;
const ROSCTR_ACK_DATA: u8 = 0x03;
const FUNCTION_SETUP: u8 = 0xF0;
const FUNCTION_READ: u8 = 0x04;
const FUNCTION_WRITE: u8 = 0x05;
const RETURN_SUCCESS: u8 = 0xFF;

/// Offset of the parameter block in an ack-data response.
const ACK_PARAMS: usize = 19;
/// Fixed overhead of a read response around the payload.
const READ_OVERHEAD: u16 = 18;
/// PDU size requested during setup.
const REQUESTED_PDU: u16 = 960;

// =============================================================================
// Addressing
// =============================================================================

/// S7 memory area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum S7Area {
    /// Data block `DB<n>`.
    DataBlock(u16),
    /// Flags (`M`).
    Merker,
    /// Process inputs (`I`).
    Input,
    /// Process outputs (`Q`).
    Output,
}

impl S7Area {
    /// Returns the area code used in request items.
    pub fn code(&self) -> u8 {
        match self {
            S7Area::DataBlock(_) => 0x84,
            S7Area::Merker => 0x83,
            S7Area::Input => 0x81,
            S7Area::Output => 0x82,
        }
    }

    fn db_number(&self) -> u16 {
        match self {
            S7Area::DataBlock(n) => *n,
            _ => 0,
        }
    }
}

/// A parsed S7 tag address: `DB1.10`, `DB1.DBX10.3`, `M20`, `I0.1`, `Q4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct S7Address {
    /// Memory area.
    pub area: S7Area,
    /// Byte offset.
    pub byte: u32,
    /// Bit within the byte for single-bit access.
    pub bit: Option<u8>,
}

impl S7Address {
    /// Returns the 24-bit item address (`byte * 8 + bit`).
    pub fn item_address(&self) -> u32 {
        self.byte * 8 + u32::from(self.bit.unwrap_or(0))
    }
}

impl FromStr for S7Address {
    type Err = PlcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_ascii_uppercase();
        let invalid = |message: &str| PlcError::address(s, message);

        let (area, offset) = if let Some(rest) = text.strip_prefix("DB") {
            let (number, offset) = rest
                .split_once('.')
                .ok_or_else(|| invalid("expected DB<n>.<byte>"))?;
            let number = number
                .parse::<u16>()
                .map_err(|_| invalid("invalid data block number"))?;
            let offset = ["DBX", "DBB", "DBW", "DBD"]
                .iter()
                .find_map(|p| offset.strip_prefix(p))
                .unwrap_or(offset);
            (S7Area::DataBlock(number), offset)
        } else if let Some(rest) = text.strip_prefix('M') {
            (S7Area::Merker, rest)
        } else if let Some(rest) = text.strip_prefix('I').or_else(|| text.strip_prefix('E')) {
            (S7Area::Input, rest)
        } else if let Some(rest) = text.strip_prefix('Q').or_else(|| text.strip_prefix('A')) {
            (S7Area::Output, rest)
        } else {
            return Err(invalid("expected DB<n>.<byte>, M<byte>, I<byte> or Q<byte>"));
        };

        let (byte, bit) = match offset.split_once('.') {
            Some((byte, bit)) => {
                let bit = bit
                    .parse::<u8>()
                    .ok()
                    .filter(|b| *b < 8)
                    .ok_or_else(|| invalid("bit must be 0-7"))?;
                (byte, Some(bit))
            }
            None => (offset, None),
        };
        let byte = byte
            .parse::<u32>()
            .ok()
            .filter(|b| *b < 0x1F_FFFF)
            .ok_or_else(|| invalid("invalid byte offset"))?;

        Ok(Self { area, byte, bit })
    }
}

impl fmt::Display for S7Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.area {
            S7Area::DataBlock(n) => write!(f, "DB{}.{}", n, self.byte)?,
            S7Area::Merker => write!(f, "M{}", self.byte)?,
            S7Area::Input => write!(f, "I{}", self.byte)?,
            S7Area::Output => write!(f, "Q{}", self.byte)?,
        }
        if let Some(bit) = self.bit {
            write!(f, ".{}", bit)?;
        }
        Ok(())
    }
}

// =============================================================================
// Frames
// =============================================================================

/// Builds the COTP connection request for `rack`/`slot`.
pub fn connection_request(rack: u8, slot: u8) -> Vec<u8> {
    vec![
        0x03, 0x00, 0x00, 0x16, // TPKT
        0x11, COTP_CONNECT_REQUEST, 0x00, 0x00, 0x00, 0x01, 0x00, // COTP CR
        0xC0, 0x01, 0x0A, // TPDU size 1024
        0xC1, 0x02, 0x01, 0x00, // source TSAP
        0xC2, 0x02, 0x01, rack.wrapping_mul(0x20).wrapping_add(slot), // destination TSAP
    ]
}

fn job(pdu_ref: u16, params: &[u8], data: &[u8]) -> Vec<u8> {
    let total = TPKT_HEADER + 3 + 10 + params.len() + data.len();
    let mut frame = Vec::with_capacity(total);
    frame.extend_from_slice(&[0x03, 0x00]);
    frame.extend_from_slice(&(total as u16).to_be_bytes());
    frame.extend_from_slice(&[0x02, 0xF0, 0x80]);
    frame.extend_from_slice(&[0x32, ROSCTR_JOB, 0x00, 0x00]);
    frame.extend_from_slice(&pdu_ref.to_be_bytes());
    frame.extend_from_slice(&(params.len() as u16).to_be_bytes());
    frame.extend_from_slice(&(data.len() as u16).to_be_bytes());
    frame.extend_from_slice(params);
    frame.extend_from_slice(data);
    frame
}

/// Builds the setup-communication job.
pub fn setup_communication(pdu_ref: u16, pdu_size: u16) -> Vec<u8> {
    let mut params = vec![FUNCTION_SETUP, 0x00, 0x00, 0x01, 0x00, 0x01];
    params.extend_from_slice(&pdu_size.to_be_bytes());
    job(pdu_ref, &params, &[])
}

fn item(address: &S7Address, length: u16) -> [u8; 12] {
    let transport_size = if address.bit.is_some() { 0x01 } else { 0x02 };
    let [_, a2, a1, a0] = address.item_address().to_be_bytes();
    let [l1, l0] = length.to_be_bytes();
    let [d1, d0] = address.area.db_number().to_be_bytes();
    [
        0x12, 0x0A, 0x10, transport_size, l1, l0, d1, d0, address.area.code(), a2, a1, a0,
    ]
}

/// Builds a read-variable job for `length` bytes (one bit for bit addresses).
pub fn read_request(pdu_ref: u16, address: &S7Address, length: u16) -> Vec<u8> {
    let length = if address.bit.is_some() { 1 } else { length };
    let mut params = vec![FUNCTION_READ, 0x01];
    params.extend_from_slice(&item(address, length));
    job(pdu_ref, &params, &[])
}

/// Builds a write-variable job.
pub fn write_request(pdu_ref: u16, address: &S7Address, payload: &[u8]) -> Vec<u8> {
    let (length, transport_size, bits) = match address.bit {
        Some(_) => (1u16, 0x03u8, 1u16),
        None => (payload.len() as u16, 0x04, (payload.len() * 8) as u16),
    };
    let mut params = vec![FUNCTION_WRITE, 0x01];
    params.extend_from_slice(&item(address, length));

    let mut data = vec![0x00, transport_size];
    data.extend_from_slice(&bits.to_be_bytes());
    match address.bit {
        Some(_) => data.push(u8::from(payload.iter().any(|b| *b != 0))),
        None => data.extend_from_slice(payload),
    }
    job(pdu_ref, &params, &data)
}

fn tpkt_body_len(header: &[u8]) -> PlcResult<usize> {
    let total = usize::from(be_u16(header, 2, PROTOCOL)?);
    total
        .checked_sub(TPKT_HEADER)
        .ok_or_else(|| PlcError::frame(PROTOCOL, format!("TPKT length {} below header size", total)))
}

/// Validates an ack-data frame and returns its data block.
fn ack_data<'a>(frame: &'a [u8], function: u8, operation: &'static str, address: &str) -> PlcResult<&'a [u8]> {
    if frame.len() < ACK_PARAMS + 2 || frame[7] != 0x32 {
        return Err(PlcError::frame(PROTOCOL, "response shorter than an S7 header"));
    }
    if frame[8] != ROSCTR_ACK_DATA {
        return Err(PlcError::frame(PROTOCOL, format!("unexpected ROSCTR 0x{:02X}", frame[8])));
    }
    let (class, code) = (frame[17], frame[18]);
    if class != 0 || code != 0 {
        return Err(PlcError::device(
            PROTOCOL,
            operation,
            address,
            u32::from(class) << 8 | u32::from(code),
            "job rejected",
        ));
    }
    if frame[ACK_PARAMS] != function {
        return Err(PlcError::frame(PROTOCOL, format!("unexpected function 0x{:02X}", frame[ACK_PARAMS])));
    }
    let param_len = usize::from(be_u16(frame, 13, PROTOCOL)?);
    frame
        .get(ACK_PARAMS + param_len..)
        .ok_or_else(|| PlcError::frame(PROTOCOL, "parameter block exceeds frame"))
}

fn check_return_code(code: u8, operation: &'static str, address: &str) -> PlcResult<()> {
    if code == RETURN_SUCCESS {
        return Ok(());
    }
    let message = match code {
        0x01 => "hardware fault",
        0x03 => "access denied",
        0x05 => "address out of range",
        0x06 => "data type not supported",
        0x07 => "data type inconsistent",
        0x0A => "object does not exist",
        _ => "unknown return code",
    };
    Err(PlcError::device(PROTOCOL, operation, address, u32::from(code), message))
}

/// Extracts the payload of a read-variable response.
pub fn parse_read_response(frame: &[u8], address: &str) -> PlcResult<Vec<u8>> {
    let data = ack_data(frame, FUNCTION_READ, "read", address)?;
    if data.len() < 4 {
        return Err(PlcError::frame(PROTOCOL, "read response without data item"));
    }
    check_return_code(data[0], "read", address)?;
    let length = usize::from(u16::from_be_bytes([data[2], data[3]]));
    // Bit, byte and integer transport sizes count bits; the rest count bytes.
    let bytes = match data[1] {
        0x03..=0x05 => length.div_ceil(8),
        _ => length,
    };
    data.get(4..4 + bytes)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| PlcError::frame(PROTOCOL, format!("data item announces {} bytes", bytes)))
}

/// Checks a write-variable response.
pub fn parse_write_response(frame: &[u8], address: &str) -> PlcResult<()> {
    let data = ack_data(frame, FUNCTION_WRITE, "write", address)?;
    let code = *data
        .first()
        .ok_or_else(|| PlcError::frame(PROTOCOL, "write response without return code"))?;
    check_return_code(code, "write", address)
}

fn is_text(entity: &str) -> bool {
    entity.eq_ignore_ascii_case("string") || entity.eq_ignore_ascii_case("bytes")
}

// =============================================================================
// SiemensConnector
// =============================================================================

/// S7 connector for one controller.
pub struct SiemensConnector {
    settings: ConnectorSettings,
    rack: u8,
    slot: u8,
    link: Option<TcpLink>,
    pdu_size: u16,
    pdu_ref: u16,
    endpoint: Option<RemoteEndpoint>,
}

impl SiemensConnector {
    /// Creates an unconnected connector for the CPU at `rack`/`slot`.
    pub fn new(settings: ConnectorSettings, rack: u8, slot: u8) -> Self {
        Self {
            settings,
            rack,
            slot,
            link: None,
            pdu_size: REQUESTED_PDU,
            pdu_ref: 0,
            endpoint: None,
        }
    }

    /// Returns the PDU size negotiated at connect.
    pub fn pdu_size(&self) -> u16 {
        self.pdu_size
    }

    fn next_ref(&mut self) -> u16 {
        self.pdu_ref = self.pdu_ref.wrapping_add(1);
        self.pdu_ref
    }

    async fn transact(&mut self, operation: &'static str, request: Vec<u8>) -> PlcResult<Vec<u8>> {
        let link = self.link.as_mut().ok_or(PlcError::NotConnected)?;
        link.transact(operation, &request, TPKT_HEADER, tpkt_body_len).await
    }

    async fn handshake(&mut self) -> PlcResult<()> {
        let confirm = self
            .transact("connect", connection_request(self.rack, self.slot))
            .await?;
        if confirm.get(5) != Some(&COTP_CONNECT_CONFIRM) {
            return Err(PlcError::frame(PROTOCOL, "COTP connection refused"));
        }

        let pdu_ref = self.next_ref();
        let ack = self
            .transact("connect", setup_communication(pdu_ref, REQUESTED_PDU))
            .await?;
        ack_data(&ack, FUNCTION_SETUP, "read", "setup")?;
        self.pdu_size = be_u16(&ack, ACK_PARAMS + 6, PROTOCOL)?;
        Ok(())
    }
}

#[async_trait]
impl Connector for SiemensConnector {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Siemens
    }

    fn validate_address(&self, address: &DeviceAddress) -> Result<(), AddressError> {
        let parsed: S7Address = address.address.parse()?;
        if parsed.bit.is_none() && address.quantity > self.pdu_size.saturating_sub(READ_OVERHEAD) {
            return Err(AddressError::invalid(
                &address.address,
                format!("quantity {} exceeds the PDU", address.quantity),
            ));
        }
        Ok(())
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<(), ConnectorError> {
        let endpoint = format!("{}:{}", host, port);
        self.link = Some(
            TcpLink::connect(host, port, self.settings.connect_timeout, self.settings.operation_timeout)
                .await?,
        );
        if let Err(e) = self.handshake().await {
            if let Some(link) = self.link.take() {
                link.close().await;
            }
            return Err(ConnectorError::connection(endpoint, e.to_string()));
        }

        self.endpoint = Some(RemoteEndpoint::new(host, port));
        tracing::info!(endpoint = %endpoint, rack = self.rack, slot = self.slot, pdu = self.pdu_size, "Connected to S7 controller");
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
        let parsed: S7Address = address.address.parse()?;
        let pdu_ref = self.next_ref();
        let frame = self
            .transact("read", read_request(pdu_ref, &parsed, address.quantity))
            .await
            .map_err(|e| e.into_read(&address.address))?;
        let mut payload =
            parse_read_response(&frame, &address.address).map_err(|e| e.into_read(&address.address))?;
        if !is_text(&address.entity) {
            payload.reverse();
        }
        Ok(payload)
    }

    async fn write(
        &mut self,
        address: &DeviceAddress,
        data: &[u8],
        _is_coil: bool,
    ) -> Result<(), ConnectorError> {
        let parsed: S7Address = address.address.parse()?;
        let mut payload = data.to_vec();
        if !is_text(&address.entity) {
            payload.reverse();
        }
        let pdu_ref = self.next_ref();
        let frame = self
            .transact("write", write_request(pdu_ref, &parsed, &payload))
            .await
            .map_err(|e| e.into_write(&address.address))?;
        parse_write_response(&frame, &address.address).map_err(|e| e.into_write(&address.address))
    }

    fn remote_endpoint(&self) -> Option<RemoteEndpoint> {
        self.endpoint.clone()
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Creates [`SiemensConnector`]s for `s7://host:port[/rack/slot]`.
#[derive(Debug, Clone, Default)]
pub struct SiemensConnectorFactory {
    settings: ConnectorSettings,
}

impl SiemensConnectorFactory {
    /// Creates a factory with the given transport settings.
    pub fn new(settings: ConnectorSettings) -> Self {
        Self { settings }
    }
}

impl ConnectorFactory for SiemensConnectorFactory {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Siemens
    }

    fn create(&self, base: &BaseAddress) -> Result<Box<dyn Connector>, ConnectorError> {
        let segment = |index: usize, default: u8| -> Result<u8, AddressError> {
            match base.path.get(index) {
                None => Ok(default),
                Some(s) => s
                    .parse::<u8>()
                    .map_err(|_| AddressError::invalid(&base.raw, format!("invalid rack/slot '{}'", s))),
            }
        };
        let rack = segment(0, 0)?;
        let slot = segment(1, 1)?;
        if rack > 7 || slot > 31 {
            return Err(AddressError::invalid(&base.raw, "rack must be 0-7 and slot 0-31").into());
        }
        Ok(Box::new(SiemensConnector::new(self.settings, rack, slot)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn tag(address: &str, entity: &str, quantity: u16) -> DeviceAddress {
        DeviceAddress {
            address: address.to_string(),
            unit_id: 0,
            entity: entity.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_parse_addresses() {
        let addr: S7Address = "DB1.10".parse().unwrap();
        assert_eq!(addr.area, S7Area::DataBlock(1));
        assert_eq!(addr.byte, 10);
        assert_eq!(addr.bit, None);

        let addr: S7Address = "db5.dbx4.3".parse().unwrap();
        assert_eq!(addr.area, S7Area::DataBlock(5));
        assert_eq!(addr.item_address(), 35);
        assert_eq!(addr.to_string(), "DB5.4.3");

        assert_eq!("M20".parse::<S7Address>().unwrap().area, S7Area::Merker);
        assert_eq!("I0.1".parse::<S7Address>().unwrap().bit, Some(1));
        assert_eq!("Q4".parse::<S7Address>().unwrap().area, S7Area::Output);

        assert!("DB1".parse::<S7Address>().is_err());
        assert!("M10.8".parse::<S7Address>().is_err());
        assert!("T5".parse::<S7Address>().is_err());
    }

    #[test]
    fn test_connection_request_tsap() {
        let frame = connection_request(0, 2);
        assert_eq!(frame.len(), 0x16);
        assert_eq!(frame[5], COTP_CONNECT_REQUEST);
        assert_eq!(&frame[18..22], &[0xC2, 0x02, 0x01, 0x02]);
        assert_eq!(connection_request(1, 3)[21], 0x23);
    }

    #[test]
    fn test_read_request_layout() {
        let addr: S7Address = "DB1.10".parse().unwrap();
        let frame = read_request(7, &addr, 4);
        assert_eq!(
            frame,
            vec![
                0x03, 0x00, 0x00, 0x1F, 0x02, 0xF0, 0x80, // TPKT + COTP
                0x32, 0x01, 0x00, 0x00, 0x00, 0x07, 0x00, 0x0E, 0x00, 0x00, // header
                0x04, 0x01, // read, 1 item
                0x12, 0x0A, 0x10, 0x02, 0x00, 0x04, 0x00, 0x01, 0x84, 0x00, 0x00, 0x50,
            ]
        );
    }

    #[test]
    fn test_write_request_bit() {
        let addr: S7Address = "M2.5".parse().unwrap();
        let frame = write_request(1, &addr, &[1]);
        let data = &frame[frame.len() - 5..];
        assert_eq!(data, &[0x00, 0x03, 0x00, 0x01, 0x01]);
        // Item: bit transport size, area M, address 2*8+5.
        assert_eq!(&frame[20..31], &[0x0A, 0x10, 0x01, 0x00, 0x01, 0x00, 0x00, 0x83, 0x00, 0x00, 0x15]);
    }

    fn ack(function: u8, params_extra: &[u8], data: &[u8]) -> Vec<u8> {
        let mut params = vec![function];
        params.extend_from_slice(params_extra);
        let total = 4 + 3 + 12 + params.len() + data.len();
        let mut frame = vec![0x03, 0x00];
        frame.extend_from_slice(&(total as u16).to_be_bytes());
        frame.extend_from_slice(&[0x02, 0xF0, 0x80, 0x32, ROSCTR_ACK_DATA, 0x00, 0x00, 0x00, 0x01]);
        frame.extend_from_slice(&(params.len() as u16).to_be_bytes());
        frame.extend_from_slice(&(data.len() as u16).to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x00]);
        frame.extend_from_slice(&params);
        frame.extend_from_slice(data);
        frame
    }

    #[test]
    fn test_parse_read_response() {
        let frame = ack(FUNCTION_READ, &[0x01], &[0xFF, 0x04, 0x00, 0x20, 0x41, 0x48, 0x00, 0x00]);
        assert_eq!(parse_read_response(&frame, "DB1.0").unwrap(), vec![0x41, 0x48, 0x00, 0x00]);

        let frame = ack(FUNCTION_READ, &[0x01], &[0x0A, 0x00, 0x00, 0x00]);
        let err = parse_read_response(&frame, "DB9.0").unwrap_err();
        assert!(matches!(err, PlcError::Device { code: 0x0A, .. }));

        let mut frame = ack(FUNCTION_READ, &[0x01], &[]);
        frame[17] = 0x85;
        assert!(matches!(
            parse_read_response(&frame, "DB1.0").unwrap_err(),
            PlcError::Device { code: 0x8500, .. }
        ));
    }

    /// Answers the handshake, one read with `payload` and one write.
    async fn serve(mut socket: TcpStream, payload: Vec<u8>) -> Vec<Vec<u8>> {
        let mut seen = Vec::new();
        loop {
            let mut header = [0u8; 4];
            if socket.read_exact(&mut header).await.is_err() {
                return seen;
            }
            let len = usize::from(u16::from_be_bytes([header[2], header[3]]));
            let mut body = vec![0u8; len - 4];
            socket.read_exact(&mut body).await.unwrap();
            let mut frame = header.to_vec();
            frame.extend_from_slice(&body);

            let response = if frame[5] == COTP_CONNECT_REQUEST {
                let mut cc = connection_request(0, 1);
                cc[5] = COTP_CONNECT_CONFIRM;
                cc
            } else {
                match frame[17] {
                    FUNCTION_SETUP => ack(FUNCTION_SETUP, &[0x00, 0x00, 0x01, 0x00, 0x01, 0x01, 0xE0], &[]),
                    FUNCTION_READ => {
                        let mut data = vec![0xFF, 0x04];
                        data.extend_from_slice(&((payload.len() * 8) as u16).to_be_bytes());
                        data.extend_from_slice(&payload);
                        ack(FUNCTION_READ, &[0x01], &data)
                    }
                    _ => ack(FUNCTION_WRITE, &[0x01], &[0xFF]),
                }
            };
            seen.push(frame);
            socket.write_all(&response).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_read_write_against_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            serve(socket, 12.5f32.to_be_bytes().to_vec()).await
        });

        let base = BaseAddress::parse(&format!("s7://127.0.0.1:{}/0/1", port)).unwrap();
        let mut connector = SiemensConnectorFactory::default().create(&base).unwrap();
        connector.connect("127.0.0.1", port).await.unwrap();
        assert!(connector.is_connected());

        let payload = connector.read(&tag("DB1.0", "", 4)).await.unwrap();
        assert_eq!(payload, 12.5f32.to_le_bytes().to_vec());

        connector
            .write(&tag("DB1.4", "", 2), &0x1234u16.to_le_bytes(), false)
            .await
            .unwrap();
        connector.disconnect().await.unwrap();

        let frames = server.await.unwrap();
        assert_eq!(frames.len(), 4);
        let write = frames.last().unwrap();
        assert_eq!(&write[write.len() - 2..], &[0x12, 0x34]);
    }

    #[test]
    fn test_factory_rack_slot() {
        let factory = SiemensConnectorFactory::default();
        let base = BaseAddress::parse("s7://10.0.0.2:102/0/2").unwrap();
        assert!(factory.create(&base).is_ok());
        let base = BaseAddress::parse("s7://10.0.0.2:102/9/1").unwrap();
        assert!(factory.create(&base).is_err());
        let base = BaseAddress::parse("s7://10.0.0.2:102/x").unwrap();
        assert!(factory.create(&base).is_err());
    }

    #[tokio::test]
    async fn test_read_without_session() {
        let mut connector = SiemensConnector::new(ConnectorSettings::default(), 0, 1);
        let err = connector.read(&tag("M0", "", 1)).await.unwrap_err();
        assert!(matches!(err, ConnectorError::NotConnected));
    }
}
