// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Rockwell Logix connector (CIP over EtherNet/IP).
//!
//! Tags are read and written by symbolic name through unconnected
//! messaging: each request is a `SendRRData` encapsulation carrying an
//! Unconnected Send to the connection manager, which routes the embedded
//! Read Tag / Write Tag service over the backplane to the CPU slot.
//!
//! ```text
//! encapsulation (24) | iface(4) tmo(2) n(2) | null item | B2 item: 52 .. [4C/4D path data] .. route 01 slot
//! ```
//!
//! CIP is little-endian, so payloads are exchanged in native order.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use uagate_core::address::{BaseAddress, DeviceAddress};
use uagate_core::connector::{Connector, ConnectorFactory, ConnectorSettings, RemoteEndpoint};
use uagate_core::error::{AddressError, ConnectorError};
use uagate_core::types::ConnectorKind;

use crate::error::{PlcError, PlcResult};
use crate::transport::{le_u16, le_u32, TcpLink};

const PROTOCOL: &str = "EtherNet/IP";

const ENCAPSULATION_HEADER: usize = 24;
const COMMAND_REGISTER_SESSION: u16 = 0x0065;
const COMMAND_UNREGISTER_SESSION: u16 = 0x0066;
const COMMAND_SEND_RR_DATA: u16 = 0x006F;
const ITEM_UNCONNECTED_DATA: u16 = 0x00B2;

const SERVICE_READ_TAG: u8 = 0x4C;
const SERVICE_WRITE_TAG: u8 = 0x4D;
const SERVICE_UNCONNECTED_SEND: u8 = 0x52;
const REPLY_FLAG: u8 = 0x80;
const SEGMENT_SYMBOLIC: u8 = 0x91;
const STRUCT_TYPE: u16 = 0x02A0;

// =============================================================================
// Types
// =============================================================================

/// Atomic CIP data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipType {
    /// BOOL
    Bool,
    /// SINT
    Sint,
    /// INT
    Int,
    /// DINT
    Dint,
    /// LINT
    Lint,
    /// REAL
    Real,
    /// LREAL
    Lreal,
}

impl CipType {
    /// Returns the CIP type code.
    pub fn code(&self) -> u16 {
        match self {
            CipType::Bool => 0xC1,
            CipType::Sint => 0xC2,
            CipType::Int => 0xC3,
            CipType::Dint => 0xC4,
            CipType::Lint => 0xC5,
            CipType::Real => 0xCA,
            CipType::Lreal => 0xCB,
        }
    }

    /// Returns the size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            CipType::Bool | CipType::Sint => 1,
            CipType::Int => 2,
            CipType::Dint | CipType::Real => 4,
            CipType::Lint | CipType::Lreal => 8,
        }
    }

    /// Maps a type code back to the type.
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            0xC1 => CipType::Bool,
            0xC2 => CipType::Sint,
            0xC3 => CipType::Int,
            0xC4 => CipType::Dint,
            0xC5 => CipType::Lint,
            0xCA => CipType::Real,
            0xCB => CipType::Lreal,
            _ => return None,
        })
    }
}

impl FromStr for CipType {
    type Err = PlcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "BOOL" => CipType::Bool,
            "SINT" => CipType::Sint,
            "INT" => CipType::Int,
            "DINT" => CipType::Dint,
            "LINT" => CipType::Lint,
            "REAL" => CipType::Real,
            "LREAL" => CipType::Lreal,
            _ => return Err(PlcError::address(s, "unknown CIP type")),
        })
    }
}

impl fmt::Display for CipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CipType::Bool => "BOOL",
            CipType::Sint => "SINT",
            CipType::Int => "INT",
            CipType::Dint => "DINT",
            CipType::Lint => "LINT",
            CipType::Real => "REAL",
            CipType::Lreal => "LREAL",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Frames
// =============================================================================

/// Encodes a tag name as an EPATH of symbolic and element segments.
///
/// `Program:Main.Speed` becomes two symbolic segments, `Temps[3]` a symbolic
/// segment followed by an element segment.
pub fn symbolic_path(tag: &str) -> PlcResult<Vec<u8>> {
    let mut path = Vec::new();
    for part in tag.split('.') {
        let (name, index) = match part.split_once('[') {
            Some((name, rest)) => {
                let index = rest
                    .strip_suffix(']')
                    .and_then(|i| i.trim().parse::<u32>().ok())
                    .ok_or_else(|| PlcError::address(tag, "invalid array index"))?;
                (name, Some(index))
            }
            None => (part, None),
        };
        if name.is_empty() || name.len() > 255 || !name.is_ascii() {
            return Err(PlcError::address(tag, "tag name segments must be 1-255 ASCII characters"));
        }
        path.push(SEGMENT_SYMBOLIC);
        path.push(name.len() as u8);
        path.extend_from_slice(name.as_bytes());
        if name.len() % 2 == 1 {
            path.push(0);
        }
        match index {
            Some(i) if i <= 0xFF => path.extend_from_slice(&[0x28, i as u8]),
            Some(i) if i <= 0xFFFF => {
                path.extend_from_slice(&[0x29, 0x00]);
                path.extend_from_slice(&(i as u16).to_le_bytes());
            }
            Some(i) => {
                path.extend_from_slice(&[0x2A, 0x00]);
                path.extend_from_slice(&i.to_le_bytes());
            }
            None => {}
        }
    }
    Ok(path)
}

fn encapsulation(command: u16, session: u32, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(ENCAPSULATION_HEADER + data.len());
    frame.extend_from_slice(&command.to_le_bytes());
    frame.extend_from_slice(&(data.len() as u16).to_le_bytes());
    frame.extend_from_slice(&session.to_le_bytes());
    frame.extend_from_slice(&[0u8; 4]); // status
    frame.extend_from_slice(b"uagate\0\0"); // sender context
    frame.extend_from_slice(&[0u8; 4]); // options
    frame.extend_from_slice(data);
    frame
}

/// Builds the RegisterSession request.
pub fn register_session() -> Vec<u8> {
    encapsulation(COMMAND_REGISTER_SESSION, 0, &[0x01, 0x00, 0x00, 0x00])
}

/// Wraps an embedded CIP request into Unconnected Send and `SendRRData`.
pub fn send_rr_data(session: u32, slot: u8, embedded: &[u8]) -> Vec<u8> {
    let mut cip = vec![SERVICE_UNCONNECTED_SEND, 0x02, 0x20, 0x06, 0x24, 0x01, 0x0A, 0x05];
    cip.extend_from_slice(&(embedded.len() as u16).to_le_bytes());
    cip.extend_from_slice(embedded);
    if embedded.len() % 2 == 1 {
        cip.push(0);
    }
    cip.extend_from_slice(&[0x01, 0x00, 0x01, slot]);

    let mut data = vec![0, 0, 0, 0, 0x0A, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00];
    data.extend_from_slice(&ITEM_UNCONNECTED_DATA.to_le_bytes());
    data.extend_from_slice(&(cip.len() as u16).to_le_bytes());
    data.extend_from_slice(&cip);
    encapsulation(COMMAND_SEND_RR_DATA, session, &data)
}

fn service_request(service: u8, path: &[u8], data: &[u8]) -> Vec<u8> {
    let mut request = vec![service, (path.len() / 2) as u8];
    request.extend_from_slice(path);
    request.extend_from_slice(data);
    request
}

/// Builds a Read Tag request for `elements` elements.
pub fn read_tag(path: &[u8], elements: u16) -> Vec<u8> {
    service_request(SERVICE_READ_TAG, path, &elements.to_le_bytes())
}

/// Builds a Write Tag request.
pub fn write_tag(path: &[u8], cip_type: CipType, elements: u16, payload: &[u8]) -> Vec<u8> {
    let mut data = cip_type.code().to_le_bytes().to_vec();
    data.extend_from_slice(&elements.to_le_bytes());
    data.extend_from_slice(payload);
    service_request(SERVICE_WRITE_TAG, path, &data)
}

fn general_status_message(status: u8) -> &'static str {
    match status {
        0x04 => "path segment error",
        0x05 => "path destination unknown",
        0x08 => "service not supported",
        0x13 => "not enough data",
        0x1E => "embedded service error",
        0x26 => "path size invalid",
        0xFF => "general error",
        _ => "request rejected",
    }
}

/// Extracts the CIP reply of a `SendRRData` response and checks its status.
///
/// Returns the reply data after the status fields.
pub fn parse_reply<'a>(
    frame: &'a [u8],
    service: u8,
    operation: &'static str,
    tag: &str,
) -> PlcResult<&'a [u8]> {
    let status = le_u32(frame, 8, PROTOCOL)?;
    if status != 0 {
        return Err(PlcError::device(PROTOCOL, operation, tag, status, "encapsulation error"));
    }
    let count = le_u16(frame, ENCAPSULATION_HEADER + 6, PROTOCOL)?;
    let mut offset = ENCAPSULATION_HEADER + 8;
    let mut reply = None;
    for _ in 0..count {
        let item_type = le_u16(frame, offset, PROTOCOL)?;
        let len = usize::from(le_u16(frame, offset + 2, PROTOCOL)?);
        let data = frame
            .get(offset + 4..offset + 4 + len)
            .ok_or_else(|| PlcError::frame(PROTOCOL, "item exceeds frame"))?;
        if item_type == ITEM_UNCONNECTED_DATA {
            reply = Some(data);
        }
        offset += 4 + len;
    }
    let reply = reply.ok_or_else(|| PlcError::frame(PROTOCOL, "no unconnected data item"))?;

    if reply.len() < 4 || reply[0] != service | REPLY_FLAG {
        return Err(PlcError::frame(PROTOCOL, "unexpected CIP reply service"));
    }
    let general = reply[2];
    let extended_words = usize::from(reply[3]);
    // 0x06 (partial transfer) still carries valid data.
    if general != 0 && general != 0x06 {
        let extended = reply
            .get(4..6)
            .filter(|_| extended_words > 0)
            .map_or(0, |b| u32::from(u16::from_le_bytes([b[0], b[1]])));
        return Err(PlcError::device(
            PROTOCOL,
            operation,
            tag,
            u32::from(general) << 16 | extended,
            general_status_message(general),
        ));
    }
    reply
        .get(4 + extended_words * 2..)
        .ok_or_else(|| PlcError::frame(PROTOCOL, "extended status exceeds reply"))
}

/// Splits Read Tag reply data into the type code and the value bytes.
pub fn split_typed(data: &[u8]) -> PlcResult<(u16, &[u8])> {
    let code = le_u16(data, 0, PROTOCOL)?;
    let skip = if code == STRUCT_TYPE { 4 } else { 2 };
    let value = data
        .get(skip..)
        .ok_or_else(|| PlcError::frame(PROTOCOL, "reply data shorter than type header"))?;
    Ok((code, value))
}

fn encapsulation_body_len(header: &[u8]) -> PlcResult<usize> {
    Ok(usize::from(le_u16(header, 2, PROTOCOL)?))
}

// =============================================================================
// RockwellConnector
// =============================================================================

/// EtherNet/IP connector for one Logix controller.
pub struct RockwellConnector {
    settings: ConnectorSettings,
    slot: u8,
    link: Option<TcpLink>,
    session: u32,
    endpoint: Option<RemoteEndpoint>,
}

impl RockwellConnector {
    /// Creates an unconnected connector for the CPU in `slot`.
    pub fn new(settings: ConnectorSettings, slot: u8) -> Self {
        Self {
            settings,
            slot,
            link: None,
            session: 0,
            endpoint: None,
        }
    }

    async fn transact(&mut self, operation: &'static str, request: Vec<u8>) -> PlcResult<Vec<u8>> {
        let link = self.link.as_mut().ok_or(PlcError::NotConnected)?;
        link.transact(operation, &request, ENCAPSULATION_HEADER, encapsulation_body_len)
            .await
    }

    async fn request(&mut self, operation: &'static str, service: u8, embedded: Vec<u8>, tag: &str) -> PlcResult<Vec<u8>> {
        let frame = self
            .transact(operation, send_rr_data(self.session, self.slot, &embedded))
            .await?;
        parse_reply(&frame, service, operation, tag).map(<[u8]>::to_vec)
    }

    async fn read_typed(&mut self, tag: &str, elements: u16) -> PlcResult<(u16, Vec<u8>)> {
        let path = symbolic_path(tag)?;
        let data = self
            .request("read", SERVICE_READ_TAG, read_tag(&path, elements), tag)
            .await?;
        let (code, value) = split_typed(&data)?;
        Ok((code, value.to_vec()))
    }
}

#[async_trait]
impl Connector for RockwellConnector {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Rockwell
    }

    fn validate_address(&self, address: &DeviceAddress) -> Result<(), AddressError> {
        symbolic_path(&address.address)?;
        if !address.entity.is_empty() {
            address.entity.parse::<CipType>()?;
        }
        Ok(())
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<(), ConnectorError> {
        let endpoint = format!("{}:{}", host, port);
        self.link = Some(
            TcpLink::connect(host, port, self.settings.connect_timeout, self.settings.operation_timeout)
                .await?,
        );
        let registered = match self.transact("connect", register_session()).await {
            Ok(frame) => match le_u32(&frame, 8, PROTOCOL) {
                Ok(0) => le_u32(&frame, 4, PROTOCOL),
                Ok(status) => Err(PlcError::frame(PROTOCOL, format!("RegisterSession status 0x{:X}", status))),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        match registered {
            Ok(session) => self.session = session,
            Err(e) => {
                if let Some(link) = self.link.take() {
                    link.close().await;
                }
                return Err(ConnectorError::connection(endpoint, e.to_string()));
            }
        }

        self.endpoint = Some(RemoteEndpoint::new(host, port));
        tracing::info!(endpoint = %endpoint, session = self.session, slot = self.slot, "Registered EtherNet/IP session");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ConnectorError> {
        if let Some(mut link) = self.link.take() {
            let unregister = encapsulation(COMMAND_UNREGISTER_SESSION, self.session, &[]);
            if let Err(e) = link.send("disconnect", &unregister).await {
                tracing::debug!(error = %e, "UnRegisterSession failed");
            }
            link.close().await;
        }
        self.session = 0;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    async fn read(&mut self, address: &DeviceAddress) -> Result<Vec<u8>, ConnectorError> {
        let (code, value) = self
            .read_typed(&address.address, address.quantity.max(1))
            .await
            .map_err(|e| e.into_read(&address.address))?;
        tracing::trace!(tag = %address.address, type_code = code, len = value.len(), "Read tag");
        Ok(value)
    }

    async fn write(
        &mut self,
        address: &DeviceAddress,
        data: &[u8],
        _is_coil: bool,
    ) -> Result<(), ConnectorError> {
        let cip_type = if address.entity.is_empty() {
            let (code, _) = self
                .read_typed(&address.address, 1)
                .await
                .map_err(|e| e.into_write(&address.address))?;
            CipType::from_code(code).ok_or_else(|| {
                ConnectorError::write(&address.address, format!("tag type 0x{:04X} is not atomic", code))
            })?
        } else {
            address.entity.parse::<CipType>()?
        };

        let elements = (data.len() / cip_type.size()).max(1);
        let mut payload = data.to_vec();
        payload.resize(elements * cip_type.size(), 0);
        if cip_type == CipType::Bool {
            payload[0] = if payload[0] != 0 { 0xFF } else { 0x00 };
        }

        let path = symbolic_path(&address.address)?;
        self.request(
            "write",
            SERVICE_WRITE_TAG,
            write_tag(&path, cip_type, elements as u16, &payload),
            &address.address,
        )
        .await
        .map_err(|e| e.into_write(&address.address))?;
        Ok(())
    }

    fn remote_endpoint(&self) -> Option<RemoteEndpoint> {
        self.endpoint.clone()
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Creates [`RockwellConnector`]s for `eip://` and `logix://` base addresses.
#[derive(Debug, Clone, Default)]
pub struct RockwellConnectorFactory {
    settings: ConnectorSettings,
}

impl RockwellConnectorFactory {
    /// Creates a factory with the given transport settings.
    pub fn new(settings: ConnectorSettings) -> Self {
        Self { settings }
    }
}

impl ConnectorFactory for RockwellConnectorFactory {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Rockwell
    }

    fn create(&self, base: &BaseAddress) -> Result<Box<dyn Connector>, ConnectorError> {
        let slot = match base.path.first() {
            None => 0,
            Some(s) => s
                .parse::<u8>()
                .map_err(|_| AddressError::invalid(&base.raw, format!("invalid slot '{}'", s)))?,
        };
        Ok(Box::new(RockwellConnector::new(self.settings, slot)))
    }
}
