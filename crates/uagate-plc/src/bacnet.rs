// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! BACnet/IP connector.
//!
//! Reads and writes object properties with confirmed `ReadProperty` and
//! `WriteProperty` requests over UDP:
//!
//! ```text
//! BVLC: 81 0A len(2) | NPDU: 01 04 | APDU: 00 05 invoke service | object-id | property | [value]
//! ```
//!
//! Values are decoded from their application tag into native-order payloads:
//! REAL as `f32`, Double as `f64`, Unsigned and Enumerated as `u32`, Signed
//! as `i32`, Boolean as one byte and CharacterString as UTF-8. Writes use the
//! application tag named by the form entity, or the natural tag of the
//! object type (REAL for analog, Enumerated for binary, Unsigned for
//! multi-state objects).
//!
//! UDP has no connection, so `connect` reads `protocol-version` of the
//! device object (wildcard instance) and fails unless the peer answers.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use uagate_core::address::{BaseAddress, DeviceAddress};
use uagate_core::connector::{Connector, ConnectorFactory, ConnectorSettings, RemoteEndpoint};
use uagate_core::error::{AddressError, ConnectorError};
use uagate_core::types::ConnectorKind;

use crate::error::{PlcError, PlcResult};
use crate::transport::be_u16;

const PROTOCOL: &str = "BACnet";

const BVLC_TYPE: u8 = 0x81;
const BVLC_ORIGINAL_UNICAST: u8 = 0x0A;
const NPDU_VERSION: u8 = 0x01;
const NPDU_EXPECTING_REPLY: u8 = 0x04;

const PDU_CONFIRMED_REQUEST: u8 = 0x00;
const PDU_SIMPLE_ACK: u8 = 0x20;
const PDU_COMPLEX_ACK: u8 = 0x30;
const PDU_ERROR: u8 = 0x50;
const PDU_REJECT: u8 = 0x60;
const PDU_ABORT: u8 = 0x70;
/// Unsegmented, max APDU 1476.
const MAX_APDU: u8 = 0x05;

const SERVICE_READ_PROPERTY: u8 = 0x0C;
const SERVICE_WRITE_PROPERTY: u8 = 0x0F;

/// `present-value`.
pub const PROPERTY_PRESENT_VALUE: u32 = 85;
/// `protocol-version`, required on every device object.
const PROPERTY_PROTOCOL_VERSION: u32 = 98;

/// The device object of whatever device answers at the endpoint.
const LOCAL_DEVICE: PropertyRef = PropertyRef {
    object_type: ObjectType::Device,
    instance: 0x3F_FFFF,
    property: PROPERTY_PROTOCOL_VERSION,
};

// =============================================================================
// Objects
// =============================================================================

/// BACnet object types used for process values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// analog-input
    AnalogInput,
    /// analog-output
    AnalogOutput,
    /// analog-value
    AnalogValue,
    /// binary-input
    BinaryInput,
    /// binary-output
    BinaryOutput,
    /// binary-value
    BinaryValue,
    /// device
    Device,
    /// multi-state-input
    MultiStateInput,
    /// multi-state-output
    MultiStateOutput,
    /// multi-state-value
    MultiStateValue,
    /// Any other type by number.
    Other(u16),
}

impl ObjectType {
    /// Returns the object type number.
    pub fn number(&self) -> u16 {
        match self {
            ObjectType::AnalogInput => 0,
            ObjectType::AnalogOutput => 1,
            ObjectType::AnalogValue => 2,
            ObjectType::BinaryInput => 3,
            ObjectType::BinaryOutput => 4,
            ObjectType::BinaryValue => 5,
            ObjectType::Device => 8,
            ObjectType::MultiStateInput => 13,
            ObjectType::MultiStateOutput => 14,
            ObjectType::MultiStateValue => 19,
            ObjectType::Other(n) => *n,
        }
    }

    /// Returns the application tag written to `present-value`.
    pub fn value_tag(&self) -> ApplicationTag {
        match self {
            ObjectType::AnalogInput | ObjectType::AnalogOutput | ObjectType::AnalogValue => ApplicationTag::Real,
            ObjectType::BinaryInput | ObjectType::BinaryOutput | ObjectType::BinaryValue => {
                ApplicationTag::Enumerated
            }
            _ => ApplicationTag::Unsigned,
        }
    }
}

impl FromStr for ObjectType {
    type Err = PlcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase().replace('_', "-");
        Ok(match name.as_str() {
            "analog-input" | "ai" => ObjectType::AnalogInput,
            "analog-output" | "ao" => ObjectType::AnalogOutput,
            "analog-value" | "av" => ObjectType::AnalogValue,
            "binary-input" | "bi" => ObjectType::BinaryInput,
            "binary-output" | "bo" => ObjectType::BinaryOutput,
            "binary-value" | "bv" => ObjectType::BinaryValue,
            "device" => ObjectType::Device,
            "multi-state-input" | "msi" => ObjectType::MultiStateInput,
            "multi-state-output" | "mso" => ObjectType::MultiStateOutput,
            "multi-state-value" | "msv" => ObjectType::MultiStateValue,
            other => other
                .parse::<u16>()
                .ok()
                .filter(|n| *n < 1024)
                .map(ObjectType::Other)
                .ok_or_else(|| PlcError::address(s, "unknown object type"))?,
        })
    }
}

/// A property reference: `analog-value:1`, `binary-output:3/85`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyRef {
    /// Object type.
    pub object_type: ObjectType,
    /// Object instance (22 bits).
    pub instance: u32,
    /// Property identifier.
    pub property: u32,
}

impl PropertyRef {
    /// Returns the encoded object identifier.
    pub fn object_id(&self) -> u32 {
        u32::from(self.object_type.number()) << 22 | self.instance
    }
}

fn property_id(name: &str) -> Option<u32> {
    Some(match name.to_ascii_lowercase().as_str() {
        "present-value" => PROPERTY_PRESENT_VALUE,
        "object-name" => 77,
        "description" => 28,
        "units" => 117,
        "status-flags" => 111,
        "out-of-service" => 81,
        other => return other.parse().ok(),
    })
}

impl FromStr for PropertyRef {
    type Err = PlcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (object, property) = match s.trim().split_once('/') {
            Some((object, property)) => (
                object,
                property_id(property).ok_or_else(|| PlcError::address(s, "unknown property"))?,
            ),
            None => (s.trim(), PROPERTY_PRESENT_VALUE),
        };
        let (object_type, instance) = object
            .rsplit_once(':')
            .ok_or_else(|| PlcError::address(s, "expected <object-type>:<instance>[/<property>]"))?;
        let instance = instance
            .parse::<u32>()
            .ok()
            .filter(|i| *i < 0x40_0000)
            .ok_or_else(|| PlcError::address(s, "instance must be below 4194304"))?;
        Ok(Self {
            object_type: object_type.parse()?,
            instance,
            property,
        })
    }
}

impl fmt::Display for PropertyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.object_type.number(), self.instance, self.property)
    }
}

// =============================================================================
// Application tags
// =============================================================================

/// Primitive application tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplicationTag {
    /// Null (0).
    Null,
    /// Boolean (1).
    Boolean,
    /// Unsigned integer (2).
    Unsigned,
    /// Signed integer (3).
    Signed,
    /// REAL (4).
    Real,
    /// Double (5).
    Double,
    /// CharacterString (7).
    CharacterString,
    /// Enumerated (9).
    Enumerated,
}

impl ApplicationTag {
    fn number(&self) -> u8 {
        match self {
            ApplicationTag::Null => 0,
            ApplicationTag::Boolean => 1,
            ApplicationTag::Unsigned => 2,
            ApplicationTag::Signed => 3,
            ApplicationTag::Real => 4,
            ApplicationTag::Double => 5,
            ApplicationTag::CharacterString => 7,
            ApplicationTag::Enumerated => 9,
        }
    }

    fn from_number(number: u8) -> Option<Self> {
        Some(match number {
            0 => ApplicationTag::Null,
            1 => ApplicationTag::Boolean,
            2 => ApplicationTag::Unsigned,
            3 => ApplicationTag::Signed,
            4 => ApplicationTag::Real,
            5 => ApplicationTag::Double,
            7 => ApplicationTag::CharacterString,
            9 => ApplicationTag::Enumerated,
            _ => return None,
        })
    }
}

impl FromStr for ApplicationTag {
    type Err = PlcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "null" => ApplicationTag::Null,
            "boolean" | "bool" => ApplicationTag::Boolean,
            "unsigned" => ApplicationTag::Unsigned,
            "signed" => ApplicationTag::Signed,
            "real" => ApplicationTag::Real,
            "double" => ApplicationTag::Double,
            "characterstring" | "string" => ApplicationTag::CharacterString,
            "enumerated" => ApplicationTag::Enumerated,
            _ => return Err(PlcError::address(s, "unknown application tag")),
        })
    }
}

fn tag_header(buffer: &mut Vec<u8>, number: u8, context: bool, length: usize) {
    let class = if context { 0x08 } else { 0x00 };
    if length < 5 {
        buffer.push(number << 4 | class | length as u8);
    } else {
        buffer.push(number << 4 | class | 0x05);
        buffer.push(length as u8);
    }
}

/// Minimal big-endian bytes of an unsigned value.
fn unsigned_bytes(value: u32) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take(3).take_while(|b| **b == 0).count();
    bytes[skip..].to_vec()
}

fn signed_bytes(value: i32) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut skip = 0;
    while skip < 3 {
        let redundant = (bytes[skip] == 0x00 && bytes[skip + 1] & 0x80 == 0)
            || (bytes[skip] == 0xFF && bytes[skip + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        skip += 1;
    }
    bytes[skip..].to_vec()
}

fn padded_u32(payload: &[u8]) -> u32 {
    let mut bytes = [0u8; 4];
    let n = payload.len().min(4);
    bytes[..n].copy_from_slice(&payload[..n]);
    u32::from_le_bytes(bytes)
}

/// Encodes a native-order payload as an application-tagged value.
pub fn encode_value(tag: ApplicationTag, payload: &[u8]) -> PlcResult<Vec<u8>> {
    let mut out = Vec::new();
    match tag {
        ApplicationTag::Null => out.push(0x00),
        ApplicationTag::Boolean => {
            let value = payload.iter().any(|b| *b != 0);
            out.push(0x10 | u8::from(value));
        }
        ApplicationTag::Unsigned | ApplicationTag::Enumerated => {
            let bytes = unsigned_bytes(padded_u32(payload));
            tag_header(&mut out, tag.number(), false, bytes.len());
            out.extend_from_slice(&bytes);
        }
        ApplicationTag::Signed => {
            let bytes = signed_bytes(padded_u32(payload) as i32);
            tag_header(&mut out, tag.number(), false, bytes.len());
            out.extend_from_slice(&bytes);
        }
        ApplicationTag::Real => {
            let raw: [u8; 4] = payload
                .get(..4)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| PlcError::frame(PROTOCOL, "REAL needs 4 bytes"))?;
            tag_header(&mut out, tag.number(), false, 4);
            out.extend_from_slice(&f32::from_le_bytes(raw).to_be_bytes());
        }
        ApplicationTag::Double => {
            let raw: [u8; 8] = payload
                .get(..8)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| PlcError::frame(PROTOCOL, "Double needs 8 bytes"))?;
            tag_header(&mut out, tag.number(), false, 8);
            out.extend_from_slice(&f64::from_le_bytes(raw).to_be_bytes());
        }
        ApplicationTag::CharacterString => {
            let text = std::str::from_utf8(payload)
                .map_err(|_| PlcError::frame(PROTOCOL, "string payload is not UTF-8"))?;
            tag_header(&mut out, tag.number(), false, text.len() + 1);
            out.push(0x00); // ANSI X3.4 / UTF-8
            out.extend_from_slice(text.as_bytes());
        }
    }
    Ok(out)
}

/// Decodes one application-tagged value into a native-order payload.
pub fn decode_value(data: &[u8]) -> PlcResult<Vec<u8>> {
    let short = || PlcError::frame(PROTOCOL, "value shorter than its tag");
    let header = *data.first().ok_or_else(short)?;
    if header & 0x08 != 0 {
        return Err(PlcError::frame(PROTOCOL, "expected an application tag"));
    }
    let tag = ApplicationTag::from_number(header >> 4)
        .ok_or_else(|| PlcError::frame(PROTOCOL, format!("unsupported application tag {}", header >> 4)))?;
    let lvt = usize::from(header & 0x07);
    if tag == ApplicationTag::Boolean {
        return Ok(vec![u8::from(lvt != 0)]);
    }
    let (length, start) = if lvt == 5 {
        (usize::from(*data.get(1).ok_or_else(short)?), 2)
    } else {
        (lvt, 1)
    };
    let content = data.get(start..start + length).ok_or_else(short)?;

    Ok(match tag {
        ApplicationTag::Null => Vec::new(),
        ApplicationTag::Unsigned | ApplicationTag::Enumerated => {
            let value = content.iter().fold(0u64, |acc, b| acc << 8 | u64::from(*b));
            (value as u32).to_le_bytes().to_vec()
        }
        ApplicationTag::Signed => {
            let negative = content.first().is_some_and(|b| b & 0x80 != 0);
            let init: i64 = if negative { -1 } else { 0 };
            let value = content.iter().fold(init, |acc, b| acc << 8 | i64::from(*b));
            (value as i32).to_le_bytes().to_vec()
        }
        ApplicationTag::Real => {
            let raw: [u8; 4] = content.try_into().map_err(|_| short())?;
            f32::from_be_bytes(raw).to_le_bytes().to_vec()
        }
        ApplicationTag::Double => {
            let raw: [u8; 8] = content.try_into().map_err(|_| short())?;
            f64::from_be_bytes(raw).to_le_bytes().to_vec()
        }
        ApplicationTag::CharacterString => content.get(1..).unwrap_or_default().to_vec(),
        ApplicationTag::Boolean => vec![u8::from(lvt != 0)],
    })
}

// =============================================================================
// Frames
// =============================================================================

fn bvlc(apdu: &[u8]) -> Vec<u8> {
    let length = 4 + 2 + apdu.len();
    let mut frame = Vec::with_capacity(length);
    frame.extend_from_slice(&[BVLC_TYPE, BVLC_ORIGINAL_UNICAST]);
    frame.extend_from_slice(&(length as u16).to_be_bytes());
    frame.extend_from_slice(&[NPDU_VERSION, NPDU_EXPECTING_REPLY]);
    frame.extend_from_slice(apdu);
    frame
}

fn object_and_property(apdu: &mut Vec<u8>, property: &PropertyRef) {
    tag_header(apdu, 0, true, 4);
    apdu.extend_from_slice(&property.object_id().to_be_bytes());
    let id = unsigned_bytes(property.property);
    tag_header(apdu, 1, true, id.len());
    apdu.extend_from_slice(&id);
}

/// Builds a ReadProperty request.
pub fn read_property_request(invoke_id: u8, property: &PropertyRef) -> Vec<u8> {
    let mut apdu = vec![PDU_CONFIRMED_REQUEST, MAX_APDU, invoke_id, SERVICE_READ_PROPERTY];
    object_and_property(&mut apdu, property);
    bvlc(&apdu)
}

/// Builds a WriteProperty request carrying an encoded application value.
pub fn write_property_request(invoke_id: u8, property: &PropertyRef, value: &[u8]) -> Vec<u8> {
    let mut apdu = vec![PDU_CONFIRMED_REQUEST, MAX_APDU, invoke_id, SERVICE_WRITE_PROPERTY];
    object_and_property(&mut apdu, property);
    apdu.push(0x3E);
    apdu.extend_from_slice(value);
    apdu.push(0x3F);
    bvlc(&apdu)
}

/// Returns the invoke id and APDU of a BVLC/NPDU frame.
fn apdu(frame: &[u8]) -> PlcResult<&[u8]> {
    if frame.len() < 6 || frame[0] != BVLC_TYPE {
        return Err(PlcError::frame(PROTOCOL, "not a BACnet/IP frame"));
    }
    let length = usize::from(be_u16(frame, 2, PROTOCOL)?);
    let frame = frame
        .get(..length)
        .ok_or_else(|| PlcError::frame(PROTOCOL, "BVLC length exceeds datagram"))?;
    let control = frame[5];
    if control & 0x80 != 0 {
        return Err(PlcError::frame(PROTOCOL, "network layer message"));
    }
    let mut offset = 6;
    if control & 0x20 != 0 {
        // DNET(2) DLEN(1) DADR(DLEN), hop count follows SADR.
        let dlen = usize::from(*frame.get(offset + 2).ok_or_else(|| PlcError::frame(PROTOCOL, "short NPDU"))?);
        offset += 3 + dlen;
    }
    if control & 0x08 != 0 {
        let slen = usize::from(*frame.get(offset + 2).ok_or_else(|| PlcError::frame(PROTOCOL, "short NPDU"))?);
        offset += 3 + slen;
    }
    if control & 0x20 != 0 {
        offset += 1;
    }
    frame
        .get(offset..)
        .filter(|a| a.len() >= 3)
        .ok_or_else(|| PlcError::frame(PROTOCOL, "missing APDU"))
}

fn check_failure(apdu: &[u8], operation: &'static str, tag: &str) -> PlcResult<()> {
    match apdu[0] & 0xF0 {
        PDU_ERROR => {
            // Error class and code are two enumerated application values.
            let class = decode_value(apdu.get(3..).unwrap_or_default()).map_or(0, |b| padded_u32(&b));
            let code_at = 3 + 1 + usize::from(apdu.get(3).map_or(0, |h| h & 0x07));
            let code = decode_value(apdu.get(code_at..).unwrap_or_default()).map_or(0, |b| padded_u32(&b));
            Err(PlcError::device(
                PROTOCOL,
                operation,
                tag,
                class << 16 | code,
                format!("error class {} code {}", class, code),
            ))
        }
        PDU_REJECT => Err(PlcError::device(
            PROTOCOL,
            operation,
            tag,
            u32::from(apdu[2]),
            "request rejected",
        )),
        PDU_ABORT => Err(PlcError::device(
            PROTOCOL,
            operation,
            tag,
            u32::from(apdu[2]),
            "transaction aborted",
        )),
        _ => Ok(()),
    }
}

/// Extracts the value payload of a ReadProperty ComplexACK.
pub fn parse_read_ack(frame: &[u8], tag: &str) -> PlcResult<Vec<u8>> {
    let apdu = apdu(frame)?;
    check_failure(apdu, "read", tag)?;
    if apdu[0] & 0xF0 != PDU_COMPLEX_ACK || apdu[0] & 0x08 != 0 {
        return Err(PlcError::frame(PROTOCOL, "expected an unsegmented ComplexACK"));
    }
    if apdu[2] != SERVICE_READ_PROPERTY {
        return Err(PlcError::frame(PROTOCOL, "ComplexACK for another service"));
    }
    // Context tags 0 (object), 1 (property) and optional 2 (array index).
    let mut offset = 3;
    while let Some(header) = apdu.get(offset).copied().filter(|h| *h & 0x08 != 0 && *h >> 4 <= 2) {
        offset += 1 + usize::from(header & 0x07);
    }
    if apdu.get(offset) != Some(&0x3E) {
        return Err(PlcError::frame(PROTOCOL, "property value not found"));
    }
    decode_value(&apdu[offset + 1..])
}

/// Checks a WriteProperty SimpleACK.
pub fn parse_write_ack(frame: &[u8], tag: &str) -> PlcResult<()> {
    let apdu = apdu(frame)?;
    check_failure(apdu, "write", tag)?;
    if apdu[0] & 0xF0 != PDU_SIMPLE_ACK || apdu[2] != SERVICE_WRITE_PROPERTY {
        return Err(PlcError::frame(PROTOCOL, "expected a WriteProperty SimpleACK"));
    }
    Ok(())
}

// =============================================================================
// BacnetConnector
// =============================================================================

/// BACnet/IP connector for one device.
pub struct BacnetConnector {
    settings: ConnectorSettings,
    local_port: u16,
    socket: Option<UdpSocket>,
    invoke_id: u8,
    endpoint: Option<RemoteEndpoint>,
}

impl BacnetConnector {
    /// Creates an unconnected connector bound to `local_port` (0 = ephemeral).
    pub fn new(settings: ConnectorSettings, local_port: u16) -> Self {
        Self {
            settings,
            local_port,
            socket: None,
            invoke_id: 0,
            endpoint: None,
        }
    }

    /// Sends a confirmed request and waits for the answer with the same invoke id.
    async fn confirmed(&mut self, operation: &'static str, build: impl FnOnce(u8) -> Vec<u8>) -> PlcResult<Vec<u8>> {
        let duration = self.settings.operation_timeout;
        self.confirmed_within(operation, duration, build).await
    }

    async fn confirmed_within(
        &mut self,
        operation: &'static str,
        duration: Duration,
        build: impl FnOnce(u8) -> Vec<u8>,
    ) -> PlcResult<Vec<u8>> {
        self.invoke_id = self.invoke_id.wrapping_add(1);
        let invoke_id = self.invoke_id;
        let socket = self.socket.as_ref().ok_or(PlcError::NotConnected)?;
        socket.send(&build(invoke_id)).await?;

        let exchange = async {
            let mut buffer = vec![0u8; 1500];
            loop {
                let n = socket.recv(&mut buffer).await?;
                let frame = &buffer[..n];
                match apdu(frame) {
                    Ok(apdu) if apdu[1] == invoke_id && apdu[0] & 0xF0 != PDU_CONFIRMED_REQUEST => {
                        return Ok::<_, PlcError>(frame.to_vec());
                    }
                    Ok(_) => tracing::trace!(invoke_id = invoke_id, "Ignoring unrelated BACnet datagram"),
                    Err(e) => tracing::trace!(error = %e, "Ignoring malformed BACnet datagram"),
                }
            }
        };
        tokio::time::timeout(duration, exchange)
            .await
            .map_err(|_| PlcError::Timeout { operation, duration })?
    }
}

#[async_trait]
impl Connector for BacnetConnector {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::BacNet
    }

    fn validate_address(&self, address: &DeviceAddress) -> Result<(), AddressError> {
        address.address.parse::<PropertyRef>()?;
        if !address.entity.is_empty() {
            address.entity.parse::<ApplicationTag>()?;
        }
        Ok(())
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<(), ConnectorError> {
        let endpoint = format!("{}:{}", host, port);
        let socket = UdpSocket::bind(("0.0.0.0", self.local_port))
            .await
            .map_err(|e| ConnectorError::connection(&endpoint, format!("bind failed: {}", e)))?;
        tokio::time::timeout(self.settings.connect_timeout, socket.connect((host, port)))
            .await
            .map_err(|_| ConnectorError::connection(&endpoint, "address resolution timed out"))?
            .map_err(|e| ConnectorError::connection(&endpoint, e.to_string()))?;
        self.socket = Some(socket);

        // Any answer, even an error PDU, shows a BACnet device is listening
        let duration = self.settings.connect_timeout;
        if let Err(e) = self
            .confirmed_within("connect", duration, |invoke| read_property_request(invoke, &LOCAL_DEVICE))
            .await
        {
            self.socket = None;
            return Err(ConnectorError::connection(&endpoint, format!("no BACnet answer: {}", e)));
        }

        self.endpoint = Some(RemoteEndpoint::new(host, port));
        tracing::info!(endpoint = %endpoint, "Connected to BACnet/IP device");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ConnectorError> {
        self.socket = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    async fn read(&mut self, address: &DeviceAddress) -> Result<Vec<u8>, ConnectorError> {
        let property: PropertyRef = address.address.parse()?;
        let frame = self
            .confirmed("read", |invoke| read_property_request(invoke, &property))
            .await
            .map_err(|e| e.into_read(&address.address))?;
        parse_read_ack(&frame, &address.address).map_err(|e| e.into_read(&address.address))
    }

    async fn write(
        &mut self,
        address: &DeviceAddress,
        data: &[u8],
        _is_coil: bool,
    ) -> Result<(), ConnectorError> {
        let property: PropertyRef = address.address.parse()?;
        let tag = if address.entity.is_empty() {
            property.object_type.value_tag()
        } else {
            address.entity.parse::<ApplicationTag>()?
        };
        let value = encode_value(tag, data).map_err(|e| e.into_write(&address.address))?;
        let frame = self
            .confirmed("write", |invoke| write_property_request(invoke, &property, &value))
            .await
            .map_err(|e| e.into_write(&address.address))?;
        parse_write_ack(&frame, &address.address).map_err(|e| e.into_write(&address.address))
    }

    fn remote_endpoint(&self) -> Option<RemoteEndpoint> {
        self.endpoint.clone()
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Creates [`BacnetConnector`]s for `bacnet://host:port[/device-instance]`.
#[derive(Debug, Clone, Default)]
pub struct BacnetConnectorFactory {
    settings: ConnectorSettings,
    local_port: u16,
}

impl BacnetConnectorFactory {
    /// Creates a factory with the given transport settings.
    pub fn new(settings: ConnectorSettings) -> Self {
        Self {
            settings,
            local_port: 0,
        }
    }

    /// Sets the local UDP port (0 = ephemeral).
    pub fn with_local_port(mut self, port: u16) -> Self {
        self.local_port = port;
        self
    }
}

impl ConnectorFactory for BacnetConnectorFactory {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::BacNet
    }

    fn create(&self, base: &BaseAddress) -> Result<Box<dyn Connector>, ConnectorError> {
        if let Some(instance) = base.path.first() {
            instance
                .parse::<u32>()
                .ok()
                .filter(|i| *i < 0x40_0000)
                .ok_or_else(|| AddressError::invalid(&base.raw, format!("invalid device instance '{}'", instance)))?;
        }
        Ok(Box::new(BacnetConnector::new(self.settings, self.local_port)))
    }
}
