// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Beckhoff TwinCAT connector (ADS over AMS/TCP).
//!
//! ```text
//! AMS/TCP (6)      AMS header (32)                                      ADS data
//! 00 00 len(4) | target id(6) port(2) source id(6) port(2) cmd flags len err invoke | ...
//! ```
//!
//! Tags are either raw `<index-group>:<index-offset>` pairs or symbol names.
//! Symbols are resolved once to a handle (`ReadWrite` on 0xF003) and then
//! read and written through index group 0xF005. Handles are released on
//! disconnect. ADS data is little-endian, so payloads pass through as is.
//!
//! The source AMS net id is the local IPv4 address followed by `.1.1`; the
//! controller needs a matching route.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use async_trait::async_trait;

use uagate_core::address::{BaseAddress, DeviceAddress};
use uagate_core::connector::{Connector, ConnectorFactory, ConnectorSettings, RemoteEndpoint};
use uagate_core::error::{AddressError, ConnectorError};
use uagate_core::types::ConnectorKind;

use crate::error::{PlcError, PlcResult};
use crate::transport::{le_u32, parse_number, TcpLink};

const PROTOCOL: &str = "ADS";

const TCP_HEADER: usize = 6;
const AMS_HEADER: usize = 32;
const DATA_OFFSET: usize = TCP_HEADER + AMS_HEADER;

const COMMAND_READ: u16 = 2;
const COMMAND_WRITE: u16 = 3;
const COMMAND_READ_WRITE: u16 = 9;
const FLAGS_REQUEST: u16 = 0x0004;

const GROUP_SYMBOL_HANDLE: u32 = 0xF003;
const GROUP_SYMBOL_VALUE: u32 = 0xF005;
const GROUP_RELEASE_HANDLE: u32 = 0xF006;
const ERROR_SYMBOL_NOT_FOUND: u32 = 0x0710;

/// AMS port of the first TwinCAT 3 PLC runtime.
pub const DEFAULT_AMS_PORT: u16 = 851;
/// Default source AMS port.
pub const DEFAULT_SOURCE_PORT: u16 = 32905;

// =============================================================================
// Addressing
// =============================================================================

/// AMS net id, e.g. `5.80.201.232.1.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AmsNetId(pub [u8; 6]);

impl AmsNetId {
    /// Derives a net id from an IP address by appending `.1.1`.
    pub fn from_ip(ip: IpAddr) -> Self {
        let [a, b, c, d] = match ip {
            IpAddr::V4(v4) => v4.octets(),
            IpAddr::V6(_) => [127, 0, 0, 1],
        };
        Self([a, b, c, d, 1, 1])
    }
}

impl FromStr for AmsNetId {
    type Err = PlcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u8> = s
            .split('.')
            .map(|p| p.parse::<u8>())
            .collect::<Result<_, _>>()
            .map_err(|_| PlcError::address(s, "AMS net id must be six dot-separated bytes"))?;
        let id: [u8; 6] = parts
            .try_into()
            .map_err(|_| PlcError::address(s, "AMS net id must be six dot-separated bytes"))?;
        Ok(Self(id))
    }
}

impl fmt::Display for AmsNetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{}.{}.{}.{}.{}.{}", a, b, c, d, e, g)
    }
}

/// Net id and port of an AMS endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AmsAddress {
    /// Net id.
    pub net_id: AmsNetId,
    /// AMS port.
    pub port: u16,
}

impl FromStr for AmsAddress {
    type Err = PlcError;

    /// Parses `<net-id>[:<port>]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (net_id, port) = match s.split_once(':') {
            Some((id, port)) => (
                id,
                port.parse::<u16>()
                    .map_err(|_| PlcError::address(s, "invalid AMS port"))?,
            ),
            None => (s, DEFAULT_AMS_PORT),
        };
        Ok(Self {
            net_id: net_id.parse()?,
            port,
        })
    }
}

/// A tag address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AdsTarget {
    /// Raw index group and offset.
    Index {
        /// Index group.
        group: u32,
        /// Index offset.
        offset: u32,
    },
    /// Symbol name, resolved to a handle.
    Symbol(String),
}

impl FromStr for AdsTarget {
    type Err = PlcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((group, offset)) = s.split_once(':') {
            if let (Some(group), Some(offset)) = (parse_number(group), parse_number(offset)) {
                return Ok(AdsTarget::Index { group, offset });
            }
        }
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(PlcError::address(s, "expected <group>:<offset> or a symbol name"));
        }
        Ok(AdsTarget::Symbol(s.to_string()))
    }
}

// =============================================================================
// Frames
// =============================================================================

/// Builds a complete AMS/TCP request.
pub fn ams_request(
    target: &AmsAddress,
    source: &AmsAddress,
    command: u16,
    invoke_id: u32,
    data: &[u8],
) -> Vec<u8> {
    let mut frame = Vec::with_capacity(DATA_OFFSET + data.len());
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(&((AMS_HEADER + data.len()) as u32).to_le_bytes());
    frame.extend_from_slice(&target.net_id.0);
    frame.extend_from_slice(&target.port.to_le_bytes());
    frame.extend_from_slice(&source.net_id.0);
    frame.extend_from_slice(&source.port.to_le_bytes());
    frame.extend_from_slice(&command.to_le_bytes());
    frame.extend_from_slice(&FLAGS_REQUEST.to_le_bytes());
    frame.extend_from_slice(&(data.len() as u32).to_le_bytes());
    frame.extend_from_slice(&0u32.to_le_bytes());
    frame.extend_from_slice(&invoke_id.to_le_bytes());
    frame.extend_from_slice(data);
    frame
}

fn words(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// ADS Read request data.
pub fn read_data(group: u32, offset: u32, length: u32) -> Vec<u8> {
    words(&[group, offset, length])
}

/// ADS Write request data.
pub fn write_data(group: u32, offset: u32, payload: &[u8]) -> Vec<u8> {
    let mut data = words(&[group, offset, payload.len() as u32]);
    data.extend_from_slice(payload);
    data
}

/// ADS ReadWrite request data.
pub fn read_write_data(group: u32, offset: u32, read_length: u32, payload: &[u8]) -> Vec<u8> {
    let mut data = words(&[group, offset, read_length, payload.len() as u32]);
    data.extend_from_slice(payload);
    data
}

/// Returns a description of an ADS error code.
pub fn ads_error_message(code: u32) -> &'static str {
    match code {
        0x0006 => "target port not found",
        0x0007 => "target machine not found",
        0x0701 => "service not supported",
        0x0702 => "invalid index group",
        0x0703 => "invalid index offset",
        0x0704 => "reading or writing not permitted",
        0x0705 => "parameter size not correct",
        0x0710 => "symbol not found",
        0x0745 => "timeout",
        _ => "device error",
    }
}

/// Checks the AMS error code and the ADS result of a response.
///
/// Returns the data after the result field.
pub fn parse_response<'a>(
    frame: &'a [u8],
    invoke_id: u32,
    operation: &'static str,
    tag: &str,
) -> PlcResult<&'a [u8]> {
    let error = le_u32(frame, TCP_HEADER + 24, PROTOCOL)?;
    let invoke = le_u32(frame, TCP_HEADER + 28, PROTOCOL)?;
    if invoke != invoke_id {
        return Err(PlcError::frame(PROTOCOL, format!("invoke id {} does not match {}", invoke, invoke_id)));
    }
    let result = if error != 0 {
        error
    } else {
        le_u32(frame, DATA_OFFSET, PROTOCOL)?
    };
    if result != 0 {
        return Err(PlcError::device(PROTOCOL, operation, tag, result, ads_error_message(result)));
    }
    Ok(&frame[DATA_OFFSET + 4..])
}

/// Extracts the length-prefixed data of a Read or ReadWrite response body.
fn read_payload(data: &[u8]) -> PlcResult<Vec<u8>> {
    let length = le_u32(data, 0, PROTOCOL)? as usize;
    data.get(4..4 + length)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| PlcError::frame(PROTOCOL, format!("response announces {} bytes", length)))
}

fn tcp_body_len(header: &[u8]) -> PlcResult<usize> {
    Ok(le_u32(header, 2, PROTOCOL)? as usize)
}

// =============================================================================
// BeckhoffConnector
// =============================================================================

/// ADS connector for one TwinCAT runtime.
pub struct BeckhoffConnector {
    settings: ConnectorSettings,
    target: AmsAddress,
    source: AmsAddress,
    link: Option<TcpLink>,
    invoke_id: u32,
    handles: HashMap<String, u32>,
    endpoint: Option<RemoteEndpoint>,
}

impl BeckhoffConnector {
    /// Creates an unconnected connector for `target`.
    pub fn new(settings: ConnectorSettings, target: AmsAddress, source_port: u16) -> Self {
        Self {
            settings,
            target,
            source: AmsAddress {
                net_id: AmsNetId([0, 0, 0, 0, 1, 1]),
                port: source_port,
            },
            link: None,
            invoke_id: 0,
            handles: HashMap::new(),
            endpoint: None,
        }
    }

    /// Returns the source AMS address used for requests.
    pub fn source(&self) -> AmsAddress {
        self.source
    }

    async fn command(
        &mut self,
        operation: &'static str,
        command: u16,
        data: &[u8],
        tag: &str,
    ) -> PlcResult<Vec<u8>> {
        self.invoke_id = self.invoke_id.wrapping_add(1);
        let invoke_id = self.invoke_id;
        let request = ams_request(&self.target, &self.source, command, invoke_id, data);
        let link = self.link.as_mut().ok_or(PlcError::NotConnected)?;
        let frame = link.transact(operation, &request, TCP_HEADER, tcp_body_len).await?;
        parse_response(&frame, invoke_id, operation, tag).map(<[u8]>::to_vec)
    }

    async fn handle(&mut self, symbol: &str) -> PlcResult<u32> {
        if let Some(handle) = self.handles.get(symbol) {
            return Ok(*handle);
        }
        let mut name = symbol.as_bytes().to_vec();
        name.push(0);
        let data = self
            .command(
                "read",
                COMMAND_READ_WRITE,
                &read_write_data(GROUP_SYMBOL_HANDLE, 0, 4, &name),
                symbol,
            )
            .await?;
        let payload = read_payload(&data)?;
        let handle = le_u32(&payload, 0, PROTOCOL)?;
        tracing::debug!(symbol = %symbol, handle = handle, "Resolved ADS symbol handle");
        self.handles.insert(symbol.to_string(), handle);
        Ok(handle)
    }

    async fn index(&mut self, target: &AdsTarget) -> PlcResult<(u32, u32)> {
        match target {
            AdsTarget::Index { group, offset } => Ok((*group, *offset)),
            AdsTarget::Symbol(symbol) => Ok((GROUP_SYMBOL_VALUE, self.handle(symbol).await?)),
        }
    }

    fn forget_stale_handle(&mut self, target: &AdsTarget, error: &PlcError) {
        if let (AdsTarget::Symbol(symbol), PlcError::Device { code, .. }) = (target, error) {
            if *code == ERROR_SYMBOL_NOT_FOUND || *code == 0x0703 {
                self.handles.remove(symbol);
            }
        }
    }

    async fn read_target(&mut self, target: &AdsTarget, length: u32, tag: &str) -> PlcResult<Vec<u8>> {
        let (group, offset) = self.index(target).await?;
        let data = self
            .command("read", COMMAND_READ, &read_data(group, offset, length), tag)
            .await?;
        read_payload(&data)
    }

    async fn write_target(&mut self, target: &AdsTarget, payload: &[u8], tag: &str) -> PlcResult<()> {
        let (group, offset) = self.index(target).await?;
        self.command("write", COMMAND_WRITE, &write_data(group, offset, payload), tag)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Connector for BeckhoffConnector {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Beckhoff
    }

    fn validate_address(&self, address: &DeviceAddress) -> Result<(), AddressError> {
        address.address.parse::<AdsTarget>()?;
        Ok(())
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<(), ConnectorError> {
        let link =
            TcpLink::connect(host, port, self.settings.connect_timeout, self.settings.operation_timeout).await?;
        let local = link.local_addr()?;
        self.source.net_id = AmsNetId::from_ip(local.ip());
        self.handles.clear();
        self.link = Some(link);
        self.endpoint = Some(RemoteEndpoint::new(host, port));
        tracing::info!(
            host = %host,
            port = port,
            target = %self.target.net_id,
            ams_port = self.target.port,
            source = %self.source.net_id,
            "Connected to ADS router"
        );
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ConnectorError> {
        let handles: Vec<(String, u32)> = self.handles.drain().collect();
        for (symbol, handle) in handles {
            let release = write_data(GROUP_RELEASE_HANDLE, 0, &handle.to_le_bytes());
            if let Err(e) = self.command("write", COMMAND_WRITE, &release, &symbol).await {
                tracing::debug!(symbol = %symbol, error = %e, "Releasing ADS handle failed");
            }
        }
        if let Some(link) = self.link.take() {
            link.close().await;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    async fn read(&mut self, address: &DeviceAddress) -> Result<Vec<u8>, ConnectorError> {
        let target: AdsTarget = address.address.parse()?;
        match self
            .read_target(&target, u32::from(address.quantity), &address.address)
            .await
        {
            Ok(payload) => Ok(payload),
            Err(e) => {
                self.forget_stale_handle(&target, &e);
                Err(e.into_read(&address.address))
            }
        }
    }

    async fn write(
        &mut self,
        address: &DeviceAddress,
        data: &[u8],
        _is_coil: bool,
    ) -> Result<(), ConnectorError> {
        let target: AdsTarget = address.address.parse()?;
        if let Err(e) = self.write_target(&target, data, &address.address).await {
            self.forget_stale_handle(&target, &e);
            return Err(e.into_write(&address.address));
        }
        Ok(())
    }

    fn remote_endpoint(&self) -> Option<RemoteEndpoint> {
        self.endpoint.clone()
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Creates [`BeckhoffConnector`]s for `ads://host:port/<net-id>[:<ams-port>]`.
#[derive(Debug, Clone)]
pub struct BeckhoffConnectorFactory {
    settings: ConnectorSettings,
    source_port: u16,
}

impl BeckhoffConnectorFactory {
    /// Creates a factory with the given transport settings.
    pub fn new(settings: ConnectorSettings) -> Self {
        Self {
            settings,
            source_port: DEFAULT_SOURCE_PORT,
        }
    }

    /// Sets the source AMS port.
    pub fn with_source_port(mut self, port: u16) -> Self {
        self.source_port = port;
        self
    }
}

impl Default for BeckhoffConnectorFactory {
    fn default() -> Self {
        Self::new(ConnectorSettings::default())
    }
}

impl ConnectorFactory for BeckhoffConnectorFactory {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Beckhoff
    }

    fn create(&self, base: &BaseAddress) -> Result<Box<dyn Connector>, ConnectorError> {
        let target = base
            .path
            .first()
            .ok_or_else(|| AddressError::invalid(&base.raw, "expected ads://ipaddress:port/<ams-net-id>[:<ams-port>]"))?
            .parse::<AmsAddress>()
            .map_err(|e| AddressError::invalid(&base.raw, e.to_string()))?;
        Ok(Box::new(BeckhoffConnector::new(self.settings, target, self.source_port)))
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
    fn test_parse_addresses() {
        let target: AmsAddress = "5.80.201.232.1.1:851".parse().unwrap();
        assert_eq!(target.net_id.0, [5, 80, 201, 232, 1, 1]);
        assert_eq!(target.port, 851);
        assert_eq!("5.80.201.232.1.1".parse::<AmsAddress>().unwrap().port, DEFAULT_AMS_PORT);
        assert!("5.80.201.232.1".parse::<AmsAddress>().is_err());

        assert_eq!(
            "0x4020:16".parse::<AdsTarget>().unwrap(),
            AdsTarget::Index { group: 0x4020, offset: 16 }
        );
        assert_eq!(
            "MAIN.fSpeed".parse::<AdsTarget>().unwrap(),
            AdsTarget::Symbol("MAIN.fSpeed".into())
        );
        assert!("MAIN. x".parse::<AdsTarget>().is_err());
    }

    #[test]
    fn test_request_layout() {
        let target: AmsAddress = "5.80.201.232.1.1:851".parse().unwrap();
        let source = AmsAddress {
            net_id: AmsNetId([10, 0, 0, 5, 1, 1]),
            port: DEFAULT_SOURCE_PORT,
        };
        let frame = ams_request(&target, &source, COMMAND_READ, 7, &read_data(0x4020, 0, 4));
        assert_eq!(&frame[0..6], &[0x00, 0x00, 44, 0, 0, 0]);
        assert_eq!(&frame[6..14], &[5, 80, 201, 232, 1, 1, 0x53, 0x03]);
        assert_eq!(&frame[14..22], &[10, 0, 0, 5, 1, 1, 0x89, 0x80]);
        assert_eq!(&frame[22..26], &[0x02, 0x00, 0x04, 0x00]);
        assert_eq!(&frame[34..38], &[7, 0, 0, 0]);
        assert_eq!(&frame[38..], &[0x20, 0x40, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0]);
    }

    fn response(request: &[u8], data: &[u8]) -> Vec<u8> {
        let mut frame = vec![0x00, 0x00];
        frame.extend_from_slice(&((AMS_HEADER + data.len()) as u32).to_le_bytes());
        // Swap target and source.
        frame.extend_from_slice(&request[14..22]);
        frame.extend_from_slice(&request[6..14]);
        frame.extend_from_slice(&request[22..24]);
        frame.extend_from_slice(&0x0005u16.to_le_bytes());
        frame.extend_from_slice(&(data.len() as u32).to_le_bytes());
        frame.extend_from_slice(&0u32.to_le_bytes());
        frame.extend_from_slice(&request[34..38]);
        frame.extend_from_slice(data);
        frame
    }

    #[test]
    fn test_parse_response_errors() {
        let target: AmsAddress = "1.2.3.4.1.1".parse().unwrap();
        let request = ams_request(&target, &target, COMMAND_READ, 3, &read_data(1, 2, 4));

        let frame = response(&request, &[0x02, 0x07, 0, 0]);
        let err = parse_response(&frame, 3, "read", "1:2").unwrap_err();
        assert!(matches!(err, PlcError::Device { code: 0x0702, .. }));

        let frame = response(&request, &[0, 0, 0, 0]);
        assert!(matches!(
            parse_response(&frame, 4, "read", "1:2").unwrap_err(),
            PlcError::Frame { .. }
        ));
    }

    #[tokio::test]
    async fn test_symbol_read_write_against_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut value = 21.5f64.to_le_bytes().to_vec();
            let mut log = Vec::new();
            loop {
                let mut header = [0u8; 6];
                if socket.read_exact(&mut header).await.is_err() {
                    return (log, value);
                }
                let len = u32::from_le_bytes([header[2], header[3], header[4], header[5]]) as usize;
                let mut body = vec![0u8; len];
                socket.read_exact(&mut body).await.unwrap();
                let mut request = header.to_vec();
                request.extend_from_slice(&body);

                let command = u16::from_le_bytes([request[22], request[23]]);
                let group = u32::from_le_bytes([request[38], request[39], request[40], request[41]]);
                log.push((command, group));
                let data = match (command, group) {
                    (COMMAND_READ_WRITE, GROUP_SYMBOL_HANDLE) => {
                        let mut data = vec![0, 0, 0, 0, 4, 0, 0, 0];
                        data.extend_from_slice(&0x8000_0001u32.to_le_bytes());
                        data
                    }
                    (COMMAND_READ, GROUP_SYMBOL_VALUE) => {
                        let mut data = vec![0, 0, 0, 0];
                        data.extend_from_slice(&(value.len() as u32).to_le_bytes());
                        data.extend_from_slice(&value);
                        data
                    }
                    (COMMAND_WRITE, GROUP_SYMBOL_VALUE) => {
                        value = request[50..].to_vec();
                        vec![0, 0, 0, 0]
                    }
                    _ => vec![0, 0, 0, 0],
                };
                socket.write_all(&response(&request, &data)).await.unwrap();
            }
        });

        let base = BaseAddress::parse(&format!("ads://127.0.0.1:{}/5.80.201.232.1.1:851", port)).unwrap();
        let mut connector = BeckhoffConnectorFactory::default().create(&base).unwrap();
        connector.connect("127.0.0.1", port).await.unwrap();

        let payload = connector.read(&tag("MAIN.fTemp", 8)).await.unwrap();
        assert_eq!(payload, 21.5f64.to_le_bytes().to_vec());
        connector
            .write(&tag("MAIN.fTemp", 8), &30.0f64.to_le_bytes(), false)
            .await
            .unwrap();
        connector.disconnect().await.unwrap();

        let (log, value) = server.await.unwrap();
        assert_eq!(value, 30.0f64.to_le_bytes().to_vec());
        // One handle lookup, read, write, then the handle release.
        assert_eq!(
            log,
            vec![
                (COMMAND_READ_WRITE, GROUP_SYMBOL_HANDLE),
                (COMMAND_READ, GROUP_SYMBOL_VALUE),
                (COMMAND_WRITE, GROUP_SYMBOL_VALUE),
                (COMMAND_WRITE, GROUP_RELEASE_HANDLE),
            ]
        );
    }

    #[test]
    fn test_factory_requires_net_id() {
        let factory = BeckhoffConnectorFactory::default().with_source_port(30000);
        assert!(factory
            .create(&BaseAddress::parse("ads://10.0.0.3:48898").unwrap())
            .is_err());
        assert!(factory
            .create(&BaseAddress::parse("ads://10.0.0.3:48898/10.0.0.3.1.1:851").unwrap())
            .is_ok());
    }
}
