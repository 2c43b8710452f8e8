// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! - [`MockDevice`]: shared state behind every [`MockConnector`], with error
//!   injection and recorded interactions
//! - [`MockConnectorFactory`]: serves any connector kind from one device
//! - [`ModbusSimulator`]: a Modbus TCP slave on a loopback port, for tests
//!   that exercise the real Modbus connector

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use uagate_core::address::{BaseAddress, DeviceAddress};
use uagate_core::connector::{Connector, ConnectorFactory, ConnectorRegistry, RemoteEndpoint};
use uagate_core::error::ConnectorError;
use uagate_core::types::ConnectorKind;

// =============================================================================
// Mock Device
// =============================================================================

/// One write a connector handed to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    /// Device address.
    pub address: String,
    /// Raw payload.
    pub data: Vec<u8>,
    /// Single-bit write.
    pub is_coil: bool,
}

/// A field device seen through [`MockConnector`].
///
/// Payloads are kept per device address. A successful write replaces the
/// payload at its address, so the next poll reads back what was written.
#[derive(Debug, Default)]
pub struct MockDevice {
    payloads: Mutex<HashMap<String, Vec<u8>>>,
    reads_by_address: Mutex<HashMap<String, u64>>,
    fail_connect: AtomicBool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    connect_count: AtomicU64,
    disconnect_count: AtomicU64,
    read_count: AtomicU64,
    write_history: Mutex<Vec<WriteRecord>>,
    endpoints: Mutex<Vec<RemoteEndpoint>>,
}

impl MockDevice {
    /// Creates a device with no payloads.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sets the payload returned for `address`.
    pub fn set_payload(&self, address: impl Into<String>, payload: Vec<u8>) {
        self.payloads.lock().insert(address.into(), payload);
    }

    /// Returns the payload currently held at `address`.
    pub fn payload(&self, address: &str) -> Option<Vec<u8>> {
        self.payloads.lock().get(address).cloned()
    }

    /// Makes every connect fail.
    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Makes every read fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of connect attempts.
    pub fn connect_count(&self) -> u64 {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// Number of disconnects.
    pub fn disconnect_count(&self) -> u64 {
        self.disconnect_count.load(Ordering::SeqCst)
    }

    /// Number of read attempts, failed ones included.
    pub fn read_count(&self) -> u64 {
        self.read_count.load(Ordering::SeqCst)
    }

    /// Number of read attempts at `address`.
    pub fn reads_of(&self, address: &str) -> u64 {
        self.reads_by_address.lock().get(address).copied().unwrap_or(0)
    }

    /// Accepted writes in order.
    pub fn write_history(&self) -> Vec<WriteRecord> {
        self.write_history.lock().clone()
    }

    /// Endpoints connected to, in order.
    pub fn endpoints(&self) -> Vec<RemoteEndpoint> {
        self.endpoints.lock().clone()
    }
}

// =============================================================================
// Mock Connector
// =============================================================================

/// A connector that talks to a [`MockDevice`] instead of the network.
pub struct MockConnector {
    kind: ConnectorKind,
    device: Arc<MockDevice>,
    endpoint: Option<RemoteEndpoint>,
    connected: bool,
}

impl MockConnector {
    /// Creates an unconnected connector.
    pub fn new(kind: ConnectorKind, device: Arc<MockDevice>) -> Self {
        Self {
            kind,
            device,
            endpoint: None,
            connected: false,
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn kind(&self) -> ConnectorKind {
        self.kind
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<(), ConnectorError> {
        self.device.connect_count.fetch_add(1, Ordering::SeqCst);
        if self.device.fail_connect.load(Ordering::SeqCst) {
            return Err(ConnectorError::connection(format!("{}:{}", host, port), "connection refused"));
        }
        let endpoint = RemoteEndpoint::new(host, port);
        self.device.endpoints.lock().push(endpoint.clone());
        self.endpoint = Some(endpoint);
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ConnectorError> {
        self.device.disconnect_count.fetch_add(1, Ordering::SeqCst);
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn read(&mut self, address: &DeviceAddress) -> Result<Vec<u8>, ConnectorError> {
        self.device.read_count.fetch_add(1, Ordering::SeqCst);
        *self
            .device
            .reads_by_address
            .lock()
            .entry(address.address.clone())
            .or_default() += 1;

        if !self.connected {
            return Err(ConnectorError::NotConnected);
        }
        if self.device.fail_reads.load(Ordering::SeqCst) {
            return Err(ConnectorError::read(address.to_string(), "injected read failure"));
        }
        self.device
            .payload(&address.address)
            .ok_or_else(|| ConnectorError::read(address.to_string(), "no such address"))
    }

    async fn write(
        &mut self,
        address: &DeviceAddress,
        data: &[u8],
        is_coil: bool,
    ) -> Result<(), ConnectorError> {
        if !self.connected {
            return Err(ConnectorError::NotConnected);
        }
        if self.device.fail_writes.load(Ordering::SeqCst) {
            return Err(ConnectorError::write(address.to_string(), "injected write failure"));
        }
        self.device.write_history.lock().push(WriteRecord {
            address: address.address.clone(),
            data: data.to_vec(),
            is_coil,
        });
        self.device.set_payload(address.address.clone(), data.to_vec());
        Ok(())
    }

    fn remote_endpoint(&self) -> Option<RemoteEndpoint> {
        self.endpoint.clone()
    }
}

/// Creates [`MockConnector`]s of one kind, all backed by the same device.
pub struct MockConnectorFactory {
    kind: ConnectorKind,
    device: Arc<MockDevice>,
}

impl MockConnectorFactory {
    /// Creates a factory for `kind`.
    pub fn new(kind: ConnectorKind, device: Arc<MockDevice>) -> Self {
        Self { kind, device }
    }

    /// Returns a registry serving every connector kind from `device`.
    pub fn registry(device: &Arc<MockDevice>) -> ConnectorRegistry {
        let mut registry = ConnectorRegistry::new();
        for kind in ConnectorKind::ALL {
            registry.register(Box::new(Self::new(kind, device.clone())));
        }
        registry
    }
}

impl ConnectorFactory for MockConnectorFactory {
    fn kind(&self) -> ConnectorKind {
        self.kind
    }

    fn create(&self, _base: &BaseAddress) -> Result<Box<dyn Connector>, ConnectorError> {
        Ok(Box::new(MockConnector::new(self.kind, self.device.clone())))
    }
}

// =============================================================================
// Modbus Simulator
// =============================================================================

/// Number of holding registers and coils the simulator exposes.
pub const SIMULATOR_SIZE: usize = 64;

#[derive(Debug)]
struct SimulatorState {
    registers: Mutex<[u16; SIMULATOR_SIZE]>,
    coils: Mutex<[bool; SIMULATOR_SIZE]>,
    requests: AtomicU64,
}

/// A Modbus TCP slave on `127.0.0.1` serving function codes 1, 3, 4, 5, 6,
/// 15 and 16. Input registers mirror the holding registers.
pub struct ModbusSimulator {
    port: u16,
    state: Arc<SimulatorState>,
    task: JoinHandle<()>,
}

impl ModbusSimulator {
    /// Starts the simulator on an ephemeral port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind simulator");
        let port = listener.local_addr().expect("Simulator has no address").port();
        let state = Arc::new(SimulatorState {
            registers: Mutex::new([0; SIMULATOR_SIZE]),
            coils: Mutex::new([false; SIMULATOR_SIZE]),
            requests: AtomicU64::new(0),
        });

        let shared = state.clone();
        let task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve_connection(socket, shared.clone()));
            }
        });

        Self { port, state, task }
    }

    /// Port the simulator listens on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base address of the simulator for unit `unit`.
    pub fn base(&self, unit: u8) -> String {
        format!("modbus+tcp://127.0.0.1:{}/{}", self.port, unit)
    }

    /// Sets holding registers starting at `start`.
    pub fn set_registers(&self, start: usize, values: &[u16]) {
        self.state.registers.lock()[start..start + values.len()].copy_from_slice(values);
    }

    /// Returns `count` holding registers starting at `start`.
    pub fn registers(&self, start: usize, count: usize) -> Vec<u16> {
        self.state.registers.lock()[start..start + count].to_vec()
    }

    /// Returns one coil.
    pub fn coil(&self, index: usize) -> bool {
        self.state.coils.lock()[index]
    }

    /// Sets one coil.
    pub fn set_coil(&self, index: usize, value: bool) {
        self.state.coils.lock()[index] = value;
    }

    /// Number of requests served.
    pub fn request_count(&self) -> u64 {
        self.state.requests.load(Ordering::SeqCst)
    }
}

impl Drop for ModbusSimulator {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_connection(mut socket: TcpStream, state: Arc<SimulatorState>) {
    loop {
        let mut header = [0u8; 7];
        if socket.read_exact(&mut header).await.is_err() {
            return;
        }
        let len = usize::from(u16::from_be_bytes([header[4], header[5]]));
        let mut pdu = vec![0u8; len.saturating_sub(1)];
        if socket.read_exact(&mut pdu).await.is_err() {
            return;
        }
        state.requests.fetch_add(1, Ordering::SeqCst);

        let response = respond(&state, &pdu);
        let mut frame = header[..4].to_vec();
        frame.extend_from_slice(&((response.len() + 1) as u16).to_be_bytes());
        frame.push(header[6]);
        frame.extend(response);
        if socket.write_all(&frame).await.is_err() {
            return;
        }
    }
}

fn respond(state: &SimulatorState, pdu: &[u8]) -> Vec<u8> {
    if pdu.len() < 5 {
        return vec![pdu.first().copied().unwrap_or(0) | 0x80, 0x03];
    }
    let fc = pdu[0];
    let start = usize::from(u16::from_be_bytes([pdu[1], pdu[2]]));
    let word = u16::from_be_bytes([pdu[3], pdu[4]]);
    let count = usize::from(word);
    let illegal_address = vec![fc | 0x80, 0x02];

    match fc {
        0x01 => {
            if start + count > SIMULATOR_SIZE {
                return illegal_address;
            }
            let coils = state.coils.lock();
            let mut packed = vec![0u8; count.div_ceil(8)];
            for (i, bit) in coils[start..start + count].iter().enumerate() {
                if *bit {
                    packed[i / 8] |= 1 << (i % 8);
                }
            }
            let mut out = vec![fc, packed.len() as u8];
            out.extend(packed);
            out
        }
        0x03 | 0x04 => {
            if start + count > SIMULATOR_SIZE {
                return illegal_address;
            }
            let registers = state.registers.lock();
            let mut out = vec![fc, (count * 2) as u8];
            for r in &registers[start..start + count] {
                out.extend_from_slice(&r.to_be_bytes());
            }
            out
        }
        0x05 => {
            if start >= SIMULATOR_SIZE {
                return illegal_address;
            }
            state.coils.lock()[start] = word == 0xFF00;
            pdu[..5].to_vec()
        }
        0x06 => {
            if start >= SIMULATOR_SIZE {
                return illegal_address;
            }
            state.registers.lock()[start] = word;
            pdu[..5].to_vec()
        }
        0x0F => {
            if start + count > SIMULATOR_SIZE || pdu.len() < 6 + count.div_ceil(8) {
                return illegal_address;
            }
            let mut coils = state.coils.lock();
            for i in 0..count {
                coils[start + i] = pdu[6 + i / 8] & (1 << (i % 8)) != 0;
            }
            pdu[..5].to_vec()
        }
        0x10 => {
            if start + count > SIMULATOR_SIZE || pdu.len() < 6 + 2 * count {
                return illegal_address;
            }
            let mut registers = state.registers.lock();
            for i in 0..count {
                registers[start + i] = u16::from_be_bytes([pdu[6 + 2 * i], pdu[7 + 2 * i]]);
            }
            pdu[..5].to_vec()
        }
        _ => vec![fc | 0x80, 0x01],
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn address(addr: &str) -> DeviceAddress {
        DeviceAddress {
            address: addr.to_string(),
            unit_id: 1,
            entity: "HoldingRegister".to_string(),
            quantity: 2,
        }
    }

    #[tokio::test]
    async fn test_mock_connector_round_trip() {
        let device = MockDevice::new();
        let mut connector = MockConnector::new(ConnectorKind::Modbus, device.clone());

        assert!(matches!(
            connector.read(&address("0")).await,
            Err(ConnectorError::NotConnected)
        ));

        connector.connect("10.0.0.5", 502).await.unwrap();
        connector.write(&address("0"), &[1, 2], false).await.unwrap();
        assert_eq!(connector.read(&address("0")).await.unwrap(), vec![1, 2]);

        assert_eq!(device.reads_of("0"), 2);
        assert_eq!(device.write_history().len(), 1);
        assert_eq!(device.endpoints(), vec![RemoteEndpoint::new("10.0.0.5", 502)]);
    }

    #[tokio::test]
    async fn test_mock_connector_injected_failures() {
        let device = MockDevice::new();
        device.set_payload("0", vec![0; 4]);
        let mut connector = MockConnector::new(ConnectorKind::Generic, device.clone());

        device.fail_connect(true);
        assert!(connector.connect("plc", 4840).await.is_err());
        device.fail_connect(false);
        connector.connect("plc", 4840).await.unwrap();

        device.fail_reads(true);
        assert!(connector.read(&address("0")).await.is_err());
        device.fail_writes(true);
        assert!(connector.write(&address("0"), &[1], false).await.is_err());
        assert!(device.write_history().is_empty());
        assert_eq!(device.connect_count(), 2);
    }

    #[test]
    fn test_registry_serves_every_kind() {
        let registry = MockConnectorFactory::registry(&MockDevice::new());
        assert_eq!(registry.len(), ConnectorKind::ALL.len());
    }

    #[test]
    fn test_simulator_function_codes() {
        let state = SimulatorState {
            registers: Mutex::new([0; SIMULATOR_SIZE]),
            coils: Mutex::new([false; SIMULATOR_SIZE]),
            requests: AtomicU64::new(0),
        };

        assert_eq!(respond(&state, &[0x10, 0, 2, 0, 2, 4, 0x41, 0x48, 0, 0]), vec![0x10, 0, 2, 0, 2]);
        assert_eq!(respond(&state, &[0x03, 0, 2, 0, 2]), vec![0x03, 4, 0x41, 0x48, 0, 0]);
        assert_eq!(respond(&state, &[0x05, 0, 3, 0xFF, 0]), vec![0x05, 0, 3, 0xFF, 0]);
        assert_eq!(respond(&state, &[0x01, 0, 0, 0, 8]), vec![0x01, 1, 0b0000_1000]);
        assert_eq!(respond(&state, &[0x03, 0, 63, 0, 2]), vec![0x83, 0x02]);
        assert_eq!(respond(&state, &[0x2B, 0, 0, 0, 0]), vec![0xAB, 0x01]);
    }
}
