// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus TCP connector on `tokio-modbus`.
//!
//! ```text
//! read(tag)                                 write(tag, bytes, is_coil)
//!   ├─ Coil / DiscreteInput → FC 1 / 2        ├─ Coil, 1 bit    → FC 5
//!   │    bits packed LSB first                ├─ Coil, n bits   → FC 15
//!   └─ Holding / InputRegister → FC 3 / 4     ├─ Holding, 1 reg → FC 6
//!        registers as big-endian bytes        └─ Holding, n reg → FC 16
//! ```
//!
//! The unit id of each request comes from the tag address, so one session
//! serves every unit behind a gateway.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_modbus::client::{tcp, Context};
use tokio_modbus::prelude::*;

use uagate_core::address::{BaseAddress, DeviceAddress};
use uagate_core::connector::{Connector, ConnectorFactory, ConnectorSettings, RemoteEndpoint};
use uagate_core::error::{AddressError, ConnectorError};
use uagate_core::types::ConnectorKind;

use crate::error::{ModbusError, ModbusResult};
use crate::types::{
    bits_to_bytes, bytes_to_bits, bytes_to_registers, registers_to_bytes, ModbusAddress,
    RegisterKind,
};

// =============================================================================
// ModbusConnector
// =============================================================================

/// Modbus TCP connector.
pub struct ModbusConnector {
    settings: ConnectorSettings,
    default_unit: u8,
    context: Option<tokio::sync::Mutex<Context>>,
    endpoint: Option<RemoteEndpoint>,
}

impl ModbusConnector {
    /// Creates an unconnected connector.
    pub fn new(settings: ConnectorSettings, default_unit: u8) -> Self {
        Self {
            settings,
            default_unit,
            context: None,
            endpoint: None,
        }
    }

    async fn resolve(host: &str, port: u16) -> ModbusResult<SocketAddr> {
        if let Ok(addr) = format!("{}:{}", host, port).parse::<SocketAddr>() {
            return Ok(addr);
        }
        tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| ModbusError::connection(host, port, format!("DNS resolution failed: {}", e)))?
            .next()
            .ok_or_else(|| ModbusError::connection(host, port, "DNS resolution returned no address"))
    }

    fn context(&mut self, unit_id: u8) -> ModbusResult<&mut Context> {
        let ctx = self.context.as_mut().ok_or(ModbusError::NotConnected)?.get_mut();
        ctx.set_slave(Slave(unit_id));
        Ok(ctx)
    }

    async fn read_raw(&mut self, addr: &ModbusAddress) -> ModbusResult<Vec<u8>> {
        let operation_timeout = self.settings.operation_timeout;
        let ctx = self.context(addr.unit_id)?;
        let (operation, start, count) = (operation_name(addr.kind, false), addr.address, addr.quantity);

        let bytes = match addr.kind {
            RegisterKind::Coil => {
                let bits = exchange(operation, start, operation_timeout, ctx.read_coils(start, count)).await?;
                bits_to_bytes(&bits)
            }
            RegisterKind::DiscreteInput => {
                let bits =
                    exchange(operation, start, operation_timeout, ctx.read_discrete_inputs(start, count)).await?;
                bits_to_bytes(&bits)
            }
            RegisterKind::HoldingRegister => {
                let regs =
                    exchange(operation, start, operation_timeout, ctx.read_holding_registers(start, count)).await?;
                registers_to_bytes(&regs)
            }
            RegisterKind::InputRegister => {
                let regs =
                    exchange(operation, start, operation_timeout, ctx.read_input_registers(start, count)).await?;
                registers_to_bytes(&regs)
            }
        };
        Ok(bytes)
    }

    async fn write_raw(&mut self, addr: &ModbusAddress, data: &[u8], is_coil: bool) -> ModbusResult<()> {
        let operation_timeout = self.settings.operation_timeout;
        let kind = if is_coil { RegisterKind::Coil } else { addr.kind };
        if !kind.is_writable() {
            return Err(ModbusError::ReadOnly { kind: kind.name() });
        }
        let ctx = self.context(addr.unit_id)?;
        let (operation, start) = (operation_name(kind, true), addr.address);

        match kind {
            RegisterKind::Coil => {
                let bits = bytes_to_bits(data, usize::from(addr.quantity.max(1)));
                match bits.as_slice() {
                    [bit] => exchange(operation, start, operation_timeout, ctx.write_single_coil(start, *bit)).await,
                    _ => {
                        exchange(operation, start, operation_timeout, ctx.write_multiple_coils(start, &bits)).await
                    }
                }
            }
            _ => {
                let regs = bytes_to_registers(data);
                match regs.as_slice() {
                    [] => Ok(()),
                    [reg] => {
                        exchange(operation, start, operation_timeout, ctx.write_single_register(start, *reg))
                            .await
                    }
                    _ => {
                        exchange(operation, start, operation_timeout, ctx.write_multiple_registers(start, &regs))
                            .await
                    }
                }
            }
        }
    }
}

/// Runs one request with a timeout and flattens the nested result.
async fn exchange<T, F>(
    operation: &'static str,
    address: u16,
    duration: Duration,
    request: F,
) -> ModbusResult<T>
where
    F: std::future::Future<Output = tokio_modbus::Result<T>>,
{
    match timeout(duration, request).await {
        Err(_) => Err(ModbusError::Timeout { operation, duration }),
        Ok(Err(e)) => Err(ModbusError::transport(operation, address, e.to_string())),
        Ok(Ok(Err(exception))) => Err(ModbusError::exception(operation, address, exception_code(exception))),
        Ok(Ok(Ok(value))) => Ok(value),
    }
}

fn exception_code(exception: ExceptionCode) -> u8 {
    match exception {
        ExceptionCode::IllegalFunction => 0x01,
        ExceptionCode::IllegalDataAddress => 0x02,
        ExceptionCode::IllegalDataValue => 0x03,
        ExceptionCode::ServerDeviceFailure => 0x04,
        ExceptionCode::Acknowledge => 0x05,
        ExceptionCode::ServerDeviceBusy => 0x06,
        ExceptionCode::MemoryParityError => 0x08,
        ExceptionCode::GatewayPathUnavailable => 0x0A,
        ExceptionCode::GatewayTargetDevice => 0x0B,
        _ => 0xFF,
    }
}

fn operation_name(kind: RegisterKind, write: bool) -> &'static str {
    match (kind, write) {
        (RegisterKind::Coil, false) => "read_coils",
        (RegisterKind::DiscreteInput, _) => "read_discrete_inputs",
        (RegisterKind::HoldingRegister, false) => "read_holding_registers",
        (RegisterKind::InputRegister, _) => "read_input_registers",
        (RegisterKind::Coil, true) => "write_coils",
        (RegisterKind::HoldingRegister, true) => "write_registers",
    }
}

#[async_trait]
impl Connector for ModbusConnector {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Modbus
    }

    fn validate_address(&self, address: &DeviceAddress) -> Result<(), AddressError> {
        ModbusAddress::from_device(address).map(|_| ())
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<(), ConnectorError> {
        let socket_addr = Self::resolve(host, port).await?;

        let stream = timeout(self.settings.connect_timeout, TcpStream::connect(socket_addr))
            .await
            .map_err(|_| ModbusError::connection(host, port, "connect timed out"))?
            .map_err(|e| ModbusError::connection(host, port, e.to_string()))?;
        stream.set_nodelay(true).ok();

        self.context = Some(tokio::sync::Mutex::new(tcp::attach_slave(stream, Slave(self.default_unit))));
        self.endpoint = Some(RemoteEndpoint::new(host, port));

        tracing::info!(host = %host, port = port, unit_id = self.default_unit, "Connected to Modbus TCP device");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ConnectorError> {
        if let Some(mut ctx) = self.context.take().map(tokio::sync::Mutex::into_inner) {
            if let Err(e) = ctx.disconnect().await {
                tracing::debug!(error = %e, "Error closing Modbus session");
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.context.is_some()
    }

    async fn read(&mut self, address: &DeviceAddress) -> Result<Vec<u8>, ConnectorError> {
        let addr = ModbusAddress::from_device(address)?;
        let bytes = self
            .read_raw(&addr)
            .await
            .map_err(|e| e.into_read(addr.to_string()))?;
        tracing::trace!(address = %addr, len = bytes.len(), "Modbus read");
        Ok(bytes)
    }

    async fn write(
        &mut self,
        address: &DeviceAddress,
        data: &[u8],
        is_coil: bool,
    ) -> Result<(), ConnectorError> {
        let addr = ModbusAddress::from_device(address)?;
        self.write_raw(&addr, data, is_coil)
            .await
            .map_err(|e| e.into_write(addr.to_string()))?;
        tracing::trace!(address = %addr, len = data.len(), "Modbus write");
        Ok(())
    }

    fn remote_endpoint(&self) -> Option<RemoteEndpoint> {
        self.endpoint.clone()
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Creates [`ModbusConnector`]s for `modbus://`, `modbus+tcp://` and
/// `modbus.tcp://` base addresses.
#[derive(Debug, Clone, Default)]
pub struct ModbusConnectorFactory {
    settings: ConnectorSettings,
}

impl ModbusConnectorFactory {
    /// Creates a factory with the given transport settings.
    pub fn new(settings: ConnectorSettings) -> Self {
        Self { settings }
    }
}

impl ConnectorFactory for ModbusConnectorFactory {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Modbus
    }

    fn create(&self, base: &BaseAddress) -> Result<Box<dyn Connector>, ConnectorError> {
        Ok(Box::new(ModbusConnector::new(self.settings, base.unit_id())))
    }
}

// =============================================================================
// Tests
// =============================================================================
