// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Scripted connector shared by the unit tests of this crate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::address::{BaseAddress, DeviceAddress};
use crate::connector::{Connector, ConnectorFactory, RemoteEndpoint};
use crate::error::ConnectorError;
use crate::types::ConnectorKind;

/// Shared state of a [`ScriptedConnector`], inspected by tests.
#[derive(Debug, Default)]
pub struct Script {
    pub payload: Mutex<Vec<u8>>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub fail_connect: AtomicBool,
    pub reads: AtomicUsize,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub written: Mutex<Vec<(String, Vec<u8>, bool)>>,
}

impl Script {
    pub fn with_payload(payload: Vec<u8>) -> Arc<Self> {
        let script = Self::default();
        *script.payload.lock() = payload;
        Arc::new(script)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

pub struct ScriptedConnector {
    kind: ConnectorKind,
    script: Arc<Script>,
    endpoint: Option<RemoteEndpoint>,
}

#[async_trait]
impl Connector for ScriptedConnector {
    fn kind(&self) -> ConnectorKind {
        self.kind
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<(), ConnectorError> {
        self.script.connects.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_connect.load(Ordering::SeqCst) {
            return Err(ConnectorError::connection(format!("{}:{}", host, port), "refused"));
        }
        self.endpoint = Some(RemoteEndpoint::new(host, port));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ConnectorError> {
        self.script.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.endpoint.is_some()
    }

    async fn read(&mut self, address: &DeviceAddress) -> Result<Vec<u8>, ConnectorError> {
        self.script.reads.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_reads.load(Ordering::SeqCst) {
            return Err(ConnectorError::read(address.to_string(), "scripted failure"));
        }
        Ok(self.script.payload.lock().clone())
    }

    async fn write(
        &mut self,
        address: &DeviceAddress,
        data: &[u8],
        is_coil: bool,
    ) -> Result<(), ConnectorError> {
        if self.script.fail_writes.load(Ordering::SeqCst) {
            return Err(ConnectorError::write(address.to_string(), "scripted failure"));
        }
        self.script
            .written
            .lock()
            .push((address.address.clone(), data.to_vec(), is_coil));
        Ok(())
    }

    fn remote_endpoint(&self) -> Option<RemoteEndpoint> {
        self.endpoint.clone()
    }
}

pub struct ScriptedFactory {
    pub kind: ConnectorKind,
    pub script: Arc<Script>,
}

impl ConnectorFactory for ScriptedFactory {
    fn kind(&self) -> ConnectorKind {
        self.kind
    }

    fn create(&self, _base: &BaseAddress) -> Result<Box<dyn Connector>, ConnectorError> {
        Ok(Box::new(ScriptedConnector {
            kind: self.kind,
            script: self.script.clone(),
            endpoint: None,
        }))
    }
}
