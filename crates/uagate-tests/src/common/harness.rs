// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! A gateway assembled the way the binary assembles it, but on a temp
//! directory and with every connector kind served by one [`MockDevice`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use uagate_config::{FileDescriptionStore, TrustDirectoryGate};
use uagate_core::address_space::InMemoryAddressSpace;
use uagate_core::lifecycle::AssetManager;
use uagate_core::registry::Registry;
use uagate_core::service::ManagementService;

use crate::common::init_test_logging;
use crate::common::mocks::{MockConnectorFactory, MockDevice};

/// A gateway on disk that can be stopped and started again.
pub struct TestGateway {
    temp: TempDir,
    /// Where descriptions are persisted.
    pub settings_dir: PathBuf,
    /// The trusted-certificate directory behind the provisioning gate.
    pub trust_dir: PathBuf,
    /// Device behind every connector.
    pub device: Arc<MockDevice>,
    /// The management service.
    pub service: Arc<ManagementService>,
    /// The address space of the current run.
    pub address_space: Arc<InMemoryAddressSpace>,
}

impl TestGateway {
    /// A gateway with one trusted certificate, so variable access is open.
    pub fn new() -> Self {
        let gateway = Self::provisioning();
        gateway.trust_certificate("client.der");
        gateway
    }

    /// A gateway with an empty trust directory, i.e. in provisioning mode.
    pub fn provisioning() -> Self {
        init_test_logging();
        let temp = TempDir::new().expect("create temp dir");
        let settings_dir = temp.path().join("settings");
        let trust_dir = temp.path().join("pki").join("trusted");
        fs::create_dir_all(&trust_dir).expect("create trust dir");

        let device = MockDevice::new();
        let (service, address_space) = assemble(&settings_dir, &trust_dir, &device);
        Self {
            temp,
            settings_dir,
            trust_dir,
            device,
            service,
            address_space,
        }
    }

    /// Returns the temp directory root.
    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Drops a certificate file into the trust directory.
    pub fn trust_certificate(&self, name: &str) {
        fs::write(self.trust_dir.join(name), [0x30, 0x82, 0x01, 0x0a]).expect("write certificate");
    }

    /// Removes every file from the trust directory.
    pub fn revoke_all(&self) {
        for entry in fs::read_dir(&self.trust_dir).expect("read trust dir").flatten() {
            fs::remove_file(entry.path()).expect("remove certificate");
        }
    }

    /// Stops the gateway, builds a fresh one over the same directories and
    /// device, and reloads the stored descriptions.
    ///
    /// Returns the number of restored assets.
    pub async fn restart(&mut self) -> usize {
        self.service.manager().shutdown().await;
        let (service, address_space) = assemble(&self.settings_dir, &self.trust_dir, &self.device);
        self.service = service;
        self.address_space = address_space;
        self.service.restore().await
    }

    /// Returns the persisted description files, sorted.
    pub fn stored_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = match fs::read_dir(&self.settings_dir) {
            Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        };
        files.sort();
        files
    }

    /// Stops every polling worker.
    pub async fn shutdown(&self) {
        self.service.manager().shutdown().await;
    }
}

impl Default for TestGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn assemble(
    settings_dir: &Path,
    trust_dir: &Path,
    device: &Arc<MockDevice>,
) -> (Arc<ManagementService>, Arc<InMemoryAddressSpace>) {
    let address_space = Arc::new(InMemoryAddressSpace::new());
    let registry = Arc::new(Registry::new(address_space.clone()));
    let connectors = Arc::new(MockConnectorFactory::registry(device));
    let manager = Arc::new(AssetManager::new(registry, connectors));

    let store = FileDescriptionStore::open(settings_dir).expect("open settings dir");
    let gate = TrustDirectoryGate::new(trust_dir).with_recheck_interval(Duration::ZERO);

    let service = Arc::new(ManagementService::new(manager, Arc::new(store), Arc::new(gate)));
    (service, address_space)
}
