// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Gateway runtime orchestration.
//!
//! Startup order:
//!
//! ```text
//! config ──► connector registry ──► address space + registry ──► asset manager
//!                                                                    │
//!             trust dir gate + description store ──► management service
//!                                                                    │
//!                                     restore stored descriptions ◄──┘
//!                                                │
//!                                      wait for shutdown ──► stop workers
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use uagate_config::{load_config, FileDescriptionStore, TrustDirectoryGate, UagateConfig};
use uagate_core::address_space::{InMemoryAddressSpace, ProvisioningGate};
use uagate_core::connector::ConnectorRegistry;
use uagate_core::lifecycle::AssetManager;
use uagate_core::registry::Registry;
use uagate_core::service::ManagementService;
use uagate_modbus::ModbusConnectorFactory;
use uagate_opcua::GenericConnectorFactory;
use uagate_plc::PlcOptions;

use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// GatewayRuntime
// =============================================================================

/// The gateway runtime: builds the service, restores assets and runs until
/// shutdown.
pub struct GatewayRuntime {
    config: Arc<UagateConfig>,
    shutdown: ShutdownCoordinator,
    restore: bool,
}

impl GatewayRuntime {
    /// Creates a new gateway runtime.
    pub fn new(config: UagateConfig) -> Self {
        Self {
            config: Arc::new(config),
            shutdown: ShutdownCoordinator::new(),
            restore: true,
        }
    }

    /// Enables or disables reloading stored descriptions on startup.
    pub fn with_restore(mut self, enabled: bool) -> Self {
        self.restore = enabled;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &UagateConfig {
        &self.config
    }

    /// Returns a handle that can stop a running gateway.
    pub fn shutdown_handle(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    /// Runs the gateway until shutdown is signaled.
    pub async fn run(self) -> BinResult<()> {
        info!(
            gateway = %self.config.gateway.name,
            "Starting uagate v{}",
            uagate_core::VERSION
        );

        let service = self.build_service()?;

        if self.restore {
            let restored = service.restore().await;
            info!(restored, "Stored descriptions reloaded");
        }

        info!(
            assets = service.get_configured_assets().len(),
            settings_dir = %self.config.gateway.settings_dir.display(),
            "uagate is ready"
        );
        self.shutdown.wait_for_shutdown().await;

        info!("Shutdown initiated, stopping asset workers...");
        service.manager().shutdown().await;
        info!("uagate shutdown complete");

        Ok(())
    }

    /// Builds the management service and everything below it.
    pub fn build_service(&self) -> BinResult<Arc<ManagementService>> {
        let connectors = Arc::new(build_connector_registry(&self.config));
        info!(
            kinds = ?connectors.supported_kinds().iter().map(|k| k.as_str()).collect::<Vec<_>>(),
            "Connectors registered"
        );

        let registry = Arc::new(Registry::new(Arc::new(InMemoryAddressSpace::new())));
        let manager = Arc::new(AssetManager::new(registry, connectors));

        let settings_dir = &self.config.gateway.settings_dir;
        let store = FileDescriptionStore::open(settings_dir)
            .map_err(|e| BinError::settings_dir(settings_dir, e))?;

        let gate = TrustDirectoryGate::new(&self.config.gateway.trust_dir);
        if gate.is_active() {
            warn!(
                trust_dir = %gate.dir().display(),
                "No trusted client certificate yet, variable access is refused until one is added"
            );
        }

        Ok(Arc::new(ManagementService::new(
            manager,
            Arc::new(store),
            Arc::new(gate),
        )))
    }
}

/// Registers every connector factory with the configured timeouts.
pub fn build_connector_registry(config: &UagateConfig) -> ConnectorRegistry {
    let settings = config.connectors.settings();

    let mut registry = ConnectorRegistry::new();
    registry.register(Box::new(ModbusConnectorFactory::new(settings)));
    registry.register(Box::new(GenericConnectorFactory::new(settings)));
    uagate_plc::register_all(
        &mut registry,
        settings,
        PlcOptions {
            bacnet_local_port: config.connectors.bacnet_local_port,
            ads_source_port: config.connectors.ads_source_port,
        },
    );
    registry
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for constructing the gateway runtime.
#[derive(Default)]
pub struct RuntimeBuilder {
    config_path: Option<PathBuf>,
    config: Option<UagateConfig>,
    restore: Option<bool>,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the configuration directly.
    pub fn config(mut self, config: UagateConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Enables or disables reloading stored descriptions.
    pub fn restore(mut self, enabled: bool) -> Self {
        self.restore = Some(enabled);
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> BinResult<GatewayRuntime> {
        let config = match self.config {
            Some(cfg) => cfg,
            None => {
                let path = self
                    .config_path
                    .ok_or_else(|| BinError::config("No configuration provided"))?;

                load_config(&path)?
            }
        };

        Ok(GatewayRuntime::new(config).with_restore(self.restore.unwrap_or(true)))
    }
}

// =============================================================================
// Tests
// =============================================================================
