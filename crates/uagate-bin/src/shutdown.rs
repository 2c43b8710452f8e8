// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Stopping the gateway.
//!
//! The runtime waits on a [`ShutdownCoordinator`]; it is released by the
//! first termination signal or by any clone calling
//! [`ShutdownCoordinator::initiate_shutdown`].

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

/// Shared stop flag for the runtime.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    stop: Arc<watch::Sender<bool>>,
}

impl ShutdownCoordinator {
    /// Creates a coordinator that has not been triggered.
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self { stop: Arc::new(stop) }
    }

    /// Triggers shutdown. Only the first call has an effect.
    pub fn initiate_shutdown(&self) {
        let first = self.stop.send_if_modified(|stopped| !std::mem::replace(stopped, true));
        if first {
            info!("Shutdown requested");
        }
    }

    /// Returns true once shutdown was triggered.
    pub fn is_shutdown_initiated(&self) -> bool {
        *self.stop.borrow()
    }

    /// Resolves when shutdown is triggered, by a signal or a clone.
    pub async fn wait_for_shutdown(&self) {
        let mut stopped = self.stop.subscribe();
        let requested = async move {
            while !*stopped.borrow_and_update() {
                if stopped.changed().await.is_err() {
                    break;
                }
            }
        };
        tokio::select! {
            _ = requested => {}
            _ = termination_signal() => self.initiate_shutdown(),
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for SIGTERM or SIGINT. Pends forever if the handlers cannot be
/// installed, so only [`ShutdownCoordinator::initiate_shutdown`] remains.
#[cfg(unix)]
async fn termination_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut term), Ok(mut int)) => {
            let name = tokio::select! {
                _ = term.recv() => "SIGTERM",
                _ = int.recv() => "SIGINT",
            };
            info!(signal = name, "Termination signal received");
        }
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "Signal handlers unavailable");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn termination_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Ctrl+C handler unavailable");
        std::future::pending::<()>().await;
    }
    info!(signal = "ctrl-c", "Termination signal received");
}
