// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Provisioning gate driven by the trusted-certificate directory.
//!
//! The gateway is in provisioning mode while no client certificate has been
//! trusted yet, i.e. while the trust directory is missing or holds no
//! regular files. Hidden files are not counted.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use uagate_core::address_space::ProvisioningGate;

/// How long a directory check result is reused.
pub const DEFAULT_RECHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Provisioning gate that is active while the trust directory is empty.
#[derive(Debug)]
pub struct TrustDirectoryGate {
    dir: PathBuf,
    recheck_interval: Duration,
    cached: Mutex<Option<(Instant, bool)>>,
}

impl TrustDirectoryGate {
    /// Creates a gate watching `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            recheck_interval: DEFAULT_RECHECK_INTERVAL,
            cached: Mutex::new(None),
        }
    }

    /// Sets how long a check result is reused.
    pub fn with_recheck_interval(mut self, interval: Duration) -> Self {
        self.recheck_interval = interval;
        self
    }

    /// Returns the watched directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn directory_is_empty(&self) -> bool {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return true;
        };
        !entries.filter_map(Result::ok).any(|entry| {
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            !hidden && entry.file_type().map(|t| t.is_file()).unwrap_or(false)
        })
    }
}

impl ProvisioningGate for TrustDirectoryGate {
    fn is_active(&self) -> bool {
        let mut cached = self.cached.lock();
        if let Some((checked_at, active)) = *cached {
            if checked_at.elapsed() < self.recheck_interval {
                return active;
            }
        }

        let active = self.directory_is_empty();
        if (*cached).map(|(_, previous)| previous) != Some(active) {
            if active {
                tracing::warn!(trust_dir = %self.dir.display(), "Provisioning mode active, reads and writes are refused");
            } else {
                tracing::info!(trust_dir = %self.dir.display(), "Trusted certificate found, provisioning mode off");
            }
        }
        *cached = Some((Instant::now(), active));
        active
    }
}
