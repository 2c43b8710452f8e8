// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Shared pieces of the integration suites.

pub mod assertions;
pub mod builders;
pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
pub use harness::*;
pub use mocks::*;

static LOGGING: std::sync::Once = std::sync::Once::new();

/// Routes gateway logs to the test output, once per test binary.
///
/// `RUST_LOG` overrides the default of core debug logs over warnings.
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn,uagate_core=debug".into());
        // Another harness may have installed a subscriber already.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A fresh directory removed when the returned guard drops.
pub fn temp_test_dir(label: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(&format!("uagate-{}-", label))
        .tempdir()
        .unwrap_or_else(|e| panic!("temp dir for {}: {}", label, e))
}
