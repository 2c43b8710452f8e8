// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The `uagate` executable as a library, so the integration tests can build
//! the same runtime the binary runs.
//!
//! [`cli`] parses arguments and [`commands::execute`] dispatches them. The
//! `run` command loads the configuration, installs [`logging`] and hands a
//! [`GatewayRuntime`] the job of wiring every connector to the management
//! service until [`shutdown`] releases it. `validate` and `assets` only read
//! the configuration and the settings directory.
//!
//! ```bash
//! uagate -c /etc/uagate/uagate.yaml run --no-restore
//! uagate validate --show-config
//! uagate assets -f json
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{GatewayRuntime, RuntimeBuilder};
pub use shutdown::ShutdownCoordinator;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
