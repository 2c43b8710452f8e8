// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uagate Integration Tests
//!
//! Gateway-level tests that drive the management service the way a consumer
//! does, with the real description store and provisioning gate on disk.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `fixtures`: Ready-made descriptions, payloads and config files
//!   - `builders`: Builders for Thing Descriptions
//!   - `assertions`: Status code and polling assertions
//!   - `mocks`: A scripted connector and a small Modbus TCP slave
//!   - `harness`: A gateway on a temp directory that can be restarted
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p uagate-tests
//!
//! # Run one suite
//! cargo test -p uagate-tests --test integration_lifecycle
//! cargo test -p uagate-tests --test integration_polling
//! cargo test -p uagate-tests --test integration_provisioning
//! cargo test -p uagate-tests --test integration_config
//! cargo test -p uagate-tests --test integration_modbus
//! ```
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use uagate_tests::prelude::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_something() {
//!     let gateway = TestGateway::new();
//!     let text = DescriptionBuilder::new("pump-01")
//!         .property("pressure", PropertyBuilder::holding_register(0, 2).float())
//!         .build();
//!     let asset = gateway.service.configure_asset(Some(&text)).await.unwrap();
//!     gateway.device.set_payload("0", PayloadFixtures::modbus_f32(2.5));
//!     tokio::time::sleep(ONE_POLL).await;
//!     // ...
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::assertions::*;
    pub use crate::common::builders::*;
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::mocks::*;
}
