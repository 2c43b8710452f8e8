// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! uagate - industrial protocol gateway
//!
//! Main binary entry point.

use uagate_bin::error::report_error_and_exit;
use uagate_bin::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    if let Err(e) = uagate_bin::commands::execute(cli).await {
        report_error_and_exit(e);
    }
}
