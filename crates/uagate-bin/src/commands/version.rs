// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use uagate_core::types::ConnectorKind;

use crate::cli::Cli;
use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("uagate - industrial protocol gateway");
    println!();
    println!("Version Information:");
    println!("  uagate-bin:    {}", crate::VERSION);
    println!("  uagate-core:   {}", uagate_core::VERSION);
    println!("  uagate-config: {}", uagate_config::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:        {}", std::env::consts::ARCH);
    println!("  OS:            {}", std::env::consts::OS);
    println!();
    println!("Connectors:");
    for kind in ConnectorKind::ALL {
        println!("  {:<12} default port {}", kind.as_str(), kind.default_port());
    }
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
