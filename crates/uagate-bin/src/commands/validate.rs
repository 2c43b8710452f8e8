// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use uagate_config::UagateConfig;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::commands::assets::{inspect_descriptions, StoredAsset};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command.
///
/// Fails when the configuration does not load or any stored description
/// would be skipped on restore.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;

    let config = uagate_config::load_config(config_path)?;

    let assets = inspect_descriptions(&config.gateway.settings_dir)?;
    let warnings = collect_warnings(&config);
    let invalid = assets.iter().filter(|a| !a.is_valid()).count();

    match args.format {
        OutputFormat::Text => print_text(cli, &args, &config, &assets, &warnings),
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": invalid == 0,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "gateway_name": config.gateway.name,
                    "settings_dir": config.gateway.settings_dir.display().to_string(),
                    "trust_dir": config.gateway.trust_dir.display().to_string(),
                    "connect_timeout_ms": config.connectors.connect_timeout_ms,
                    "operation_timeout_ms": config.connectors.operation_timeout_ms,
                    "stored_descriptions": assets.len(),
                },
                "descriptions": assets,
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            let text = serde_json::to_string_pretty(&output)?;
            println!("{}", text);
        }
    }

    if invalid > 0 {
        return Err(BinError::InvalidDescriptions { count: invalid });
    }
    Ok(())
}

fn collect_warnings(config: &UagateConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if !config.gateway.settings_dir.exists() {
        warnings.push(format!(
            "Settings directory does not exist yet: {}",
            config.gateway.settings_dir.display()
        ));
    }
    if !config.gateway.trust_dir.exists() {
        warnings.push(format!(
            "Trust directory does not exist, the gateway starts in provisioning mode: {}",
            config.gateway.trust_dir.display()
        ));
    }
    if config.connectors.operation_timeout_ms > config.connectors.connect_timeout_ms {
        warnings.push("Operation timeout is longer than the connect timeout".to_string());
    }
    warnings
}

fn print_text(
    cli: &Cli,
    args: &ValidateArgs,
    config: &UagateConfig,
    assets: &[StoredAsset],
    warnings: &[String],
) {
    println!("✓ Configuration is valid: {}", cli.config.display());
    println!();
    println!("Summary:");
    println!("  Gateway Name:  {}", config.gateway.name);
    println!("  Settings Dir:  {}", config.gateway.settings_dir.display());
    println!("  Trust Dir:     {}", config.gateway.trust_dir.display());
    println!(
        "  Timeouts:      connect {} ms, operation {} ms",
        config.connectors.connect_timeout_ms, config.connectors.operation_timeout_ms
    );
    println!("  Descriptions:  {}", assets.len());

    for asset in assets.iter().filter(|a| !a.is_valid()) {
        println!(
            "  ✗ {}: {}",
            asset.source,
            asset.error.as_deref().unwrap_or("invalid")
        );
    }

    if !warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in warnings {
            println!("  ⚠ {}", warning);
        }
    }

    if args.show_config {
        println!();
        println!("Parsed configuration:");
        match serde_yaml::to_string(config) {
            Ok(text) => println!("{}", text),
            Err(e) => println!("(serialization error: {})", e),
        }
    }
}
