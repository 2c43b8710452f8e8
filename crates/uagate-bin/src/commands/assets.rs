// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `assets` command.

use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use uagate_config::FileDescriptionStore;
use uagate_core::address::BaseAddress;
use uagate_core::description::ThingDescription;
use uagate_core::service::DescriptionStore;

use crate::cli::{AssetsArgs, Cli, OutputFormat};
use crate::error::BinResult;

/// What the settings directory holds for one stored description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredAsset {
    /// File the description was read from.
    pub source: String,
    /// Asset id, when the description parses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    /// Connector selected by the base address scheme.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector: Option<String>,
    /// Number of declared properties.
    pub properties: usize,
    /// Why the description would be skipped on restore.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoredAsset {
    /// Returns true if the description would be restored.
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// Parses every description stored in `dir` without starting any connector.
///
/// A missing directory holds no descriptions.
pub fn inspect_descriptions(dir: &Path) -> anyhow::Result<Vec<StoredAsset>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let store = FileDescriptionStore::open(dir)
        .with_context(|| format!("opening settings directory {}", dir.display()))?;
    let stored = store
        .load_all()
        .with_context(|| format!("reading settings directory {}", dir.display()))?;

    Ok(stored
        .into_iter()
        .map(|description| {
            let mut asset = StoredAsset {
                source: description.source,
                asset_id: None,
                connector: None,
                properties: 0,
                error: None,
            };
            match ThingDescription::parse(&description.text) {
                Ok(td) => {
                    asset.asset_id = Some(td.asset_id().to_string());
                    asset.properties = td.properties.len();
                    match BaseAddress::parse(&td.base) {
                        Ok(base) => asset.connector = Some(base.kind.as_str().to_string()),
                        Err(e) => asset.error = Some(e.to_string()),
                    }
                }
                Err(e) => asset.error = Some(e.to_string()),
            }
            asset
        })
        .collect())
}

/// Executes the `assets` command.
pub fn assets(cli: &Cli, args: AssetsArgs) -> BinResult<()> {
    let config = uagate_config::load_config(&cli.config)?;
    let dir = &config.gateway.settings_dir;
    let assets = inspect_descriptions(dir)?;

    match args.format {
        OutputFormat::Text => {
            if assets.is_empty() {
                println!("No stored descriptions in {}", dir.display());
                return Ok(());
            }
            println!("Stored descriptions in {}:", dir.display());
            for asset in &assets {
                match (&asset.asset_id, &asset.error) {
                    (Some(id), None) => println!(
                        "  {} ({}, {} properties)",
                        id,
                        asset.connector.as_deref().unwrap_or("?"),
                        asset.properties
                    ),
                    (_, Some(error)) => println!("  ✗ {}: {}", asset.source, error),
                    (None, None) => println!("  ? {}", asset.source),
                }
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "settings_dir": dir.display().to_string(),
                "assets": assets,
            });
            let text = serde_json::to_string_pretty(&output)?;
            println!("{}", text);
        }
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PUMP: &str = r#"{
        "@context": ["https://www.w3.org/2022/wot/td/v1.1"],
        "name": "pump-1",
        "title": "Pump",
        "base": "modbus+tcp://10.0.0.5:502/1",
        "properties": {
            "pressure": {
                "forms": [{ "href": "40001?quantity=2", "modv:type": "xsd:float" }]
            }
        }
    }"#;

    #[test]
    fn test_missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let assets = inspect_descriptions(&temp.path().join("settings")).unwrap();
        assert!(assets.is_empty());
        assert!(!temp.path().join("settings").exists());
    }

    #[test]
    fn test_inspect_reports_valid_and_broken() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.jsonld"), PUMP).unwrap();
        std::fs::write(temp.path().join("b.jsonld"), "{ not json").unwrap();

        let mut assets = inspect_descriptions(temp.path()).unwrap();
        assets.sort_by(|a, b| a.source.cmp(&b.source));
        assert_eq!(assets.len(), 2);

        assert!(assets[0].is_valid());
        assert_eq!(assets[0].asset_id.as_deref(), Some("pump-1"));
        assert_eq!(assets[0].connector.as_deref(), Some("modbus"));
        assert_eq!(assets[0].properties, 1);

        assert!(!assets[1].is_valid());
        assert!(assets[1].asset_id.is_none());
    }

    #[test]
    fn test_inspect_flags_unknown_scheme() {
        let temp = TempDir::new().unwrap();
        let text = PUMP.replace("modbus+tcp://", "foo://");
        std::fs::write(temp.path().join("a.jsonld"), text).unwrap();

        let assets = inspect_descriptions(temp.path()).unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].asset_id.as_deref(), Some("pump-1"));
        assert!(assets[0].connector.is_none());
        assert!(!assets[0].is_valid());
    }
}
