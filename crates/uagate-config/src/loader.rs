// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing for uagate.
//!
//! # Loading Pipeline
//!
//! 1. Resolve `${VAR}` / `${VAR:default}` placeholders in the raw text
//! 2. Parse YAML, TOML or JSON (by file extension)
//! 3. Apply `UAGATE_*` environment overrides
//! 4. Resolve relative directories against the config file's directory
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! UAGATE_GATEWAY_NAME=edge-01
//! UAGATE_SETTINGS_DIR=/var/lib/uagate/settings
//! UAGATE_TRUST_DIR=/etc/uagate/pki/trusted
//! UAGATE_LOG_LEVEL=debug
//! UAGATE_LOG_FORMAT=json
//! UAGATE_CONNECT_TIMEOUT_MS=2000
//! UAGATE_OPERATION_TIMEOUT_MS=1000
//! UAGATE_BACNET_LOCAL_PORT=47808
//! UAGATE_ADS_SOURCE_PORT=32905
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{LogFormat, LogLevel, UagateConfig};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader for uagate.
///
/// # Examples
///
/// ```no_run
/// use uagate_config::loader::ConfigLoader;
///
/// let loader = ConfigLoader::new();
/// let config = loader.load("uagate.yaml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Base directory for resolving relative paths.
    base_path: Option<PathBuf>,

    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to resolve environment variables in values.
    resolve_env_vars: bool,

    /// Whether to resolve relative paths.
    resolve_paths: bool,
}

impl ConfigLoader {
    /// Creates a new configuration loader with default settings.
    pub fn new() -> Self {
        Self {
            base_path: None,
            env_prefix: "UAGATE".to_string(),
            resolve_env_vars: true,
            resolve_paths: true,
        }
    }

    /// Creates a builder for configuring the loader.
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder::new()
    }

    /// Sets the base path for resolving relative paths.
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Enables or disables relative path resolution.
    pub fn with_path_resolution(mut self, enabled: bool) -> Self {
        self.resolve_paths = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The file format is determined by the file extension:
    /// - `.yaml` or `.yml` - YAML format
    /// - `.toml` - TOML format
    /// - `.json` - JSON format
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<UagateConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let base_path = self.base_path.clone().unwrap_or_else(|| {
            path.parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        });

        let content = self.read_file(path)?;
        let format = ConfigFormat::from_path(path)?;
        let mut config = self.parse_content(&content, format, path)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        if self.resolve_paths {
            resolve_relative_paths(&mut config, &base_path);
        }

        config.validate()?;

        debug!(
            settings_dir = %config.gateway.settings_dir.display(),
            trust_dir = %config.gateway.trust_dir.display(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<UagateConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };
        let mut config = parse_str(&content, format)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
    }

    fn parse_content(&self, content: &str, format: ConfigFormat, path: &Path) -> ConfigResult<UagateConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        parse_str(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            ConfigError::Parse { message, line, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
                line,
            },
            other => other,
        })
    }

    /// Expands `${NAME}` and `${NAME:default}`. Unset names without a
    /// default stay verbatim, as does an unclosed `${`.
    fn resolve_env_placeholders(&self, content: &str) -> String {
        let mut out = String::with_capacity(content.len());
        let mut rest = content;

        while let Some(open) = rest.find("${") {
            out.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };

            let inner = &after[..close];
            let (name, default) = match inner.split_once(':') {
                Some((name, default)) => (name, Some(default)),
                None => (inner, None),
            };
            match (env::var(name), default) {
                (Ok(value), _) => out.push_str(&value),
                (Err(_), Some(default)) => out.push_str(default),
                (Err(_), None) => {
                    warn!(variable = name, "Placeholder left unresolved");
                    out.push_str(&rest[open..open + close + 3]);
                }
            }
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        out
    }

    /// Applies `{prefix}_*` overrides on top of the file values.
    fn apply_env_overrides(&self, config: &mut UagateConfig) -> ConfigResult<()> {
        for (suffix, apply) in OVERRIDES {
            let name = format!("{}_{}", self.env_prefix, suffix);
            if let Ok(value) = env::var(&name) {
                apply(config, value.trim()).map_err(|expected| ConfigError::invalid_env_var(&name, expected))?;
                debug!(variable = %name, "Environment override applied");
            }
        }
        Ok(())
    }
}

type Override = fn(&mut UagateConfig, &str) -> Result<(), &'static str>;

const MILLIS: &str = "expected a number of milliseconds";
const PORT: &str = "expected a valid port number";

/// Override suffixes and how each one lands in the configuration.
const OVERRIDES: [(&str, Override); 9] = [
    ("GATEWAY_NAME", |c, v| {
        c.gateway.name = v.to_string();
        Ok(())
    }),
    ("SETTINGS_DIR", |c, v| {
        c.gateway.settings_dir = PathBuf::from(v);
        Ok(())
    }),
    ("TRUST_DIR", |c, v| {
        c.gateway.trust_dir = PathBuf::from(v);
        Ok(())
    }),
    ("LOG_LEVEL", |c, v| {
        c.logging.level = LogLevel::parse(v).ok_or("expected trace, debug, info, warn or error")?;
        Ok(())
    }),
    ("LOG_FORMAT", |c, v| {
        c.logging.format = LogFormat::parse(v).ok_or("expected text, json or compact")?;
        Ok(())
    }),
    ("CONNECT_TIMEOUT_MS", |c, v| {
        c.connectors.connect_timeout_ms = v.parse().map_err(|_| MILLIS)?;
        Ok(())
    }),
    ("OPERATION_TIMEOUT_MS", |c, v| {
        c.connectors.operation_timeout_ms = v.parse().map_err(|_| MILLIS)?;
        Ok(())
    }),
    ("BACNET_LOCAL_PORT", |c, v| {
        c.connectors.bacnet_local_port = v.parse().map_err(|_| PORT)?;
        Ok(())
    }),
    ("ADS_SOURCE_PORT", |c, v| {
        c.connectors.ads_source_port = v.parse().map_err(|_| PORT)?;
        Ok(())
    }),
];

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigLoaderBuilder
// =============================================================================

/// Builder for [`ConfigLoader`], starting from [`ConfigLoader::new`].
#[derive(Debug, Default)]
pub struct ConfigLoaderBuilder {
    loader: ConfigLoader,
}

impl ConfigLoaderBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory relative paths resolve against instead of the file's own.
    pub fn base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.loader = self.loader.with_base_path(path);
        self
    }

    /// Prefix of the override variables, `UAGATE` by default.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.loader = self.loader.with_env_prefix(prefix);
        self
    }

    /// Toggles placeholders and overrides together.
    pub fn resolve_env_vars(mut self, enabled: bool) -> Self {
        self.loader = self.loader.with_env_vars(enabled);
        self
    }

    /// Toggles resolving relative directories.
    pub fn resolve_paths(mut self, enabled: bool) -> Self {
        self.loader = self.loader.with_path_resolution(enabled);
        self
    }

    /// Returns the configured loader.
    pub fn build(self) -> ConfigLoader {
        self.loader
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_str(content: &str, format: ConfigFormat) -> ConfigResult<UagateConfig> {
    match format {
        ConfigFormat::Yaml => {
            // An empty document means "all defaults".
            if content.trim().is_empty() {
                return Ok(UagateConfig::default());
            }
            serde_yaml::from_str(content).map_err(|e| match e.location() {
                Some(location) => ConfigError::parse_at_line("", e.to_string(), location.line()),
                None => ConfigError::serialization(e.to_string()),
            })
        }
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string())),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string())),
    }
}

/// Resolves relative directories against `base_path`.
fn resolve_relative_paths(config: &mut UagateConfig, base_path: &Path) {
    for dir in [&mut config.gateway.settings_dir, &mut config.gateway.trust_dir] {
        if dir.is_relative() {
            *dir = base_path.join(&*dir);
        }
    }
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
///
/// # Examples
///
/// ```no_run
/// use uagate_config::loader::load_config;
///
/// let config = load_config("uagate.yaml").unwrap();
/// ```
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<UagateConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<UagateConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_yaml() -> String {
        r#"
gateway:
  name: test-gateway
  settings_dir: settings
  trust_dir: /etc/uagate/trusted

logging:
  level: debug
  format: json

connectors:
  connect_timeout_ms: 2000
  operation_timeout_ms: 500
"#
        .to_string()
    }

    /// A loader whose overrides cannot be affected by the host environment.
    fn isolated_loader(prefix: &str) -> ConfigLoader {
        ConfigLoader::new().with_env_prefix(prefix)
    }

    #[test]
    fn test_load_yaml() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(create_test_yaml().as_bytes()).unwrap();

        let config = isolated_loader("UAGATE_TEST_LOAD_YAML").load(file.path()).unwrap();

        assert_eq!(config.gateway.name, "test-gateway");
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.connectors.connect_timeout_ms, 2000);
        assert_eq!(config.connectors.operation_timeout_ms, 500);
        assert_eq!(config.connectors.ads_source_port, 32905);

        // Relative directories resolve against the config file's directory.
        let dir = file.path().parent().unwrap();
        assert_eq!(config.gateway.settings_dir, dir.join("settings"));
        assert_eq!(config.gateway.trust_dir, PathBuf::from("/etc/uagate/trusted"));
    }

    #[test]
    fn test_load_toml_and_json() {
        let mut toml_file = NamedTempFile::with_suffix(".toml").unwrap();
        toml_file
            .write_all(b"[gateway]\nname = \"toml-gateway\"\n\n[connectors]\nbacnet_local_port = 47808\n")
            .unwrap();
        let config = isolated_loader("UAGATE_TEST_LOAD_TOML").load(toml_file.path()).unwrap();
        assert_eq!(config.gateway.name, "toml-gateway");
        assert_eq!(config.connectors.bacnet_local_port, 47808);

        let mut json_file = NamedTempFile::with_suffix(".json").unwrap();
        json_file
            .write_all(br#"{"gateway": {"name": "json-gateway"}, "logging": {"format": "compact"}}"#)
            .unwrap();
        let config = isolated_loader("UAGATE_TEST_LOAD_JSON").load(json_file.path()).unwrap();
        assert_eq!(config.gateway.name, "json-gateway");
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("uagate.yaml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("uagate.yml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("uagate.toml")).unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("uagate.JSON")).unwrap(), ConfigFormat::Json);
        assert!(ConfigFormat::from_path(Path::new("uagate.ini")).is_err());
        assert!(ConfigFormat::from_path(Path::new("uagate")).is_err());
    }

    #[test]
    fn test_env_placeholder_with_default() {
        let loader = ConfigLoader::new();
        let result = loader.resolve_env_placeholders("name: ${UAGATE_TEST_SURELY_UNSET:edge}");
        assert_eq!(result, "name: edge");
    }

    #[test]
    fn test_env_placeholder_unset_and_unclosed() {
        let loader = ConfigLoader::new();
        assert_eq!(
            loader.resolve_env_placeholders("name: ${UAGATE_TEST_SURELY_UNSET}"),
            "name: ${UAGATE_TEST_SURELY_UNSET}"
        );
        assert_eq!(loader.resolve_env_placeholders("name: ${open"), "name: ${open");
        assert_eq!(loader.resolve_env_placeholders("cost: $5"), "cost: $5");
    }

    #[test]
    fn test_env_placeholder_set() {
        env::set_var("UAGATE_TEST_PLACEHOLDER_NAME", "from-env");
        let loader = ConfigLoader::new();
        assert_eq!(
            loader.resolve_env_placeholders("name: ${UAGATE_TEST_PLACEHOLDER_NAME:fallback}"),
            "name: from-env"
        );
        env::remove_var("UAGATE_TEST_PLACEHOLDER_NAME");
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("UAGATE_TEST_OVR_GATEWAY_NAME", "overridden");
        env::set_var("UAGATE_TEST_OVR_LOG_LEVEL", "warning");
        env::set_var("UAGATE_TEST_OVR_OPERATION_TIMEOUT_MS", "750");

        let config = isolated_loader("UAGATE_TEST_OVR")
            .load_from_str(&create_test_yaml(), ConfigFormat::Yaml)
            .unwrap();
        assert_eq!(config.gateway.name, "overridden");
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(config.connectors.operation_timeout_ms, 750);

        env::remove_var("UAGATE_TEST_OVR_GATEWAY_NAME");
        env::remove_var("UAGATE_TEST_OVR_LOG_LEVEL");
        env::remove_var("UAGATE_TEST_OVR_OPERATION_TIMEOUT_MS");
    }

    #[test]
    fn test_invalid_env_override() {
        env::set_var("UAGATE_TEST_BAD_ADS_SOURCE_PORT", "not-a-port");
        let result = isolated_loader("UAGATE_TEST_BAD").load_from_str(&create_test_yaml(), ConfigFormat::Yaml);
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar { .. })));
        env::remove_var("UAGATE_TEST_BAD_ADS_SOURCE_PORT");
    }

    #[test]
    fn test_loader_builder() {
        let loader = ConfigLoader::builder()
            .env_prefix("MYAPP")
            .resolve_env_vars(false)
            .resolve_paths(true)
            .build();

        assert_eq!(loader.env_prefix, "MYAPP");
        assert!(!loader.resolve_env_vars);
        assert!(loader.resolve_paths);
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = ConfigLoader::new()
            .with_env_vars(false)
            .load_from_str("", ConfigFormat::Yaml)
            .unwrap();
        assert_eq!(config, UagateConfig::default());
    }

    #[test]
    fn test_validation_runs_on_load() {
        let yaml = "connectors:\n  connect_timeout_ms: 0\n";
        let result = ConfigLoader::new().with_env_vars(false).load_from_str(yaml, ConfigFormat::Yaml);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_parse_error_reports_path() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(b"gateway:\n  name: [unclosed\n").unwrap();
        let result = isolated_loader("UAGATE_TEST_PARSE_ERR").load(file.path());
        match result {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_file_not_found() {
        let result = ConfigLoader::new().load("/nonexistent/path/uagate.yaml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }
}
