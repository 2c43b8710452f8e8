// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Errors raised while loading the gateway configuration.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure to produce a usable [`UagateConfig`](crate::UagateConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but its content is not a valid configuration.
    #[error("{}", parse_message(path, message, *line))]
    Parse {
        /// Configuration file, empty when parsing a string.
        path: PathBuf,
        /// Parser message.
        message: String,
        /// 1-based line, when the parser reports one.
        line: Option<usize>,
    },

    /// A value is out of range.
    #[error("Invalid value for '{field}': {message}")]
    Validation {
        /// Dotted key, e.g. `connectors.connect_timeout_ms`.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The file could not be read.
    #[error("Cannot read '{path}': {source}")]
    Io {
        /// Configuration file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A `UAGATE_*` override holds an unusable value.
    #[error("Environment override {name}: {message}")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// What is wrong with it.
        message: String,
    },

    /// The configuration file does not exist.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Configuration file.
        path: PathBuf,
    },

    /// The file extension is not yaml, yml, toml or json.
    #[error("Unsupported configuration format: {format}")]
    UnsupportedFormat {
        /// Offending extension.
        format: String,
    },

    /// The content could not be deserialized and no file is involved.
    #[error("Invalid configuration: {message}")]
    Serialization {
        /// Parser message.
        message: String,
    },
}

fn parse_message(path: &Path, message: &str, line: Option<usize>) -> String {
    match (path.as_os_str().is_empty(), line) {
        (true, Some(line)) => format!("Invalid configuration at line {}: {}", line, message),
        (true, None) => format!("Invalid configuration: {}", message),
        (false, Some(line)) => format!("Invalid configuration in '{}' line {}: {}", path.display(), line, message),
        (false, None) => format!("Invalid configuration in '{}': {}", path.display(), message),
    }
}

impl ConfigError {
    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            line: None,
        }
    }

    /// Creates a parse error at `line`.
    pub fn parse_at_line(path: impl Into<PathBuf>, message: impl Into<String>, line: usize) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            line: Some(line),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a read error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an environment override error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a missing file error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Creates a deserialization error without a file.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns the configuration file involved, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Parse { path, .. } if !path.as_os_str().is_empty() => Some(path),
            ConfigError::Io { path, .. } | ConfigError::FileNotFound { path } => Some(path),
            _ => None,
        }
    }
}

/// Result alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_variants() {
        let error = ConfigError::parse_at_line("uagate.yaml", "unknown field `x`", 3);
        assert_eq!(
            error.to_string(),
            "Invalid configuration in 'uagate.yaml' line 3: unknown field `x`"
        );

        let error = ConfigError::parse_at_line("", "bad indent", 7);
        assert_eq!(error.to_string(), "Invalid configuration at line 7: bad indent");
        assert!(error.path().is_none());
    }

    #[test]
    fn test_path_of_file_errors() {
        let error = ConfigError::io(
            "uagate.yaml",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(error.path(), Some(Path::new("uagate.yaml")));
        assert_eq!(
            ConfigError::file_not_found("/etc/uagate.toml").path(),
            Some(Path::new("/etc/uagate.toml"))
        );
        assert!(ConfigError::validation("gateway.name", "cannot be empty").path().is_none());
    }

    #[test]
    fn test_validation_names_the_key() {
        let error = ConfigError::validation("connectors.connect_timeout_ms", "must be greater than 0");
        assert!(error.to_string().contains("connectors.connect_timeout_ms"));
    }
}
