// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Tracing subscriber setup for the `uagate` process.
//!
//! `RUST_LOG`, when set, replaces the level chosen on the command line or in
//! the configuration file.

use std::io::IsTerminal;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogFormat;

/// Protocol stacks that log every frame at debug level.
const QUIET_STACKS: [(&str, Level); 2] = [("opcua", Level::WARN), ("tokio_modbus", Level::INFO)];

/// Installs the global subscriber. Later calls keep the first subscriber.
pub fn init_logging(level: &str, format: LogFormat) {
    let filter = level_filter(level);
    let ansi = std::io::stdout().is_terminal();
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_ansi(ansi))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(false).with_ansi(ansi))
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(true)
                    .with_line_number(true)
                    .with_span_list(false),
            )
            .try_init(),
    };

    if installed.is_err() {
        tracing::debug!("Subscriber already installed, keeping it");
    }
}

fn level_filter(level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let mut directives = parse_level(level).to_string().to_lowercase();
    for (target, cap) in QUIET_STACKS {
        directives.push_str(&format!(",{}={}", target, cap.to_string().to_lowercase()));
    }
    EnvFilter::new(directives)
}

/// Maps a level name to a [`Level`]. Unknown names fall back to `INFO`.
pub fn parse_level(level: &str) -> Level {
    level
        .trim()
        .to_ascii_lowercase()
        .replace("warning", "warn")
        .parse()
        .unwrap_or(Level::INFO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level(" warning "), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("chatty"), Level::INFO);
    }

    #[test]
    fn test_filter_quiets_protocol_stacks() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let filter = level_filter("debug").to_string();
        assert!(filter.contains("opcua=warn"), "{}", filter);
        assert!(filter.contains("tokio_modbus=info"), "{}", filter);
    }

    #[test]
    fn test_second_init_is_ignored() {
        init_logging("info", LogFormat::Compact);
        init_logging("debug", LogFormat::Json);
    }
}
