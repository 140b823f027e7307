//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};

use clap::Parser;

/// CLI argument parsing structure
#[derive(Parser)]
#[command(name = "countdown-sync")]
#[command(about = "Countdown timers kept in sync across sessions")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20553")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Countdown tick interval in milliseconds
    #[arg(long, default_value = "1000")]
    pub tick_ms: u64,

    /// Write remaining time to the backend every N ticks
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
    pub persist_every: u64,

    /// Remote updates within this many seconds of a running local timer are treated as echoes
    #[arg(long, default_value = "2")]
    pub tolerance: u32,

    /// Local snapshot used when the backend is unreachable
    #[arg(long, default_value = "timers.snapshot.json")]
    pub snapshot: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            tick_interval: Duration::from_millis(self.tick_ms.max(1)),
            persist_every: self.persist_every.max(1),
            tolerance: self.tolerance,
        }
    }
}

/// Tuning knobs for the tick cadence and the reconciliation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Time between two decrements of a running timer.
    pub tick_interval: Duration,
    /// Periodic writes happen on every `persist_every`-th tick.
    pub persist_every: u64,
    /// Largest remaining-seconds gap still treated as an echo.
    pub tolerance: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            persist_every: 5,
            tolerance: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_sync_settings_default() {
        let config = Config::try_parse_from(["countdown-sync"]).unwrap();
        assert_eq!(config.sync_settings(), SyncSettings::default());
        assert_eq!(config.address(), "0.0.0.0:20553");
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn flags_override_settings() {
        let config = Config::try_parse_from([
            "countdown-sync",
            "--tick-ms",
            "250",
            "--persist-every",
            "3",
            "--tolerance",
            "4",
            "-v",
        ])
        .unwrap();
        let settings = config.sync_settings();
        assert_eq!(settings.tick_interval, Duration::from_millis(250));
        assert_eq!(settings.persist_every, 3);
        assert_eq!(settings.tolerance, 4);
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn zero_persist_cadence_is_rejected() {
        assert!(Config::try_parse_from(["countdown-sync", "--persist-every", "0"]).is_err());
    }
}
