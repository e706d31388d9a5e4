use eyre::Result;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

/// Logging level
#[derive(Debug, Clone, Copy, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Level {
    /// Off
    Off,
    /// Error
    Error,
    /// Warn
    Warn,
    /// Debug
    Debug,
    /// Trace
    Trace,
    /// Info
    #[serde(other)]
    Info,
}

impl Default for Level {
    fn default() -> Self {
        Level::Info
    }
}

impl From<Level> for LevelFilter {
    fn from(level: Level) -> LevelFilter {
        match level {
            Level::Off => LevelFilter::OFF,
            Level::Error => LevelFilter::ERROR,
            Level::Warn => LevelFilter::WARN,
            Level::Debug => LevelFilter::DEBUG,
            Level::Trace => LevelFilter::TRACE,
            Level::Info => LevelFilter::INFO,
        }
    }
}

/// Stdout formatting of the fmt layer.
#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Style {
    /// Multi-line human-readable output.
    #[default]
    Pretty,
    /// Single-line human-readable output.
    Compact,
    /// Newline-delimited JSON, for log shippers.
    Json,
}

/// Configuration for the tracing subscriber used by the observer.
#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
pub struct TracingConfig {
    #[serde(default)]
    fmt: Style,
    #[serde(default)]
    level: Level,
}

impl TracingConfig {
    /// Attempt to instantiate and register a tracing subscriber setup from
    /// settings. Errors if a global subscriber is already installed.
    pub fn start_tracing(&self) -> Result<()> {
        let registry =
            tracing_subscriber::registry().with(LevelFilter::from(self.level));
        match self.fmt {
            Style::Pretty => registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()?,
            Style::Compact => registry
                .with(tracing_subscriber::fmt::layer().compact())
                .try_init()?,
            Style::Json => registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?,
        }
        Ok(())
    }
}
