//! Settings and configuration for the observer.
//!
//! Settings are read from `./config/$RUN_ENV/observer.json` (or any other
//! format the `config` crate understands) and then overridden by
//! environment variables prefixed with `ANC_OBSERVER`, whose names
//! correspond 1:1 with the config file's object hierarchy. Presets bundle
//! the numeric knobs for common deployments; an explicit file or env value
//! always wins over the preset.

use std::env;
use std::time::Duration;

use config::{Config, Environment, File};
use eyre::{ensure, Result};
use serde::Deserialize;

use crate::{ChainReaderConfig, HistoricalSyncConfig, ObserverConfig, PaginationConfig};

pub use trace::*;

mod trace;

/// Env var selecting the config directory under `./config/`.
const RUN_ENV_VAR: &str = "RUN_ENV";

/// Env override prefix.
const ENV_PREFIX: &str = "ANC_OBSERVER";

/// Pagination bounds for explicit-range reads.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaginationSettings {
    /// Blocks per sub-range request.
    pub default_batch_size: u64,
    /// Widest range a single reader call should see.
    pub max_batch_size: u64,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            default_batch_size: 1_000,
            max_batch_size: 10_000,
        }
    }
}

/// Observer settings. Field defaults are the `Balanced` preset.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObserverSettings {
    /// Blocks per historical batch.
    pub batch_size: u64,
    /// Sleep between historical batches, in milliseconds.
    pub rate_limit_delay_ms: u64,
    /// Attempts per paginated sub-range.
    pub max_retries: u32,
    /// Linear backoff base between attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Pagination bounds.
    pub pagination: PaginationSettings,
    /// Bound on concurrently processing anchor records.
    pub max_concurrent_downloads: usize,
    /// Delay between live passes, in seconds.
    pub observing_interval_in_seconds: u64,
    /// Block the anchor contract was deployed at. When omitted, the chain
    /// reader derives it by binary search over `getCode`.
    pub contract_deployment_block: Option<u64>,
    /// Tracing subscriber configuration.
    pub tracing: TracingConfig,
}

impl Default for ObserverSettings {
    fn default() -> Self {
        Self {
            batch_size: 500,
            rate_limit_delay_ms: 100,
            max_retries: 3,
            retry_delay_ms: 1_000,
            pagination: PaginationSettings::default(),
            max_concurrent_downloads: 20,
            observing_interval_in_seconds: 60,
            contract_deployment_block: None,
            tracing: TracingConfig::default(),
        }
    }
}

impl ObserverSettings {
    /// Reject combinations the machinery cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "batchSize must be positive");
        ensure!(
            self.pagination.default_batch_size > 0
                && self.pagination.default_batch_size <= self.pagination.max_batch_size,
            "pagination requires 0 < defaultBatchSize <= maxBatchSize"
        );
        ensure!(self.max_retries > 0, "maxRetries must be positive");
        ensure!(
            self.max_concurrent_downloads >= 1,
            "maxConcurrentDownloads must be at least 1"
        );
        ensure!(
            self.observing_interval_in_seconds > 0,
            "observingIntervalInSeconds must be positive"
        );
        Ok(())
    }

    /// Bounds handed to the chain reader.
    pub fn chain_reader_config(&self) -> ChainReaderConfig {
        ChainReaderConfig {
            default_batch_size: self.pagination.default_batch_size,
            max_batch_size: self.pagination.max_batch_size,
            contract_deployment_block: self.contract_deployment_block,
        }
    }

    /// Bounds and retry policy handed to the paginator.
    pub fn pagination_config(&self) -> PaginationConfig {
        PaginationConfig {
            default_batch_size: self.pagination.default_batch_size,
            max_batch_size: self.pagination.max_batch_size,
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    /// Knobs handed to the historical walk.
    pub fn historical_config(&self) -> HistoricalSyncConfig {
        HistoricalSyncConfig {
            batch_size: self.batch_size,
            rate_limit_delay: Duration::from_millis(self.rate_limit_delay_ms),
        }
    }

    /// The full observer configuration, once the deployment block is known
    /// (configured, or resolved by the chain reader).
    pub fn observer_config(&self, contract_deployment_block: u64) -> ObserverConfig {
        ObserverConfig {
            contract_deployment_block,
            historical: self.historical_config(),
            pagination: self.pagination_config(),
            max_concurrent_downloads: self.max_concurrent_downloads,
            observing_interval: Duration::from_secs(self.observing_interval_in_seconds),
        }
    }
}

/// Bundled settings profiles.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SettingsPreset {
    /// Gentle on rate-limited RPC endpoints; slow catch-up.
    Conservative,
    /// The defaults.
    Balanced,
    /// For dedicated nodes that tolerate bursts.
    Aggressive,
}

impl SettingsPreset {
    /// The settings this preset bundles.
    pub fn settings(self) -> ObserverSettings {
        let balanced = ObserverSettings::default();
        match self {
            Self::Conservative => ObserverSettings {
                batch_size: 100,
                rate_limit_delay_ms: 500,
                max_retries: 5,
                retry_delay_ms: 2_000,
                pagination: PaginationSettings {
                    default_batch_size: 500,
                    max_batch_size: 5_000,
                },
                max_concurrent_downloads: 5,
                observing_interval_in_seconds: 120,
                ..balanced
            },
            Self::Balanced => balanced,
            Self::Aggressive => ObserverSettings {
                batch_size: 2_000,
                rate_limit_delay_ms: 10,
                retry_delay_ms: 500,
                pagination: PaginationSettings {
                    default_batch_size: 2_000,
                    max_batch_size: 10_000,
                },
                max_concurrent_downloads: 50,
                observing_interval_in_seconds: 30,
                ..balanced
            },
        }
    }
}

/// Load settings from the config locations.
///
/// Read settings from the config file and/or env. The config will be
/// located at `./config/default/observer` unless `RUN_ENV` points at
/// another directory. Env vars prefixed `ANC_OBSERVER` override file
/// values field by field.
pub fn load_settings() -> Result<ObserverSettings> {
    let env_dir = env::var(RUN_ENV_VAR).unwrap_or_else(|_| "default".into());

    let config = Config::builder()
        .add_source(File::with_name(&format!("./config/{env_dir}/observer")).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("_"))
        .build()?;

    let settings: ObserverSettings = config.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}
