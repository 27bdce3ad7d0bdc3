//! # DVR Simulator Configuration
//!
//! Hierarchical configuration for a simulation run. Every timing constant of
//! the platform model lives here, so that two runs with equal configuration
//! and seed are identical.
//!
//! ## Features
//! - **Layered Sources**: defaults, YAML files and `DVRSIM_*` environment variables
//! - **Validation**: range checks per field plus cross-section consistency checks
//! - **Immutable Use**: the loaded record is shared read-only for a whole run

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod hardware;
mod run;
mod scheduler;
mod streams;
mod validation;

pub use error::ConfigError;
pub use hardware::{CacheConfig, CpuConfig, DiskConfig, MaintenanceConfig, RamBusConfig};
pub use run::{RunConfig, SchedulingPolicy};
pub use scheduler::SchedulerConfig;
pub use streams::StreamGroupConfig;

const BASE_FILE: &str = "config/dvrsim.yaml";
const ENV_PREFIX: &str = "DVRSIM_";

/// Top-level configuration of one simulation run.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
#[validate(schema(function = validation::validate_cache_fits_requests))]
pub struct SimulationConfig {
    #[serde(default)]
    #[validate(nested)]
    pub run: RunConfig,

    #[serde(default)]
    #[validate(nested)]
    pub disk: DiskConfig,

    #[serde(default)]
    #[validate(nested)]
    pub cache: CacheConfig,

    #[serde(default)]
    #[validate(nested)]
    pub cpu: CpuConfig,

    #[serde(default)]
    #[validate(nested)]
    pub ram_bus: RamBusConfig,

    #[serde(default)]
    #[validate(nested)]
    pub scheduler: SchedulerConfig,

    /// Recording streams.
    #[serde(default = "StreamGroupConfig::tuners")]
    #[validate(nested)]
    pub tuners: StreamGroupConfig,

    /// Playback streams.
    #[serde(default = "StreamGroupConfig::outputs")]
    #[validate(nested)]
    pub outputs: StreamGroupConfig,

    #[serde(default)]
    #[validate(nested)]
    pub maintenance: MaintenanceConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            disk: DiskConfig::default(),
            cache: CacheConfig::default(),
            cpu: CpuConfig::default(),
            ram_bus: RamBusConfig::default(),
            scheduler: SchedulerConfig::default(),
            tuners: StreamGroupConfig::tuners(),
            outputs: StreamGroupConfig::outputs(),
            maintenance: MaintenanceConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/dvrsim.yaml`, if present
    /// 3. `config/<DVRSIM_ENV>.yaml`, if present
    /// 4. `DVRSIM_*` environment variables (`__` separates nested keys)
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(SimulationConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        }

        if let Ok(env) = std::env::var("DVRSIM_ENV") {
            let env_file = format!("config/{}.yaml", env);
            if Path::new(&env_file).exists() {
                figment = figment.merge(Yaml::file(env_file));
            }
        }

        Self::finish(figment)
    }

    /// Load configuration from a specific file, layered over the defaults
    /// and under environment overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let figment = Figment::from(Serialized::defaults(SimulationConfig::default()))
            .merge(Yaml::file(path));
        Self::finish(figment)
    }

    /// Load from `path` when given, otherwise through [`SimulationConfig::load`].
    pub fn load_optional<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    fn finish(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }

    /// Re-checks a record after programmatic overrides (e.g. CLI flags).
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }

    /// Minimum intake size that triggers a sort for the configured policy.
    pub fn min_batch(&self) -> usize {
        self.scheduler.min_batch(self.run.policy)
    }
}
