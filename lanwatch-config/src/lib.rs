//! # Lanwatch Configuration System
//!
//! Hierarchical configuration for the monitor: capture options, rule
//! thresholds and cooldowns, enrichment, storage and logging.
//!
//! ## Features
//! - **Layered sources**: defaults, YAML files, `LANWATCH_*` environment
//! - **Validation**: every section is checked before anything starts

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod capture;
mod core;
mod detection;
mod enrichment;
mod error;
mod storage;
mod telemetry;
mod validation;

pub use capture::CaptureConfig;
pub use core::{CoreConfig, EventBusConfig};
pub use detection::DetectionConfig;
pub use enrichment::EnrichmentConfig;
pub use error::ConfigError;
pub use storage::StorageConfig;
pub use telemetry::TelemetryConfig;

pub const ENV_PREFIX: &str = "LANWATCH_";
pub const BASE_CONFIG_FILE: &str = "config/lanwatch.yaml";

/// Top‑level configuration container for all lanwatch components.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
#[serde(default)]
pub struct LanwatchConfig {
    #[validate(nested)]
    pub capture: CaptureConfig,

    /// Event bus sizing and backpressure.
    #[validate(nested)]
    pub core: CoreConfig,

    /// Anomaly rule thresholds and cooldowns.
    #[validate(nested)]
    pub detection: DetectionConfig,

    #[validate(nested)]
    pub enrichment: EnrichmentConfig,

    #[validate(nested)]
    pub storage: StorageConfig,

    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl LanwatchConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/lanwatch.yaml`, if present
    /// 3. `config/<LANWATCH_ENV>.yaml`, if present
    /// 4. `LANWATCH_*` environment variables, `__` separating nested keys
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(LanwatchConfig::default()));

        if Path::new(BASE_CONFIG_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_CONFIG_FILE));
        }

        if let Ok(env) = std::env::var("LANWATCH_ENV") {
            let env_file = format!("config/{}.yaml", env);
            if Path::new(&env_file).exists() {
                figment = figment.merge(Yaml::file(env_file));
            }
        }

        Self::finish(figment)
    }

    /// Load configuration from an explicit file, still layered over the
    /// defaults and under the environment.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let figment =
            Figment::from(Serialized::defaults(LanwatchConfig::default())).merge(Yaml::file(path));
        Self::finish(figment)
    }

    /// Re-checks every constraint. Call after changing a loaded config,
    /// e.g. when applying command-line overrides.
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }

    fn finish(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract::<Self>()
            .map_err(ConfigError::from)
            .and_then(Self::validated)
    }
}
