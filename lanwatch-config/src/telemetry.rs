//! Logging configuration.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Default filter level; `RUST_LOG` takes precedence.
    #[validate(custom(function = validation::validate_log_level))]
    pub log_level: String,

    /// Emit JSON lines instead of the human-readable format.
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            json_logs: false,
        }
    }
}
