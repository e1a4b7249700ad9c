use thiserror::Error;

use lanwatch_capture::{CaptureError, StartupError};
use lanwatch_config::ConfigError;
use lanwatch_core::events::EventError;
use lanwatch_core::PersistenceError;
use lanwatch_detection::DetectionError;
use lanwatch_inventory::EnrichmentError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Capture startup failed: {0}")]
    Startup(#[from] StartupError),

    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Invalid detection settings: {0}")]
    Detection(#[from] DetectionError),

    #[error("Storage error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Enrichment setup failed: {0}")]
    Enrichment(#[from] EnrichmentError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventError),

    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
