//! # Lanwatch Telemetry
//!
//! Subscriber setup, structured security-event logging and the Prometheus
//! registry shared by the capture and processing stages.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
