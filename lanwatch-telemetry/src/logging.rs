//! ## lanwatch-telemetry::logging
//! Structured logging with tracing and OpenTelemetry key/values.
//!
//! `RUST_LOG` wins over the configured level. Security events (anomalies,
//! newly discovered devices) go through [`EventLogger::log_event`] so they
//! all carry the same `security_event` span and can be filtered on it.

use opentelemetry::KeyValue;
use tracing::info_span;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. Fails if one is already installed.
    pub fn init(level: &str, json: bool) -> Result<(), TryInitError> {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        let registry = tracing_subscriber::registry().with(filter);
        if json {
            registry
                .with(fmt::layer().json().with_thread_names(true))
                .try_init()
        } else {
            registry
                .with(fmt::layer().with_thread_names(true))
                .try_init()
        }
    }

    #[inline]
    pub fn log_event(event_type: &str, metadata: Vec<KeyValue>) {
        let span = info_span!(
            "security_event",
            event_type = event_type,
            otel.kind = "INTERNAL"
        );
        let _entered = span.enter();

        let fields = metadata
            .iter()
            .map(|kv| format!("{}={}", kv.key, kv.value))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(event_type, %fields, "Security event occurred");
    }
}
