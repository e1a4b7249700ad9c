//! ## lanwatch-telemetry::metrics
//! **Prometheus counters and the per-frame latency histogram**

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub frames: IntCounter,
    pub frames_undecodable: IntCounter,
    pub frames_dropped: IntCounter,
    pub anomalies: IntCounterVec,
    pub devices_upserted: IntCounter,
    pub persistence_errors: IntCounter,
    pub capture_errors: IntCounter,
    pub frame_processing: Histogram,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("valid counter definition");
    registry
        .register(Box::new(counter.clone()))
        .expect("counter registered once");
    counter
}

impl MetricsRecorder {
    pub fn new() -> Self {
        let registry = Registry::new();

        let anomalies = IntCounterVec::new(
            Opts::new("lanwatch_anomalies_total", "Anomalies emitted, by kind"),
            &["kind"],
        )
        .expect("valid counter vec definition");
        registry
            .register(Box::new(anomalies.clone()))
            .expect("counter vec registered once");

        let frame_processing = Histogram::with_opts(
            HistogramOpts::new(
                "lanwatch_frame_processing_seconds",
                "Registry and detector time per frame",
            )
            .buckets(vec![0.000_01, 0.000_1, 0.001, 0.01, 0.1, 1.0, 5.0]),
        )
        .expect("valid histogram definition");
        registry
            .register(Box::new(frame_processing.clone()))
            .expect("histogram registered once");

        Self {
            frames: counter(&registry, "lanwatch_frames_total", "Frames captured"),
            frames_undecodable: counter(
                &registry,
                "lanwatch_frames_undecodable_total",
                "Frames skipped because they could not be decoded",
            ),
            frames_dropped: counter(
                &registry,
                "lanwatch_frames_dropped_total",
                "Frames discarded by event bus backpressure",
            ),
            devices_upserted: counter(
                &registry,
                "lanwatch_devices_upserted_total",
                "Device profiles written to storage",
            ),
            persistence_errors: counter(
                &registry,
                "lanwatch_persistence_errors_total",
                "Failed storage operations",
            ),
            capture_errors: counter(
                &registry,
                "lanwatch_capture_errors_total",
                "Capture slices that ended in an error",
            ),
            anomalies,
            frame_processing,
            registry,
        }
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn inc_anomaly(&self, kind: &str) {
        self.anomalies.with_label_values(&[kind]).inc();
    }
}
