//! ## lanwatch-engine::runtime
//! **Capture thread → event bus → processing thread**
//!
//! The capture thread decodes frames, counts them into the burst window and
//! enqueues them; the processing thread owns the [`Pipeline`] and drains the
//! bus. Counting happens before the bus so that frames dropped under
//! `DropOldest` still count toward a burst. Stopping is cooperative:
//! the source notices `terminate` between slices, the capture thread closes
//! the bus, and processing exits once the bus is drained.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info, info_span, trace, warn};

use lanwatch_capture::{CaptureEvent, CaptureStats, PacketSource};
use lanwatch_config::{EventBusConfig, LanwatchConfig};
use lanwatch_core::events::{EventBus, EventError};
use lanwatch_core::models::CapturedFrame;
use lanwatch_core::sink::{EventStore, Notifier};
use lanwatch_detection::{AnomalyDetector, BurstWindow};
use lanwatch_inventory::{DeviceRegistry, MacVendorsClient, ReverseDns};
use lanwatch_protocols::Frame;
use lanwatch_telemetry::MetricsRecorder;

use crate::error::EngineError;
use crate::pipeline::Pipeline;

/// Totals for one [`Engine::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub capture: CaptureStats,
    pub frames_processed: u64,
    pub frames_undecodable: u64,
    pub frames_dropped: u64,
    pub anomalies: u64,
    pub persistence_failures: u64,
    pub devices: usize,
}

pub struct Engine {
    pipeline: Pipeline,
    bus: EventBus<CapturedFrame>,
}

impl Engine {
    pub fn new(pipeline: Pipeline, bus: &EventBusConfig) -> Result<Self, EngineError> {
        Ok(Self {
            pipeline,
            bus: EventBus::with_capacity(bus.capacity, bus.backpressure)?,
        })
    }

    /// Builds the full pipeline from configuration. With `enrich` off (or
    /// disabled in the config) the registry makes no network lookups.
    pub fn from_config(
        config: &LanwatchConfig,
        store: Arc<dyn EventStore>,
        notifier: Arc<dyn Notifier>,
        metrics: MetricsRecorder,
        enrich: bool,
    ) -> Result<Self, EngineError> {
        let mut registry = if enrich && config.enrichment.enabled {
            let vendors = MacVendorsClient::new(
                config.enrichment.oui_lookup_url.clone(),
                config.enrichment.vendor_timeout(),
            )?;
            let hostnames = ReverseDns::new(config.enrichment.hostname_timeout());
            DeviceRegistry::new(store.clone(), Box::new(vendors), Box::new(hostnames))
        } else {
            DeviceRegistry::offline(store.clone())
        };
        let known = registry.hydrate()?;
        debug!(known, enrich, "Registry ready");

        let detector = AnomalyDetector::new(&config.detection)?;
        let pipeline = Pipeline::new(registry, detector, store, notifier, metrics);
        Self::new(pipeline, &config.core.event_bus)
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        self.pipeline.metrics()
    }

    /// Runs until the source is exhausted or `terminate` is set.
    pub fn run(
        mut self,
        source: &mut dyn PacketSource,
        terminate: &AtomicBool,
    ) -> Result<RunSummary, EngineError> {
        let name = source.describe();
        info!(source = %name, policy = ?self.bus.policy(), capacity = self.bus.capacity(), "Engine starting");

        let bus = &self.bus;
        let pipeline = &mut self.pipeline;
        let metrics = pipeline.metrics().clone();
        let mut window = pipeline.detector().burst_window();

        let (capture, tally) = thread::scope(|scope| -> Result<_, EngineError> {
            let processor = thread::Builder::new()
                .name("processing".into())
                .spawn_scoped(scope, move || {
                    let _span = info_span!("processing").entered();
                    let _stop = StopOnExit { bus, terminate };
                    drain(bus, pipeline)
                })?;

            let spawned = thread::Builder::new()
                .name("capture".into())
                .spawn_scoped(scope, move || {
                    let _span = info_span!("capture", source = %name).entered();
                    let result = capture_frames(source, terminate, bus, &metrics, &mut window);
                    bus.close();
                    result
                });
            let capturer = match spawned {
                Ok(handle) => handle,
                Err(e) => {
                    bus.close();
                    return Err(e.into());
                }
            };

            let capture = capturer
                .join()
                .map_err(|_| EngineError::ThreadPanicked("capture"))?;
            let tally = processor
                .join()
                .map_err(|_| EngineError::ThreadPanicked("processing"))?;
            Ok((capture?, tally))
        })?;

        let metrics = self.pipeline.metrics();
        let summary = RunSummary {
            capture,
            frames_processed: tally.frames,
            frames_undecodable: metrics.frames_undecodable.get(),
            frames_dropped: self.bus.dropped(),
            anomalies: tally.anomalies,
            persistence_failures: tally.persistence_failures,
            devices: self.pipeline.registry().len(),
        };
        info!(?summary, "Engine stopped");
        Ok(summary)
    }
}

/// Closes the bus and raises `terminate` however processing ends, so a
/// blocked producer can never wait on a dead consumer.
struct StopOnExit<'a> {
    bus: &'a EventBus<CapturedFrame>,
    terminate: &'a AtomicBool,
}

impl Drop for StopOnExit<'_> {
    fn drop(&mut self) {
        self.terminate.store(true, Ordering::SeqCst);
        self.bus.close();
    }
}

#[derive(Debug, Default)]
struct Tally {
    frames: u64,
    anomalies: u64,
    persistence_failures: u64,
}

fn drain(bus: &EventBus<CapturedFrame>, pipeline: &mut Pipeline) -> Tally {
    let mut tally = Tally::default();
    while let Some(captured) = bus.event_dequeue_wait() {
        let outcome = pipeline.process(&captured);
        tally.frames += 1;
        tally.anomalies += outcome.anomalies.len() as u64;
        tally.persistence_failures += outcome.persistence_failures as u64;
    }
    debug!(frames = tally.frames, "Event bus drained");
    tally
}

fn capture_frames(
    source: &mut dyn PacketSource,
    terminate: &AtomicBool,
    bus: &EventBus<CapturedFrame>,
    metrics: &MetricsRecorder,
    window: &mut BurstWindow,
) -> Result<CaptureStats, lanwatch_capture::CaptureError> {
    source.run(terminate, &mut |event| match event {
        CaptureEvent::Packet(raw) => {
            metrics.frames.inc();
            let frame = match Frame::decode(&raw.data) {
                Ok(frame) => frame,
                Err(e) => {
                    metrics.frames_undecodable.inc();
                    trace!(error = %e, len = raw.data.len(), "Skipping undecodable frame");
                    return;
                }
            };
            let captured = CapturedFrame {
                timestamp: raw.timestamp,
                frame,
                frames_last_second: Some(window.record(raw.timestamp)),
            };
            match bus.event_enqueue(captured) {
                Ok(None) => {}
                Ok(Some(_displaced)) => metrics.frames_dropped.inc(),
                Err(EventError::Closed) => trace!("Event bus closed, frame discarded"),
                Err(e) => warn!(error = %e, "Failed to queue frame"),
            }
        }
        CaptureEvent::SliceFailed(e) => {
            metrics.capture_errors.inc();
            debug!(error = %e, "Capture slice failed");
        }
    })
}
