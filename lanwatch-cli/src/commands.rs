use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use lanwatch_capture::{LiveSource, PacketSource, ReplaySource};
use lanwatch_config::LanwatchConfig;
use lanwatch_core::events::BackpressurePolicy;
use lanwatch_core::sink::{EventStore, DEFAULT_ANOMALY_LIMIT, TOPIC_ALERT, TOPIC_DEVICE};
use lanwatch_engine::{BroadcastNotifier, Engine, Notification};
use lanwatch_storage::SqliteStore;
use lanwatch_telemetry::MetricsRecorder;

use crate::output;

#[derive(Parser)]
#[command(name = "lanwatch", version, about = "Passive LAN device inventory and anomaly alerts")]
pub struct Cli {
    /// Configuration file, layered over the defaults and under LANWATCH_* variables
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch a live interface until Ctrl-C
    Scan(ScanArgs),
    /// Run the detection pipeline over a pcap file
    Replay(ReplayArgs),
    /// Print stored devices, alerts or the security score
    #[command(subcommand)]
    Show(ShowCommand),
    /// Dump the device inventory to stdout
    Export(ExportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Interface to capture on; defaults to `capture.interface`, then the pcap default device
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Skip vendor and hostname lookups
    #[arg(long)]
    pub no_enrich: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    pub file: PathBuf,

    #[arg(long)]
    pub no_enrich: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ShowCommand {
    Devices,
    Alerts {
        /// Newest alerts to print
        #[arg(long, default_value_t = DEFAULT_ANOMALY_LIMIT)]
        limit: usize,
    },
    /// Security score: 100 minus 10 per alert in the last ten minutes
    Score,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
    pub format: ExportFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

pub fn scan(args: ScanArgs, mut config: LanwatchConfig, metrics: MetricsRecorder) -> anyhow::Result<()> {
    if let Some(interface) = args.interface {
        config.capture.interface = Some(interface);
        config = config.validated().context("invalid --interface")?;
    }
    let mut source = LiveSource::open(&config.capture).context("cannot start capture")?;
    println!(
        "[*] Passive monitoring started on {}. Press Ctrl+C to stop.",
        source.describe()
    );
    monitor(&mut source, &config, metrics, !args.no_enrich)
}

pub fn replay(args: ReplayArgs, mut config: LanwatchConfig, metrics: MetricsRecorder) -> anyhow::Result<()> {
    // A file can be read faster than it is processed; nothing should be lost.
    config.core.event_bus.backpressure = BackpressurePolicy::Block;
    let mut source = ReplaySource::open(&args.file)
        .with_context(|| format!("cannot open {}", args.file.display()))?;
    monitor(&mut source, &config, metrics, !args.no_enrich)
}

fn monitor(
    source: &mut dyn PacketSource,
    config: &LanwatchConfig,
    metrics: MetricsRecorder,
    enrich: bool,
) -> anyhow::Result<()> {
    let store = Arc::new(open_store(config)?);
    let notifier = Arc::new(BroadcastNotifier::default());
    let printer = spawn_printer(notifier.subscribe())?;

    let terminate = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&terminate);
    ctrlc::set_handler(move || {
        info!("Stop requested");
        flag.store(true, Ordering::SeqCst);
    })
    .context("failed to install Ctrl-C handler")?;

    let engine = Engine::from_config(config, store, notifier.clone(), metrics.clone(), enrich)?;
    let result = engine.run(source, &terminate);

    // The engine is gone; dropping the last sender ends the printer.
    drop(notifier);
    if printer.join().is_err() {
        warn!("Alert printer panicked");
    }

    let summary = result?;
    println!(
        "Stopped. {} frames processed, {} devices known, {} alerts.",
        summary.frames_processed, summary.devices, summary.anomalies
    );
    if summary.frames_dropped > 0 {
        println!("{} frames dropped under load.", summary.frames_dropped);
    }
    match metrics.gather_metrics() {
        Ok(text) => debug!(metrics = %text, "Final metrics"),
        Err(e) => warn!(error = %e, "Failed to render metrics"),
    }
    Ok(())
}

fn spawn_printer(mut rx: broadcast::Receiver<Notification>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("printer".into())
        .spawn(move || loop {
            match rx.blocking_recv() {
                Ok(note) if note.topic == TOPIC_ALERT => {
                    if let Some(line) = output::alert_line(&note.payload) {
                        println!("{line}");
                    }
                }
                Ok(note) if note.topic == TOPIC_DEVICE => {
                    if let Some(line) = output::device_line(&note.payload) {
                        println!("{line}");
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => warn!(missed, "Console fell behind"),
                Err(RecvError::Closed) => break,
            }
        })
}

fn open_store(config: &LanwatchConfig) -> anyhow::Result<SqliteStore> {
    let path = &config.storage.db_path;
    SqliteStore::open(path).with_context(|| format!("cannot open database {}", path.display()))
}

pub fn show(what: ShowCommand, config: &LanwatchConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let mut stdout = io::stdout().lock();
    match what {
        ShowCommand::Devices => output::device_table(&mut stdout, &store.list_devices()?)?,
        ShowCommand::Alerts { limit } => {
            output::alert_table(&mut stdout, &store.list_anomalies(limit)?)?
        }
        ShowCommand::Score => {
            let recent = store.list_anomalies(output::SCORE_FLOOR_ALERTS)?;
            let score = output::security_score(&recent, Utc::now());
            writeln!(stdout, "Security score: {score}/100")?;
        }
    }
    Ok(())
}

pub fn export(args: ExportArgs, config: &LanwatchConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let devices = store.list_devices()?;
    if devices.is_empty() {
        println!("No devices found in database.");
        return Ok(());
    }
    let stdout = io::stdout().lock();
    match args.format {
        ExportFormat::Json => output::export_json(stdout, &devices),
        ExportFormat::Csv => output::export_csv(stdout, &devices),
    }
}
