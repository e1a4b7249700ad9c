//! ## lanwatch-cli
//! **Passive LAN monitor**
//!
//! `scan` watches a live interface, `replay` runs the same pipeline over a
//! capture file, and `show` / `export` read what earlier runs stored.

use anyhow::Context;
use clap::Parser;

use lanwatch_config::LanwatchConfig;
use lanwatch_telemetry::{EventLogger, MetricsRecorder};

mod commands;
mod output;

use commands::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LanwatchConfig::load_from_path(path),
        None => LanwatchConfig::load(),
    }
    .context("failed to load configuration")?;

    EventLogger::init(&config.telemetry.log_level, config.telemetry.json_logs)
        .context("failed to install the log subscriber")?;
    let metrics = MetricsRecorder::new();

    match cli.command {
        Commands::Scan(args) => commands::scan(args, config, metrics),
        Commands::Replay(args) => commands::replay(args, config, metrics),
        Commands::Show(what) => commands::show(what, &config),
        Commands::Export(args) => commands::export(args, &config),
    }
}
