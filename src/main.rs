// src/main.rs
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossbeam_channel::unbounded;
use log::info;

use stream_viewer::drivers::{SceneSurface, SimulatedSource, StreamScope};
use stream_viewer::{spawn_viewer, MouseButton, Viewer, ViewerCommand, ViewerConfig, ViewerMessage};

/// Headless run of the viewer against a simulated scope.
#[derive(Parser, Debug)]
#[command(name = "stream-viewer", version, about)]
struct Cli {
    /// JSON viewer config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seconds to stream before shutting down
    #[arg(long, default_value_t = 6.0)]
    duration: f64,
    #[arg(long, default_value_t = 4)]
    channels: usize,
    #[arg(long, default_value_t = 250.0)]
    sample_rate: f64,
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Seconds between simulated trigger pulses
    #[arg(long, default_value_t = 1.5)]
    trigger_interval: f64,
    #[arg(long)]
    window: Option<f64>,
    #[arg(long)]
    label: Option<String>,
    /// Annotation log to append to
    #[arg(long)]
    annotations: Option<PathBuf>,
    /// Write a PNG of the final window here
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ViewerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ViewerConfig::default(),
    };
    if let Some(window) = cli.window {
        config.window_duration = window;
    }
    if let Some(label) = &cli.label {
        config.annotation_label = label.clone();
    }
    if cli.annotations.is_some() {
        config.annotation_file = cli.annotations.clone();
    }

    let params = config.to_params(cli.channels).context("invalid viewer settings")?;
    let source = SimulatedSource::new(cli.channels, cli.sample_rate, cli.seed)?
        .with_trigger_interval(cli.trigger_interval);
    let scope = StreamScope::new(source, config.buffer_duration)?;
    let viewer = Viewer::new(
        scope,
        SceneSurface::new(),
        params,
        config.tick_period(),
        &config.annotation_label,
    )?;

    let (tx_cmd, rx_cmd) = unbounded();
    let (tx_msg, rx_msg) = unbounded();
    let engine = spawn_viewer(viewer, tx_msg, rx_cmd).context("failed to spawn viewer engine")?;

    if let Some(path) = &config.annotation_file {
        tx_cmd.send(ViewerCommand::StartRecording(path.clone()))?;
    }

    // Mark the middle half of the window once it has filled.
    let run = Duration::from_secs_f64(cli.duration.max(0.5));
    thread::sleep(run / 2);
    let window = config.window_duration;
    for plot_time in [0.25 * window, 0.75 * window] {
        tx_cmd.send(ViewerCommand::Click {
            plot_time,
            button: MouseButton::Primary,
        })?;
    }
    thread::sleep(run / 2);

    if let Some(path) = &cli.snapshot {
        tx_cmd.send(ViewerCommand::Snapshot(path.clone()))?;
    }
    tx_cmd.send(ViewerCommand::Shutdown)?;
    let viewer = engine.join().map_err(|_| anyhow!("viewer engine panicked"))?;

    for msg in rx_msg.try_iter() {
        match msg {
            ViewerMessage::Log(line) => info!("{line}"),
            ViewerMessage::AnnotationAdded { onset, duration } => match onset {
                Some(onset) => println!("annotation at {onset:.3} for {duration:.3}s"),
                None => println!("annotation for {duration:.3}s (no data to stamp, not logged)"),
            },
            ViewerMessage::PersistenceError(err) => eprintln!("annotation write failed: {err}"),
            ViewerMessage::SnapshotWritten(path) => println!("snapshot: {}", path.display()),
            ViewerMessage::Stopped { written, failed } => {
                println!("annotations written: {written}, failed: {failed}")
            }
            ViewerMessage::RecordingStatus(_) | ViewerMessage::TickStats(_) => {}
        }
    }

    let stats = viewer.tick_stats();
    let surface = viewer.surface().stats();
    println!(
        "ticks: {} completed, {} idle, {} dropped",
        stats.completed, stats.idle, stats.dropped
    );
    println!(
        "markers: {} live; lines +{} -{}, regions +{} -{}",
        viewer.markers().len(),
        surface.lines_added,
        surface.lines_removed,
        surface.regions_added,
        surface.regions_removed
    );
    Ok(())
}
