//! Live acquisition session: both sensor streams, a render summary and an
//! optional dataset log, until Ctrl+C or an optional time limit.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use grip_core::acquisition::{EmgIngest, ForceIngest, IngestExit, IngestStats, Snapshot, SynchronizedSnapshot};
use grip_core::config::{CalibrationModel, ConfigError, ConfigLoader, ConfigSummary, SerialConfig, SystemConfig};
use grip_core::error::{GripError, GripResult};
use grip_core::hal::{LineTransport, SimulatedEmgDevice, SimulatedForceBoard};
use grip_core::scheduler::{stop_on_interrupt, Scheduler, SessionEnd, StopSignal, TaskReport};
use grip_core::sinks::{CsvDatasetLogger, RawForceLog, SnapshotSink, TracingRenderSink};
use grip_core::utils::ForceConverter;

#[derive(Parser, Debug)]
#[command(name = "grip-logger", version, about = "Record EMG and grip force side by side")]
struct Args {
    /// Configuration file, used instead of grip.toml and grip.local.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Calibration file, overrides [calibration] path
    #[arg(long)]
    calibration: Option<PathBuf>,

    /// Dataset CSV, overrides [logging] dataset_path
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Session length in seconds; runs until Ctrl+C when omitted
    #[arg(short, long)]
    duration_secs: Option<u64>,

    /// Use simulated devices for both streams
    #[arg(long)]
    simulate: bool,

    /// Seed for the simulated devices
    #[arg(long)]
    seed: Option<u64>,

    /// Print the session summary as JSON on exit
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct SessionSummary {
    ended_by: SessionEnd,
    config: ConfigSummary,
    emg: IngestStats,
    emg_rate_hz: f64,
    force: IngestStats,
    force_rate_hz: f64,
    tasks: Vec<TaskReport>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let (config, model) = startup(&args).context("startup failed")?;
    let converter = ForceConverter::with_reference(Arc::new(model), config.force.vref, config.force.adc_max);

    let capacity = config.acquisition.buffer_capacity;
    let channels = config.acquisition.force_channels;
    let seed = args.seed.unwrap_or_else(rand::random);

    let emg = Arc::new(EmgIngest::new(capacity)?);
    let mut force = ForceIngest::new(channels, capacity, converter)?;
    if let Some(path) = &config.force.raw_log_path {
        let log = RawForceLog::create(path, channels)
            .with_context(|| format!("creating raw force log {}", path.display()))?;
        force = force.with_raw_log(Box::new(log));
    }
    let force = Arc::new(force);
    let snapshots = SynchronizedSnapshot::new(emg.clone(), force.clone(), config.acquisition.window_samples)?;

    let mut scheduler = Scheduler::new(StopSignal::new());

    if config.emg.simulate {
        let listener = emg.clone();
        let rate_hz = config.emg.simulated_rate_hz;
        scheduler.spawn_worker("emg-device", move |token| {
            let mut device = SimulatedEmgDevice::new(rate_hz, seed);
            device.run(listener.as_ref(), &token);
        })?;
    } else {
        warn!("no EMG driver attached, EMG windows will stay zero");
    }

    let mut transport = open_transport(&config, seed)?;
    let ingest = force.clone();
    scheduler.spawn_worker("force-ingest", move |token| {
        if let IngestExit::Transport(err) = ingest.run(&mut transport, &token) {
            let err = GripError::from(err);
            error!(error = %err, "force stream lost");
        }
    })?;

    let render_snapshots = snapshots.clone();
    let mut render = TracingRenderSink::new(config.scheduler.render_rate_hz.ceil() as u64);
    let render_name = render.name().to_string();
    let mut render_frame = Snapshot::default();
    scheduler.spawn_periodic(&render_name, config.scheduler.render_rate_hz, move |_| {
        render_snapshots.take_into(&mut render_frame);
        render
            .consume(&render_frame)
            .map_err(|err| GripError::sink(render.name(), err))
    })?;

    if let Some(path) = &config.logging.dataset_path {
        let mut logger = CsvDatasetLogger::create(path, channels)
            .with_context(|| format!("creating dataset log {}", path.display()))?;
        let log_name = logger.name().to_string();
        let log_snapshots = snapshots.clone();
        let mut log_frame = Snapshot::default();
        scheduler.spawn_periodic(&log_name, config.scheduler.log_rate_hz, move |_| {
            log_snapshots.take_into(&mut log_frame);
            logger
                .consume(&log_frame)
                .map_err(|err| GripError::sink(logger.name(), err))
        })?;
    }

    let interrupt = stop_on_interrupt(scheduler.stop_signal())?;
    match args.duration_secs {
        Some(seconds) => info!(seconds, "recording, press Ctrl+C to stop early"),
        None => info!("recording, press Ctrl+C to stop"),
    }
    let ended_by = scheduler.wait_for_session(args.duration_secs.map(Duration::from_secs));

    let tasks = scheduler.shutdown()?;
    if interrupt.join().is_err() {
        warn!("interrupt listener panicked");
    }
    let summary = SessionSummary {
        ended_by,
        config: config.get_summary(),
        emg: emg.stats(),
        emg_rate_hz: emg.stats().estimated_rate_hz(),
        force: force.stats(),
        force_rate_hz: force.stats().estimated_rate_hz(),
        tasks,
    };

    info!(
        emg_samples = summary.emg.accepted,
        emg_rate_hz = format_args!("{:.2}", summary.emg_rate_hz),
        force_samples = summary.force.accepted,
        force_dropped = summary.force.dropped,
        force_rate_hz = format_args!("{:.2}", summary.force_rate_hz),
        ended_by = ?summary.ended_by,
        "session complete"
    );
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

/// Configuration and calibration; nothing is acquired unless both load
fn startup(args: &Args) -> GripResult<(SystemConfig, CalibrationModel)> {
    let config = load_config(args)?;
    info!(summary = ?config.get_summary(), "configuration loaded");

    let model = CalibrationModel::load(&config.calibration.path).inspect_err(|err| {
        error!(path = %config.calibration.path.display(), error = %err, "calibration unusable");
    })?;
    Ok((config, model))
}

fn load_config(args: &Args) -> GripResult<SystemConfig> {
    let loader = match &args.config {
        Some(path) => ConfigLoader::with_paths(Vec::new()).with_required_file(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load_system_config()?;

    if let Some(path) = &args.calibration {
        config.calibration.path = path.clone();
    }
    if let Some(path) = &args.dataset {
        config.logging.dataset_path = Some(path.clone());
    }
    if args.simulate {
        config.emg.simulate = true;
        config.serial.simulate = true;
    }

    config
        .validate_consistency()
        .map_err(ConfigError::ValidationError)?;
    Ok(config)
}

fn open_transport(config: &SystemConfig, seed: u64) -> Result<Box<dyn LineTransport>> {
    if config.serial.simulate {
        return Ok(Box::new(SimulatedForceBoard::new(
            config.acquisition.force_channels,
            config.serial.simulated_rate_hz,
            seed.wrapping_add(1),
        )));
    }

    open_serial(&config.serial)
}

#[cfg(feature = "serial")]
fn open_serial(serial: &SerialConfig) -> Result<Box<dyn LineTransport>> {
    let port = grip_core::hal::SerialLineTransport::open(serial)
        .with_context(|| format!("opening serial port {}", serial.port_name))?;
    Ok(Box::new(port))
}

#[cfg(not(feature = "serial"))]
fn open_serial(_serial: &SerialConfig) -> Result<Box<dyn LineTransport>> {
    anyhow::bail!("built without serial support; set serial.simulate = true or pass --simulate")
}
