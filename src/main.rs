//! Sentinel Cam CLI
//!
//! Runs the surveillance pipeline against a camera (or the synthetic mock
//! scene) and offers maintenance commands for the event store and the
//! recordings directory.

use clap::{Parser, Subcommand};
use sentinel_cam::{
    capture::{Camera, CameraGuard, MockCamera},
    config::FileConfig,
    detection::NullClassifier,
    events::{EventStore, SqliteEventStore},
    metrics::MetricsRegistry,
    pipeline::{run as run_pipeline, Collaborators, FramePipeline},
    retention::{FsRetentionSweeper, RetentionSweeper},
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "sentinel-cam", version, about = "Single-camera surveillance agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the detection pipeline
    Run {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Stop after this many frames
        #[arg(long)]
        frames: Option<u64>,
        /// Use the synthetic mock scene instead of a camera
        #[arg(long)]
        mock: bool,
    },
    /// Print stored events, most recent first
    Events {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Create the event database
    InitDb {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Delete recordings older than the retention window
    Cleanup {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the retention window in days
        #[arg(long)]
        days: Option<u64>,
    },
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let code = match cli.command {
        Command::Run {
            config,
            frames,
            mock,
        } => run(load_config(config), frames, mock),
        Command::Events { config } => list_events(&load_config(config)),
        Command::InitDb { config } => init_db(&load_config(config)),
        Command::Cleanup { config, days } => cleanup(&load_config(config), days),
    };

    std::process::exit(code);
}

fn load_config(path: Option<PathBuf>) -> FileConfig {
    match FileConfig::load(path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    }
}

fn open_store(config: &FileConfig) -> Option<SqliteEventStore> {
    match SqliteEventStore::open(&config.storage.database) {
        Ok(store) => Some(store),
        Err(e) => {
            eprintln!(
                "Failed to open event database {}: {}",
                config.storage.database.display(),
                e
            );
            None
        }
    }
}

#[cfg(feature = "camera")]
fn select_camera(mock: bool) -> Box<dyn Camera> {
    if mock {
        Box::new(MockCamera::new())
    } else {
        Box::new(sentinel_cam::capture::DeviceCamera::new())
    }
}

#[cfg(not(feature = "camera"))]
fn select_camera(mock: bool) -> Box<dyn Camera> {
    if !mock {
        warn!("Built without the `camera` feature, using the synthetic scene");
    }
    Box::new(MockCamera::new())
}

#[cfg(feature = "metrics")]
fn spawn_metrics_server(port: u16, registry: Arc<MetricsRegistry>) {
    use sentinel_cam::metrics::{MetricsServer, MetricsServerConfig};

    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Failed to start metrics runtime: {}", e);
                return;
            }
        };
        let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
        if let Err(e) = runtime.block_on(server.run()) {
            warn!("Metrics server stopped: {}", e);
        }
    });
}

#[cfg(not(feature = "metrics"))]
fn spawn_metrics_server(_port: u16, _registry: Arc<MetricsRegistry>) {}

fn run(config: FileConfig, frames: Option<u64>, mock: bool) -> i32 {
    info!("Sentinel Cam v{}", sentinel_cam::VERSION);

    let Some(store) = open_store(&config) else {
        return 1;
    };

    let mut camera = match CameraGuard::open(select_camera(mock), &config.capture) {
        Ok(camera) => camera,
        Err(e) => {
            eprintln!("Failed to open camera: {}", e);
            return 1;
        }
    };

    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    info!("No object model configured, object detection disabled");
    let collaborators = Collaborators {
        classifier: Box::new(NullClassifier),
        store: Box::new(store),
        alerts: Box::new(config.alerts.build()),
        clips: Box::new(config.recording.clip_factory()),
        output: config.output.build_sink(),
    };
    let mut pipeline = FramePipeline::new(config.pipeline_settings(), collaborators);

    match MetricsRegistry::new() {
        Ok(registry) => {
            let registry = Arc::new(registry);
            spawn_metrics_server(config.output.metrics_port, Arc::clone(&registry));
            pipeline = pipeline.with_metrics(registry);
        }
        Err(e) => warn!("Metrics disabled: {}", e),
    }

    info!(
        recordings = %config.recording.directory.display(),
        database = %config.storage.database.display(),
        "Processing frames..."
    );

    match run_pipeline(&mut *camera, &mut pipeline, &stop, frames) {
        Ok(summary) => {
            let stats = summary.stats;
            info!(
                "Processed {} frames: {} motion frames, {} tamper events, {} object events, {} clips",
                stats.frames_processed,
                stats.motion_frames,
                stats.tamper_events,
                stats.object_events,
                stats.sessions_completed
            );
            0
        }
        Err(e) => {
            eprintln!("Pipeline stopped: {}", e);
            1
        }
    }
}

fn list_events(config: &FileConfig) -> i32 {
    let Some(store) = open_store(config) else {
        return 1;
    };
    match store.list_all() {
        Ok(events) => {
            for event in &events {
                println!("{}", event);
            }
            info!("{} events", events.len());
            0
        }
        Err(e) => {
            eprintln!("Failed to read events: {}", e);
            1
        }
    }
}

fn init_db(config: &FileConfig) -> i32 {
    let Some(store) = open_store(config) else {
        return 1;
    };
    match store.count() {
        Ok(count) => {
            println!(
                "Event database ready at {} ({} events)",
                config.storage.database.display(),
                count
            );
            0
        }
        Err(e) => {
            eprintln!("Event database unusable: {}", e);
            1
        }
    }
}

fn cleanup(config: &FileConfig, days: Option<u64>) -> i32 {
    let age = match days {
        Some(days) => Duration::from_secs(days * 86_400),
        None => config.retention.max_age(),
    };
    match FsRetentionSweeper::new().purge_older_than(&config.recording.directory, age) {
        Ok(deleted) => {
            println!("Deleted {} expired files", deleted);
            0
        }
        Err(e) => {
            eprintln!("Cleanup failed: {}", e);
            1
        }
    }
}
