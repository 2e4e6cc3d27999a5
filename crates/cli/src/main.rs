mod queue;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidium_core::{
    load_config, validate_config, Config, ConfigError, FfprobeProber, Quality, TaskCoordinator,
    TaskEvent,
};

use queue::QueueFile;

/// Config file used when `VIDIUM_CONFIG` is not set.
const DEFAULT_CONFIG: &str = "vidium.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let queue_path = match std::env::args_os().nth(1) {
        Some(path) => PathBuf::from(path),
        None => bail!("usage: vidium <queue.toml>"),
    };

    let config = read_config()?;
    validate_config(&config).context("Configuration validation failed")?;

    let default_quality = Quality::try_from(config.encoding.default_quality)
        .context("Invalid encoding.default_quality")?;
    let queue = QueueFile::load(&queue_path, default_quality)?;
    info!("Loaded {} tasks from {:?}", queue.tasks.len(), queue_path);

    let prober = Arc::new(FfprobeProber::new(config.tools.ffprobe_path.clone()));
    let (coordinator, mut events) = TaskCoordinator::new(config, prober);

    let mut expected = 0usize;
    for request in queue.tasks {
        match coordinator.enqueue(request.clone()) {
            Ok(id) => {
                info!("Queued {} ({}) as {}", request.input, request.kind, id);
                expected += 1;
            }
            Err(e) => warn!("Skipping {}: {}", request.input, e),
        }
    }
    if expected == 0 {
        info!("Nothing to do");
        return Ok(());
    }

    coordinator.start();

    let mut finished = 0usize;
    let mut failed = 0usize;
    let mut interrupted = false;
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while finished < expected {
        tokio::select! {
            result = &mut ctrl_c, if !interrupted => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("Interrupted, cancelling all tasks");
                interrupted = true;
                coordinator.cancel_all().await;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                if event.is_terminal() {
                    finished += 1;
                }
                if matches!(event, TaskEvent::Failed { .. }) {
                    failed += 1;
                }
                print_event(&event);
            }
        }
    }

    coordinator.stop().await;
    info!("{} tasks finished, {} failed", finished, failed);

    if failed > 0 {
        bail!("{} of {} tasks failed", failed, expected);
    }
    Ok(())
}

/// Loads `VIDIUM_CONFIG`, or `vidium.toml` when present, or the defaults.
fn read_config() -> Result<Config> {
    let (path, explicit) = match std::env::var("VIDIUM_CONFIG") {
        Ok(path) => (PathBuf::from(path), true),
        Err(_) => (PathBuf::from(DEFAULT_CONFIG), false),
    };

    info!("Loading configuration from {:?}", path);
    match load_config(&path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(_)) if !explicit => {
            info!("No configuration file, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load config from {:?}", path)),
    }
}

/// Events go to stdout as JSON lines; logs go to stderr.
fn print_event(event: &TaskEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!("Failed to serialize event: {}", e),
    }
}
