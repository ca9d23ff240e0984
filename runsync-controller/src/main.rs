//! Runsync Controller
//!
//! Keeps declarative PipelineRun records in sync with the execution
//! engine's run resources.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Store: HTTP adapter for records and engine runs
//! - Reconciler: idempotent per-record state machine (finalizer protocol,
//!   engine run creation and cleanup)
//! - Scheduler: keyed dispatch with per-key serialization and requeue
//!   backoff, fed by a level-triggered poll watcher

mod config;
mod finalizer;
mod reconciler;
mod scheduler;
mod translate;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::reconciler::{Reconcile, Reconciler};
use crate::scheduler::{BackoffPolicy, KeyedScheduler, PollWatcher};
use runsync_store::{EngineRunStore, HttpStore, RecordLister, RecordStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runsync_controller=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Runsync controller");

    // Load configuration
    let config = load_config()?;
    info!(
        "Loaded configuration: controller_id={}, api_url={}",
        config.controller_id, config.api_url
    );

    // Initialize the store adapter
    let store = Arc::new(HttpStore::new(config.api_url.clone()));

    // Build the reconciler over the store traits
    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&store) as Arc<dyn RecordStore>,
        Arc::clone(&store) as Arc<dyn EngineRunStore>,
    ));

    let backoff = BackoffPolicy {
        initial: config.backoff_initial,
        max: config.backoff_max,
    };
    let scheduler = KeyedScheduler::new(
        Arc::clone(&reconciler) as Arc<dyn Reconcile>,
        backoff,
    );
    scheduler.register(reconciler.registration());

    // Level-triggered notification source
    let watcher = PollWatcher::new(
        store as Arc<dyn RecordLister>,
        scheduler.handle(),
        config.resync_interval,
    );
    tokio::spawn(watcher.run());

    info!(
        "Controller initialized, resync interval: {:?}",
        config.resync_interval
    );

    // Dispatch loop runs until the process is stopped
    scheduler.run().await;

    Ok(())
}

/// Loads configuration from environment variables with fallback to defaults
fn load_config() -> Result<Config> {
    match Config::from_env() {
        Ok(config) => {
            config.validate()?;
            Ok(config)
        }
        Err(_) => {
            info!("Failed to load config from environment, using defaults");
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}
