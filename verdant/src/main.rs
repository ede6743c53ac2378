//! # Verdant Chamber Controller
//!
//! Boots the coordinator, which in turn starts the recipe engine, the
//! housekeeping satellites and the configured peripherals and controllers.
//!
//! # Usage
//!
//! ```bash
//! # Run with the default config and data directory
//! verdant
//!
//! # Simulated hardware, local data directory, verbose logs
//! verdant --data-dir ./data --simulate -v
//!
//! # JSON logs for a log shipper
//! verdant --config /etc/verdant/verdant.toml --json
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use verdant::Coordinator;
use verdant_common::actor::{Actor, ManagedActor};
use verdant_common::clock::SystemClock;
use verdant_common::config::{ConfigError, ConfigLoader, LogLevel, VerdantConfig};
use verdant_common::consts::DEFAULT_CONFIG_PATH;
use verdant_common::state::SharedState;
use verdant_common::store::FileStore;
use verdant_devices::ActorRegistry;

/// Grace period for the coordinator to persist state after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Verdant - cultivation chamber controller
#[derive(Parser, Debug)]
#[command(name = "verdant")]
#[command(version)]
#[command(about = "Supervisory core of a cultivation chamber")]
#[command(long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the data directory from the configuration
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Run peripherals against simulated hardware
    #[arg(short = 's', long)]
    simulate: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (mut config, missing) = match VerdantConfig::load(&args.config) {
        Ok(config) => (config, false),
        Err(ConfigError::FileNotFound) => (VerdantConfig::default(), true),
        Err(e) => return Err(e.into()),
    };
    setup_tracing(&args, config.shared.log_level);

    if missing {
        warn!(
            "Config file {} not found, using defaults",
            args.config.display()
        );
    }
    if let Some(data_dir) = args.data_dir.clone() {
        config.storage.data_dir = data_dir;
    }
    config.hardware.simulate |= args.simulate;
    config.validate()?;

    info!(
        "🚀 Verdant v{} starting as '{}'",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );
    info!("Data directory: {}", config.storage.data_dir.display());
    if config.hardware.simulate {
        info!("Simulation mode enabled");
    }

    let store = Arc::new(FileStore::open(config.storage.data_dir.clone())?);
    let state = Arc::new(SharedState::with_window(
        config.aggregation.group_average_window,
    ));
    let registry = ActorRegistry::with_builtin();
    info!("Registered device actors: {}", registry.list().join(", "));

    let coordinator = Coordinator::new(config, state, store, Arc::new(SystemClock), registry);
    let mut coordinator = Actor::new(coordinator);
    coordinator.spawn()?;

    tokio::select! {
        result = signal::ctrl_c() => match result {
            Ok(()) => info!("🛑 Received shutdown signal (Ctrl+C)"),
            Err(e) => error!("Unable to listen for shutdown signal: {}", e),
        },
        _ = coordinator.join() => warn!("Coordinator stopped on its own"),
    }

    coordinator.shutdown();
    if tokio::time::timeout(SHUTDOWN_GRACE, coordinator.join())
        .await
        .is_err()
    {
        warn!("Coordinator did not stop within {:?}", SHUTDOWN_GRACE);
    }

    info!("✅ Verdant shutdown complete");
    Ok(())
}

/// Setup tracing subscriber. `RUST_LOG` wins over the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let level = if args.verbose {
        LogLevel::Debug
    } else {
        level
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}
