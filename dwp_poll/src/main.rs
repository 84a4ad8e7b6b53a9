//! # DWP Poll Binary
//!
//! Polls the press controllers of every active DWP device, detects press
//! cycles per machine side and records validated cycles as cumulative line
//! counts.
//!
//! # Usage
//!
//! ```bash
//! # Run with the service config
//! dwp_poll --config /etc/dwp/dwp_poll.toml
//!
//! # Per-cycle and per-device logging
//! dwp_poll -c config/dwp_poll.toml -v
//!
//! # State-transition tracing
//! dwp_poll -c config/dwp_poll.toml -d
//!
//! # Dry run against the simulated press
//! dwp_poll -c config/dwp_poll.toml -s --database /tmp/counts.db
//! ```

#![deny(warnings)]

use clap::Parser;
use dwp_common::config::{ConfigError, ConfigLoader, LogLevel, PollerConfig};
use dwp_common::consts::DEFAULT_CONFIG_PATH;
use dwp_poll::clock::SystemClock;
use dwp_poll::core::PollCore;
use dwp_poll::devices::TomlDeviceSource;
use dwp_poll::readers::{simulation, ReaderRegistry};
use dwp_poll::store::SqliteCountStore;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// DWP Poll - press cycle detection and count recording
#[derive(Parser, Debug)]
#[command(name = "dwp_poll")]
#[command(version)]
#[command(about = "Polls DWP press sensors over Modbus TCP and records validated press cycles")]
#[command(long_about = None)]
struct Args {
    /// Path to the service configuration file (dwp_poll.toml).
    /// Defaults to /etc/dwp/dwp_poll.toml; built-in defaults are used if that file is absent.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the device list file
    #[arg(long, value_name = "FILE")]
    devices: Option<PathBuf>,

    /// Override the SQLite database path
    #[arg(long, value_name = "FILE")]
    database: Option<PathBuf>,

    /// Read from the simulated press instead of the configured reader
    #[arg(short = 's', long)]
    simulate: bool,

    /// Per-cycle and per-device logging
    #[arg(short, long)]
    verbose: bool,

    /// State-transition tracing
    #[arg(short, long)]
    debug: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

/// Service config plus the path relative paths are resolved against.
struct LoadedConfig {
    config: PollerConfig,
    path: PathBuf,
    defaulted: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("Poller startup failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Tracing needs the configured level, so load first and report after.
    let loaded = load_config(&args);
    let configured_level = loaded
        .as_ref()
        .map(|l| l.config.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, configured_level);
    let LoadedConfig {
        mut config,
        path,
        defaulted,
    } = loaded?;

    info!("DWP Poll v{} starting...", env!("CARGO_PKG_VERSION"));
    if defaulted {
        warn!("No config at {}, using built-in defaults", DEFAULT_CONFIG_PATH);
    } else {
        info!("Loaded config from {}", path.display());
    }

    if let Some(database) = args.database {
        config.store.path = database;
    }
    if args.simulate {
        info!("Simulation mode enabled");
        config.modbus.reader = simulation::READER_NAME.to_string();
    }
    let devices_path = args.devices.unwrap_or_else(|| config.devices_path(&path));
    info!("Device list: {}", devices_path.display());
    info!("Count store: {}", config.store.path.display());

    let registry = ReaderRegistry::with_builtin();
    let reader = registry.create_reader(&config.modbus.reader, &config.modbus)?;
    let store = SqliteCountStore::open(&config.store.path)?;
    let source = TomlDeviceSource::new(devices_path);

    let mut poll_core = PollCore::new(
        config,
        reader,
        Box::new(store),
        Box::new(source),
        Box::new(SystemClock),
    )?;

    // Setup signal handler.
    let running = poll_core.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    poll_core.init()?;
    poll_core.run()?;

    info!("DWP Poll shutdown complete");
    Ok(())
}

/// Load the service config named on the command line, or the default one.
///
/// A missing default config falls back to built-in defaults with paths
/// resolved against the working directory; a missing explicit config is an
/// error.
fn load_config(args: &Args) -> Result<LoadedConfig, ConfigError> {
    if let Some(path) = &args.config {
        let config = PollerConfig::load(path)?;
        return Ok(LoadedConfig {
            config,
            path: path.clone(),
            defaulted: false,
        });
    }

    let path = PathBuf::from(DEFAULT_CONFIG_PATH);
    match PollerConfig::load(&path) {
        Ok(config) => Ok(LoadedConfig {
            config,
            path,
            defaulted: false,
        }),
        Err(ConfigError::FileNotFound) => Ok(LoadedConfig {
            config: PollerConfig::default(),
            path: PathBuf::from("./dwp_poll.toml"),
            defaulted: true,
        }),
        Err(e) => Err(e),
    }
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let level = if args.debug {
        Level::TRACE
    } else if args.verbose {
        Level::DEBUG
    } else {
        Level::from(configured)
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
