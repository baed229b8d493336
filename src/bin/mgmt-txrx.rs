//! mgmt-txrx command line tool
//!
//! Exercises a management frame descriptor pool outside the driver:
//! - Run a concurrent submit/complete simulation
//! - Validate a pool configuration file
//! - Dump Prometheus metrics after a run
//!
//! # Examples
//!
//! ```bash
//! # Simulate with the default 512-descriptor pool
//! mgmt-txrx simulate
//!
//! # Stress a tiny pool from a config file
//! mgmt-txrx --config pool.toml simulate --capacity 8 --workers 16
//!
//! # Check a config file
//! mgmt-txrx --config pool.toml check-config
//! ```

use clap::{Args, Parser, Subcommand};
use mgmt_txrx::sim::{self, FrameMeta};
use mgmt_txrx::{metrics, Config, DescPool};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Management frame descriptor pool tool
#[derive(Parser, Debug)]
#[command(name = "mgmt-txrx")]
#[command(version = mgmt_txrx::VERSION)]
#[command(about = "Management frame TX/RX descriptor pool tool", long_about = None)]
#[command(author = "Anton Feldmann <anton.feldmann@gmail.com>")]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(long, global = true, env = "MGMT_TXRX_CONFIG")]
    config: Option<PathBuf>,

    /// Log directory path
    #[arg(long, global = true, default_value = "logs", env = "MGMT_TXRX_LOG_DIR")]
    log_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", env = "RUST_LOG")]
    log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a concurrent submit/complete simulation
    Simulate(SimulateArgs),

    /// Validate the configuration and print the effective values
    CheckConfig,

    /// Run a short simulation and print Prometheus metrics
    Metrics,

    /// Show version
    Version,
}

/// Simulation overrides
#[derive(Args, Debug)]
struct SimulateArgs {
    /// Descriptor pool capacity
    #[arg(short, long)]
    capacity: Option<usize>,

    /// Concurrent transmit tasks
    #[arg(short, long)]
    workers: Option<usize>,

    /// Frames submitted by each task
    #[arg(short, long)]
    frames: Option<usize>,

    /// Completion delay in microseconds
    #[arg(long)]
    delay_us: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli)?;

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };

    match cli.command {
        Commands::Simulate(args) => simulate_command(config, args).await,
        Commands::CheckConfig => {
            println!("{}", config.to_toml_string()?);
            Ok(())
        }
        Commands::Metrics => {
            metrics::init_metrics();
            let args = SimulateArgs {
                capacity: None,
                workers: None,
                frames: Some(100),
                delay_us: None,
                json: false,
            };
            run_simulation(config, args).await?;
            print!("{}", metrics::export_metrics());
            Ok(())
        }
        Commands::Version => {
            println!("mgmt-txrx {}", mgmt_txrx::VERSION);
            Ok(())
        }
    }
}

async fn simulate_command(config: Config, args: SimulateArgs) -> anyhow::Result<()> {
    let json = args.json;
    let report = run_simulation(config, args).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pool:        {} ({} descriptors)", report.pool.name, report.pool.capacity);
        println!("Submitted:   {}", report.submitted);
        println!("Completed:   {}", report.completed);
        println!("Dropped:     {}", report.dropped);
        println!("Peak leased: {}", report.pool.high_watermark);
        println!("Elapsed:     {} ms", report.elapsed_ms);
    }

    if report.mismatched > 0 {
        anyhow::bail!("{} completions returned the wrong payload", report.mismatched);
    }
    Ok(())
}

async fn run_simulation(mut config: Config, args: SimulateArgs) -> anyhow::Result<sim::SimulationReport> {
    if let Some(capacity) = args.capacity {
        config.pool.capacity = capacity;
    }
    if let Some(workers) = args.workers {
        config.simulation.workers = workers;
    }
    if let Some(frames) = args.frames {
        config.simulation.frames_per_worker = frames;
    }
    if let Some(delay) = args.delay_us {
        config.simulation.completion_delay_us = delay;
    }
    config.validate()?;

    let pool: Arc<DescPool<FrameMeta>> =
        Arc::new(DescPool::with_capacity(config.pool.name.clone(), config.pool.capacity)?);
    info!(pool = %config.pool.name, capacity = config.pool.capacity, "Descriptor pool ready");

    let report = sim::run(Arc::clone(&pool), &config.simulation).await?;
    if report.dropped > 0 {
        warn!(dropped = report.dropped, "Frames dropped on descriptor exhaustion");
    }

    pool.deinit()?;
    Ok(report)
}

/// Setup logging with rolling files and console output
fn setup_logging(cli: &Cli) -> anyhow::Result<()> {
    std::fs::create_dir_all(&cli.log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &cli.log_dir, "mgmt-txrx.log");

    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::WARN);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color),
        )
        .with(fmt::layer().with_writer(file_appender).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(())
}
