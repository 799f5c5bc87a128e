mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{handle_check_config, handle_run, handle_send_test_email};
use seawatch::log_format::TargetFirstFormat;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser)]
#[command(name = "seawatch")]
#[command(about = "Maritime anomaly monitor: AIS signal shutoffs and route deviations")]
#[command(version)]
struct Cli {
    /// Disable ANSI colours in log output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll vessel positions and raise anomaly alerts until interrupted
    Run {
        /// Path to monitor.toml (defaults to SEAWATCH_CONFIG or the environment's standard location)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Serve Prometheus metrics on this port (overrides metrics_port in the config)
        #[arg(long)]
        metrics_port: Option<u16>,

        /// Serve the operator API on this port (overrides api_port in the config)
        #[arg(long)]
        api_port: Option<u16>,
    },
    /// Validate the configuration file and report missing environment variables
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Send a test alert email
    SendTestEmail {
        #[arg(long)]
        config: Option<PathBuf>,

        /// Recipient address (repeatable); defaults to the configured recipients
        #[arg(long)]
        to: Vec<String>,
    },
}

fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok().filter(|dsn| !dsn.is_empty())?;
    let environment = std::env::var("SEAWATCH_ENV").unwrap_or_else(|_| "development".to_string());
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(environment.into()),
            ..Default::default()
        },
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Keep the guard alive for the whole process so queued events are flushed
    let _sentry_guard = init_sentry();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().event_format(TargetFirstFormat::new(!cli.no_color)))
        .with(_sentry_guard.as_ref().map(|_| sentry_tracing::layer()))
        .init();

    match cli.command {
        Commands::Run {
            config,
            metrics_port,
            api_port,
        } => handle_run(config, metrics_port, api_port).await,
        Commands::CheckConfig { config } => handle_check_config(config),
        Commands::SendTestEmail { config, to } => handle_send_test_email(config, to).await,
    }
}
