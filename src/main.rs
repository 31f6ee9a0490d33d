use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use nfcsec_lib::{Pipeline, SqliteAuditStore};
use nfcsec_rs::config::GateConfig;
use nfcsec_rs::server;

/// Authentication gateway for NFC readers: verifies encrypted tag envelopes
/// and keeps an audit trail of every attempt.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config holding the key and credential registry.
    #[arg(short, long)]
    config: PathBuf,
    /// Address to accept reader connections on.
    #[arg(long, default_value = "0.0.0.0:8883")]
    listen: String,
    /// SQLite database for the audit trail.
    #[arg(short, long, default_value = "uids.db")]
    database: PathBuf,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_thread_ids(false);

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // -v raises the default INFO to DEBUG; RUST_LOG still wins per target
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    if let Err(e) = run(cli).await {
        error!("Gateway failed: {:?}", e);
        process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = GateConfig::load(&cli.config).with_context(|| format!("Failed to load {:?}", cli.config))?;
    config.merge_api_keys_from_env()?;
    let (key, registry) = config.into_parts()?;

    let store = SqliteAuditStore::open(&cli.database)
        .with_context(|| format!("Failed to open audit store at {:?}", cli.database))?;
    let pipeline = Arc::new(Pipeline::new(Arc::new(key), Arc::new(registry), store));

    let listener = tokio::net::TcpListener::bind(&cli.listen)
        .await
        .with_context(|| format!("Failed to bind {}", cli.listen))?;

    tokio::select! {
        result = server::serve(listener, pipeline) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
