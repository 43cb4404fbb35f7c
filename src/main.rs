//! REC API server - main entry point

use anyhow::Context;
use clap::Parser;
use rec_api::{
    http_transport::HttpTransportServer, logging, storage, RecService, ServiceConfig,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// REC observation API server
#[derive(Parser, Debug)]
#[command(name = "rec-api-server")]
#[command(about = "RealEstateCore entity and observation API")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Config {
    /// CSV file (space;building;sensor) used to seed the entity hierarchy
    #[arg(long, default_value = "/opt/diwise/config/rec.csv")]
    input: PathBuf,

    /// Optional TOML configuration file
    #[arg(long, env = "REC_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Port to listen on, overrides SERVICE_PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

async fn seed_from_file(db: &dyn storage::Database, path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        warn!("Seed file {} not found, skipping", path.display());
        return Ok(());
    }

    let input = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let count = storage::seed::seed(db, &input)
        .await
        .with_context(|| format!("failed to seed from {}", path.display()))?;
    info!("Seeded {} sensors from {}", count, path.display());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Config::parse();

    let mut service_config =
        ServiceConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(port) = args.port {
        service_config.service_port = port;
        service_config.validate()?;
    }

    logging::init_logging(service_config.log_format, args.debug)
        .context("failed to initialize logging")?;

    info!("🚀 Starting REC API v{}", env!("CARGO_PKG_VERSION"));

    let db = storage::connect(&service_config.database_url, service_config.max_connections)
        .await
        .context("failed to connect to database")?;

    seed_from_file(db.as_ref(), &args.input).await?;

    let server = HttpTransportServer::new(RecService::new(db), service_config.http_server_config());
    server.start(shutdown_signal()).await?;

    Ok(())
}
