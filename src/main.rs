use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

use vaultplane::{
    backend::{channel, serve, Backend},
    observability::{init_observability, log_config_info},
    transport::start_transport,
    upstream::InMemoryUpstream,
    Config, Result, APP_NAME, VERSION,
};

#[derive(Parser, Debug)]
#[command(name = "vaultplane")]
#[command(about = "Secrets-engine backend plugin with lease management")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, env = "VAULTPLANE_CONFIG")]
    config: Option<PathBuf>,

    /// Transport bind host override
    #[arg(long)]
    host: Option<String>,

    /// Transport port override (0 picks a free port)
    #[arg(long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists; this must happen before any config is read
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.transport.host = host;
    }
    if let Some(port) = args.port {
        config.transport.port = port;
    }
    if args.verbose {
        config.observability.log_level = "debug".to_string();
    }

    init_observability(&config.observability).await?;
    info!(app_name = APP_NAME, version = VERSION, "Starting vaultplane backend");
    log_config_info(&config);

    let backend = Arc::new(Backend::from_config(&config, Arc::new(InMemoryUpstream::new()))?);
    let (client, rx) = channel(config.transport.request_buffer);
    let server = tokio::spawn(serve(Arc::clone(&backend), rx));

    match config.lease.sweep_interval() {
        Some(period) => {
            let backend = Arc::clone(&backend);
            let grace = config.lease.sweep_grace();
            let retention = config.lease.tombstone_retention();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    backend.sweep(grace).await;
                    backend.purge_tombstones(retention);
                }
            });
        }
        None => warn!("Lease sweep disabled; expired leases are only revoked on request"),
    }

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received");
    };

    if let Err(e) = start_transport(&config.transport, client, shutdown).await {
        error!("Transport terminated with error: {}", e);
        std::process::exit(1);
    }

    // The transport held the last client; serve returns once in-flight requests finish
    if let Err(e) = server.await {
        error!("Backend serve loop failed: {}", e);
    }

    info!("Backend shutdown completed");
    Ok(())
}
