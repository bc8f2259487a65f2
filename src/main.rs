use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use restrosync::{topics, BroadcastHub, EventBus, StateFile, Store, SyncConfig};

/// Headless RestroFlow sync client: connects to a deployment's
/// authoritative server and tails state changes and domain events.
#[derive(Parser)]
#[command(name = "restrosync", version)]
struct Args {
    /// Sync server host (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Sync server port (overrides config).
    #[arg(long)]
    port: Option<u16>,

    /// Explicit config file instead of the default location.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("restrosync=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => SyncConfig::load_from(path)?,
        None => SyncConfig::load()?,
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let hub = config.broadcast.enabled.then(BroadcastHub::new);
    let bus = EventBus::new(&config, hub);
    let state_file = StateFile::new(
        config
            .storage
            .state_file
            .clone()
            .unwrap_or_else(StateFile::default_path),
    );
    tracing::info!(
        server = %config.ws_url(),
        state_file = %state_file.path().display(),
        "starting sync client"
    );

    let tail = bus.subscribe(topics::WILDCARD, |event, payload, origin| {
        tracing::info!(event, ?origin, %payload, "event");
        Ok(())
    });

    let store = Store::new(bus.clone(), state_file);
    store.init();

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    tail.revoke();
    Ok(())
}
