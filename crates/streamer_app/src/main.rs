//! # streamer: entity streaming server
//!
//! Keeps each entity class within its visible quota by materializing only
//! what connected observers are nearest to.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (`--config`, defaults otherwise).
//! 2. Build one allocator per class and seed the configured placements.
//! 3. Start the scheduler.
//! 4. Connect to NATS (`--nats-url`, then `NATS_URL`, then
//!    `nats://localhost:4222`) and apply observer and lifecycle messages
//!    until Ctrl-C or the connection closes.

mod config;
mod observers;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use streamer_core::InMemoryWorld;
use streamer_net::NatsConnection;
use streamer_net::connection::resolve_url;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use server::StreamerServer;

#[derive(Parser)]
#[command(name = "streamer", about = "Entity visibility streaming server")]
struct Args {
    /// Path to a JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// NATS server URL (overrides NATS_URL)
    #[arg(short, long)]
    nats_url: Option<String>,

    /// Run without NATS ingress; observers never change
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("streamer=info".parse()?))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };
    info!(
        tick_interval_ms = config.tick_interval_ms,
        classes = config.classes.len(),
        placements = config.placements.len(),
        "configuration ready"
    );

    let world = Arc::new(InMemoryWorld::new());
    let server = StreamerServer::build(&config, world.clone())?;
    server.seed(&config.placements);
    let scheduler_task = server.start()?;

    if args.offline {
        info!("offline mode, waiting for Ctrl-C");
        tokio::signal::ctrl_c().await?;
    } else {
        let conn = NatsConnection::connect_to(&resolve_url(args.nats_url.as_deref())).await?;
        let mut ingress = conn.ingress().await?;

        loop {
            tokio::select! {
                message = ingress.next() => match message {
                    Some(message) => server.apply(message),
                    None => {
                        warn!("NATS ingress closed");
                        break;
                    }
                },
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    break;
                }
            }
        }
    }

    info!("shutting down");
    server.shutdown();
    scheduler_task.await?;

    let (created, destroyed) = world.totals();
    info!(created, destroyed, "entity streamer stopped");
    Ok(())
}
