//! Pulseboard Daemon Binary
//!
//! A WebSocket server that pushes dashboard events to connected browser
//! clients and serves as the process-wide holder of the workspace-backed
//! resources.
//!
//! # Usage
//!
//! ```bash
//! pulseboard-daemon --port 9849 --workspace /path/to/project
//! pulseboard-daemon --allow-origin http://localhost:3000
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use pulseboard::hub::{Hub, HubConfig, OriginPolicy};
use pulseboard::resources::{LinkRegistry, ResourceContainer};
use pulseboard::Daemon;

/// Pulseboard dashboard daemon
#[derive(Parser, Debug)]
#[command(name = "pulseboard-daemon")]
#[command(about = "Real-time event hub for the pulseboard dashboard")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "9849")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Initial workspace root (defaults to the current directory)
    #[arg(short, long, default_value = ".")]
    workspace: String,

    /// Browser origin to allow; repeatable. Requests without an Origin
    /// header are always accepted.
    #[arg(long = "allow-origin")]
    allow_origins: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pulseboard=info".parse().unwrap())
                .add_directive("pulseboard_daemon=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let workspace = std::fs::canonicalize(&args.workspace)?;

    // Cross-workspace link registry; a failure here is degraded, not fatal
    let links = match LinkRegistry::open() {
        Ok(registry) => Some(Arc::new(registry)),
        Err(e) => {
            tracing::warn!("Link registry unavailable: {}", e);
            None
        }
    };

    let resources = Arc::new(ResourceContainer::open(&workspace, links)?);
    let snapshot = resources.snapshot();
    tracing::info!(
        "Workspace {:?} (knowledge: {}, search: {})",
        workspace,
        snapshot.knowledge.is_some(),
        snapshot.search.is_some(),
    );

    let hub = Hub::spawn(HubConfig::default());
    let daemon = Daemon::new(hub, resources, OriginPolicy::new(args.allow_origins));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Pulseboard daemon listening on ws://{}", addr);

    daemon.serve(listener).await?;
    Ok(())
}
