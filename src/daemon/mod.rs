//! Daemon glue: hub + resource container behind one TCP listener
//!
//! [`Daemon`] owns the hub handle, the resource container, and the origin
//! policy. It accepts TCP connections and hands each one to the WebSocket
//! connection handler; everything else in the process reaches the hub and
//! the resources through this struct.

use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::error::Result;
use crate::hub::{handle_connection, EventKind, HubHandle, OriginPolicy};
use crate::resources::{ResourceContainer, ResourceSnapshot, SwitchOutcome};

pub struct Daemon {
    hub: HubHandle,
    resources: Arc<ResourceContainer>,
    policy: Arc<OriginPolicy>,
}

impl Daemon {
    pub fn new(hub: HubHandle, resources: Arc<ResourceContainer>, policy: OriginPolicy) -> Self {
        Self {
            hub,
            resources,
            policy: Arc::new(policy),
        }
    }

    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    pub fn resources(&self) -> &Arc<ResourceContainer> {
        &self.resources
    }

    /// Read-snapshot of the backing resources for a request handler
    pub fn snapshot(&self) -> ResourceSnapshot {
        self.resources.snapshot()
    }

    /// Switch the active workspace and, on an actual switch, notify every
    /// connected client. Which resources survived the switch is discovered
    /// by re-querying [`Daemon::snapshot`].
    pub fn switch_workspace(&self, new_root: &Path) -> Result<SwitchOutcome> {
        let outcome = self.resources.switch_workspace(new_root)?;
        if outcome == SwitchOutcome::Switched {
            self.hub.broadcast(
                EventKind::WorkspaceChanged,
                Some(serde_json::json!({
                    "root": new_root.display().to_string(),
                })),
            );
        }
        Ok(outcome)
    }

    /// Accept loop: one task per connection, accept errors are logged and
    /// the loop keeps going
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    tracing::info!("Accepted connection from {}", addr);
                    let hub = self.hub.clone();
                    let policy = Arc::clone(&self.policy);
                    tokio::spawn(async move {
                        handle_connection(stream, hub, policy).await;
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
