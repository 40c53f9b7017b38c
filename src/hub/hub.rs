//! Hub coordinating task
//!
//! The hub is the single authority over "who is currently listening" and
//! "deliver this event to everyone currently listening". The live set is
//! mutated only by one coordinating task that serially drains three
//! submission channels (register, unregister, broadcast); external callers
//! never touch the set directly. A lock is retained only for
//! [`HubHandle::client_count`], the one read path not funneled through the
//! coordinating task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::hub::event::{Event, EventKind};

/// Capacity of each endpoint's outbound mailbox
pub const MAILBOX_CAPACITY: usize = 256;

/// Interval between application-level heartbeat events
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Hub configuration
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// How often the hub synthesizes a heartbeat event
    pub heartbeat_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }
}

/// One registered endpoint, as seen by the hub: an id plus the sending half
/// of its bounded mailbox. The connection owns the receiving half.
#[derive(Debug)]
pub struct EndpointHandle {
    pub id: String,
    pub mailbox: mpsc::Sender<String>,
}

/// Cloneable external face of the hub. All methods only submit onto the
/// coordinating task's channels and never block.
#[derive(Debug, Clone)]
pub struct HubHandle {
    register_tx: mpsc::UnboundedSender<EndpointHandle>,
    unregister_tx: mpsc::UnboundedSender<String>,
    broadcast_tx: mpsc::UnboundedSender<Event>,
    client_count: Arc<RwLock<usize>>,
}

impl HubHandle {
    /// Add an endpoint to the live set
    pub fn register(&self, endpoint: EndpointHandle) {
        let _ = self.register_tx.send(endpoint);
    }

    /// Remove an endpoint from the live set and close its mailbox.
    /// A no-op if the endpoint was already removed.
    pub fn unregister(&self, id: &str) {
        let _ = self.unregister_tx.send(id.to_string());
    }

    /// Deliver an event to every registered endpoint. The timestamp is
    /// stamped when the coordinating task processes the submission; any
    /// caller-supplied timestamp is ignored.
    pub fn broadcast(&self, kind: EventKind, payload: Option<serde_json::Value>) {
        let _ = self.broadcast_tx.send(Event::new(kind, payload));
    }

    /// Number of currently registered endpoints. Safe to call from any
    /// thread concurrently with register/unregister/broadcast.
    pub fn client_count(&self) -> usize {
        *self.client_count.read()
    }
}

/// The coordinating task's private state
pub struct Hub {
    endpoints: HashMap<String, mpsc::Sender<String>>,
    client_count: Arc<RwLock<usize>>,
}

impl Hub {
    /// Spawn the coordinating task and return its handle
    pub fn spawn(config: HubConfig) -> HubHandle {
        let (register_tx, register_rx) = mpsc::unbounded_channel();
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();
        let client_count = Arc::new(RwLock::new(0));

        let hub = Hub {
            endpoints: HashMap::new(),
            client_count: Arc::clone(&client_count),
        };

        tokio::spawn(hub.run(config, register_rx, unregister_rx, broadcast_rx));

        HubHandle {
            register_tx,
            unregister_tx,
            broadcast_tx,
            client_count,
        }
    }

    async fn run(
        mut self,
        config: HubConfig,
        mut register_rx: mpsc::UnboundedReceiver<EndpointHandle>,
        mut unregister_rx: mpsc::UnboundedReceiver<String>,
        mut broadcast_rx: mpsc::UnboundedReceiver<Event>,
    ) {
        // First heartbeat one full interval after startup, not immediately
        let start = tokio::time::Instant::now() + config.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(start, config.heartbeat_interval);

        loop {
            tokio::select! {
                reg = register_rx.recv() => match reg {
                    Some(endpoint) => self.handle_register(endpoint),
                    // All handles dropped; the other channels are closed too
                    None => break,
                },
                id = unregister_rx.recv() => match id {
                    Some(id) => self.handle_unregister(&id),
                    None => break,
                },
                event = broadcast_rx.recv() => match event {
                    Some(event) => self.fan_out(event),
                    None => break,
                },
                _ = heartbeat.tick() => {
                    self.fan_out(Event::new(EventKind::Heartbeat, None));
                }
            }
        }

        tracing::debug!("Hub coordinating task shutting down");
    }

    fn handle_register(&mut self, endpoint: EndpointHandle) {
        tracing::info!("Registered connection {}", endpoint.id);
        self.endpoints.insert(endpoint.id, endpoint.mailbox);
        self.publish_count();
    }

    fn handle_unregister(&mut self, id: &str) {
        // Dropping the sender closes the mailbox; the writer loop sees the
        // close and sends the Close frame
        if self.endpoints.remove(id).is_some() {
            tracing::info!("Unregistered connection {}", id);
            self.publish_count();
        }
    }

    /// Stamp, serialize once, and enqueue onto every live mailbox. A full
    /// mailbox means the client is unresponsive: it is dropped immediately
    /// rather than blocking delivery to the others.
    fn fan_out(&mut self, mut event: Event) {
        if self.endpoints.is_empty() {
            return;
        }

        event.stamp();
        let frame = event.to_frame();

        let mut dropped: Vec<String> = Vec::new();
        for (id, mailbox) in &self.endpoints {
            match mailbox.try_send(frame.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!("Connection {} mailbox full, dropping endpoint", id);
                    dropped.push(id.clone());
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("Connection {} mailbox closed, dropping endpoint", id);
                    dropped.push(id.clone());
                }
            }
        }

        if !dropped.is_empty() {
            for id in &dropped {
                self.endpoints.remove(id);
            }
            self.publish_count();
        }
    }

    fn publish_count(&self) {
        *self.client_count.write() = self.endpoints.len();
    }
}
