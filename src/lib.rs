//! Pulseboard: real-time notification hub and live-resource layer for a
//! local developer dashboard.
//!
//! The crate has two halves:
//!
//! - The [`hub`] module distributes server-side events (new session, new
//!   learning, scan completed, ...) to every connected dashboard client over
//!   WebSocket, with bounded per-client mailboxes and hard-drop backpressure.
//! - The [`resources`] module holds the three exchangeable backing handles the
//!   dashboard serves from (search index, knowledge store, workspace link
//!   registry) behind a read-write lock, so the active workspace can be
//!   switched while requests are in flight.
//!
//! The `pulseboard-daemon` binary wires both together behind a single TCP
//! listener.
//!
//! # Example
//!
//! ```ignore
//! use pulseboard::hub::{Hub, HubConfig, EventKind};
//!
//! let hub = Hub::spawn(HubConfig::default());
//! hub.broadcast(EventKind::LearningAdded, Some(serde_json::json!({
//!     "topic": "error handling",
//! })));
//! ```

pub mod daemon;
pub mod error;
pub mod hub;
pub mod resources;

// Re-export commonly used types
pub use daemon::Daemon;
pub use error::{PulseboardError, Result};
pub use hub::{Event, EventKind, Hub, HubConfig, HubHandle, OriginPolicy};
pub use resources::{
    KnowledgeStore, LinkRegistry, ResourceContainer, ResourceSnapshot, SearchIndex, SwitchOutcome,
    WorkspaceLink,
};
