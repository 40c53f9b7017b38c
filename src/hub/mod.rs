//! Pulseboard event hub
//!
//! A WebSocket fan-out layer for the dashboard. Application code anywhere in
//! the process submits events through a [`HubHandle`]; one coordinating task
//! owns the set of live connections and delivers each event to every
//! registered client mailbox.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        HUB (one task)                        │
//! │                                                              │
//! │  register ──┐                                                │
//! │  unregister ┼──► live set: conn_id ──► mailbox (bounded 256) │
//! │  broadcast ─┘                │                               │
//! │                              ▼                               │
//! │            per-connection writer/reader loops                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! All mutations of the live set happen on the coordinating task; external
//! callers only submit onto its three channels. A slow client whose mailbox
//! fills up is dropped immediately so broadcast never blocks.
//!
//! # Wire format
//!
//! Events are serialized once per broadcast and delivered as JSON text
//! frames, newline-joined when several are pending for one client:
//!
//! ```json
//! {"type":"learning_added","payload":{...},"timestamp":"2026-08-30T12:00:00Z"}
//! ```

pub mod connection;
pub mod event;
#[allow(clippy::module_inception)]
pub mod hub;

pub use connection::{
    handle_connection, handle_connection_with_timings, ConnectionTimings, OriginPolicy,
};
pub use event::{Event, EventKind};
pub use hub::{EndpointHandle, Hub, HubConfig, HubHandle, MAILBOX_CAPACITY};
