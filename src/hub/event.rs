//! Dashboard event model
//!
//! An [`Event`] is an immutable notification: a kind tag, an optional
//! kind-specific payload, and a timestamp. The timestamp is stamped by the
//! hub at broadcast time and overrides anything the caller supplied, so it
//! always reflects actual send time.

use serde::{Deserialize, Serialize};

/// Kind tag for a dashboard event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SessionStarted,
    SessionEnded,
    LearningAdded,
    DecisionAdded,
    IdeaAdded,
    ScanStarted,
    ScanCompleted,
    ConflictDetected,
    ContradictionDetected,
    WorkspaceChanged,
    ActivityLogged,
    Heartbeat,
}

impl EventKind {
    /// Wire-format tag for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SessionStarted => "session_started",
            EventKind::SessionEnded => "session_ended",
            EventKind::LearningAdded => "learning_added",
            EventKind::DecisionAdded => "decision_added",
            EventKind::IdeaAdded => "idea_added",
            EventKind::ScanStarted => "scan_started",
            EventKind::ScanCompleted => "scan_completed",
            EventKind::ConflictDetected => "conflict_detected",
            EventKind::ContradictionDetected => "contradiction_detected",
            EventKind::WorkspaceChanged => "workspace_changed",
            EventKind::ActivityLogged => "activity_logged",
            EventKind::Heartbeat => "heartbeat",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single dashboard notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// Kind-specific payload; absent for events like heartbeat
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    /// RFC 3339 send time, set by the hub at broadcast time
    #[serde(default)]
    pub timestamp: String,
}

impl Event {
    /// Create an event with an empty timestamp; the hub stamps it on broadcast
    pub fn new(kind: EventKind, payload: Option<serde_json::Value>) -> Self {
        Self {
            kind,
            payload,
            timestamp: String::new(),
        }
    }

    /// Overwrite the timestamp with the current time
    pub fn stamp(&mut self) {
        self.timestamp = chrono::Utc::now().to_rfc3339();
    }

    /// Serialize to a single wire frame
    pub fn to_frame(&self) -> String {
        // Events only contain JSON-safe values, serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}
