//! Knowledge store backing handle
//!
//! A thin handle around the per-workspace SQLite database the dashboard
//! serves learnings, decisions, and session history from. The schema and
//! query surface live with the dashboard's request handlers; this handle
//! only owns the connection lifecycle so the resource container can swap
//! workspaces atomically.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::error::{PulseboardError, Result};

/// Directory under the workspace root where pulseboard keeps its data
pub const DATA_DIR: &str = ".pulseboard";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS learnings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    topic TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS decisions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    rationale TEXT,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    ended_at TEXT
);
CREATE TABLE IF NOT EXISTS activity (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    detail TEXT,
    logged_at TEXT NOT NULL
);
";

/// Row counts for the dashboard's overview widgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnowledgeCounts {
    pub learnings: usize,
    pub decisions: usize,
    pub sessions: usize,
}

/// Handle to one workspace's knowledge database.
///
/// Closing takes the connection out from under a mutex; operations after
/// close surface [`PulseboardError::ResourceClosed`] instead of panicking,
/// which is how in-flight request handlers learn a workspace switch closed
/// the handle they snapshotted.
pub struct KnowledgeStore {
    root: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl KnowledgeStore {
    /// Open (creating if needed) the knowledge database under `root`
    pub fn open(root: &Path) -> Result<Self> {
        let data_dir = root.join(DATA_DIR);
        std::fs::create_dir_all(&data_dir)?;

        let conn = Connection::open(data_dir.join("knowledge.db"))?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            root: root.to_path_buf(),
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Workspace root this store was opened for
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Row counts across the three main tables
    pub fn counts(&self) -> Result<KnowledgeCounts> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(PulseboardError::ResourceClosed {
            resource: "knowledge store",
        })?;

        let count = |table: &str| -> Result<usize> {
            let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?;
            Ok(n as usize)
        };

        Ok(KnowledgeCounts {
            learnings: count("learnings")?,
            decisions: count("decisions")?,
            sessions: count("sessions")?,
        })
    }

    /// Append a row to the activity log
    pub fn record_activity(&self, kind: &str, detail: Option<&str>) -> Result<()> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(PulseboardError::ResourceClosed {
            resource: "knowledge store",
        })?;

        conn.execute(
            "INSERT INTO activity (kind, detail, logged_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![kind, detail, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Drop the underlying connection. Idempotent.
    pub fn close(&self) {
        if self.conn.lock().take().is_some() {
            tracing::debug!("Closed knowledge store for {:?}", self.root);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }
}

impl std::fmt::Debug for KnowledgeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeStore")
            .field("root", &self.root)
            .field("closed", &self.is_closed())
            .finish()
    }
}
