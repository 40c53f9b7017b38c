//! Cross-workspace link registry backing handle
//!
//! Links relate workspaces to each other ("this repo implements the design
//! discussed in that one"). They span workspace roots, so the registry lives
//! in the user data directory rather than under any single workspace and is
//! left untouched by a workspace switch.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{PulseboardError, Result};

/// One directed link between two workspaces
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceLink {
    pub from_workspace: String,
    pub to_workspace: String,
    pub reason: String,
    pub created_at: String,
}

/// Handle to the shared link registry file
pub struct LinkRegistry {
    path: PathBuf,
    links: Mutex<Option<Vec<WorkspaceLink>>>,
}

impl LinkRegistry {
    /// Open the registry at the default per-user location
    pub fn open() -> Result<Self> {
        let base = dirs::data_dir().ok_or_else(|| {
            PulseboardError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no user data directory",
            ))
        })?;
        Self::open_at(&base.join("pulseboard").join("links.json"))
    }

    /// Open the registry at an explicit path
    pub fn open_at(path: &Path) -> Result<Self> {
        let links = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw)?
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Vec::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            links: Mutex::new(Some(links)),
        })
    }

    /// Append a link and persist the registry
    pub fn add_link(&self, link: WorkspaceLink) -> Result<()> {
        let mut guard = self.links.lock();
        let links = guard.as_mut().ok_or(PulseboardError::ResourceClosed {
            resource: "link registry",
        })?;

        links.push(link);
        let raw = serde_json::to_string_pretty(&links)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    /// All links touching the given workspace root, in either direction
    pub fn links_for(&self, root: &Path) -> Result<Vec<WorkspaceLink>> {
        let guard = self.links.lock();
        let links = guard.as_ref().ok_or(PulseboardError::ResourceClosed {
            resource: "link registry",
        })?;

        let root = root.display().to_string();
        Ok(links
            .iter()
            .filter(|l| l.from_workspace == root || l.to_workspace == root)
            .cloned()
            .collect())
    }

    /// Drop the in-memory view. Idempotent; the file stays on disk.
    pub fn close(&self) {
        self.links.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.links.lock().is_none()
    }
}

impl std::fmt::Debug for LinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkRegistry")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_link(from: &str, to: &str) -> WorkspaceLink {
        WorkspaceLink {
            from_workspace: from.to_string(),
            to_workspace: to.to_string(),
            reason: "shared design".to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("links.json");

        let registry = LinkRegistry::open_at(&path).unwrap();
        registry.add_link(sample_link("/a", "/b")).unwrap();
        registry.add_link(sample_link("/b", "/c")).unwrap();

        // Reopen from disk
        let reopened = LinkRegistry::open_at(&path).unwrap();
        let for_b = reopened.links_for(Path::new("/b")).unwrap();
        assert_eq!(for_b.len(), 2);

        let for_a = reopened.links_for(Path::new("/a")).unwrap();
        assert_eq!(for_a.len(), 1);
        assert_eq!(for_a[0].to_workspace, "/b");
    }

    #[test]
    fn test_closed_registry_errors() {
        let dir = TempDir::new().unwrap();
        let registry = LinkRegistry::open_at(&dir.path().join("links.json")).unwrap();

        registry.close();
        let err = registry.add_link(sample_link("/a", "/b")).unwrap_err();
        assert!(matches!(err, PulseboardError::ResourceClosed { .. }));
    }
}
