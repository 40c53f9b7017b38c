//! Exchangeable backing resources for the dashboard
//!
//! The [`ResourceContainer`] holds the three backing handles the dashboard
//! serves from (search index, knowledge store, link registry) plus the
//! active workspace root, behind a read-write lock. Request handlers take a
//! [`ResourceSnapshot`] (a pointer copy made under the read lock, released
//! immediately) and do all I/O against the copies; a workspace switch holds
//! the write lock only for the instant needed to swap the handles.
//!
//! The switch follows open-new-before-close-old: new resources are opened
//! outside any lock, each best-effort, so a reader never observes a
//! half-initialized container and a failed switch never destroys a working
//! workspace.
//!
//! A snapshot taken just before a switch may still reference a handle the
//! switch closes. There is no quiescence wait; closed handles return
//! `ResourceClosed` errors, which handlers surface as "service unavailable".

pub mod knowledge;
pub mod links;
pub mod search;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{PulseboardError, Result};

pub use knowledge::{KnowledgeCounts, KnowledgeStore};
pub use links::{LinkRegistry, WorkspaceLink};
pub use search::{IndexManifest, IndexReader, SearchHit, SearchIndex};

/// Result of a workspace switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The container now points at the requested root
    Switched,
    /// The requested root was already active; nothing was touched
    AlreadyActive,
}

/// Point-in-time copy of the container's handles. Cloning the Arcs under
/// the read lock is the whole point: all actual I/O happens on the copies,
/// with no lock held.
#[derive(Debug, Clone)]
pub struct ResourceSnapshot {
    pub search: Option<Arc<SearchIndex>>,
    pub knowledge: Option<Arc<KnowledgeStore>>,
    pub links: Option<Arc<LinkRegistry>>,
    pub root: PathBuf,
}

struct WorkspaceResources {
    search: Option<Arc<SearchIndex>>,
    knowledge: Option<Arc<KnowledgeStore>>,
    links: Option<Arc<LinkRegistry>>,
    root: PathBuf,
}

/// Lock-protected holder of the exchangeable backing handles
pub struct ResourceContainer {
    inner: RwLock<WorkspaceResources>,
}

impl ResourceContainer {
    /// Open the container for an initial workspace. Per-workspace resources
    /// that fail to open leave their slot empty (degraded), matching switch
    /// semantics; the link registry is cross-workspace and passed in.
    pub fn open(root: &Path, links: Option<Arc<LinkRegistry>>) -> Result<Self> {
        validate_root(root)?;
        let (search, knowledge) = open_workspace(root);

        Ok(Self {
            inner: RwLock::new(WorkspaceResources {
                search,
                knowledge,
                links,
                root: root.to_path_buf(),
            }),
        })
    }

    /// Copy the handles and root out from under the read lock
    pub fn snapshot(&self) -> ResourceSnapshot {
        let guard = self.inner.read();
        ResourceSnapshot {
            search: guard.search.clone(),
            knowledge: guard.knowledge.clone(),
            links: guard.links.clone(),
            root: guard.root.clone(),
        }
    }

    /// Active workspace root
    pub fn root(&self) -> PathBuf {
        self.inner.read().root.clone()
    }

    /// Atomically repoint the container at `new_root`.
    ///
    /// New resources are opened before any lock is taken; each open is
    /// independently best-effort and a failure degrades that slot to `None`
    /// rather than aborting the switch. The write lock covers only closing
    /// the old handles and installing the new triple.
    pub fn switch_workspace(&self, new_root: &Path) -> Result<SwitchOutcome> {
        validate_root(new_root)?;

        if self.inner.read().root == new_root {
            tracing::info!("Already on workspace {:?}", new_root);
            return Ok(SwitchOutcome::AlreadyActive);
        }

        let (search, knowledge) = open_workspace(new_root);

        {
            let mut guard = self.inner.write();
            if let Some(old) = guard.knowledge.take() {
                old.close();
            }
            if let Some(old) = guard.search.take() {
                old.close();
            }
            guard.knowledge = knowledge;
            guard.search = search;
            guard.root = new_root.to_path_buf();
        }

        tracing::info!("Switched workspace to {:?}", new_root);
        Ok(SwitchOutcome::Switched)
    }
}

fn validate_root(root: &Path) -> Result<()> {
    if !root.is_absolute() {
        return Err(PulseboardError::WorkspaceNotAbsolute {
            path: root.display().to_string(),
        });
    }
    if !root.is_dir() {
        return Err(PulseboardError::WorkspaceNotFound {
            path: root.display().to_string(),
        });
    }
    Ok(())
}

/// Best-effort open of the per-workspace resources. Each failure is logged
/// and degrades that slot only; the other open still proceeds.
fn open_workspace(root: &Path) -> (Option<Arc<SearchIndex>>, Option<Arc<KnowledgeStore>>) {
    let knowledge = match KnowledgeStore::open(root) {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            tracing::warn!("Knowledge store unavailable for {:?}: {}", root, e);
            None
        }
    };

    // SearchIndex::new closes the reader itself if engine construction fails
    let search = match SearchIndex::open(root) {
        Ok(index) => Some(Arc::new(index)),
        Err(e) => {
            tracing::warn!("Search index unavailable for {:?}: {}", root, e);
            None
        }
    };

    (search, knowledge)
}
