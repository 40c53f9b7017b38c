//! Search index backing handle
//!
//! Two-stage construction mirrors how the dashboard consumes the index: an
//! [`IndexReader`] opens the on-disk index manifest for a workspace, and a
//! [`SearchIndex`] wraps it with a grep-based query engine. If engine
//! construction fails after the reader opened, the reader is closed before
//! the error is returned so a failed workspace switch never leaks a handle.
//!
//! Searches respect `.gitignore` via the `ignore` crate and cap their result
//! count; the index internals themselves are out of scope here.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use grep_regex::RegexMatcher;
use grep_searcher::sinks::UTF8;
use grep_searcher::{BinaryDetection, SearcherBuilder};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{PulseboardError, Result};
use crate::resources::knowledge::DATA_DIR;

/// Manifest format version this build understands
const MANIFEST_VERSION: u32 = 1;

/// On-disk index manifest at `<root>/.pulseboard/index.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub version: u32,
    pub files: usize,
    pub indexed_at: String,
}

/// Reader over one workspace's on-disk index
#[derive(Debug)]
pub struct IndexReader {
    root: PathBuf,
    manifest: Option<IndexManifest>,
    closed: AtomicBool,
}

impl IndexReader {
    /// Open the index for `root`. A missing manifest is not an error; the
    /// engine falls back to live grep over the tree.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(PulseboardError::WorkspaceNotFound {
                path: root.display().to_string(),
            });
        }

        let manifest_path = root.join(DATA_DIR).join("index.json");
        let manifest = if manifest_path.exists() {
            let raw = std::fs::read_to_string(&manifest_path)?;
            match serde_json::from_str::<IndexManifest>(&raw) {
                Ok(m) => Some(m),
                Err(e) => {
                    tracing::warn!("Unreadable index manifest at {:?}: {}", manifest_path, e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            root: root.to_path_buf(),
            manifest,
            closed: AtomicBool::new(false),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> Option<&IndexManifest> {
        self.manifest.as_ref()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// One line matched by a search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub path: PathBuf,
    pub line: u64,
    pub text: String,
}

/// Query engine over an [`IndexReader`]
#[derive(Debug)]
pub struct SearchIndex {
    reader: IndexReader,
}

impl SearchIndex {
    /// Build the engine around an opened reader. On failure the reader is
    /// closed before returning.
    pub fn new(reader: IndexReader) -> Result<Self> {
        if let Some(manifest) = reader.manifest() {
            if manifest.version > MANIFEST_VERSION {
                let version = manifest.version;
                reader.close();
                return Err(PulseboardError::IndexUnavailable {
                    message: format!(
                        "manifest version {} is newer than supported version {}",
                        version, MANIFEST_VERSION
                    ),
                });
            }
        }
        Ok(Self { reader })
    }

    /// Open the reader and build the engine in one step
    pub fn open(root: &Path) -> Result<Self> {
        Self::new(IndexReader::open(root)?)
    }

    pub fn root(&self) -> &Path {
        self.reader.root()
    }

    /// Grep the workspace tree for `pattern`, returning up to `limit` hits
    pub fn search(&self, pattern: &str, limit: usize) -> Result<Vec<SearchHit>> {
        if self.is_closed() {
            return Err(PulseboardError::ResourceClosed {
                resource: "search index",
            });
        }

        let matcher = RegexMatcher::new(pattern).map_err(|e| PulseboardError::Search {
            message: e.to_string(),
        })?;
        let mut searcher = SearcherBuilder::new()
            .binary_detection(BinaryDetection::quit(b'\x00'))
            .line_number(true)
            .build();

        let mut hits = Vec::new();
        for entry in WalkBuilder::new(self.reader.root()).build() {
            if hits.len() >= limit {
                break;
            }
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if !entry.file_type().map_or(false, |t| t.is_file()) {
                continue;
            }

            let result = searcher.search_path(
                &matcher,
                entry.path(),
                UTF8(|line, text| {
                    hits.push(SearchHit {
                        path: entry.path().to_path_buf(),
                        line,
                        text: text.trim_end().to_string(),
                    });
                    Ok(hits.len() < limit)
                }),
            );
            if let Err(e) = result {
                tracing::debug!("Skipping unsearchable file {:?}: {}", entry.path(), e);
            }
        }

        Ok(hits)
    }

    pub fn close(&self) {
        self.reader.close();
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_open_without_manifest() {
        let dir = TempDir::new().unwrap();
        let index = SearchIndex::open(dir.path()).unwrap();
        assert!(!index.is_closed());
    }

    #[test]
    fn test_search_finds_lines() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("notes.txt"),
            "first line\nsecond needle line\nthird line\n",
        )
        .unwrap();

        let index = SearchIndex::open(dir.path()).unwrap();
        let hits = index.search("needle", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].line, 2);
        assert!(hits[0].text.contains("needle"));
    }

    #[test]
    fn test_search_respects_limit() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "hit\nhit\nhit\nhit\n").unwrap();

        let index = SearchIndex::open(dir.path()).unwrap();
        let hits = index.search("hit", 2).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_closed_index_errors() {
        let dir = TempDir::new().unwrap();
        let index = SearchIndex::open(dir.path()).unwrap();
        index.close();

        let err = index.search("anything", 10).unwrap_err();
        assert!(matches!(err, PulseboardError::ResourceClosed { .. }));
    }

    #[test]
    fn test_unsupported_manifest_closes_reader() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join(DATA_DIR);
        fs::create_dir_all(&data_dir).unwrap();
        fs::write(
            data_dir.join("index.json"),
            r#"{"version": 99, "files": 0, "indexed_at": "2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let reader = IndexReader::open(dir.path()).unwrap();
        let err = SearchIndex::new(reader).unwrap_err();
        assert!(matches!(err, PulseboardError::IndexUnavailable { .. }));
    }

    #[test]
    fn test_valid_manifest_loads() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join(DATA_DIR);
        fs::create_dir_all(&data_dir).unwrap();
        fs::write(
            data_dir.join("index.json"),
            r#"{"version": 1, "files": 12, "indexed_at": "2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let reader = IndexReader::open(dir.path()).unwrap();
        assert_eq!(reader.manifest().unwrap().files, 12);
        let _index = SearchIndex::new(reader).unwrap();
    }
}
