//! JSON file checkpoint store.
//!
//! The checkpoint is a single JSON document:
//!
//! ```json
//! { "processed_repos": ["apple/swift-nio", "vapor/vapor"] }
//! ```
//!
//! Saves go to a temporary file in the same directory which is then
//! renamed over the checkpoint, so a reader (including a restarted crawl)
//! sees either the previous or the new set, never a truncated file.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use depcrawl_core::models::CrawlCheckpoint;
use depcrawl_core::store::CheckpointStore;
use tempfile::NamedTempFile;

pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CheckpointStore for JsonCheckpointStore {
    async fn load(&self) -> Result<CrawlCheckpoint> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CrawlCheckpoint::new())
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read checkpoint: {}", self.path.display())
                })
            }
        };

        serde_json::from_str(&content)
            .with_context(|| format!("Corrupt checkpoint file: {}", self.path.display()))
    }

    async fn save(&self, checkpoint: &CrawlCheckpoint) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let json = serde_json::to_vec(checkpoint)?;
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace checkpoint: {}", self.path.display()))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
