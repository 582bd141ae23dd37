//! File-based index: persistent JSON-lines storage.
//!
//! Each line is a JSON-encoded `IndexPoint`. Points are loaded into memory on
//! creation and the whole file is rewritten after every upsert, so reads are
//! served from memory while writes stay durable.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tof_core::context::ContextPayload;
use tof_core::error::IndexError;
use tof_core::index::{IndexFilter, IndexPoint, ScoredPayload, SearchQuery, SemanticIndex};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::vector::{rank_points, scroll_points, upsert_point};

/// A file-backed index using JSONL (one point per line).
pub struct FileIndex {
    path: PathBuf,
    points: Arc<RwLock<Vec<IndexPoint>>>,
}

impl FileIndex {
    /// Open the index at `path`.
    ///
    /// A missing file starts empty and is created on the first upsert.
    pub fn new(path: PathBuf) -> Self {
        let points = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = points.len(), "File index loaded");
        Self {
            path,
            points: Arc::new(RwLock::new(points)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Vec<IndexPoint> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<IndexPoint>(line) {
                Ok(point) => Some(point),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted index line");
                    None
                }
            })
            .collect()
    }

    fn flush(&self, points: &[IndexPoint]) -> Result<(), IndexError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| IndexError::Storage(format!("Failed to create index directory: {e}")))?;
        }

        let mut content = String::new();
        for point in points {
            let line = serde_json::to_string(point)
                .map_err(|e| IndexError::Storage(format!("Failed to serialize index point: {e}")))?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(&self.path, content)
            .map_err(|e| IndexError::Storage(format!("Failed to write index file: {e}")))
    }
}

#[async_trait]
impl SemanticIndex for FileIndex {
    fn name(&self) -> &str {
        "file"
    }

    async fn upsert(&self, point: IndexPoint) -> Result<(), IndexError> {
        let mut points = self.points.write().await;
        upsert_point(&mut points, point)?;
        self.flush(&points)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<ScoredPayload>, IndexError> {
        Ok(rank_points(&self.points.read().await, query))
    }

    async fn scroll(&self, filter: &IndexFilter, limit: usize) -> Result<Vec<ContextPayload>, IndexError> {
        Ok(scroll_points(&self.points.read().await, filter, limit))
    }

    async fn health_check(&self) -> Result<bool, IndexError> {
        Ok(true)
    }
}
