//! Local snapshot used while the backend is unreachable

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::state::Timer;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Full timer list stored as a JSON file.
///
/// This is a best-effort fallback: it is written when a backend write fails
/// and read when the startup load fails, and is never merged back into the
/// backend.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved list. A missing file is an empty list.
    pub async fn load(&self) -> Result<Vec<Timer>, SnapshotError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let timers: Vec<Timer> = serde_json::from_slice(&bytes)?;
        debug!(path = %self.path.display(), count = timers.len(), "snapshot loaded");
        Ok(timers)
    }

    /// Overwrite the snapshot with `timers`.
    pub async fn save(&self, timers: &[Timer]) -> Result<(), SnapshotError> {
        let json = serde_json::to_vec_pretty(timers)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), count = timers.len(), "snapshot saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("timers.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("timers.json"));
        let timers = vec![
            Timer::new("Tea", 30).unwrap(),
            Timer::new("Pasta", 600).unwrap(),
        ];

        store.save(&timers).await.unwrap();
        assert_eq!(store.load().await.unwrap(), timers);
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timers.json");
        std::fs::write(&path, b"not json").unwrap();

        let store = SnapshotStore::new(path);
        assert!(matches!(store.load().await, Err(SnapshotError::Json(_))));
    }
}
