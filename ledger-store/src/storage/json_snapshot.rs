use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use super::traits::{LedgerSnapshot, SnapshotStore};

/// Snapshot kept as a single JSON document on disk
#[derive(Debug, Clone)]
pub struct JsonFileSnapshotStore {
    path: PathBuf,
}

impl JsonFileSnapshotStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for JsonFileSnapshotStore {
    async fn load(&self) -> Result<Option<LedgerSnapshot>> {
        if !fs::try_exists(&self.path).await? {
            debug!("No snapshot at {}", self.path.display());
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read snapshot {}", self.path.display()))?;
        let snapshot: LedgerSnapshot = serde_json::from_str(&contents)
            .with_context(|| format!("Snapshot {} is corrupt", self.path.display()))?;

        info!(
            "Loaded snapshot from {} ({} transactions, {} categories, saved {})",
            self.path.display(),
            snapshot.transactions.len(),
            snapshot.categories.len(),
            snapshot.saved_at
        );
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        // Write beside the target and rename so a crash never leaves half a file
        let contents = serde_json::to_string_pretty(snapshot)?;
        let temp_path = self.temp_path();
        fs::write(&temp_path, contents)
            .await
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!("Saved snapshot to {}", self.path.display());
        Ok(())
    }
}
