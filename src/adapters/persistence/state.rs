//! State Store - Atomic JSON Registry Snapshots
//!
//! Saves registry snapshots to `state.json` using atomic writes
//! (write to tmp file, then rename). The file is always either the old
//! or the new version, never a partial write.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{info, instrument};

use crate::ports::repository::RegistrySnapshot;

/// Atomic JSON snapshot store for crash recovery.
pub struct StateStore {
    /// Path to state.json.
    state_path: PathBuf,
    /// Temporary path for atomic writes.
    tmp_path: PathBuf,
}

impl StateStore {
    /// Create a new state store in the given data directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub async fn new(data_dir: &str) -> Result<Self> {
        let dir = Path::new(data_dir);
        fs::create_dir_all(dir)
            .await
            .context("Failed to create data directory")?;

        Ok(Self {
            state_path: dir.join("state.json"),
            tmp_path: dir.join("state.json.tmp"),
        })
    }

    /// Save a snapshot atomically (tmp → rename).
    #[instrument(skip(self, snapshot))]
    pub async fn save(&self, snapshot: &RegistrySnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)
            .context("Failed to serialize snapshot")?;

        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp state file")?;

        fs::rename(&self.tmp_path, &self.state_path)
            .await
            .context("Failed to rename state file")?;

        info!(
            path = %self.state_path.display(),
            markets = snapshot.markets.len(),
            projects = snapshot.projects.len(),
            "State snapshot saved"
        );

        Ok(())
    }

    /// Load the most recent snapshot.
    ///
    /// Returns `None` if no state file exists (first startup).
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Option<RegistrySnapshot>> {
        if !fs::try_exists(&self.state_path).await.unwrap_or(false) {
            info!("No state file found, starting fresh");
            return Ok(None);
        }

        let json = fs::read_to_string(&self.state_path)
            .await
            .context("Failed to read state file")?;

        let snapshot: RegistrySnapshot =
            serde_json::from_str(&json).context("Failed to parse state JSON")?;

        info!(
            version = %snapshot.version,
            taken_at = %snapshot.taken_at,
            markets = snapshot.markets.len(),
            "State snapshot loaded"
        );

        Ok(Some(snapshot))
    }

    /// Check if the state file, when present, is readable.
    pub async fn is_healthy(&self) -> bool {
        match fs::try_exists(&self.state_path).await {
            Ok(false) => true, // First run is OK
            Ok(true) => fs::metadata(&self.state_path).await.is_ok(),
            Err(_) => false,
        }
    }
}
