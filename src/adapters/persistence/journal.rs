//! Event Journal - Append-only JSONL Event Records
//!
//! Persists committed events to daily JSONL files in the format
//! `journal/YYYY-MM-DD.jsonl`. Each line is a self-contained JSON
//! record, so a torn write can only lose the last line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::ports::repository::JournalEntry;

/// Append-only JSONL event journal with daily file rotation.
///
/// Appends are serialized through a mutex, so lines within a file
/// appear in the order the appends were issued.
pub struct EventJournal {
    /// Directory holding the daily journal files.
    journal_dir: PathBuf,
    /// Serializes appends.
    write_lock: Mutex<()>,
}

impl EventJournal {
    /// Create a journal in the given data directory.
    pub async fn new(data_dir: &str) -> Result<Self> {
        let journal_dir = Path::new(data_dir).join("journal");

        fs::create_dir_all(&journal_dir)
            .await
            .context("Failed to create journal directory")?;

        Ok(Self {
            journal_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Append an entry to today's JSONL file.
    #[instrument(skip(self, entry), fields(entry_id = %entry.id, event = entry.event.name()))]
    pub async fn append(&self, entry: &JournalEntry) -> Result<()> {
        let date = Utc::now().format("%Y-%m-%d").to_string();
        let path = self.journal_dir.join(format!("{date}.jsonl"));

        let mut json = serde_json::to_string(entry)
            .context("Failed to serialize journal entry")?;
        json.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context("Failed to open journal file")?;

        file.write_all(json.as_bytes())
            .await
            .context("Failed to write journal entry")?;

        file.flush().await.context("Failed to flush journal")?;

        Ok(())
    }

    /// Load every entry, oldest file first, in append order.
    ///
    /// Malformed lines are skipped with a warning.
    #[instrument(skip(self))]
    pub async fn load_all(&self) -> Result<Vec<JournalEntry>> {
        let mut files = Vec::new();
        let mut dir = fs::read_dir(&self.journal_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "jsonl") {
                files.push(path);
            }
        }
        // YYYY-MM-DD names sort chronologically
        files.sort();

        let mut entries = Vec::new();
        for path in files {
            let content = fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            for line in content.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<JournalEntry>(line) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => {
                        warn!(
                            file = %path.display(),
                            error = %e,
                            "Skipping malformed journal entry"
                        );
                    }
                }
            }
        }

        info!(count = entries.len(), "Loaded journal entries");
        Ok(entries)
    }

    /// Check if the journal directory is writable.
    pub async fn is_healthy(&self) -> bool {
        let test_path = self.journal_dir.join(".health_check");
        let result = fs::write(&test_path, b"ok").await;
        let _ = fs::remove_file(&test_path).await;
        result.is_ok()
    }
}
