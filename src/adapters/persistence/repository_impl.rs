//! Repository Implementation - Concrete Adapter for the Repository Port
//!
//! Wraps `StateStore` (atomic JSON snapshots) and `EventJournal` (JSONL
//! append-only files) into a single struct that implements the
//! `Repository` trait from `crate::ports::repository`.

use anyhow::Result;
use async_trait::async_trait;

use super::journal::EventJournal;
use super::state::StateStore;
use crate::ports::repository::{JournalEntry, RegistrySnapshot, Repository};

/// File-backed repository combining snapshots and the event journal.
pub struct RepositoryImpl {
    /// Atomic JSON state store.
    state_store: StateStore,
    /// JSONL event journal.
    journal: EventJournal,
}

impl RepositoryImpl {
    /// Create a new repository from existing store and journal instances.
    pub fn new(state_store: StateStore, journal: EventJournal) -> Self {
        Self {
            state_store,
            journal,
        }
    }

    /// Create a new repository with a data directory path.
    ///
    /// Initializes both the state store and the journal in the given
    /// directory, creating subdirectories as needed.
    pub async fn from_data_dir(data_dir: &str) -> Result<Self> {
        let state_store = StateStore::new(data_dir).await?;
        let journal = EventJournal::new(data_dir).await?;
        Ok(Self::new(state_store, journal))
    }
}

#[async_trait]
impl Repository for RepositoryImpl {
    async fn append_event(&self, entry: &JournalEntry) -> Result<()> {
        self.journal.append(entry).await
    }

    async fn load_events(&self) -> Result<Vec<JournalEntry>> {
        self.journal.load_all().await
    }

    async fn save_state(&self, snapshot: &RegistrySnapshot) -> Result<()> {
        self.state_store.save(snapshot).await
    }

    async fn load_latest_state(&self) -> Result<Option<RegistrySnapshot>> {
        self.state_store.load().await
    }

    async fn is_healthy(&self) -> bool {
        self.state_store.is_healthy().await && self.journal.is_healthy().await
    }
}
