//! In-memory Repository - Process-local Storage
//!
//! Keeps the journal and the latest snapshot in memory. Used by the
//! `memory` storage backend and by tests.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::ports::repository::{JournalEntry, RegistrySnapshot, Repository};

/// Repository that never touches the disk.
#[derive(Default)]
pub struct InMemoryRepository {
    events: RwLock<Vec<JournalEntry>>,
    latest: RwLock<Option<RegistrySnapshot>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of journaled entries.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.read().len()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn append_event(&self, entry: &JournalEntry) -> Result<()> {
        self.events.write().push(entry.clone());
        Ok(())
    }

    async fn load_events(&self) -> Result<Vec<JournalEntry>> {
        Ok(self.events.read().clone())
    }

    async fn save_state(&self, snapshot: &RegistrySnapshot) -> Result<()> {
        *self.latest.write() = Some(snapshot.clone());
        Ok(())
    }

    async fn load_latest_state(&self) -> Result<Option<RegistrySnapshot>> {
        Ok(self.latest.read().clone())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
