//! Repository Port - Journal and Snapshot Persistence Interface
//!
//! Defines the storage the engine is injected with. Committed events go
//! to an append-only journal; full registry images are saved as
//! snapshots. Recovery loads the latest snapshot and replays the journal
//! on top. The in-memory registries stay authoritative while the
//! process runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Market, MarketEvent, MarketId, Project, ProjectId};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: &str = "1";

/// One journal line: a committed event with its recording metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
  /// Unique entry identifier.
  pub id: Uuid,
  /// When the entry was recorded.
  pub recorded_at: DateTime<Utc>,
  /// The committed event.
  pub event: MarketEvent,
}

impl JournalEntry {
  /// Wrap an event with a fresh id and the current time.
  #[must_use]
  pub fn new(event: MarketEvent) -> Self {
    Self {
      id: Uuid::new_v4(),
      recorded_at: Utc::now(),
      event,
    }
  }
}

/// Full registry image for crash recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
  /// Version of the snapshot format.
  pub version: String,
  /// When the snapshot was taken.
  pub taken_at: DateTime<Utc>,
  /// Next market identifier the allocator will hand out.
  pub next_market_id: MarketId,
  /// Every market, including its ledger rows.
  pub markets: Vec<Market>,
  /// Next project identifier the allocator will hand out.
  pub next_project_id: ProjectId,
  /// Every project.
  pub projects: Vec<Project>,
}

/// Trait for persistence providers.
///
/// Journal writes are append-only; each line is a self-contained JSON
/// record, so a partial write can only lose the last line.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
  /// Append a committed event to the journal.
  async fn append_event(&self, entry: &JournalEntry) -> anyhow::Result<()>;

  /// Load every journal entry in recording order.
  async fn load_events(&self) -> anyhow::Result<Vec<JournalEntry>>;

  /// Save a registry snapshot.
  async fn save_state(&self, snapshot: &RegistrySnapshot) -> anyhow::Result<()>;

  /// Load the most recent registry snapshot.
  async fn load_latest_state(&self) -> anyhow::Result<Option<RegistrySnapshot>>;

  /// Check if the repository is healthy (disk space, permissions).
  async fn is_healthy(&self) -> bool;
}
