//! Crash Recovery - Snapshot Plus Journal Replay
//!
//! Snapshots are periodic; whatever committed after the last one lives
//! only in the journal. Recovery starts from the snapshot (or from
//! nothing) and replays the journal on top, market by market in revision
//! order. Events a market already reflects are skipped, so replaying the
//! whole journal over any snapshot lands on the last journaled state.

use std::collections::BTreeMap;

use tracing::warn;

use crate::domain::{Market, MarketEvent, MarketId, Project, ProjectId};
use crate::ports::repository::{JournalEntry, RegistrySnapshot};

/// Registry contents rebuilt from a snapshot and the journal.
#[derive(Debug, Default)]
pub struct RecoveredState {
  pub next_market_id: MarketId,
  pub markets: Vec<Market>,
  pub next_project_id: ProjectId,
  pub projects: Vec<Project>,
  /// Journal entries applied on top of the snapshot.
  pub replayed: usize,
  /// Entries the snapshot already reflected.
  pub skipped: usize,
  /// Entries that no longer apply (unknown market, failed transition).
  pub rejected: usize,
}

/// Fold `entries` onto `snapshot`.
#[must_use]
pub fn recover(snapshot: Option<RegistrySnapshot>, mut entries: Vec<JournalEntry>) -> RecoveredState {
  let (next_market_id, markets, next_project_id, projects) = match snapshot {
    Some(s) => (s.next_market_id, s.markets, s.next_project_id, s.projects),
    None => (1, Vec::new(), 1, Vec::new()),
  };
  let mut markets: BTreeMap<MarketId, Market> = markets.into_iter().map(|m| (m.id(), m)).collect();
  let mut projects: BTreeMap<ProjectId, Project> =
    projects.into_iter().map(|p| (p.id, p)).collect();

  // project events first, then each market's events in commit order
  entries.sort_by_key(|e| (e.event.market_id(), e.event.revision()));

  let mut state = RecoveredState {
    next_market_id,
    next_project_id,
    ..RecoveredState::default()
  };

  for entry in &entries {
    match &entry.event {
      MarketEvent::ProjectRegistered(e) => {
        if projects.contains_key(&e.project.id) {
          state.skipped += 1;
        } else {
          projects.insert(e.project.id, e.project.clone());
          state.replayed += 1;
        }
      }
      MarketEvent::MarketCreated(e) => {
        if markets.contains_key(&e.market.id) {
          state.skipped += 1;
        } else {
          markets.insert(e.market.id, Market::from_created(e));
          state.replayed += 1;
        }
      }
      event => {
        let Some(market) = event.market_id().and_then(|id| markets.get_mut(&id)) else {
          warn!(entry_id = %entry.id, event = event.name(), "Journal entry for unknown market");
          state.rejected += 1;
          continue;
        };
        match market.replay(event) {
          Ok(true) => state.replayed += 1,
          Ok(false) => state.skipped += 1,
          Err(e) => {
            warn!(
              entry_id = %entry.id,
              event = event.name(),
              error = %e,
              "Journal entry no longer applies"
            );
            state.rejected += 1;
          }
        }
      }
    }
  }

  state.markets = markets.into_values().collect();
  state.projects = projects.into_values().collect();
  state
}
