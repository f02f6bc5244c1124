//! Market Registry - Identifier Allocation and Market Index
//!
//! Owns every market behind its own lock, so mutations on one market
//! serialize while different markets proceed in parallel. Only the
//! identifier allocation step is serialized registry-wide.
//!
//! Identifiers start at 1, increase strictly and are never reused.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::domain::{
  EngineError, Market, MarketCreated, MarketId, MarketMetadata, MarketSnapshot, ProjectId,
};

/// Shared handle to a single market.
pub type MarketHandle = Arc<RwLock<Market>>;

/// Registry of all markets.
pub struct MarketRegistry {
  /// Next identifier to hand out. Held while a market is inserted so ids
  /// are gapless.
  next_id: Mutex<MarketId>,
  /// id -> market. The outer lock only guards the index, never a market.
  markets: RwLock<BTreeMap<MarketId, MarketHandle>>,
  /// project -> markets referencing it (metadata is immutable).
  by_project: RwLock<HashMap<ProjectId, Vec<MarketId>>>,
}

impl Default for MarketRegistry {
  fn default() -> Self {
    Self::new()
  }
}

impl MarketRegistry {
  /// Empty registry; the first market gets id 1.
  #[must_use]
  pub fn new() -> Self {
    Self {
      next_id: Mutex::new(1),
      markets: RwLock::new(BTreeMap::new()),
      by_project: RwLock::new(HashMap::new()),
    }
  }

  /// Rebuild from persisted markets.
  ///
  /// The allocator resumes at the larger of `next_id` and one past the
  /// highest restored id, so restored ids are never handed out again.
  #[must_use]
  pub fn restore(next_id: MarketId, markets: Vec<Market>) -> Self {
    let highest = markets.iter().map(Market::id).max().unwrap_or(0);
    let registry = Self::new();
    *registry.next_id.lock() = next_id.max(highest + 1);

    {
      let mut index = registry.markets.write();
      let mut by_project = registry.by_project.write();
      for market in markets {
        if let Some(project_id) = market.metadata().project_id {
          by_project.entry(project_id).or_default().push(market.id());
        }
        index.insert(market.id(), Arc::new(RwLock::new(market)));
      }
    }

    info!(
      markets = registry.len(),
      next_id = *registry.next_id.lock(),
      "Market registry restored"
    );
    registry
  }

  /// Create a new `Open` market and return its creation event.
  pub fn create_market(
    &self,
    question: &str,
    metadata: MarketMetadata,
    creator: &str,
  ) -> MarketCreated {
    let mut next_id = self.next_id.lock();
    let id = *next_id;

    let project_id = metadata.project_id;
    let market = Market::new(id, question, metadata, creator);
    let snapshot = market.snapshot();

    self.markets.write().insert(id, Arc::new(RwLock::new(market)));
    if let Some(project_id) = project_id {
      self.by_project.write().entry(project_id).or_default().push(id);
    }
    *next_id += 1;

    debug!(market_id = id, "Market allocated");
    MarketCreated { market: snapshot }
  }

  /// Handle to a market, or `NotFound`.
  pub fn handle(&self, id: MarketId) -> Result<MarketHandle, EngineError> {
    self
      .markets
      .read()
      .get(&id)
      .cloned()
      .ok_or_else(|| EngineError::market_not_found(id))
  }

  /// Consistent snapshot of one market.
  pub fn get_market(&self, id: MarketId) -> Result<MarketSnapshot, EngineError> {
    self.with_market(id, |market| Ok(market.snapshot()))
  }

  /// Whether `id` was ever allocated.
  #[must_use]
  pub fn market_exists(&self, id: MarketId) -> bool {
    self.markets.read().contains_key(&id)
  }

  /// Run `f` under the market's read lock.
  pub fn with_market<T>(
    &self,
    id: MarketId,
    f: impl FnOnce(&Market) -> Result<T, EngineError>,
  ) -> Result<T, EngineError> {
    let handle = self.handle(id)?;
    let market = handle.read();
    f(&market)
  }

  /// Run `f` under the market's write lock.
  ///
  /// `f` must validate before mutating: the lock makes it exclusive, not
  /// transactional.
  pub fn with_market_mut<T>(
    &self,
    id: MarketId,
    f: impl FnOnce(&mut Market) -> Result<T, EngineError>,
  ) -> Result<T, EngineError> {
    let handle = self.handle(id)?;
    let mut market = handle.write();
    f(&mut market)
  }

  /// Markets whose metadata references `project_id`, in creation order.
  #[must_use]
  pub fn markets_for_project(&self, project_id: ProjectId) -> Vec<MarketId> {
    self
      .by_project
      .read()
      .get(&project_id)
      .cloned()
      .unwrap_or_default()
  }

  /// Snapshots of every market in id order.
  #[must_use]
  pub fn list_markets(&self) -> Vec<MarketSnapshot> {
    self.handles().iter().map(|h| h.read().snapshot()).collect()
  }

  /// Full copies of every market (ledger included) plus the allocator
  /// position, for persistence.
  #[must_use]
  pub fn export(&self) -> (MarketId, Vec<Market>) {
    let next_id = self.next_id.lock();
    let markets = self.handles().iter().map(|h| h.read().clone()).collect();
    (*next_id, markets)
  }

  /// Number of markets.
  #[must_use]
  pub fn len(&self) -> usize {
    self.markets.read().len()
  }

  /// Whether no market was created yet.
  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.markets.read().is_empty()
  }

  fn handles(&self) -> Vec<MarketHandle> {
    self.markets.read().values().cloned().collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{MarketState, Side};

  #[test]
  fn test_ids_start_at_one_and_increase() {
    let reg = MarketRegistry::new();
    let a = reg.create_market("Q1", MarketMetadata::default(), "alice");
    let b = reg.create_market("Q2", MarketMetadata::default(), "alice");
    assert_eq!(a.market.id, 1);
    assert_eq!(b.market.id, 2);
    assert_eq!(a.market.state, MarketState::Open);
    assert_eq!(a.market.total_pool, 0);
  }

  #[test]
  fn test_failed_operations_do_not_advance_allocator() {
    let reg = MarketRegistry::new();
    reg.create_market("Q1", MarketMetadata::default(), "alice");
    assert!(reg.get_market(42).is_err());
    assert!(reg.with_market_mut(1, |m| m.resolve(Side::Yes, "alice")).is_err());
    let next = reg.create_market("Q2", MarketMetadata::default(), "alice");
    assert_eq!(next.market.id, 2);
  }

  #[test]
  fn test_not_found() {
    let reg = MarketRegistry::new();
    assert!(!reg.market_exists(999));
    assert_eq!(
      reg.get_market(999).unwrap_err(),
      EngineError::market_not_found(999)
    );
  }

  #[test]
  fn test_project_grouping() {
    let reg = MarketRegistry::new();
    let meta = |p| MarketMetadata {
      project_id: Some(p),
      ..MarketMetadata::default()
    };
    reg.create_market("a", meta(7), "u");
    reg.create_market("b", MarketMetadata::default(), "u");
    reg.create_market("c", meta(7), "u");
    assert_eq!(reg.markets_for_project(7), vec![1, 3]);
    assert!(reg.markets_for_project(8).is_empty());
  }

  #[test]
  fn test_restore_keeps_allocator_ahead() {
    let reg = MarketRegistry::new();
    reg.create_market("a", MarketMetadata::default(), "u");
    reg.create_market("b", MarketMetadata::default(), "u");
    reg
      .with_market_mut(2, |m| m.place_bet("bob", Side::No, 5).map(|_| ()))
      .unwrap();

    let (next_id, markets) = reg.export();
    assert_eq!(next_id, 3);

    // a stale allocator value must not let ids be reused
    let restored = MarketRegistry::restore(1, markets);
    assert_eq!(restored.len(), 2);
    assert_eq!(restored.get_market(2).unwrap().total_no_stake, 5);
    let c = restored.create_market("c", MarketMetadata::default(), "u");
    assert_eq!(c.market.id, 3);
  }

  #[test]
  fn test_parallel_bets_on_same_market_conserve() {
    let reg = Arc::new(MarketRegistry::new());
    reg.create_market("Q", MarketMetadata::default(), "u");

    let workers: Vec<_> = (0..8)
      .map(|i| {
        let reg = Arc::clone(&reg);
        std::thread::spawn(move || {
          let user = format!("user{i}");
          let side = if i % 2 == 0 { Side::Yes } else { Side::No };
          for _ in 0..100 {
            reg
              .with_market_mut(1, |m| m.place_bet(&user, side, 3).map(|_| ()))
              .unwrap();
          }
        })
      })
      .collect();
    for w in workers {
      w.join().unwrap();
    }

    let snap = reg.get_market(1).unwrap();
    assert_eq!(snap.total_pool, 8 * 100 * 3);
    assert_eq!(snap.total_bettors, 8);
    assert!(reg.with_market(1, |m| Ok(m.is_conserved())).unwrap());
  }
}
