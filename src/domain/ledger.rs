//! Stake ledger: per-user, per-side cumulative stakes for one market.
//!
//! Rows are append-only. An amount only ever grows, and a row that would
//! hold zero is never created. The `claimed` flag flips once and stays.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::EngineError;
use super::types::{Amount, MarketId, Side, UserId};

/// One ledger row: a user's cumulative stake on one side of one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    pub user: UserId,
    pub market_id: MarketId,
    pub side: Side,
    pub amount: Amount,
    pub claimed: bool,
}

/// Ledger of every stake placed on a single market.
///
/// Owned exclusively by its `Market`; nothing else mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LedgerRecord", into = "LedgerRecord")]
pub struct StakeLedger {
    market_id: MarketId,
    /// Rows keyed by (user, side). BTreeMap keeps reports deterministic.
    rows: BTreeMap<(UserId, Side), Stake>,
}

/// Serialized form: JSON object keys must be strings, so rows go out as a list.
#[derive(Serialize, Deserialize)]
struct LedgerRecord {
    market_id: MarketId,
    stakes: Vec<Stake>,
}

impl From<StakeLedger> for LedgerRecord {
    fn from(ledger: StakeLedger) -> Self {
        Self {
            market_id: ledger.market_id,
            stakes: ledger.rows.into_values().collect(),
        }
    }
}

impl From<LedgerRecord> for StakeLedger {
    fn from(record: LedgerRecord) -> Self {
        let rows = record
            .stakes
            .into_iter()
            .map(|row| ((row.user.clone(), row.side), row))
            .collect();
        Self {
            market_id: record.market_id,
            rows,
        }
    }
}

impl StakeLedger {
    /// Empty ledger for the given market.
    #[must_use]
    pub const fn new(market_id: MarketId) -> Self {
        Self {
            market_id,
            rows: BTreeMap::new(),
        }
    }

    /// Market this ledger belongs to.
    #[must_use]
    pub const fn market_id(&self) -> MarketId {
        self.market_id
    }

    /// Row for `user` on `side`, if any stake was ever placed there.
    #[must_use]
    pub fn stake(&self, user: &str, side: Side) -> Option<&Stake> {
        self.rows.get(&(user.to_string(), side))
    }

    /// Cumulative amount `user` has on `side` (0 when absent).
    #[must_use]
    pub fn amount_of(&self, user: &str, side: Side) -> Amount {
        self.stake(user, side).map_or(0, |s| s.amount)
    }

    /// Whether `user` holds a stake on either side.
    #[must_use]
    pub fn has_stake(&self, user: &str) -> bool {
        Side::ALL
            .iter()
            .any(|side| self.rows.contains_key(&(user.to_string(), *side)))
    }

    /// Add `amount` to the user's row on `side`, creating the row if absent.
    ///
    /// Returns the row's new cumulative amount. Fails with `Overflow`
    /// before touching anything.
    pub fn credit(&mut self, user: &str, side: Side, amount: Amount) -> Result<Amount, EngineError> {
        let market_id = self.market_id;
        let current = self.amount_of(user, side);
        let updated = current
            .checked_add(amount)
            .ok_or(EngineError::Overflow { field: "stake" })?;

        self.rows
            .entry((user.to_string(), side))
            .and_modify(|row| row.amount = updated)
            .or_insert_with(|| Stake {
                user: user.to_string(),
                market_id,
                side,
                amount: updated,
                claimed: false,
            });

        Ok(updated)
    }

    /// Flip the `claimed` flag on the user's row for `side`.
    ///
    /// Fails with `AlreadyClaimed` if it was already set and with
    /// `NoWinningStake` if the row does not exist.
    pub fn mark_claimed(&mut self, user: &str, side: Side) -> Result<(), EngineError> {
        let market_id = self.market_id;
        let row = self
            .rows
            .get_mut(&(user.to_string(), side))
            .ok_or_else(|| EngineError::NoWinningStake {
                market_id,
                user: user.to_string(),
            })?;

        if row.claimed {
            return Err(EngineError::AlreadyClaimed {
                market_id,
                user: user.to_string(),
            });
        }

        row.claimed = true;
        Ok(())
    }

    /// All rows on one side, ordered by user.
    pub fn stakes_on(&self, side: Side) -> impl Iterator<Item = &Stake> {
        self.rows.values().filter(move |row| row.side == side)
    }

    /// All rows.
    pub fn iter(&self) -> impl Iterator<Item = &Stake> {
        self.rows.values()
    }

    /// Sum of every row on `side`, widened so it cannot overflow.
    #[must_use]
    pub fn sum_on(&self, side: Side) -> u128 {
        self.stakes_on(side).map(|row| u128::from(row.amount)).sum()
    }

    /// Number of distinct users with at least one row.
    #[must_use]
    pub fn distinct_users(&self) -> usize {
        let mut last: Option<&str> = None;
        let mut count = 0;
        // keys are sorted by user first, so duplicates are adjacent
        for (user, _) in self.rows.keys() {
            if last != Some(user.as_str()) {
                count += 1;
                last = Some(user.as_str());
            }
        }
        count
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no stake has been placed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_creates_and_accumulates() {
        let mut ledger = StakeLedger::new(1);
        assert_eq!(ledger.credit("alice", Side::Yes, 100).unwrap(), 100);
        assert_eq!(ledger.credit("alice", Side::Yes, 50).unwrap(), 150);
        assert_eq!(ledger.amount_of("alice", Side::Yes), 150);
        assert_eq!(ledger.amount_of("alice", Side::No), 0);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_both_sides_are_independent_rows() {
        let mut ledger = StakeLedger::new(1);
        ledger.credit("alice", Side::Yes, 10).unwrap();
        ledger.credit("alice", Side::No, 20).unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.distinct_users(), 1);
        assert_eq!(ledger.sum_on(Side::Yes), 10);
        assert_eq!(ledger.sum_on(Side::No), 20);
    }

    #[test]
    fn test_overflow_leaves_row_untouched() {
        let mut ledger = StakeLedger::new(1);
        ledger.credit("alice", Side::Yes, u64::MAX).unwrap();
        let err = ledger.credit("alice", Side::Yes, 1).unwrap_err();
        assert_eq!(err, EngineError::Overflow { field: "stake" });
        assert_eq!(ledger.amount_of("alice", Side::Yes), u64::MAX);
    }

    #[test]
    fn test_mark_claimed_once() {
        let mut ledger = StakeLedger::new(3);
        ledger.credit("bob", Side::No, 5).unwrap();
        ledger.mark_claimed("bob", Side::No).unwrap();
        assert!(ledger.stake("bob", Side::No).unwrap().claimed);

        let err = ledger.mark_claimed("bob", Side::No).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyClaimed { market_id: 3, .. }));
    }

    #[test]
    fn test_mark_claimed_missing_row() {
        let mut ledger = StakeLedger::new(3);
        let err = ledger.mark_claimed("carol", Side::Yes).unwrap_err();
        assert!(matches!(err, EngineError::NoWinningStake { .. }));
    }

    #[test]
    fn test_serde_keeps_rows() {
        let mut ledger = StakeLedger::new(4);
        ledger.credit("alice", Side::Yes, 7).unwrap();
        ledger.credit("bob", Side::No, 9).unwrap();
        ledger.mark_claimed("alice", Side::Yes).unwrap();

        let json = serde_json::to_string(&ledger).unwrap();
        let restored: StakeLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, ledger);
    }

    #[test]
    fn test_has_stake_and_distinct_users() {
        let mut ledger = StakeLedger::new(1);
        assert!(!ledger.has_stake("alice"));
        ledger.credit("alice", Side::No, 1).unwrap();
        ledger.credit("bob", Side::Yes, 1).unwrap();
        ledger.credit("bob", Side::No, 1).unwrap();
        assert!(ledger.has_stake("alice"));
        assert_eq!(ledger.distinct_users(), 2);
    }
}
