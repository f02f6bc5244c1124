//! Settlement Use Case - Payout Reports for Resolved Markets
//!
//! Builds a full settlement picture for one resolved market: what every
//! winner is owed, what has been claimed, and the rounding residual that
//! stays in the pool.
//!
//! Report flow:
//! 1. Confirm the market is resolved
//! 2. Detect the escrowed case (nobody backed the outcome)
//! 3. Compute each winner's payout via the settlement engine
//! 4. Aggregate totals and the residual

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
  Amount, EngineError, Market, MarketId, Outcome, SettlementEngine, UserId,
};

/// One winner's line in a settlement report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerPayout {
  /// Winning user.
  pub user: UserId,
  /// Stake on the winning side.
  pub stake: Amount,
  /// Amount owed (stake plus share of the losing pool).
  pub payout: Amount,
  /// Whether the payout was already claimed.
  pub claimed: bool,
}

/// Aggregated settlement picture for one resolved market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReport {
  /// Market the report covers.
  pub market_id: MarketId,
  /// Resolved outcome.
  pub outcome: Outcome,
  /// Combined pool.
  pub total_pool: Amount,
  /// Stake on the winning side.
  pub winning_pool: Amount,
  /// Stake on the losing side.
  pub losing_pool: Amount,
  /// Per-winner payouts, ordered by user.
  pub payouts: Vec<WinnerPayout>,
  /// Sum of every payout.
  pub total_payable: Amount,
  /// Sum of payouts already claimed.
  pub total_claimed: Amount,
  /// Pool left after every payout: truncation loss, or the whole pool
  /// when escrowed.
  pub residual: Amount,
  /// Nobody backed the outcome; the pool awaits manual handling.
  pub escrowed: bool,
  /// When the report was built.
  pub generated_at: DateTime<Utc>,
}

impl SettlementReport {
  /// Payouts not yet claimed.
  #[must_use]
  pub fn total_unclaimed(&self) -> Amount {
    self.total_payable - self.total_claimed
  }

  /// Number of winners still to claim.
  #[must_use]
  pub fn pending_claims(&self) -> usize {
    self.payouts.iter().filter(|p| !p.claimed).count()
  }
}

/// Builds settlement reports using the payout engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettlementPlanner {
  engine: SettlementEngine,
}

impl SettlementPlanner {
  /// Create a planner.
  #[must_use]
  pub const fn new() -> Self {
    Self {
      engine: SettlementEngine::new(),
    }
  }

  /// Build the report. Requires the market's read lock to be held.
  pub fn report(&self, market: &Market) -> Result<SettlementReport, EngineError> {
    let outcome = market.resolved_outcome()?;
    let winning_pool = market.total_for(outcome);
    let losing_pool = market.total_for(outcome.opposite());
    let total_pool = market.total_pool();
    let escrowed = winning_pool == 0;

    let mut payouts = Vec::new();
    let mut total_payable: Amount = 0;
    let mut total_claimed: Amount = 0;

    if !escrowed {
      for row in market.ledger().stakes_on(outcome) {
        let payout = self.engine.compute_payout(market, &row.user)?;
        total_payable = total_payable
          .checked_add(payout)
          .ok_or(EngineError::Overflow { field: "total_payable" })?;
        if row.claimed {
          total_claimed += payout;
        }
        payouts.push(WinnerPayout {
          user: row.user.clone(),
          stake: row.amount,
          payout,
          claimed: row.claimed,
        });
      }
    }

    // payouts never exceed the pool; a shortfall here means a broken invariant
    let residual = total_pool
      .checked_sub(total_payable)
      .ok_or(EngineError::Overflow { field: "residual" })?;

    debug!(
      market_id = market.id(),
      winners = payouts.len(),
      total_payable,
      residual,
      escrowed,
      "Settlement report built"
    );

    Ok(SettlementReport {
      market_id: market.id(),
      outcome,
      total_pool,
      winning_pool,
      losing_pool,
      payouts,
      total_payable,
      total_claimed,
      residual,
      escrowed,
      generated_at: Utc::now(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{MarketMetadata, Side};

  fn resolved(bets: &[(&str, Side, Amount)], outcome: Side) -> Market {
    let mut m = Market::new(9, "Q", MarketMetadata::default(), "creator");
    for (user, side, amount) in bets {
      m.place_bet(user, *side, *amount).unwrap();
    }
    m.close("creator").unwrap();
    m.resolve(outcome, "creator").unwrap();
    m
  }

  #[test]
  fn test_report_full_payout() {
    let m = resolved(&[("a", Side::Yes, 100), ("b", Side::No, 200)], Side::Yes);
    let report = SettlementPlanner::new().report(&m).unwrap();
    assert_eq!(report.total_pool, 300);
    assert_eq!(report.total_payable, 300);
    assert_eq!(report.residual, 0);
    assert_eq!(report.payouts.len(), 1);
    assert_eq!(report.payouts[0].user, "a");
    assert!(!report.escrowed);
    assert_eq!(report.pending_claims(), 1);
  }

  #[test]
  fn test_report_tracks_claims() {
    let mut m = resolved(
      &[("a", Side::Yes, 10), ("b", Side::Yes, 30), ("c", Side::No, 20)],
      Side::Yes,
    );
    SettlementEngine::new().claim_payout(&mut m, "b").unwrap();
    let report = SettlementPlanner::new().report(&m).unwrap();
    // a: 10 + 200/40 = 15, b: 30 + 600/40 = 45
    assert_eq!(report.total_payable, 60);
    assert_eq!(report.total_claimed, 45);
    assert_eq!(report.total_unclaimed(), 15);
    assert_eq!(report.pending_claims(), 1);
  }

  #[test]
  fn test_report_residual() {
    let m = resolved(
      &[("a", Side::No, 1), ("b", Side::No, 1), ("c", Side::No, 1), ("d", Side::Yes, 1)],
      Side::No,
    );
    let report = SettlementPlanner::new().report(&m).unwrap();
    assert_eq!(report.total_payable, 3);
    assert_eq!(report.residual, 1);
    assert!(report.residual < report.payouts.len() as Amount);
  }

  #[test]
  fn test_report_escrowed() {
    let m = resolved(&[("a", Side::No, 70)], Side::Yes);
    let report = SettlementPlanner::new().report(&m).unwrap();
    assert!(report.escrowed);
    assert!(report.payouts.is_empty());
    assert_eq!(report.residual, 70);
  }

  #[test]
  fn test_report_requires_resolution() {
    let m = Market::new(1, "Q", MarketMetadata::default(), "c");
    assert!(matches!(
      SettlementPlanner::new().report(&m),
      Err(EngineError::NotResolved { .. })
    ));
  }
}
