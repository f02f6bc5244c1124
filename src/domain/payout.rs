//! Pari-mutuel settlement engine.
//!
//! Winners get their own stake back plus a share of the losing pool
//! proportional to their stake on the winning side:
//!
//!   payout = stake + stake * losing_pool / winning_pool
//!
//! Integer division truncates toward zero. The remainder left across all
//! winners is a bounded rounding loss (strictly less than the number of
//! winners) and is never redistributed.
//!
//! When nobody backed the winning side the pool is escrowed: no payout
//! is computable, and that is reported instead of dividing by zero.

use chrono::Utc;

use super::error::EngineError;
use super::events::PayoutClaimed;
use super::market::Market;
use super::types::Amount;

/// Payout for one winner, widened to `u128` for the intermediate product.
///
/// Returns `None` when `winning_pool` is zero (escrowed pool) or the
/// result does not fit in an `Amount`.
#[must_use]
pub fn pari_mutuel_payout(stake: Amount, winning_pool: Amount, losing_pool: Amount) -> Option<Amount> {
    if winning_pool == 0 {
        return None;
    }
    let stake_wide = u128::from(stake);
    let share = stake_wide * u128::from(losing_pool) / u128::from(winning_pool);
    Amount::try_from(stake_wide + share).ok()
}

/// Stateless payout calculator operating on a locked market.
///
/// `compute_payout` only needs a read lock; `claim_payout` must run under
/// the market's write lock so the claimed check and set are one step.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettlementEngine;

impl SettlementEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Amount `user` is owed on a resolved market.
    ///
    /// Preview only; does not look at or change the claimed flag.
    ///
    /// An escrowed market (resolved to a side nobody backed) also
    /// answers `NoWinningStake` for every user. Whether the pool is
    /// escrowed is reported by `MarketResolved::escrowed` and the
    /// settlement report, not by this call.
    pub fn compute_payout(&self, market: &Market, user: &str) -> Result<Amount, EngineError> {
        let outcome = market.resolved_outcome()?;
        let stake = market.stake_of(user, outcome);
        let no_winning_stake = || EngineError::NoWinningStake {
            market_id: market.id(),
            user: user.to_string(),
        };

        if stake == 0 {
            return Err(no_winning_stake());
        }

        let winning_pool = market.total_for(outcome);
        let losing_pool = market.total_for(outcome.opposite());
        if winning_pool == 0 {
            // escrowed pool; unreachable while the user has a winning stake
            return Err(no_winning_stake());
        }

        pari_mutuel_payout(stake, winning_pool, losing_pool)
            .ok_or(EngineError::Overflow { field: "payout" })
    }

    /// Pay `user` once.
    ///
    /// Fails with `AlreadyClaimed` on repeat; on any failure the ledger is
    /// unchanged.
    pub fn claim_payout(&self, market: &mut Market, user: &str) -> Result<PayoutClaimed, EngineError> {
        let outcome = market.resolved_outcome()?;

        if market
            .ledger()
            .stake(user, outcome)
            .is_some_and(|row| row.claimed)
        {
            return Err(EngineError::AlreadyClaimed {
                market_id: market.id(),
                user: user.to_string(),
            });
        }

        let payout = self.compute_payout(market, user)?;
        let stake = market.stake_of(user, outcome);
        let revision = market.record_claim(user, outcome)?;

        Ok(PayoutClaimed {
            market_id: market.id(),
            user: user.to_string(),
            side: outcome,
            stake,
            payout,
            revision,
            claimed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{MarketMetadata, Side};

    fn resolved(bets: &[(&str, Side, Amount)], outcome: Side) -> Market {
        let mut m = Market::new(1, "Q1", MarketMetadata::default(), "creator");
        for (user, side, amount) in bets {
            m.place_bet(user, *side, *amount).unwrap();
        }
        m.close("creator").unwrap();
        m.resolve(outcome, "creator").unwrap();
        m
    }

    #[test]
    fn test_formula() {
        assert_eq!(pari_mutuel_payout(100, 100, 200), Some(300));
        assert_eq!(pari_mutuel_payout(50, 100, 0), Some(50));
        assert_eq!(pari_mutuel_payout(1, 3, 1), Some(1)); // 1/3 truncated away
        assert_eq!(pari_mutuel_payout(10, 0, 50), None);
    }

    #[test]
    fn test_formula_uses_wide_intermediate() {
        // stake * losing overflows u64 but the result fits
        let big = u64::MAX / 2;
        assert_eq!(pari_mutuel_payout(big, big, big), Some(big * 2));
    }

    #[test]
    fn test_winner_takes_losing_pool() {
        let m = resolved(&[("a", Side::Yes, 100), ("b", Side::No, 200)], Side::Yes);
        let engine = SettlementEngine::new();
        assert_eq!(engine.compute_payout(&m, "a").unwrap(), 300);
        assert!(matches!(
            engine.compute_payout(&m, "b"),
            Err(EngineError::NoWinningStake { .. })
        ));
    }

    #[test]
    fn test_not_resolved() {
        let mut m = Market::new(1, "Q", MarketMetadata::default(), "c");
        m.place_bet("a", Side::Yes, 10).unwrap();
        let engine = SettlementEngine::new();
        assert!(matches!(
            engine.compute_payout(&m, "a"),
            Err(EngineError::NotResolved { .. })
        ));
        assert!(matches!(
            engine.claim_payout(&mut m, "a"),
            Err(EngineError::NotResolved { .. })
        ));
    }

    #[test]
    fn test_claim_once() {
        let mut m = resolved(&[("a", Side::Yes, 100), ("b", Side::No, 200)], Side::Yes);
        let engine = SettlementEngine::new();

        let ev = engine.claim_payout(&mut m, "a").unwrap();
        assert_eq!(ev.payout, 300);
        assert_eq!(ev.stake, 100);
        assert_eq!(ev.side, Side::Yes);

        let err = engine.claim_payout(&mut m, "a").unwrap_err();
        assert!(matches!(err, EngineError::AlreadyClaimed { .. }));
        // preview still answers after the claim
        assert_eq!(engine.compute_payout(&m, "a").unwrap(), 300);
    }

    #[test]
    fn test_loser_claim_leaves_ledger_unchanged() {
        let mut m = resolved(&[("a", Side::Yes, 100), ("b", Side::No, 200)], Side::Yes);
        let before = m.clone();
        let err = SettlementEngine::new().claim_payout(&mut m, "b").unwrap_err();
        assert!(matches!(err, EngineError::NoWinningStake { .. }));
        assert_eq!(m, before);
    }

    #[test]
    fn test_hedged_user_paid_on_winning_side_only() {
        let m = resolved(
            &[("a", Side::Yes, 60), ("a", Side::No, 40), ("b", Side::No, 60)],
            Side::No,
        );
        // a: 40 + 40*60/100 = 64, b: 60 + 60*60/100 = 96
        let engine = SettlementEngine::new();
        assert_eq!(engine.compute_payout(&m, "a").unwrap(), 64);
        assert_eq!(engine.compute_payout(&m, "b").unwrap(), 96);
    }

    #[test]
    fn test_escrowed_pool_pays_nobody() {
        let m = resolved(&[("a", Side::No, 70), ("b", Side::No, 30)], Side::Yes);
        let engine = SettlementEngine::new();
        for user in ["a", "b", "nobody"] {
            assert!(matches!(
                engine.compute_payout(&m, user),
                Err(EngineError::NoWinningStake { .. })
            ));
        }
    }

    #[test]
    fn test_rounding_residual_bounded() {
        let m = resolved(
            &[("a", Side::Yes, 1), ("b", Side::Yes, 1), ("c", Side::Yes, 1), ("d", Side::No, 2)],
            Side::Yes,
        );
        let engine = SettlementEngine::new();
        let paid: Amount = ["a", "b", "c"]
            .iter()
            .map(|u| engine.compute_payout(&m, u).unwrap())
            .sum();
        // each gets 1 + 2/3 -> 1, total 3 of a pool of 5
        assert_eq!(paid, 3);
        assert!(m.total_pool() - paid < 3);
    }
}
