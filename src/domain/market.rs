//! Binary market state machine.
//!
//! `Open → Closed → Resolved`, strictly forward. The market owns its
//! stake ledger and the aggregate counters derived from it. Every
//! operation validates fully before mutating, so a rejected call leaves
//! the market untouched.
//!
//! Check order is fixed: state first, then the value domain (side or
//! outcome), then the amount.
//!
//! Every committed transition advances the market's `revision` under
//! its write lock and stamps it on the returned event, so journaled
//! events order by commit and can be replayed onto an older snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::EngineError;
use super::events::{BetPlaced, MarketClosed, MarketCreated, MarketEvent, MarketResolved};
use super::ledger::StakeLedger;
use super::types::{
    Amount, MarketId, MarketMetadata, MarketSnapshot, MarketState, Odds, Outcome, Side, UserId,
};

/// A single binary-outcome proposition with its own ledger and lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    id: MarketId,
    question: String,
    metadata: MarketMetadata,
    creator: UserId,
    state: MarketState,
    outcome: Option<Outcome>,
    total_yes_stake: Amount,
    total_no_stake: Amount,
    total_bettors: u64,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    resolved_at: Option<DateTime<Utc>>,
    /// Count of committed transitions since creation.
    #[serde(default)]
    revision: u64,
    ledger: StakeLedger,
}

impl Market {
    /// New `Open` market with zero aggregates.
    pub fn new(
        id: MarketId,
        question: impl Into<String>,
        metadata: MarketMetadata,
        creator: impl Into<UserId>,
    ) -> Self {
        Self {
            id,
            question: question.into(),
            metadata,
            creator: creator.into(),
            state: MarketState::Open,
            outcome: None,
            total_yes_stake: 0,
            total_no_stake: 0,
            total_bettors: 0,
            created_at: Utc::now(),
            closed_at: None,
            resolved_at: None,
            revision: 0,
            ledger: StakeLedger::new(id),
        }
    }

    /// Rebuild a freshly created market from its journaled creation.
    #[must_use]
    pub fn from_created(event: &MarketCreated) -> Self {
        let snapshot = &event.market;
        let metadata = MarketMetadata {
            title: snapshot.title.clone(),
            project_id: snapshot.project_id,
            livestream_id: snapshot.livestream_id.clone(),
        };
        let mut market = Self::new(
            snapshot.id,
            snapshot.question.clone(),
            metadata,
            snapshot.creator.clone(),
        );
        market.created_at = snapshot.created_at;
        market
    }

    // ── Accessors ───────────────────────────────────────────

    #[must_use]
    pub const fn id(&self) -> MarketId {
        self.id
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub const fn metadata(&self) -> &MarketMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn creator(&self) -> &str {
        &self.creator
    }

    #[must_use]
    pub const fn state(&self) -> MarketState {
        self.state
    }

    #[must_use]
    pub const fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    #[must_use]
    pub const fn total_bettors(&self) -> u64 {
        self.total_bettors
    }

    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Total staked on `side`.
    #[must_use]
    pub const fn total_for(&self, side: Side) -> Amount {
        match side {
            Side::Yes => self.total_yes_stake,
            Side::No => self.total_no_stake,
        }
    }

    /// Combined pool. Bets that would push this past `Amount::MAX` are
    /// rejected, so the sum always fits.
    #[must_use]
    pub const fn total_pool(&self) -> Amount {
        self.total_yes_stake.saturating_add(self.total_no_stake)
    }

    /// Read access to the ledger.
    #[must_use]
    pub const fn ledger(&self) -> &StakeLedger {
        &self.ledger
    }

    /// Mark the user's row on `side` claimed and advance the revision.
    pub(crate) fn record_claim(&mut self, user: &str, side: Side) -> Result<u64, EngineError> {
        self.ledger.mark_claimed(user, side)?;
        Ok(self.advance())
    }

    fn advance(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    /// The user's cumulative stake on `side` (0 when absent).
    #[must_use]
    pub fn stake_of(&self, user: &str, side: Side) -> Amount {
        self.ledger.amount_of(user, side)
    }

    /// Pool-ratio quote. `None` while nothing is staked.
    #[must_use]
    pub fn odds(&self) -> Option<Odds> {
        Odds::from_totals(self.total_yes_stake, self.total_no_stake)
    }

    /// Consistent read view.
    #[must_use]
    pub fn snapshot(&self) -> MarketSnapshot {
        MarketSnapshot {
            id: self.id,
            question: self.question.clone(),
            title: self.metadata.title.clone(),
            creator: self.creator.clone(),
            state: self.state,
            outcome: self.outcome,
            total_yes_stake: self.total_yes_stake,
            total_no_stake: self.total_no_stake,
            total_pool: self.total_pool(),
            total_bettors: self.total_bettors,
            project_id: self.metadata.project_id,
            livestream_id: self.metadata.livestream_id.clone(),
            created_at: self.created_at,
            closed_at: self.closed_at,
            resolved_at: self.resolved_at,
        }
    }

    // ── Guards ──────────────────────────────────────────────

    /// Fails with `InvalidState` unless the market accepts bets.
    pub fn ensure_open(&self) -> Result<(), EngineError> {
        if self.state == MarketState::Open {
            Ok(())
        } else {
            Err(self.invalid_state("place bet on"))
        }
    }

    /// Fails unless the market is `Closed` and can take a resolution.
    ///
    /// A resolved market reports `AlreadyResolved`, an open one
    /// `InvalidState`.
    pub fn ensure_resolvable(&self) -> Result<(), EngineError> {
        match (self.state, self.outcome) {
            (MarketState::Closed, _) => Ok(()),
            (MarketState::Resolved, Some(outcome)) => Err(EngineError::AlreadyResolved {
                market_id: self.id,
                outcome,
            }),
            _ => Err(self.invalid_state("resolve")),
        }
    }

    /// The resolved outcome, or `NotResolved`.
    pub fn resolved_outcome(&self) -> Result<Outcome, EngineError> {
        match (self.state, self.outcome) {
            (MarketState::Resolved, Some(outcome)) => Ok(outcome),
            _ => Err(EngineError::NotResolved {
                market_id: self.id,
                state: self.state,
            }),
        }
    }

    const fn invalid_state(&self, operation: &'static str) -> EngineError {
        EngineError::InvalidState {
            market_id: self.id,
            state: self.state,
            operation,
        }
    }

    // ── Transitions ─────────────────────────────────────────

    /// Add `amount` to `user`'s stake on `side`.
    ///
    /// All arithmetic is checked up front; on `Overflow` nothing changes.
    pub fn place_bet(
        &mut self,
        user: &str,
        side: Side,
        amount: Amount,
    ) -> Result<BetPlaced, EngineError> {
        self.ensure_open()?;
        if amount == 0 {
            return Err(EngineError::InvalidAmount { amount: 0 });
        }

        let side_total = self
            .total_for(side)
            .checked_add(amount)
            .ok_or(EngineError::Overflow { field: "side_total" })?;
        self.total_pool()
            .checked_add(amount)
            .ok_or(EngineError::Overflow { field: "total_pool" })?;

        let new_bettor = !self.ledger.has_stake(user);
        let bettors = if new_bettor {
            self.total_bettors
                .checked_add(1)
                .ok_or(EngineError::Overflow { field: "total_bettors" })?
        } else {
            self.total_bettors
        };

        // the row never exceeds its side total, so this cannot fail once
        // the total check passed; it still runs before any field changes
        let user_stake = self.ledger.credit(user, side, amount)?;

        match side {
            Side::Yes => self.total_yes_stake = side_total,
            Side::No => self.total_no_stake = side_total,
        }
        self.total_bettors = bettors;
        let revision = self.advance();

        Ok(BetPlaced {
            market_id: self.id,
            user: user.to_string(),
            side,
            amount,
            user_stake,
            total_yes_stake: self.total_yes_stake,
            total_no_stake: self.total_no_stake,
            total_bettors: self.total_bettors,
            new_bettor,
            revision,
            placed_at: Utc::now(),
        })
    }

    /// Stop accepting bets.
    pub fn close(&mut self, closed_by: &str) -> Result<MarketClosed, EngineError> {
        self.close_at(closed_by, Utc::now())
    }

    fn close_at(&mut self, closed_by: &str, now: DateTime<Utc>) -> Result<MarketClosed, EngineError> {
        if self.state != MarketState::Open {
            return Err(self.invalid_state("close"));
        }

        self.state = MarketState::Closed;
        self.closed_at = Some(now);
        let revision = self.advance();

        Ok(MarketClosed {
            market_id: self.id,
            closed_by: closed_by.to_string(),
            total_yes_stake: self.total_yes_stake,
            total_no_stake: self.total_no_stake,
            revision,
            closed_at: now,
        })
    }

    /// Fix the outcome. Exactly once.
    pub fn resolve(
        &mut self,
        outcome: Outcome,
        resolved_by: &str,
    ) -> Result<MarketResolved, EngineError> {
        self.resolve_at(outcome, resolved_by, Utc::now())
    }

    fn resolve_at(
        &mut self,
        outcome: Outcome,
        resolved_by: &str,
        now: DateTime<Utc>,
    ) -> Result<MarketResolved, EngineError> {
        self.ensure_resolvable()?;

        self.state = MarketState::Resolved;
        self.outcome = Some(outcome);
        self.resolved_at = Some(now);
        let revision = self.advance();

        let winning_pool = self.total_for(outcome);
        Ok(MarketResolved {
            market_id: self.id,
            outcome,
            resolved_by: resolved_by.to_string(),
            winning_pool,
            losing_pool: self.total_for(outcome.opposite()),
            escrowed: winning_pool == 0,
            revision,
            resolved_at: now,
        })
    }

    /// Re-apply a journaled transition.
    ///
    /// Events at or below the current revision are already reflected and
    /// return `Ok(false)`. An applied event sets the revision to its own,
    /// so a gap left by a lost journal line does not shift later events.
    /// Creation and project events are not market transitions and are
    /// ignored here.
    pub fn replay(&mut self, event: &MarketEvent) -> Result<bool, EngineError> {
        let revision = event.revision();
        if event.market_id() != Some(self.id) || revision <= self.revision {
            return Ok(false);
        }

        match event {
            MarketEvent::BetPlaced(e) => {
                self.place_bet(&e.user, e.side, e.amount)?;
            }
            MarketEvent::MarketClosed(e) => {
                self.close_at(&e.closed_by, e.closed_at)?;
            }
            MarketEvent::MarketResolved(e) => {
                self.resolve_at(e.outcome, &e.resolved_by, e.resolved_at)?;
            }
            MarketEvent::PayoutClaimed(e) => {
                self.resolved_outcome()?;
                self.record_claim(&e.user, e.side)?;
            }
            MarketEvent::MarketCreated(_) | MarketEvent::ProjectRegistered(_) => return Ok(false),
        }
        self.revision = revision;
        Ok(true)
    }

    /// Check the conservation invariant against the ledger.
    #[must_use]
    pub fn is_conserved(&self) -> bool {
        self.ledger.sum_on(Side::Yes) == u128::from(self.total_yes_stake)
            && self.ledger.sum_on(Side::No) == u128::from(self.total_no_stake)
            && self.ledger.distinct_users() as u64 == self.total_bettors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market() -> Market {
        Market::new(1, "Will it rain?", MarketMetadata::titled("Rain"), "creator")
    }

    #[test]
    fn test_new_market_is_open_and_empty() {
        let m = market();
        assert_eq!(m.state(), MarketState::Open);
        assert_eq!(m.outcome(), None);
        assert_eq!(m.total_pool(), 0);
        assert_eq!(m.total_bettors(), 0);
        assert!(m.odds().is_none());
        assert!(m.snapshot().closed_at.is_none());
    }

    #[test]
    fn test_place_bet_updates_totals_and_bettors() {
        let mut m = market();
        let ev = m.place_bet("alice", Side::Yes, 100).unwrap();
        assert!(ev.new_bettor);
        assert_eq!(ev.total_yes_stake, 100);
        assert_eq!(ev.total_bettors, 1);

        let ev = m.place_bet("alice", Side::No, 40).unwrap();
        assert!(!ev.new_bettor, "second side must not count a new bettor");
        assert_eq!(ev.total_bettors, 1);

        m.place_bet("bob", Side::No, 60).unwrap();
        assert_eq!(m.total_for(Side::Yes), 100);
        assert_eq!(m.total_for(Side::No), 100);
        assert_eq!(m.total_bettors(), 2);
        assert!(m.is_conserved());
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut m = market();
        let err = m.place_bet("alice", Side::Yes, 0).unwrap_err();
        assert_eq!(err, EngineError::InvalidAmount { amount: 0 });
        assert_eq!(m.total_bettors(), 0);
        assert!(m.ledger().is_empty());
    }

    #[test]
    fn test_overflow_fails_closed() {
        let mut m = market();
        m.place_bet("alice", Side::Yes, u64::MAX - 5).unwrap();
        let before = m.clone();

        let err = m.place_bet("bob", Side::No, 10).unwrap_err();
        assert_eq!(err, EngineError::Overflow { field: "total_pool" });
        assert_eq!(m, before);

        let err = m.place_bet("alice", Side::Yes, 10).unwrap_err();
        assert_eq!(err, EngineError::Overflow { field: "side_total" });
        assert_eq!(m, before);
    }

    #[test]
    fn test_bet_rejected_after_close() {
        let mut m = market();
        m.close("creator").unwrap();
        let err = m.place_bet("alice", Side::Yes, 10).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { state: MarketState::Closed, .. }));
    }

    #[test]
    fn test_cannot_close_twice() {
        let mut m = market();
        m.close("creator").unwrap();
        let closed_at = m.snapshot().closed_at;
        assert!(m.close("creator").is_err());
        assert_eq!(m.snapshot().closed_at, closed_at);
    }

    #[test]
    fn test_resolve_requires_closed() {
        let mut m = market();
        let err = m.resolve(Side::Yes, "creator").unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { operation: "resolve", .. }));
        assert_eq!(m.state(), MarketState::Open);
    }

    #[test]
    fn test_resolve_exactly_once() {
        let mut m = market();
        m.place_bet("alice", Side::Yes, 10).unwrap();
        m.close("creator").unwrap();
        let ev = m.resolve(Side::Yes, "creator").unwrap();
        assert_eq!(ev.winning_pool, 10);
        assert!(!ev.escrowed);

        let err = m.resolve(Side::No, "creator").unwrap_err();
        assert_eq!(
            err,
            EngineError::AlreadyResolved {
                market_id: 1,
                outcome: Side::Yes
            }
        );
        assert_eq!(m.outcome(), Some(Side::Yes));
        assert!(m.close("creator").is_err());
    }

    #[test]
    fn test_resolve_to_unbacked_side_is_escrowed() {
        let mut m = market();
        m.place_bet("alice", Side::No, 10).unwrap();
        m.close("creator").unwrap();
        let ev = m.resolve(Side::Yes, "creator").unwrap();
        assert!(ev.escrowed);
        assert_eq!(ev.losing_pool, 10);
    }

    #[test]
    fn test_resolved_outcome_guard() {
        let mut m = market();
        assert!(matches!(
            m.resolved_outcome(),
            Err(EngineError::NotResolved { state: MarketState::Open, .. })
        ));
        m.close("creator").unwrap();
        m.resolve(Side::No, "creator").unwrap();
        assert_eq!(m.resolved_outcome().unwrap(), Side::No);
    }

    #[test]
    fn test_revision_advances_per_transition() {
        let mut m = market();
        assert_eq!(m.revision(), 0);
        assert_eq!(m.place_bet("alice", Side::Yes, 5).unwrap().revision, 1);
        assert!(m.place_bet("alice", Side::Yes, 0).is_err());
        assert_eq!(m.revision(), 1, "rejected bet must not advance");
        assert_eq!(m.close("creator").unwrap().revision, 2);
        assert_eq!(m.resolve(Side::Yes, "creator").unwrap().revision, 3);
    }

    #[test]
    fn test_replay_rebuilds_resolved_market() {
        let mut live = market();
        let created = MarketCreated { market: live.snapshot() };
        let events: Vec<MarketEvent> = vec![
            live.place_bet("alice", Side::Yes, 100).unwrap().into(),
            live.place_bet("bob", Side::No, 200).unwrap().into(),
            live.close("creator").unwrap().into(),
            live.resolve(Side::Yes, "creator").unwrap().into(),
        ];

        let mut rebuilt = Market::from_created(&created);
        for event in &events {
            assert!(rebuilt.replay(event).unwrap());
        }
        assert_eq!(rebuilt, live);

        // already reflected
        assert!(!rebuilt.replay(&events[3]).unwrap());
        assert_eq!(rebuilt.outcome(), Some(Side::Yes));
    }

    #[test]
    fn test_replay_skips_events_in_snapshot() {
        let mut m = market();
        let bet: MarketEvent = m.place_bet("alice", Side::Yes, 10).unwrap().into();
        let before = m.clone();
        assert!(!m.replay(&bet).unwrap());
        assert_eq!(m, before);
    }

    #[test]
    fn test_snapshot_reflects_metadata() {
        let meta = MarketMetadata {
            title: "Goal".to_string(),
            project_id: Some(4),
            livestream_id: Some("stream-9".to_string()),
        };
        let m = Market::new(2, "Goal before half time?", meta, "host");
        let snap = m.snapshot();
        assert_eq!(snap.title, "Goal");
        assert_eq!(snap.project_id, Some(4));
        assert_eq!(snap.livestream_id.as_deref(), Some("stream-9"));
        assert_eq!(snap.creator, "host");
    }
}
