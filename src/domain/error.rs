//! Engine errors.
//!
//! Every variant is a local, recoverable rejection: the operation that
//! produced it left all state exactly as it was. Variants carry the
//! offending field so a caller can decide whether to retry with
//! corrected input.

use thiserror::Error;

use super::types::{MarketId, MarketState, Outcome, ProjectId, UserId};

/// Which registry an unknown identifier was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Market,
    Project,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Market => write!(f, "market"),
            Self::Project => write!(f, "project"),
        }
    }
}

/// Rejections raised by the ledger, market state machine and settlement engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Unknown market or project identifier.
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: u64 },

    /// Operation is not legal in the market's current state.
    #[error("cannot {operation} market {market_id} while {state}")]
    InvalidState {
        market_id: MarketId,
        state: MarketState,
        operation: &'static str,
    },

    /// Side outside the two-valued domain.
    #[error("invalid side '{value}', expected yes or no")]
    InvalidSide { value: String },

    /// Outcome outside the two-valued domain.
    #[error("invalid outcome '{value}', expected yes or no")]
    InvalidOutcome { value: String },

    /// Stake amount must be strictly positive.
    #[error("invalid amount {amount}, must be positive")]
    InvalidAmount { amount: i128 },

    /// Resolution was already recorded; the outcome never changes.
    #[error("market {market_id} already resolved to {outcome}")]
    AlreadyResolved { market_id: MarketId, outcome: Outcome },

    /// Payouts are only computable once the market is resolved.
    #[error("market {market_id} is not resolved (state {state})")]
    NotResolved { market_id: MarketId, state: MarketState },

    /// The winning stake row was already paid out.
    #[error("payout for {user} on market {market_id} already claimed")]
    AlreadyClaimed { market_id: MarketId, user: UserId },

    /// The user has nothing on the winning side (or nobody does and the
    /// pool is escrowed).
    #[error("{user} has no winning stake on market {market_id}")]
    NoWinningStake { market_id: MarketId, user: UserId },

    /// An accumulator would exceed its representable range.
    #[error("arithmetic overflow on {field}")]
    Overflow { field: &'static str },
}

impl EngineError {
    /// Shorthand for an unknown market.
    #[must_use]
    pub const fn market_not_found(id: MarketId) -> Self {
        Self::NotFound {
            entity: Entity::Market,
            id,
        }
    }

    /// Shorthand for an unknown project.
    #[must_use]
    pub const fn project_not_found(id: ProjectId) -> Self {
        Self::NotFound {
            entity: Entity::Project,
            id,
        }
    }

    /// Stable snake_case tag for the failure kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidState { .. } => "invalid_state",
            Self::InvalidSide { .. } => "invalid_side",
            Self::InvalidOutcome { .. } => "invalid_outcome",
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::AlreadyResolved { .. } => "already_resolved",
            Self::NotResolved { .. } => "not_resolved",
            Self::AlreadyClaimed { .. } => "already_claimed",
            Self::NoWinningStake { .. } => "no_winning_stake",
            Self::Overflow { .. } => "overflow",
        }
    }
}
