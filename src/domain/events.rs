//! Structured results of committed operations.
//!
//! Each mutating operation returns its event directly; the service layer
//! also appends it to the journal for auditing and crash recovery.
//! Market transitions carry the market revision they produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::project::Project;
use super::types::{Amount, MarketId, MarketSnapshot, Outcome, Side, UserId};

/// A market was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketCreated {
    pub market: MarketSnapshot,
}

/// A stake was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetPlaced {
    pub market_id: MarketId,
    pub user: UserId,
    pub side: Side,
    /// Amount added by this bet.
    pub amount: Amount,
    /// The user's cumulative stake on `side` after this bet.
    pub user_stake: Amount,
    pub total_yes_stake: Amount,
    pub total_no_stake: Amount,
    pub total_bettors: u64,
    /// Whether this bet made the user a bettor on this market.
    pub new_bettor: bool,
    #[serde(default)]
    pub revision: u64,
    pub placed_at: DateTime<Utc>,
}

/// Betting was closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketClosed {
    pub market_id: MarketId,
    pub closed_by: UserId,
    pub total_yes_stake: Amount,
    pub total_no_stake: Amount,
    #[serde(default)]
    pub revision: u64,
    pub closed_at: DateTime<Utc>,
}

/// The outcome was fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketResolved {
    pub market_id: MarketId,
    pub outcome: Outcome,
    pub resolved_by: UserId,
    pub winning_pool: Amount,
    pub losing_pool: Amount,
    /// Nobody backed the winning side; the pool is held for manual handling.
    pub escrowed: bool,
    #[serde(default)]
    pub revision: u64,
    pub resolved_at: DateTime<Utc>,
}

/// A winner was paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutClaimed {
    pub market_id: MarketId,
    pub user: UserId,
    pub side: Side,
    pub stake: Amount,
    pub payout: Amount,
    #[serde(default)]
    pub revision: u64,
    pub claimed_at: DateTime<Utc>,
}

/// A project was registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRegistered {
    pub project: Project,
}

/// Every committed mutation, tagged for the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    MarketCreated(MarketCreated),
    BetPlaced(BetPlaced),
    MarketClosed(MarketClosed),
    MarketResolved(MarketResolved),
    PayoutClaimed(PayoutClaimed),
    ProjectRegistered(ProjectRegistered),
}

impl MarketEvent {
    /// Market the event concerns, if any.
    #[must_use]
    pub const fn market_id(&self) -> Option<MarketId> {
        match self {
            Self::MarketCreated(e) => Some(e.market.id),
            Self::BetPlaced(e) => Some(e.market_id),
            Self::MarketClosed(e) => Some(e.market_id),
            Self::MarketResolved(e) => Some(e.market_id),
            Self::PayoutClaimed(e) => Some(e.market_id),
            Self::ProjectRegistered(_) => None,
        }
    }

    /// Market revision the event produced. Creation is revision 0, as
    /// are events that do not touch a market.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        match self {
            Self::BetPlaced(e) => e.revision,
            Self::MarketClosed(e) => e.revision,
            Self::MarketResolved(e) => e.revision,
            Self::PayoutClaimed(e) => e.revision,
            Self::MarketCreated(_) | Self::ProjectRegistered(_) => 0,
        }
    }

    /// snake_case event name, matching the serialized tag.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MarketCreated(_) => "market_created",
            Self::BetPlaced(_) => "bet_placed",
            Self::MarketClosed(_) => "market_closed",
            Self::MarketResolved(_) => "market_resolved",
            Self::PayoutClaimed(_) => "payout_claimed",
            Self::ProjectRegistered(_) => "project_registered",
        }
    }
}

macro_rules! impl_from_event {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for MarketEvent {
                fn from(event: $variant) -> Self {
                    Self::$variant(event)
                }
            }
        )*
    };
}

impl_from_event!(
    MarketCreated,
    BetPlaced,
    MarketClosed,
    MarketResolved,
    PayoutClaimed,
    ProjectRegistered,
);
