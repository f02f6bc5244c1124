//! Core market domain types.
//!
//! Defines the identifiers, the two-valued side/outcome enum, the market
//! lifecycle states and the read-only views handed out to callers.
//! Every amount is an integer in the smallest indivisible unit.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::EngineError;

// ────────────────────────────────────────────
// Identifier and amount aliases
// ────────────────────────────────────────────

/// Market identifier, allocated by the market registry starting at 1.
pub type MarketId = u64;

/// Project identifier, allocated by the project registry starting at 1.
pub type ProjectId = u64;

/// Opaque, stable user identifier supplied by the identity provider.
pub type UserId = String;

/// Stake / payout amount in the smallest indivisible unit.
pub type Amount = u64;

/// Basis points in a whole (100%).
pub const BPS_SCALE: u64 = 10_000;

// ────────────────────────────────────────────
// Side / outcome
// ────────────────────────────────────────────

/// One of the two sides of a binary market.
///
/// Used both for the side a stake backs and for the resolved outcome.
/// Wire values are `"yes"` / `"no"`, matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

/// A resolved outcome is always one of the two sides.
pub type Outcome = Side;

impl Side {
    /// Both sides, Yes first.
    pub const ALL: [Self; 2] = [Self::Yes, Self::No];

    /// The other side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Yes => Self::No,
            Self::No => Self::Yes,
        }
    }

    /// Lowercase wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
        }
    }

    /// Parse a resolution outcome.
    ///
    /// Same grammar as [`FromStr`], but rejects with `InvalidOutcome`
    /// instead of `InvalidSide`.
    pub fn parse_outcome(raw: &str) -> Result<Self, EngineError> {
        parse_label(raw).ok_or_else(|| EngineError::InvalidOutcome {
            value: raw.to_string(),
        })
    }
}

fn parse_label(raw: &str) -> Option<Side> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("yes") {
        Some(Side::Yes)
    } else if trimmed.eq_ignore_ascii_case("no") {
        Some(Side::No)
    } else {
        None
    }
}

impl FromStr for Side {
    type Err = EngineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_label(raw).ok_or_else(|| EngineError::InvalidSide {
            value: raw.to_string(),
        })
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yes => write!(f, "YES"),
            Self::No => write!(f, "NO"),
        }
    }
}

// ────────────────────────────────────────────
// Lifecycle
// ────────────────────────────────────────────

/// Market lifecycle state. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketState {
    /// Accepting bets.
    Open,
    /// Betting closed, awaiting resolution.
    Closed,
    /// Outcome fixed. Terminal.
    Resolved,
}

impl std::fmt::Display for MarketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Closed => write!(f, "CLOSED"),
            Self::Resolved => write!(f, "RESOLVED"),
        }
    }
}

/// Descriptive metadata supplied when a market is created.
///
/// `project_id` and `livestream_id` are free-form references; nothing
/// checks that they point at anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketMetadata {
    /// Short display title.
    #[serde(default)]
    pub title: String,
    /// Optional owning project.
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    /// Optional livestream / video reference.
    #[serde(default)]
    pub livestream_id: Option<String>,
}

impl MarketMetadata {
    /// Metadata with only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Pool-ratio quote: each side's share of the current pool in basis points.
///
/// A plain ratio read, not a price curve. `yes_bps + no_bps == 10_000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Odds {
    pub yes_bps: u64,
    pub no_bps: u64,
}

impl Odds {
    /// Compute the ratio from side totals. `None` when the pool is empty.
    ///
    /// Truncation remainder is assigned to No so the two always sum to
    /// the full scale.
    #[must_use]
    pub fn from_totals(total_yes: Amount, total_no: Amount) -> Option<Self> {
        let pool = u128::from(total_yes) + u128::from(total_no);
        if pool == 0 {
            return None;
        }
        let yes_bps = u128::from(total_yes) * u128::from(BPS_SCALE) / pool;
        // yes_bps <= BPS_SCALE, so the narrowing cannot fail
        let yes_bps = u64::try_from(yes_bps).unwrap_or(BPS_SCALE);
        Some(Self {
            yes_bps,
            no_bps: BPS_SCALE - yes_bps,
        })
    }

    /// Share of the given side.
    #[must_use]
    pub const fn for_side(&self, side: Side) -> u64 {
        match side {
            Side::Yes => self.yes_bps,
            Side::No => self.no_bps,
        }
    }
}

/// Consistent read-only view of a market, taken under its read lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub id: MarketId,
    pub question: String,
    pub title: String,
    pub creator: UserId,
    pub state: MarketState,
    pub outcome: Option<Outcome>,
    pub total_yes_stake: Amount,
    pub total_no_stake: Amount,
    pub total_pool: Amount,
    pub total_bettors: u64,
    pub project_id: Option<ProjectId>,
    pub livestream_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl MarketSnapshot {
    /// Total staked on one side.
    #[must_use]
    pub const fn total_for(&self, side: Side) -> Amount {
        match side {
            Side::Yes => self.total_yes_stake,
            Side::No => self.total_no_stake,
        }
    }
}
