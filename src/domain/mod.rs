//! Domain layer - Core settlement logic and models.
//!
//! Pure, synchronous logic for binary pari-mutuel markets: the stake
//! ledger, the market state machine and the payout engine. No I/O here
//! (hexagonal architecture inner ring). All amounts are integers.

pub mod error;
pub mod events;
pub mod ledger;
pub mod market;
pub mod payout;
pub mod project;
pub mod types;

// Re-export core types for convenience
pub use error::{EngineError, Entity};
pub use events::{
    BetPlaced, MarketClosed, MarketCreated, MarketEvent, MarketResolved, PayoutClaimed,
    ProjectRegistered,
};
pub use ledger::{Stake, StakeLedger};
pub use market::Market;
pub use payout::{SettlementEngine, pari_mutuel_payout};
pub use project::Project;
pub use types::{
    Amount, MarketId, MarketMetadata, MarketSnapshot, MarketState, Odds, Outcome, ProjectId,
    Side, UserId,
};
