//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement the
//! engine's workflows. Each use case is a self-contained business
//! operation.
//!
//! Use cases:
//! - `MarketService`: The operation surface (auth, locking, journaling)
//! - `MarketRegistry` / `ProjectRegistry`: Id allocation and indexes
//! - `SettlementPlanner`: Payout reports for resolved markets
//! - `AccessPolicy`: Who may close and resolve
//! - `recovery`: Snapshot plus journal replay at startup

pub mod access;
pub mod error;
pub mod market_registry;
pub mod market_service;
pub mod project_registry;
pub mod recovery;
pub mod settlement;

pub use access::AccessPolicy;
pub use error::ServiceError;
pub use market_registry::MarketRegistry;
pub use market_service::MarketService;
pub use project_registry::ProjectRegistry;
pub use settlement::{SettlementPlanner, SettlementReport, WinnerPayout};
