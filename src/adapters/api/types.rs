//! HTTP API Request/Response Types
//!
//! JSON bodies for the settlement API. Sides and outcomes travel as
//! plain strings and are validated by the engine, not by serde, so an
//! unknown side is a domain rejection rather than a decode failure.

use serde::{Deserialize, Serialize};

use crate::domain::{Amount, MarketId, MarketMetadata, Odds, ProjectId, UserId};

/// `POST /markets` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMarketRequest {
  /// The proposition being bet on.
  pub question: String,
  /// Display title; defaults to empty.
  #[serde(default)]
  pub title: String,
  /// Project the market belongs to.
  #[serde(default)]
  pub project_id: Option<ProjectId>,
  /// Livestream the market is attached to.
  #[serde(default)]
  pub livestream_id: Option<String>,
}

impl CreateMarketRequest {
  /// Split into question and immutable metadata.
  #[must_use]
  pub fn into_parts(self) -> (String, MarketMetadata) {
    (
      self.question,
      MarketMetadata {
        title: self.title,
        project_id: self.project_id,
        livestream_id: self.livestream_id,
      },
    )
  }
}

/// `POST /markets/:id/bets` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceBetRequest {
  /// `"yes"` or `"no"`, case-insensitive.
  pub side: String,
  /// Signed so that non-positive amounts reach the engine's check.
  pub amount: i64,
}

/// `POST /markets/:id/resolve` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
  /// `"yes"` or `"no"`, case-insensitive.
  pub outcome: String,
}

/// `POST /projects` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterProjectRequest {
  pub name: String,
  #[serde(default)]
  pub description: String,
}

/// Answer to the `exists` probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistsResponse {
  pub exists: bool,
}

/// `GET /markets/:id/odds` response. `odds` is null for an empty pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OddsResponse {
  pub market_id: MarketId,
  pub odds: Option<Odds>,
}

/// `GET /markets/:id/payout/:user` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutResponse {
  pub market_id: MarketId,
  pub user: UserId,
  pub payout: Amount,
}

/// `GET /projects/:id/markets` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMarketsResponse {
  pub project_id: ProjectId,
  pub markets: Vec<MarketId>,
}

/// Error body for every rejected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
  /// Stable snake_case error kind.
  pub kind: String,
  /// Human-readable description.
  pub message: String,
}
