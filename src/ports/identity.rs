//! Identity Port - Caller Authentication Interface
//!
//! The wallet / session provider lives outside this crate. All the core
//! needs from it is a stable user identifier and whether the session is
//! authenticated. Unauthenticated callers may read but never mutate.

use async_trait::async_trait;

use crate::domain::UserId;

/// The party behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
  /// Stable user identifier (empty for anonymous callers).
  pub user: UserId,
  /// Whether the provider vouched for this session.
  pub authenticated: bool,
}

impl Caller {
  /// An authenticated caller.
  pub fn authenticated(user: impl Into<UserId>) -> Self {
    Self {
      user: user.into(),
      authenticated: true,
    }
  }

  /// A caller the provider could not vouch for.
  #[must_use]
  pub const fn anonymous() -> Self {
    Self {
      user: String::new(),
      authenticated: false,
    }
  }
}

/// Trait for identity / session providers.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
  /// Resolve a presented credential (e.g. a bearer token) to a caller.
  ///
  /// Unknown or missing credentials yield an anonymous caller rather
  /// than an error; only provider outages are errors.
  async fn authenticate(&self, credential: Option<String>) -> anyhow::Result<Caller>;
}
