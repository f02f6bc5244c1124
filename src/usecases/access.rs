//! Access Policy - Who May Close and Resolve
//!
//! Closing and resolving are privileged. A caller may perform them when
//! they are a configured operator, or when they created the market and
//! creator resolution is enabled. Everything else only needs an
//! authenticated caller.

use std::collections::HashSet;

use crate::config::AccessConfig;
use crate::domain::UserId;
use crate::ports::identity::Caller;

use super::error::ServiceError;

/// Authorization rule for privileged market operations.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
  /// Users allowed to close / resolve any market.
  operators: HashSet<UserId>,
  /// Whether a market's creator may close / resolve it.
  creator_may_resolve: bool,
}

impl Default for AccessPolicy {
  fn default() -> Self {
    Self {
      operators: HashSet::new(),
      creator_may_resolve: true,
    }
  }
}

impl AccessPolicy {
  /// Build a policy from operator ids.
  pub fn new<I, S>(operators: I, creator_may_resolve: bool) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<UserId>,
  {
    Self {
      operators: operators.into_iter().map(Into::into).collect(),
      creator_may_resolve,
    }
  }

  /// Build from the `[access]` config section.
  #[must_use]
  pub fn from_config(config: &AccessConfig) -> Self {
    Self::new(config.operators.iter().cloned(), config.creator_may_resolve)
  }

  /// Fails with `Unauthenticated` for callers the provider did not vouch for.
  pub fn require_authenticated(caller: &Caller) -> Result<(), ServiceError> {
    if caller.authenticated && !caller.user.is_empty() {
      Ok(())
    } else {
      Err(ServiceError::Unauthenticated)
    }
  }

  /// Whether `user` is a configured operator.
  #[must_use]
  pub fn is_operator(&self, user: &str) -> bool {
    self.operators.contains(user)
  }

  /// Check a privileged operation on a market created by `creator`.
  pub fn authorize(
    &self,
    caller: &Caller,
    creator: &str,
    operation: &'static str,
  ) -> Result<(), ServiceError> {
    Self::require_authenticated(caller)?;

    let is_creator = self.creator_may_resolve && caller.user == creator;
    if is_creator || self.is_operator(&caller.user) {
      Ok(())
    } else {
      Err(ServiceError::Forbidden {
        user: caller.user.clone(),
        operation,
      })
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_anonymous_rejected() {
    let policy = AccessPolicy::default();
    assert_eq!(
      policy.authorize(&Caller::anonymous(), "alice", "close"),
      Err(ServiceError::Unauthenticated)
    );
  }

  #[test]
  fn test_creator_allowed_by_default() {
    let policy = AccessPolicy::default();
    assert!(policy.authorize(&Caller::authenticated("alice"), "alice", "close").is_ok());
    assert!(matches!(
      policy.authorize(&Caller::authenticated("bob"), "alice", "close"),
      Err(ServiceError::Forbidden { operation: "close", .. })
    ));
  }

  #[test]
  fn test_operator_only_mode() {
    let policy = AccessPolicy::new(["oracle"], false);
    assert!(policy.authorize(&Caller::authenticated("oracle"), "alice", "resolve").is_ok());
    assert!(policy.authorize(&Caller::authenticated("alice"), "alice", "resolve").is_err());
  }

  #[test]
  fn test_authenticated_flag_without_user_rejected() {
    let caller = Caller {
      user: String::new(),
      authenticated: true,
    };
    assert_eq!(
      AccessPolicy::require_authenticated(&caller),
      Err(ServiceError::Unauthenticated)
    );
  }
}
