//! Bearer-token Identity - Static Token Table
//!
//! Maps opaque bearer tokens to user ids. The table comes from an
//! environment variable (`token:user,token:user`) so secrets never sit
//! in `config.toml`. Unknown or missing tokens yield an anonymous
//! caller rather than an error.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use tracing::{debug, warn};

use crate::domain::UserId;
use crate::ports::identity::{Caller, IdentityProvider};

/// Identity provider backed by a fixed token table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenIdentity {
    /// token -> user id.
    tokens: HashMap<String, UserId>,
}

impl StaticTokenIdentity {
    /// Build from `(token, user)` pairs.
    pub fn from_pairs<I, T, U>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (T, U)>,
        T: Into<String>,
        U: Into<UserId>,
    {
        Self {
            tokens: pairs
                .into_iter()
                .map(|(t, u)| (t.into(), u.into()))
                .collect(),
        }
    }

    /// Parse a `token:user,token:user` list.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut tokens = HashMap::new();
        for (i, pair) in raw.split(',').map(str::trim).enumerate() {
            if pair.is_empty() {
                continue;
            }
            let (token, user) = pair
                .split_once(':')
                .with_context(|| format!("token entry {i} is missing ':'"))?;
            let (token, user) = (token.trim(), user.trim());
            anyhow::ensure!(
                !token.is_empty() && !user.is_empty(),
                "token entry {i} has an empty token or user"
            );
            anyhow::ensure!(
                tokens.insert(token.to_string(), user.to_string()).is_none(),
                "token entry {i} repeats an earlier token"
            );
        }
        Ok(Self { tokens })
    }

    /// Load the table from the environment variable `var`.
    ///
    /// An unset variable yields an empty table: every caller is
    /// anonymous and the API is read-only.
    pub fn from_env(var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(raw) => Self::parse(&raw).with_context(|| format!("Invalid {var}")),
            Err(std::env::VarError::NotPresent) => {
                warn!(var, "No API tokens configured, API is read-only");
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {var}")),
        }
    }

    /// Number of known tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no token is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenIdentity {
    async fn authenticate(&self, credential: Option<String>) -> Result<Caller> {
        let Some(token) = credential else {
            return Ok(Caller::anonymous());
        };
        match self.tokens.get(&token) {
            Some(user) => Ok(Caller::authenticated(user.clone())),
            None => {
                debug!("Unknown bearer token");
                Ok(Caller::anonymous())
            }
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_parse_pairs() {
        let ids = StaticTokenIdentity::parse("t1:alice, t2:bob,").unwrap();
        assert_eq!(ids.len(), 2);
        assert!(StaticTokenIdentity::parse("t1alice").is_err());
        assert!(StaticTokenIdentity::parse("t1:").is_err());
        assert!(StaticTokenIdentity::parse("t1:a,t1:b").is_err());
        assert!(StaticTokenIdentity::parse("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_authenticate() {
        let ids = StaticTokenIdentity::from_pairs([("t1", "alice")]);
        assert_eq!(
            ids.authenticate(Some("t1".into())).await.unwrap(),
            Caller::authenticated("alice")
        );
        assert_eq!(ids.authenticate(Some("t2".into())).await.unwrap(), Caller::anonymous());
        assert_eq!(ids.authenticate(None).await.unwrap(), Caller::anonymous());
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_missing_env_is_read_only() {
        let ids = StaticTokenIdentity::from_env("SETTLEMENT_TEST_TOKENS_UNSET_7F3A").unwrap();
        assert!(ids.is_empty());
    }
}
