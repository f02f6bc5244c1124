//! Service-level errors: engine rejections plus caller eligibility.

use thiserror::Error;

use crate::domain::{EngineError, UserId};

/// Everything the market service can reject a call with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Rejected by the ledger, state machine or settlement engine.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The identity provider did not vouch for the caller.
    #[error("caller is not authenticated")]
    Unauthenticated,

    /// The caller is authenticated but not allowed to do this.
    #[error("{user} is not allowed to {operation}")]
    Forbidden {
        user: UserId,
        operation: &'static str,
    },
}

impl ServiceError {
    /// Stable snake_case tag for the failure kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Engine(e) => e.kind(),
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden { .. } => "forbidden",
        }
    }

    /// The underlying engine rejection, if this is one.
    #[must_use]
    pub const fn engine(&self) -> Option<&EngineError> {
        match self {
            Self::Engine(e) => Some(e),
            _ => None,
        }
    }
}
