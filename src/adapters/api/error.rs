//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::domain::EngineError;
use crate::usecases::ServiceError;

use super::types::ErrorBody;

/// Error returned by API handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Rejected by the service; state unchanged.
    Service(ServiceError),
    /// Infrastructure failure (journal read, metrics encoding).
    Internal(anyhow::Error),
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self::Service(e)
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self::Service(ServiceError::Engine(e))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}

/// HTTP status for a service rejection.
#[must_use]
pub const fn status_for(e: &ServiceError) -> StatusCode {
    match e {
        ServiceError::Unauthenticated => StatusCode::UNAUTHORIZED,
        ServiceError::Forbidden { .. } => StatusCode::FORBIDDEN,
        ServiceError::Engine(e) => match e {
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::InvalidSide { .. }
            | EngineError::InvalidOutcome { .. }
            | EngineError::InvalidAmount { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::InvalidState { .. }
            | EngineError::AlreadyResolved { .. }
            | EngineError::AlreadyClaimed { .. }
            | EngineError::NotResolved { .. }
            | EngineError::NoWinningStake { .. } => StatusCode::CONFLICT,
            EngineError::Overflow { .. } => StatusCode::BAD_REQUEST,
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Service(e) => (
                status_for(&e),
                ErrorBody {
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                },
            ),
            Self::Internal(e) => {
                error!(error = %e, "Internal error while serving request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        kind: "internal".to_string(),
                        message: "internal error".to_string(),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
