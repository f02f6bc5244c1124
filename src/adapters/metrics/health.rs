//! Health State - Liveness and Readiness
//!
//! Readiness depends on the repository being reachable and the process
//! not shutting down. The probes themselves are routed by the API
//! adapter.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Shared health state polled by readiness probes.
#[derive(Debug, Clone)]
pub struct HealthState {
    /// Whether the last repository probe succeeded.
    pub repository_healthy: Arc<AtomicBool>,
    /// Cleared once graceful shutdown starts.
    pub accepting: Arc<AtomicBool>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (all healthy by default).
    #[must_use]
    pub fn new() -> Self {
        Self {
            repository_healthy: Arc::new(AtomicBool::new(true)),
            accepting: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Record the outcome of a repository probe.
    pub fn set_repository_healthy(&self, healthy: bool) {
        self.repository_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Flip readiness off for shutdown.
    pub fn begin_shutdown(&self) {
        self.accepting.store(false, Ordering::Relaxed);
    }

    /// Check if the service is ready to serve traffic.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.repository_healthy.load(Ordering::Relaxed) && self.accepting.load(Ordering::Relaxed)
    }

    /// Liveness probe: always 200 while the process runs.
    pub fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    /// Readiness probe: 200 when ready, 503 otherwise.
    pub fn readiness(&self) -> impl IntoResponse + use<> {
        if self.is_ready() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }
}
