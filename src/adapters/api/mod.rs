//! Settlement HTTP API Adapter
//!
//! Exposes the market service over JSON/HTTP with axum 0.7, resolves
//! bearer tokens to callers, and maps service rejections to status
//! codes.
//!
//! Sub-modules:
//! - `auth`: Static bearer-token identity provider
//! - `error`: Rejection to HTTP status mapping
//! - `routes`: Router, handlers and the server loop
//! - `types`: API request/response type definitions

pub mod auth;
pub mod error;
pub mod routes;
pub mod types;

pub use auth::StaticTokenIdentity;
pub use routes::{AppState, router, serve};
