//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! infrastructure (HTTP server, bearer tokens, file I/O, metrics).
//! Each sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `api`: JSON/HTTP API, bearer-token identity
//! - `metrics`: Prometheus metrics export and health state
//! - `persistence`: JSONL event journal and state snapshots

pub mod api;
pub mod metrics;
pub mod persistence;
