//! Metrics and Monitoring Adapters
//!
//! Prometheus metrics rendered on `/metrics` and the health state
//! behind `/live` and `/ready`.

pub mod health;
pub mod prometheus;

pub use health::HealthState;
pub use prometheus::MetricsRegistry;
