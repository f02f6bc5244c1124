//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml`. Secrets (API
//! tokens) never live in the file; only the name of the environment
//! variable holding them does.

pub mod loader;

use serde::Deserialize;

/// Top-level service configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the service starts listening.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and HTTP listener.
  pub service: ServiceConfig,
  /// Who may close and resolve markets.
  #[serde(default)]
  pub access: AccessConfig,
  /// Caller identity source.
  #[serde(default)]
  pub identity: IdentityConfig,
  /// Metrics export.
  #[serde(default)]
  pub metrics: MetricsConfig,
  /// Journal and snapshot storage.
  #[serde(default)]
  pub persistence: PersistenceConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// HTTP API bind address.
  #[serde(default = "default_bind_address")]
  pub bind_address: String,
}

/// Authorization for privileged operations.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
  /// Users allowed to close / resolve any market.
  #[serde(default)]
  pub operators: Vec<String>,
  /// Whether a market's creator may close / resolve it.
  #[serde(default = "default_true")]
  pub creator_may_resolve: bool,
}

impl Default for AccessConfig {
  fn default() -> Self {
    Self {
      operators: Vec::new(),
      creator_may_resolve: true,
    }
  }
}

/// Identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
  /// Environment variable holding `token:user` pairs.
  #[serde(default = "default_tokens_env")]
  pub tokens_env: String,
}

impl Default for IdentityConfig {
  fn default() -> Self {
    Self {
      tokens_env: default_tokens_env(),
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Serve `/metrics` on the API listener.
  #[serde(default = "default_true")]
  pub enabled: bool,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self { enabled: true }
  }
}

/// Where state lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
  /// JSONL journal and JSON snapshots under `data_dir`.
  File,
  /// Process memory only; nothing survives a restart.
  Memory,
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
  /// Storage backend.
  #[serde(default = "default_backend")]
  pub backend: StorageBackend,
  /// Directory for the event journal and snapshots.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
  /// State snapshot interval (seconds).
  #[serde(default = "default_snapshot_interval")]
  pub snapshot_interval_seconds: u64,
}

impl Default for PersistenceConfig {
  fn default() -> Self {
    Self {
      backend: default_backend(),
      data_dir: default_data_dir(),
      snapshot_interval_seconds: default_snapshot_interval(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_bind_address() -> String {
  "0.0.0.0:8080".to_string()
}

fn default_true() -> bool {
  true
}

fn default_tokens_env() -> String {
  "SETTLEMENT_API_TOKENS".to_string()
}

fn default_backend() -> StorageBackend {
  StorageBackend::File
}

fn default_data_dir() -> String {
  "./data".to_string()
}

fn default_snapshot_interval() -> u64 {
  60
}
