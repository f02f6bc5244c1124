//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::{AppConfig, StorageBackend};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    service = %config.service.name,
    bind = %config.service.bind_address,
    operators = config.access.operators.len(),
    backend = ?config.persistence.backend,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
fn validate_config(config: &AppConfig) -> Result<()> {
  // Service validation
  anyhow::ensure!(
    !config.service.name.trim().is_empty(),
    "service.name must not be empty"
  );
  anyhow::ensure!(
    LOG_LEVELS.contains(&config.service.log_level.to_ascii_lowercase().as_str()),
    "service.log_level must be one of {LOG_LEVELS:?}, got {}",
    config.service.log_level
  );
  config
    .service
    .bind_address
    .parse::<SocketAddr>()
    .with_context(|| {
      format!(
        "service.bind_address is not a socket address: {}",
        config.service.bind_address
      )
    })?;

  // Access validation
  for (i, operator) in config.access.operators.iter().enumerate() {
    anyhow::ensure!(
      !operator.trim().is_empty(),
      "access.operators[{i}] must not be empty"
    );
  }
  anyhow::ensure!(
    config.access.creator_may_resolve || !config.access.operators.is_empty(),
    "No one could resolve markets: set access.operators or enable creator_may_resolve"
  );

  // Identity validation
  anyhow::ensure!(
    !config.identity.tokens_env.trim().is_empty(),
    "identity.tokens_env must not be empty"
  );

  // Persistence validation
  if config.persistence.backend == StorageBackend::File {
    anyhow::ensure!(
      !config.persistence.data_dir.trim().is_empty(),
      "persistence.data_dir must not be empty"
    );
  }
  anyhow::ensure!(
    config.persistence.snapshot_interval_seconds > 0,
    "persistence.snapshot_interval_seconds must be positive"
  );

  Ok(())
}
