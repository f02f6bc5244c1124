//! Pari-mutuel Settlement Engine: Entry Point
//!
//! Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Open the repository (file or memory backend)
//! 4. Load API tokens from the environment
//! 5. Restore the market service (latest snapshot + journal replay)
//! 6. Spawn the HTTP API (markets, projects, /live, /ready, /metrics)
//! 7. Spawn the snapshot + repository health loop
//! 8. Wait for SIGINT → graceful shutdown (not ready → drain → snapshot → exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use parimutuel_settlement::adapters::api::{self, AppState, StaticTokenIdentity};
use parimutuel_settlement::adapters::metrics::{HealthState, MetricsRegistry};
use parimutuel_settlement::adapters::persistence::{InMemoryRepository, RepositoryImpl};
use parimutuel_settlement::config::{self, StorageBackend};
use parimutuel_settlement::ports::repository::Repository;
use parimutuel_settlement::usecases::{AccessPolicy, MarketService};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = config::loader::load_config(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&config.service.log_level)
                }),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.persistence.backend,
        "Starting pari-mutuel settlement engine"
    );

    // ── 3. Repository ───────────────────────────────────────
    let repository: Arc<dyn Repository> = match config.persistence.backend {
        StorageBackend::File => Arc::new(
            RepositoryImpl::from_data_dir(&config.persistence.data_dir)
                .await
                .context("Failed to open data directory")?,
        ),
        StorageBackend::Memory => {
            warn!("Memory backend selected, state will not survive a restart");
            Arc::new(InMemoryRepository::new())
        }
    };

    // ── 4. Identity ─────────────────────────────────────────
    let identity = Arc::new(
        StaticTokenIdentity::from_env(&config.identity.tokens_env)
            .context("Failed to load API tokens")?,
    );
    info!(tokens = identity.len(), "Identity provider ready");

    // ── 5. Market service ───────────────────────────────────
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);
    let service = Arc::new(
        MarketService::restore(
            Arc::clone(&repository),
            identity,
            AccessPolicy::from_config(&config.access),
            Arc::clone(&metrics),
        )
        .await
        .context("Failed to restore state")?,
    );

    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let health = HealthState::new();

    // ── 6. HTTP API ─────────────────────────────────────────
    let state = AppState {
        service: Arc::clone(&service),
        health: health.clone(),
        metrics,
    };
    let mut api_handle = tokio::spawn(api::serve(
        state,
        config.service.bind_address.clone(),
        config.metrics.enabled,
        shutdown_tx.subscribe(),
    ));

    // ── 7. Snapshot + health loop ───────────────────────────
    let snapshot_handle = tokio::spawn(run_snapshots(
        Arc::clone(&service),
        health.clone(),
        Duration::from_secs(config.persistence.snapshot_interval_seconds),
        shutdown_tx.subscribe(),
    ));

    info!("All tasks spawned, engine is running");

    // ── 8. Wait for SIGINT ──────────────────────────────────
    let api_running = tokio::select! {
        _ = signal::ctrl_c() => {
            info!("SIGINT received, initiating graceful shutdown");
            true
        }
        result = &mut api_handle => {
            match result {
                Ok(Ok(())) => warn!("API server exited unexpectedly"),
                Ok(Err(e)) => error!(error = %e, "API server failed"),
                Err(e) => error!(error = %e, "API task panicked"),
            }
            false
        }
    };

    // ── Graceful shutdown (not ready → drain → snapshot → exit) ──
    health.begin_shutdown();
    let _ = shutdown_tx.send(());
    info!("Shutdown signal broadcast to all tasks");

    // no request may commit after the final snapshot
    if api_running {
        match tokio::time::timeout(Duration::from_secs(10), &mut api_handle).await {
            Ok(Ok(Ok(()))) => info!("API server drained"),
            Ok(Ok(Err(e))) => error!(error = %e, "API server failed while draining"),
            Ok(Err(e)) => error!(error = %e, "API task panicked while draining"),
            Err(_) => {
                warn!("API drain timed out, aborting in-flight requests");
                api_handle.abort();
                let _ = api_handle.await;
            }
        }
    }

    let _ = tokio::time::timeout(Duration::from_secs(10), snapshot_handle).await;

    match service.save_snapshot().await {
        Ok(()) => info!("Final snapshot saved"),
        Err(e) => error!(error = %e, "Failed to save final snapshot"),
    }

    info!("Shutdown complete");
    Ok(())
}

/// Save a snapshot and probe the repository every `interval` until
/// shutdown.
async fn run_snapshots(
    service: Arc<MarketService>,
    health: HealthState,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // first tick fires immediately

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                info!("Snapshot loop received shutdown signal");
                break;
            }
            _ = ticker.tick() => {
                let healthy = service.repository_healthy().await;
                health.set_repository_healthy(healthy);
                if !healthy {
                    warn!("Repository health check failed");
                    continue;
                }
                if let Err(e) = service.save_snapshot().await {
                    error!(error = %e, "Periodic snapshot failed");
                }
            }
        }
    }
}
