//! Market Service - The Engine's Operation Surface
//!
//! Every externally visible operation goes through here:
//! 1. Check the caller is eligible (authenticated, authorized for
//!    close / resolve)
//! 2. Run the operation under the market's lock (validation before
//!    mutation, so a failure leaves state unchanged)
//! 3. Journal the committed event
//! 4. Record metrics and log the transition
//!
//! Locks are released before any `.await`; the journal append happens
//! after the commit and its failure never rolls the commit back. Appends
//! may land out of commit order; each market event carries the revision
//! it produced, and readers of the journal order by it.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::domain::{
  Amount, BetPlaced, EngineError, MarketClosed, MarketCreated, MarketEvent, MarketId,
  MarketMetadata, MarketResolved, MarketSnapshot, Odds, PayoutClaimed, Project, ProjectId,
  ProjectRegistered, SettlementEngine, Side,
};
use crate::ports::identity::{Caller, IdentityProvider};
use crate::ports::repository::{JournalEntry, RegistrySnapshot, Repository, SNAPSHOT_VERSION};

use super::access::AccessPolicy;
use super::error::ServiceError;
use super::market_registry::MarketRegistry;
use super::project_registry::ProjectRegistry;
use super::recovery;
use super::settlement::{SettlementPlanner, SettlementReport};

/// Orchestrates registries, settlement and persistence.
pub struct MarketService {
  markets: MarketRegistry,
  projects: ProjectRegistry,
  engine: SettlementEngine,
  planner: SettlementPlanner,
  access: AccessPolicy,
  repository: Arc<dyn Repository>,
  identity: Arc<dyn IdentityProvider>,
  metrics: Arc<MetricsRegistry>,
}

impl MarketService {
  /// Service with empty registries.
  pub fn new(
    repository: Arc<dyn Repository>,
    identity: Arc<dyn IdentityProvider>,
    access: AccessPolicy,
    metrics: Arc<MetricsRegistry>,
  ) -> Self {
    Self::with_registries(
      MarketRegistry::new(),
      ProjectRegistry::new(),
      repository,
      identity,
      access,
      metrics,
    )
  }

  /// Service restored from the repository's latest snapshot with the
  /// journal replayed on top. Empty when neither exists.
  #[instrument(skip_all)]
  pub async fn restore(
    repository: Arc<dyn Repository>,
    identity: Arc<dyn IdentityProvider>,
    access: AccessPolicy,
    metrics: Arc<MetricsRegistry>,
  ) -> anyhow::Result<Self> {
    let snapshot = repository.load_latest_state().await?;
    match &snapshot {
      Some(snapshot) => {
        anyhow::ensure!(
          snapshot.version == SNAPSHOT_VERSION,
          "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
          snapshot.version
        );
        info!(
          taken_at = %snapshot.taken_at,
          markets = snapshot.markets.len(),
          projects = snapshot.projects.len(),
          "Restoring from snapshot"
        );
      }
      None => info!("No snapshot found, rebuilding from the journal"),
    }

    let entries = repository
      .load_events()
      .await
      .context("Failed to load journal for replay")?;
    let recovered = recovery::recover(snapshot, entries);
    info!(
      replayed = recovered.replayed,
      skipped = recovered.skipped,
      rejected = recovered.rejected,
      "Journal replayed"
    );

    Ok(Self::with_registries(
      MarketRegistry::restore(recovered.next_market_id, recovered.markets),
      ProjectRegistry::restore(recovered.next_project_id, recovered.projects),
      repository,
      identity,
      access,
      metrics,
    ))
  }

  fn with_registries(
    markets: MarketRegistry,
    projects: ProjectRegistry,
    repository: Arc<dyn Repository>,
    identity: Arc<dyn IdentityProvider>,
    access: AccessPolicy,
    metrics: Arc<MetricsRegistry>,
  ) -> Self {
    metrics
      .markets_total
      .set(i64::try_from(markets.len()).unwrap_or(i64::MAX));
    Self {
      markets,
      projects,
      engine: SettlementEngine::new(),
      planner: SettlementPlanner::new(),
      access,
      repository,
      identity,
      metrics,
    }
  }

  // ── Identity ────────────────────────────────

  /// Resolve a credential to a caller. Provider failures degrade to an
  /// anonymous caller, which can read but not mutate.
  pub async fn authenticate(&self, credential: Option<&str>) -> Caller {
    match self.identity.authenticate(credential.map(str::to_owned)).await {
      Ok(caller) => caller,
      Err(e) => {
        warn!(error = %e, "Identity provider failed, treating caller as anonymous");
        Caller::anonymous()
      }
    }
  }

  // ── Markets ─────────────────────────────────

  /// Create an `Open` market owned by the caller.
  #[instrument(skip(self, metadata), fields(user = %caller.user))]
  pub async fn create_market(
    &self,
    caller: &Caller,
    question: &str,
    metadata: MarketMetadata,
  ) -> Result<MarketCreated, ServiceError> {
    let started = Instant::now();
    let result = AccessPolicy::require_authenticated(caller)
      .map(|()| self.markets.create_market(question, metadata, &caller.user));
    let event = self.check("create_market", result)?;

    self.metrics.markets_created.inc();
    self.metrics.markets_total.inc();
    self.metrics.observe_latency("create_market", started);
    info!(
      market_id = event.market.id,
      creator = %event.market.creator,
      "Market created"
    );

    self.journal(event.clone()).await;
    Ok(event)
  }

  /// Consistent snapshot of one market.
  pub fn get_market(&self, market_id: MarketId) -> Result<MarketSnapshot, ServiceError> {
    Ok(self.markets.get_market(market_id)?)
  }

  /// Whether `market_id` was ever allocated.
  #[must_use]
  pub fn market_exists(&self, market_id: MarketId) -> bool {
    self.markets.market_exists(market_id)
  }

  /// Every market in id order.
  #[must_use]
  pub fn list_markets(&self) -> Vec<MarketSnapshot> {
    self.markets.list_markets()
  }

  /// Markets referencing `project_id`, in creation order.
  #[must_use]
  pub fn markets_for_project(&self, project_id: ProjectId) -> Vec<MarketId> {
    self.markets.markets_for_project(project_id)
  }

  /// Pool-ratio quote; `None` for an empty pool.
  pub fn odds(&self, market_id: MarketId) -> Result<Option<Odds>, ServiceError> {
    Ok(self.markets.with_market(market_id, |m| Ok(m.odds()))?)
  }

  /// Place a bet for the caller.
  ///
  /// `side` and `amount` arrive unvalidated from the transport and are
  /// checked under the market's lock after its state.
  #[instrument(skip(self), fields(user = %caller.user))]
  pub async fn place_bet(
    &self,
    caller: &Caller,
    market_id: MarketId,
    side: &str,
    amount: i64,
  ) -> Result<BetPlaced, ServiceError> {
    let started = Instant::now();
    let result = self.place_bet_locked(caller, market_id, side, amount);
    let event = self.check("place_bet", result)?;

    let label = event.side.as_str();
    self.metrics.bets_placed.with_label_values(&[label]).inc();
    self.metrics
      .stake_volume
      .with_label_values(&[label])
      .inc_by(event.amount);
    self.metrics.observe_latency("place_bet", started);
    info!(
      market_id,
      side = %event.side,
      amount = event.amount,
      total_yes = event.total_yes_stake,
      total_no = event.total_no_stake,
      new_bettor = event.new_bettor,
      "Bet placed"
    );

    self.journal(event.clone()).await;
    Ok(event)
  }

  fn place_bet_locked(
    &self,
    caller: &Caller,
    market_id: MarketId,
    side: &str,
    amount: i64,
  ) -> Result<BetPlaced, ServiceError> {
    AccessPolicy::require_authenticated(caller)?;
    let event = self.markets.with_market_mut(market_id, |market| {
      market.ensure_open()?;
      let side: Side = side.parse()?;
      let amount = Amount::try_from(amount)
        .ok()
        .filter(|a| *a > 0)
        .ok_or(EngineError::InvalidAmount {
          amount: i128::from(amount),
        })?;
      market.place_bet(&caller.user, side, amount)
    })?;
    Ok(event)
  }

  /// Stop accepting bets.
  #[instrument(skip(self), fields(user = %caller.user))]
  pub async fn close(
    &self,
    caller: &Caller,
    market_id: MarketId,
  ) -> Result<MarketClosed, ServiceError> {
    let started = Instant::now();
    let result = self.close_locked(caller, market_id);
    let event = self.check("close", result)?;

    self.metrics.markets_closed.inc();
    self.metrics.observe_latency("close", started);
    info!(
      market_id,
      total_yes = event.total_yes_stake,
      total_no = event.total_no_stake,
      "Market closed"
    );

    self.journal(event.clone()).await;
    Ok(event)
  }

  fn close_locked(&self, caller: &Caller, market_id: MarketId) -> Result<MarketClosed, ServiceError> {
    let handle = self.markets.handle(market_id)?;
    let mut market = handle.write();
    self.access.authorize(caller, market.creator(), "close")?;
    Ok(market.close(&caller.user)?)
  }

  /// Fix the outcome of a closed market.
  #[instrument(skip(self), fields(user = %caller.user))]
  pub async fn resolve(
    &self,
    caller: &Caller,
    market_id: MarketId,
    outcome: &str,
  ) -> Result<MarketResolved, ServiceError> {
    let started = Instant::now();
    let result = self.resolve_locked(caller, market_id, outcome);
    let event = self.check("resolve", result)?;

    self.metrics
      .markets_resolved
      .with_label_values(&[event.outcome.as_str()])
      .inc();
    self.metrics.observe_latency("resolve", started);
    if event.escrowed {
      self.metrics.markets_escrowed.inc();
      warn!(
        market_id,
        outcome = %event.outcome,
        pool = event.losing_pool,
        "Market resolved to a side nobody backed, pool escrowed"
      );
    } else {
      info!(
        market_id,
        outcome = %event.outcome,
        winning_pool = event.winning_pool,
        losing_pool = event.losing_pool,
        "Market resolved"
      );
    }

    self.journal(event.clone()).await;
    Ok(event)
  }

  fn resolve_locked(
    &self,
    caller: &Caller,
    market_id: MarketId,
    outcome: &str,
  ) -> Result<MarketResolved, ServiceError> {
    let handle = self.markets.handle(market_id)?;
    let mut market = handle.write();
    self.access.authorize(caller, market.creator(), "resolve")?;
    market.ensure_resolvable()?;
    let outcome = Side::parse_outcome(outcome)?;
    Ok(market.resolve(outcome, &caller.user)?)
  }

  // ── Settlement ──────────────────────────────

  /// Preview what `user` is owed on a resolved market.
  pub fn compute_payout(&self, market_id: MarketId, user: &str) -> Result<Amount, ServiceError> {
    let result = self
      .markets
      .with_market(market_id, |m| self.engine.compute_payout(m, user))
      .map_err(ServiceError::from);
    self.check("compute_payout", result)
  }

  /// Pay the caller's winning stake out, at most once.
  #[instrument(skip(self), fields(user = %caller.user))]
  pub async fn claim_payout(
    &self,
    caller: &Caller,
    market_id: MarketId,
  ) -> Result<PayoutClaimed, ServiceError> {
    let started = Instant::now();
    let result = AccessPolicy::require_authenticated(caller).and_then(|()| {
      self
        .markets
        .with_market_mut(market_id, |m| self.engine.claim_payout(m, &caller.user))
        .map_err(ServiceError::from)
    });
    let event = self.check("claim_payout", result)?;

    self.metrics.payouts_claimed.inc();
    self.metrics.payout_volume.inc_by(event.payout);
    self.metrics.observe_latency("claim_payout", started);
    info!(
      market_id,
      stake = event.stake,
      payout = event.payout,
      "Payout claimed"
    );

    self.journal(event.clone()).await;
    Ok(event)
  }

  /// Full settlement picture of a resolved market.
  pub fn settlement_report(&self, market_id: MarketId) -> Result<SettlementReport, ServiceError> {
    let result = self
      .markets
      .with_market(market_id, |m| self.planner.report(m))
      .map_err(ServiceError::from);
    self.check("settlement_report", result)
  }

  /// Journal entries recorded for one market, in commit order.
  pub async fn market_history(&self, market_id: MarketId) -> anyhow::Result<Option<Vec<JournalEntry>>> {
    if !self.markets.market_exists(market_id) {
      return Ok(None);
    }
    let mut entries: Vec<JournalEntry> = self
      .repository
      .load_events()
      .await?
      .into_iter()
      .filter(|e| e.event.market_id() == Some(market_id))
      .collect();
    entries.sort_by_key(|e| e.event.revision());
    Ok(Some(entries))
  }

  // ── Projects ────────────────────────────────

  /// Register a project owned by the caller.
  #[instrument(skip(self, description), fields(user = %caller.user))]
  pub async fn register_project(
    &self,
    caller: &Caller,
    name: &str,
    description: &str,
  ) -> Result<ProjectRegistered, ServiceError> {
    let result = AccessPolicy::require_authenticated(caller)
      .map(|()| self.projects.register_project(name, description, &caller.user));
    let event = self.check("register_project", result)?;

    self.metrics.projects_registered.inc();
    info!(project_id = event.project.id, name = %event.project.name, "Project registered");

    self.journal(event.clone()).await;
    Ok(event)
  }

  /// Look up a project.
  pub fn get_project(&self, project_id: ProjectId) -> Result<Project, ServiceError> {
    Ok(self.projects.get_project(project_id)?)
  }

  /// Whether `project_id` was ever allocated.
  #[must_use]
  pub fn project_exists(&self, project_id: ProjectId) -> bool {
    self.projects.project_exists(project_id)
  }

  /// Every project in id order.
  #[must_use]
  pub fn list_projects(&self) -> Vec<Project> {
    self.projects.list_projects()
  }

  // ── Persistence ─────────────────────────────

  /// Full registry image.
  ///
  /// Each market is copied under its own read lock; the image is
  /// consistent per market, not across markets.
  #[must_use]
  pub fn snapshot(&self) -> RegistrySnapshot {
    let (next_market_id, markets) = self.markets.export();
    let (next_project_id, projects) = self.projects.export();
    RegistrySnapshot {
      version: SNAPSHOT_VERSION.to_string(),
      taken_at: Utc::now(),
      next_market_id,
      markets,
      next_project_id,
      projects,
    }
  }

  /// Take a snapshot and hand it to the repository.
  #[instrument(skip(self))]
  pub async fn save_snapshot(&self) -> anyhow::Result<()> {
    let snapshot = self.snapshot();
    self.repository.save_state(&snapshot).await?;
    debug!(
      markets = snapshot.markets.len(),
      projects = snapshot.projects.len(),
      "Snapshot saved"
    );
    Ok(())
  }

  /// Whether the repository answers its health probe.
  pub async fn repository_healthy(&self) -> bool {
    self.repository.is_healthy().await
  }

  // ── Internals ───────────────────────────────

  fn check<T>(
    &self,
    operation: &'static str,
    result: Result<T, ServiceError>,
  ) -> Result<T, ServiceError> {
    if let Err(e) = &result {
      self.metrics.record_rejection(operation, e.kind());
      warn!(operation, kind = e.kind(), error = %e, "Operation rejected");
    }
    result
  }

  async fn journal(&self, event: impl Into<MarketEvent>) {
    let entry = JournalEntry::new(event.into());
    if let Err(e) = self.repository.append_event(&entry).await {
      self.metrics.journal_failures.inc();
      error!(
        error = %e,
        event = entry.event.name(),
        entry_id = %entry.id,
        "Failed to journal committed event"
      );
    }
  }
}
