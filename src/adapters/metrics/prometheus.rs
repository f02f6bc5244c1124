//! Prometheus Metrics Registry - Settlement Observability
//!
//! Registers the engine's counters and gauges and renders them in the
//! text exposition format for the `/metrics` route. Covers market
//! lifecycle, stake volume, payouts, rejections and journal health.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Centralized Prometheus metrics for the settlement engine.
///
/// All metrics follow the naming convention `settlement_*`.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Markets created.
    pub markets_created: IntCounter,
    /// Markets currently known to the registry.
    pub markets_total: IntGauge,
    /// Accepted bets by side.
    pub bets_placed: IntCounterVec,
    /// Staked amount by side.
    pub stake_volume: IntCounterVec,
    /// Markets closed.
    pub markets_closed: IntCounter,
    /// Markets resolved by outcome.
    pub markets_resolved: IntCounterVec,
    /// Markets resolved to a side nobody backed.
    pub markets_escrowed: IntCounter,
    /// Payouts claimed.
    pub payouts_claimed: IntCounter,
    /// Total amount paid out.
    pub payout_volume: IntCounter,
    /// Rejected operations by operation and error kind.
    pub operations_rejected: IntCounterVec,
    /// Journal appends that failed after commit.
    pub journal_failures: IntCounter,
    /// Projects registered.
    pub projects_registered: IntCounter,
    /// Mutating operation latency (microseconds).
    pub operation_latency_us: HistogramVec,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let markets_created = IntCounter::new(
            "settlement_markets_created_total",
            "Total markets created",
        )?;

        let markets_total = IntGauge::new(
            "settlement_markets",
            "Markets currently held by the registry",
        )?;

        let bets_placed = IntCounterVec::new(
            Opts::new("settlement_bets_placed_total", "Total accepted bets"),
            &["side"],
        )?;

        let stake_volume = IntCounterVec::new(
            Opts::new("settlement_stake_volume_total", "Total amount staked"),
            &["side"],
        )?;

        let markets_closed = IntCounter::new(
            "settlement_markets_closed_total",
            "Total markets closed to betting",
        )?;

        let markets_resolved = IntCounterVec::new(
            Opts::new("settlement_markets_resolved_total", "Total markets resolved"),
            &["outcome"],
        )?;

        let markets_escrowed = IntCounter::new(
            "settlement_markets_escrowed_total",
            "Markets resolved to a side with zero stake",
        )?;

        let payouts_claimed = IntCounter::new(
            "settlement_payouts_claimed_total",
            "Total payouts claimed",
        )?;

        let payout_volume = IntCounter::new(
            "settlement_payout_volume_total",
            "Total amount paid to winners",
        )?;

        let operations_rejected = IntCounterVec::new(
            Opts::new(
                "settlement_operations_rejected_total",
                "Operations rejected, by error kind",
            ),
            &["operation", "kind"],
        )?;

        let journal_failures = IntCounter::new(
            "settlement_journal_failures_total",
            "Event journal appends that failed",
        )?;

        let projects_registered = IntCounter::new(
            "settlement_projects_registered_total",
            "Total projects registered",
        )?;

        let operation_latency_us = HistogramVec::new(
            HistogramOpts::new(
                "settlement_operation_latency_us",
                "Mutating operation latency in microseconds",
            )
            .buckets(vec![5.0, 20.0, 100.0, 500.0, 1000.0, 5000.0, 20000.0]),
            &["operation"],
        )?;

        registry.register(Box::new(markets_created.clone()))?;
        registry.register(Box::new(markets_total.clone()))?;
        registry.register(Box::new(bets_placed.clone()))?;
        registry.register(Box::new(stake_volume.clone()))?;
        registry.register(Box::new(markets_closed.clone()))?;
        registry.register(Box::new(markets_resolved.clone()))?;
        registry.register(Box::new(markets_escrowed.clone()))?;
        registry.register(Box::new(payouts_claimed.clone()))?;
        registry.register(Box::new(payout_volume.clone()))?;
        registry.register(Box::new(operations_rejected.clone()))?;
        registry.register(Box::new(journal_failures.clone()))?;
        registry.register(Box::new(projects_registered.clone()))?;
        registry.register(Box::new(operation_latency_us.clone()))?;

        Ok(Self {
            registry,
            markets_created,
            markets_total,
            bets_placed,
            stake_volume,
            markets_closed,
            markets_resolved,
            markets_escrowed,
            payouts_claimed,
            payout_volume,
            operations_rejected,
            journal_failures,
            projects_registered,
            operation_latency_us,
        })
    }

    /// Count a rejected operation.
    pub fn record_rejection(&self, operation: &str, kind: &str) {
        self.operations_rejected
            .with_label_values(&[operation, kind])
            .inc();
    }

    /// Observe how long a mutating operation took.
    pub fn observe_latency(&self, operation: &str, started: std::time::Instant) {
        self.operation_latency_us
            .with_label_values(&[operation])
            .observe(started.elapsed().as_secs_f64() * 1_000_000.0);
    }

    /// Render every metric family in the text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_registered_metrics() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.markets_created.inc();
        metrics.bets_placed.with_label_values(&["yes"]).inc();
        metrics.record_rejection("place_bet", "invalid_side");

        let text = metrics.render().unwrap();
        assert!(text.contains("settlement_markets_created_total 1"));
        assert!(text.contains("settlement_bets_placed_total{side=\"yes\"} 1"));
        assert!(text.contains("kind=\"invalid_side\""));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = MetricsRegistry::new().unwrap();
        let b = MetricsRegistry::new().unwrap();
        a.payouts_claimed.inc();
        assert_eq!(b.payouts_claimed.get(), 0);
    }
}
