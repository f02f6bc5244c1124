//! Settlement Benchmarks: Hot-Path Performance Validation
//!
//! Benchmarks the domain operations that run on every request: bet
//! placement under the market lock, payout computation and full
//! settlement reports.
//!
//! Run with: cargo bench --bench settlement_bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use parimutuel_settlement::domain::{
    Market, MarketMetadata, SettlementEngine, Side, pari_mutuel_payout,
};
use parimutuel_settlement::usecases::{MarketRegistry, SettlementPlanner};

fn resolved_market(bettors: usize) -> Market {
    let mut market = Market::new(1, "Q", MarketMetadata::default(), "creator");
    for i in 0..bettors {
        let side = if i % 3 == 0 { Side::No } else { Side::Yes };
        market
            .place_bet(&format!("user{i}"), side, 10 + i as u64)
            .unwrap();
    }
    market.close("creator").unwrap();
    market.resolve(Side::Yes, "creator").unwrap();
    market
}

/// Benchmark the raw payout formula.
fn bench_payout_formula(c: &mut Criterion) {
    c.bench_function("pari_mutuel_payout", |b| {
        b.iter(|| {
            let _payout = pari_mutuel_payout(
                black_box(1_250),
                black_box(90_000),
                black_box(45_000),
            );
        });
    });
}

/// Benchmark repeat bets by an existing bettor.
fn bench_place_bet(c: &mut Criterion) {
    let mut market = Market::new(1, "Q", MarketMetadata::default(), "creator");
    market.place_bet("alice", Side::Yes, 1).unwrap();

    c.bench_function("place_bet_existing_user", |b| {
        b.iter(|| {
            let _event = market.place_bet(black_box("alice"), Side::Yes, black_box(1));
        });
    });
}

/// Benchmark bet placement through the registry lock.
fn bench_registry_bet(c: &mut Criterion) {
    let registry = MarketRegistry::new();
    registry.create_market("Q", MarketMetadata::default(), "creator");

    c.bench_function("registry_place_bet", |b| {
        b.iter(|| {
            let _event = registry.with_market_mut(1, |m| m.place_bet("bob", Side::No, 1));
        });
    });
}

/// Benchmark payout preview for one winner among many.
fn bench_compute_payout(c: &mut Criterion) {
    let market = resolved_market(1_000);
    let engine = SettlementEngine::new();

    c.bench_function("compute_payout_1000_bettors", |b| {
        b.iter(|| {
            let _payout = engine.compute_payout(&market, black_box("user500"));
        });
    });
}

/// Benchmark full settlement reports at increasing market sizes.
fn bench_settlement_report(c: &mut Criterion) {
    let planner = SettlementPlanner::new();
    let mut group = c.benchmark_group("settlement_report");
    for bettors in [10, 100, 1_000, 10_000] {
        let market = resolved_market(bettors);
        group.bench_with_input(BenchmarkId::from_parameter(bettors), &market, |b, m| {
            b.iter(|| {
                let _report = planner.report(black_box(m));
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_payout_formula,
    bench_place_bet,
    bench_registry_bet,
    bench_compute_payout,
    bench_settlement_report,
);
criterion_main!(benches);
