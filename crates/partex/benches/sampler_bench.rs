//! Criterion benchmarks for the guided sampler.
//! Focus sizes: n in {50, 200, 1000} states of a seeded random MDP.
//! Results: by default under target/criterion; to store under data/bench, run:
//!   CARGO_TARGET_DIR=data/bench cargo bench -p partex

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use partex::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Two choices per state with two random successors each; the last state is
/// the absorbing goal.
fn random_model(n: usize, seed: u64) -> ExplicitModel {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut model = ExplicitModel::new([0]);
    for s in 0..n - 1 {
        for _ in 0..2 {
            let p = rng.gen_range(0.1..0.9);
            let a = rng.gen_range(0..n);
            let b = rng.gen_range(0..n);
            model.add_choice(s, None, vec![(a, p), (b, 1.0 - p)]);
        }
    }
    model
}

fn bench_sampler(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampler");
    group.sample_size(20);
    for &n in &[50usize, 200, 1000] {
        group.bench_with_input(BenchmarkId::new("unbounded_reach", n), &n, |b, &n| {
            b.iter_batched(
                || random_model(n, 41),
                |model| {
                    let goal = n - 1;
                    let explorer = DefaultExplorer::new(model);
                    let values =
                        UnboundedReachValues::new(Optimization::MaxValue, explorer.state_predicate(move |s: &usize| *s == goal));
                    let mut analyser =
                        CollapsingAnalyser::sampler(explorer, values, QuantitativeVerdict::absolute(1e-3), SamplerCfg::default())
                            .with_cfg(CollapseCfg {
                                round_limit: Some(20_000),
                                ..CollapseCfg::default()
                            });
                    analyser.run()
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_with_input(BenchmarkId::new("unbounded_core", n), &n, |b, &n| {
            b.iter_batched(
                || random_model(n, 42),
                |model| {
                    let explorer = DefaultExplorer::new(model);
                    let mut analyser = CollapsingAnalyser::sampler(
                        explorer,
                        UnboundedCoreValues::new(),
                        QuantitativeVerdict::absolute(1e-2),
                        SamplerCfg::default(),
                    )
                    .with_cfg(CollapseCfg {
                        round_limit: Some(20_000),
                        ..CollapseCfg::default()
                    });
                    analyser.run()
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sampler);
criterion_main!(benches);
