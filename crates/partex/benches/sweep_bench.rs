//! Criterion benchmarks for the global sweep and component collapsing.
//! Focus sizes: n in {50, 200, 1000} states.
//! Results: by default under target/criterion; to store under data/bench, run:
//!   CARGO_TARGET_DIR=data/bench cargo bench -p partex

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use partex::prelude::*;
use partex::quotient::DynamicQuotient;
use rand::{rngs::StdRng, Rng, SeedableRng};

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

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");
    group.sample_size(20);
    for &n in &[50usize, 200, 1000] {
        group.bench_with_input(BenchmarkId::new("global_reach", n), &n, |b, &n| {
            b.iter_batched(
                || random_model(n, 43),
                |model| {
                    let goal = n - 1;
                    let explorer = DefaultExplorer::new(model);
                    let values =
                        UnboundedReachValues::new(Optimization::MaxValue, explorer.state_predicate(move |s: &usize| *s == goal));
                    let mut analyser = CollapsingAnalyser::global(explorer, values, QuantitativeVerdict::absolute(1e-6))
                        .with_cfg(CollapseCfg {
                            round_limit: Some(10_000),
                            ..CollapseCfg::default()
                        });
                    analyser.run()
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_with_input(BenchmarkId::new("collapse", n), &n, |b, &n| {
            b.iter_batched(
                || {
                    let mut explorer = DefaultExplorer::new(random_model(n, 44));
                    explorer.explore_reachable(&[StateId(0)]);
                    explorer
                },
                |explorer| {
                    let system = explorer.partial_system();
                    let recent = system.explored_states().collect();
                    let mut quotient = DynamicQuotient::new();
                    quotient.update_components(system, &recent, |s| system.is_explored(s)).len()
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sweep);
criterion_main!(benches);
