//! Retransmission protocol with an unbounded retry counter.
//!
//! Purpose
//! - Show the analysers on a model that is infinite but whose tail carries
//!   vanishing probability: each attempt delivers with 0.5, crashes the link
//!   with 0.2 and retries with 0.3.
//! - The sender may also give up. Maximal delivery probability is 0.5 / 0.7.
//!
//! Why this shape
//! - Unbounded reachability only needs a prefix of the retry chain; the
//!   bounded variant and core coverage show the other policies on the same
//!   generator.

use std::time::Instant;

use partex::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Link {
    Attempt(u32),
    Delivered,
    Failed,
}

struct Retransmission;

impl Generator for Retransmission {
    type State = Link;

    fn initial_states(&self) -> Vec<Link> {
        vec![Link::Attempt(0)]
    }

    fn choices(&self, state: &Link) -> Vec<GeneratedChoice<Link>> {
        match state {
            Link::Attempt(k) => vec![
                GeneratedChoice::new(
                    Some("send".into()),
                    vec![(Link::Delivered, 0.5), (Link::Failed, 0.2), (Link::Attempt(k + 1), 0.3)],
                ),
                GeneratedChoice::new(Some("abort".into()), vec![(Link::Failed, 1.0)]),
            ],
            Link::Delivered | Link::Failed => Vec::new(),
        }
    }
}

fn main() {
    let start = Instant::now();
    let explorer = DefaultExplorer::new(Retransmission);
    let delivered = explorer.state_predicate(|s: &Link| *s == Link::Delivered);
    let values = UnboundedReachValues::new(Optimization::MaxValue, delivered);
    let mut analyser =
        CollapsingAnalyser::sampler(explorer, values, QuantitativeVerdict::absolute(1e-6), SamplerCfg::default());
    analyser.run();
    println!(
        "unbounded delivery: {} (exact {:.6}) [{}] in {:.1} ms",
        analyser.bounds(StateId(0)),
        0.5 / 0.7,
        analyser.statistics(),
        start.elapsed().as_secs_f64() * 1e3
    );

    let explorer = DefaultExplorer::new(Retransmission);
    let delivered = explorer.state_predicate(|s: &Link| *s == Link::Delivered);
    let target = move |s: StateId| {
        if delivered(s) {
            ReachTarget::Goal
        } else {
            ReachTarget::Unknown
        }
    };
    let values = BoundedReachValues::new(Optimization::MaxValue, target, StepStorage::Dense, true);
    let mut bounded = PrefixAnalyser::sampler(explorer, values, QuantitativeVerdict::absolute(1e-6), 3, PrefixCfg::default());
    bounded.run();
    // Three sends: 0.5 · (1 + 0.3 + 0.09).
    println!("delivery within 3 steps: {} (exact {:.6})", bounded.bounds(StateId(0)), 0.5 * 1.39);

    let explorer = DefaultExplorer::new(Retransmission);
    let mut core = CollapsingAnalyser::sampler(
        explorer,
        UnboundedCoreValues::new(),
        QuantitativeVerdict::absolute(1e-3),
        SamplerCfg::default(),
    );
    core.run();
    let model = core.model();
    println!(
        "core: {} of {} explored states keep escape probability at {}",
        model.explored_count(),
        core.explorer().explored_count(),
        core.bounds(StateId(0))
    );
}
