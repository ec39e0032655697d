//! Bounded-horizon analysis over `(state, remaining steps)`.
//!
//! No quotient is needed: every path consumes one step per transition, so any
//! cycle is cut by the step budget. A round walks forward from the initial
//! state with the full budget and backs up the walk newest-step-first.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, warn};

use super::cfg::PrefixCfg;
use super::{Analyser, Progress, ProgressObserver, Statistics};
use crate::bounds::Bounds;
use crate::explorer::Explorer;
use crate::model::{PartialSystem, StateId};
use crate::values::{optimal, PrefixValues};
use crate::verdict::Verdict;

/// One pending backup of `(state, remaining)` with the choice taken there.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrefixUpdate {
    pub state: StateId,
    pub remaining: usize,
    /// Index into the state's choices.
    pub selected: usize,
}

impl PrefixUpdate {
    pub fn apply<E: Explorer + ?Sized, V: PrefixValues + ?Sized>(&self, explorer: &E, values: &mut V) -> Bounds {
        let choices = explorer.choices(self.state);
        values.update(self.state, self.remaining, choices, &choices[self.selected])
    }
}

/// How a prefix analyser picks the pairs to back up in one round.
pub trait PrefixStrategy<E: Explorer, V: PrefixValues> {
    fn round(&mut self, explorer: &mut E, values: &V, initial: StateId, step_bound: usize) -> Vec<PrefixUpdate>;

    fn record(&self, _statistics: &mut Statistics) {}
}

/// Forward walk along greedy choices, sampling successors by
/// `probability × width at remaining − 1`.
pub struct PrefixSampler {
    cfg: PrefixCfg,
    rng: StdRng,
    truncated_rounds: u64,
}

impl PrefixSampler {
    pub fn new(cfg: PrefixCfg) -> Self {
        Self {
            cfg,
            rng: StdRng::seed_from_u64(cfg.seed),
            truncated_rounds: 0,
        }
    }

    /// Rounds that ended at the exploration cap.
    pub fn truncated_rounds(&self) -> u64 {
        self.truncated_rounds
    }
}

impl<E: Explorer, V: PrefixValues> PrefixStrategy<E, V> for PrefixSampler {
    fn round(&mut self, explorer: &mut E, values: &V, initial: StateId, step_bound: usize) -> Vec<PrefixUpdate> {
        let mut updates = Vec::new();
        let mut state = initial;
        let mut remaining = step_bound;
        let mut explores = 0;

        while remaining > 0 {
            let choices = explorer.choices(state);
            let Some(selected) = optimal(0..choices.len(), |i| values.score(state, remaining, &choices[i])) else {
                break;
            };
            updates.push(PrefixUpdate {
                state,
                remaining,
                selected,
            });
            let next = choices[selected]
                .distribution
                .sample_weighted(&mut self.rng, |s, p| p * values.difference(s, remaining - 1));
            let Some(next) = next else {
                break;
            };
            if !explorer.is_explored(next) {
                if explores == self.cfg.explore_cap {
                    self.truncated_rounds += 1;
                    break;
                }
                explores += 1;
                explorer.explore_state(next);
            }
            state = next;
            remaining -= 1;
        }
        updates.reverse();
        updates
    }
}

/// Bounded-horizon analyser driven by strategy `S`.
pub struct PrefixAnalyser<E, V, S = PrefixSampler> {
    explorer: E,
    values: V,
    verdict: Box<dyn Verdict>,
    strategy: S,
    step_bound: usize,
    round_limit: Option<u64>,
    rounds: u64,
    observer: Option<ProgressObserver>,
    limited: bool,
}

impl<E: Explorer, V: PrefixValues> PrefixAnalyser<E, V, PrefixSampler> {
    pub fn sampler(explorer: E, values: V, verdict: impl Verdict + 'static, step_bound: usize, cfg: PrefixCfg) -> Self {
        let mut analyser = Self::with_strategy(explorer, values, verdict, step_bound, PrefixSampler::new(cfg));
        analyser.round_limit = cfg.round_limit;
        analyser
    }
}

impl<E, V, S> PrefixAnalyser<E, V, S>
where
    E: Explorer,
    V: PrefixValues,
    S: PrefixStrategy<E, V>,
{
    pub fn with_strategy(explorer: E, values: V, verdict: impl Verdict + 'static, step_bound: usize, strategy: S) -> Self {
        Self {
            explorer,
            values,
            verdict: Box::new(verdict),
            strategy,
            step_bound,
            round_limit: None,
            rounds: 0,
            observer: None,
            limited: false,
        }
    }

    pub fn with_round_limit(mut self, limit: Option<u64>) -> Self {
        self.round_limit = limit;
        self
    }

    pub fn with_observer(mut self, observer: impl FnMut(&Progress) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn step_bound(&self) -> usize {
        self.step_bound
    }

    pub fn values(&self) -> &V {
        &self.values
    }

    pub fn explorer(&self) -> &E {
        &self.explorer
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn was_limited(&self) -> bool {
        self.limited
    }

    fn notify(&mut self) {
        if self.observer.is_none() {
            return;
        }
        let progress = Progress {
            rounds: self.rounds,
            explored_states: self.explorer.explored_count(),
            initial_bounds: self
                .explorer
                .initial_states()
                .iter()
                .map(|&s| (s, self.values.bounds(s, self.step_bound)))
                .collect(),
        };
        if let Some(observer) = self.observer.as_mut() {
            observer(&progress);
        }
    }
}

impl<E, V, S> Analyser for PrefixAnalyser<E, V, S>
where
    E: Explorer,
    V: PrefixValues,
    S: PrefixStrategy<E, V>,
{
    fn run(&mut self) -> bool {
        self.limited = false;
        let initials = self.explorer.initial_states().to_vec();
        for initial in initials {
            self.explorer.explore_state(initial);
            while !self
                .verdict
                .is_solved(&self.values.bounds(initial, self.step_bound))
            {
                if let Some(limit) = self.round_limit {
                    if self.rounds >= limit {
                        warn!(
                            limit,
                            %initial,
                            bounds = %self.values.bounds(initial, self.step_bound),
                            "round limit reached before the verdict was met"
                        );
                        self.limited = true;
                        return false;
                    }
                }
                let updates = self
                    .strategy
                    .round(&mut self.explorer, &self.values, initial, self.step_bound);
                for update in &updates {
                    update.apply(&self.explorer, &mut self.values);
                }
                self.rounds += 1;
                self.notify();
            }
        }
        debug!(statistics = %self.statistics(), "analysis finished");
        true
    }

    fn initial_states(&self) -> Vec<StateId> {
        self.explorer.initial_states().to_vec()
    }

    fn bounds(&self, state: StateId) -> Bounds {
        self.values.bounds(state, self.step_bound)
    }

    fn verdict(&self) -> &dyn Verdict {
        &*self.verdict
    }

    fn model(&self) -> PartialSystem {
        self.explorer.snapshot()
    }

    fn statistics(&self) -> Statistics {
        let mut statistics = Statistics {
            explored_states: self.explorer.explored_count(),
            quotient_states: self.explorer.partial_system().state_count(),
            rounds: self.rounds,
            ..Statistics::default()
        };
        self.strategy.record(&mut statistics);
        statistics
    }
}
