//! Guided sampling strategy.
//!
//! Purpose
//! - Walk from the initial state along optimal choices, sampling successors
//!   proportionally to `probability × (upper − lower)`, so effort goes where the
//!   bounds are still wide.
//! - Back up the visited path in reverse on every round.
//!
//! Why this design
//! - Visited states are excluded from sampling within a round; a walk that keeps
//!   returning to the same states hints at an uncollapsed end component, so such
//!   rounds request a component search.
//! - On a dead end the walk backtracks, applying updates as it unwinds, and
//!   resumes from the first state whose interval width changed. Reaching the
//!   initial state (or the backtrack cap) ends the round.
//!
//! Invariants
//! - Every state the walk stands on is explored.
//! - The returned updates are in reverse visiting order.

use std::collections::HashSet;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::cfg::SamplerCfg;
use super::collapsing::{isqrt, CollapsingAnalyser, CollapsingCore, CollapsingStrategy, Update};
use super::Statistics;
use crate::bounds::is_equal;
use crate::explorer::Explorer;
use crate::model::StateId;
use crate::values::{optimal, ChoiceRef, CollapsingValues};
use crate::verdict::Verdict;

pub struct GuidedSampler {
    cfg: SamplerCfg,
    rng: StdRng,
    loop_count: i64,
    collapse_threshold: i64,
    backtracks: u64,
    backtracks_to_initial: u64,
}

impl GuidedSampler {
    pub fn new(cfg: SamplerCfg) -> Self {
        Self {
            cfg,
            rng: StdRng::seed_from_u64(cfg.seed),
            loop_count: 0,
            collapse_threshold: cfg.initial_collapse_threshold,
            backtracks: 0,
            backtracks_to_initial: 0,
        }
    }

    pub fn backtracks(&self) -> u64 {
        self.backtracks
    }

    pub fn backtracks_to_initial(&self) -> u64 {
        self.backtracks_to_initial
    }

    /// Pop and apply updates until one changes its state's interval width.
    /// Returns the state to resume from, or `None` once the initial state (or
    /// the bottom of the trail) is reached.
    fn backtrack<E: Explorer, V: CollapsingValues>(
        &mut self,
        core: &mut CollapsingCore<E, V>,
        trail: &mut Vec<Update>,
        visited: &mut HashSet<StateId>,
        initial: StateId,
    ) -> Option<StateId> {
        while let Some(step) = trail.pop() {
            self.backtracks += 1;
            self.loop_count += 1;
            visited.remove(&step.state);
            let before = core.values().difference(step.state);
            let after = step.apply(core.values_mut()).width();
            if step.state == initial {
                return None;
            }
            if !is_equal(before, after) {
                return Some(step.state);
            }
        }
        None
    }
}

impl<E: Explorer, V: CollapsingValues> CollapsingStrategy<E, V> for GuidedSampler {
    fn round(&mut self, core: &mut CollapsingCore<E, V>, initial: StateId) -> Vec<Update> {
        let cfg = self.cfg;
        let mut trail: Vec<Update> = Vec::new();
        let mut visited: HashSet<StateId> = HashSet::new();
        let mut current = initial;
        let mut explores = 0;
        let mut backtracks = 0;
        let mut revisits = 0;
        let mut check_components = false;

        while revisits < cfg.revisit_cap {
            debug_assert!(core.is_explored(current), "walk left the explored region at {current}");
            if !visited.insert(current) {
                revisits += 1;
            }
            let distributions = core.distributions(current);
            let choices: Rc<[ChoiceRef]> = core.values().choices(current, &distributions).into();
            let selected = optimal(choices.iter().copied(), |c| {
                core.values().score(current, &distributions, c)
            });

            let mut next = None;
            if let Some(selected) = selected {
                trail.push(Update::new(current, &distributions, &choices, selected));
                let values = core.values();
                if let Some(successors) = values.successors(&distributions, selected) {
                    next = successors.sample_weighted_except(
                        &mut self.rng,
                        |s, p| p * values.difference(s),
                        |s| visited.contains(&s),
                    );
                }
            }

            match next {
                Some(next) => {
                    if !core.is_explored(next) {
                        if explores == cfg.explore_cap {
                            break;
                        }
                        explores += 1;
                        self.collapse_threshold -= 1;
                        core.explore(next);
                    }
                    current = next;
                }
                None => {
                    if backtracks == cfg.backtrack_cap {
                        check_components = true;
                        break;
                    }
                    match self.backtrack(core, &mut trail, &mut visited, initial) {
                        Some(state) => {
                            backtracks += 1;
                            current = state;
                        }
                        None => {
                            self.backtracks_to_initial += 1;
                            check_components = true;
                            break;
                        }
                    }
                }
            }
        }

        if revisits >= cfg.revisit_flag {
            check_components = true;
        }
        if check_components {
            self.loop_count += 1;
            if self.loop_count > self.collapse_threshold {
                self.loop_count = 0;
                if core.handle_components(false) {
                    trail.clear();
                    self.collapse_threshold = isqrt(core.quotient_state_count()) as i64;
                } else {
                    self.collapse_threshold = core.quotient_state_count() as i64;
                }
            }
        }
        trail.reverse();
        trail
    }

    fn record(&self, statistics: &mut Statistics) {
        statistics.backtracks = self.backtracks;
        statistics.backtracks_to_initial = self.backtracks_to_initial;
    }
}

/// Collapsing analyser with the guided sampler.
pub type SamplingAnalyser<E, V> = CollapsingAnalyser<E, V, GuidedSampler>;

impl<E: Explorer, V: CollapsingValues> CollapsingAnalyser<E, V, GuidedSampler> {
    pub fn sampler(explorer: E, values: V, verdict: impl Verdict + 'static, cfg: SamplerCfg) -> Self {
        Self::with_strategy(explorer, values, verdict, GuidedSampler::new(cfg))
    }
}
