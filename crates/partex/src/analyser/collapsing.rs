//! Base loop shared by the collapsing analysers.
//!
//! A strategy produces one batch of `Update`s per round; the base loop applies
//! them, force-explores frontier states at a rate that decays with the quotient
//! size, and triggers end-component searches paid for by exploration progress.

use std::collections::BTreeSet;
use std::rc::Rc;

use tracing::{debug, warn};

use super::cfg::CollapseCfg;
use super::{Analyser, Progress, ProgressObserver, Statistics};
use crate::bounds::Bounds;
use crate::explorer::Explorer;
use crate::model::{Distribution, PartialSystem, StateId};
use crate::quotient::DynamicQuotient;
use crate::values::{ChoiceRef, CollapsingValues};
use crate::verdict::Verdict;

#[inline]
pub(super) fn isqrt(n: usize) -> usize {
    (n as f64).sqrt() as usize
}

/// One pending backup: a quotient state, its distributions and actions at the
/// time the round visited it, and the action that was taken.
#[derive(Clone, Debug)]
pub struct Update {
    pub state: StateId,
    pub distributions: Rc<[Distribution]>,
    pub choices: Rc<[ChoiceRef]>,
    pub selected: ChoiceRef,
}

impl Update {
    pub fn new(
        state: StateId,
        distributions: &Rc<[Distribution]>,
        choices: &Rc<[ChoiceRef]>,
        selected: ChoiceRef,
    ) -> Self {
        Self {
            state,
            distributions: Rc::clone(distributions),
            choices: Rc::clone(choices),
            selected,
        }
    }

    pub fn apply<V: CollapsingValues + ?Sized>(&self, values: &mut V) -> Bounds {
        values.update(self.state, &self.distributions, &self.choices, self.selected)
    }
}

/// How a collapsing analyser picks the states to back up in one round.
pub trait CollapsingStrategy<E: Explorer, V: CollapsingValues> {
    /// Updates of one round, in the order they should be applied.
    fn round(&mut self, core: &mut CollapsingCore<E, V>, initial: StateId) -> Vec<Update>;

    /// Add strategy-specific counters.
    fn record(&self, _statistics: &mut Statistics) {}
}

/// Explorer, quotient, values, and the exploration/detection bookkeeping.
pub struct CollapsingCore<E, V> {
    explorer: E,
    values: V,
    quotient: DynamicQuotient,
    cfg: CollapseCfg,
    explored_since_detection: BTreeSet<StateId>,
    rounds_since_explore: usize,
    explore_threshold: usize,
    detection_threshold: usize,
    detection_reset: usize,
    rounds: u64,
    component_searches: u64,
    successful_component_searches: u64,
}

impl<E: Explorer, V: CollapsingValues> CollapsingCore<E, V> {
    fn new(explorer: E, values: V, cfg: CollapseCfg) -> Self {
        Self {
            explorer,
            values,
            quotient: DynamicQuotient::new(),
            cfg,
            explored_since_detection: BTreeSet::new(),
            rounds_since_explore: 0,
            explore_threshold: cfg.initial_explore_threshold,
            detection_threshold: cfg.initial_detection_threshold,
            detection_reset: cfg.initial_detection_threshold,
            rounds: 0,
            component_searches: 0,
            successful_component_searches: 0,
        }
    }

    pub fn explorer(&self) -> &E {
        &self.explorer
    }

    pub fn values(&self) -> &V {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut V {
        &mut self.values
    }

    pub fn quotient(&self) -> &DynamicQuotient {
        &self.quotient
    }

    #[inline]
    pub fn representative(&self, state: StateId) -> StateId {
        self.quotient.representative(state)
    }

    /// Bounds of the class of `state`.
    pub fn bounds(&self, state: StateId) -> Bounds {
        self.values.bounds(self.quotient.representative(state))
    }

    #[inline]
    pub fn is_explored(&self, state: StateId) -> bool {
        self.explorer.is_explored(state)
    }

    /// Quotient distributions of the class of `state`.
    pub fn distributions(&self, state: StateId) -> Rc<[Distribution]> {
        self.quotient
            .distributions(self.explorer.partial_system(), state)
            .into()
    }

    pub fn quotient_state_count(&self) -> usize {
        self.quotient.state_count(self.explorer.partial_system())
    }

    /// Representatives that are explored.
    pub fn explored_quotient_states(&self) -> Vec<StateId> {
        let system = self.explorer.partial_system();
        self.quotient
            .states(system)
            .filter(|&s| system.is_explored(s))
            .collect()
    }

    pub fn explore(&mut self, state: StateId) {
        if self.explorer.is_explored(state) {
            return;
        }
        self.explorer.explore_state(state);
        self.explored_since_detection.insert(state);
        self.rounds_since_explore = 0;
    }

    /// Explore everything reachable from `state`.
    pub fn explore_reachable(&mut self, state: StateId) {
        self.explorer.explore_reachable(&[state]);
        let system = self.explorer.partial_system();
        self.explored_since_detection.extend(system.explored_states());
        self.rounds_since_explore = 0;
    }

    /// Search for end components among recently explored states and collapse
    /// them. Unforced searches wait for enough exploration progress.
    ///
    /// Returns true if at least one component was collapsed.
    pub fn handle_components(&mut self, force: bool) -> bool {
        if !force && self.explored_since_detection.len() < self.detection_threshold {
            self.detection_threshold = isqrt(self.detection_threshold);
            return false;
        }
        self.component_searches += 1;
        let recent = std::mem::take(&mut self.explored_since_detection);
        let system = self.explorer.partial_system();
        let components = self
            .quotient
            .update_components(system, &recent, |s| system.is_explored(s));
        if components.is_empty() {
            self.detection_reset = isqrt(self.quotient.state_count(system));
            self.detection_threshold = self.detection_reset;
            return false;
        }
        self.detection_threshold = self.detection_reset;
        self.successful_component_searches += 1;
        debug!(
            components = components.len(),
            recent = recent.len(),
            "collapsing components"
        );
        for (rep, component) in &components {
            let distributions = self.quotient.distributions(system, *rep);
            self.values.collapse(*rep, &distributions, component);
        }
        true
    }

    fn after_round(&mut self) {
        self.rounds += 1;
        self.rounds_since_explore += 1;
        if self.rounds_since_explore <= self.explore_threshold {
            return;
        }
        let system = self.explorer.partial_system();
        let frontier: Vec<StateId> = self
            .quotient
            .states(system)
            .filter(|&s| !system.is_explored(s))
            .take(self.explore_threshold)
            .collect();
        for &state in &frontier {
            self.explore(state);
        }
        self.explore_threshold = isqrt(self.quotient_state_count());
        debug!(
            explored = frontier.len(),
            threshold = self.explore_threshold,
            "forced exploration"
        );
        self.handle_components(frontier.is_empty());
    }
}

/// Collapsing analyser driven by strategy `S`.
pub struct CollapsingAnalyser<E, V, S> {
    core: CollapsingCore<E, V>,
    strategy: S,
    verdict: Box<dyn Verdict>,
    observer: Option<ProgressObserver>,
    limited: bool,
}

impl<E, V, S> CollapsingAnalyser<E, V, S>
where
    E: Explorer,
    V: CollapsingValues,
    S: CollapsingStrategy<E, V>,
{
    pub fn with_strategy(explorer: E, values: V, verdict: impl Verdict + 'static, strategy: S) -> Self {
        Self {
            core: CollapsingCore::new(explorer, values, CollapseCfg::default()),
            strategy,
            verdict: Box::new(verdict),
            observer: None,
            limited: false,
        }
    }

    /// Replace the base-loop configuration. Call before `run`.
    pub fn with_cfg(mut self, cfg: CollapseCfg) -> Self {
        self.core.cfg = cfg;
        self.core.explore_threshold = cfg.initial_explore_threshold;
        self.core.detection_threshold = cfg.initial_detection_threshold;
        self.core.detection_reset = cfg.initial_detection_threshold;
        self
    }

    /// Callback invoked once per round.
    pub fn with_observer(mut self, observer: impl FnMut(&Progress) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn core(&self) -> &CollapsingCore<E, V> {
        &self.core
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn values(&self) -> &V {
        &self.core.values
    }

    pub fn explorer(&self) -> &E {
        &self.core.explorer
    }

    /// True if the last `run` stopped at the round limit.
    pub fn was_limited(&self) -> bool {
        self.limited
    }

    fn progress(&self) -> Progress {
        Progress {
            rounds: self.core.rounds,
            explored_states: self.core.explorer.explored_count(),
            initial_bounds: self
                .core
                .explorer
                .initial_states()
                .iter()
                .map(|&s| (s, self.core.bounds(s)))
                .collect(),
        }
    }

    fn notify(&mut self) {
        if self.observer.is_none() {
            return;
        }
        let progress = self.progress();
        if let Some(observer) = self.observer.as_mut() {
            observer(&progress);
        }
    }
}

impl<E, V, S> Analyser for CollapsingAnalyser<E, V, S>
where
    E: Explorer,
    V: CollapsingValues,
    S: CollapsingStrategy<E, V>,
{
    fn run(&mut self) -> bool {
        self.limited = false;
        let initials = self.core.explorer.initial_states().to_vec();
        for initial in initials {
            self.core.explore(initial);
            loop {
                let rep = self.core.representative(initial);
                if self.verdict.is_solved(&self.core.values.bounds(rep)) {
                    break;
                }
                if let Some(limit) = self.core.cfg.round_limit {
                    if self.core.rounds >= limit {
                        warn!(
                            limit,
                            %initial,
                            bounds = %self.core.bounds(initial),
                            "round limit reached before the verdict was met"
                        );
                        self.limited = true;
                        return false;
                    }
                }
                let updates = self.strategy.round(&mut self.core, rep);
                for update in &updates {
                    update.apply(&mut self.core.values);
                }
                self.core.after_round();
                self.notify();
            }
        }
        debug!(statistics = %self.statistics(), "analysis finished");
        true
    }

    fn initial_states(&self) -> Vec<StateId> {
        self.core.explorer.initial_states().to_vec()
    }

    fn bounds(&self, state: StateId) -> Bounds {
        self.core.bounds(state)
    }

    fn verdict(&self) -> &dyn Verdict {
        &*self.verdict
    }

    /// Explored states whose class carries any information.
    fn model(&self) -> PartialSystem {
        let system = self.core.explorer.partial_system();
        let explored = system
            .explored_states()
            .filter(|&s| !self.core.values.is_unknown(self.core.representative(s)))
            .collect();
        PartialSystem::new(system.clone(), explored)
    }

    fn statistics(&self) -> Statistics {
        let mut statistics = Statistics {
            explored_states: self.core.explorer.explored_count(),
            quotient_states: self.core.quotient_state_count(),
            rounds: self.core.rounds,
            component_searches: self.core.component_searches,
            successful_component_searches: self.core.successful_component_searches,
            ..Statistics::default()
        };
        self.strategy.record(&mut statistics);
        statistics
    }
}
