//! Mean payoff (long-run average reward).
//!
//! Purpose
//! - Outside collapsed components the gain of a state is the best expected gain
//!   of its successors, so ordinary states carry plain `Bounds` refined by
//!   Jacobi backups.
//! - Inside a collapsed component the gain is computed by a nested relative
//!   value iteration (`ComponentIterator`), offered to the outer policy as the
//!   synthetic `Stay` action.
//!
//! Why this design
//! - The nested iteration runs lazily: one refinement pass whenever the outer
//!   analyser selects `Stay`, so effort follows the greedy policy.
//! - The damped operator `v ↦ r + α·P v + (1-α)·v` (aperiodicity transform)
//!   has the same gain as the original chain and makes the span of `T v - v`
//!   converge on periodic components.
//! - On merging, total-reward vectors of absorbed iterators seed the new one
//!   instead of restarting from zero.

use std::collections::HashMap;

use super::{ChoiceRef, CollapsingValues};
use crate::bounds::{Bounds, KahanSum, Optimization, EPS, WEAK_EPS};
use crate::explorer::RewardExplorer;
use crate::model::{Distribution, StateId};
use crate::quotient::Component;

/// Weight of the fresh backup in the damped update.
pub const DEFAULT_MOMENTUM: f64 = 0.9;

/// Gain solver for one collapsed component.
#[derive(Clone, Debug)]
pub enum ComponentIterator {
    /// Single state: the gain is the best one-step reward of staying.
    Singleton { bounds: Bounds },
    /// Several states: relative value iteration.
    Iterative(Box<RelativeValueIteration>),
}

impl ComponentIterator {
    /// One refinement pass; returns the new gain interval.
    pub fn update(&mut self) -> Bounds {
        match self {
            ComponentIterator::Singleton { bounds } => *bounds,
            ComponentIterator::Iterative(rvi) => rvi.update(),
        }
    }

    pub fn current_bounds(&self) -> Bounds {
        match self {
            ComponentIterator::Singleton { bounds } => *bounds,
            ComponentIterator::Iterative(rvi) => rvi.current,
        }
    }

    /// Number of original states covered.
    pub fn size(&self) -> usize {
        match self {
            ComponentIterator::Singleton { .. } => 1,
            ComponentIterator::Iterative(rvi) => rvi.states.len(),
        }
    }
}

/// Relative value iteration over the internal choices of a component.
///
/// Invariants:
/// - `current` contains the component's optimal gain.
/// - Once a pass produced bounds inside `current` (end of the overshoot
///   correction), every later pass only shrinks `current`.
#[derive(Clone, Debug)]
pub struct RelativeValueIteration {
    states: Vec<StateId>,
    rewards: Vec<f64>,
    choices: Vec<Vec<(Distribution, f64)>>,
    values: HashMap<StateId, f64>,
    optimization: Optimization,
    momentum: f64,
    current: Bounds,
    iteration_bound: usize,
    converged: bool,
}

impl RelativeValueIteration {
    fn new<R: RewardExplorer + ?Sized>(
        component: &Component,
        rewards: &R,
        optimization: Optimization,
        momentum: f64,
        initial_bounds: Bounds,
        initial_values: HashMap<StateId, f64>,
    ) -> Self {
        let states: Vec<StateId> = component.states().iter().copied().collect();
        let state_rewards = states.iter().map(|&s| rewards.reward(s)).collect();
        let choices = states
            .iter()
            .map(|&s| {
                component
                    .choices(s)
                    .iter()
                    .map(|c| (c.distribution.clone(), rewards.transition_reward(s, c)))
                    .collect()
            })
            .collect();
        let iteration_bound = states.len() / 2 + 1;
        Self {
            states,
            rewards: state_rewards,
            choices,
            values: initial_values,
            optimization,
            momentum,
            current: initial_bounds,
            iteration_bound,
            converged: false,
        }
    }

    fn value(&self, state: StateId) -> f64 {
        self.values.get(&state).copied().unwrap_or(0.0)
    }

    /// Total-reward vector of the current iterate.
    pub fn values(&self) -> &HashMap<StateId, f64> {
        &self.values
    }

    fn update(&mut self) -> Bounds {
        let target = self.current.width() / 2.0;
        let mut bounds = self.current;
        let mut iterations = 0;
        while iterations < self.iteration_bound && bounds.width() >= target {
            let mut next = HashMap::with_capacity(self.states.len());
            let mut min_diff = f64::INFINITY;
            let mut max_diff = f64::NEG_INFINITY;
            for (i, &state) in self.states.iter().enumerate() {
                let current = self.value(state);
                let mut optimum = match self.optimization {
                    Optimization::MinValue => f64::INFINITY,
                    Optimization::MaxValue | Optimization::UniqueValue => f64::NEG_INFINITY,
                };
                for (distribution, transition_reward) in &self.choices[i] {
                    let v = distribution.sum_weighted(|s| self.value(s)) + transition_reward;
                    optimum = match self.optimization {
                        Optimization::MinValue => optimum.min(v),
                        Optimization::MaxValue | Optimization::UniqueValue => optimum.max(v),
                    };
                }
                if !optimum.is_finite() {
                    optimum = current;
                }
                let mut sum = KahanSum::new();
                sum.add(self.rewards[i]);
                sum.add(self.momentum * optimum);
                sum.add((1.0 - self.momentum) * current);
                next.insert(state, sum.get());
                sum.add(-current);
                let diff = sum.get();
                min_diff = min_diff.min(diff);
                max_diff = max_diff.max(diff);
            }
            self.values = next;
            let next_bounds = Bounds::new(min_diff, max_diff);
            if self.converged {
                debug_assert!(
                    bounds.contains_eps(&next_bounds, WEAK_EPS),
                    "gain bounds grew from {bounds} to {next_bounds}"
                );
                bounds = next_bounds.shrink(&bounds);
            } else if bounds.contains(&next_bounds) {
                bounds = next_bounds;
                self.converged = true;
            } else {
                bounds = next_bounds.shrink(&bounds);
            }
            iterations += 1;
        }
        debug_assert!(self.current.contains_eps(&bounds, WEAK_EPS));
        self.current = bounds;
        if iterations == self.iteration_bound {
            self.iteration_bound *= 2;
        }
        bounds
    }
}

/// Mean-payoff policy.
///
/// `reward_bounds` must contain every reachable per-step reward (state plus
/// transition reward); it is the default interval of every state.
pub struct MeanPayoffValues<R> {
    collapsed: HashMap<StateId, Bounds>,
    iterators: HashMap<StateId, ComponentIterator>,
    optimization: Optimization,
    reward_bounds: Bounds,
    rewards: R,
    momentum: f64,
}

impl<R: RewardExplorer> MeanPayoffValues<R> {
    pub fn new(optimization: Optimization, reward_bounds: Bounds, rewards: R) -> Self {
        Self {
            collapsed: HashMap::new(),
            iterators: HashMap::new(),
            optimization,
            reward_bounds,
            rewards,
            momentum: DEFAULT_MOMENTUM,
        }
    }

    /// Damping weight of the nested iteration, in `(0, 1]`.
    pub fn with_momentum(mut self, momentum: f64) -> Self {
        assert!(momentum > 0.0 && momentum <= 1.0, "momentum {momentum} out of range");
        self.momentum = momentum;
        self
    }

    /// Iterator of a collapsed representative.
    pub fn iterator(&self, representative: StateId) -> Option<&ComponentIterator> {
        self.iterators.get(&representative)
    }

    fn singleton(&self, component: &Component) -> ComponentIterator {
        let Some(&state) = component.states().iter().next() else {
            return ComponentIterator::Singleton {
                bounds: self.reward_bounds,
            };
        };
        let reward = self.rewards.reward(state);
        let best = self.optimization.select(
            component
                .choices(state)
                .iter()
                .map(|c| Bounds::exact(reward + self.rewards.transition_reward(state, c))),
        );
        ComponentIterator::Singleton {
            bounds: best.unwrap_or_else(|| Bounds::exact(reward)),
        }
    }

    /// Starting point of a merged component from the iterators it absorbs.
    fn salvage(&self, absorbed: &[ComponentIterator]) -> (HashMap<StateId, f64>, Bounds) {
        let keep_lower = self.optimization != Optimization::MinValue;
        match absorbed {
            [] => (HashMap::new(), self.reward_bounds),
            [single] => {
                let values = match single {
                    ComponentIterator::Iterative(rvi) => rvi.values.clone(),
                    ComponentIterator::Singleton { .. } => HashMap::new(),
                };
                let b = single.current_bounds();
                let bounds = if keep_lower {
                    self.reward_bounds.with_lower(b.lower())
                } else {
                    self.reward_bounds.with_upper(b.upper())
                };
                (values, bounds)
            }
            several => {
                let mut values = HashMap::new();
                for it in several {
                    if let ComponentIterator::Iterative(rvi) = it {
                        let minimum = rvi.values.values().copied().fold(f64::INFINITY, f64::min);
                        let minimum = if minimum.is_finite() { minimum } else { 0.0 };
                        values.extend(rvi.values.iter().map(|(&s, &v)| (s, v - minimum)));
                    }
                }
                let bounds = if keep_lower {
                    let best = several
                        .iter()
                        .map(|it| it.current_bounds().lower())
                        .fold(f64::NEG_INFINITY, f64::max);
                    self.reward_bounds.with_lower(best)
                } else {
                    let best = several
                        .iter()
                        .map(|it| it.current_bounds().upper())
                        .fold(f64::INFINITY, f64::min);
                    self.reward_bounds.with_upper(best)
                };
                (values, bounds)
            }
        }
    }
}

impl<R: RewardExplorer> CollapsingValues for MeanPayoffValues<R> {
    fn bounds(&self, state: StateId) -> Bounds {
        self.collapsed
            .get(&state)
            .copied()
            .unwrap_or(self.reward_bounds)
    }

    fn is_unknown(&self, state: StateId) -> bool {
        self.bounds(state).equals_up_to(&self.reward_bounds, EPS)
    }

    fn choices(&self, state: StateId, distributions: &[Distribution]) -> Vec<ChoiceRef> {
        let mut choices: Vec<ChoiceRef> = (0..distributions.len()).map(ChoiceRef::Transition).collect();
        if self.iterators.contains_key(&state) {
            choices.push(ChoiceRef::Stay);
        }
        choices
    }

    fn score(&self, state: StateId, distributions: &[Distribution], choice: ChoiceRef) -> f64 {
        let maximise = self.optimization != Optimization::MinValue;
        match choice {
            ChoiceRef::Transition(i) => {
                let Some(d) = distributions.get(i) else {
                    return f64::NEG_INFINITY;
                };
                if maximise {
                    d.sum_weighted_except_jacobi(|s| self.upper_bound(s), state)
                        .unwrap_or_else(|| self.upper_bound(state))
                } else {
                    -d.sum_weighted_except_jacobi(|s| self.lower_bound(s), state)
                        .unwrap_or_else(|| self.lower_bound(state))
                }
            }
            ChoiceRef::Stay => match self.iterators.get(&state) {
                Some(it) if maximise => it.current_bounds().upper(),
                Some(it) => -it.current_bounds().lower(),
                None => f64::NEG_INFINITY,
            },
        }
    }

    fn update(
        &mut self,
        state: StateId,
        distributions: &[Distribution],
        choices: &[ChoiceRef],
        selected: ChoiceRef,
    ) -> Bounds {
        debug_assert!(self.optimization != Optimization::UniqueValue || choices.len() <= 1);
        let stay = match selected {
            ChoiceRef::Stay => self.iterators.get_mut(&state).map(ComponentIterator::update),
            ChoiceRef::Transition(_) => self.iterators.get(&state).map(ComponentIterator::current_bounds),
        };
        let fallback = stay.unwrap_or_else(|| self.bounds(state));
        let available = choices.iter().map(|&c| match c {
            ChoiceRef::Transition(i) => distributions
                .get(i)
                .and_then(|d| d.sum_weighted_except_jacobi_bounds(|s| self.bounds(s), state))
                .unwrap_or(fallback),
            ChoiceRef::Stay => stay.unwrap_or(fallback),
        });
        match self.optimization.select(available) {
            Some(new) => {
                // Merging can weaken bounds, so no monotonicity check here.
                self.collapsed.insert(state, new);
                new
            }
            None => self.bounds(state),
        }
    }

    fn collapse(
        &mut self,
        representative: StateId,
        distributions: &[Distribution],
        component: &Component,
    ) {
        let iterator = if component.size() == 1 {
            self.singleton(component)
        } else {
            let absorbed: Vec<ComponentIterator> = component
                .states()
                .iter()
                .filter_map(|s| self.iterators.remove(s))
                .collect();
            let (values, bounds) = self.salvage(&absorbed);
            ComponentIterator::Iterative(Box::new(RelativeValueIteration::new(
                component,
                &self.rewards,
                self.optimization,
                self.momentum,
                bounds,
                values,
            )))
        };
        for s in component.states() {
            self.collapsed.remove(s);
        }
        self.iterators.insert(representative, iterator);
        let choices = self.choices(representative, distributions);
        let selected = if distributions.is_empty() {
            ChoiceRef::Stay
        } else {
            ChoiceRef::Transition(0)
        };
        self.update(representative, distributions, &choices, selected);
    }
}
