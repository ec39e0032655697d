//! Reachability probabilities: unbounded and step-bounded.

use std::collections::HashMap;

use super::storage::{StepStorage, StepTable};
use super::{ChoiceRef, CollapsingValues, PrefixValues};
use crate::bounds::{is_one, is_zero, Bounds, Optimization, WEAK_EPS};
use crate::model::{Choice, Distribution, StateId};
use crate::quotient::Component;

/// Unbounded reachability of the states satisfying `goal`.
///
/// Bounds default to `(0, 1)`; goal states are fixed at `(1, 1)`. Updates use
/// the self-loop-excluding (Jacobi) sum so a state with probability mass on
/// itself cannot keep its own upper bound artificially high.
pub struct UnboundedReachValues<G> {
    bounds: HashMap<StateId, Bounds>,
    optimization: Optimization,
    goal: G,
}

impl<G: Fn(StateId) -> bool> UnboundedReachValues<G> {
    pub fn new(optimization: Optimization, goal: G) -> Self {
        Self {
            bounds: HashMap::new(),
            optimization,
            goal,
        }
    }

    pub fn optimization(&self) -> Optimization {
        self.optimization
    }

    fn successor_bounds(&self, state: StateId, distribution: &Distribution) -> Bounds {
        distribution
            .sum_weighted_except_jacobi_bounds(|s| CollapsingValues::bounds(self, s), state)
            .unwrap_or_else(Bounds::zero)
    }
}

impl<G: Fn(StateId) -> bool> CollapsingValues for UnboundedReachValues<G> {
    fn bounds(&self, state: StateId) -> Bounds {
        if (self.goal)(state) {
            return Bounds::one();
        }
        self.bounds
            .get(&state)
            .copied()
            .unwrap_or_else(Bounds::unknown_reach)
    }

    fn is_unknown(&self, state: StateId) -> bool {
        is_one(self.difference(state))
    }

    fn score(&self, state: StateId, distributions: &[Distribution], choice: ChoiceRef) -> f64 {
        let Some(distribution) = self.successors(distributions, choice) else {
            return f64::NEG_INFINITY;
        };
        match self.optimization {
            Optimization::MinValue => -distribution
                .sum_weighted_except_jacobi(|s| self.lower_bound(s), state)
                .unwrap_or(0.0),
            Optimization::MaxValue | Optimization::UniqueValue => distribution
                .sum_weighted_except_jacobi(|s| self.upper_bound(s), state)
                .unwrap_or(0.0),
        }
    }

    fn update(
        &mut self,
        state: StateId,
        distributions: &[Distribution],
        _choices: &[ChoiceRef],
        _selected: ChoiceRef,
    ) -> Bounds {
        let current = CollapsingValues::bounds(self, state);
        if is_one(current.lower()) || is_zero(current.upper()) {
            return current;
        }
        let new = self
            .optimization
            .select(distributions.iter().map(|d| self.successor_bounds(state, d)))
            .unwrap_or_else(Bounds::zero);
        debug_assert!(
            current.contains_eps(&new, WEAK_EPS),
            "bounds of {state} grew from {current} to {new}"
        );
        self.bounds.insert(state, new);
        new
    }

    fn collapse(
        &mut self,
        representative: StateId,
        distributions: &[Distribution],
        component: &Component,
    ) {
        for s in component.states() {
            self.bounds.remove(s);
        }
        if component.states().iter().any(|&s| (self.goal)(s)) {
            self.bounds.insert(representative, Bounds::one());
        } else if self.optimization == Optimization::MinValue {
            // Staying in a goal-free component forever avoids the goal.
            self.bounds.insert(representative, Bounds::zero());
        } else {
            self.update(representative, distributions, &[], ChoiceRef::Stay);
        }
    }
}

/// Classification of a state for step-bounded reachability.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReachTarget {
    /// Value 1 at every horizon.
    Goal,
    /// Value 0 at every horizon.
    Sink,
    Unknown,
}

/// Probability to reach a goal within the remaining number of steps.
///
/// `bounds(s, 0)` is `(0, 0)` for every non-goal state.
pub struct BoundedReachValues<T> {
    table: StepTable,
    optimization: Optimization,
    target: T,
}

impl<T: Fn(StateId) -> ReachTarget> BoundedReachValues<T> {
    /// `monotone` keeps each state's bounds non-decreasing in the horizon by
    /// propagating new bounds to neighbouring horizons.
    pub fn new(optimization: Optimization, target: T, storage: StepStorage, monotone: bool) -> Self {
        Self {
            table: StepTable::new(storage, monotone, Bounds::unknown_reach()),
            optimization,
            target,
        }
    }
}

impl<T: Fn(StateId) -> ReachTarget> BoundedReachValues<T> {
    fn backup(&self, choices: &[Choice], remaining: usize) -> Bounds {
        let next = remaining - 1;
        self.optimization
            .select(
                choices
                    .iter()
                    .map(|c| c.distribution.sum_weighted_bounds(|s| PrefixValues::bounds(self, s, next))),
            )
            .unwrap_or_else(Bounds::zero)
    }
}

impl<T: Fn(StateId) -> ReachTarget> PrefixValues for BoundedReachValues<T> {
    fn bounds(&self, state: StateId, remaining: usize) -> Bounds {
        match (self.target)(state) {
            ReachTarget::Goal => Bounds::one(),
            ReachTarget::Sink => Bounds::zero(),
            ReachTarget::Unknown if remaining == 0 => Bounds::zero(),
            ReachTarget::Unknown => self.table.get(state, remaining),
        }
    }

    fn score(&self, _state: StateId, remaining: usize, choice: &Choice) -> f64 {
        let next = remaining.saturating_sub(1);
        match self.optimization {
            Optimization::MinValue => -choice
                .distribution
                .sum_weighted(|s| self.lower_bound(s, next)),
            Optimization::MaxValue | Optimization::UniqueValue => choice
                .distribution
                .sum_weighted(|s| self.upper_bound(s, next)),
        }
    }

    fn update(
        &mut self,
        state: StateId,
        remaining: usize,
        choices: &[Choice],
        _selected: &Choice,
    ) -> Bounds {
        let current = PrefixValues::bounds(self, state, remaining);
        if is_one(current.lower()) || is_zero(current.upper()) {
            return current;
        }
        debug_assert_eq!((self.target)(state), ReachTarget::Unknown);
        debug_assert!(remaining > 0);
        let new = self.backup(choices, remaining);
        self.table.refine(state, remaining, new)
    }
}
