//! Core coverage: how much probability mass can still escape to the frontier.
//!
//! Only an upper bound is tracked (the lower bound is always 0). Unexplored
//! states have upper bound 1: they are the frontier. Once the initial state's
//! upper bound drops below ε, the explored subsystem carries at least `1 - ε`
//! of the reachable mass under every scheduler.

use std::collections::HashMap;

use super::storage::{StepStorage, StepTable};
use super::{ChoiceRef, CollapsingValues, PrefixValues};
use crate::bounds::{is_one, less_or_equal, Bounds};
use crate::model::{Choice, Distribution, StateId};
use crate::quotient::Component;

/// Upper bound on the probability to ever leave the explored part.
#[derive(Debug, Default)]
pub struct UnboundedCoreValues {
    upper: HashMap<StateId, f64>,
}

impl UnboundedCoreValues {
    pub fn new() -> Self {
        Self::default()
    }

    fn upper(&self, state: StateId) -> f64 {
        self.upper.get(&state).copied().unwrap_or(1.0)
    }

    fn backup(&self, state: StateId, distributions: &[Distribution]) -> f64 {
        if let [single] = distributions {
            return single
                .sum_weighted_except_jacobi(|s| self.upper(s), state)
                .unwrap_or(0.0);
        }
        let mut best = 0.0f64;
        for d in distributions {
            if d.is_only_successor(state) {
                continue;
            }
            best = best.max(d.sum_weighted(|s| self.upper(s)));
            if is_one(best) {
                break;
            }
        }
        best
    }

    fn store(&mut self, state: StateId, value: f64) {
        if is_one(value) {
            return;
        }
        let old = self.upper.insert(state, value);
        debug_assert!(
            old.map_or(true, |o| less_or_equal(value, o)),
            "core bound of {state} grew from {old:?} to {value}"
        );
    }
}

impl CollapsingValues for UnboundedCoreValues {
    fn bounds(&self, state: StateId) -> Bounds {
        Bounds::reach(0.0, self.upper(state))
    }

    fn is_unknown(&self, state: StateId) -> bool {
        is_one(self.upper(state))
    }

    fn lower_bound(&self, _state: StateId) -> f64 {
        0.0
    }

    fn difference(&self, state: StateId) -> f64 {
        self.upper(state)
    }

    fn score(&self, state: StateId, distributions: &[Distribution], choice: ChoiceRef) -> f64 {
        match self.successors(distributions, choice) {
            Some(d) => d
                .sum_weighted_except_jacobi(|s| self.upper(s), state)
                .unwrap_or(0.0),
            None => f64::NEG_INFINITY,
        }
    }

    fn update(
        &mut self,
        state: StateId,
        distributions: &[Distribution],
        _choices: &[ChoiceRef],
        _selected: ChoiceRef,
    ) -> Bounds {
        let value = self.backup(state, distributions);
        self.store(state, value);
        self.bounds(state)
    }

    fn collapse(
        &mut self,
        representative: StateId,
        distributions: &[Distribution],
        component: &Component,
    ) {
        for s in component.states() {
            self.upper.remove(s);
        }
        let value = self.backup(representative, distributions);
        self.store(representative, value);
    }
}

/// Upper bound on the probability to leave the explored part within the
/// remaining number of steps.
#[derive(Debug)]
pub struct BoundedCoreValues {
    table: StepTable,
    storage: StepStorage,
}

impl BoundedCoreValues {
    pub fn new(storage: StepStorage) -> Self {
        Self {
            table: StepTable::new(storage, true, Bounds::unknown_reach()),
            storage,
        }
    }

    pub fn storage(&self) -> StepStorage {
        self.storage
    }
}

impl PrefixValues for BoundedCoreValues {
    fn bounds(&self, state: StateId, remaining: usize) -> Bounds {
        if remaining == 0 {
            return Bounds::zero();
        }
        Bounds::reach(0.0, self.table.get(state, remaining).upper())
    }

    fn lower_bound(&self, _state: StateId, _remaining: usize) -> f64 {
        0.0
    }

    fn difference(&self, state: StateId, remaining: usize) -> f64 {
        self.upper_bound(state, remaining)
    }

    fn score(&self, _state: StateId, remaining: usize, choice: &Choice) -> f64 {
        let next = remaining.saturating_sub(1);
        choice.distribution.sum_weighted(|s| self.upper_bound(s, next))
    }

    fn update(
        &mut self,
        state: StateId,
        remaining: usize,
        choices: &[Choice],
        _selected: &Choice,
    ) -> Bounds {
        debug_assert!(remaining > 0);
        let next = remaining - 1;
        let mut best = 0.0f64;
        for choice in choices {
            if choice.distribution.is_only_successor(state) {
                continue;
            }
            best = best.max(choice.distribution.sum_weighted(|s| self.upper_bound(s, next)));
        }
        let stored = self.table.refine(state, remaining, Bounds::reach(0.0, best));
        Bounds::reach(0.0, stored.upper())
    }
}
