//! Exact re-solve of an extracted `PartialSystem`.
//!
//! Purpose
//! - Cross-check an analysis against plain value iteration on the explored part
//!   it produced. The main use is core coverage: the probability of reaching
//!   the frontier of the extracted system must not exceed the ε the analysis
//!   certified.
//!
//! Why this design
//! - Gauss-Seidel value iteration from zero converges to the least fixed point,
//!   which is the reachability probability for both maximisation and
//!   minimisation, so no end-component preprocessing is needed here.
//! - Failures to converge and disagreements are `ValidationError`s, distinct
//!   from the contract panics of the analysers.

use std::collections::HashMap;

use tracing::debug;

use crate::bounds::{Optimization, WEAK_EPS};
use crate::error::ValidationError;
use crate::model::{PartialSystem, StateId};

/// Value-iteration parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueIteration {
    /// Stop once no state changes by more than this.
    pub precision: f64,
    pub max_iterations: usize,
}

impl Default for ValueIteration {
    fn default() -> Self {
        Self {
            precision: 1e-10,
            max_iterations: 1_000_000,
        }
    }
}

impl ValueIteration {
    /// Probability to eventually reach `target` from every known state.
    ///
    /// Frontier states (outside the explored set) have no choices: they
    /// reach the target only if they are targets themselves.
    pub fn reach(
        &self,
        system: &PartialSystem,
        target: impl Fn(StateId) -> bool,
        optimization: Optimization,
    ) -> Result<HashMap<StateId, f64>, ValidationError> {
        let states: Vec<StateId> = system.explored_states().filter(|&s| !target(s)).collect();
        let mut values: HashMap<StateId, f64> = system
            .system()
            .states()
            .map(|s| (s, if target(s) { 1.0 } else { 0.0 }))
            .collect();
        for iteration in 0..self.max_iterations {
            let mut change = 0.0f64;
            for &state in &states {
                let next = self.backup(system, &values, state, optimization);
                let previous = values.insert(state, next).unwrap_or(0.0);
                change = change.max((next - previous).abs());
            }
            if change < self.precision {
                debug!(iterations = iteration + 1, "value iteration converged");
                return Ok(values);
            }
        }
        Err(ValidationError::NoConvergence(self.max_iterations))
    }

    /// Probability to reach `target` within `steps` transitions.
    pub fn bounded_reach(
        &self,
        system: &PartialSystem,
        target: impl Fn(StateId) -> bool,
        optimization: Optimization,
        steps: usize,
    ) -> HashMap<StateId, f64> {
        let mut values: HashMap<StateId, f64> = system
            .system()
            .states()
            .map(|s| (s, if target(s) { 1.0 } else { 0.0 }))
            .collect();
        for _ in 0..steps {
            let mut next = values.clone();
            for state in system.explored_states().filter(|&s| !target(s)) {
                next.insert(state, self.backup(system, &values, state, optimization));
            }
            values = next;
        }
        values
    }

    fn backup(
        &self,
        system: &PartialSystem,
        values: &HashMap<StateId, f64>,
        state: StateId,
        optimization: Optimization,
    ) -> f64 {
        let sums = system
            .choices(state)
            .iter()
            .map(|c| c.distribution.sum_weighted(|s| values.get(&s).copied().unwrap_or(0.0)));
        let value = match optimization {
            Optimization::MinValue => sums.fold(f64::INFINITY, f64::min),
            Optimization::MaxValue | Optimization::UniqueValue => sums.fold(f64::NEG_INFINITY, f64::max),
        };
        if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Check that from every initial state the frontier of `system` is reached
/// with probability at most `epsilon`.
///
/// With `bound = Some(k)` only the frontier reached within `k` steps counts.
/// `BoundedCoreValues` values every state at 0 once no step is left, so a
/// `k`-step core comes from a prefix analysis with horizon `k + 1`.
///
/// Returns the largest frontier probability found.
pub fn check_core_property(
    system: &PartialSystem,
    epsilon: f64,
    bound: Option<usize>,
) -> Result<f64, ValidationError> {
    let frontier = |s: StateId| !system.is_explored(s);
    let iteration = ValueIteration::default();
    let values = match bound {
        Some(steps) => iteration.bounded_reach(system, frontier, Optimization::MaxValue, steps),
        None => iteration.reach(system, frontier, Optimization::MaxValue)?,
    };
    let actual = system
        .initial_states()
        .iter()
        .map(|s| values.get(s).copied().unwrap_or(1.0))
        .fold(0.0, f64::max);
    if actual > epsilon + WEAK_EPS {
        return Err(ValidationError::PropertyViolated {
            expected_at_most: epsilon,
            actual,
        });
    }
    Ok(actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Choice, Distribution, TransitionSystem};
    use std::collections::BTreeSet;

    fn system(edges: &[(usize, Vec<Vec<(usize, f64)>>)], states: usize) -> TransitionSystem {
        let mut sys = TransitionSystem::new();
        for _ in 0..states {
            sys.add_state();
        }
        sys.add_initial(StateId(0));
        for (s, choices) in edges {
            let choices = choices
                .iter()
                .map(|pairs| Choice::unlabelled(Distribution::new(pairs.iter().map(|&(t, p)| (StateId(t), p)))))
                .collect();
            sys.set_choices(StateId(*s), choices);
        }
        sys
    }

    #[test]
    fn reach_with_choice_and_loop() {
        // s0: either 0.5 loop / 0.5 goal, or straight to the sink s2.
        let sys = system(
            &[
                (0, vec![vec![(0, 0.5), (1, 0.5)], vec![(2, 1.0)]]),
                (1, vec![vec![(1, 1.0)]]),
                (2, vec![vec![(2, 1.0)]]),
            ],
            3,
        );
        let partial = PartialSystem::full(&sys);
        let vi = ValueIteration::default();
        let goal = |s: StateId| s == StateId(1);
        let max = vi.reach(&partial, goal, Optimization::MaxValue).unwrap();
        let min = vi.reach(&partial, goal, Optimization::MinValue).unwrap();
        assert!((max[&StateId(0)] - 1.0).abs() < 1e-8);
        assert!(min[&StateId(0)].abs() < 1e-12);
    }

    #[test]
    fn bounded_reach_counts_steps() {
        let sys = system(
            &[(0, vec![vec![(1, 1.0)]]), (1, vec![vec![(2, 1.0)]]), (2, vec![vec![(2, 1.0)]])],
            3,
        );
        let partial = PartialSystem::full(&sys);
        let vi = ValueIteration::default();
        let goal = |s: StateId| s == StateId(2);
        assert_eq!(vi.bounded_reach(&partial, goal, Optimization::MaxValue, 1)[&StateId(0)], 0.0);
        assert_eq!(vi.bounded_reach(&partial, goal, Optimization::MaxValue, 2)[&StateId(0)], 1.0);
    }

    #[test]
    fn core_property_flags_escaping_mass() {
        // s0 -> 0.99 explored absorbing s1, 0.01 frontier s2.
        let sys = system(&[(0, vec![vec![(1, 0.99), (2, 0.01)]]), (1, vec![vec![(1, 1.0)]])], 3);
        let partial = PartialSystem::full(&sys);
        let actual = check_core_property(&partial, 0.05, None).unwrap();
        assert!((actual - 0.01).abs() < 1e-9);
        let err = check_core_property(&partial, 0.001, None).unwrap_err();
        assert!(matches!(err, ValidationError::PropertyViolated { .. }));
        // Dropping s1 from the explored set makes it frontier too.
        let shrunk = PartialSystem::new(sys.clone(), BTreeSet::from([StateId(0)]));
        let actual = check_core_property(&shrunk, 1.0, Some(2)).unwrap();
        assert!((actual - 1.0).abs() < 1e-12);
        // One step already leaves the explored part.
        let err = check_core_property(&shrunk, 0.5, Some(1)).unwrap_err();
        assert!(matches!(err, ValidationError::PropertyViolated { actual, .. } if actual > 0.99));
        assert_eq!(check_core_property(&shrunk, 0.0, Some(0)), Ok(0.0));
    }

    #[test]
    fn non_convergence_is_reported() {
        let sys = system(&[(0, vec![vec![(0, 0.999), (1, 0.001)]])], 2);
        let partial = PartialSystem::full(&sys);
        let vi = ValueIteration {
            precision: 1e-15,
            max_iterations: 3,
        };
        let err = vi
            .reach(&partial, |s| s == StateId(1), Optimization::MaxValue)
            .unwrap_err();
        assert_eq!(err, ValidationError::NoConvergence(3));
    }
}
