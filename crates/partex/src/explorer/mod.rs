//! On-demand exploration of a transition system.
//!
//! Purpose
//! - `Generator`: the model as a successor function over its own state type.
//! - `Explorer`: assigns dense `StateId`s to generated states and records the
//!   choices of each state the first time it is explored.
//! - `RewardExplorer`: state and transition rewards keyed by `StateId`.
//!
//! Why this design
//! - Analysers only see ids and distributions; the generator's state type stays
//!   behind `DefaultExplorer`, which keeps a shared `StateTable` so predicates
//!   (goal labels, rewards) can map ids back to model states.
//! - Deadlock states (no generated choices) get a self-loop so every explored
//!   state has at least one choice.

mod default;
mod explicit;
mod safety;

use std::collections::{HashSet, VecDeque};

use crate::model::{Choice, PartialSystem, StateId, TransitionSystem};

pub use default::{DefaultExplorer, RewardFunction, StateTable, TableRewards};
pub use explicit::{ExplicitModel, ExplicitRewards};
pub use safety::SafetyGenerator;

/// A choice as produced by a generator: label plus raw `(state, probability)`
/// pairs. Duplicate targets are merged on interning.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedChoice<S> {
    pub label: Option<String>,
    pub transitions: Vec<(S, f64)>,
}

impl<S> GeneratedChoice<S> {
    pub fn new(label: Option<String>, transitions: Vec<(S, f64)>) -> Self {
        Self { label, transitions }
    }
}

/// Successor function of a model.
pub trait Generator {
    type State: Clone + Eq + std::hash::Hash;

    fn initial_states(&self) -> Vec<Self::State>;

    /// All choices enabled in `state`. An empty result marks a deadlock.
    fn choices(&self, state: &Self::State) -> Vec<GeneratedChoice<Self::State>>;
}

/// Incrementally explored transition system over dense ids.
pub trait Explorer {
    /// Everything discovered so far.
    fn partial_system(&self) -> &TransitionSystem;

    /// Compute and record the choices of `state`. No-op if already explored.
    fn explore_state(&mut self, state: StateId);

    fn initial_states(&self) -> &[StateId] {
        self.partial_system().initial_states()
    }

    fn is_explored(&self, state: StateId) -> bool {
        self.partial_system().is_explored(state)
    }

    fn explored_count(&self) -> usize {
        self.partial_system().explored_count()
    }

    /// Choices of `state`; empty until explored.
    fn choices(&self, state: StateId) -> &[Choice] {
        self.partial_system().choices(state)
    }

    /// Explore everything reachable from `seeds` (breadth-first).
    fn explore_reachable(&mut self, seeds: &[StateId]) {
        let mut seen: HashSet<StateId> = seeds.iter().copied().collect();
        let mut queue: VecDeque<StateId> = seeds.iter().copied().collect();
        while let Some(state) = queue.pop_front() {
            self.explore_state(state);
            let successors = self.partial_system().successors(state);
            for next in successors {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }

    /// Snapshot of the whole explored part.
    fn snapshot(&self) -> PartialSystem {
        PartialSystem::full(self.partial_system())
    }
}

/// Rewards over explored ids, used by mean-payoff analysis.
pub trait RewardExplorer {
    fn reward(&self, state: StateId) -> f64;

    fn transition_reward(&self, _state: StateId, _choice: &Choice) -> f64 {
        0.0
    }
}

impl<R: RewardExplorer + ?Sized> RewardExplorer for Box<R> {
    fn reward(&self, state: StateId) -> f64 {
        (**self).reward(state)
    }

    fn transition_reward(&self, state: StateId, choice: &Choice) -> f64 {
        (**self).transition_reward(state, choice)
    }
}

#[cfg(test)]
mod tests;
