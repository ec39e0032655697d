//! Objective-specific value policies.
//!
//! Purpose
//! - Store per-state `Bounds` for one objective and perform the Bellman-style
//!   backup that tightens them.
//! - `CollapsingValues` works on quotient states (end components collapsed);
//!   `PrefixValues` works on `(state, remaining steps)` pairs.
//!
//! Why this design
//! - Analysers own the traversal (which states, in which order); policies own
//!   the arithmetic. Choices are addressed by `ChoiceRef`, a closed union of
//!   "ordinary transition i" and "stay inside the collapsed component", so
//!   mean payoff can offer the extra action without downcasts.
//!
//! Policies
//! - `UnboundedReachValues`, `BoundedReachValues`: probability to reach a goal.
//! - `UnboundedCoreValues`, `BoundedCoreValues`: upper bound on the probability
//!   to reach the unexplored frontier.
//! - `MeanPayoffValues`: long-run average reward with a nested relative value
//!   iteration per collapsed component.

mod coverage;
mod mean_payoff;
mod reach;
mod storage;

use crate::bounds::Bounds;
use crate::model::{Choice, Distribution, StateId};
use crate::quotient::Component;

pub use coverage::{BoundedCoreValues, UnboundedCoreValues};
pub use mean_payoff::{ComponentIterator, MeanPayoffValues, DEFAULT_MOMENTUM};
pub use reach::{BoundedReachValues, ReachTarget, UnboundedReachValues};
pub use storage::StepStorage;

/// One action available in a quotient state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChoiceRef {
    /// Index into the state's quotient distributions.
    Transition(usize),
    /// Remain inside the collapsed component forever.
    Stay,
}

/// Value policy over quotient states.
pub trait CollapsingValues {
    fn bounds(&self, state: StateId) -> Bounds;

    /// True while nothing is known about `state` beyond the default.
    fn is_unknown(&self, state: StateId) -> bool;

    fn lower_bound(&self, state: StateId) -> f64 {
        self.bounds(state).lower()
    }

    fn upper_bound(&self, state: StateId) -> f64 {
        self.bounds(state).upper()
    }

    fn difference(&self, state: StateId) -> f64 {
        self.bounds(state).width()
    }

    /// Actions of `state` given its quotient distributions.
    fn choices(&self, _state: StateId, distributions: &[Distribution]) -> Vec<ChoiceRef> {
        (0..distributions.len()).map(ChoiceRef::Transition).collect()
    }

    /// Successor distribution of an action; `None` for `Stay`.
    fn successors<'a>(
        &self,
        distributions: &'a [Distribution],
        choice: ChoiceRef,
    ) -> Option<&'a Distribution> {
        match choice {
            ChoiceRef::Transition(i) => distributions.get(i),
            ChoiceRef::Stay => None,
        }
    }

    /// Ranking key for greedy selection (larger is better).
    fn score(&self, state: StateId, distributions: &[Distribution], choice: ChoiceRef) -> f64;

    /// One backup of `state`; returns the stored bounds afterwards.
    fn update(
        &mut self,
        state: StateId,
        distributions: &[Distribution],
        choices: &[ChoiceRef],
        selected: ChoiceRef,
    ) -> Bounds;

    /// Re-seed `representative` after `component` was merged into it.
    fn collapse(
        &mut self,
        representative: StateId,
        distributions: &[Distribution],
        component: &Component,
    );
}

/// Value policy over `(state, remaining steps)`.
pub trait PrefixValues {
    fn bounds(&self, state: StateId, remaining: usize) -> Bounds;

    fn lower_bound(&self, state: StateId, remaining: usize) -> f64 {
        self.bounds(state, remaining).lower()
    }

    fn upper_bound(&self, state: StateId, remaining: usize) -> f64 {
        self.bounds(state, remaining).upper()
    }

    fn difference(&self, state: StateId, remaining: usize) -> f64 {
        self.bounds(state, remaining).width()
    }

    fn score(&self, state: StateId, remaining: usize, choice: &Choice) -> f64;

    fn update(
        &mut self,
        state: StateId,
        remaining: usize,
        choices: &[Choice],
        selected: &Choice,
    ) -> Bounds;
}

/// First item with the highest score; `None` on empty input.
pub(crate) fn optimal<T: Copy>(items: impl IntoIterator<Item = T>, score: impl Fn(T) -> f64) -> Option<T> {
    let mut best: Option<(T, f64)> = None;
    for item in items {
        let s = score(item);
        match best {
            Some((_, b)) if s <= b => {}
            _ => best = Some((item, s)),
        }
    }
    best.map(|(item, _)| item)
}

#[cfg(test)]
mod tests;
