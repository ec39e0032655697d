//! State ids, choices, and the growing transition system.

use std::collections::BTreeSet;
use std::fmt;

use super::distribution::Distribution;

/// Dense id of a discovered state. Ids are assigned in discovery order and
/// never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(pub usize);

impl StateId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// One nondeterministic alternative: an optional action label and the
/// distribution it induces.
#[derive(Clone, Debug, PartialEq)]
pub struct Choice {
    pub label: Option<String>,
    pub distribution: Distribution,
}

impl Choice {
    pub fn new(label: Option<String>, distribution: Distribution) -> Self {
        Self {
            label,
            distribution,
        }
    }

    pub fn unlabelled(distribution: Distribution) -> Self {
        Self::new(None, distribution)
    }

    #[inline]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

/// Transition system discovered so far.
///
/// Every known state has an id; only explored states carry choices. Unexplored
/// states form the frontier. Exploration is one-way: once explored, a state's
/// choices never change.
#[derive(Clone, Debug, Default)]
pub struct TransitionSystem {
    initial: Vec<StateId>,
    choices: Vec<Option<Vec<Choice>>>,
    explored: usize,
}

impl TransitionSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id (frontier state).
    pub fn add_state(&mut self) -> StateId {
        let id = StateId(self.choices.len());
        self.choices.push(None);
        id
    }

    pub fn add_initial(&mut self, state: StateId) {
        debug_assert!(state.0 < self.choices.len());
        if !self.initial.contains(&state) {
            self.initial.push(state);
        }
    }

    /// Record the choices of a frontier state. Panics if already explored.
    pub fn set_choices(&mut self, state: StateId, choices: Vec<Choice>) {
        let slot = &mut self.choices[state.0];
        assert!(slot.is_none(), "state {state} explored twice");
        *slot = Some(choices);
        self.explored += 1;
    }

    #[inline]
    pub fn initial_states(&self) -> &[StateId] {
        &self.initial
    }

    /// Number of known states (explored and frontier).
    #[inline]
    pub fn state_count(&self) -> usize {
        self.choices.len()
    }

    #[inline]
    pub fn explored_count(&self) -> usize {
        self.explored
    }

    #[inline]
    pub fn contains(&self, state: StateId) -> bool {
        state.0 < self.choices.len()
    }

    #[inline]
    pub fn is_explored(&self, state: StateId) -> bool {
        matches!(self.choices.get(state.0), Some(Some(_)))
    }

    /// Choices of `state`; empty for frontier states.
    #[inline]
    pub fn choices(&self, state: StateId) -> &[Choice] {
        match self.choices.get(state.0) {
            Some(Some(c)) => c,
            _ => &[],
        }
    }

    pub fn states(&self) -> impl Iterator<Item = StateId> {
        (0..self.choices.len()).map(StateId)
    }

    pub fn explored_states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.choices
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_some())
            .map(|(i, _)| StateId(i))
    }

    /// Deduplicated successors over all choices of `state`.
    pub fn successors(&self, state: StateId) -> BTreeSet<StateId> {
        self.choices(state)
            .iter()
            .flat_map(|c| c.distribution.support())
            .collect()
    }

    pub fn is_deterministic(&self) -> bool {
        self.choices.iter().flatten().all(|c| c.len() <= 1)
    }
}

/// Read-only snapshot of the explored part of a transition system.
///
/// States outside `explored` are treated as frontier even when the underlying
/// system knows their choices (e.g. states whose values never left the
/// default).
#[derive(Clone, Debug)]
pub struct PartialSystem {
    system: TransitionSystem,
    explored: BTreeSet<StateId>,
}

impl PartialSystem {
    pub fn new(system: TransitionSystem, explored: BTreeSet<StateId>) -> Self {
        debug_assert!(explored.iter().all(|&s| system.is_explored(s)));
        Self { system, explored }
    }

    /// Snapshot with every explored state kept.
    pub fn full(system: &TransitionSystem) -> Self {
        let explored = system.explored_states().collect();
        Self::new(system.clone(), explored)
    }

    #[inline]
    pub fn system(&self) -> &TransitionSystem {
        &self.system
    }

    #[inline]
    pub fn initial_states(&self) -> &[StateId] {
        self.system.initial_states()
    }

    #[inline]
    pub fn is_explored(&self, state: StateId) -> bool {
        self.explored.contains(&state)
    }

    pub fn explored_states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.explored.iter().copied()
    }

    #[inline]
    pub fn explored_count(&self) -> usize {
        self.explored.len()
    }

    #[inline]
    pub fn state_count(&self) -> usize {
        self.system.state_count()
    }

    /// Choices of an explored state; empty for frontier states.
    pub fn choices(&self, state: StateId) -> &[Choice] {
        if self.is_explored(state) {
            self.system.choices(state)
        } else {
            &[]
        }
    }
}
