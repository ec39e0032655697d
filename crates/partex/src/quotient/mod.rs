//! Dynamic quotient: collapse end components of the explored system.
//!
//! Purpose
//! - Maintain an equivalence on state ids in which each maximal end component
//!   found so far is merged into a single representative (its smallest id).
//! - Present the quotient's choices: member choices remapped onto
//!   representatives, with intra-class mass inlined and fully internal choices
//!   dropped.
//!
//! Why this design
//! - Union-find over an index arena with path halving; ids are dense so the
//!   arena is a `Vec`. `representative` takes `&self` (interior mutability
//!   through `Cell`) so it can be called while other parts of an analyser are
//!   borrowed.
//! - Quotient distributions are recomputed on request. Components only ever
//!   grow, so any cached copy would need invalidation on every merge.
//!
//! Invariants
//! - `representative(representative(s)) == representative(s)`.
//! - Only explored states are ever merged; frontier states stay singletons.
//! - Classes only grow over time.

mod components;

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::model::{Choice, Distribution, StateId, TransitionSystem};

/// A freshly collapsed end component, in terms of original states.
#[derive(Clone, Debug, PartialEq)]
pub struct Component {
    states: BTreeSet<StateId>,
    choices: BTreeMap<StateId, Vec<Choice>>,
}

impl Component {
    pub(crate) fn new(states: BTreeSet<StateId>, choices: BTreeMap<StateId, Vec<Choice>>) -> Self {
        Self { states, choices }
    }

    /// All original states of the class.
    pub fn states(&self) -> &BTreeSet<StateId> {
        &self.states
    }

    pub fn size(&self) -> usize {
        self.states.len()
    }

    pub fn contains(&self, state: StateId) -> bool {
        self.states.contains(&state)
    }

    /// Choices of `state` whose support lies entirely inside the class.
    pub fn choices(&self, state: StateId) -> &[Choice] {
        self.choices.get(&state).map_or(&[], Vec::as_slice)
    }

    /// `(state, internal choices)` for every member.
    pub fn iter(&self) -> impl Iterator<Item = (StateId, &[Choice])> + '_ {
        self.states.iter().map(move |&s| (s, self.choices(s)))
    }
}

/// Union-find quotient of a transition system by its collapsed end components.
#[derive(Debug, Default)]
pub struct DynamicQuotient {
    parent: Vec<Cell<usize>>,
    members: HashMap<StateId, Vec<StateId>>,
    collapsed: HashSet<StateId>,
}

impl DynamicQuotient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Class representative of `state`.
    pub fn representative(&self, state: StateId) -> StateId {
        let mut x = state.0;
        if x >= self.parent.len() {
            return state;
        }
        loop {
            let p = self.parent[x].get();
            if p == x {
                return StateId(x);
            }
            let gp = self.parent[p].get();
            self.parent[x].set(gp);
            x = gp;
        }
    }

    #[inline]
    pub fn is_removed(&self, state: StateId) -> bool {
        self.representative(state) != state
    }

    /// Original states of the class of `state` (sorted).
    pub fn class_members(&self, state: StateId) -> Vec<StateId> {
        let rep = self.representative(state);
        self.members.get(&rep).cloned().unwrap_or_else(|| vec![rep])
    }

    /// Representatives of all states known to `system`.
    pub fn states<'a>(&'a self, system: &'a TransitionSystem) -> impl Iterator<Item = StateId> + 'a {
        system.states().filter(move |&s| !self.is_removed(s))
    }

    pub fn state_count(&self, system: &TransitionSystem) -> usize {
        self.states(system).count()
    }

    /// Quotient choices of the class of `state`.
    ///
    /// Every member choice is remapped onto representatives; mass staying in
    /// the class is divided out. Choices that never leave the class vanish.
    pub fn distributions(&self, system: &TransitionSystem, state: StateId) -> Vec<Distribution> {
        let rep = self.representative(state);
        let members = self.members.get(&rep).map(Vec::as_slice);
        let members = members.unwrap_or(std::slice::from_ref(&rep));
        let mut result = Vec::new();
        for &member in members {
            for choice in system.choices(member) {
                let remapped = choice
                    .distribution
                    .map_states(|t| self.representative(t));
                if let Some(inlined) = remapped.without_self_loop(rep) {
                    result.push(inlined);
                }
            }
        }
        result
    }

    /// Search for new end components reachable from `recent` and merge them.
    ///
    /// The search space is the forward closure of the representatives of
    /// `recent` over explored quotient states. Singleton components already
    /// reported earlier are skipped. Returns the new classes keyed by their
    /// representative.
    pub fn update_components(
        &mut self,
        system: &TransitionSystem,
        recent: &BTreeSet<StateId>,
        is_explored: impl Fn(StateId) -> bool,
    ) -> BTreeMap<StateId, Component> {
        let seeds: BTreeSet<StateId> = recent
            .iter()
            .map(|&s| self.representative(s))
            .filter(|&r| is_explored(r))
            .collect();
        if seeds.is_empty() {
            return BTreeMap::new();
        }

        // Forward closure over explored representatives, collecting quotient
        // choices as target lists along the way.
        let mut choices: HashMap<StateId, Vec<Vec<StateId>>> = HashMap::new();
        let mut nodes: Vec<StateId> = Vec::new();
        let mut seen: HashSet<StateId> = seeds.iter().copied().collect();
        let mut queue: VecDeque<StateId> = seeds.into_iter().collect();
        while let Some(node) = queue.pop_front() {
            nodes.push(node);
            let mut node_choices = Vec::new();
            for member in self.class_members(node) {
                for choice in system.choices(member) {
                    let targets: Vec<StateId> = choice
                        .distribution
                        .support()
                        .map(|t| self.representative(t))
                        .collect::<BTreeSet<_>>()
                        .into_iter()
                        .collect();
                    for &t in &targets {
                        if is_explored(t) && seen.insert(t) {
                            queue.push_back(t);
                        }
                    }
                    node_choices.push(targets);
                }
            }
            choices.insert(node, node_choices);
        }
        nodes.sort();

        let mut result = BTreeMap::new();
        for mec in components::maximal_end_components(&nodes, &choices) {
            if mec.len() == 1 && self.collapsed.contains(&mec[0]) {
                continue;
            }
            let (rep, component) = self.merge(system, &mec);
            result.insert(rep, component);
        }
        if !result.is_empty() {
            debug!(
                searched = nodes.len(),
                found = result.len(),
                "collapsed end components"
            );
        }
        result
    }

    /// Merge the classes of `reps` into the smallest one.
    fn merge(&mut self, system: &TransitionSystem, reps: &[StateId]) -> (StateId, Component) {
        let rep = reps.iter().copied().min().unwrap_or(reps[0]);
        let mut states: BTreeSet<StateId> = BTreeSet::new();
        for &r in reps {
            states.extend(self.class_members(r));
        }
        let max_id = states.iter().map(|s| s.0).max().unwrap_or(rep.0);
        if self.parent.len() <= max_id {
            let from = self.parent.len();
            self.parent.extend((from..=max_id).map(Cell::new));
        }
        for &r in reps {
            self.members.remove(&r);
            self.collapsed.remove(&r);
            self.parent[r.0].set(rep.0);
        }
        self.members.insert(rep, states.iter().copied().collect());
        self.collapsed.insert(rep);

        let mut choices = BTreeMap::new();
        for &member in &states {
            let inside: Vec<Choice> = system
                .choices(member)
                .iter()
                .filter(|c| c.distribution.support().all(|t| states.contains(&t)))
                .cloned()
                .collect();
            choices.insert(member, inside);
        }
        (rep, Component::new(states, choices))
    }
}

#[cfg(test)]
mod tests;
