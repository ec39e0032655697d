//! Generator-backed explorer with a shared id → state table.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use super::{Explorer, Generator, RewardExplorer};
use crate::model::{Choice, Distribution, StateId, TransitionSystem};

/// Append-only table from `StateId` to the generator's state.
///
/// Cloning shares the table, so closures handed to value policies see states
/// interned after they were created.
#[derive(Debug)]
pub struct StateTable<S> {
    states: Rc<RefCell<Vec<S>>>,
}

impl<S> Clone for StateTable<S> {
    fn clone(&self) -> Self {
        Self {
            states: Rc::clone(&self.states),
        }
    }
}

impl<S> Default for StateTable<S> {
    fn default() -> Self {
        Self {
            states: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<S: Clone> StateTable<S> {
    fn push(&self, state: S) -> StateId {
        let mut states = self.states.borrow_mut();
        states.push(state);
        StateId(states.len() - 1)
    }

    pub fn get(&self, id: StateId) -> Option<S> {
        self.states.borrow().get(id.0).cloned()
    }

    /// Apply `f` to the state behind `id` without cloning it.
    pub fn with<T>(&self, id: StateId, f: impl FnOnce(&S) -> T) -> Option<T> {
        self.states.borrow().get(id.0).map(f)
    }

    pub fn len(&self) -> usize {
        self.states.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Explorer over any `Generator`.
pub struct DefaultExplorer<G: Generator> {
    generator: G,
    table: StateTable<G::State>,
    ids: HashMap<G::State, StateId>,
    system: TransitionSystem,
}

impl<G: Generator> DefaultExplorer<G> {
    pub fn new(generator: G) -> Self {
        let mut explorer = Self {
            table: StateTable::default(),
            ids: HashMap::new(),
            system: TransitionSystem::new(),
            generator,
        };
        for state in explorer.generator.initial_states() {
            let id = explorer.intern(state);
            explorer.system.add_initial(id);
        }
        explorer
    }

    fn intern(&mut self, state: G::State) -> StateId {
        if let Some(&id) = self.ids.get(&state) {
            return id;
        }
        let id = self.table.push(state.clone());
        let allocated = self.system.add_state();
        debug_assert_eq!(id, allocated);
        self.ids.insert(state, id);
        id
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Id of an already discovered state.
    pub fn lookup(&self, state: &G::State) -> Option<StateId> {
        self.ids.get(state).copied()
    }

    pub fn state(&self, id: StateId) -> Option<G::State> {
        self.table.get(id)
    }

    pub fn state_table(&self) -> StateTable<G::State> {
        self.table.clone()
    }

    /// Lift a predicate on model states to ids. Unknown ids map to `false`.
    pub fn state_predicate<P>(&self, predicate: P) -> impl Fn(StateId) -> bool
    where
        P: Fn(&G::State) -> bool,
    {
        let table = self.table.clone();
        move |id| table.with(id, &predicate).unwrap_or(false)
    }

    /// Attach a reward function to the ids of this explorer.
    pub fn rewards<R: RewardFunction<G::State>>(&self, rewards: R) -> TableRewards<G::State, R> {
        TableRewards {
            table: self.table.clone(),
            rewards,
        }
    }
}

impl<G: Generator> Explorer for DefaultExplorer<G> {
    fn partial_system(&self) -> &TransitionSystem {
        &self.system
    }

    fn explore_state(&mut self, state: StateId) {
        if self.system.is_explored(state) {
            return;
        }
        let Some(model_state) = self.table.get(state) else {
            panic!("explore of unknown state {state}");
        };
        let generated = self.generator.choices(&model_state);
        let mut choices = Vec::with_capacity(generated.len().max(1));
        for choice in generated {
            let pairs: Vec<(StateId, f64)> = choice
                .transitions
                .into_iter()
                .map(|(s, p)| (self.intern(s), p))
                .collect();
            let distribution = Distribution::new(pairs);
            debug_assert!(
                (distribution.total() - 1.0).abs() < 1e-6,
                "choice of {state} has mass {}",
                distribution.total()
            );
            if !distribution.is_empty() {
                choices.push(Choice::new(choice.label, distribution));
            }
        }
        if choices.is_empty() {
            choices.push(Choice::unlabelled(Distribution::dirac(state)));
        }
        trace!(%state, choices = choices.len(), "explored");
        self.system.set_choices(state, choices);
    }
}

/// Rewards defined on the generator's state type.
pub trait RewardFunction<S> {
    fn state_reward(&self, state: &S) -> f64;

    fn transition_reward(&self, _state: &S, _label: Option<&str>) -> f64 {
        0.0
    }
}

/// A `RewardFunction` resolved through a shared `StateTable`.
pub struct TableRewards<S, R> {
    table: StateTable<S>,
    rewards: R,
}

impl<S: Clone, R: RewardFunction<S>> RewardExplorer for TableRewards<S, R> {
    fn reward(&self, state: StateId) -> f64 {
        self.table
            .with(state, |s| self.rewards.state_reward(s))
            .unwrap_or(0.0)
    }

    fn transition_reward(&self, state: StateId, choice: &Choice) -> f64 {
        self.table
            .with(state, |s| self.rewards.transition_reward(s, choice.label()))
            .unwrap_or(0.0)
    }
}
