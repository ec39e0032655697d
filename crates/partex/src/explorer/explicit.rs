//! Explicit models: states are `usize` indices listed up front.
//!
//! Used by the CLI (JSON models) and throughout the tests. States without
//! listed choices are deadlocks.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::{GeneratedChoice, Generator, RewardFunction};

/// Model with explicitly enumerated choices, labels, and reward structures.
#[derive(Clone, Debug, Default)]
pub struct ExplicitModel {
    initial: Vec<usize>,
    choices: BTreeMap<usize, Vec<GeneratedChoice<usize>>>,
    labels: HashMap<String, BTreeSet<usize>>,
    rewards: HashMap<String, ExplicitRewards>,
}

impl ExplicitModel {
    pub fn new(initial: impl IntoIterator<Item = usize>) -> Self {
        Self {
            initial: initial.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Add an unlabelled choice to `state`.
    pub fn choice(self, state: usize, transitions: &[(usize, f64)]) -> Self {
        self.labelled_choice(state, None, transitions)
    }

    pub fn labelled_choice(
        mut self,
        state: usize,
        label: Option<&str>,
        transitions: &[(usize, f64)],
    ) -> Self {
        self.add_choice(state, label.map(str::to_owned), transitions.to_vec());
        self
    }

    pub fn add_choice(&mut self, state: usize, label: Option<String>, transitions: Vec<(usize, f64)>) {
        self.choices
            .entry(state)
            .or_default()
            .push(GeneratedChoice::new(label, transitions));
    }

    /// Attach `name` to each of `states`.
    pub fn label(mut self, name: &str, states: &[usize]) -> Self {
        self.add_label(name, states.iter().copied());
        self
    }

    pub fn add_label(&mut self, name: &str, states: impl IntoIterator<Item = usize>) {
        self.labels
            .entry(name.to_owned())
            .or_default()
            .extend(states);
    }

    pub fn state_reward(mut self, name: &str, state: usize, value: f64) -> Self {
        self.set_state_reward(name, state, value);
        self
    }

    pub fn set_state_reward(&mut self, name: &str, state: usize, value: f64) {
        self.rewards
            .entry(name.to_owned())
            .or_default()
            .states
            .insert(state, value);
    }

    pub fn transition_reward(mut self, name: &str, state: usize, label: &str, value: f64) -> Self {
        self.set_transition_reward(name, state, label, value);
        self
    }

    pub fn set_transition_reward(&mut self, name: &str, state: usize, label: &str, value: f64) {
        self.rewards
            .entry(name.to_owned())
            .or_default()
            .transitions
            .insert((state, label.to_owned()), value);
    }

    pub fn has_label(&self, name: &str, state: usize) -> bool {
        self.labels
            .get(name)
            .is_some_and(|states| states.contains(&state))
    }

    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }

    pub fn label_states(&self, name: &str) -> Option<&BTreeSet<usize>> {
        self.labels.get(name)
    }

    pub fn reward_structure(&self, name: &str) -> Option<ExplicitRewards> {
        self.rewards.get(name).cloned()
    }

    pub fn reward_names(&self) -> impl Iterator<Item = &str> {
        self.rewards.keys().map(String::as_str)
    }

    /// Number of states mentioned anywhere (initial, choices, targets).
    pub fn state_count(&self) -> usize {
        let targets = self
            .choices
            .values()
            .flatten()
            .flat_map(|c| c.transitions.iter().map(|&(t, _)| t));
        self.initial
            .iter()
            .copied()
            .chain(self.choices.keys().copied())
            .chain(targets)
            .max()
            .map_or(0, |m| m + 1)
    }
}

impl Generator for ExplicitModel {
    type State = usize;

    fn initial_states(&self) -> Vec<usize> {
        self.initial.clone()
    }

    fn choices(&self, state: &usize) -> Vec<GeneratedChoice<usize>> {
        self.choices.get(state).cloned().unwrap_or_default()
    }
}

/// One named reward structure of an `ExplicitModel`. Missing entries are 0.
#[derive(Clone, Debug, Default)]
pub struct ExplicitRewards {
    states: HashMap<usize, f64>,
    transitions: HashMap<(usize, String), f64>,
}

impl ExplicitRewards {
    /// Smallest and largest reward a run can collect per step.
    pub fn range(&self, state_count: usize) -> (f64, f64) {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for s in 0..state_count {
            let r = self.states.get(&s).copied().unwrap_or(0.0);
            lo = lo.min(r);
            hi = hi.max(r);
        }
        let (mut tlo, mut thi) = (0.0f64, 0.0f64);
        for &v in self.transitions.values() {
            tlo = tlo.min(v);
            thi = thi.max(v);
        }
        if lo > hi {
            return (tlo, thi);
        }
        (lo + tlo, hi + thi)
    }
}

impl RewardFunction<usize> for ExplicitRewards {
    fn state_reward(&self, state: &usize) -> f64 {
        self.states.get(state).copied().unwrap_or(0.0)
    }

    fn transition_reward(&self, state: &usize, label: Option<&str>) -> f64 {
        let Some(label) = label else {
            return 0.0;
        };
        self.transitions
            .get(&(*state, label.to_owned()))
            .copied()
            .unwrap_or(0.0)
    }
}
