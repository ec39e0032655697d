//! Exhaustive strategy: explore everything once, then sweep the quotient.

use std::rc::Rc;

use super::collapsing::{CollapsingAnalyser, CollapsingCore, CollapsingStrategy, Update};
use crate::explorer::Explorer;
use crate::model::StateId;
use crate::values::{ChoiceRef, CollapsingValues};
use crate::verdict::Verdict;

/// Global value iteration over the quotient.
///
/// The first round explores the full reachable state space and collapses all
/// end components; every round after that backs up every explored quotient
/// state once per available choice.
#[derive(Clone, Debug, Default)]
pub struct GlobalSweep {
    initialised: bool,
}

impl GlobalSweep {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E: Explorer, V: CollapsingValues> CollapsingStrategy<E, V> for GlobalSweep {
    fn round(&mut self, core: &mut CollapsingCore<E, V>, initial: StateId) -> Vec<Update> {
        if !self.initialised {
            self.initialised = true;
            core.explore_reachable(initial);
            core.handle_components(true);
        }
        let mut updates = Vec::new();
        for state in core.explored_quotient_states() {
            let distributions = core.distributions(state);
            let choices: Rc<[ChoiceRef]> = core.values().choices(state, &distributions).into();
            for &selected in choices.iter() {
                updates.push(Update::new(state, &distributions, &choices, selected));
            }
        }
        updates
    }
}

/// Collapsing analyser with the exhaustive sweep.
pub type GlobalAnalyser<E, V> = CollapsingAnalyser<E, V, GlobalSweep>;

impl<E: Explorer, V: CollapsingValues> CollapsingAnalyser<E, V, GlobalSweep> {
    pub fn global(explorer: E, values: V, verdict: impl Verdict + 'static) -> Self {
        Self::with_strategy(explorer, values, verdict, GlobalSweep::new())
    }
}
