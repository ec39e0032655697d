//! Safety restriction of a generator.

use super::{GeneratedChoice, Generator};

/// Wraps a generator so that states violating `safe` become absorbing.
///
/// Reachability of the unsafe set is then unchanged while nothing behind it is
/// ever explored.
pub struct SafetyGenerator<G, F> {
    inner: G,
    safe: F,
}

impl<G, F> SafetyGenerator<G, F>
where
    G: Generator,
    F: Fn(&G::State) -> bool,
{
    pub fn new(inner: G, safe: F) -> Self {
        Self { inner, safe }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

impl<G, F> Generator for SafetyGenerator<G, F>
where
    G: Generator,
    F: Fn(&G::State) -> bool,
{
    type State = G::State;

    fn initial_states(&self) -> Vec<G::State> {
        self.inner.initial_states()
    }

    fn choices(&self, state: &G::State) -> Vec<GeneratedChoice<G::State>> {
        if (self.safe)(state) {
            self.inner.choices(state)
        } else {
            Vec::new()
        }
    }
}
