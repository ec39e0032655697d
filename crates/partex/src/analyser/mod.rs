//! Analysis drivers.
//!
//! Purpose
//! - Run rounds of update/explore/collapse until the verdict accepts the bounds
//!   of every initial state, then expose the final bounds and the explored part.
//!
//! Families
//! - Collapsing analysers (prefix-independent objectives: unbounded reach, core
//!   coverage, mean payoff). One base loop, `CollapsingAnalyser`, parameterised
//!   by a `CollapsingStrategy`: `GlobalSweep` (explore everything, sweep the
//!   whole quotient every round) or `GuidedSampler` (one trajectory per round).
//! - Prefix analysers (step-bounded objectives). `PrefixAnalyser` with the
//!   `PrefixSampler` strategy; no quotienting.
//!
//! Why this design
//! - Strategies return update batches instead of applying them, so the order of
//!   backups is explicit and testable.
//! - Execution is single-threaded. The verdict is checked once per round and a
//!   round always runs to completion; `round_limit` is the only hard stop.

mod cfg;
mod collapsing;
mod global;
mod prefix;
mod sampler;

use std::fmt;

use crate::bounds::Bounds;
use crate::model::{PartialSystem, StateId};
use crate::verdict::{Resolution, Verdict};

pub use cfg::{CollapseCfg, PrefixCfg, SamplerCfg};
pub use collapsing::{CollapsingAnalyser, CollapsingCore, CollapsingStrategy, Update};
pub use global::{GlobalAnalyser, GlobalSweep};
pub use prefix::{PrefixAnalyser, PrefixSampler, PrefixStrategy, PrefixUpdate};
pub use sampler::{GuidedSampler, SamplingAnalyser};

/// Common surface of all analysers.
pub trait Analyser {
    /// Run until every initial state is solved. Returns false if the round
    /// limit stopped the run first.
    fn run(&mut self) -> bool;

    fn initial_states(&self) -> Vec<StateId>;

    /// Current bounds of `state` (resolved through the quotient if any).
    fn bounds(&self, state: StateId) -> Bounds;

    fn verdict(&self) -> &dyn Verdict;

    /// The explored part that carries information.
    fn model(&self) -> PartialSystem;

    fn statistics(&self) -> Statistics;

    fn resolve(&self, state: StateId) -> Option<Resolution> {
        self.verdict().resolve(&self.bounds(state))
    }

    fn is_solved(&self) -> bool {
        self.initial_states()
            .iter()
            .all(|&s| self.verdict().is_solved(&self.bounds(s)))
    }
}

/// Snapshot handed to the progress observer after every round.
#[derive(Clone, Debug, PartialEq)]
pub struct Progress {
    pub rounds: u64,
    pub explored_states: usize,
    pub initial_bounds: Vec<(StateId, Bounds)>,
}

pub type ProgressObserver = Box<dyn FnMut(&Progress)>;

/// Counters of one analysis run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Statistics {
    pub explored_states: usize,
    /// Quotient states (all known states for prefix analysers).
    pub quotient_states: usize,
    pub rounds: u64,
    pub component_searches: u64,
    pub successful_component_searches: u64,
    pub backtracks: u64,
    pub backtracks_to_initial: u64,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "explored {} states ({} in quotient) in {} rounds",
            self.explored_states, self.quotient_states, self.rounds
        )?;
        if self.component_searches > 0 {
            write!(
                f,
                ", {}/{} component searches successful",
                self.successful_component_searches, self.component_searches
            )?;
        }
        if self.backtracks > 0 {
            write!(
                f,
                ", {} backtracks ({} to initial)",
                self.backtracks, self.backtracks_to_initial
            )?;
        }
        Ok(())
    }
}
