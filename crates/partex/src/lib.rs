//! Partial exploration of Markov decision processes.
//!
//! Analyses explore a (possibly infinite) MDP on demand and track an interval
//! `Bounds` per state that is guaranteed to contain the true value. A run stops
//! as soon as a `Verdict` accepts the interval of every initial state.
//!
//! Layout
//! - `model`, `explorer`: ids, distributions, the explored subgraph, and
//!   on-demand exploration of a `Generator`.
//! - `quotient`: end-component collapsing over the explored part.
//! - `values`: objective-specific bound storage and Bellman backups.
//! - `analyser`: the drivers (global sweep, guided sampler, bounded horizon).
//! - `verdict`, `validate`: stopping criteria and an exact re-solve of the
//!   extracted system.
//!
//! API Policy
//! - This crate is project-internal. There is no stable public API.

pub mod analyser;
pub mod bounds;
pub mod error;
pub mod explorer;
pub mod model;
pub mod quotient;
pub mod validate;
pub mod values;
pub mod verdict;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use bounds::{Bounds, Optimization};
pub use model::StateId;

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::analyser::{
        Analyser, CollapseCfg, CollapsingAnalyser, GlobalAnalyser, PrefixAnalyser, PrefixCfg, Progress,
        SamplerCfg, SamplingAnalyser, Statistics,
    };
    pub use crate::bounds::{Bounds, Optimization};
    pub use crate::error::{ConfigError, ValidationError};
    pub use crate::explorer::{
        DefaultExplorer, ExplicitModel, Explorer, GeneratedChoice, Generator, RewardExplorer, SafetyGenerator,
    };
    pub use crate::model::{Choice, Distribution, PartialSystem, StateId, TransitionSystem};
    pub use crate::values::{
        BoundedCoreValues, BoundedReachValues, CollapsingValues, MeanPayoffValues, PrefixValues, ReachTarget,
        StepStorage, UnboundedCoreValues, UnboundedReachValues,
    };
    pub use crate::verdict::{Comparison, QualitativeVerdict, QuantitativeVerdict, Resolution, Verdict};
}
