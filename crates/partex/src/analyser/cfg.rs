//! Tunable constants of the analysers.
//!
//! The defaults are heuristic cost-balancing choices between exploring,
//! sampling, and searching for end components; none of them affects the
//! soundness of the computed bounds.

/// Base loop of the collapsing analysers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollapseCfg {
    /// Rounds without exploration before frontier states are force-explored.
    /// Afterwards the threshold follows `√(quotient size)`.
    pub initial_explore_threshold: usize,
    /// Newly explored states needed before an unforced component search.
    pub initial_detection_threshold: usize,
    /// Hard stop after this many rounds; the run then reports unsolved.
    pub round_limit: Option<u64>,
}

impl Default for CollapseCfg {
    fn default() -> Self {
        Self {
            initial_explore_threshold: 10,
            initial_detection_threshold: 100,
            round_limit: None,
        }
    }
}

/// Guided sampler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplerCfg {
    /// A round ends once this many states were visited again.
    pub revisit_cap: usize,
    /// Revisits from which a round asks for a component search.
    pub revisit_flag: usize,
    /// Dead ends a round may backtrack from.
    pub backtrack_cap: usize,
    /// Explorations per round.
    pub explore_cap: usize,
    /// Flagged rounds before the first component search.
    pub initial_collapse_threshold: i64,
    pub seed: u64,
}

impl Default for SamplerCfg {
    fn default() -> Self {
        Self {
            revisit_cap: 10,
            revisit_flag: 5,
            backtrack_cap: 4,
            explore_cap: 4,
            initial_collapse_threshold: 10,
            seed: 0,
        }
    }
}

/// Bounded-horizon sampler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrefixCfg {
    /// Explorations per round; reaching it ends the round early.
    pub explore_cap: usize,
    pub round_limit: Option<u64>,
    pub seed: u64,
}

impl Default for PrefixCfg {
    fn default() -> Self {
        Self {
            explore_cap: 5,
            round_limit: None,
            seed: 0,
        }
    }
}
