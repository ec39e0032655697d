//! Recoverable errors.
//!
//! Contract violations (monotonicity, probability mass, stale representatives)
//! are panics; only configuration and cross-validation failures surface here.

use thiserror::Error;

/// Rejected before any exploration starts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown step storage `{0}` (expected `dense` or `simple,<width>`)")]
    UnknownStorage(String),
    #[error("step storage width must be positive")]
    ZeroWidth,
    #[error("no reward structure named `{0}`")]
    MissingReward(String),
    #[error("no label named `{0}`")]
    MissingLabel(String),
    #[error("invalid precision {0} (expected a finite positive value)")]
    InvalidPrecision(f64),
    #[error("invalid model: {0}")]
    InvalidModel(String),
}

/// Exact re-solve of the extracted system disagrees with the tracked bounds.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("property violated: value {actual} exceeds allowed {expected_at_most}")]
    PropertyViolated { expected_at_most: f64, actual: f64 },
    #[error("value iteration did not converge within {0} iterations")]
    NoConvergence(usize),
}
