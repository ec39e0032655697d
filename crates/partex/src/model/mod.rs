//! Transition-system data model.
//!
//! Purpose
//! - Dense `StateId`s, sparse `Distribution`s, labelled `Choice`s, and the
//!   `TransitionSystem` that grows as the explorer discovers states.
//! - `PartialSystem` is the read-only snapshot handed out by analysers.
//!
//! Why this design
//! - Ids are plain indices so per-state tables (quotient arena, value maps)
//!   can be vectors or hash maps without owning the generator's state type.

mod distribution;
mod types;

pub use distribution::Distribution;
pub use types::{Choice, PartialSystem, StateId, TransitionSystem};

#[cfg(test)]
mod tests;
