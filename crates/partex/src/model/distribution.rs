//! Finite probability distributions over state ids.

use rand::Rng;

use super::types::StateId;
use crate::bounds::{is_one, Bounds, KahanSum, EPS};

/// Sparse distribution: `(state, probability)` pairs sorted by state id with
/// duplicates merged and zero entries dropped.
///
/// Probabilities are not renormalised on construction; callers provide mass
/// that sums to 1 (up to rounding). `total()` reports the actual mass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Distribution {
    entries: Vec<(StateId, f64)>,
}

impl Distribution {
    pub fn new<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (StateId, f64)>,
    {
        let mut entries: Vec<(StateId, f64)> =
            pairs.into_iter().filter(|&(_, p)| p > 0.0).collect();
        entries.sort_by_key(|&(s, _)| s);
        let mut merged: Vec<(StateId, f64)> = Vec::with_capacity(entries.len());
        for (s, p) in entries {
            match merged.last_mut() {
                Some((last, q)) if *last == s => *q += p,
                _ => merged.push((s, p)),
            }
        }
        Self { entries: merged }
    }

    /// Point mass on `state`.
    pub fn dirac(state: StateId) -> Self {
        Self {
            entries: vec![(state, 1.0)],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StateId, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn support(&self) -> impl Iterator<Item = StateId> + '_ {
        self.entries.iter().map(|&(s, _)| s)
    }

    pub fn total(&self) -> f64 {
        let mut sum = KahanSum::new();
        for &(_, p) in &self.entries {
            sum.add(p);
        }
        sum.get()
    }

    pub fn get(&self, state: StateId) -> f64 {
        match self.entries.binary_search_by_key(&state, |&(s, _)| s) {
            Ok(i) => self.entries[i].1,
            Err(_) => 0.0,
        }
    }

    #[inline]
    pub fn contains(&self, state: StateId) -> bool {
        self.entries
            .binary_search_by_key(&state, |&(s, _)| s)
            .is_ok()
    }

    /// True iff all mass sits on `state` (pure self-loop from `state`).
    #[inline]
    pub fn is_only_successor(&self, state: StateId) -> bool {
        self.entries.len() == 1 && self.entries[0].0 == state
    }

    /// `Σ p(s) · f(s)`.
    pub fn sum_weighted(&self, f: impl Fn(StateId) -> f64) -> f64 {
        self.entries.iter().map(|&(s, p)| p * f(s)).sum()
    }

    /// Componentwise `Σ p(s) · f(s)` over bounds.
    pub fn sum_weighted_bounds(&self, f: impl Fn(StateId) -> Bounds) -> Bounds {
        let (mut lower, mut upper) = (0.0, 0.0);
        for &(s, p) in &self.entries {
            let b = f(s);
            lower += p * b.lower();
            upper += p * b.upper();
        }
        Bounds::new(lower, upper)
    }

    /// Jacobi-style weighted sum that treats the self-loop on `state` as
    /// already converged: `Σ_{s ≠ state} p(s) · f(s) / (1 - p(state))`.
    ///
    /// Returns `None` when (almost) all mass is on `state`.
    pub fn sum_weighted_except_jacobi(
        &self,
        f: impl Fn(StateId) -> f64,
        state: StateId,
    ) -> Option<f64> {
        let stay = self.get(state);
        if is_one(stay) || stay >= 1.0 {
            return None;
        }
        let mut sum = 0.0;
        for &(s, p) in &self.entries {
            if s != state {
                sum += p * f(s);
            }
        }
        Some(sum / (1.0 - stay))
    }

    /// Bounds version of [`Distribution::sum_weighted_except_jacobi`].
    pub fn sum_weighted_except_jacobi_bounds(
        &self,
        f: impl Fn(StateId) -> Bounds,
        state: StateId,
    ) -> Option<Bounds> {
        let stay = self.get(state);
        if is_one(stay) || stay >= 1.0 {
            return None;
        }
        let (mut lower, mut upper) = (0.0, 0.0);
        for &(s, p) in &self.entries {
            if s != state {
                let b = f(s);
                lower += p * b.lower();
                upper += p * b.upper();
            }
        }
        let scale = 1.0 / (1.0 - stay);
        Some(Bounds::new(lower * scale, upper * scale))
    }

    /// Sample a successor with probability proportional to `weight(s, p(s))`.
    ///
    /// Returns `None` if every weight is zero (or negative).
    pub fn sample_weighted<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        weight: impl Fn(StateId, f64) -> f64,
    ) -> Option<StateId> {
        self.sample_weighted_except(rng, weight, |_| false)
    }

    /// As [`Distribution::sample_weighted`], skipping states where `exclude`
    /// holds.
    pub fn sample_weighted_except<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        weight: impl Fn(StateId, f64) -> f64,
        exclude: impl Fn(StateId) -> bool,
    ) -> Option<StateId> {
        let weights: Vec<(StateId, f64)> = self
            .entries
            .iter()
            .filter(|&&(s, _)| !exclude(s))
            .map(|&(s, p)| (s, weight(s, p).max(0.0)))
            .filter(|&(_, w)| w > 0.0)
            .collect();
        let total: f64 = weights.iter().map(|&(_, w)| w).sum();
        if total <= EPS * EPS {
            return None;
        }
        let mut target = rng.gen::<f64>() * total;
        for &(s, w) in &weights {
            if target < w {
                return Some(s);
            }
            target -= w;
        }
        weights.last().map(|&(s, _)| s)
    }

    /// Push the distribution through `f`, merging mass of states that map to
    /// the same image.
    pub fn map_states(&self, f: impl Fn(StateId) -> StateId) -> Distribution {
        Distribution::new(self.entries.iter().map(|&(s, p)| (f(s), p)))
    }

    /// Drop the mass on `state` and rescale the rest by `1 / (1 - p(state))`.
    ///
    /// Returns `None` when nothing would be left.
    pub fn without_self_loop(&self, state: StateId) -> Option<Distribution> {
        let stay = self.get(state);
        if stay == 0.0 {
            return Some(self.clone());
        }
        if is_one(stay) || stay >= 1.0 {
            return None;
        }
        let scale = 1.0 / (1.0 - stay);
        let entries: Vec<(StateId, f64)> = self
            .entries
            .iter()
            .filter(|&&(s, _)| s != state)
            .map(|&(s, p)| (s, p * scale))
            .collect();
        if entries.is_empty() {
            return None;
        }
        Some(Self { entries })
    }
}
