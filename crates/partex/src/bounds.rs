//! Value intervals and numeric tolerances.
//!
//! - `Bounds`: closed interval `[lower, upper]` with `lower <= upper`, the unit
//!   of uncertainty tracked per state by every value policy.
//! - `Optimization`: how a Bellman backup selects among per-choice bounds.
//! - Tolerance helpers (`is_equal`, `is_one`, ...) and `KahanSum`.
//!
//! Conventions
//! - Probabilities are plain `f64`. Equality checks use `EPS`; monotonicity
//!   assertions use the looser `WEAK_EPS` to absorb accumulated rounding.

use std::fmt;

/// Tolerance for "equal" comparisons of probabilities and values.
pub const EPS: f64 = 1e-12;
/// Tolerance for containment/monotonicity checks across many updates.
pub const WEAK_EPS: f64 = 1e-8;

#[inline]
pub fn is_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPS
}

#[inline]
pub fn is_zero(a: f64) -> bool {
    a.abs() <= EPS
}

#[inline]
pub fn is_one(a: f64) -> bool {
    (a - 1.0).abs() <= EPS
}

#[inline]
pub fn less_or_equal(a: f64, b: f64) -> bool {
    a <= b + EPS
}

/// Closed interval `[lower, upper]`.
///
/// Invariants:
/// - Both ends are non-NaN and `lower <= upper`. Inputs inverted by less than
///   `WEAK_EPS` (rounding) are snapped to their midpoint; anything worse is a
///   contract violation and panics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    lower: f64,
    upper: f64,
}

impl Bounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        assert!(
            !lower.is_nan() && !upper.is_nan(),
            "bounds must not be NaN ({lower}, {upper})"
        );
        if lower <= upper {
            return Self { lower, upper };
        }
        assert!(
            lower - upper <= WEAK_EPS,
            "lower bound {lower} exceeds upper bound {upper}"
        );
        let mid = 0.5 * (lower + upper);
        Self {
            lower: mid,
            upper: mid,
        }
    }

    /// Degenerate interval `[value, value]`.
    #[inline]
    pub fn exact(value: f64) -> Self {
        Self::new(value, value)
    }

    #[inline]
    pub fn zero() -> Self {
        Self::exact(0.0)
    }

    #[inline]
    pub fn one() -> Self {
        Self::exact(1.0)
    }

    /// Default for reachability probabilities: nothing is known yet.
    #[inline]
    pub fn unknown_reach() -> Self {
        Self {
            lower: 0.0,
            upper: 1.0,
        }
    }

    /// Probability interval, clamped into `[0, 1]`.
    pub fn reach(lower: f64, upper: f64) -> Self {
        Self::new(lower.clamp(0.0, 1.0), upper.clamp(0.0, 1.0))
    }

    #[inline]
    pub fn lower(&self) -> f64 {
        self.lower
    }

    #[inline]
    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Interval width `upper - lower`.
    #[inline]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    #[inline]
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.lower + self.upper)
    }

    #[inline]
    pub fn with_lower(&self, lower: f64) -> Self {
        Self::new(lower, self.upper)
    }

    #[inline]
    pub fn with_upper(&self, upper: f64) -> Self {
        Self::new(self.lower, upper)
    }

    /// True iff `other ⊆ self` exactly.
    #[inline]
    pub fn contains(&self, other: &Bounds) -> bool {
        self.lower <= other.lower && other.upper <= self.upper
    }

    /// True iff `other ⊆ self` up to `eps` on either end.
    #[inline]
    pub fn contains_eps(&self, other: &Bounds, eps: f64) -> bool {
        self.lower <= other.lower + eps && other.upper <= self.upper + eps
    }

    #[inline]
    pub fn contains_value(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Intersection with `other`. Disjoint intervals snap onto the nearest end
    /// of `other`, so the result always lies inside `other`.
    pub fn shrink(&self, other: &Bounds) -> Self {
        let lower = self.lower.max(other.lower);
        let upper = self.upper.min(other.upper);
        if lower <= upper {
            return Self { lower, upper };
        }
        let v = if self.lower > other.upper {
            other.upper
        } else {
            other.lower
        };
        Self::exact(v)
    }

    /// Equal ends up to `eps`.
    #[inline]
    pub fn equals_up_to(&self, other: &Bounds, eps: f64) -> bool {
        (self.lower - other.lower).abs() <= eps && (self.upper - other.upper).abs() <= eps
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.6}, {:.6}]", self.lower, self.upper)
    }
}

/// Selection rule of a Bellman backup over the per-choice bounds of a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Optimization {
    /// Nondeterminism resolved to maximise the value.
    MaxValue,
    /// Nondeterminism resolved to minimise the value.
    MinValue,
    /// Deterministic system: exactly one choice per state.
    UniqueValue,
}

impl Optimization {
    /// Select componentwise; `None` on an empty input.
    pub fn select<I>(self, bounds: I) -> Option<Bounds>
    where
        I: IntoIterator<Item = Bounds>,
    {
        let mut iter = bounds.into_iter();
        let first = iter.next()?;
        match self {
            Optimization::MaxValue => Some(iter.fold(first, |acc, b| {
                Bounds::new(acc.lower.max(b.lower), acc.upper.max(b.upper))
            })),
            Optimization::MinValue => Some(iter.fold(first, |acc, b| {
                Bounds::new(acc.lower.min(b.lower), acc.upper.min(b.upper))
            })),
            Optimization::UniqueValue => {
                assert!(
                    iter.next().is_none(),
                    "unique-value selection over more than one choice"
                );
                Some(first)
            }
        }
    }

    /// Ordering key: larger is better for this optimisation direction.
    #[inline]
    pub fn orient(self, value: f64) -> f64 {
        match self {
            Optimization::MinValue => -value,
            Optimization::MaxValue | Optimization::UniqueValue => value,
        }
    }
}

impl fmt::Display for Optimization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Optimization::MaxValue => write!(f, "max"),
            Optimization::MinValue => write!(f, "min"),
            Optimization::UniqueValue => write!(f, "unique"),
        }
    }
}

/// Compensated summation for long sums of mixed magnitude.
#[derive(Clone, Copy, Debug, Default)]
pub struct KahanSum {
    sum: f64,
    compensation: f64,
}

impl KahanSum {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&mut self, value: f64) {
        let y = value - self.compensation;
        let t = self.sum + y;
        self.compensation = (t - self.sum) - y;
        self.sum = t;
    }

    #[inline]
    pub fn get(&self) -> f64 {
        self.sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rounding_inversion_snaps_to_midpoint() {
        let b = Bounds::new(0.5 + 1e-10, 0.5);
        assert!(b.lower() <= b.upper());
        assert!((b.midpoint() - 0.5).abs() < 1e-9);
    }

    #[test]
    #[should_panic]
    fn gross_inversion_panics() {
        let _ = Bounds::new(0.7, 0.2);
    }

    #[test]
    fn shrink_intersects_and_snaps_disjoint() {
        let a = Bounds::new(0.2, 0.8);
        let b = Bounds::new(0.5, 1.0);
        assert_eq!(a.shrink(&b), Bounds::new(0.5, 0.8));
        let far = Bounds::new(2.0, 3.0);
        assert_eq!(far.shrink(&a), Bounds::exact(0.8));
    }

    #[test]
    fn select_max_min_componentwise() {
        let bs = [Bounds::new(0.1, 0.9), Bounds::new(0.3, 0.4)];
        assert_eq!(
            Optimization::MaxValue.select(bs),
            Some(Bounds::new(0.3, 0.9))
        );
        assert_eq!(
            Optimization::MinValue.select(bs),
            Some(Bounds::new(0.1, 0.4))
        );
        assert_eq!(Optimization::MaxValue.select(std::iter::empty()), None);
    }

    #[test]
    fn kahan_sum_beats_naive_on_small_terms() {
        let mut k = KahanSum::new();
        k.add(1.0);
        for _ in 0..10_000 {
            k.add(1e-16);
        }
        assert!((k.get() - (1.0 + 1e-12)).abs() < 1e-15);
    }

    proptest! {
        #[test]
        fn shrink_lies_inside_other(a in 0.0f64..1.0, b in 0.0f64..1.0, c in 0.0f64..1.0, d in 0.0f64..1.0) {
            let x = Bounds::new(a.min(b), a.max(b));
            let y = Bounds::new(c.min(d), c.max(d));
            let s = x.shrink(&y);
            prop_assert!(y.contains(&s));
            prop_assert!(s.lower() <= s.upper());
        }
    }
}
