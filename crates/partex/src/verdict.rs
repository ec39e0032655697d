//! Stopping criteria: when are the bounds of an initial state good enough?
//!
//! - `QualitativeVerdict`: the answer to "value ⋈ threshold" is decided.
//! - `QuantitativeVerdict`: the interval is narrower than a precision, either
//!   absolute or relative to the magnitude of the value.

use std::fmt;

use crate::bounds::Bounds;

/// Outcome once a verdict is solved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Resolution {
    /// Qualitative answer.
    Decided(bool),
    /// Quantitative estimate (midpoint of the final bounds).
    Estimate(f64),
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Decided(b) => write!(f, "{b}"),
            Resolution::Estimate(v) => write!(f, "{v}"),
        }
    }
}

pub trait Verdict {
    fn is_solved(&self, bounds: &Bounds) -> bool;

    /// Answer for `bounds`; `None` while unsolved.
    fn resolve(&self, bounds: &Bounds) -> Option<Resolution>;
}

impl<V: Verdict + ?Sized> Verdict for Box<V> {
    fn is_solved(&self, bounds: &Bounds) -> bool {
        (**self).is_solved(bounds)
    }

    fn resolve(&self, bounds: &Bounds) -> Option<Resolution> {
        (**self).resolve(bounds)
    }
}

/// Comparison operator of a qualitative query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl Comparison {
    fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::Greater => value > threshold,
            Comparison::GreaterOrEqual => value >= threshold,
            Comparison::Less => value < threshold,
            Comparison::LessOrEqual => value <= threshold,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Comparison::Greater => ">",
            Comparison::GreaterOrEqual => ">=",
            Comparison::Less => "<",
            Comparison::LessOrEqual => "<=",
        };
        f.write_str(s)
    }
}

/// Decide `value ⋈ threshold`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualitativeVerdict {
    pub comparison: Comparison,
    pub threshold: f64,
}

impl QualitativeVerdict {
    pub fn new(comparison: Comparison, threshold: f64) -> Self {
        Self {
            comparison,
            threshold,
        }
    }
}

impl Verdict for QualitativeVerdict {
    fn is_solved(&self, bounds: &Bounds) -> bool {
        self.resolve(bounds).is_some()
    }

    fn resolve(&self, bounds: &Bounds) -> Option<Resolution> {
        let at_lower = self.comparison.holds(bounds.lower(), self.threshold);
        let at_upper = self.comparison.holds(bounds.upper(), self.threshold);
        // The predicate is monotone in the value, so agreement at both ends
        // settles every value in between.
        (at_lower == at_upper).then_some(Resolution::Decided(at_lower))
    }
}

/// Narrow the interval to `precision`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuantitativeVerdict {
    pub precision: f64,
    pub relative: bool,
}

impl QuantitativeVerdict {
    pub fn new(precision: f64, relative: bool) -> Self {
        Self {
            precision,
            relative,
        }
    }

    pub fn absolute(precision: f64) -> Self {
        Self::new(precision, false)
    }
}

impl Verdict for QuantitativeVerdict {
    fn is_solved(&self, bounds: &Bounds) -> bool {
        let width = bounds.width();
        if self.relative {
            let scale = bounds.lower().abs().max(bounds.upper().abs());
            width <= self.precision * scale
        } else {
            width <= self.precision
        }
    }

    fn resolve(&self, bounds: &Bounds) -> Option<Resolution> {
        self.is_solved(bounds)
            .then(|| Resolution::Estimate(bounds.midpoint()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualitative_needs_both_ends_on_one_side() {
        let v = QualitativeVerdict::new(Comparison::GreaterOrEqual, 0.5);
        assert!(!v.is_solved(&Bounds::new(0.4, 0.6)));
        assert_eq!(
            v.resolve(&Bounds::new(0.5, 0.9)),
            Some(Resolution::Decided(true))
        );
        assert_eq!(
            v.resolve(&Bounds::new(0.1, 0.49)),
            Some(Resolution::Decided(false))
        );
        let strict = QualitativeVerdict::new(Comparison::Greater, 0.5);
        assert!(!strict.is_solved(&Bounds::new(0.5, 0.6)));
    }

    #[test]
    fn quantitative_absolute_and_relative() {
        let abs = QuantitativeVerdict::absolute(1e-2);
        assert!(abs.is_solved(&Bounds::new(0.3, 0.305)));
        assert!(!abs.is_solved(&Bounds::new(0.3, 0.32)));
        match abs.resolve(&Bounds::new(0.25, 0.255)) {
            Some(Resolution::Estimate(v)) => assert!((v - 0.2525).abs() < 1e-12),
            other => panic!("unexpected resolution {other:?}"),
        }

        let rel = QuantitativeVerdict::new(1e-2, true);
        assert!(rel.is_solved(&Bounds::new(100.0, 100.5)));
        assert!(!rel.is_solved(&Bounds::new(0.1, 0.2)));
        assert!(rel.is_solved(&Bounds::zero()));
    }
}
