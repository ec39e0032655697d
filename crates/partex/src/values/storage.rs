//! Per-state bounds indexed by remaining steps.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::bounds::Bounds;
use crate::error::ConfigError;
use crate::model::StateId;

/// How step-indexed bounds are laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStorage {
    /// One slot per remaining-step value.
    Dense,
    /// Exact slots below `EXACT_PREFIX`, then one slot per `width` steps.
    Compressed { width: usize },
}

impl StepStorage {
    /// Remaining-step values below this always get their own slot.
    pub const EXACT_PREFIX: usize = 6;

    /// Slot index for `remaining >= 1`.
    pub fn slot(self, remaining: usize) -> usize {
        debug_assert!(remaining > 0);
        match self {
            StepStorage::Dense => remaining - 1,
            StepStorage::Compressed { width } => {
                if remaining < Self::EXACT_PREFIX {
                    remaining - 1
                } else {
                    (remaining - Self::EXACT_PREFIX) / width + Self::EXACT_PREFIX - 1
                }
            }
        }
    }

    /// Largest remaining value sharing the slot of `remaining`.
    pub fn bucket_top(self, remaining: usize) -> usize {
        self.slot_range(self.slot(remaining)).1
    }

    /// Smallest remaining value sharing the slot of `remaining`.
    pub fn bucket_bottom(self, remaining: usize) -> usize {
        self.slot_range(self.slot(remaining)).0
    }

    /// Inclusive range of remaining-step values stored in `slot`.
    fn slot_range(self, slot: usize) -> (usize, usize) {
        match self {
            StepStorage::Compressed { width } if slot + 1 >= Self::EXACT_PREFIX => {
                let bottom = Self::EXACT_PREFIX + (slot + 1 - Self::EXACT_PREFIX) * width;
                (bottom, bottom + width - 1)
            }
            _ => (slot + 1, slot + 1),
        }
    }
}

impl FromStr for StepStorage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "dense" {
            return Ok(StepStorage::Dense);
        }
        let Some(width) = s.strip_prefix("simple,") else {
            return Err(ConfigError::UnknownStorage(s.to_owned()));
        };
        let width: usize = width
            .trim()
            .parse()
            .map_err(|_| ConfigError::UnknownStorage(s.to_owned()))?;
        if width == 0 {
            return Err(ConfigError::ZeroWidth);
        }
        Ok(StepStorage::Compressed { width })
    }
}

impl fmt::Display for StepStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStorage::Dense => write!(f, "dense"),
            StepStorage::Compressed { width } => write!(f, "simple,{width}"),
        }
    }
}

/// One bound with the horizon it was computed at.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Anchored {
    value: f64,
    at: usize,
}

/// Bounds of one bucket of horizons.
///
/// Values are non-decreasing in the horizon, so an upper bound computed at
/// `at` holds for every horizon up to `at` and a lower bound for every horizon
/// from `at` on. Horizons of the bucket an anchor does not cover read the
/// neighbouring slots.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Slot {
    upper: Option<Anchored>,
    lower: Option<Anchored>,
}

/// Sparse table `state → [Slot per bucket]`.
///
/// Invariants:
/// - The bounds read at any horizon only shrink.
/// - With `monotone`, reads are non-decreasing in remaining steps on both
///   ends: a bound reaches the neighbouring buckets through propagation, and
///   reads past the end of a row inherit the last stored lower bound.
#[derive(Clone, Debug)]
pub(crate) struct StepTable {
    storage: StepStorage,
    monotone: bool,
    default: Bounds,
    rows: HashMap<StateId, Vec<Slot>>,
}

impl StepTable {
    pub(crate) fn new(storage: StepStorage, monotone: bool, default: Bounds) -> Self {
        Self {
            storage,
            monotone,
            default,
            rows: HashMap::new(),
        }
    }

    pub(crate) fn get(&self, state: StateId, remaining: usize) -> Bounds {
        let Some(row) = self.rows.get(&state) else {
            return self.default;
        };
        let slot = self.storage.slot(remaining);
        let own = row.get(slot).copied().unwrap_or_default();
        let upper = match own.upper {
            Some(a) if remaining <= a.at => a.value,
            _ => self.upper_above(row, slot),
        };
        let lower = match own.lower {
            Some(a) if remaining >= a.at => a.value,
            _ => self.lower_below(row, slot),
        };
        Bounds::new(lower.min(upper), upper)
    }

    /// Upper bound inherited from the buckets above `slot`.
    fn upper_above(&self, row: &[Slot], slot: usize) -> f64 {
        let inherited = if self.monotone {
            row.iter().skip(slot + 1).find_map(|s| s.upper)
        } else {
            None
        };
        inherited.map_or(self.default.upper(), |a| a.value)
    }

    /// Lower bound inherited from the buckets below `slot`.
    fn lower_below(&self, row: &[Slot], slot: usize) -> f64 {
        let inherited = if self.monotone {
            row.iter().take(slot).rev().find_map(|s| s.lower)
        } else {
            None
        };
        inherited.map_or(self.default.lower(), |a| a.value)
    }

    /// Tighten `state` at `remaining` with `bounds` computed at exactly that
    /// horizon; returns the bounds read there afterwards.
    ///
    /// A bucket keeps one anchor per end. An anchor moves only if no horizon
    /// of the bucket reads a looser bound afterwards; a rejected bound still
    /// tightens the neighbouring buckets when `monotone`.
    pub(crate) fn refine(&mut self, state: StateId, remaining: usize, bounds: Bounds) -> Bounds {
        let current = self.get(state, remaining);
        let upper = current.upper().min(bounds.upper());
        let lower = current.lower().max(bounds.lower()).min(upper);
        let slot = self.storage.slot(remaining);
        let (above, below) = match self.rows.get(&state) {
            Some(row) => (self.upper_above(row, slot), self.lower_below(row, slot)),
            None => (self.default.upper(), self.default.lower()),
        };

        let (storage, monotone) = (self.storage, self.monotone);
        let row = self.rows.entry(state).or_default();
        if row.len() <= slot {
            // New buckets start from the inherited lower bound so reads do not
            // scan long gaps.
            let inherited = monotone.then_some(below);
            for k in row.len()..slot {
                row.push(Slot {
                    upper: None,
                    lower: inherited.map(|value| Anchored {
                        value,
                        at: storage.slot_range(k).0,
                    }),
                });
            }
            row.push(Slot::default());
        }

        let own = &mut row[slot];
        let keep_upper = match own.upper {
            None => true,
            Some(a) if remaining >= a.at => upper <= a.value,
            // Horizons above `remaining` would fall back to `above`.
            Some(a) => a.value >= above,
        };
        if keep_upper {
            own.upper = Some(Anchored {
                value: upper,
                at: remaining,
            });
        }
        let keep_lower = match own.lower {
            None => true,
            Some(a) if remaining <= a.at => lower >= a.value,
            Some(a) => a.value <= below,
        };
        if keep_lower {
            own.lower = Some(Anchored {
                value: lower,
                at: remaining,
            });
        }

        if monotone {
            for k in (0..slot).rev() {
                match row[k].upper {
                    Some(a) if a.value <= upper => break,
                    _ => {
                        row[k].upper = Some(Anchored {
                            value: upper,
                            at: storage.slot_range(k).1,
                        })
                    }
                }
            }
            for k in slot + 1..row.len() {
                match row[k].lower {
                    Some(a) if a.value >= lower => break,
                    _ => {
                        row[k].lower = Some(Anchored {
                            value: lower,
                            at: storage.slot_range(k).0,
                        })
                    }
                }
            }
        }
        self.get(state, remaining)
    }
}
