//! Half-open `[top, bot)` ranges shared by row-index space and pixel space
//! (spec.md §3).

use crate::error::ScrollError;
use std::fmt;
use std::ops::{Add, Sub};

/// The scalar types a [`Range`] can be built over: row indices (`i64`) and
/// pixel offsets (`f64`). Pulled out as a trait so the same `Range` type
/// backs both coordinate systems, per spec.md's "same structure used in
/// both spaces".
pub trait RangeBound:
    Copy + PartialOrd + PartialEq + Add<Output = Self> + Sub<Output = Self> + fmt::Debug
{
    const ONE: Self;

    /// Only meaningful for floating-point bounds; integer bounds never are.
    fn is_nan(self) -> bool {
        false
    }
}

impl RangeBound for i64 {
    const ONE: Self = 1;
}

impl RangeBound for f64 {
    const ONE: Self = 1.0;

    fn is_nan(self) -> bool {
        f64::is_nan(self)
    }
}

/// Immutable half-open range `[top, bot)`. `top <= bot` always holds for a
/// successfully constructed `Range`; neither bound may be NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range<T: RangeBound> {
    pub top: T,
    pub bot: T,
}

impl<T: RangeBound> Range<T> {
    /// Builds a range, rejecting `top > bot` or a NaN bound.
    pub fn new(top: T, bot: T) -> Result<Self, ScrollError> {
        if top.is_nan() || bot.is_nan() {
            return Err(ScrollError::InvariantViolation(
                "range bound is NaN".to_string(),
            ));
        }
        if top > bot {
            return Err(ScrollError::InvariantViolation(format!(
                "range top {:?} > bot {:?}",
                top, bot
            )));
        }
        Ok(Range { top, bot })
    }

    /// An empty range at `at`.
    pub fn empty_at(at: T) -> Self {
        Range { top: at, bot: at }
    }

    pub fn height(&self) -> T {
        self.bot - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.top == self.bot
    }

    /// `top <= i < bot`.
    pub fn contains_point(&self, i: T) -> bool {
        self.top <= i && i < self.bot
    }

    /// True for an empty `other`; otherwise true iff both of `other`'s
    /// bounding points lie in `self`.
    pub fn contains_range(&self, other: &Range<T>) -> bool {
        if other.is_empty() {
            return true;
        }
        self.contains_point(other.top) && self.contains_point(other.bot - T::ONE)
    }

    /// Intersection of `self` and `other`, collapsed to an empty range when
    /// they are disjoint.
    pub fn clamp_to(&self, other: &Range<T>) -> Range<T> {
        let top = if self.top > other.top {
            self.top
        } else {
            other.top
        };
        let bot = if self.bot < other.bot {
            self.bot
        } else {
            other.bot
        };
        if top > bot {
            Range { top, bot: top }
        } else {
            Range { top, bot }
        }
    }

    /// Clamps `i` to `[top, bot - 1]`. Used to keep a row index inside a
    /// non-empty range.
    pub fn clamp_num(&self, i: T) -> T {
        let max = self.bot - T::ONE;
        if i < self.top {
            self.top
        } else if i > max {
            max
        } else {
            i
        }
    }
}

impl Range<i64> {
    /// Expands the range by `frac` of its height on each side, clamped to
    /// `[0, n)`. Used for `BlockSet`'s `leaveRange` (spec.md §4.4).
    pub fn expand_clamped(&self, frac: f64, n: i64) -> Range<i64> {
        let pad = ((self.height() as f64) * frac).round() as i64;
        let top = (self.top - pad).max(0);
        let bot = (self.bot + pad).min(n);
        if top > bot {
            Range { top, bot: top }
        } else {
            Range { top, bot }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_range() {
        let r = Range::new(5i64, 10).unwrap();
        assert_eq!(r.top, 5);
        assert_eq!(r.bot, 10);
        assert_eq!(r.height(), 5);
    }

    #[test]
    fn inverted_range_is_invariant_violation() {
        let err = Range::new(20i64, 10).unwrap_err();
        assert!(matches!(err, ScrollError::InvariantViolation(_)));
    }

    #[test]
    fn nan_bound_is_invariant_violation() {
        let err = Range::new(f64::NAN, 10.0).unwrap_err();
        assert!(matches!(err, ScrollError::InvariantViolation(_)));
    }

    #[test]
    fn contains_point_edges() {
        let r = Range::new(-3i64, 3).unwrap();
        assert!(r.contains_point(-3));
        assert!(r.contains_point(2));
        assert!(!r.contains_point(3));
    }

    #[test]
    fn contains_range() {
        let r = Range::new(10i64, 20).unwrap();
        assert!(r.contains_range(&Range::new(10, 20).unwrap()));
        assert!(!r.contains_range(&Range::new(15, 21).unwrap()));
        // Any range contains an empty range-point, even outside itself.
        assert!(r.contains_range(&Range::empty_at(5)));
        assert!(r.contains_range(&Range::empty_at(12)));
    }

    #[test]
    fn clamp_to_overlap() {
        let r = Range::new(-100i64, 6).unwrap();
        let other = Range::new(-15i64, 15).unwrap();
        let clamped = r.clamp_to(&other);
        assert_eq!(clamped, Range::new(-15, 6).unwrap());
    }

    #[test]
    fn clamp_to_disjoint_is_empty() {
        let r = Range::new(-15i64, 15).unwrap();
        let other = Range::new(30i64, 30).unwrap();
        let clamped = r.clamp_to(&other);
        assert_eq!(clamped.height(), 0);
    }

    #[test]
    fn clamp_to_self_is_self() {
        let r = Range::new(3i64, 9).unwrap();
        assert_eq!(r.clamp_to(&r), r);
    }

    #[test]
    fn clamp_num() {
        let r = Range::new(5i64, 10).unwrap();
        assert_eq!(r.clamp_num(2), 5);
        assert_eq!(r.clamp_num(20), 9);
        assert_eq!(r.clamp_num(7), 7);
    }

    #[test]
    fn expand_clamped() {
        let r = Range::new(100i64, 130).unwrap();
        let leave = r.expand_clamped(1.0 / 3.0, 1000);
        assert!(leave.top <= 90);
        assert!(leave.bot >= 140);
    }
}
