//! A one-dimensional span.
//!
//! A span represents the closed interval `[start, stop]`.
use serde::{Deserialize, Serialize};

/// A closed interval of coordinates in one dimension.
#[derive(
    Debug, Default, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize, PartialEq, Eq,
)]
pub struct Span {
    start: i64,
    stop: i64,
}

impl Span {
    /// Creates a new [`Span`] between two integers, in either order.
    pub fn new(start: i64, stop: i64) -> Self {
        use std::cmp::{max, min};
        Self {
            start: min(start, stop),
            stop: max(start, stop),
        }
    }

    /// Creates a span of the given length starting from `start`.
    ///
    /// # Panics
    ///
    /// Panics if `length` is negative.
    pub const fn with_start_and_length(start: i64, length: i64) -> Self {
        assert!(length >= 0);
        Self {
            start,
            stop: start + length,
        }
    }

    /// The lower endpoint.
    #[inline]
    pub const fn start(&self) -> i64 {
        self.start
    }

    /// The upper endpoint.
    #[inline]
    pub const fn stop(&self) -> i64 {
        self.stop
    }

    /// The length of the span.
    #[inline]
    pub const fn length(&self) -> i64 {
        self.stop - self.start
    }

    /// Returns `true` if the open interiors of the two spans intersect.
    ///
    /// Spans that only share an endpoint do not overlap.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// assert!(Span::new(0, 10).overlaps(Span::new(5, 15)));
    /// assert!(!Span::new(0, 10).overlaps(Span::new(10, 15)));
    /// ```
    #[inline]
    pub const fn overlaps(&self, other: Span) -> bool {
        self.start < other.stop && other.start < self.stop
    }

    /// The closed intersection of two spans, if any.
    pub fn intersection(&self, other: Span) -> Option<Span> {
        let start = std::cmp::max(self.start, other.start);
        let stop = std::cmp::min(self.stop, other.stop);
        (start <= stop).then_some(Span { start, stop })
    }

    /// Returns `true` if `other` lies entirely within this span.
    #[inline]
    pub const fn contains_span(&self, other: Span) -> bool {
        self.start <= other.start && other.stop <= self.stop
    }

    /// Returns `true` if `x` lies within the closed span.
    #[inline]
    pub const fn contains(&self, x: i64) -> bool {
        self.start <= x && x <= self.stop
    }

    /// The smallest span containing both spans.
    pub fn union(&self, other: Span) -> Span {
        Span {
            start: std::cmp::min(self.start, other.start),
            stop: std::cmp::max(self.stop, other.stop),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sorts_endpoints() {
        let span = Span::new(20, -5);
        assert_eq!(span.start(), -5);
        assert_eq!(span.stop(), 20);
        assert_eq!(span.length(), 25);
    }

    #[test]
    fn intersection_of_touching_spans_is_a_point() {
        let a = Span::new(0, 10);
        let b = Span::new(10, 30);
        assert_eq!(a.intersection(b), Some(Span::new(10, 10)));
        assert!(!a.overlaps(b));
        assert_eq!(a.intersection(Span::new(11, 12)), None);
    }
}
