//! Axis-aligned rectangles.

use serde::{Deserialize, Serialize};

use crate::bbox::Bbox;
use crate::dir::Dir;
use crate::point::Point;
use crate::span::Span;
use crate::transform::{TransformMut, Transformation};

/// Width and height of an axis-aligned box.
#[derive(
    Debug, Default, Copy, Clone, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct Dims {
    w: i64,
    h: i64,
}

impl Dims {
    /// Creates new dimensions.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is negative.
    pub const fn new(w: i64, h: i64) -> Self {
        assert!(w >= 0 && h >= 0, "dimensions must be non-negative");
        Self { w, h }
    }

    /// The width.
    #[inline]
    pub const fn w(&self) -> i64 {
        self.w
    }

    /// The height.
    #[inline]
    pub const fn h(&self) -> i64 {
        self.h
    }

    /// Returns dimensions no larger than `max` in either direction.
    pub fn clamp_to(&self, max: Dims) -> Dims {
        Dims {
            w: std::cmp::min(self.w, max.w),
            h: std::cmp::min(self.h, max.h),
        }
    }

    /// Returns `true` if these dimensions fit inside `other`.
    #[inline]
    pub const fn fits_in(&self, other: Dims) -> bool {
        self.w <= other.w && self.h <= other.h
    }
}

/// An axis-aligned rectangle, specified by lower-left and upper-right corners.
#[derive(
    Debug, Default, Copy, Clone, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct Rect {
    /// The lower-left corner.
    p0: Point,
    /// The upper-right corner.
    p1: Point,
}

impl Rect {
    /// Creates a rectangle from two opposite corners, in any order.
    pub fn new(a: Point, b: Point) -> Self {
        let span_x = Span::new(a.x, b.x);
        let span_y = Span::new(a.y, b.y);
        Self::from_spans(span_x, span_y)
    }

    /// Creates a rectangle from a horizontal and a vertical span.
    pub fn from_spans(h: Span, v: Span) -> Self {
        Self {
            p0: Point::new(h.start(), v.start()),
            p1: Point::new(h.stop(), v.stop()),
        }
    }

    /// Creates a rectangle from all 4 sides (left, bottom, right, top).
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_sides(15, 20, 30, 40);
    /// assert_eq!(rect.left(), 15);
    /// assert_eq!(rect.bot(), 20);
    /// assert_eq!(rect.right(), 30);
    /// assert_eq!(rect.top(), 40);
    /// ```
    ///
    /// # Panics
    ///
    /// This method panics if `left > right` or if `bot > top`.
    /// For a non-panicking alternative, see [`Rect::from_sides_option`].
    pub fn from_sides(left: i64, bot: i64, right: i64, top: i64) -> Self {
        assert!(
            left <= right,
            "Rect::from_sides requires that left ({}) <= right ({})",
            left,
            right
        );
        assert!(
            bot <= top,
            "Rect::from_sides requires that bot ({}) <= top ({})",
            bot,
            top
        );
        Self {
            p0: Point::new(left, bot),
            p1: Point::new(right, top),
        }
    }

    /// Creates a rectangle from all 4 sides, returning [`None`] if the
    /// rectangle would be inverted.
    pub fn from_sides_option(left: i64, bot: i64, right: i64, top: i64) -> Option<Self> {
        (left <= right && bot <= top).then(|| Self::from_sides(left, bot, right, top))
    }

    /// Creates a rectangle with its lower-left corner at `origin`.
    pub fn with_origin_and_dims(origin: Point, dims: Dims) -> Self {
        Self {
            p0: origin,
            p1: Point::new(origin.x + dims.w(), origin.y + dims.h()),
        }
    }

    /// The left edge.
    #[inline]
    pub const fn left(&self) -> i64 {
        self.p0.x
    }

    /// The bottom edge.
    #[inline]
    pub const fn bot(&self) -> i64 {
        self.p0.y
    }

    /// The right edge.
    #[inline]
    pub const fn right(&self) -> i64 {
        self.p1.x
    }

    /// The top edge.
    #[inline]
    pub const fn top(&self) -> i64 {
        self.p1.y
    }

    /// The lower-left corner.
    #[inline]
    pub const fn lower_left(&self) -> Point {
        self.p0
    }

    /// The upper-right corner.
    #[inline]
    pub const fn upper_right(&self) -> Point {
        self.p1
    }

    /// The width of the rectangle.
    #[inline]
    pub const fn width(&self) -> i64 {
        self.p1.x - self.p0.x
    }

    /// The height of the rectangle.
    #[inline]
    pub const fn height(&self) -> i64 {
        self.p1.y - self.p0.y
    }

    /// The width and height of the rectangle.
    #[inline]
    pub const fn dims(&self) -> Dims {
        Dims::new(self.width(), self.height())
    }

    /// Returns the center point of the rectangle, rounded down.
    pub const fn center(&self) -> Point {
        Point::new((self.p0.x + self.p1.x) / 2, (self.p0.y + self.p1.y) / 2)
    }

    /// The horizontal span of the rectangle.
    #[inline]
    pub fn hspan(&self) -> Span {
        Span::new(self.p0.x, self.p1.x)
    }

    /// The vertical span of the rectangle.
    #[inline]
    pub fn vspan(&self) -> Span {
        Span::new(self.p0.y, self.p1.y)
    }

    /// The span of the rectangle in the given direction.
    pub fn span(&self, dir: Dir) -> Span {
        match dir {
            Dir::Horiz => self.hspan(),
            Dir::Vert => self.vspan(),
        }
    }

    /// Returns `true` if the interiors of the two rectangles intersect.
    ///
    /// Rectangles that only share an edge or a corner do not overlap.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let a = Rect::from_sides(0, 0, 10, 10);
    /// assert!(a.overlaps(Rect::from_sides(5, 5, 15, 15)));
    /// assert!(!a.overlaps(Rect::from_sides(10, 0, 20, 10)));
    /// ```
    pub fn overlaps(&self, other: Rect) -> bool {
        self.hspan().overlaps(other.hspan()) && self.vspan().overlaps(other.vspan())
    }

    /// The closed intersection of the two rectangles, if any.
    pub fn intersection(&self, other: Rect) -> Option<Rect> {
        let h = self.hspan().intersection(other.hspan())?;
        let v = self.vspan().intersection(other.vspan())?;
        Some(Self::from_spans(h, v))
    }

    /// Returns `true` if `other` lies entirely within this rectangle.
    pub fn contains_rect(&self, other: Rect) -> bool {
        self.hspan().contains_span(other.hspan()) && self.vspan().contains_span(other.vspan())
    }

    /// Returns `true` if `p` lies within the closed rectangle.
    pub fn contains_point(&self, p: Point) -> bool {
        self.hspan().contains(p.x) && self.vspan().contains(p.y)
    }

    /// The smallest rectangle containing both rectangles.
    pub fn union(&self, other: Rect) -> Rect {
        Self::from_spans(
            self.hspan().union(other.hspan()),
            self.vspan().union(other.vspan()),
        )
    }

    /// Translates the rectangle by `p`.
    pub fn translate(&self, p: Point) -> Rect {
        Rect {
            p0: self.p0 + p,
            p1: self.p1 + p,
        }
    }

    /// Grows the rectangle by `amount` on every side.
    pub fn expand_all(&self, amount: i64) -> Rect {
        Rect::new(
            Point::new(self.p0.x - amount, self.p0.y - amount),
            Point::new(self.p1.x + amount, self.p1.y + amount),
        )
    }
}

impl TransformMut for Rect {
    fn transform_mut(&mut self, trans: Transformation) {
        *self = Rect::new(trans.apply(self.p0), trans.apply(self.p1));
    }
}

impl Bbox for Rect {
    fn bbox(&self) -> Option<Rect> {
        Some(*self)
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({},{};{},{})",
            self.left(),
            self.bot(),
            self.right(),
            self.top()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{Rotation, Transform};

    #[test]
    fn transform_keeps_corners_sorted() {
        let rect = Rect::from_sides(0, 0, 100, 200);
        let rotated = rect.transform(Transformation::rotate(Rotation::R90));
        assert_eq!(rotated, Rect::from_sides(-200, 0, 0, 100));
        let mirrored = rect.transform(Transformation::reflect_vert());
        assert_eq!(mirrored, Rect::from_sides(0, -200, 100, 0));
    }

    #[test]
    fn intersection_and_containment() {
        let outer = Rect::from_sides(0, 0, 605, 410);
        let inner = Rect::from_sides(10, 10, 20, 20);
        assert!(outer.contains_rect(inner));
        assert_eq!(
            outer.intersection(Rect::from_sides(600, 400, 700, 500)),
            Some(Rect::from_sides(600, 400, 605, 410))
        );
        assert_eq!(outer.intersection(Rect::from_sides(700, 0, 800, 10)), None);
    }

    #[test]
    fn from_sides_option_rejects_inverted() {
        assert_eq!(Rect::from_sides_option(10, 0, 5, 10), None);
        assert!(Rect::from_sides_option(5, 0, 5, 10).is_some());
    }
}
