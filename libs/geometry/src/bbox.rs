//! Axis-aligned rectangular bounding boxes.

use crate::rect::Rect;

/// A geometric shape that has a bounding box.
///
/// # Examples
///
/// ```
/// # use geometry::prelude::*;
/// let rect = Rect::from_sides(0, 0, 100, 200);
/// assert_eq!(rect.bbox(), Some(Rect::from_sides(0, 0, 100, 200)));
/// let empty: Vec<Rect> = Vec::new();
/// assert_eq!(empty.bbox(), None);
/// ```
pub trait Bbox {
    /// Computes the axis-aligned rectangular bounding box.
    ///
    /// If empty, this method should return `None`.
    /// Zero-area rectangles are not empty and return `Some(_)`.
    fn bbox(&self) -> Option<Rect>;
}

impl<T> Bbox for &T
where
    T: Bbox,
{
    fn bbox(&self) -> Option<Rect> {
        T::bbox(*self)
    }
}

impl<T: Bbox> Bbox for Vec<T> {
    fn bbox(&self) -> Option<Rect> {
        let mut bbox = None;
        for item in self {
            bbox = bbox.bounding_union(&item.bbox());
        }
        bbox
    }
}

impl<T: Bbox> Bbox for [T] {
    fn bbox(&self) -> Option<Rect> {
        self.iter()
            .fold(None, |acc, item| acc.bounding_union(&item.bbox()))
    }
}

impl Bbox for Option<Rect> {
    fn bbox(&self) -> Option<Rect> {
        *self
    }
}

/// Computes the smallest box enclosing two possibly-empty bounding boxes.
pub trait BoundingUnion<T> {
    /// The type of the union.
    type Output;

    /// Returns the bounding union of `self` and `other`.
    fn bounding_union(&self, other: &T) -> Self::Output;
}

impl BoundingUnion<Rect> for Rect {
    type Output = Rect;
    fn bounding_union(&self, other: &Rect) -> Self::Output {
        self.union(*other)
    }
}

impl BoundingUnion<Option<Rect>> for Option<Rect> {
    type Output = Option<Rect>;

    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let a = Some(Rect::from_sides(0, 0, 10, 10));
    /// let b = Some(Rect::from_sides(20, -5, 30, 5));
    /// assert_eq!(a.bounding_union(&b), Some(Rect::from_sides(0, -5, 30, 10)));
    /// assert_eq!(None.bounding_union(&b), b);
    /// ```
    fn bounding_union(&self, other: &Option<Rect>) -> Self::Output {
        match (self, other) {
            (Some(a), Some(b)) => Some(a.union(*b)),
            (Some(a), None) => Some(*a),
            (None, Some(b)) => Some(*b),
            (None, None) => None,
        }
    }
}
