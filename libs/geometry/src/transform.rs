//! Transformation types and traits.

use serde::{Deserialize, Serialize};

use crate::point::Point;

/// A Manhattan rotation: 0, 90, 180, or 270 degrees counterclockwise.
///
/// Also used as a heading: [`Rotation::R0`] points along `+x`,
/// [`Rotation::R90`] along `+y`, and so on.
#[derive(
    Debug, Clone, Copy, Default, Hash, Eq, Ord, PartialOrd, PartialEq, Serialize, Deserialize,
)]
pub enum Rotation {
    /// 0 degrees; no rotation.
    #[default]
    R0,
    /// 90 degrees counterclockwise.
    R90,
    /// 180 degrees counterclockwise.
    R180,
    /// 270 degrees counterclockwise.
    R270,
}

impl Rotation {
    const ALL: [Rotation; 4] = [Rotation::R0, Rotation::R90, Rotation::R180, Rotation::R270];

    /// The number of quarter turns in this rotation.
    #[inline]
    const fn quarters(&self) -> u8 {
        match *self {
            Rotation::R0 => 0,
            Rotation::R90 => 1,
            Rotation::R180 => 2,
            Rotation::R270 => 3,
        }
    }

    #[inline]
    const fn from_quarters(q: u8) -> Self {
        Self::ALL[(q % 4) as usize]
    }

    /// All four rotations.
    pub const fn all() -> [Rotation; 4] {
        Self::ALL
    }

    /// The angle of this rotation, in degrees.
    pub const fn degrees(&self) -> i64 {
        self.quarters() as i64 * 90
    }

    /// Parses an angle in degrees, returning [`None`] if it is not a
    /// multiple of 90.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// assert_eq!(Rotation::from_degrees(-90), Some(Rotation::R270));
    /// assert_eq!(Rotation::from_degrees(450), Some(Rotation::R90));
    /// assert_eq!(Rotation::from_degrees(45), None);
    /// ```
    pub const fn from_degrees(degrees: i64) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        Some(Self::from_quarters((degrees / 90).rem_euclid(4) as u8))
    }

    /// The opposite heading.
    #[inline]
    pub const fn reversed(&self) -> Self {
        Self::from_quarters(self.quarters() + 2)
    }

    /// The unit step `(dx, dy)` of this heading.
    pub const fn unit(&self) -> Point {
        match *self {
            Rotation::R0 => Point::new(1, 0),
            Rotation::R90 => Point::new(0, 1),
            Rotation::R180 => Point::new(-1, 0),
            Rotation::R270 => Point::new(0, -1),
        }
    }

    /// Rotates `p` about the origin.
    pub const fn rotate_point(&self, p: Point) -> Point {
        match *self {
            Rotation::R0 => p,
            Rotation::R90 => Point::new(-p.y, p.x),
            Rotation::R180 => Point::new(-p.x, -p.y),
            Rotation::R270 => Point::new(p.y, -p.x),
        }
    }

    /// The heading of the unit step from `a` towards `b`, if the two points
    /// are distinct and axis-aligned.
    pub fn heading_between(a: Point, b: Point) -> Option<Self> {
        match (b.x - a.x, b.y - a.y) {
            (dx, 0) if dx > 0 => Some(Rotation::R0),
            (0, dy) if dy > 0 => Some(Rotation::R90),
            (dx, 0) if dx < 0 => Some(Rotation::R180),
            (0, dy) if dy < 0 => Some(Rotation::R270),
            _ => None,
        }
    }
}

impl std::ops::Add<Rotation> for Rotation {
    type Output = Rotation;
    fn add(self, rhs: Rotation) -> Self::Output {
        Self::from_quarters(self.quarters() + rhs.quarters())
    }
}

impl std::ops::AddAssign for Rotation {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::Neg for Rotation {
    type Output = Rotation;
    fn neg(self) -> Self::Output {
        Self::from_quarters(4 - self.quarters())
    }
}

impl std::ops::Sub<Rotation> for Rotation {
    type Output = Rotation;
    fn sub(self, rhs: Rotation) -> Self::Output {
        self + (-rhs)
    }
}

/// A rigid Manhattan transformation.
///
/// Applied to a point as: reflect about the x-axis (if `mirror` is set),
/// then rotate counterclockwise, then translate by the offset.
/// Scaling is not supported, so integer coordinates stay integer.
#[derive(Debug, Clone, Copy, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    mirror: bool,
    rotation: Rotation,
    offset: Point,
}

impl Transformation {
    /// Returns the identity transform, leaving any transformed object unmodified.
    pub const fn identity() -> Self {
        Self {
            mirror: false,
            rotation: Rotation::R0,
            offset: Point::zero(),
        }
    }

    /// Returns a translation by `(x, y)`.
    pub const fn translate(x: i64, y: i64) -> Self {
        Self {
            mirror: false,
            rotation: Rotation::R0,
            offset: Point::new(x, y),
        }
    }

    /// Returns a rotation about the origin.
    pub const fn rotate(rotation: Rotation) -> Self {
        Self {
            mirror: false,
            rotation,
            offset: Point::zero(),
        }
    }

    /// Returns a reflection about the x-axis.
    pub const fn reflect_vert() -> Self {
        Self {
            mirror: true,
            rotation: Rotation::R0,
            offset: Point::zero(),
        }
    }

    /// Creates a transformation from all of its components.
    pub const fn from_parts(offset: Point, rotation: Rotation, mirror: bool) -> Self {
        Self {
            mirror,
            rotation,
            offset,
        }
    }

    /// Creates a translation by `offset`.
    pub const fn from_offset(offset: Point) -> Self {
        Self::from_parts(offset, Rotation::R0, false)
    }

    /// Create a new [`Transformation`] that is the cascade of `parent` and `child`.
    ///
    /// "Parents" and "children" refer to layout-instance hierarchies: the
    /// child transformation is applied first, then the parent's.
    ///
    /// Note this operation *is not* commutative.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let parent = Transformation::from_parts(Point::new(100, 0), Rotation::R90, false);
    /// let child = Transformation::from_parts(Point::new(0, 50), Rotation::R0, true);
    /// let p = Point::new(10, 10);
    /// let cascaded = Transformation::cascade(parent, child);
    /// assert_eq!(cascaded.apply(p), parent.apply(child.apply(p)));
    /// ```
    pub fn cascade(parent: Transformation, child: Transformation) -> Transformation {
        let child_rotation = if parent.mirror {
            -child.rotation
        } else {
            child.rotation
        };
        Self {
            mirror: parent.mirror ^ child.mirror,
            rotation: parent.rotation + child_rotation,
            offset: parent.apply(child.offset),
        }
    }

    /// Applies only the reflection and rotation to `p`.
    #[inline]
    fn apply_linear(&self, p: Point) -> Point {
        let p = if self.mirror { Point::new(p.x, -p.y) } else { p };
        self.rotation.rotate_point(p)
    }

    /// Maps `p` through this transformation.
    #[inline]
    pub fn apply(&self, p: Point) -> Point {
        self.apply_linear(p) + self.offset
    }

    /// Maps a heading through this transformation.
    ///
    /// Translations do not affect headings.
    pub fn apply_heading(&self, heading: Rotation) -> Rotation {
        let heading = if self.mirror { -heading } else { heading };
        heading + self.rotation
    }

    /// Returns the inverse [`Transformation`] of `self`.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let trans = Transformation::from_parts(Point::new(5, 10), Rotation::R90, true);
    /// let inv = trans.inv();
    /// assert_eq!(Transformation::cascade(inv, trans), Transformation::identity());
    /// ```
    pub fn inv(&self) -> Transformation {
        let rotation = if self.mirror {
            self.rotation
        } else {
            -self.rotation
        };
        let linear = Self {
            mirror: self.mirror,
            rotation,
            offset: Point::zero(),
        };
        Self {
            offset: -linear.apply_linear(self.offset),
            ..linear
        }
    }

    /// The translation applied by this transformation.
    #[inline]
    pub const fn offset_point(&self) -> Point {
        self.offset
    }

    /// The rotation applied by this transformation.
    #[inline]
    pub const fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Whether this transformation reflects about the x-axis.
    #[inline]
    pub const fn mirror(&self) -> bool {
        self.mirror
    }
}

impl std::fmt::Display for Transformation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = if self.mirror { "m" } else { "r" };
        write!(
            f,
            "{}{} {},{}",
            prefix,
            self.rotation.degrees(),
            self.offset.x,
            self.offset.y
        )
    }
}

/// A trait for specifying how an object is changed by a [`Transformation`].
pub trait TransformMut {
    /// Applies [`Transformation`] `trans` in place.
    fn transform_mut(&mut self, trans: Transformation);
}

impl<T: TransformMut> TransformMut for Vec<T> {
    fn transform_mut(&mut self, trans: Transformation) {
        for i in self.iter_mut() {
            i.transform_mut(trans);
        }
    }
}

impl<T: TransformMut> TransformMut for Option<T> {
    fn transform_mut(&mut self, trans: Transformation) {
        if let Some(inner) = self.as_mut() {
            inner.transform_mut(trans);
        }
    }
}

/// A trait for specifying how an object is changed by a [`Transformation`].
///
/// Takes in an owned copy of the shape and returns the transformed version.
pub trait Transform: TransformMut + Sized {
    /// Applies [`Transformation`] `trans`, returning the transformed object.
    #[inline]
    fn transform(mut self, trans: Transformation) -> Self {
        self.transform_mut(trans);
        self
    }
}

impl<T: TransformMut + Sized> Transform for T {}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_transformations(offset: Point) -> Vec<Transformation> {
        Rotation::all()
            .into_iter()
            .flat_map(|r| {
                [false, true]
                    .into_iter()
                    .map(move |m| Transformation::from_parts(offset, r, m))
            })
            .collect()
    }

    #[test]
    fn rotation_arithmetic_wraps() {
        assert_eq!(Rotation::R270 + Rotation::R180, Rotation::R90);
        assert_eq!(Rotation::R0 - Rotation::R90, Rotation::R270);
        assert_eq!(-Rotation::R0, Rotation::R0);
        assert_eq!(Rotation::R90.reversed(), Rotation::R270);
    }

    #[test]
    fn point_transformations_work() {
        let pt = Point::new(2, 1);
        let r90 = Transformation::from_parts(Point::new(23, 11), Rotation::R90, false);
        assert_eq!(r90.apply(pt), Point::new(22, 13));
        let r180 = Transformation::from_parts(Point::new(-50, 10), Rotation::R180, false);
        assert_eq!(r180.apply(pt), Point::new(-52, 9));
        let r270 = Transformation::from_parts(Point::new(80, 90), Rotation::R270, false);
        assert_eq!(r270.apply(pt), Point::new(81, 88));
        assert_eq!(Transformation::reflect_vert().apply(pt), Point::new(2, -1));
        let flip = Transformation::from_parts(Point::zero(), Rotation::R180, true);
        assert_eq!(flip.apply(pt), Point::new(-2, 1));
    }

    #[test]
    fn nested_composition_matches_sequential_application() {
        // B sits in the top cell rotated by 90 degrees; A sits mirrored in B.
        let b_in_top = Transformation::from_parts(Point::new(100, 0), Rotation::R90, false);
        let a_in_b = Transformation::from_parts(Point::new(0, 50), Rotation::R0, true);
        let local = Point::new(10, 10);

        let sequential = b_in_top.apply(a_in_b.apply(local));
        let composed = Transformation::cascade(b_in_top, a_in_b).apply(local);
        assert_eq!(sequential, Point::new(60, 10));
        assert_eq!(composed, sequential);
    }

    #[test]
    fn cascade_is_associative() {
        let a = all_transformations(Point::new(7, -3));
        let b = all_transformations(Point::new(-20, 11));
        let c = all_transformations(Point::new(1, 400));
        for ta in &a {
            for tb in &b {
                for tc in &c {
                    let left = Transformation::cascade(Transformation::cascade(*ta, *tb), *tc);
                    let right = Transformation::cascade(*ta, Transformation::cascade(*tb, *tc));
                    assert_eq!(left, right);
                }
            }
        }
    }

    #[test]
    fn cascade_is_not_commutative() {
        let reflect = Transformation::reflect_vert();
        let shift = Transformation::translate(1, 1);
        let p = Point::new(1, 1);
        assert_eq!(Transformation::cascade(shift, reflect).apply(p), Point::new(2, 0));
        assert_eq!(Transformation::cascade(reflect, shift).apply(p), Point::new(2, -2));
    }

    #[test]
    fn inverse_round_trips_every_orientation() {
        for t in all_transformations(Point::new(520, 130)) {
            assert_eq!(Transformation::cascade(t.inv(), t), Transformation::identity());
            assert_eq!(Transformation::cascade(t, t.inv()), Transformation::identity());
        }
    }

    #[test]
    fn headings_follow_points() {
        for t in all_transformations(Point::new(3, 9)) {
            for h in Rotation::all() {
                let start = t.apply(Point::zero());
                let end = t.apply(h.unit());
                assert_eq!(Rotation::heading_between(start, end), Some(t.apply_heading(h)));
            }
        }
    }
}
