//! Wide polylines, such as waveguide traces.

use serde::{Deserialize, Serialize};

use crate::bbox::Bbox;
use crate::point::Point;
use crate::rect::Rect;
use crate::transform::{TransformMut, Transformation};

/// A polyline of a fixed width.
///
/// Consecutive points are joined by straight segments. The path is
/// centered on its points and extends `width / 2` to either side.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    points: Vec<Point>,
    width: i64,
}

impl Path {
    /// Creates a new path.
    pub fn new(points: impl Into<Vec<Point>>, width: i64) -> Self {
        Self {
            points: points.into(),
            width,
        }
    }

    /// The vertices of the path.
    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// The path width.
    #[inline]
    pub fn width(&self) -> i64 {
        self.width
    }

    /// The first vertex, if any.
    pub fn start(&self) -> Option<Point> {
        self.points.first().copied()
    }

    /// The last vertex, if any.
    pub fn end(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// Consecutive vertex pairs.
    pub fn segments(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.points.windows(2).map(|w| (w[0], w[1]))
    }

    /// Returns `true` if every segment is horizontal or vertical.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let l = Path::new([Point::new(0, 0), Point::new(10, 0), Point::new(10, 5)], 2);
    /// assert!(l.is_manhattan());
    /// let diag = Path::new([Point::new(0, 0), Point::new(3, 4)], 2);
    /// assert!(!diag.is_manhattan());
    /// ```
    pub fn is_manhattan(&self) -> bool {
        self.segments().all(|(a, b)| a.is_aligned_with(b))
    }

    /// The centerline length, measured in Manhattan distance.
    pub fn length(&self) -> i64 {
        self.segments().map(|(a, b)| a.manhattan_dist(b)).sum()
    }

    /// Removes repeated vertices and merges collinear runs.
    pub fn simplify(&mut self) {
        self.points.dedup();
        let mut out: Vec<Point> = Vec::with_capacity(self.points.len());
        for p in self.points.drain(..) {
            if out.len() >= 2 {
                let a = out[out.len() - 2];
                let b = out[out.len() - 1];
                let collinear = (a.x == b.x && b.x == p.x) || (a.y == b.y && b.y == p.y);
                let same_way = (b.x - a.x).signum() == (p.x - b.x).signum()
                    && (b.y - a.y).signum() == (p.y - b.y).signum();
                if collinear && same_way {
                    out.pop();
                }
            }
            out.push(p);
        }
        self.points = out;
    }
}

impl TransformMut for Path {
    fn transform_mut(&mut self, trans: Transformation) {
        self.points.transform_mut(trans);
    }
}

impl Bbox for Path {
    fn bbox(&self) -> Option<Rect> {
        let first = *self.points.first()?;
        let half = self.width / 2;
        let rect = self
            .points
            .iter()
            .fold(Rect::new(first, first), |acc, p| acc.union(Rect::new(*p, *p)));
        Some(rect.expand_all(half))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{Rotation, Transform};

    #[test]
    fn bbox_includes_half_width() {
        let path = Path::new([Point::new(0, 0), Point::new(100, 0), Point::new(100, 50)], 10);
        assert_eq!(path.bbox(), Some(Rect::from_sides(-5, -5, 105, 55)));
        assert_eq!(path.length(), 150);
    }

    #[test]
    fn transform_moves_vertices() {
        let path = Path::new([Point::new(0, 0), Point::new(10, 0)], 2)
            .transform(Transformation::from_parts(Point::new(5, 5), Rotation::R90, false));
        assert_eq!(path.points(), &[Point::new(5, 5), Point::new(5, 15)]);
    }

    #[test]
    fn simplify_merges_collinear_runs() {
        let mut path = Path::new(
            [
                Point::new(0, 0),
                Point::new(5, 0),
                Point::new(5, 0),
                Point::new(10, 0),
                Point::new(10, 10),
            ],
            1,
        );
        path.simplify();
        assert_eq!(
            path.points(),
            &[Point::new(0, 0), Point::new(10, 0), Point::new(10, 10)]
        );
    }
}
