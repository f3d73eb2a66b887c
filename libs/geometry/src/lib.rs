//! 2-D integer geometry for laying out designs on a fabrication canvas.
//!
//! All coordinates are fixed-point database units (`i64`). Transformations are
//! restricted to Manhattan rotations, a reflection about the x-axis, and a
//! translation, so every transformed coordinate stays on the integer grid.
//!
//! # Examples
//!
//! Create a [rectangle](crate::rect::Rect) and move it:
//!
//! ```
//! # use geometry::prelude::*;
//! let rect = Rect::from_sides(10, 20, 30, 40);
//! let moved = rect.transform(Transformation::translate(5, 5));
//! assert_eq!(moved, Rect::from_sides(15, 25, 35, 45));
//! ```
#![warn(missing_docs)]

pub mod bbox;
pub mod dir;
pub mod path;
pub mod point;
pub mod prelude;
pub mod rect;
pub mod shape;
pub mod span;
pub mod transform;
