//! An import prelude that re-exports commonly used items.

pub use crate::bbox::{Bbox, BoundingUnion};
pub use crate::dir::{Dir, Turn};
pub use crate::path::Path;
pub use crate::point::Point;
pub use crate::rect::{Dims, Rect};
pub use crate::shape::Shape;
pub use crate::span::Span;
pub use crate::transform::{Rotation, Transform, TransformMut, Transformation};
