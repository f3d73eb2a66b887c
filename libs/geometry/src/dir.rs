//! Axis-aligned directions and turns.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::transform::Rotation;

/// An enumeration of axis-aligned directions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, PartialEq, Eq)]
pub enum Dir {
    /// The horizontal, or x-aligned, direction.
    Horiz,
    /// The vertical, or y-aligned, direction.
    Vert,
}

impl Dir {
    /// Returns the other direction.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// assert_eq!(Dir::Vert.other(), Dir::Horiz);
    /// assert_eq!(Dir::Horiz.other(), Dir::Vert);
    /// ```
    pub const fn other(&self) -> Self {
        match *self {
            Self::Horiz => Self::Vert,
            Self::Vert => Self::Horiz,
        }
    }
}

impl Display for Dir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Horiz => write!(f, "horizontal"),
            Self::Vert => write!(f, "vertical"),
        }
    }
}

impl std::ops::Not for Dir {
    type Output = Self;
    fn not(self) -> Self::Output {
        self.other()
    }
}

/// A 90 degree change of heading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, PartialEq, Eq)]
pub enum Turn {
    /// Counter-clockwise.
    Left,
    /// Clockwise.
    Right,
}

impl Turn {
    /// The rotation that this turn applies to a heading.
    pub const fn rotation(&self) -> Rotation {
        match *self {
            Self::Left => Rotation::R90,
            Self::Right => Rotation::R270,
        }
    }

    /// The turn taking heading `from` to heading `to`, if they are perpendicular.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// assert_eq!(Turn::between(Rotation::R0, Rotation::R90), Some(Turn::Left));
    /// assert_eq!(Turn::between(Rotation::R0, Rotation::R180), None);
    /// ```
    pub fn between(from: Rotation, to: Rotation) -> Option<Self> {
        match to - from {
            Rotation::R90 => Some(Self::Left),
            Rotation::R270 => Some(Self::Right),
            _ => None,
        }
    }

    /// Signed angle in degrees, as written in turtle programs.
    pub const fn degrees(&self) -> i32 {
        match *self {
            Self::Left => 90,
            Self::Right => -90,
        }
    }

    /// Parses a signed turtle angle (`90` or `-90`).
    pub const fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees {
            90 => Some(Self::Left),
            -90 => Some(Self::Right),
            _ => None,
        }
    }
}
