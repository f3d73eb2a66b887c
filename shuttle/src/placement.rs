//! Obstacle-aware slot placement.
//!
//! Slots are tiled in columns, bottom to top, left to right. A column ends
//! when the next slot would exceed the column's height budget or run into a
//! [`CutoutPolicy::SkipColumn`] cutout. [`CutoutPolicy::SkipForward`]
//! cutouts push the cursor up past them without ending the column.
//!
//! Placement never backtracks, so the result for a given input order is
//! reproducible.

use arcstr::ArcStr;
use geometry::prelude::*;
use serde::{Deserialize, Serialize};

use crate::issues::{Cause, IssueSet};

/// How placement avoids a cutout.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutoutPolicy {
    /// End the current column.
    SkipColumn,
    /// Move the cursor up to the top edge of the cutout, staying in the column.
    SkipForward,
}

/// A region of the canvas where slots may not be placed.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Cutout {
    pub name: ArcStr,
    pub rect: Rect,
    pub policy: CutoutPolicy,
}

impl Cutout {
    pub fn new(name: impl Into<ArcStr>, rect: Rect, policy: CutoutPolicy) -> Self {
        Self {
            name: name.into(),
            rect,
            policy,
        }
    }
}

/// The fabrication canvas that slots are tiled across.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Canvas {
    /// The usable width.
    pub width: i64,
    /// The height budget of the first column.
    pub first_column_height: i64,
    /// The height budget of every other column.
    pub height: i64,
    /// The lower-left corner of the first slot.
    pub origin: Point,
    /// The nominal slot footprint.
    pub slot: Dims,
    pub column_gap: i64,
    pub row_gap: i64,
    /// Cutouts, checked in order.
    pub cutouts: Vec<Cutout>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 8_650_000,
            first_column_height: 8_490_000,
            height: 8_780_000,
            origin: Point::new(2_500_000, 418_000),
            slot: Dims::new(605_000, 410_000),
            column_gap: 8_000,
            row_gap: 8_000,
            cutouts: vec![
                Cutout::new(
                    "tr",
                    Rect::from_sides(7_037_000, 8_494_000, 8_650_000, 8_780_000),
                    CutoutPolicy::SkipColumn,
                ),
                Cutout::new(
                    "br",
                    Rect::from_sides(7_484_000, 0, 8_650_000, 898_000),
                    CutoutPolicy::SkipForward,
                ),
                Cutout::new(
                    "br2",
                    Rect::from_sides(7_855_000, 0, 8_650_000, 5_063_000),
                    CutoutPolicy::SkipForward,
                ),
            ],
        }
    }
}

impl Canvas {
    /// The outer bounds of the canvas.
    pub fn bounds(&self) -> Rect {
        Rect::from_sides(0, 0, self.width, self.height)
    }

    /// The distance between the bottoms of vertically adjacent slots.
    #[inline]
    pub fn slot_pitch(&self) -> i64 {
        self.slot.h() + self.row_gap
    }

    /// The distance between the left edges of adjacent columns.
    #[inline]
    pub fn column_pitch(&self) -> i64 {
        self.slot.w() + self.column_gap
    }

    /// The height budget of the given column.
    #[inline]
    pub fn budget(&self, column: usize) -> i64 {
        if column == 0 {
            self.first_column_height
        } else {
            self.height
        }
    }
}

/// A placed design.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// The index of the design in the input sequence.
    pub ordinal: usize,
    /// The column the slot was placed in.
    pub column: usize,
    /// The nominal slot footprint at its final position.
    pub rect: Rect,
    /// The content size after clamping to the slot.
    pub content: Dims,
}

impl Slot {
    /// The lower-left corner of the slot.
    #[inline]
    pub fn origin(&self) -> Point {
        self.rect.lower_left()
    }
}

/// An error in the placement engine.
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum PlacementError {
    /// No column to the right has room for another slot.
    #[error("canvas exhausted while placing design {ordinal}: a column at x = {x} does not fit")]
    CanvasExhausted {
        /// The design that could not be placed.
        ordinal: usize,
        /// The left edge of the column that overflowed.
        x: i64,
    },
}

/// The placement cursor.
///
/// Threaded by value through [`PlacementState::settle`] and
/// [`PlacementState::advance`].
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct PlacementState {
    pub x: i64,
    pub y: i64,
    pub column: usize,
}

impl PlacementState {
    /// The cursor at the canvas origin, in the first column.
    pub fn new(canvas: &Canvas) -> Self {
        Self {
            x: canvas.origin.x,
            y: canvas.origin.y,
            column: 0,
        }
    }

    /// The nominal slot rectangle at the cursor.
    pub fn candidate(&self, canvas: &Canvas) -> Rect {
        Rect::with_origin_and_dims(Point::new(self.x, self.y), canvas.slot)
    }

    /// Starts a new column.
    pub fn wrap(self, canvas: &Canvas) -> Self {
        Self {
            x: self.x + canvas.column_pitch(),
            y: canvas.origin.y,
            column: self.column + 1,
        }
    }

    /// Moves the cursor to the first position where a nominal slot fits.
    ///
    /// Fails once the cursor's column no longer fits within the canvas width.
    pub fn settle(self, canvas: &Canvas, ordinal: usize) -> Result<Self, PlacementError> {
        let mut state = self;
        loop {
            if state.x + canvas.slot.w() > canvas.width {
                return Err(PlacementError::CanvasExhausted {
                    ordinal,
                    x: state.x,
                });
            }
            let candidate = state.candidate(canvas);
            if candidate.top() > canvas.budget(state.column) {
                state = state.wrap(canvas);
                continue;
            }
            match canvas
                .cutouts
                .iter()
                .find(|cutout| cutout.rect.overlaps(candidate))
            {
                Some(cutout) => match cutout.policy {
                    CutoutPolicy::SkipColumn => {
                        tracing::debug!(cutout = %cutout.name, x = state.x, "column wrap at cutout");
                        state = state.wrap(canvas);
                    }
                    CutoutPolicy::SkipForward => {
                        tracing::debug!(cutout = %cutout.name, y = cutout.rect.top(), "skipping past cutout");
                        state.y = cutout.rect.top();
                    }
                },
                None => return Ok(state),
            }
        }
    }

    /// Moves the cursor past a slot whose content is `content_height` tall.
    pub fn advance(self, canvas: &Canvas, content_height: i64) -> Self {
        Self {
            y: self.y + std::cmp::max(canvas.slot.h(), content_height) + canvas.row_gap,
            ..self
        }
    }
}

/// Places designs of the given content sizes on the canvas.
///
/// A `None` size denotes a design with no geometry; it is skipped. Slots are
/// returned in input order.
pub fn place(sizes: &[Option<Dims>], canvas: &Canvas) -> Result<Vec<Slot>, PlacementError> {
    place_reporting(sizes, canvas, &mut IssueSet::new())
}

/// Like [`place`], but records skipped and clamped designs in `issues`.
pub fn place_reporting(
    sizes: &[Option<Dims>],
    canvas: &Canvas,
    issues: &mut IssueSet<crate::issues::Issue>,
) -> Result<Vec<Slot>, PlacementError> {
    let mut state = PlacementState::new(canvas);
    let mut slots = Vec::with_capacity(sizes.len());
    for (ordinal, size) in sizes.iter().enumerate() {
        let Some(size) = size else {
            issues.warn(Cause::EmptySlot { ordinal });
            continue;
        };
        let content = if size.fits_in(canvas.slot) {
            *size
        } else {
            issues.warn(Cause::OversizedContent {
                ordinal,
                content: *size,
                slot: canvas.slot,
            });
            size.clamp_to(canvas.slot)
        };

        state = state.settle(canvas, ordinal)?;
        let slot = Slot {
            ordinal,
            column: state.column,
            rect: state.candidate(canvas),
            content,
        };
        tracing::info!(ordinal, column = slot.column, x = state.x, y = state.y, "placed slot");
        slots.push(slot);
        state = state.advance(canvas, content.h());
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_canvas(cutouts: Vec<Cutout>) -> Canvas {
        Canvas {
            width: 100,
            first_column_height: 40,
            height: 60,
            origin: Point::new(0, 0),
            slot: Dims::new(10, 10),
            column_gap: 2,
            row_gap: 2,
            cutouts,
        }
    }

    #[test]
    fn first_column_uses_lower_budget() {
        let canvas = small_canvas(vec![]);
        let slots = place(&[Some(Dims::new(10, 10)); 9], &canvas).unwrap();
        let per_column: Vec<usize> = (0..2)
            .map(|c| slots.iter().filter(|s| s.column == c).count())
            .collect();
        // 0, 12, 24 fit under 40; 0..=48 fit under 60.
        assert_eq!(per_column, [3, 5]);
        assert_eq!(slots[3].origin(), Point::new(12, 0));
    }

    #[test]
    fn skip_forward_moves_up_within_column() {
        let canvas = small_canvas(vec![Cutout::new(
            "low",
            Rect::from_sides(0, 0, 5, 15),
            CutoutPolicy::SkipForward,
        )]);
        let slots = place(&[Some(Dims::new(10, 10)); 2], &canvas).unwrap();
        assert_eq!(slots[0].origin(), Point::new(0, 15));
        assert_eq!(slots[1].origin(), Point::new(0, 27));
        assert_eq!(slots[1].column, 0);
    }

    #[test]
    fn empty_and_oversized_content_are_reported() {
        let canvas = small_canvas(vec![]);
        let mut issues = IssueSet::new();
        let slots = place_reporting(
            &[Some(Dims::new(50, 5)), None, Some(Dims::new(3, 3))],
            &canvas,
            &mut issues,
        )
        .unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].content, Dims::new(10, 5));
        assert_eq!(slots[1].ordinal, 2);
        assert_eq!(slots[1].origin(), Point::new(0, 12));
        assert_eq!(issues.num_warnings(), 2);
    }

    #[test]
    fn exhausting_the_canvas_is_fatal() {
        let mut canvas = small_canvas(vec![]);
        canvas.width = 22;
        let err = place(&[Some(Dims::new(1, 1)); 20], &canvas).unwrap_err();
        // Columns at x = 0 and 12 hold 3 + 5 slots.
        assert_eq!(err, PlacementError::CanvasExhausted { ordinal: 8, x: 24 });
    }
}
