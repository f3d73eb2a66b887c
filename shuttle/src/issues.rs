//! Structural warnings collected while aggregating.
//!
//! Non-fatal conditions (a rescaled database unit, a clipped design, an
//! empty layout) do not stop the run. Each becomes an [`Issue`] that is
//! logged when created and kept in an [`IssueSet`] for the final report.

use std::fmt::Display;

use arcstr::ArcStr;
use geometry::rect::{Dims, Rect};
use serde::{Deserialize, Serialize};
use tracing::Level;

/// An enumeration of possible severity levels.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Severity {
    /// An informational message.
    Info,
    /// A warning.
    #[default]
    Warning,
    /// An error. Often, but not always, fatal.
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A collection of issues.
#[derive(Debug, Clone)]
pub struct IssueSet<T> {
    issues: Vec<T>,
    num_errors: usize,
    num_warnings: usize,
}

impl<T> IssueSet<T> {
    /// Creates a new, empty issue set.
    #[inline]
    pub fn new() -> Self {
        Self {
            issues: Vec::new(),
            num_errors: 0,
            num_warnings: 0,
        }
    }

    /// Returns an iterator over all issues in the set.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.issues.iter()
    }

    /// The number of issues in this issue set.
    #[inline]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Returns `true` if this issue set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// The number of warnings in this issue set.
    #[inline]
    pub fn num_warnings(&self) -> usize {
        self.num_warnings
    }

    /// The number of errors in this issue set.
    #[inline]
    pub fn num_errors(&self) -> usize {
        self.num_errors
    }
}

impl IssueSet<Issue> {
    /// Adds the given issue to the issue set.
    pub fn add(&mut self, issue: Issue) {
        match issue.severity {
            Severity::Error => self.num_errors += 1,
            Severity::Warning => self.num_warnings += 1,
            Severity::Info => (),
        };
        self.issues.push(issue);
    }

    /// Creates, logs, and adds a warning.
    pub fn warn(&mut self, cause: Cause) {
        self.add(Issue::new_and_log(cause, Severity::Warning));
    }

    /// Returns `true` if any issue has the given cause kind.
    pub fn any(&self, f: impl Fn(&Cause) -> bool) -> bool {
        self.issues.iter().any(|issue| f(&issue.cause))
    }
}

impl<T> Default for IssueSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IntoIterator for IssueSet<T> {
    type Item = T;
    type IntoIter = <std::vec::Vec<T> as IntoIterator>::IntoIter;
    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}

/// A non-fatal condition found during aggregation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Issue {
    /// What happened.
    pub cause: Cause,
    /// How serious it is.
    pub severity: Severity,
}

/// The cause of an [`Issue`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Cause {
    /// A design used a different database unit and was rescaled.
    DbuRescaled {
        file: ArcStr,
        found: String,
        expected: String,
    },
    /// A design file contains no top cell.
    NoTopCell { file: ArcStr },
    /// A design file contains several top cells.
    MultipleTopCells { file: ArcStr, names: Vec<ArcStr> },
    /// A design has no geometry.
    EmptyLayout { file: ArcStr },
    /// A design exceeded its slot and was clipped.
    Clipped {
        file: ArcStr,
        before: Rect,
        after: Option<Rect>,
    },
    /// Placement clamped content larger than the nominal slot.
    OversizedContent { ordinal: usize, content: Dims, slot: Dims },
    /// Placement skipped an entry with no content.
    EmptySlot { ordinal: usize },
    /// More designs were placed than the lasers can feed.
    UnconnectedDesigns { count: usize, capacity: usize },
}

impl Issue {
    /// Creates a new issue without logging it.
    pub fn new(cause: Cause, severity: Severity) -> Self {
        Self { cause, severity }
    }

    /// Creates a new issue and emits it as a `tracing` event.
    pub fn new_and_log(cause: Cause, severity: Severity) -> Self {
        let result = Self::new(cause, severity);
        match severity {
            Severity::Info => tracing::event!(Level::INFO, issue = ?result.cause, "{}", result),
            Severity::Warning => tracing::event!(Level::WARN, issue = ?result.cause, "{}", result),
            Severity::Error => tracing::event!(Level::ERROR, issue = ?result.cause, "{}", result),
        }
        result
    }
}

impl Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cause)
    }
}

impl Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DbuRescaled {
                file,
                found,
                expected,
            } => write!(
                f,
                "{file}: database unit {found} does not match the required {expected}; layout rescaled"
            ),
            Self::NoTopCell { file } => write!(f, "{file}: layout does not contain a top cell"),
            Self::MultipleTopCells { file, names } => {
                let names: Vec<&str> = names.iter().map(|n| n.as_str()).collect();
                write!(
                    f,
                    "{file}: layout should contain one top cell; contains {}: {}",
                    names.len(),
                    names.join(", ")
                )
            }
            Self::EmptyLayout { file } => write!(f, "{file}: empty layout, skipping"),
            Self::Clipped {
                file,
                before,
                after,
            } => match after {
                Some(after) => write!(f, "{file}: clipped from {before} to {after}"),
                None => write!(f, "{file}: clipped from {before} to nothing"),
            },
            Self::OversizedContent {
                ordinal,
                content,
                slot,
            } => write!(
                f,
                "slot {ordinal}: content {}x{} exceeds slot {}x{}; clamped",
                content.w(),
                content.h(),
                slot.w(),
                slot.h()
            ),
            Self::EmptySlot { ordinal } => write!(f, "slot {ordinal}: no content, skipping"),
            Self::UnconnectedDesigns { count, capacity } => write!(
                f,
                "{count} designs exceed the {capacity} splitter-tree leaves and are left unconnected"
            ),
        }
    }
}
