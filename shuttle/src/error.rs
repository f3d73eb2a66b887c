//! Error types and error handling utilities.

use std::path::PathBuf;
use std::sync::Arc;

use arcstr::ArcStr;
use layir::hierarchy::HierarchyError;

use crate::extract::ExtractError;
use crate::placement::PlacementError;
use crate::route::RouteError;

/// A result type returning shuttle errors.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type for shuttle functions.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// Only depth-4 splitter trees are supported.
    #[error("unsupported splitter tree depth {0} (only depth 4 is supported)")]
    UnsupportedTreeDepth(usize),
    /// Cells were requested before a cell provider was bound.
    #[error("no cell provider is bound")]
    ProviderUnbound,
    /// A required cell could not be loaded from the cell provider.
    #[error("required cell `{name}` is unavailable: {source}")]
    MissingCell {
        /// The requested cell name.
        name: ArcStr,
        /// The provider's error.
        source: ProviderError,
    },
    /// A cell lacks a port that the pipeline relies on.
    #[error("cell `{cell}` has no port named `{port}`")]
    MissingPort {
        /// The cell.
        cell: ArcStr,
        /// The missing port.
        port: ArcStr,
    },
    /// A splitter-tree leaf was neither bound to a design nor terminated.
    #[error("leaf {leaf} of the splitter tree for laser group {group} is unconnected")]
    UnconnectedLeaf {
        /// The laser group.
        group: usize,
        /// The leaf index within the tree.
        leaf: usize,
    },
    /// An error in the placement engine.
    #[error(transparent)]
    Placement(#[from] PlacementError),
    /// An error in the lane router.
    #[error(transparent)]
    Route(#[from] RouteError),
    /// An error resolving the cell hierarchy.
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    /// An error extracting a sub-circuit.
    #[error(transparent)]
    Extract(#[from] ExtractError),
    /// An I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] Arc<std::io::Error>),
    /// A layout file could not be parsed or written.
    #[error("error in layout file {path:?}: {message}")]
    LayoutFormat {
        /// The file.
        path: PathBuf,
        /// The underlying serializer error.
        message: String,
    },
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

/// An error raised by a [`CellProvider`](crate::pdk::CellProvider).
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum ProviderError {
    /// The provider has no cell with the requested name.
    #[error("cell not found")]
    CellNotFound,
    /// The provider failed to construct the cell.
    #[error("{0}")]
    Other(ArcStr),
}

/// An error loading or validating a [`ShuttleConfig`](crate::config::ShuttleConfig).
#[derive(thiserror::Error, Debug, Clone)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("could not read {path:?}: {source}")]
    Read {
        /// The file.
        path: PathBuf,
        /// The I/O error.
        source: Arc<std::io::Error>,
    },
    /// The configuration is not valid TOML for this schema.
    #[error("could not parse configuration: {0}")]
    Parse(String),
    /// A layer string is malformed.
    #[error("invalid layer `{0}` (expected `<layer>/<datatype>`)")]
    InvalidLayer(String),
    /// A numeric setting is out of range.
    #[error("`{field}` must be {requirement}")]
    OutOfRange {
        /// The setting name.
        field: &'static str,
        /// What the value must satisfy.
        requirement: &'static str,
    },
}
