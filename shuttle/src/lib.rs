//! Multi-project photonic shuttle aggregation.
//!
//! Independently authored designs are loaded from a [`LayoutSource`](source::LayoutSource),
//! placed in fixed-size slots across a shared canvas, and fed from lasers
//! through binary splitter trees. Individual measured circuits can later be
//! pulled back out of the merged layout with an [`Extractor`](extract::Extractor).
//!
//! ```
//! use shuttle::aggregate::Aggregator;
//! use shuttle::config::ShuttleConfig;
//! use shuttle::pdk::{CellRegistry, ReferencePdk};
//! use shuttle::source::InMemorySource;
//!
//! let aggregator = Aggregator::new(ShuttleConfig::default(), CellRegistry::bound(ReferencePdk));
//! let merged = aggregator.run(&InMemorySource::new()).unwrap();
//! assert!(merged.designs.is_empty());
//! ```

pub mod aggregate;
pub mod config;
pub mod course;
pub mod error;
pub mod export;
pub mod extract;
pub mod ingest;
pub mod issues;
pub mod labels;
pub mod layer;
pub mod pdk;
pub mod placement;
pub mod route;
pub mod source;
pub mod tree;


pub use error::{Error, Result};
