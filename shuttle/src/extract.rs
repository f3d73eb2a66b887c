//! Extraction of a single measured circuit from an aggregated layout.
//!
//! A circuit is identified by its measurement label. The cell holding the
//! label is analyzed for pin connectivity; the fiber I/O nearest the label is
//! the laser input, and everything optically reachable from it is copied into
//! a new top cell with absolute coordinates.

use arcstr::ArcStr;
use geometry::prelude::*;
use layir::connectivity::{Netlist, NetlistError};
use layir::copy::{import_tree, CopyCache};
use layir::hierarchy::{HierarchyError, HierarchyIndex};
use layir::{Cell, CellId, Instance, Library, PortKind};
use serde::{Deserialize, Serialize};

use crate::layer::LayerSpec;

/// An error that makes a label unusable as a measurement point.
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum ExtractError {
    /// The cell holding the label cannot be placed in the root frame.
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    /// The label is not next to a connected fiber I/O.
    #[error("label `{label}` has no connected laser input")]
    NoLaserNet {
        /// The label text.
        label: ArcStr,
    },
    /// Nothing reachable from the laser input leads back out to a fiber I/O.
    #[error("label `{label}` has no detector reachable from its laser input")]
    NoDetectorNet {
        /// The label text.
        label: ArcStr,
    },
}

/// A component copied into an extracted circuit.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// The instance name in the source cell.
    pub name: ArcStr,
    /// The name of the instantiated cell.
    pub cell: ArcStr,
    /// The absolute transformation of the component.
    pub trans: Transformation,
}

/// A successfully extracted circuit.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ExtractedCircuit {
    pub label: ArcStr,
    /// The new top cell in the destination library.
    pub top: CellId,
    /// Retained components, starting with the laser input.
    pub components: Vec<ComponentRecord>,
    /// The absolute position of the label.
    pub label_position: Point,
}

/// The outcome of extracting one label.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Extraction {
    /// The label does not appear on the label layer.
    NotFound,
    /// Connectivity could not be analyzed; `top` is an empty cell.
    NoNetlist { top: CellId, reason: NetlistError },
    Circuit(ExtractedCircuit),
}

impl Extraction {
    /// The top cell in the destination library, if one was created.
    pub fn top(&self) -> Option<CellId> {
        match self {
            Extraction::NotFound => None,
            Extraction::NoNetlist { top, .. } => Some(*top),
            Extraction::Circuit(c) => Some(c.top),
        }
    }
}

/// An extraction into its own library.
#[derive(Debug, Clone, PartialEq)]
pub struct Standalone {
    pub library: Library<LayerSpec>,
    pub extraction: Extraction,
}

/// Extracts circuits from a read-only layout.
#[derive(Debug, Clone, Copy)]
pub struct Extractor<'a> {
    source: &'a Library<LayerSpec>,
    label_layer: LayerSpec,
}

impl<'a> Extractor<'a> {
    pub fn new(source: &'a Library<LayerSpec>, label_layer: LayerSpec) -> Self {
        Self {
            source,
            label_layer,
        }
    }

    /// Extracts `label` into a fresh library.
    pub fn extract(&self, label: &str) -> Result<Standalone, ExtractError> {
        let mut library = Library::with_dbu(self.source.dbu());
        let extraction = self.extract_into(label, &mut library, &mut CopyCache::new())?;
        Ok(Standalone {
            library,
            extraction,
        })
    }

    /// Extracts `label` into `dest`.
    ///
    /// Cells already copied through `cache` are reused, so several labels can
    /// share one destination without duplicating common components.
    pub fn extract_into(
        &self,
        label: &str,
        dest: &mut Library<LayerSpec>,
        cache: &mut CopyCache,
    ) -> Result<Extraction, ExtractError> {
        let _span = tracing::info_span!("extract", %label).entered();
        let Some(found) = self.source.find_text(&self.label_layer, label) else {
            tracing::info!("label not found");
            return Ok(Extraction::NotFound);
        };
        let label: ArcStr = label.into();
        let index = HierarchyIndex::new(self.source);
        let abs = index.cell_transform(found.cell)?;
        let local_position = found.text.position();

        let netlist = match Netlist::build(self.source, found.cell) {
            Ok(netlist) => netlist,
            Err(reason) => {
                tracing::warn!(%reason, "no netlist; returning an empty cell");
                let top = dest.add_cell(Cell::new(label.clone()));
                return Ok(Extraction::NoNetlist { top, reason });
            }
        };

        let laser = netlist
            .nearest_pin(local_position, PortKind::OpticalIo)
            .map(|pin| netlist.pins()[pin].component)
            .filter(|c| netlist.component_nets(*c).next().is_some())
            .ok_or_else(|| ExtractError::NoLaserNet {
                label: label.clone(),
            })?;
        let retained = netlist.reachable_from(laser);
        let io = netlist.components_with(PortKind::OpticalIo);
        if !retained.iter().any(|c| *c != laser && io.contains_key(c)) {
            return Err(ExtractError::NoDetectorNet { label });
        }
        tracing::debug!(
            laser = %netlist.components()[laser].name,
            retained = retained.len(),
            "trimmed netlist"
        );

        let seed = self.source.cell(found.cell);
        let mut top = Cell::new(label.clone());
        let mut components = Vec::with_capacity(retained.len());
        for c in retained {
            let component = &netlist.components()[c];
            let child = import_tree(self.source, component.cell, dest, cache);
            let trans = Transformation::cascade(abs, component.trans);
            top.add_instance(Instance::with_transformation(
                child,
                component.name.clone(),
                trans,
            ));
            components.push(ComponentRecord {
                name: component.name.clone(),
                cell: self.source.cell(component.cell).name().clone(),
                trans,
            });
        }
        for elem in seed.elements() {
            top.add_element(elem.clone().transform(abs));
        }
        let top = dest.add_cell(top);
        tracing::info!(components = components.len(), "extracted circuit");

        Ok(Extraction::Circuit(ExtractedCircuit {
            label,
            top,
            components,
            label_position: abs.apply(local_position),
        }))
    }

    /// Extracts every label into its own library, in parallel.
    ///
    /// Labels are split into one contiguous chunk per available core.
    /// Results are returned in the order of `labels`. A failure for one label
    /// does not affect the others.
    pub fn extract_all<S: AsRef<str> + Sync>(
        &self,
        labels: &[S],
    ) -> Vec<Result<Standalone, ExtractError>> {
        let workers = std::thread::available_parallelism().map_or(1, |n| n.get());
        let chunk = labels.len().div_ceil(workers).max(1);
        std::thread::scope(|s| {
            let handles: Vec<_> = labels
                .chunks(chunk)
                .map(|chunk| {
                    s.spawn(move || {
                        chunk
                            .iter()
                            .map(|label| self.extract(label.as_ref()))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(results) => results,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }
}
