//! Copying cell trees between libraries.

use std::collections::HashMap;

use arcstr::ArcStr;

use crate::{Cell, CellId, Instance, Library};

/// Remembers which source cells have already been copied into a destination.
///
/// Keyed by source cell name, so copying the same cell twice (for example,
/// two extractions sharing a component) inserts it only once.
#[derive(Debug, Clone, Default)]
pub struct CopyCache {
    copied: HashMap<ArcStr, CellId>,
}

impl CopyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The destination cell holding the copy of the source cell `name`, if any.
    pub fn get(&self, name: &str) -> Option<CellId> {
        self.copied.get(name).copied()
    }

    /// The number of cells copied through this cache.
    pub fn len(&self) -> usize {
        self.copied.len()
    }

    /// Returns `true` if nothing has been copied yet.
    pub fn is_empty(&self) -> bool {
        self.copied.is_empty()
    }
}

/// Copies `cell` and everything it instantiates from `src` into `dest`.
///
/// Returns the ID of the copy of `cell` in `dest`. Cells already present in
/// `cache` are reused rather than copied again.
pub fn import_tree<L: Clone>(
    src: &Library<L>,
    cell: CellId,
    dest: &mut Library<L>,
    cache: &mut CopyCache,
) -> CellId {
    let source = src.cell(cell);
    if let Some(id) = cache.get(source.name()) {
        return id;
    }

    let mut copy = Cell::new(source.name().clone());
    for (_, inst) in source.instances() {
        let child = import_tree(src, inst.child(), dest, cache);
        copy.add_instance(Instance::with_transformation(
            child,
            inst.name().clone(),
            inst.transformation(),
        ));
    }
    for elem in source.elements() {
        copy.add_element(elem.clone());
    }
    for (name, port) in source.ports() {
        copy.add_port(name.clone(), *port);
    }

    let id = dest.add_cell(copy);
    tracing::trace!(cell = %source.name(), "copied cell");
    cache.copied.insert(source.name().clone(), id);
    id
}
