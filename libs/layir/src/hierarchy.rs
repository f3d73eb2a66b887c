//! Absolute transforms of nested instances.
//!
//! Every cell below a root is expected to be instantiated from exactly one
//! place. [`HierarchyIndex`] checks that expectation as it walks upward
//! instead of picking an arbitrary parent.

use std::collections::{HashMap, HashSet};

use arcstr::ArcStr;
use geometry::transform::Transformation;

use crate::{CellId, InstanceId, Library};

/// A specific instance inside a specific parent cell.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct InstanceRef {
    /// The cell that owns the instance.
    pub parent: CellId,
    /// The instance within `parent`.
    pub instance: InstanceId,
}

/// An error resolving a transform through the cell hierarchy.
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum HierarchyError {
    /// A cell on the path to the root is instantiated from more than one site.
    #[error("cell `{cell}` is instantiated from {sites} sites; its placement is ambiguous")]
    AmbiguousInstantiation {
        /// The offending cell.
        cell: ArcStr,
        /// The number of instantiation sites found.
        sites: usize,
    },
    /// Walking upward revisited a cell.
    #[error("cell `{cell}` instantiates itself through its own hierarchy")]
    CyclicHierarchy {
        /// The first cell seen twice.
        cell: ArcStr,
    },
    /// The instance reference does not name an instance of its parent.
    #[error("cell `{parent}` has no instance with id {instance}")]
    UnknownInstance {
        /// The parent cell.
        parent: ArcStr,
        /// The raw instance ID.
        instance: u64,
    },
}

/// An index from each cell to the sites that instantiate it.
pub struct HierarchyIndex<'a, L> {
    lib: &'a Library<L>,
    sites: HashMap<CellId, Vec<InstanceRef>>,
}

impl<'a, L> HierarchyIndex<'a, L> {
    /// Indexes every instantiation site in `lib`.
    pub fn new(lib: &'a Library<L>) -> Self {
        let mut sites: HashMap<CellId, Vec<InstanceRef>> = HashMap::new();
        for (parent, cell) in lib.cells() {
            for (instance, inst) in cell.instances() {
                sites
                    .entry(inst.child())
                    .or_default()
                    .push(InstanceRef { parent, instance });
            }
        }
        Self { lib, sites }
    }

    /// The library this index was built from.
    #[inline]
    pub fn library(&self) -> &'a Library<L> {
        self.lib
    }

    /// All sites instantiating `cell`.
    pub fn sites(&self, cell: CellId) -> &[InstanceRef] {
        self.sites.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The unique site instantiating `cell`, or [`None`] if `cell` is a root.
    pub fn parent_site(&self, cell: CellId) -> Result<Option<InstanceRef>, HierarchyError> {
        match self.sites(cell) {
            [] => Ok(None),
            [site] => Ok(Some(*site)),
            sites => Err(HierarchyError::AmbiguousInstantiation {
                cell: self.lib.cell(cell).name().clone(),
                sites: sites.len(),
            }),
        }
    }

    /// Maps the coordinates of `inst`'s child cell into the root frame.
    ///
    /// Composes `T_root_to_p1 ∘ T_p1_to_p2 ∘ … ∘ T_pn_to_target`.
    pub fn absolute_transform(&self, inst: InstanceRef) -> Result<Transformation, HierarchyError> {
        let parent = self.lib.cell(inst.parent);
        let instance =
            parent
                .try_instance(inst.instance)
                .ok_or_else(|| HierarchyError::UnknownInstance {
                    parent: parent.name().clone(),
                    instance: inst.instance.raw(),
                })?;
        let mut seen = HashSet::from([instance.child()]);
        self.walk_up(inst.parent, instance.transformation(), &mut seen)
    }

    /// Maps the coordinates of `cell` into the frame of its root.
    ///
    /// A root cell resolves to the identity.
    pub fn cell_transform(&self, cell: CellId) -> Result<Transformation, HierarchyError> {
        self.walk_up(cell, Transformation::identity(), &mut HashSet::new())
    }

    fn walk_up(
        &self,
        mut cell: CellId,
        mut trans: Transformation,
        seen: &mut HashSet<CellId>,
    ) -> Result<Transformation, HierarchyError> {
        loop {
            if !seen.insert(cell) {
                return Err(HierarchyError::CyclicHierarchy {
                    cell: self.lib.cell(cell).name().clone(),
                });
            }
            let Some(site) = self.parent_site(cell)? else {
                return Ok(trans);
            };
            let inst = &self.lib.cell(site.parent).instances[&site.instance];
            trans = Transformation::cascade(inst.transformation(), trans);
            cell = site.parent;
        }
    }
}
