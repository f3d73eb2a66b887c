//! Binary splitter trees.
//!
//! A tree of depth `D` has `2^D - 1` splitters arranged in `D` levels, one
//! input, and `2^D` ordered leaf ports. Each leaf is eventually either wired
//! to a design or capped with a terminator.

use arcstr::ArcStr;
use geometry::prelude::*;
use layir::{Cell, CellId, Instance, Library, Port, PortKind, Shape};
use serde::{Deserialize, Serialize};

use crate::config::{ShuttleConfig, SUPPORTED_TREE_DEPTH};
use crate::error::{Error, Result};
use crate::layer::LayerSpec;
use crate::route::{connect_cell, route_turtles, Turtle};

/// Name of the root input port on a tree cell.
pub const INPUT_PORT: &str = "opt_in";

/// Geometry of a splitter tree.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub level_pitch: i64,
    pub leaf_pitch: i64,
    pub bend_radius: i64,
    pub waveguide_width: i64,
    pub waveguide_layer: LayerSpec,
}

impl TreeParams {
    pub fn from_config(cfg: &ShuttleConfig) -> Self {
        Self {
            level_pitch: cfg.tree.level_pitch,
            leaf_pitch: cfg.tree.leaf_pitch,
            bend_radius: cfg.routing.bend_radius,
            waveguide_width: cfg.routing.waveguide_width,
            waveguide_layer: cfg.layers.waveguide,
        }
    }
}

/// A splitter tree cell and its ports, in the tree cell's coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitterTree {
    pub cell: CellId,
    pub depth: usize,
    pub input: Port,
    /// Leaf ports, in leaf order.
    pub leaves: Vec<Port>,
}

impl SplitterTree {
    /// The name of the cell port exposing leaf `i`.
    pub fn leaf_port_name(i: usize) -> ArcStr {
        arcstr::format!("leaf{i}")
    }
}

/// Fails unless `depth` is supported.
pub fn check_depth(depth: usize) -> Result<()> {
    if depth == SUPPORTED_TREE_DEPTH {
        Ok(())
    } else {
        Err(Error::UnsupportedTreeDepth(depth))
    }
}

/// Position of the input of splitter `index` at `level`.
fn splitter_origin(depth: usize, level: usize, index: usize, params: &TreeParams) -> Point {
    let numerator = (((2 * index + 1) << (depth - 1 - level)) as i64) - (1i64 << (depth - 1));
    Point::new(
        level as i64 * params.level_pitch,
        numerator * params.leaf_pitch / 2,
    )
}

/// The port `name` of `cell`, or [`Error::MissingPort`].
pub(crate) fn port_of<L>(cell: &Cell<L>, name: &str) -> Result<Port> {
    cell.try_port(name).copied().ok_or_else(|| Error::MissingPort {
        cell: cell.name().clone(),
        port: name.into(),
    })
}

/// Builds a splitter tree cell in `lib` from the splitter cell `splitter`.
///
/// The splitter must have an input `opt1` and outputs `opt2` (upper) and
/// `opt3` (lower). For the `i`-th splitter of the last level, leaf `2i` is
/// its `opt3` and leaf `2i + 1` its `opt2`.
pub fn build_tree(
    lib: &mut Library<LayerSpec>,
    depth: usize,
    splitter: CellId,
    params: &TreeParams,
) -> Result<SplitterTree> {
    check_depth(depth)?;
    let (input, upper, lower) = {
        let cell = lib.cell(splitter);
        (
            port_of(cell, "opt1")?,
            port_of(cell, "opt2")?,
            port_of(cell, "opt3")?,
        )
    };
    let splitter_cell = lib.cell(splitter).clone();

    let mut tree = Cell::new(arcstr::format!("splitter_tree_d{depth}"));
    // Output ports (upper, lower) of the previous level, in index order.
    let mut outputs: Vec<(Port, Port)> = Vec::new();
    let mut root_input = None;
    for level in 0..depth {
        let mut level_outputs = Vec::with_capacity(1 << level);
        for index in 0..(1usize << level) {
            let anchor = Port::new(
                PortKind::Optical,
                splitter_origin(depth, level, index, params),
                input.facing().reversed(),
                input.width(),
            );
            let trans = connect_cell(&anchor, &splitter_cell, "opt1")?;
            tree.add_instance(Instance::with_transformation(
                splitter,
                arcstr::format!("s{level}_{index}"),
                trans,
            ));
            let this_input = input.transform(trans);
            if level == 0 {
                root_input = Some(this_input);
            } else {
                let (parent_upper, parent_lower) = outputs[index / 2];
                let from = if index % 2 == 0 {
                    parent_lower
                } else {
                    parent_upper
                };
                let route = route_turtles(
                    &from,
                    &this_input,
                    &Turtle::default(),
                    &Turtle::default(),
                    params.bend_radius,
                )?;
                tree.add_element(Shape::new(
                    params.waveguide_layer,
                    route.to_path(params.waveguide_width),
                ));
            }
            level_outputs.push((upper.transform(trans), lower.transform(trans)));
        }
        outputs = level_outputs;
    }

    let input = root_input.ok_or(Error::UnsupportedTreeDepth(depth))?;
    let leaves: Vec<Port> = outputs
        .iter()
        .flat_map(|(upper, lower)| [*lower, *upper])
        .collect();
    tree.add_port(INPUT_PORT, input);
    for (i, leaf) in leaves.iter().enumerate() {
        tree.add_port(SplitterTree::leaf_port_name(i), *leaf);
    }
    let cell = lib.add_cell(tree);
    tracing::debug!(depth, leaves = leaves.len(), "built splitter tree");
    Ok(SplitterTree {
        cell,
        depth,
        input,
        leaves,
    })
}

/// What a leaf should be connected to.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum LeafTarget {
    /// The design with this index within the laser group.
    Design(usize),
    Terminator,
}

/// The deterministic leaf plan: leaf `i` feeds design `i` if there is one,
/// and is terminated otherwise.
///
/// # Example
///
/// ```
/// # use shuttle::tree::*;
/// let plan = assign_leaves(4, 3);
/// assert_eq!(plan[2], LeafTarget::Design(2));
/// assert_eq!(plan[3], LeafTarget::Terminator);
/// ```
pub fn assign_leaves(leaf_count: usize, design_count: usize) -> Vec<LeafTarget> {
    (0..leaf_count)
        .map(|i| {
            if i < design_count {
                LeafTarget::Design(i)
            } else {
                LeafTarget::Terminator
            }
        })
        .collect()
}

/// The leaves of one tree that have actually been connected.
#[derive(Debug, Clone, Default, Hash, Eq, PartialEq)]
pub struct LeafAssignment {
    bindings: Vec<Option<LeafTarget>>,
}

impl LeafAssignment {
    /// Creates an assignment with every leaf unbound.
    pub fn new(leaf_count: usize) -> Self {
        Self {
            bindings: vec![None; leaf_count],
        }
    }

    /// Records that `leaf` was connected to `target`.
    pub fn bind(&mut self, leaf: usize, target: LeafTarget) {
        self.bindings[leaf] = Some(target);
    }

    /// The binding of each leaf.
    pub fn bindings(&self) -> &[Option<LeafTarget>] {
        &self.bindings
    }

    /// Fails on the first leaf that was never connected.
    pub fn verify(&self, group: usize) -> Result<()> {
        match self.bindings.iter().position(Option::is_none) {
            Some(leaf) => Err(Error::UnconnectedLeaf { group, leaf }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdk::{CellProvider, ReferencePdk};

    fn params() -> TreeParams {
        TreeParams::from_config(&ShuttleConfig::default())
    }

    #[test]
    fn depth_four_tree_has_sixteen_ordered_leaves() {
        let mut lib = Library::new();
        let splitter = lib.add_cell(ReferencePdk.cell("ybranch_te1310").unwrap());
        let tree = build_tree(&mut lib, 4, splitter, &params()).unwrap();

        let cell = lib.cell(tree.cell);
        assert_eq!(cell.instances().count(), 15);
        assert_eq!(cell.elements().count(), 14);
        assert_eq!(tree.leaves.len(), 16);
        assert_eq!(tree.input.position(), Point::new(0, 0));
        assert_eq!(tree.input.facing(), Rotation::R180);
        assert!(tree
            .leaves
            .windows(2)
            .all(|w| w[0].position().y < w[1].position().y));
        assert!(tree.leaves.iter().all(|l| l.facing() == Rotation::R0));
        assert_eq!(
            cell.try_port("leaf0").unwrap().position(),
            Point::new(165_000, -210_000 - 2_750)
        );
        for elem in cell.elements() {
            let layir::Element::Shape(shape) = elem else {
                panic!("tree should only contain waveguide shapes");
            };
            assert!(shape.shape().path().unwrap().is_manhattan());
        }
    }

    #[test]
    fn unsupported_depths_emit_no_geometry() {
        let mut lib = Library::new();
        let splitter = lib.add_cell(ReferencePdk.cell("ybranch_te1310").unwrap());
        for depth in [0, 3, 5] {
            assert!(matches!(
                build_tree(&mut lib, depth, splitter, &params()),
                Err(Error::UnsupportedTreeDepth(d)) if d == depth
            ));
        }
        assert_eq!(lib.num_cells(), 1);
    }

    #[test]
    fn splitters_without_outputs_are_rejected() {
        let mut lib = Library::new();
        let terminator = lib.add_cell(ReferencePdk.cell("terminator_te1310").unwrap());
        assert!(matches!(
            build_tree(&mut lib, 4, terminator, &params()),
            Err(Error::MissingPort { .. })
        ));
    }

    #[test]
    fn every_leaf_ends_bound() {
        for k in 0..=16 {
            let plan = assign_leaves(16, k);
            let mut assignment = LeafAssignment::new(16);
            for (leaf, target) in plan.iter().enumerate() {
                assignment.bind(leaf, *target);
            }
            assignment.verify(0).unwrap();
            for (leaf, binding) in assignment.bindings().iter().enumerate() {
                let expected = if leaf < k {
                    LeafTarget::Design(leaf)
                } else {
                    LeafTarget::Terminator
                };
                assert_eq!(*binding, Some(expected));
            }
        }

        let mut partial = LeafAssignment::new(16);
        for leaf in (0..16).filter(|&l| l != 9) {
            partial.bind(leaf, LeafTarget::Terminator);
        }
        assert!(matches!(
            partial.verify(2),
            Err(Error::UnconnectedLeaf { group: 2, leaf: 9 })
        ));
    }
}
