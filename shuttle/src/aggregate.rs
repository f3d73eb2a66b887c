//! The aggregation pipeline.

use arcstr::ArcStr;
use chrono::{Local, NaiveDateTime};
use geometry::prelude::*;
use indexmap::IndexMap;
use layir::{Cell, CellId, Instance, Library, Port, PortKind, Shape, Text};

use crate::config::ShuttleConfig;
use crate::course::Course;
use crate::error::{Error, Result};
use crate::ingest::{ingest, Design, Ingested, LASER_PORT};
use crate::issues::{Cause, Issue, IssueSet};
use crate::layer::LayerSpec;
use crate::pdk::CellRegistry;
use crate::placement::{place_reporting, Slot};
use crate::route::{connect_cell, plan_lanes, route, route_turtles, LaneEnds, LaneParams, Turtle};
use crate::source::LayoutSource;
use crate::tree::{
    assign_leaves, build_tree, check_depth, port_of, LeafAssignment, LeafTarget, SplitterTree,
    TreeParams, INPUT_PORT,
};

/// The output port of the laser cell.
pub const LASER_OUTPUT_PORT: &str = "opt1";
/// The input port of the terminator cell.
pub const TERMINATOR_PORT: &str = "pin1";

/// A design and where it ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedDesign {
    pub design: Design,
    pub slot: Slot,
    /// The laser group and tree leaf feeding this design, if any.
    pub feed: Option<(usize, usize)>,
}

/// One laser and the splitter tree it drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaserGroup {
    pub index: usize,
    /// Placement of the laser cell in the top cell.
    pub laser: Transformation,
    /// Placement of the tree cell in the top cell.
    pub tree: Transformation,
    pub assignment: LeafAssignment,
}

/// The result of an aggregation run.
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub library: Library<LayerSpec>,
    pub top: CellId,
    pub designs: Vec<PlacedDesign>,
    pub groups: Vec<LaserGroup>,
    pub issues: IssueSet<Issue>,
}

/// Merges submitted designs onto one canvas.
#[derive(Debug)]
pub struct Aggregator {
    cfg: ShuttleConfig,
    registry: CellRegistry,
    timestamp: NaiveDateTime,
}

impl Aggregator {
    /// Creates an aggregator stamped with the current local time.
    pub fn new(cfg: ShuttleConfig, registry: CellRegistry) -> Self {
        Self {
            cfg,
            registry,
            timestamp: Local::now().naive_local(),
        }
    }

    /// Sets the time recorded in the merge stamp.
    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// The name of the cell recording when the merge ran.
    pub fn stamp(&self) -> ArcStr {
        arcstr::format!(".merged:{}", self.timestamp.format("%Y-%m-%d-%H:%M:%S"))
    }

    /// Runs the pipeline over every design in `source`.
    ///
    /// The configuration and the required cells are checked before anything
    /// is loaded.
    pub fn run(&self, source: &dyn LayoutSource) -> Result<Aggregate> {
        let cfg = &self.cfg;
        let _span = tracing::info_span!("aggregate", top = %cfg.top_cell).entered();
        check_depth(cfg.tree.depth)?;
        cfg.validate()?;
        let [splitter, laser, terminator] =
            [&cfg.cells.splitter, &cfg.cells.laser, &cfg.cells.terminator]
                .map(|name| self.registry.cell(name));
        let (splitter, laser, terminator) = (splitter?, laser?, terminator?);
        let laser_out = port_of(&laser, LASER_OUTPUT_PORT)?;
        port_of(&terminator, TERMINATOR_PORT)?;

        let mut lib = Library::with_dbu(cfg.dbu);
        let mut issues = IssueSet::new();
        let top = lib.add_cell(Cell::new(cfg.top_cell.clone()));
        let mut buckets = IndexMap::with_capacity(Course::ALL.len());
        for course in Course::ALL {
            let bucket = lib.add_cell(Cell::new(course.bucket_name()));
            add_child(&mut lib, top, bucket, Transformation::identity());
            buckets.insert(course, bucket);
        }
        let stamp_name = self.stamp();
        let mut stamp = Cell::new(stamp_name.clone());
        stamp.add_element(Text::new(cfg.layers.text, stamp_name));
        let stamp = lib.add_cell(stamp);
        add_child(&mut lib, top, stamp, Transformation::identity());

        let mut designs = Vec::new();
        for entry in source.entries()? {
            let src = source.load(&entry)?;
            match ingest(cfg, &entry, src, &mut lib, &mut issues)? {
                Ingested::Design(design) => designs.push(design),
                Ingested::Fixed { cell, trans } => add_child(&mut lib, top, cell, trans),
                Ingested::Skipped => {}
            }
        }

        let sizes: Vec<Option<Dims>> = designs.iter().map(|d| Some(d.content)).collect();
        let slots = place_reporting(&sizes, &cfg.canvas, &mut issues)?;
        let mut placed: Vec<PlacedDesign> = designs
            .into_iter()
            .zip(slots)
            .map(|(design, slot)| PlacedDesign {
                design,
                slot,
                feed: None,
            })
            .collect();
        for p in &placed {
            let bucket = buckets.get(&p.design.course).copied().unwrap_or(top);
            add_child(
                &mut lib,
                bucket,
                p.design.cell,
                Transformation::from_offset(p.slot.origin()),
            );
        }

        let leaves = cfg
            .tree
            .leaves()
            .ok_or(Error::UnsupportedTreeDepth(cfg.tree.depth))?;
        let capacity = cfg.lasers.count.saturating_mul(leaves);
        if placed.len() > capacity {
            issues.warn(Cause::UnconnectedDesigns {
                count: placed.len() - capacity,
                capacity,
            });
        }

        let terminator_cell = terminator.clone();
        let splitter = lib.add_cell(splitter);
        let laser = lib.add_cell(laser);
        let terminator = lib.add_cell(terminator);
        let params = TreeParams::from_config(cfg);
        let frames = (0..cfg.lasers.count)
            .map(|index| GroupFrame::new(&mut lib, cfg, index, splitter, &laser_out, &params))
            .collect::<Result<Vec<_>>>()?;

        let connected = placed.len().min(capacity);
        let mut ports = Vec::with_capacity(connected);
        let mut ends = Vec::with_capacity(connected);
        for (n, p) in placed[..connected].iter().enumerate() {
            let port = port_of(lib.cell(p.design.cell), LASER_PORT)?
                .transform(Transformation::from_offset(p.slot.origin()));
            ends.push(LaneEnds {
                leaf: frames[n / leaves].leaf(n % leaves).position(),
                port: port.position(),
                column: p.slot.column,
                top: p.slot.rect.top(),
            });
            ports.push(port);
        }
        let lanes = plan_lanes(&ends, &cfg.routing)?;

        let builder = GroupBuilder {
            cfg,
            top,
            laser,
            terminator,
            terminator_cell: &terminator_cell,
        };
        let mut groups = Vec::with_capacity(frames.len());
        for frame in &frames {
            let _span = tracing::info_span!("laser_group", group = frame.index).entered();
            let first = (frame.index * leaves).min(connected);
            let members = first..(first + leaves).min(connected);
            let group = builder.build(
                &mut lib,
                frame,
                &ports[members.clone()],
                &lanes[members.clone()],
                &mut placed[members],
            )?;
            groups.push(group);
        }

        tracing::info!(
            designs = placed.len(),
            groups = groups.len(),
            warnings = issues.num_warnings(),
            "aggregation complete"
        );
        Ok(Aggregate {
            library: lib,
            top,
            designs: placed,
            groups,
            issues,
        })
    }
}

/// Instantiates `child` in `parent`, naming the instance after the child.
fn add_child(lib: &mut Library<LayerSpec>, parent: CellId, child: CellId, trans: Transformation) {
    let name = lib.cell(child).name().clone();
    lib.cell_mut(parent)
        .add_instance(Instance::with_transformation(child, name, trans));
}

/// A laser and its splitter tree, placed but not yet wired.
struct GroupFrame {
    index: usize,
    /// Placement of the laser cell in the top cell.
    laser: Transformation,
    /// The laser output in top-cell coordinates.
    out: Port,
    /// This group's own tree cell.
    tree: SplitterTree,
    /// Placement of the tree cell in the top cell.
    placement: Transformation,
}

impl GroupFrame {
    fn new(
        lib: &mut Library<LayerSpec>,
        cfg: &ShuttleConfig,
        index: usize,
        splitter: CellId,
        laser_out: &Port,
        params: &TreeParams,
    ) -> Result<Self> {
        let laser = Transformation::translate(
            cfg.lasers.x,
            cfg.lasers.y + index as i64 * cfg.lasers.spacing,
        );
        let out = laser_out.transform(laser);
        let gap = out.facing().unit();
        let anchor = Port::new(
            PortKind::Optical,
            out.position() + Point::new(gap.x * cfg.lasers.tree_gap, gap.y * cfg.lasers.tree_gap),
            out.facing(),
            out.width(),
        );
        let tree = build_tree(lib, cfg.tree.depth, splitter, params)?;
        let placement = connect_cell(&anchor, lib.cell(tree.cell), INPUT_PORT)?;
        Ok(Self {
            index,
            laser,
            out,
            tree,
            placement,
        })
    }

    /// Leaf `i` in top-cell coordinates.
    fn leaf(&self, i: usize) -> Port {
        self.tree.leaves[i].transform(self.placement)
    }
}

struct GroupBuilder<'a> {
    cfg: &'a ShuttleConfig,
    top: CellId,
    laser: CellId,
    terminator: CellId,
    terminator_cell: &'a Cell<LayerSpec>,
}

impl GroupBuilder<'_> {
    fn add_waveguide(&self, lib: &mut Library<LayerSpec>, path: Path) {
        lib.cell_mut(self.top)
            .add_element(Shape::new(self.cfg.layers.waveguide, path));
    }

    /// Wires one laser group. `ports`, `lanes` and `members` describe the
    /// designs fed by this group, in leaf order.
    fn build(
        &self,
        lib: &mut Library<LayerSpec>,
        frame: &GroupFrame,
        ports: &[Port],
        lanes: &[LaneParams],
        members: &mut [PlacedDesign],
    ) -> Result<LaserGroup> {
        let cfg = self.cfg;
        let index = frame.index;
        let width = cfg.routing.waveguide_width;

        lib.cell_mut(self.top).add_instance(Instance::with_transformation(
            self.laser,
            arcstr::format!("laser{index}"),
            frame.laser,
        ));
        lib.cell_mut(self.top).add_instance(Instance::with_transformation(
            frame.tree.cell,
            arcstr::format!("tree{index}"),
            frame.placement,
        ));
        let feed = route_turtles(
            &frame.out,
            &frame.tree.input.transform(frame.placement),
            &Turtle::default(),
            &Turtle::default(),
            cfg.routing.bend_radius,
        )?;
        self.add_waveguide(lib, feed.to_path(width));

        let leaves = frame.tree.leaves.len();
        let mut assignment = LeafAssignment::new(leaves);
        for (leaf, target) in assign_leaves(leaves, members.len()).into_iter().enumerate() {
            let from = frame.leaf(leaf);
            match target {
                LeafTarget::Design(j) => {
                    let design = &mut members[j];
                    let route = route(&from, &ports[j], &lanes[j])?;
                    tracing::debug!(
                        leaf,
                        design = %design.design.file,
                        lane = lanes[j].lane,
                        length = route.length(),
                        "routed leaf to design"
                    );
                    self.add_waveguide(lib, route.to_path(width));
                    design.feed = Some((index, leaf));
                }
                LeafTarget::Terminator => {
                    let trans = connect_cell(&from, self.terminator_cell, TERMINATOR_PORT)?;
                    lib.cell_mut(self.top).add_instance(Instance::with_transformation(
                        self.terminator,
                        arcstr::format!("term{index}_{leaf}"),
                        trans,
                    ));
                }
            }
            assignment.bind(leaf, target);
        }
        assignment.verify(index)?;
        tracing::info!(
            group = index,
            designs = members.len(),
            terminated = leaves - members.len(),
            "connected laser group"
        );

        Ok(LaserGroup {
            index,
            laser: frame.laser,
            tree: frame.placement,
            assignment,
        })
    }
}
