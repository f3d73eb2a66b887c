//! A generic layout IR.
//!
//! A [`Library`] owns a set of uniquely named [`Cell`]s. Cells own their
//! elements (shapes and text), their [`Port`]s, and the [`Instance`]s of other
//! cells placed inside them. The layer type `L` is left to the caller.
//!
//! Cells are never removed from a library once added.

pub mod clip;
pub mod connectivity;
pub mod copy;
pub mod hierarchy;
pub mod id;
mod names;

#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};

use arcstr::ArcStr;
use geometry::bbox::{Bbox, BoundingUnion};
use geometry::path::Path;
use geometry::point::Point;
use geometry::rect::Rect;
use geometry::transform::{Rotation, Transform, TransformMut, Transformation};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::id::Id;
use crate::names::Names;

pub struct Cells;

// The reason this uses [`Cells`] instead of [`Cell`]
// is because `Cell` has a generic type parameter.
pub type CellId = Id<Cells>;
pub type InstanceId = Id<Instance>;

/// Microns per database unit when nothing else is specified.
pub const DEFAULT_DBU: f64 = 0.001;

/// A collection of uniquely named cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library<L> {
    dbu: f64,
    cell_id: CellId,
    cells: IndexMap<CellId, Cell<L>>,
    name_map: HashMap<ArcStr, CellId>,
    names: Names<CellId>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Cell<L> {
    name: ArcStr,
    instance_id: InstanceId,
    instances: IndexMap<InstanceId, Instance>,
    instance_name_map: HashMap<ArcStr, InstanceId>,
    instance_names: Names<InstanceId>,
    elements: Vec<Element<L>>,
    ports: IndexMap<ArcStr, Port>,
}

/// A location at which this cell should be connected.
///
/// A port sits at `position` and faces outward along `facing`: a route
/// leaving the port heads in the `facing` direction, and a route entering
/// it arrives heading the opposite way.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Port {
    kind: PortKind,
    position: Point,
    facing: Rotation,
    width: i64,
}

/// The kind of signal a port carries.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Default, Serialize, Deserialize)]
pub enum PortKind {
    /// An on-chip optical connection.
    #[default]
    Optical,
    /// An optical input/output to the outside world, such as a grating coupler.
    OpticalIo,
    /// An electrical connection.
    Electrical,
}

/// An error constructing a [`Port`].
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum PortError {
    /// The facing is not a multiple of 90 degrees.
    #[error("port facing of {0} degrees is not Manhattan")]
    NonManhattanFacing(i64),
    /// The width is negative.
    #[error("port width {0} is negative")]
    NegativeWidth(i64),
}

/// An error rescaling a [`Library`].
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum ScaleError {
    /// The scale factor is zero, negative, or has a zero denominator.
    #[error("scale factor {num}/{den} is not a positive ratio")]
    InvalidRatio { num: i64, den: i64 },
    /// A scaled coordinate does not fit in a database unit count.
    #[error("coordinate {value} overflows when scaled by {num}/{den}")]
    Overflow { value: i64, num: i64, den: i64 },
}

/// A primitive layout element.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Element<L> {
    /// A primitive layout shape.
    Shape(Shape<L>),
    /// A primitive text annotation.
    Text(Text<L>),
}

/// A primitive layout shape consisting of a layer and a geometric shape.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Shape<L> {
    layer: L,
    shape: geometry::shape::Shape,
}

/// A primitive text annotation consisting of a layer, string, and location.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Text<L> {
    layer: L,
    text: ArcStr,
    trans: Transformation,
}

#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    child: CellId,
    name: ArcStr,
    trans: Transformation,
}

/// A text annotation found by [`Library::find_text`].
#[derive(Debug)]
pub struct TextMatch<'a, L> {
    /// The cell that directly contains the text.
    pub cell: CellId,
    /// The text itself, in the coordinates of `cell`.
    pub text: &'a Text<L>,
}

impl<L> Clone for TextMatch<'_, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L> Copy for TextMatch<'_, L> {}

impl<L> Default for Library<L> {
    fn default() -> Self {
        Self {
            dbu: DEFAULT_DBU,
            cell_id: Id::new(),
            names: Default::default(),
            name_map: Default::default(),
            cells: Default::default(),
        }
    }
}

impl<L> Library<L> {
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates an empty library with the given database unit, in microns.
    pub fn with_dbu(dbu: f64) -> Self {
        Self {
            dbu,
            ..Default::default()
        }
    }

    /// Microns per database unit.
    #[inline]
    pub fn dbu(&self) -> f64 {
        self.dbu
    }

    /// Adds a cell, renaming it if its name is already taken.
    pub fn add_cell(&mut self, mut cell: Cell<L>) -> CellId {
        let id = self.cell_id.alloc();
        cell.name = self.names.assign_name(id, &cell.name);
        self.name_map.insert(cell.name.clone(), id);
        self.cells.insert(id, cell);
        id
    }

    /// Gets the cell with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the cell does not belong to this library.
    pub fn cell(&self, id: CellId) -> &Cell<L> {
        &self.cells[&id]
    }

    /// Gets the cell with the given ID mutably.
    ///
    /// # Panics
    ///
    /// Panics if the cell does not belong to this library.
    pub fn cell_mut(&mut self, id: CellId) -> &mut Cell<L> {
        &mut self.cells[&id]
    }

    pub fn try_cell(&self, id: CellId) -> Option<&Cell<L>> {
        self.cells.get(&id)
    }

    pub fn try_cell_named(&self, name: &str) -> Option<&Cell<L>> {
        self.try_cell(*self.name_map.get(name)?)
    }

    /// Gets the cell ID corresponding to the given name.
    pub fn try_cell_id_named(&self, name: &str) -> Option<CellId> {
        self.name_map.get(name).copied()
    }

    /// Iterates over the `(id, cell)` pairs in this library.
    pub fn cells(&self) -> impl Iterator<Item = (CellId, &Cell<L>)> {
        self.cells.iter().map(|(id, cell)| (*id, cell))
    }

    /// The number of cells in this library.
    #[inline]
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Cells that are not instantiated by any other cell, in insertion order.
    pub fn top_cells(&self) -> Vec<CellId> {
        let children: HashSet<CellId> = self
            .cells
            .values()
            .flat_map(|cell| cell.instances.values().map(|inst| inst.child))
            .collect();
        self.cells
            .keys()
            .copied()
            .filter(|id| !children.contains(id))
            .collect()
    }

    /// The bounding box of a cell, including everything it instantiates.
    ///
    /// Text annotations do not contribute to the bounding box.
    pub fn bbox(&self, id: CellId) -> Option<Rect> {
        self.bbox_memo(id, &mut HashMap::new(), &mut HashSet::new())
    }

    fn bbox_memo(
        &self,
        id: CellId,
        memo: &mut HashMap<CellId, Option<Rect>>,
        stack: &mut HashSet<CellId>,
    ) -> Option<Rect> {
        if let Some(bbox) = memo.get(&id) {
            return *bbox;
        }
        if !stack.insert(id) {
            return None;
        }
        let cell = self.cell(id);
        let mut bbox = cell.local_bbox();
        for inst in cell.instances.values() {
            let child = self
                .bbox_memo(inst.child, memo, stack)
                .map(|rect| rect.transform(inst.trans));
            bbox = bbox.bounding_union(&child);
        }
        stack.remove(&id);
        memo.insert(id, bbox);
        bbox
    }

    /// Finds the first text annotation on `layer` whose string is exactly `text`.
    ///
    /// Cells are searched in insertion order.
    pub fn find_text<'a>(&'a self, layer: &'a L, text: &str) -> Option<TextMatch<'a, L>>
    where
        L: PartialEq,
    {
        self.texts(layer).find(|m| m.text.text() == text)
    }

    /// Iterates over every text annotation on `layer`, cell by cell.
    pub fn texts<'a>(&'a self, layer: &'a L) -> impl Iterator<Item = TextMatch<'a, L>> + 'a
    where
        L: PartialEq,
    {
        self.cells().flat_map(move |(id, cell)| {
            cell.elements().filter_map(move |elem| match elem {
                Element::Text(text) if text.layer() == layer => Some(TextMatch { cell: id, text }),
                _ => None,
            })
        })
    }

    /// Multiplies every coordinate in the library by `num / den`,
    /// rounding to the nearest database unit.
    ///
    /// Used to move a library to a different database unit. The library is
    /// left untouched if any coordinate would overflow.
    pub fn scale(&mut self, num: i64, den: i64) -> Result<(), ScaleError>
    where
        L: Clone,
    {
        if num <= 0 || den <= 0 {
            return Err(ScaleError::InvalidRatio { num, den });
        }
        let s = |v: i64| -> Result<i64, ScaleError> {
            let n = v as i128 * num as i128;
            let d = den as i128;
            let q = n.div_euclid(d);
            let r = n.rem_euclid(d);
            let rounded = if 2 * r >= d { q + 1 } else { q };
            i64::try_from(rounded).map_err(|_| ScaleError::Overflow { value: v, num, den })
        };
        let sp = |p: Point| -> Result<Point, ScaleError> { Ok(Point::new(s(p.x)?, s(p.y)?)) };
        let st = |t: Transformation| -> Result<Transformation, ScaleError> {
            Ok(Transformation::from_parts(
                sp(t.offset_point())?,
                t.rotation(),
                t.mirror(),
            ))
        };
        let mut cells = self.cells.clone();
        for cell in cells.values_mut() {
            for elem in cell.elements.iter_mut() {
                match elem {
                    Element::Shape(shape) => {
                        shape.shape = match &shape.shape {
                            geometry::shape::Shape::Rect(r) => {
                                Rect::new(sp(r.lower_left())?, sp(r.upper_right())?).into()
                            }
                            geometry::shape::Shape::Path(p) => Path::new(
                                p.points()
                                    .iter()
                                    .copied()
                                    .map(sp)
                                    .collect::<Result<Vec<_>, _>>()?,
                                s(p.width())?,
                            )
                            .into(),
                        };
                    }
                    Element::Text(text) => text.trans = st(text.trans)?,
                }
            }
            for inst in cell.instances.values_mut() {
                inst.trans = st(inst.trans)?;
            }
            for port in cell.ports.values_mut() {
                port.position = sp(port.position)?;
                port.width = s(port.width)?;
            }
        }
        self.cells = cells;
        self.dbu = self.dbu * den as f64 / num as f64;
        Ok(())
    }
}

impl<L> Cell<L> {
    pub fn new(name: impl Into<ArcStr>) -> Self {
        Self {
            name: name.into(),
            instance_id: Id::new(),
            instances: Default::default(),
            instance_name_map: Default::default(),
            instance_names: Default::default(),
            elements: Default::default(),
            ports: Default::default(),
        }
    }

    /// The name of the cell.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// Iterate over the ports of this cell.
    #[inline]
    pub fn ports(&self) -> impl Iterator<Item = (&ArcStr, &Port)> {
        self.ports.iter()
    }

    pub fn add_port(&mut self, name: impl Into<ArcStr>, port: Port) {
        self.ports.insert(name.into(), port);
    }

    /// Get a port of this cell by name.
    #[inline]
    pub fn try_port(&self, name: &str) -> Option<&Port> {
        self.ports.get(name)
    }

    /// Get the instance associated with the given ID.
    #[inline]
    pub fn try_instance(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(&id)
    }

    /// Gets the instance with the given name.
    pub fn try_instance_named(&self, name: &str) -> Option<&Instance> {
        self.try_instance(*self.instance_name_map.get(name)?)
    }

    /// Add the given instance to the cell.
    ///
    /// If another instance in this cell already has the same name,
    /// the new instance is renamed.
    pub fn add_instance(&mut self, mut instance: Instance) -> InstanceId {
        let id = self.instance_id.alloc();
        instance.name = self.instance_names.assign_name(id, &instance.name);
        self.instance_name_map.insert(instance.name.clone(), id);
        self.instances.insert(id, instance);
        id
    }

    /// Iterate over the instances of this cell.
    #[inline]
    pub fn instances(&self) -> impl Iterator<Item = (InstanceId, &Instance)> {
        self.instances.iter().map(|x| (*x.0, x.1))
    }

    pub fn add_element(&mut self, element: impl Into<Element<L>>) {
        self.elements.push(element.into())
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element<L>> {
        self.elements.iter()
    }

    /// Keeps only the elements for which `f` returns `true`.
    pub fn retain_elements(&mut self, f: impl FnMut(&Element<L>) -> bool) {
        self.elements.retain(f);
    }

    /// Removes and returns the elements for which `f` returns `true`.
    pub fn extract_elements(&mut self, mut f: impl FnMut(&Element<L>) -> bool) -> Vec<Element<L>> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.elements)
            .into_iter()
            .partition(|elem| f(elem));
        self.elements = kept;
        taken
    }

    /// The bounding box of this cell's own shapes, ignoring instances.
    pub fn local_bbox(&self) -> Option<Rect> {
        self.elements.iter().fold(None, |acc, elem| match elem {
            Element::Shape(shape) => acc.bounding_union(&shape.shape.bbox()),
            Element::Text(_) => acc,
        })
    }
}

impl Port {
    /// Creates a new port.
    pub fn new(kind: PortKind, position: Point, facing: Rotation, width: i64) -> Self {
        Self {
            kind,
            position,
            facing,
            width,
        }
    }

    /// Creates a port from a facing angle in degrees, as provided by cell libraries.
    ///
    /// # Example
    ///
    /// ```
    /// # use layir::*;
    /// # use geometry::prelude::*;
    /// let port = Port::from_degrees(PortKind::Optical, Point::new(0, 0), 180, 500).unwrap();
    /// assert_eq!(port.facing(), Rotation::R180);
    /// assert!(Port::from_degrees(PortKind::Optical, Point::new(0, 0), 45, 500).is_err());
    /// ```
    pub fn from_degrees(
        kind: PortKind,
        position: Point,
        degrees: i64,
        width: i64,
    ) -> Result<Self, PortError> {
        let facing = Rotation::from_degrees(degrees).ok_or(PortError::NonManhattanFacing(degrees))?;
        if width < 0 {
            return Err(PortError::NegativeWidth(width));
        }
        Ok(Self::new(kind, position, facing, width))
    }

    #[inline]
    pub fn kind(&self) -> PortKind {
        self.kind
    }

    #[inline]
    pub fn position(&self) -> Point {
        self.position
    }

    #[inline]
    pub fn facing(&self) -> Rotation {
        self.facing
    }

    #[inline]
    pub fn width(&self) -> i64 {
        self.width
    }

    /// Returns `true` if a route can join `self` to `other` with no segment:
    /// same position, opposite facings.
    pub fn mates_with(&self, other: &Port) -> bool {
        self.position == other.position && self.facing == other.facing.reversed()
    }
}

impl TransformMut for Port {
    fn transform_mut(&mut self, trans: Transformation) {
        self.position = trans.apply(self.position);
        self.facing = trans.apply_heading(self.facing);
    }
}

impl<L> From<Shape<L>> for Element<L> {
    fn from(value: Shape<L>) -> Self {
        Self::Shape(value)
    }
}

impl<L> From<Text<L>> for Element<L> {
    fn from(value: Text<L>) -> Self {
        Self::Text(value)
    }
}

impl<L> Element<L> {
    /// The layer this element is drawn on.
    pub fn layer(&self) -> &L {
        match self {
            Element::Shape(shape) => shape.layer(),
            Element::Text(text) => text.layer(),
        }
    }

    /// Returns the text annotation, if this element is one.
    pub fn text(&self) -> Option<&Text<L>> {
        match self {
            Element::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl<L> TransformMut for Element<L> {
    fn transform_mut(&mut self, trans: Transformation) {
        match self {
            Element::Shape(shape) => shape.shape.transform_mut(trans),
            Element::Text(text) => text.trans = Transformation::cascade(trans, text.trans),
        }
    }
}

impl<L> Shape<L> {
    #[inline]
    pub fn new(layer: L, shape: impl Into<geometry::shape::Shape>) -> Self {
        Self {
            layer,
            shape: shape.into(),
        }
    }

    #[inline]
    pub fn layer(&self) -> &L {
        &self.layer
    }

    #[inline]
    pub fn shape(&self) -> &geometry::shape::Shape {
        &self.shape
    }
}

impl<L> Bbox for Shape<L> {
    fn bbox(&self) -> Option<Rect> {
        self.shape.bbox()
    }
}

impl<L> Text<L> {
    #[inline]
    pub fn new(layer: L, text: impl Into<ArcStr>) -> Self {
        Self {
            layer,
            text: text.into(),
            trans: Default::default(),
        }
    }

    #[inline]
    pub fn with_transformation(
        layer: L,
        text: impl Into<ArcStr>,
        trans: impl Into<Transformation>,
    ) -> Self {
        Self {
            layer,
            text: text.into(),
            trans: trans.into(),
        }
    }

    #[inline]
    pub fn layer(&self) -> &L {
        &self.layer
    }

    #[inline]
    pub fn text(&self) -> &ArcStr {
        &self.text
    }

    #[inline]
    pub fn transformation(&self) -> Transformation {
        self.trans
    }

    /// The anchor point of the text.
    #[inline]
    pub fn position(&self) -> Point {
        self.trans.offset_point()
    }
}

impl Instance {
    pub fn new(child: CellId, name: impl Into<ArcStr>) -> Self {
        Self {
            child,
            name: name.into(),
            trans: Default::default(),
        }
    }

    pub fn with_transformation(
        child: CellId,
        name: impl Into<ArcStr>,
        transformation: impl Into<Transformation>,
    ) -> Self {
        Self {
            child,
            name: name.into(),
            trans: transformation.into(),
        }
    }

    #[inline]
    pub fn child(&self) -> CellId {
        self.child
    }

    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    #[inline]
    pub fn transformation(&self) -> Transformation {
        self.trans
    }
}
