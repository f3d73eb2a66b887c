use geometry::prelude::{Point, Rect, Rotation, Transformation};
use test_log::test;

use crate::clip::clip;
use crate::connectivity::{Netlist, NetlistError};
use crate::copy::{import_tree, CopyCache};
use crate::hierarchy::{HierarchyError, HierarchyIndex, InstanceRef};
use crate::*;

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
enum Layer {
    Core,
    Text,
}

fn rect_cell(name: &str, rect: Rect) -> Cell<Layer> {
    let mut cell = Cell::new(name);
    cell.add_element(Shape::new(Layer::Core, rect));
    cell
}

fn two_port(name: &str) -> Cell<Layer> {
    let mut cell = rect_cell(name, Rect::from_sides(0, -5, 100, 5));
    cell.add_port(
        "in",
        Port::new(PortKind::Optical, Point::new(0, 0), Rotation::R180, 10),
    );
    cell.add_port(
        "out",
        Port::new(PortKind::Optical, Point::new(100, 0), Rotation::R0, 10),
    );
    cell
}

fn io(name: &str) -> Cell<Layer> {
    let mut cell = rect_cell(name, Rect::from_sides(-20, -10, 0, 10));
    cell.add_port(
        "opt1",
        Port::new(PortKind::Optical, Point::new(0, 0), Rotation::R0, 10),
    );
    cell.add_port(
        "io",
        Port::new(PortKind::OpticalIo, Point::new(-10, 0), Rotation::R180, 10),
    );
    cell
}

#[test]
fn duplicate_cell_names_are_suffixed() {
    let mut lib = Library::<Layer>::new();
    let a = lib.add_cell(Cell::new("design"));
    let b = lib.add_cell(Cell::new("design"));
    let c = lib.add_cell(Cell::new("design"));
    assert_eq!(lib.cell(a).name(), "design");
    assert_eq!(lib.cell(b).name(), "design_1");
    assert_eq!(lib.cell(c).name(), "design_2");
    assert_eq!(lib.try_cell_id_named("design_1"), Some(b));
}

#[test]
fn duplicate_instance_names_are_suffixed() {
    let mut lib = Library::<Layer>::new();
    let leaf = lib.add_cell(Cell::new("leaf"));
    let mut top: Cell<Layer> = Cell::new("top");
    top.add_instance(Instance::new(leaf, "x"));
    top.add_instance(Instance::new(leaf, "x"));
    let names: Vec<_> = top.instances().map(|(_, i)| i.name().to_string()).collect();
    assert_eq!(names, ["x", "x_1"]);
}

#[test]
fn bbox_includes_transformed_children() {
    let mut lib = Library::new();
    let leaf = lib.add_cell(rect_cell("leaf", Rect::from_sides(0, 0, 10, 20)));
    let mut top = rect_cell("top", Rect::from_sides(0, 0, 5, 5));
    top.add_instance(Instance::with_transformation(
        leaf,
        "leaf",
        Transformation::from_parts(Point::new(100, 0), Rotation::R90, false),
    ));
    let top = lib.add_cell(top);
    assert_eq!(lib.bbox(top), Some(Rect::from_sides(0, 0, 100, 10)));
    assert_eq!(lib.top_cells(), vec![top]);
}

#[test]
fn nested_transform_matches_sequential_application() {
    let mut lib = Library::<Layer>::new();
    let a = lib.add_cell(Cell::new("A"));
    let mut b = Cell::new("B");
    let a_in_b = b.add_instance(Instance::with_transformation(
        a,
        "a",
        Transformation::from_parts(Point::new(0, 50), Rotation::R0, true),
    ));
    let b = lib.add_cell(b);
    let mut top = Cell::new("Top");
    top.add_instance(Instance::with_transformation(
        b,
        "b",
        Transformation::from_parts(Point::new(100, 0), Rotation::R90, false),
    ));
    lib.add_cell(top);

    let index = HierarchyIndex::new(&lib);
    let abs = index
        .absolute_transform(InstanceRef {
            parent: b,
            instance: a_in_b,
        })
        .unwrap();
    let t1 = Transformation::from_parts(Point::new(100, 0), Rotation::R90, false);
    let t2 = Transformation::from_parts(Point::new(0, 50), Rotation::R0, true);
    let local = Point::new(10, 10);
    assert_eq!(abs.apply(local), t1.apply(t2.apply(local)));
    assert_eq!(abs.apply(local), Point::new(60, 10));
    assert_eq!(index.cell_transform(a).unwrap(), abs);
}

#[test]
fn duplicate_instantiation_is_ambiguous() {
    let mut lib = Library::<Layer>::new();
    let leaf = lib.add_cell(Cell::new("leaf"));
    let mut mid = Cell::new("mid");
    let inst = mid.add_instance(Instance::new(leaf, "leaf"));
    let mid = lib.add_cell(mid);
    let mut top = Cell::new("top");
    top.add_instance(Instance::new(mid, "m0"));
    top.add_instance(Instance::with_transformation(
        mid,
        "m1",
        Transformation::translate(500, 0),
    ));
    lib.add_cell(top);

    let index = HierarchyIndex::new(&lib);
    let err = index
        .absolute_transform(InstanceRef {
            parent: mid,
            instance: inst,
        })
        .unwrap_err();
    assert_eq!(
        err,
        HierarchyError::AmbiguousInstantiation {
            cell: "mid".into(),
            sites: 2
        }
    );
}

#[test]
fn cycles_are_detected() {
    let mut lib = Library::<Layer>::new();
    let a = lib.add_cell(Cell::new("a"));
    let mut b = Cell::new("b");
    b.add_instance(Instance::new(a, "a"));
    let b = lib.add_cell(b);
    let a_inst = lib.cell_mut(a).add_instance(Instance::new(b, "b"));

    let index = HierarchyIndex::new(&lib);
    let err = index
        .absolute_transform(InstanceRef {
            parent: a,
            instance: a_inst,
        })
        .unwrap_err();
    assert!(matches!(err, HierarchyError::CyclicHierarchy { .. }));
    assert!(matches!(
        index.cell_transform(a),
        Err(HierarchyError::CyclicHierarchy { .. })
    ));
}

#[test]
fn import_tree_deduplicates_by_name() {
    let mut src = Library::new();
    let leaf = src.add_cell(rect_cell("leaf", Rect::from_sides(0, 0, 1, 1)));
    let mut top = Cell::new("top");
    top.add_instance(Instance::new(leaf, "l0"));
    top.add_instance(Instance::with_transformation(
        leaf,
        "l1",
        Transformation::translate(2, 0),
    ));
    let top = src.add_cell(top);

    let mut dest = Library::new();
    let mut cache = CopyCache::new();
    let first = import_tree(&src, top, &mut dest, &mut cache);
    let second = import_tree(&src, top, &mut dest, &mut cache);
    assert_eq!(first, second);
    assert_eq!(dest.num_cells(), 2);
    assert_eq!(cache.len(), 2);
    assert_eq!(dest.bbox(first), Some(Rect::from_sides(0, 0, 3, 1)));
}

#[test]
fn clip_cuts_straddling_children_and_shares_inner_ones() {
    let mut lib = Library::new();
    let inner = lib.add_cell(rect_cell("inner", Rect::from_sides(0, 0, 10, 10)));
    let wide = lib.add_cell(rect_cell("wide", Rect::from_sides(0, 0, 1000, 10)));
    let mut top = Cell::new("top");
    top.add_instance(Instance::new(inner, "inner"));
    top.add_instance(Instance::with_transformation(
        wide,
        "wide",
        Transformation::translate(0, 20),
    ));
    top.add_element(Text::with_transformation(
        Layer::Text,
        "outside",
        Transformation::translate(900, 0),
    ));
    let top = lib.add_cell(top);

    let clipped = clip(&mut lib, top, Rect::from_sides(0, 0, 100, 100));
    assert!(clipped.modified);
    assert_eq!(lib.bbox(clipped.cell), Some(Rect::from_sides(0, 0, 100, 30)));
    let cell = lib.cell(clipped.cell);
    assert_eq!(cell.try_instance_named("inner").unwrap().child(), inner);
    assert_ne!(cell.try_instance_named("wide").unwrap().child(), wide);
    assert!(lib.find_text(&Layer::Text, "outside").is_some());
    assert_eq!(cell.elements().count(), 0);

    let untouched = clip(&mut lib, inner, Rect::from_sides(-5, -5, 50, 50));
    assert!(!untouched.modified);
    assert_eq!(untouched.cell, inner);
}

#[test]
fn netlist_joins_facing_pins() {
    let mut lib = Library::new();
    let gc = lib.add_cell(io("gc"));
    let wg = lib.add_cell(two_port("wg"));
    let mut top = Cell::new("top");
    top.add_instance(Instance::new(gc, "gc_in"));
    top.add_instance(Instance::new(wg, "wg"));
    top.add_instance(Instance::with_transformation(
        gc,
        "gc_out",
        Transformation::from_parts(Point::new(100, 0), Rotation::R180, false),
    ));
    top.add_instance(Instance::with_transformation(
        gc,
        "gc_spare",
        Transformation::translate(0, 500),
    ));
    let top = lib.add_cell(top);

    let netlist = Netlist::build(&lib, top).unwrap();
    assert_eq!(netlist.components().len(), 4);
    assert_eq!(netlist.nets().len(), 2);
    assert_eq!(netlist.reachable_from(0), vec![0, 1, 2]);
    assert_eq!(netlist.neighbors(3), Vec::<usize>::new());

    let near = netlist
        .nearest_pin(Point::new(-12, 3), PortKind::OpticalIo)
        .unwrap();
    assert_eq!(netlist.pins()[near].component, 0);
}

#[test]
fn netlist_rejects_cells_without_components() {
    let mut lib = Library::new();
    let shapes = lib.add_cell(rect_cell("shapes", Rect::from_sides(0, 0, 1, 1)));
    let mut top = Cell::new("top");
    top.add_instance(Instance::new(shapes, "s"));
    let top = lib.add_cell(top);
    assert_eq!(
        Netlist::build(&lib, top),
        Err(NetlistError::NoComponents { cell: "top".into() })
    );
}

#[test]
fn netlist_rejects_crowded_junctions() {
    let mut lib = Library::new();
    let wg = lib.add_cell(two_port("wg"));
    let mut top = Cell::new("top");
    for i in 0..3 {
        top.add_instance(Instance::with_transformation(
            wg,
            arcstr::format!("wg{i}"),
            Transformation::rotate(Rotation::all()[i]),
        ));
    }
    let top = lib.add_cell(top);
    assert!(matches!(
        Netlist::build(&lib, top),
        Err(NetlistError::CrowdedJunction { count: 3, .. })
    ));
}

#[test]
fn scale_rounds_to_nearest_unit() {
    let mut lib = Library::with_dbu(0.0001);
    let mut cell = rect_cell("c", Rect::from_sides(0, 0, 15, 25));
    cell.add_port(
        "p",
        Port::new(PortKind::Optical, Point::new(15, 0), Rotation::R0, 5),
    );
    let id = lib.add_cell(cell);
    lib.scale(1, 10).unwrap();
    assert_eq!(lib.bbox(id), Some(Rect::from_sides(0, 0, 2, 3)));
    assert_eq!(lib.cell(id).try_port("p").unwrap().position(), Point::new(2, 0));
    assert!((lib.dbu() - 0.001).abs() < 1e-12);
}

#[test]
fn failed_scaling_leaves_the_library_untouched() {
    let mut lib = Library::with_dbu(0.001);
    let id = lib.add_cell(rect_cell("c", Rect::from_sides(0, 0, i64::MAX / 2, 10)));
    let before = lib.clone();

    assert_eq!(
        lib.scale(1, 0),
        Err(ScaleError::InvalidRatio { num: 1, den: 0 })
    );
    assert_eq!(
        lib.scale(0, 7),
        Err(ScaleError::InvalidRatio { num: 0, den: 7 })
    );
    assert!(matches!(lib.scale(4, 1), Err(ScaleError::Overflow { num: 4, den: 1, .. })));
    assert_eq!(lib, before);
    assert_eq!(lib.bbox(id), Some(Rect::from_sides(0, 0, i64::MAX / 2, 10)));
}

#[test]
fn texts_are_found_by_layer_and_string() {
    let mut lib = Library::new();
    let mut cell = rect_cell("c", Rect::from_sides(0, 0, 10, 10));
    cell.add_element(Text::new(Layer::Text, "a"));
    cell.add_element(Text::new(Layer::Core, "b"));
    cell.add_element(Text::new(Layer::Text, "b"));
    let id = lib.add_cell(cell);

    let layer = Layer::Text;
    let found = lib.find_text(&layer, "b").unwrap();
    assert_eq!(found.cell, id);
    assert_eq!(found.text.layer(), &Layer::Text);
    assert_eq!(found.text.text(), "b");
    assert!(lib.find_text(&layer, "c").is_none());
    assert_eq!(lib.texts(&Layer::Core).count(), 1);
}
