//! Hierarchical clipping of a cell to a rectangular region.

use std::collections::HashMap;

use geometry::bbox::Bbox;
use geometry::rect::Rect;
use geometry::shape::Shape as GeoShape;
use geometry::transform::Transform;

use crate::{Cell, CellId, Element, Instance, Library, Shape};

/// The result of [`clip`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Clipped {
    /// The clipped cell. Equal to the input cell if nothing had to be cut.
    pub cell: CellId,
    /// Whether any geometry was removed or cut.
    pub modified: bool,
}

/// Restricts `cell` to the closed rectangle `region`.
///
/// Children that lie fully inside `region` are shared, not copied. Children
/// that straddle the boundary are clipped recursively into new cells. Path
/// segments crossing the boundary are converted to clipped rectangles. Text
/// and ports are kept if their anchor lies inside `region`.
pub fn clip<L: Clone>(lib: &mut Library<L>, cell: CellId, region: Rect) -> Clipped {
    let mut memo = HashMap::new();
    clip_inner(lib, cell, region, &mut memo)
}

fn clip_inner<L: Clone>(
    lib: &mut Library<L>,
    cell: CellId,
    region: Rect,
    memo: &mut HashMap<(CellId, Rect), Clipped>,
) -> Clipped {
    if let Some(clipped) = memo.get(&(cell, region)) {
        return *clipped;
    }
    let untouched = Clipped {
        cell,
        modified: false,
    };
    match lib.bbox(cell) {
        Some(bbox) if !region.contains_rect(bbox) => {}
        _ => {
            memo.insert((cell, region), untouched);
            return untouched;
        }
    }

    let source = lib.cell(cell).clone();
    let mut out = Cell::new(arcstr::format!("{}$CLIP", source.name()));

    for elem in source.elements() {
        match elem {
            Element::Shape(shape) => {
                for piece in clip_shape(shape.shape(), region) {
                    out.add_element(Shape::new(shape.layer().clone(), piece));
                }
            }
            Element::Text(text) => {
                if region.contains_point(text.position()) {
                    out.add_element(text.clone());
                }
            }
        }
    }

    for (_, inst) in source.instances() {
        let child_bbox = match lib.bbox(inst.child()) {
            Some(bbox) => bbox.transform(inst.transformation()),
            None => continue,
        };
        if region.intersection(child_bbox).is_none() {
            continue;
        }
        let child_region = region.transform(inst.transformation().inv());
        let child = clip_inner(lib, inst.child(), child_region, memo);
        out.add_instance(Instance::with_transformation(
            child.cell,
            inst.name().clone(),
            inst.transformation(),
        ));
    }

    for (name, port) in source.ports() {
        if region.contains_point(port.position()) {
            out.add_port(name.clone(), *port);
        }
    }

    let clipped = Clipped {
        cell: lib.add_cell(out),
        modified: true,
    };
    memo.insert((cell, region), clipped);
    clipped
}

fn clip_shape(shape: &GeoShape, region: Rect) -> Vec<GeoShape> {
    let Some(bbox) = shape.bbox() else {
        return Vec::new();
    };
    if region.contains_rect(bbox) {
        return vec![shape.clone()];
    }
    match shape {
        GeoShape::Rect(rect) => rect
            .intersection(region)
            .map(GeoShape::Rect)
            .into_iter()
            .collect(),
        GeoShape::Path(path) => {
            let half = path.width() / 2;
            path.segments()
                .filter_map(|(a, b)| Rect::new(a, b).expand_all(half).intersection(region))
                .map(GeoShape::Rect)
                .collect()
        }
    }
}
