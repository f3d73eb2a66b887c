//! Loading one submitted design into the merged library.

use std::collections::BTreeSet;

use arcstr::ArcStr;
use geometry::prelude::*;
use layir::clip::clip;
use layir::copy::{import_tree, CopyCache};
use layir::{Cell, CellId, Element, Instance, Library, Port, PortKind, Text};

use crate::config::{ShuttleConfig, MIN_DBU};
use crate::course::Course;
use crate::error::{Error, Result};
use crate::issues::{Cause, Issue, IssueSet};
use crate::layer::LayerSpec;
use crate::source::LayoutEntry;

/// The port on every design cell that the splitter tree feeds.
pub const LASER_PORT: &str = "opt_laser";

/// Prefix of tool stamps moved to the design's file cell.
const TOOL_STAMP_PREFIX: &str = "SiEPIC-Tools";
/// Prefix of measurement labels.
pub const LABEL_PREFIX: &str = "opt_in";

/// A design ready to be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Design {
    /// The source file name.
    pub file: ArcStr,
    pub course: Course,
    /// The file cell in the merged library. Its lower-left corner is the origin.
    pub cell: CellId,
    /// The clipped content size.
    pub content: Dims,
    /// Measurement labels found in the design.
    pub labels: Vec<ArcStr>,
}

/// The outcome of ingesting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingested {
    /// A design to be placed in a slot.
    Design(Design),
    /// A framework layout placed at a fixed transformation in the top cell.
    Fixed { cell: CellId, trans: Transformation },
    /// Nothing usable; the reason has been recorded as an issue.
    Skipped,
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.abs()
}

/// The scale factor `num / den` converting coordinates in `found` database
/// units to `expected` ones, or `None` if the units agree.
fn dbu_ratio(found: f64, expected: f64) -> Option<(i64, i64)> {
    let a = (found * 1e10).round() as i64;
    let b = (expected * 1e10).round() as i64;
    if a == b {
        return None;
    }
    let g = gcd(a, b);
    Some((a / g, b / g))
}

/// Picks the design cell among the library's top cells.
fn choose_top(
    src: &Library<LayerSpec>,
    file: &ArcStr,
    issues: &mut IssueSet<Issue>,
) -> Option<CellId> {
    let tops = src.top_cells();
    match tops.len() {
        0 => {
            issues.warn(Cause::NoTopCell { file: file.clone() });
            None
        }
        1 => Some(tops[0]),
        _ => {
            issues.warn(Cause::MultipleTopCells {
                file: file.clone(),
                names: tops.iter().map(|id| src.cell(*id).name().clone()).collect(),
            });
            tops.into_iter()
                .find(|id| src.cell(*id).name().eq_ignore_ascii_case("top"))
        }
    }
}

/// Removes every element not on an allowed layer.
fn filter_layers(src: &mut Library<LayerSpec>, allowed: &BTreeSet<LayerSpec>) {
    let ids: Vec<CellId> = src.cells().map(|(id, _)| id).collect();
    let present: BTreeSet<LayerSpec> = src
        .cells()
        .flat_map(|(_, cell)| cell.elements().map(|e| *e.layer()))
        .collect();
    for layer in &present {
        if allowed.contains(layer) {
            tracing::debug!(%layer, "loading layer");
        } else {
            tracing::debug!(%layer, "deleting layer");
        }
    }
    for id in ids {
        src.cell_mut(id)
            .retain_elements(|elem| allowed.contains(elem.layer()));
    }
}

/// Cleans up the text layer, returning the tool stamps removed from it and
/// the measurement labels left on it.
fn clean_text_layer(src: &mut Library<LayerSpec>, text: LayerSpec) -> (Vec<ArcStr>, Vec<ArcStr>) {
    let ids: Vec<CellId> = src.cells().map(|(id, _)| id).collect();
    let mut stamps = Vec::new();
    let mut labels = Vec::new();
    for id in ids {
        let cell = src.cell_mut(id);
        cell.retain_elements(|elem| *elem.layer() != text || elem.text().is_some());
        for elem in cell.extract_elements(|elem| {
            *elem.layer() == text
                && elem
                    .text()
                    .is_some_and(|t| t.text().starts_with(TOOL_STAMP_PREFIX))
        }) {
            if let Element::Text(t) = elem {
                stamps.push(t.text().clone());
            }
        }
        for elem in cell.elements() {
            if let Some(t) = elem.text() {
                if *t.layer() == text && t.text().starts_with(LABEL_PREFIX) {
                    tracing::info!(label = %t.text(), "measurement label");
                    labels.push(t.text().clone());
                }
            }
        }
    }
    (stamps, labels)
}

/// Loads the design in `src` into `dest`.
///
/// Non-fatal problems are recorded in `issues`. The returned design cell is
/// not yet instantiated anywhere.
pub fn ingest(
    cfg: &ShuttleConfig,
    entry: &LayoutEntry,
    mut src: Library<LayerSpec>,
    dest: &mut Library<LayerSpec>,
    issues: &mut IssueSet<Issue>,
) -> Result<Ingested> {
    let file = entry.name.clone();
    let course = Course::classify(&file);
    tracing::info!(%file, date = %entry.date_label(), %course, "loading design");

    if !(src.dbu() >= MIN_DBU) {
        return Err(Error::LayoutFormat {
            path: entry.path.clone(),
            message: format!("database unit {} is below {MIN_DBU}", src.dbu()),
        });
    }
    if let Some((num, den)) = dbu_ratio(src.dbu(), cfg.dbu) {
        issues.warn(Cause::DbuRescaled {
            file: file.clone(),
            found: src.dbu().to_string(),
            expected: cfg.dbu.to_string(),
        });
        src.scale(num, den).map_err(|e| Error::LayoutFormat {
            path: entry.path.clone(),
            message: e.to_string(),
        })?;
    }

    let Some(top) = choose_top(&src, &file, issues) else {
        return Ok(Ingested::Skipped);
    };
    tracing::info!(top = %src.cell(top).name(), "top cell");
    let cell_name = arcstr::format!("{}_{}", file, entry.date_label());

    if let Some(fixed) = cfg.framework.iter().find(|f| f.matches(&file)) {
        let trans = fixed.transformation()?;
        let design = import_tree(&src, top, dest, &mut CopyCache::new());
        let mut wrapper = Cell::new(cell_name);
        wrapper.add_instance(Instance::new(design, src.cell(top).name().clone()));
        let cell = dest.add_cell(wrapper);
        tracing::info!(%file, %trans, "placing framework layout");
        return Ok(Ingested::Fixed { cell, trans });
    }

    if src.bbox(top).is_none() {
        issues.warn(Cause::EmptyLayout { file });
        return Ok(Ingested::Skipped);
    }

    let mut allowed: BTreeSet<LayerSpec> = cfg.layers.keep.iter().copied().collect();
    if cfg.layers.allows_sem(course) {
        allowed.insert(cfg.layers.sem);
    }
    filter_layers(&mut src, &allowed);
    let (stamps, labels) = clean_text_layer(&mut src, cfg.layers.text);

    let Some(bbox) = src.bbox(top) else {
        issues.warn(Cause::EmptyLayout { file });
        return Ok(Ingested::Skipped);
    };
    tracing::info!(%bbox, "bounding box");
    let slot = cfg.canvas.slot;
    let region = Rect::from_sides(
        bbox.left(),
        bbox.bot(),
        bbox.left() + slot.w(),
        bbox.bot() + slot.h(),
    );
    let clipped = clip(&mut src, top, region);
    let after = src.bbox(clipped.cell);
    if clipped.modified {
        issues.warn(Cause::Clipped {
            file: file.clone(),
            before: bbox,
            after,
        });
    }
    let Some(after) = after else {
        issues.warn(Cause::EmptyLayout { file });
        return Ok(Ingested::Skipped);
    };

    let design = import_tree(&src, clipped.cell, dest, &mut CopyCache::new());
    let mut cell = Cell::new(cell_name);
    for stamp in stamps {
        cell.add_element(Text::new(cfg.layers.text, stamp));
    }
    cell.add_instance(Instance::with_transformation(
        design,
        src.cell(top).name().clone(),
        Transformation::translate(-bbox.left(), -bbox.bot()),
    ));
    cell.add_port(
        LASER_PORT,
        Port::new(
            PortKind::Optical,
            Point::new(0, cfg.routing.port_offset),
            Rotation::R180,
            cfg.routing.waveguide_width,
        ),
    );
    let cell = dest.add_cell(cell);

    Ok(Ingested::Design(Design {
        file,
        course,
        cell,
        content: Dims::new(
            after.right() - bbox.left(),
            after.top() - bbox.bot(),
        ),
        labels,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dbu_ratio_is_reduced() {
        assert_eq!(dbu_ratio(0.001, 0.001), None);
        assert_eq!(dbu_ratio(0.005, 0.001), Some((5, 1)));
        assert_eq!(dbu_ratio(0.0001, 0.001), Some((1, 10)));
        assert_eq!(dbu_ratio(0.00025, 0.001), Some((1, 4)));
    }
}
