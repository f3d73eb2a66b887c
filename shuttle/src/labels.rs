//! Measurement labels and measurement data lookup.
//!
//! A measurement label is a text on the label layer of the form
//! `opt_in_<polarization>_<wavelength>_<kind>_<device>_<params...>`, placed
//! at the fiber coupler that the test setup aligns to.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use arcstr::ArcStr;
use geometry::prelude::*;
use layir::hierarchy::{HierarchyError, HierarchyIndex};
use layir::Library;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ingest::LABEL_PREFIX;

/// Extension of measurement data files.
pub const DATA_EXTENSION: &str = "mat";

/// A parsed measurement label.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct MeasurementLabel {
    /// The full label text.
    pub text: ArcStr,
    pub polarization: ArcStr,
    pub wavelength: ArcStr,
    pub kind: ArcStr,
    pub device: ArcStr,
    pub params: Vec<ArcStr>,
    /// The absolute position of the label, if known.
    pub position: Option<Point>,
}

impl MeasurementLabel {
    /// Parses a label, returning [`None`] if `text` is not a measurement label.
    ///
    /// # Example
    ///
    /// ```
    /// # use shuttle::labels::MeasurementLabel;
    /// let label = MeasurementLabel::parse("opt_in_TE_1550_device_LukasChrostowski_MZI1").unwrap();
    /// assert_eq!(label.polarization, "TE");
    /// assert_eq!(label.wavelength, "1550");
    /// assert_eq!(label.device, "LukasChrostowski");
    /// assert_eq!(label.params, ["MZI1"]);
    /// assert_eq!(label.data_key(), "LukasChrostowski_MZI1");
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.strip_prefix(LABEL_PREFIX)?.strip_prefix('_')?;
        let mut parts = rest.split('_');
        let mut next = || parts.next().filter(|s| !s.is_empty()).map(ArcStr::from);
        let polarization = next()?;
        let wavelength = next()?;
        let kind = next()?;
        let device = next()?;
        let params = parts.map(ArcStr::from).collect();
        Some(Self {
            text: text.into(),
            polarization,
            wavelength,
            kind,
            device,
            params,
            position: None,
        })
    }

    /// The folder-name prefix under which this label's data is stored.
    pub fn data_key(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(|p| p.as_str()).collect();
        format!("{}_{}", self.device, params.join("_"))
            .trim_matches('_')
            .to_string()
    }
}

/// Every measurement label on `layer`, with absolute positions.
pub fn find_measurement_labels<L: PartialEq>(
    lib: &Library<L>,
    layer: &L,
) -> std::result::Result<Vec<MeasurementLabel>, HierarchyError> {
    let index = HierarchyIndex::new(lib);
    let mut out = Vec::new();
    for found in lib.texts(layer) {
        let Some(mut label) = MeasurementLabel::parse(found.text.text()) else {
            continue;
        };
        let abs = index.cell_transform(found.cell)?;
        label.position = Some(abs.apply(found.text.position()));
        out.push(label);
    }
    Ok(out)
}

/// Data files matched to one label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataMatch {
    pub label: MeasurementLabel,
    pub files: Vec<PathBuf>,
}

/// Maps labels to measurement files under `dir`.
///
/// Every directory below `dir` (and `dir` itself) whose name starts with a
/// label's [data key](MeasurementLabel::data_key) contributes the data files
/// directly inside it. Labels with no data are absent from the result.
pub fn match_files(
    dir: impl AsRef<Path>,
    labels: &[MeasurementLabel],
) -> Result<BTreeMap<String, DataMatch>> {
    let mut dirs = Vec::new();
    collect_dirs(dir.as_ref(), &mut dirs)?;

    let mut matches = BTreeMap::new();
    for d in &dirs {
        let Some(name) = d.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        for label in labels {
            let key = label.data_key();
            if !name.starts_with(&key) {
                continue;
            }
            let files = data_files(d)?;
            if files.is_empty() {
                continue;
            }
            tracing::debug!(%key, dir = ?d, count = files.len(), "matched data files");
            matches
                .entry(key)
                .or_insert_with(|| DataMatch {
                    label: label.clone(),
                    files: Vec::new(),
                })
                .files
                .extend(files);
        }
    }
    tracing::info!(count = matches.len(), "matched labels to data");
    Ok(matches)
}

fn collect_dirs(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    out.push(dir.to_path_buf());
    let mut children = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            children.push(path);
        }
    }
    children.sort();
    for child in children {
        collect_dirs(&child, out)?;
    }
    Ok(())
}

fn data_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == DATA_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_incomplete_labels() {
        assert!(MeasurementLabel::parse("opt_in_TE_1550").is_none());
        assert!(MeasurementLabel::parse("opt_out_TE_1550_device_a").is_none());
        assert!(MeasurementLabel::parse("opt_in_TE__device_a").is_none());
        let bare = MeasurementLabel::parse("opt_in_TM_1310_device_alice").unwrap();
        assert!(bare.params.is_empty());
        assert_eq!(bare.data_key(), "alice");
    }
}
