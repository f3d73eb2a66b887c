//! Where submitted designs come from.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use arcstr::ArcStr;
use chrono::{DateTime, Local, NaiveDateTime};
use layir::Library;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layer::LayerSpec;

/// A candidate design file.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct LayoutEntry {
    /// The file name, including its extension.
    pub name: ArcStr,
    pub path: PathBuf,
    /// The last-modified time. Used only to label the design.
    pub modified: NaiveDateTime,
}

impl LayoutEntry {
    /// The label appended to the design's cell name.
    pub fn date_label(&self) -> String {
        self.modified.format("%Y%m%d_%H%M").to_string()
    }
}

/// Enumerates and loads design files.
pub trait LayoutSource {
    /// All entries, in a stable order.
    fn entries(&self) -> Result<Vec<LayoutEntry>>;
    /// Loads the layout of one entry.
    fn load(&self, entry: &LayoutEntry) -> Result<Library<LayerSpec>>;
}

/// A persisted layout: a library and the name of its root cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutDocument {
    pub top: ArcStr,
    pub library: Library<LayerSpec>,
}

/// Reads [`LayoutDocument`]s from JSON files.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutReader;

impl LayoutReader {
    /// The file extension this reader accepts.
    pub const EXTENSION: &'static str = "json";

    pub fn read(&self, path: impl AsRef<Path>) -> Result<LayoutDocument> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| Error::LayoutFormat {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Returns `true` if `path` looks like a file this reader accepts.
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(Self::EXTENSION))
    }
}

/// Design files found directly inside one or more directories.
///
/// Entries from each directory are sorted by file name; directories are
/// listed in the order given, so framework files can be placed after the
/// submissions.
#[derive(Debug, Clone, Default)]
pub struct DirectorySource {
    dirs: Vec<PathBuf>,
    reader: LayoutReader,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_dirs([dir.into()])
    }

    pub fn with_dirs(dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            dirs: dirs.into_iter().collect(),
            reader: LayoutReader,
        }
    }
}

fn modified(path: &Path) -> Result<NaiveDateTime> {
    let time = std::fs::metadata(path)?.modified()?;
    Ok(DateTime::<Local>::from(time).naive_local())
}

impl LayoutSource for DirectorySource {
    fn entries(&self) -> Result<Vec<LayoutEntry>> {
        let mut out = Vec::new();
        for dir in &self.dirs {
            let mut found = BTreeMap::new();
            for entry in std::fs::read_dir(dir)? {
                let path = entry?.path();
                if !path.is_file() || !self.reader.accepts(&path) {
                    continue;
                }
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    tracing::warn!(?path, "skipping file with a non-UTF-8 name");
                    continue;
                };
                found.insert(ArcStr::from(name), path.clone());
            }
            for (name, path) in found {
                out.push(LayoutEntry {
                    modified: modified(&path)?,
                    name,
                    path,
                });
            }
        }
        Ok(out)
    }

    fn load(&self, entry: &LayoutEntry) -> Result<Library<LayerSpec>> {
        Ok(self.reader.read(&entry.path)?.library)
    }
}

/// A source backed by libraries held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    designs: Vec<(LayoutEntry, Library<LayerSpec>)>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a design with the given file name and timestamp.
    pub fn add(
        &mut self,
        name: impl Into<ArcStr>,
        modified: NaiveDateTime,
        library: Library<LayerSpec>,
    ) -> &mut Self {
        let name = name.into();
        self.designs.push((
            LayoutEntry {
                path: PathBuf::from(name.as_str()),
                name,
                modified,
            },
            library,
        ));
        self
    }
}

impl LayoutSource for InMemorySource {
    fn entries(&self) -> Result<Vec<LayoutEntry>> {
        Ok(self.designs.iter().map(|(entry, _)| entry.clone()).collect())
    }

    fn load(&self, entry: &LayoutEntry) -> Result<Library<LayerSpec>> {
        self.designs
            .iter()
            .find(|(e, _)| e == entry)
            .map(|(_, lib)| lib.clone())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no design named {}", entry.name),
                )
                .into()
            })
    }
}
