//! Persisting layouts.

use std::io::Write;
use std::path::{Path, PathBuf};

use arcstr::ArcStr;
use layir::{CellId, Library};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::layer::LayerSpec;

/// Persists a library under one of its cells.
pub trait Exporter {
    /// Writes `library` with `root` as its top cell, returning where it went.
    fn export(&self, library: &Library<LayerSpec>, root: CellId) -> Result<PathBuf>;
}

/// Writes `<root name>.json` into a directory.
#[derive(Debug, Clone)]
pub struct JsonExporter {
    dir: PathBuf,
}

impl JsonExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// The borrowed form of [`LayoutDocument`](crate::source::LayoutDocument).
#[derive(Serialize)]
struct DocumentRef<'a> {
    top: &'a ArcStr,
    library: &'a Library<LayerSpec>,
}

/// Replaces characters that are awkward in file names.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

impl Exporter for JsonExporter {
    fn export(&self, library: &Library<LayerSpec>, root: CellId) -> Result<PathBuf> {
        let top = library.cell(root).name();
        let path = self.dir.join(format!("{}.json", file_stem(top)));
        std::fs::create_dir_all(&self.dir)?;
        let doc = DocumentRef { top, library };
        let mut writer = std::io::BufWriter::new(std::fs::File::create(&path)?);
        serde_json::to_writer(&mut writer, &doc).map_err(|e| Error::LayoutFormat {
            path: path.clone(),
            message: e.to_string(),
        })?;
        writer.flush()?;
        tracing::info!(?path, cells = library.num_cells(), "exported layout");
        Ok(path)
    }
}
