//! Run configuration.
//!
//! A [`ShuttleConfig`] is usually read from a TOML file. Every section and
//! every field is optional; omitted values take the defaults of the
//! Shuksan 2025-02 run.
//!
//! ```toml
//! top_cell = "Shuksan_2025_02"
//!
//! [tree]
//! depth = 4
//!
//! [lasers]
//! count = 2
//!
//! [[canvas.cutouts]]
//! name = "tr"
//! policy = "skip_column"
//! rect = { p0 = { x = 7037000, y = 8494000 }, p1 = { x = 8650000, y = 8780000 } }
//! ```

use std::path::Path;
use std::sync::Arc;

use arcstr::ArcStr;
use geometry::prelude::*;
use serde::{Deserialize, Serialize};

use crate::course::Course;
use crate::error::ConfigError;
use crate::layer::LayerSpec;
use crate::placement::Canvas;

/// The only supported splitter tree depth.
pub const SUPPORTED_TREE_DEPTH: usize = 4;
/// The smallest database unit accepted, in microns.
pub const MIN_DBU: f64 = 1e-6;

/// The complete configuration of an aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShuttleConfig {
    /// The name of the merged top cell.
    pub top_cell: ArcStr,
    /// The required database unit, in microns.
    pub dbu: f64,
    pub canvas: Canvas,
    pub tree: TreeConfig,
    pub lasers: LaserConfig,
    pub routing: RoutingConfig,
    pub layers: LayerConfig,
    pub cells: CellNames,
    /// Designs that are placed at fixed positions instead of in a slot.
    pub framework: Vec<FixedPlacement>,
}

/// Splitter tree geometry.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub depth: usize,
    /// Horizontal distance between splitter levels.
    pub level_pitch: i64,
    /// Vertical distance between adjacent leaves.
    pub leaf_pitch: i64,
}

/// Laser sources, one per group of `2^depth` designs.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaserConfig {
    pub count: usize,
    /// Position of the first laser's output port.
    pub x: i64,
    pub y: i64,
    /// Vertical distance between consecutive lasers.
    pub spacing: i64,
    /// Straight waveguide length between a laser and its tree.
    pub tree_gap: i64,
}

/// Lane routing parameters.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Distance between adjacent lanes.
    pub pitch: i64,
    pub bend_radius: i64,
    /// Clearance between the westmost design channel and the lane risers
    /// beside the splitter trees.
    pub escape: i64,
    pub waveguide_width: i64,
    /// Height of a design's `opt_laser` port above the slot origin.
    pub port_offset: i64,
}

/// Layer assignments and filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Layer holding labels and stamps.
    pub text: LayerSpec,
    /// Electron-microscope inspection layer.
    pub sem: LayerSpec,
    /// Layer for routed waveguides.
    pub waveguide: LayerSpec,
    /// Layers kept from submitted designs.
    pub keep: Vec<LayerSpec>,
    /// Courses whose designs keep the SEM layer.
    pub sem_courses: Vec<Course>,
}

/// Names of the cells requested from the cell provider.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellNames {
    pub splitter: ArcStr,
    pub laser: ArcStr,
    pub terminator: ArcStr,
}

/// A design placed at a fixed transformation when its file name contains `pattern`.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct FixedPlacement {
    pub pattern: String,
    #[serde(default)]
    pub mirror: bool,
    /// Counterclockwise rotation in degrees. Must be a multiple of 90.
    #[serde(default)]
    pub rotation: i64,
    #[serde(default)]
    pub x: i64,
    #[serde(default)]
    pub y: i64,
}

impl FixedPlacement {
    /// The transformation placing the design.
    pub fn transformation(&self) -> Result<Transformation, ConfigError> {
        let rotation = Rotation::from_degrees(self.rotation).ok_or(ConfigError::OutOfRange {
            field: "framework.rotation",
            requirement: "a multiple of 90",
        })?;
        Ok(Transformation::from_parts(
            Point::new(self.x, self.y),
            rotation,
            self.mirror,
        ))
    }

    /// Returns `true` if this placement applies to `file_name`.
    pub fn matches(&self, file_name: &str) -> bool {
        file_name.contains(&self.pattern)
    }
}

impl Default for ShuttleConfig {
    fn default() -> Self {
        Self {
            top_cell: arcstr::literal!("Shuksan_2025_02"),
            dbu: layir::DEFAULT_DBU,
            canvas: Canvas::default(),
            tree: TreeConfig::default(),
            lasers: LaserConfig::default(),
            routing: RoutingConfig::default(),
            layers: LayerConfig::default(),
            cells: CellNames::default(),
            framework: vec![
                FixedPlacement {
                    pattern: "Framework_2023".to_string(),
                    mirror: true,
                    rotation: 180,
                    x: 0,
                    y: 0,
                },
                FixedPlacement {
                    pattern: "UBC_static.oas".to_string(),
                    mirror: false,
                    rotation: 0,
                    x: 8_780_000,
                    y: 8_780_000,
                },
            ],
        }
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            depth: SUPPORTED_TREE_DEPTH,
            level_pitch: 50_000,
            leaf_pitch: 60_000,
        }
    }
}

impl Default for LaserConfig {
    fn default() -> Self {
        Self {
            count: 3,
            x: 1_000_000,
            y: 2_000_000,
            spacing: 2_000_000,
            tree_gap: 10_000,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            pitch: 8_000,
            bend_radius: 5_000,
            escape: 100_000,
            waveguide_width: 350,
            port_offset: 10_000,
        }
    }
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            text: LayerSpec::new(10, 0),
            sem: LayerSpec::new(200, 0),
            waveguide: LayerSpec::new(1, 0),
            keep: [
                (1, 0),
                (1, 2),
                (1, 10),
                (6, 0),
                (10, 0),
                (11, 0),
                (68, 0),
                (81, 0),
                (99, 0),
                (100, 0),
                (101, 0),
                (201, 0),
                (998, 0),
            ]
            .into_iter()
            .map(|(layer, datatype)| LayerSpec::new(layer, datatype))
            .collect(),
            sem_courses: vec![Course::EdX, Course::Elec413, Course::SiepicPassives],
        }
    }
}

impl Default for CellNames {
    fn default() -> Self {
        Self {
            splitter: arcstr::literal!("ybranch_te1310"),
            laser: arcstr::literal!("laser_1310nm_DFB_BB"),
            terminator: arcstr::literal!("terminator_te1310"),
        }
    }
}

impl TreeConfig {
    /// The number of leaves, and so of designs fed by one laser.
    ///
    /// `None` if the count does not fit in a `usize`.
    #[inline]
    pub fn leaves(&self) -> Option<usize> {
        u32::try_from(self.depth)
            .ok()
            .and_then(|depth| 1usize.checked_shl(depth))
    }
}

impl LayerConfig {
    /// Returns `true` if designs of `course` keep the SEM layer.
    pub fn allows_sem(&self, course: Course) -> bool {
        self.sem_courses.contains(&course)
    }
}

impl ShuttleConfig {
    /// Parses a configuration from TOML.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reads a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source: Arc::new(source),
        })?;
        Self::from_toml_str(&s)
    }

    /// Serializes the configuration to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// The number of designs that can be connected to a laser.
    pub fn capacity(&self) -> Option<usize> {
        self.lasers.count.checked_mul(self.tree.leaves()?)
    }

    /// Checks settings that cannot be expressed in the types.
    ///
    /// The tree depth is checked separately by [`crate::tree::check_depth`],
    /// which reports it as [`crate::error::Error::UnsupportedTreeDepth`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn require(ok: bool, field: &'static str, requirement: &'static str) -> Result<(), ConfigError> {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange { field, requirement })
            }
        }
        let canvas = &self.canvas;
        require(self.dbu >= MIN_DBU, "dbu", "at least 1e-6 microns")?;
        require(
            canvas.slot.w() > 0 && canvas.slot.h() > 0,
            "canvas.slot",
            "positive in both dimensions",
        )?;
        require(canvas.column_gap >= 0, "canvas.column_gap", "non-negative")?;
        require(canvas.row_gap >= 0, "canvas.row_gap", "non-negative")?;
        require(canvas.width > 0, "canvas.width", "positive")?;
        require(canvas.height > 0, "canvas.height", "positive")?;
        require(
            canvas.first_column_height <= canvas.height,
            "canvas.first_column_height",
            "at most canvas.height",
        )?;
        require(self.routing.pitch > 0, "routing.pitch", "positive")?;
        require(self.routing.bend_radius > 0, "routing.bend_radius", "positive")?;
        require(
            self.routing.waveguide_width > 0,
            "routing.waveguide_width",
            "positive",
        )?;
        require(self.routing.escape > 0, "routing.escape", "positive")?;
        let rows = std::cmp::max(canvas.first_column_height, canvas.height) / canvas.slot_pitch() + 1;
        let widest = rows
            .checked_mul(self.routing.pitch)
            .and_then(|w| w.checked_add(self.routing.bend_radius));
        require(
            widest.is_some_and(|w| w < canvas.column_pitch()),
            "routing.pitch",
            "small enough that a full column of lanes fits between adjacent columns",
        )?;
        if self.tree.leaves().is_some() {
            require(
                self.capacity().is_some(),
                "lasers.count",
                "small enough that the design capacity is representable",
            )?;
        }
        require(self.tree.level_pitch > 0, "tree.level_pitch", "positive")?;
        require(self.tree.leaf_pitch > 0, "tree.leaf_pitch", "positive")?;
        for fixed in &self.framework {
            fixed.transformation()?;
        }
        Ok(())
    }
}
