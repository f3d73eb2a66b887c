//! Cell providers.
//!
//! The aggregation core never draws splitters, lasers, or terminators
//! itself. It asks a [`CellProvider`] for them by name through a
//! [`CellRegistry`], which must be bound before any cell is requested.

use arcstr::ArcStr;
use geometry::prelude::*;
use layir::{Cell, Port, PortKind, Shape};

use crate::error::{Error, ProviderError, Result};
use crate::layer::LayerSpec;

/// A source of named physical cells.
pub trait CellProvider: Send + Sync {
    /// Returns a fresh copy of the cell called `name`.
    fn cell(&self, name: &str) -> std::result::Result<Cell<LayerSpec>, ProviderError>;
}

/// Holds the active [`CellProvider`], if any.
#[derive(Default)]
pub enum CellRegistry {
    /// No provider is bound. Every request fails.
    #[default]
    Unbound,
    /// Requests go to the contained provider.
    Bound(Box<dyn CellProvider>),
}

impl std::fmt::Debug for CellRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbound => write!(f, "CellRegistry::Unbound"),
            Self::Bound(_) => write!(f, "CellRegistry::Bound(..)"),
        }
    }
}

impl CellRegistry {
    /// Creates a registry bound to `provider`.
    pub fn bound(provider: impl CellProvider + 'static) -> Self {
        Self::Bound(Box::new(provider))
    }

    /// Binds `provider`, replacing any previous one.
    pub fn bind(&mut self, provider: impl CellProvider + 'static) {
        *self = Self::bound(provider);
    }

    /// Unbinds the current provider.
    pub fn unbind(&mut self) {
        *self = Self::Unbound;
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound(_))
    }

    /// Requests a cell from the bound provider.
    pub fn cell(&self, name: &str) -> Result<Cell<LayerSpec>> {
        match self {
            Self::Unbound => Err(Error::ProviderUnbound),
            Self::Bound(provider) => provider.cell(name).map_err(|source| Error::MissingCell {
                name: name.into(),
                source,
            }),
        }
    }
}

/// Device layer of the reference cells.
pub const SILICON: LayerSpec = LayerSpec::new(1, 0);
/// Outline layer of black-box reference cells.
pub const DEVBOX: LayerSpec = LayerSpec::new(998, 0);

/// Port width of the reference cells.
pub const WAVEGUIDE_WIDTH: i64 = 350;

/// A built-in provider with simplified stand-ins for the 1310 nm library.
///
/// Cell outlines and port positions match the real cells; interiors are
/// single rectangles.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferencePdk;

impl ReferencePdk {
    /// Names of every cell this provider can build.
    pub const CELLS: [&'static str; 4] = [
        "ybranch_te1310",
        "laser_1310nm_DFB_BB",
        "terminator_te1310",
        "GC_Air_te1310_BB",
    ];
}

fn port(kind: PortKind, x: i64, y: i64, facing: Rotation) -> Port {
    Port::new(kind, Point::new(x, y), facing, WAVEGUIDE_WIDTH)
}

fn boxed(name: &str, layer: LayerSpec, rect: Rect) -> Cell<LayerSpec> {
    let mut cell = Cell::new(ArcStr::from(name));
    cell.add_element(Shape::new(layer, rect));
    cell
}

impl CellProvider for ReferencePdk {
    fn cell(&self, name: &str) -> std::result::Result<Cell<LayerSpec>, ProviderError> {
        let cell = match name {
            "ybranch_te1310" => {
                let mut cell = boxed(name, SILICON, Rect::from_sides(0, -3_000, 15_000, 3_000));
                cell.add_port("opt1", port(PortKind::Optical, 0, 0, Rotation::R180));
                cell.add_port("opt2", port(PortKind::Optical, 15_000, 2_750, Rotation::R0));
                cell.add_port("opt3", port(PortKind::Optical, 15_000, -2_750, Rotation::R0));
                cell
            }
            "laser_1310nm_DFB_BB" => {
                let mut cell = boxed(name, DEVBOX, Rect::from_sides(-400_000, -50_000, 0, 50_000));
                cell.add_port("opt1", port(PortKind::Optical, 0, 0, Rotation::R0));
                cell
            }
            "terminator_te1310" => {
                let mut cell = boxed(name, SILICON, Rect::from_sides(0, -1_000, 10_000, 1_000));
                cell.add_port("pin1", port(PortKind::Optical, 0, 0, Rotation::R180));
                cell
            }
            "GC_Air_te1310_BB" => {
                let mut cell = boxed(name, DEVBOX, Rect::from_sides(-30_000, -10_000, 0, 10_000));
                cell.add_port("opt1", port(PortKind::Optical, 0, 0, Rotation::R0));
                cell.add_port("fiber", port(PortKind::OpticalIo, -15_000, 0, Rotation::R180));
                cell
            }
            _ => return Err(ProviderError::CellNotFound),
        };
        Ok(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_registry_refuses_requests() {
        let mut registry = CellRegistry::default();
        assert!(matches!(
            registry.cell("ybranch_te1310"),
            Err(Error::ProviderUnbound)
        ));
        registry.bind(ReferencePdk);
        assert!(registry.is_bound());
        for name in ReferencePdk::CELLS {
            assert_eq!(registry.cell(name).unwrap().name(), name);
        }
        assert!(matches!(
            registry.cell("mmi_2x2"),
            Err(Error::MissingCell { source: ProviderError::CellNotFound, .. })
        ));
        registry.unbind();
        assert!(!registry.is_bound());
    }

    #[test]
    fn splitter_outputs_face_away_from_input() {
        let ybranch = ReferencePdk.cell("ybranch_te1310").unwrap();
        let input = ybranch.try_port("opt1").unwrap();
        for out in ["opt2", "opt3"] {
            assert_eq!(ybranch.try_port(out).unwrap().facing(), input.facing().reversed());
        }
    }
}
