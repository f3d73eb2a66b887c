//! Pin-level connectivity between the instances of a cell.
//!
//! Components are the direct instances of a cell whose child has ports.
//! Their ports, moved into the cell's frame, are the pins. Two pins from
//! different components form a net when they sit at the same point facing
//! each other.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use arcstr::ArcStr;
use geometry::point::Point;
use geometry::transform::{Rotation, Transform, Transformation};

use crate::{CellId, InstanceId, Library, PortKind};

/// An error building a [`Netlist`].
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum NetlistError {
    /// The cell has no instances with ports.
    #[error("cell `{cell}` has no components with pins")]
    NoComponents {
        /// The cell being analyzed.
        cell: ArcStr,
    },
    /// More than two pins meet at one point.
    #[error("cell `{cell}` has {count} pins meeting at {position}")]
    CrowdedJunction {
        /// The cell being analyzed.
        cell: ArcStr,
        /// Where the pins meet.
        position: Point,
        /// How many pins meet there.
        count: usize,
    },
}

/// A placed instance with pins.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Component {
    /// The instance in the analyzed cell.
    pub instance: InstanceId,
    /// The instance name.
    pub name: ArcStr,
    /// The instantiated cell.
    pub cell: CellId,
    /// The instance transformation within the analyzed cell.
    pub trans: Transformation,
    /// Indices into [`Netlist::pins`].
    pub pins: Vec<usize>,
}

/// A port of a component, in the analyzed cell's frame.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Pin {
    /// Index into [`Netlist::components`].
    pub component: usize,
    /// The port name on the component's cell.
    pub port: ArcStr,
    pub kind: PortKind,
    pub position: Point,
    pub facing: Rotation,
    /// Index into [`Netlist::nets`], if the pin is connected.
    pub net: Option<usize>,
}

/// A set of joined pins.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Net {
    /// Indices into [`Netlist::pins`].
    pub pins: Vec<usize>,
}

/// The component/net graph of one cell.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Netlist {
    cell: CellId,
    components: Vec<Component>,
    pins: Vec<Pin>,
    nets: Vec<Net>,
}

impl Netlist {
    /// Builds the netlist of `cell`.
    pub fn build<L>(lib: &Library<L>, cell: CellId) -> Result<Self, NetlistError> {
        let parent = lib.cell(cell);
        let mut components = Vec::new();
        let mut pins = Vec::new();

        for (instance, inst) in parent.instances() {
            let child = lib.cell(inst.child());
            if child.ports().next().is_none() {
                continue;
            }
            let component = components.len();
            let mut component_pins = Vec::new();
            for (name, port) in child.ports() {
                let placed = port.transform(inst.transformation());
                component_pins.push(pins.len());
                pins.push(Pin {
                    component,
                    port: name.clone(),
                    kind: placed.kind(),
                    position: placed.position(),
                    facing: placed.facing(),
                    net: None,
                });
            }
            components.push(Component {
                instance,
                name: inst.name().clone(),
                cell: inst.child(),
                trans: inst.transformation(),
                pins: component_pins,
            });
        }

        if components.is_empty() {
            return Err(NetlistError::NoComponents {
                cell: parent.name().clone(),
            });
        }

        // BTreeMap keeps net numbering independent of hash order.
        let mut by_position: BTreeMap<Point, Vec<usize>> = BTreeMap::new();
        for (i, pin) in pins.iter().enumerate() {
            by_position.entry(pin.position).or_default().push(i);
        }

        let mut nets = Vec::new();
        for (position, group) in by_position {
            match group.as_slice() {
                [_] => {}
                [a, b] => {
                    let (pa, pb) = (&pins[*a], &pins[*b]);
                    if pa.component != pb.component && pa.facing == pb.facing.reversed() {
                        let net = nets.len();
                        pins[*a].net = Some(net);
                        pins[*b].net = Some(net);
                        nets.push(Net {
                            pins: vec![*a, *b],
                        });
                    } else {
                        tracing::debug!(%position, "coincident pins do not face each other");
                    }
                }
                _ => {
                    return Err(NetlistError::CrowdedJunction {
                        cell: parent.name().clone(),
                        position,
                        count: group.len(),
                    })
                }
            }
        }

        Ok(Self {
            cell,
            components,
            pins,
            nets,
        })
    }

    /// The analyzed cell.
    #[inline]
    pub fn cell(&self) -> CellId {
        self.cell
    }

    #[inline]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    #[inline]
    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    #[inline]
    pub fn nets(&self) -> &[Net] {
        &self.nets
    }

    /// The nets touching `component`.
    pub fn component_nets(&self, component: usize) -> impl Iterator<Item = usize> + '_ {
        self.components[component]
            .pins
            .iter()
            .filter_map(|pin| self.pins[*pin].net)
    }

    /// Components sharing a net with `component`.
    pub fn neighbors(&self, component: usize) -> Vec<usize> {
        let mut out = Vec::new();
        for net in self.component_nets(component) {
            for pin in &self.nets[net].pins {
                let other = self.pins[*pin].component;
                if other != component && !out.contains(&other) {
                    out.push(other);
                }
            }
        }
        out
    }

    /// Every component reachable from `seed`, in breadth-first order,
    /// starting with `seed` itself.
    pub fn reachable_from(&self, seed: usize) -> Vec<usize> {
        let mut visited = HashSet::from([seed]);
        let mut order = vec![seed];
        let mut queue = VecDeque::from([seed]);
        while let Some(c) = queue.pop_front() {
            for n in self.neighbors(c) {
                if visited.insert(n) {
                    order.push(n);
                    queue.push_back(n);
                }
            }
        }
        order
    }

    /// The pin of the given kind closest to `point`, by Manhattan distance.
    ///
    /// Ties go to the pin listed first.
    pub fn nearest_pin(&self, point: Point, kind: PortKind) -> Option<usize> {
        self.pins
            .iter()
            .enumerate()
            .filter(|(_, pin)| pin.kind == kind)
            .min_by_key(|(_, pin)| pin.position.manhattan_dist(point))
            .map(|(i, _)| i)
    }

    /// Components with at least one pin of the given kind.
    pub fn components_with(&self, kind: PortKind) -> HashMap<usize, Vec<usize>> {
        let mut out: HashMap<usize, Vec<usize>> = HashMap::new();
        for (i, pin) in self.pins.iter().enumerate() {
            if pin.kind == kind {
                out.entry(pin.component).or_default().push(i);
            }
        }
        out
    }
}
