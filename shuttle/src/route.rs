//! Deterministic Manhattan lane routing.
//!
//! Routes are synthesized rather than searched. Each end of a route first
//! runs a short [`Turtle`] program whose distances come from the design's
//! lane, which keeps every lane in its own shell. A fixed connector then
//! joins the two turtle endpoints.

use std::collections::HashMap;

use geometry::prelude::*;
use layir::{Cell, Port};
use serde::{Deserialize, Serialize};

use crate::config::RoutingConfig;
use crate::error::{Error, Result};

/// An error in the lane router.
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum RouteError {
    /// No Manhattan connector satisfies both port facings.
    #[error("cannot route from {from} to {to}: {reason}")]
    Unroutable {
        from: Point,
        to: Point,
        reason: &'static str,
    },
}

/// A turtle program: move forward, then turn, repeatedly.
#[derive(Debug, Clone, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Turtle {
    steps: Vec<(i64, Turn)>,
}

impl Turtle {
    pub fn new(steps: impl Into<Vec<(i64, Turn)>>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    /// Parses the signed form used by cell libraries: `[d0, a0, d1, a1, ...]`
    /// with angles of `90` (left) or `-90` (right).
    ///
    /// # Example
    ///
    /// ```
    /// # use shuttle::route::Turtle;
    /// # use geometry::prelude::*;
    /// let turtle = Turtle::from_signed(&[10, 90, 5, -90]).unwrap();
    /// assert_eq!(turtle, Turtle::new([(10, Turn::Left), (5, Turn::Right)]));
    /// assert!(Turtle::from_signed(&[10, 45]).is_none());
    /// ```
    pub fn from_signed(program: &[i64]) -> Option<Self> {
        if program.len() % 2 != 0 {
            return None;
        }
        program
            .chunks(2)
            .map(|step| {
                let turn = Turn::from_degrees(i32::try_from(step[1]).ok()?)?;
                Some((step[0], turn))
            })
            .collect::<Option<Vec<_>>>()
            .map(Self::new)
    }

    #[inline]
    pub fn steps(&self) -> &[(i64, Turn)] {
        &self.steps
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs the program from `start`, returning every visited point
    /// (including `start`) and the final heading.
    pub fn run(&self, start: Point, heading: Rotation) -> (Vec<Point>, Rotation) {
        let mut points = vec![start];
        let mut p = start;
        let mut h = heading;
        for &(forward, turn) in &self.steps {
            let u = h.unit();
            p = Point::new(p.x + u.x * forward, p.y + u.y * forward);
            points.push(p);
            h += turn.rotation();
        }
        (points, h)
    }
}

/// One straight run of a [`Route`], followed by an optional turn.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub forward: i64,
    /// `None` only on the final segment.
    pub turn: Option<Turn>,
}

/// A Manhattan route, stored in turtle form.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub start: Point,
    pub start_heading: Rotation,
    pub segments: Vec<Segment>,
}

impl Route {
    /// Converts a simplified Manhattan polyline to turtle form.
    fn from_points(points: &[Point], from: Point, to: Point) -> std::result::Result<Self, RouteError> {
        let unroutable = |reason| RouteError::Unroutable { from, to, reason };
        let mut headings: Vec<Rotation> = Vec::with_capacity(points.len());
        let mut segments: Vec<Segment> = Vec::with_capacity(points.len());
        for w in points.windows(2) {
            let h = Rotation::heading_between(w[0], w[1])
                .ok_or_else(|| unroutable("connector produced a non-Manhattan segment"))?;
            if let Some(&prev) = headings.last() {
                let turn = Turn::between(prev, h)
                    .ok_or_else(|| unroutable("route doubles back on itself"))?;
                if let Some(last) = segments.last_mut() {
                    last.turn = Some(turn);
                }
            }
            headings.push(h);
            segments.push(Segment {
                forward: w[0].manhattan_dist(w[1]),
                turn: None,
            });
        }
        Ok(Self {
            start: points.first().copied().unwrap_or(from),
            start_heading: headings.first().copied().unwrap_or(Rotation::R0),
            segments,
        })
    }

    /// The vertices of the route.
    pub fn points(&self) -> Vec<Point> {
        let mut points = vec![self.start];
        let mut p = self.start;
        let mut h = self.start_heading;
        for seg in &self.segments {
            let u = h.unit();
            p = Point::new(p.x + u.x * seg.forward, p.y + u.y * seg.forward);
            points.push(p);
            if let Some(turn) = seg.turn {
                h += turn.rotation();
            }
        }
        points
    }

    /// The final point of the route.
    pub fn end(&self) -> Point {
        self.points().last().copied().unwrap_or(self.start)
    }

    /// The total centerline length.
    pub fn length(&self) -> i64 {
        self.segments.iter().map(|s| s.forward).sum()
    }

    /// The heading at the end of the route.
    pub fn end_heading(&self) -> Rotation {
        self.segments
            .iter()
            .filter_map(|s| s.turn)
            .fold(self.start_heading, |h, t| h + t.rotation())
    }

    /// Draws the route as a path of the given width.
    pub fn to_path(&self, width: i64) -> Path {
        Path::new(self.points(), width)
    }
}

/// Where a lane starts and ends, in top-cell coordinates.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct LaneEnds {
    /// The tree leaf feeding the lane. It faces east.
    pub leaf: Point,
    /// The design's laser port. It faces west.
    pub port: Point,
    /// The placement column of the design.
    pub column: usize,
    /// The top edge of the design's slot.
    pub top: i64,
}

/// The lane of one connected design.
///
/// Every lane leaves its leaf eastward, climbs a riser west of every
/// design, crosses east on a track above every slot and leaf, drops down a
/// channel just west of its design, and enters the design port. Lanes are
/// numbered across all laser groups in placement order. Higher lanes use
/// risers further west and tracks further north, and channels move east
/// with the lane number, so no two lanes touch.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct LaneParams {
    /// The rank of the design among connected designs in its column, from the bottom.
    pub row: usize,
    /// The number of connected designs in the column.
    pub rows: usize,
    pub column: usize,
    /// The lane number, counted over every connected design.
    pub lane: usize,
    pub pitch: i64,
    pub bend_radius: i64,
    /// The y coordinate of the lowest track.
    pub ceiling: i64,
    /// The x coordinate of the easternmost riser.
    pub fence: i64,
}

impl LaneParams {
    /// Distance travelled straight out of the design before turning.
    pub fn design_offset(&self) -> i64 {
        (self.rows as i64 - self.row as i64 - 1) * self.pitch + self.bend_radius
    }

    /// The lateral shell this lane occupies.
    pub fn shell_offset(&self) -> i64 {
        self.lane as i64 * self.pitch
    }

    /// The y coordinate of the track carrying the lane east.
    pub fn track(&self) -> i64 {
        self.ceiling + self.shell_offset()
    }

    /// The x coordinate of the riser carrying the lane north from its leaf.
    pub fn riser(&self) -> i64 {
        self.fence - self.shell_offset()
    }

    /// The x coordinate of the channel carrying the lane down to `port`.
    pub fn channel(&self, port: Point) -> i64 {
        port.x - self.design_offset()
    }

    /// The turtle run from the design port at `port`.
    pub fn design_turtle(&self, port: Point) -> Turtle {
        Turtle::new([
            (self.design_offset(), Turn::Right),
            (self.track() - port.y, Turn::Left),
            (self.channel(port) - self.riser(), Turn::Left),
        ])
    }

    /// The turtle run from the tree leaf at `leaf`.
    pub fn tree_turtle(&self, leaf: Point) -> Turtle {
        Turtle::new([(self.riser() - leaf.x, Turn::Left)])
    }
}

/// Assigns a lane to each connected design.
///
/// `ends` lists the connected designs in placement order, which fills
/// columns bottom to top and then left to right.
pub fn plan_lanes(
    ends: &[LaneEnds],
    routing: &RoutingConfig,
) -> std::result::Result<Vec<LaneParams>, RouteError> {
    let Some(first) = ends.first() else {
        return Ok(Vec::new());
    };
    let unroutable = |end: &LaneEnds, reason| RouteError::Unroutable {
        from: end.leaf,
        to: end.port,
        reason,
    };
    let mut rows: HashMap<usize, usize> = HashMap::new();
    let mut ceiling = first.top;
    for end in ends {
        *rows.entry(end.column).or_default() += 1;
        ceiling = ceiling.max(end.top).max(end.leaf.y);
    }
    ceiling += routing.pitch;

    let mut seen: HashMap<usize, usize> = HashMap::new();
    let mut lanes: Vec<LaneParams> = ends
        .iter()
        .enumerate()
        .map(|(lane, end)| {
            let row = seen.entry(end.column).or_default();
            let params = LaneParams {
                row: *row,
                rows: rows[&end.column],
                column: end.column,
                lane,
                pitch: routing.pitch,
                bend_radius: routing.bend_radius,
                ceiling,
                fence: 0,
            };
            *row += 1;
            params
        })
        .collect();

    let fence = lanes
        .iter()
        .zip(ends)
        .map(|(lane, end)| lane.channel(end.port))
        .min()
        .unwrap_or(first.port.x)
        - routing.escape;
    for lane in &mut lanes {
        lane.fence = fence;
    }

    for (w, e) in lanes.windows(2).zip(ends.windows(2)) {
        if e[1].leaf.y <= e[0].leaf.y {
            return Err(unroutable(&e[1], "tree leaves are not ordered by lane"));
        }
        if w[1].channel(e[1].port) <= w[0].channel(e[0].port) {
            return Err(unroutable(&e[1], "design channels are not ordered by lane"));
        }
    }
    for (lane, end) in lanes.iter().zip(ends) {
        if lane.riser() <= end.leaf.x {
            return Err(unroutable(end, "no room for a riser east of the tree"));
        }
    }
    tracing::debug!(lanes = lanes.len(), ceiling, fence, "planned lanes");
    Ok(lanes)
}

/// Routes from a tree leaf to a design port along `lane`.
///
/// The leaf must face east and the port west.
pub fn route(from: &Port, to: &Port, lane: &LaneParams) -> std::result::Result<Route, RouteError> {
    let unroutable = |reason| RouteError::Unroutable {
        from: from.position(),
        to: to.position(),
        reason,
    };
    if from.facing() != Rotation::R0 || to.facing() != Rotation::R180 {
        return Err(unroutable("lanes run from an east-facing leaf to a west-facing port"));
    }
    let tree = lane.tree_turtle(from.position());
    let design = lane.design_turtle(to.position());
    if tree
        .steps()
        .iter()
        .chain(design.steps())
        .any(|&(forward, _)| forward <= 0)
    {
        return Err(unroutable("lane does not clear the leaf and the design"));
    }
    route_turtles(from, to, &tree, &design, lane.bend_radius)
}

/// Routes from `from` to `to`.
///
/// `turtle_a` runs from `from` and `turtle_b` from `to`; their endpoints are
/// then joined. The route leaves `from` along its facing and enters `to`
/// against its facing.
pub fn route_turtles(
    from: &Port,
    to: &Port,
    turtle_a: &Turtle,
    turtle_b: &Turtle,
    bend_radius: i64,
) -> std::result::Result<Route, RouteError> {
    let (mut points, heading_a) = turtle_a.run(from.position(), from.facing());
    let (mut tail, heading_b) = turtle_b.run(to.position(), to.facing());
    let (pa, pb) = (points[points.len() - 1], tail[tail.len() - 1]);

    let join = join(pa, heading_a, pb, heading_b.reversed(), bend_radius).map_err(|reason| {
        RouteError::Unroutable {
            from: from.position(),
            to: to.position(),
            reason,
        }
    })?;
    tracing::debug!(from = %pa, to = %pb, bends = join.len(), "joined turtle endpoints");
    points.extend(join);
    tail.reverse();
    points.extend(tail);

    let mut path = Path::new(points, 0);
    path.simplify();
    let route = Route::from_points(path.points(), from.position(), to.position())?;
    if !route.segments.is_empty() && route.start_heading != from.facing() {
        return Err(RouteError::Unroutable {
            from: from.position(),
            to: to.position(),
            reason: "route does not leave along the source port facing",
        });
    }
    Ok(route)
}

/// Joins `start` (heading `h_start`) to `end`, arriving with heading `h_end`.
///
/// Returns the points after `start`, ending with `end`.
fn join(
    start: Point,
    h_start: Rotation,
    end: Point,
    h_end: Rotation,
    r: i64,
) -> std::result::Result<Vec<Point>, &'static str> {
    let to_local = Transformation::cascade(
        Transformation::rotate(-h_start),
        Transformation::from_offset(-start),
    );
    let to_world = to_local.inv();
    let e = to_local.apply(end);
    let points = join_local(e, h_end - h_start, r)?;
    Ok(points.into_iter().map(|p| to_world.apply(p)).collect())
}

/// [`join`] in a frame where the start is the origin heading east.
fn join_local(e: Point, he: Rotation, r: i64) -> std::result::Result<Vec<Point>, &'static str> {
    let (ex, ey) = (e.x, e.y);
    let p = Point::new;
    if e == Point::zero() {
        return if he == Rotation::R0 {
            Ok(Vec::new())
        } else {
            Err("endpoints coincide with mismatched headings")
        };
    }
    Ok(match he {
        Rotation::R0 if ey == 0 && ex > 0 => vec![e],
        Rotation::R0 if ex >= 2 * r => {
            let mx = ex / 2;
            vec![p(mx, 0), p(mx, ey), e]
        }
        Rotation::R0 => {
            let ym = if ey == 0 {
                2 * r
            } else if ey.abs() >= 2 {
                ey / 2
            } else {
                ey + 2 * r * ey.signum()
            };
            vec![p(r, 0), p(r, ym), p(ex - r, ym), p(ex - r, ey), e]
        }
        Rotation::R180 => {
            if ey == 0 {
                return Err("endpoints face each other from behind on one line");
            }
            let mx = std::cmp::max(ex, 0) + r;
            vec![p(mx, 0), p(mx, ey), e]
        }
        Rotation::R90 => {
            if ex > 0 && ey > 0 {
                vec![p(ex, 0), e]
            } else {
                let yl = std::cmp::min(0, ey) - r;
                let a = if ex == r { 2 * r } else { r };
                vec![p(a, 0), p(a, yl), p(ex, yl), e]
            }
        }
        Rotation::R270 => join_local(p(ex, -ey), Rotation::R90, r)?
            .into_iter()
            .map(|q| p(q.x, -q.y))
            .collect(),
    })
}

/// The transformation placing `child` so that its port `port` mates with `from`.
///
/// The child is rotated but never mirrored.
pub fn connect_cell<L>(from: &Port, child: &Cell<L>, port: &str) -> Result<Transformation> {
    let cp = child.try_port(port).ok_or_else(|| Error::MissingPort {
        cell: child.name().clone(),
        port: port.into(),
    })?;
    let rotation = from.facing().reversed() - cp.facing();
    let offset = from.position() - rotation.rotate_point(cp.position());
    Ok(Transformation::from_parts(offset, rotation, false))
}

#[cfg(test)]
mod tests {
    use layir::PortKind;

    use super::*;

    fn port(x: i64, y: i64, facing: Rotation) -> Port {
        Port::new(PortKind::Optical, Point::new(x, y), facing, 350)
    }

    fn assert_valid(route: &Route, from: &Port, to: &Port) {
        let path = route.to_path(350);
        assert!(path.is_manhattan());
        assert_eq!(route.start, from.position());
        assert_eq!(route.end(), to.position());
        if !route.segments.is_empty() {
            assert_eq!(route.start_heading, from.facing());
            assert_eq!(route.end_heading(), to.facing().reversed());
        }
        assert!(route.segments.iter().all(|s| s.forward > 0));
    }

    #[test]
    fn connectors_cover_every_arrival_heading() {
        let from = port(0, 0, Rotation::R0);
        for (x, y) in [(100, 0), (100, 40), (3, 40), (-50, 0), (-50, -70), (5, 7)] {
            for facing in Rotation::all() {
                let to = port(x, y, facing);
                match route_turtles(&from, &to, &Turtle::default(), &Turtle::default(), 5) {
                    Ok(route) => assert_valid(&route, &from, &to),
                    Err(RouteError::Unroutable { .. }) => {
                        assert_eq!(facing, Rotation::R0);
                        assert_eq!(y, 0);
                    }
                }
            }
        }
    }

    #[test]
    fn facing_ports_on_a_line_route_straight() {
        let from = port(0, 0, Rotation::R0);
        let to = port(1000, 0, Rotation::R180);
        let route = route_turtles(&from, &to, &Turtle::default(), &Turtle::default(), 5).unwrap();
        assert_eq!(
            route.segments,
            [Segment {
                forward: 1000,
                turn: None
            }]
        );
    }

    fn ends(leaf_y: i64, x: i64, y: i64, column: usize) -> LaneEnds {
        LaneEnds {
            leaf: Point::new(0, leaf_y),
            port: Point::new(x, y),
            column,
            top: y + 400_000,
        }
    }

    #[test]
    fn lane_routes_follow_both_turtles() {
        let routing = RoutingConfig::default();
        let lanes = plan_lanes(
            &[ends(-100, 2_000_000, 50_000, 0), ends(100, 2_000_000, 500_000, 0)],
            &routing,
        )
        .unwrap();
        let lane = lanes[1];
        assert_eq!((lane.row, lane.rows, lane.lane), (1, 2, 1));
        assert_eq!(lane.ceiling, 908_000);
        assert_eq!(lane.fence, 2_000_000 - 13_000 - 100_000);

        let leaf = port(0, 100, Rotation::R0);
        let design = port(2_000_000, 500_000, Rotation::R180);
        let routed = route(&leaf, &design, &lane).unwrap();
        assert_valid(&routed, &leaf, &design);
        let channel = lane.channel(design.position());
        assert_eq!(channel, 2_000_000 - 5_000);
        assert_eq!(
            routed.points(),
            [
                Point::new(0, 100),
                Point::new(lane.riser(), 100),
                Point::new(lane.riser(), lane.track()),
                Point::new(channel, lane.track()),
                Point::new(channel, 500_000),
                Point::new(2_000_000, 500_000),
            ]
        );
        assert!(route(&design, &leaf, &lane).is_err());
    }

    #[test]
    fn planned_lanes_nest_without_touching() {
        let routing = RoutingConfig::default();
        // Three designs in one column, then two in the next.
        let ends: Vec<LaneEnds> = [(0, 0), (0, 1), (0, 2), (1, 0), (1, 1)]
            .into_iter()
            .enumerate()
            .map(|(i, (column, row))| {
                ends(
                    i as i64 * 60_000,
                    2_500_000 + column as i64 * 613_000,
                    428_000 + row * 418_000,
                    column,
                )
            })
            .collect();
        let lanes = plan_lanes(&ends, &routing).unwrap();
        let rows: Vec<(usize, usize)> = lanes.iter().map(|l| (l.row, l.rows)).collect();
        assert_eq!(rows, [(0, 3), (1, 3), (2, 3), (0, 2), (1, 2)]);

        let shells: Vec<i64> = lanes.iter().map(LaneParams::shell_offset).collect();
        assert!(shells.windows(2).all(|w| w[0] < w[1]));
        for (w, e) in lanes.windows(2).zip(ends.windows(2)) {
            assert!(w[0].riser() > w[1].riser());
            assert!(w[0].track() < w[1].track());
            assert!(w[0].channel(e[0].port) < w[1].channel(e[1].port));
        }
        let highest = ends.iter().map(|e| e.top).max().unwrap();
        assert!(lanes.iter().all(|l| l.track() > highest));
        assert!(lanes
            .iter()
            .zip(&ends)
            .all(|(l, e)| l.riser() > e.leaf.x && l.riser() < l.channel(e.port)));
    }

    #[test]
    fn lanes_that_would_cross_are_rejected() {
        let routing = RoutingConfig::default();
        assert!(plan_lanes(&[], &routing).unwrap().is_empty());

        let swapped = [ends(100, 2_000_000, 0, 0), ends(-100, 2_000_000, 418_000, 0)];
        assert!(matches!(
            plan_lanes(&swapped, &routing),
            Err(RouteError::Unroutable {
                reason: "tree leaves are not ordered by lane",
                ..
            })
        ));

        // A second column on top of the first.
        let crowded = [
            ends(0, 2_000_000, 0, 0),
            ends(10, 2_000_000, 418_000, 0),
            ends(20, 2_000_000, 0, 1),
        ];
        assert!(matches!(
            plan_lanes(&crowded, &routing),
            Err(RouteError::Unroutable {
                reason: "design channels are not ordered by lane",
                ..
            })
        ));

        assert!(matches!(
            plan_lanes(&[ends(0, 50_000, 0, 0)], &routing),
            Err(RouteError::Unroutable {
                reason: "no room for a riser east of the tree",
                ..
            })
        ));
    }

    #[test]
    fn connect_cell_mates_ports() {
        let mut cell = Cell::<()>::new("term");
        cell.add_port("pin1", port(0, 0, Rotation::R180));
        cell.add_port("side", port(5, 5, Rotation::R90));
        for from in [port(100, 20, Rotation::R0), port(-3, 9, Rotation::R90)] {
            for name in ["pin1", "side"] {
                let t = connect_cell(&from, &cell, name).unwrap();
                let placed = cell.try_port(name).copied().unwrap().transform(t);
                assert!(placed.mates_with(&from));
            }
        }
        assert!(matches!(
            connect_cell(&port(0, 0, Rotation::R0), &cell, "opt9"),
            Err(Error::MissingPort { .. })
        ));
    }
}
