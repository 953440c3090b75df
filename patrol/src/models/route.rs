use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{geometry::Point, impl_identifiable};

/// A persistent, read-only during a run, ordered list of waypoints in one large-map area.
#[derive(PartialEq, Clone, Debug, Default, Serialize, Deserialize)]
pub struct Route {
    #[serde(skip_serializing, default)]
    pub id: Option<i64>,
    pub name: String,
    /// The large-map area the waypoints are defined against.
    pub area: String,
    /// Position of the route start, usually the fast-travel point.
    #[serde(default)]
    pub start: Option<Point>,
    #[serde(default)]
    pub transport: Option<TransportPoint>,
    pub waypoints: Vec<Waypoint>,
}

impl_identifiable!(Route);

impl Route {
    #[inline]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Position the character should be at right before running waypoint `index`.
    ///
    /// This is the target of the closest [`WaypointKind::Move`] before `index` or [`Self::start`]
    /// when there is none. Returns [`None`] if `index` is out of range or the start is unknown.
    pub fn position_before(&self, index: usize) -> Option<Point> {
        if index > self.waypoints.len() {
            return None;
        }

        self.waypoints[..index]
            .iter()
            .rev()
            .find(|waypoint| waypoint.kind == WaypointKind::Move)
            .map(|waypoint| waypoint.target)
            .or(self.start)
    }

    #[inline]
    pub fn is_move(&self, index: usize) -> bool {
        self.waypoints
            .get(index)
            .is_some_and(|waypoint| waypoint.kind == WaypointKind::Move)
    }
}

#[derive(PartialEq, Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Waypoint {
    #[serde(default)]
    pub kind: WaypointKind,
    pub target: Point,
}

impl Waypoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            kind: WaypointKind::Move,
            target: Point::new(x, y),
        }
    }
}

#[derive(
    Clone, Copy, PartialEq, Eq, Default, Debug, Serialize, Deserialize, EnumIter, Display, EnumString,
)]
pub enum WaypointKind {
    #[default]
    Move,
}

/// A fast-travel destination.
#[derive(PartialEq, Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransportPoint {
    pub area: String,
    pub name: String,
}
