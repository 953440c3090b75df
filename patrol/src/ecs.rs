use tokio::sync::broadcast::Sender;
#[cfg(test)]
use tokio::sync::broadcast::channel;

#[cfg(test)]
use crate::{
    bridge::{MockActuator, MockAutoBattle, MockLargeMapStore, MockMinimapCutter, MockTransport},
    estimator::MockPositionEstimator,
};
use crate::{
    bridge::{Actuator, AutoBattle, BattleResult, LargeMapStore, MinimapCutter, Transport},
    estimator::PositionEstimator,
    geometry::Point,
    operation::Operation,
    runner::{RouteFailure, UnstuckPattern},
};

#[macro_export]
macro_rules! transition {
    ($entity:expr, $state:expr) => {{
        $entity.state = $state;
        return;
    }};
    ($entity:expr, $state:expr, $block:block) => {{
        $block
        $entity.state = $state;
        return;
    }};
}

#[macro_export]
macro_rules! transition_if {
    ($cond:expr) => {{
        if $cond {
            return;
        }
    }};
    ($entity:expr, $state:expr, $cond:expr) => {{
        if $cond {
            $entity.state = $state;
            return;
        }
    }};
    ($entity:expr, $state:expr, $cond:expr, $block:block) => {{
        if $cond {
            $block
            $entity.state = $state;
            return;
        }
    }};
}

#[macro_export]
macro_rules! try_some_transition {
    ($entity:expr, $state:expr, $expr:expr) => {
        match $expr {
            Some(val) => val,
            None => {
                $entity.state = $state;
                return;
            }
        }
    };
    ($entity:expr, $state:expr, $expr:expr, $block:block) => {
        match $expr {
            Some(val) => val,
            None => {
                $block
                $entity.state = $state;
                return;
            }
        }
    };
}

/// A struct containing the collaborators a route run drives.
#[derive(Debug)]
pub struct Resources {
    /// A resource to move the character.
    pub actuator: Box<dyn Actuator>,
    /// A resource to fight when a battle interrupts the route.
    pub battle: Box<dyn AutoBattle>,
    /// A resource to extract the minimap from a frame.
    pub cutter: Box<dyn MinimapCutter>,
    /// A resource to resolve the minimap to a large-map position.
    pub estimator: Box<dyn PositionEstimator>,
    /// A resource to load large-map reference images.
    pub maps: Box<dyn LargeMapStore>,
    /// A resource to fast travel to the route start.
    pub transport: Box<dyn Transport>,
    /// A resource to publish [`RouteEvent`]s.
    pub events: Sender<RouteEvent>,
    /// A resource indicating current operation state.
    pub operation: Operation,
    /// A resource indicating current tick.
    pub tick: u64,
}

impl Resources {
    #[cfg(test)]
    pub fn new(actuator: Option<MockActuator>, battle: Option<MockAutoBattle>) -> Self {
        Self {
            actuator: Box::new(actuator.unwrap_or_default()),
            battle: Box::new(battle.unwrap_or_default()),
            cutter: Box::new(MockMinimapCutter::default()),
            estimator: Box::new(MockPositionEstimator::default()),
            maps: Box::new(MockLargeMapStore::default()),
            transport: Box::new(MockTransport::default()),
            events: channel(16).0,
            operation: Operation::Running,
            tick: 0,
        }
    }

    /// Publishes `event` to subscribers, if any.
    #[inline]
    pub fn publish(&self, event: RouteEvent) {
        let _ = self.events.send(event);
    }
}

/// Notable things that happened during a route run.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteEvent {
    WaypointReached(usize),
    BattleStarted,
    BattleEnded(Option<BattleResult>),
    BacktrackStarted(Point),
    BacktrackReached(Point),
    BacktrackTimedOut(Point),
    Unstucking { attempt: u32, pattern: UnstuckPattern },
    Halted,
    Resumed,
    Completed,
    Failed(RouteFailure),
}
