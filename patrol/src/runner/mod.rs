use log::{error, info};
use strum::Display;
use thiserror::Error;

use crate::{
    bridge::{Frame, LargeMap},
    ecs::Resources,
    geometry::Point,
    models::{NavigationSettings, Route},
    transition, transition_if, try_some_transition,
};

mod battle;
mod moving;
mod stuck;
mod turn;
mod unstuck;

use battle::update_battle_state;
pub use battle::Battling;
use moving::update_running_state;
pub use stuck::StuckTracker;
pub use turn::AdaptiveTurn;
pub use unstuck::{UnstuckPattern, Unstucking};

/// Why a route run ended without completing.
#[derive(Error, Clone, PartialEq, Debug)]
pub enum RouteFailure {
    #[error("route {0} has no waypoints")]
    EmptyRoute(String),
    #[error("large map of area {0} is missing")]
    MissingLargeMap(String),
    #[error("start position before waypoint {0} cannot be resolved")]
    UnresolvableStart(usize),
    #[error("fast travel failed: {0}")]
    TransportFailed(String),
    #[error("stuck limit exceeded")]
    StuckLimitExceeded,
    #[error("position lost")]
    PositionLost,
    #[error("stopped")]
    Stopped,
    #[error("route run panicked")]
    Panicked,
}

impl RouteFailure {
    /// Whether the failure comes from bad route or map data.
    ///
    /// These are reported immediately and retrying the same route fails the same way.
    #[inline]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RouteFailure::EmptyRoute(_)
                | RouteFailure::MissingLargeMap(_)
                | RouteFailure::UnresolvableStart(_)
        )
    }

    /// Whether the caller may restart the route.
    #[inline]
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            RouteFailure::TransportFailed(_)
                | RouteFailure::StuckLimitExceeded
                | RouteFailure::PositionLost
        )
    }
}

#[derive(Debug)]
pub struct RouteEntity {
    pub state: Navigation,
    pub context: NavigationContext,
}

impl RouteEntity {
    pub fn new(route: Route, start_index: usize, settings: NavigationSettings) -> Self {
        Self {
            state: Navigation::Initializing,
            context: NavigationContext::new(route, start_index, settings),
        }
    }
}

/// The phases of a route run.
#[derive(Clone, PartialEq, Debug, Display)]
pub enum Navigation {
    /// Resolves the large map of the route area.
    Initializing,
    /// Fast travels to the route start.
    Transporting,
    /// Resolves the position before the start waypoint.
    SettingStart,
    /// Follows the waypoints.
    RunningWaypoints,
    /// Fights until the battle is over.
    InBattle(Battling),
    Completed,
    Failed(RouteFailure),
}

impl Navigation {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Navigation::Completed | Navigation::Failed(_))
    }
}

/// Mutable state of one route run.
#[derive(Debug)]
pub struct NavigationContext {
    pub route: Route,
    pub settings: NavigationSettings,
    pub start_index: usize,
    /// Index of the waypoint being moved to.
    pub index: usize,
    /// Last estimated position.
    pub position: Point,
    pub large_map: Option<LargeMap>,
    pub stuck: StuckTracker,
    pub turn: AdaptiveTurn,
    pub unstucking: Unstucking,
}

impl NavigationContext {
    pub fn new(route: Route, start_index: usize, settings: NavigationSettings) -> Self {
        Self {
            route,
            settings,
            start_index,
            index: start_index,
            position: Point::default(),
            large_map: None,
            stuck: StuckTracker::default(),
            turn: AdaptiveTurn::default(),
            unstucking: Unstucking::default(),
        }
    }

    /// The point currently steered toward.
    ///
    /// This is the backtrack target while backtracking and the current waypoint otherwise.
    #[inline]
    pub fn target(&self) -> Option<Point> {
        self.stuck.backtrack_target().or_else(|| {
            self.route
                .waypoints
                .get(self.index)
                .map(|waypoint| waypoint.target)
        })
    }
}

/// Advances the route run by one tick using `frame`.
pub fn run_system(resources: &Resources, route: &mut RouteEntity, frame: &Frame) {
    match route.state.clone() {
        Navigation::Initializing => update_initializing_state(resources, route),
        Navigation::Transporting => update_transporting_state(resources, route),
        Navigation::SettingStart => update_setting_start_state(resources, route),
        Navigation::RunningWaypoints => update_running_state(resources, route, frame),
        Navigation::InBattle(battling) => update_battle_state(resources, route, frame, battling),
        Navigation::Completed | Navigation::Failed(_) => (),
    }
}

/// Halts the character when the run is paused.
pub fn halt_system(resources: &Resources, route: &RouteEntity) {
    resources.actuator.stop_moving_forward();
    if matches!(route.state, Navigation::InBattle(_)) {
        resources.battle.stop();
    }
}

/// Restores the run after a pause.
pub fn resume_system(resources: &Resources, route: &mut RouteEntity) {
    route.context.stuck.interrupt();
    if matches!(route.state, Navigation::InBattle(Battling::Fighting { .. })) {
        resources.battle.start();
    }
}

fn update_initializing_state(resources: &Resources, route: &mut RouteEntity) {
    let name = route.context.route.name.clone();
    transition_if!(
        route,
        Navigation::Failed(RouteFailure::EmptyRoute(name)),
        route.context.route.is_empty()
    );

    let area = route.context.route.area.clone();
    let map = try_some_transition!(
        route,
        Navigation::Failed(RouteFailure::MissingLargeMap(area.clone())),
        resources.maps.reference_image(&area),
        {
            error!(target: "route", "large map of area {area} is missing");
        }
    );
    route.context.large_map = Some(map);

    let start_index = route.context.start_index;
    transition_if!(
        route,
        Navigation::Failed(RouteFailure::UnresolvableStart(start_index)),
        start_index > route.context.route.len()
    );
    transition_if!(
        route,
        Navigation::Transporting,
        start_index == 0 && route.context.route.transport.is_some()
    );
    transition!(route, Navigation::SettingStart);
}

fn update_transporting_state(resources: &Resources, route: &mut RouteEntity) {
    let point = try_some_transition!(
        route,
        Navigation::SettingStart,
        route.context.route.transport.clone()
    );

    info!(target: "route", "fast travelling to {} {}", point.area, point.name);
    if let Err(err) = resources.transport.fast_travel(&point.area, &point.name) {
        error!(target: "route", "fast travel to {} failed {err}", point.name);
        transition!(
            route,
            Navigation::Failed(RouteFailure::TransportFailed(err.to_string()))
        );
    }
    transition!(route, Navigation::SettingStart);
}

fn update_setting_start_state(resources: &Resources, route: &mut RouteEntity) {
    let start_index = route.context.start_index;
    let position = try_some_transition!(
        route,
        Navigation::Failed(RouteFailure::UnresolvableStart(start_index)),
        route.context.route.position_before(start_index),
        {
            error!(target: "route", "cannot resolve start position before waypoint {start_index}");
        }
    );

    info!(target: "route", "starting at waypoint {start_index} from {position:?}");
    route.context.index = start_index;
    route.context.position = position;
    resources
        .actuator
        .turn_vertical(route.context.settings.camera_tilt);
    transition!(route, Navigation::RunningWaypoints);
}

#[cfg(test)]
mod tests {
    use std::{assert_matches, time::Instant};

    use anyhow::anyhow;
    use mockall::predicate::eq;

    use super::*;
    use crate::{
        bridge::{Image, MockActuator, MockAutoBattle, MockLargeMapStore, MockTransport},
        models::{TransportPoint, Waypoint},
    };

    fn test_route() -> Route {
        Route {
            name: "Route".to_string(),
            area: "Area".to_string(),
            start: Some(Point::new(10, 10)),
            transport: Some(TransportPoint {
                area: "Area".to_string(),
                name: "Gate".to_string(),
            }),
            waypoints: vec![Waypoint::new(100, 100), Waypoint::new(200, 100)],
            ..Route::default()
        }
    }

    fn test_frame() -> Frame {
        Frame {
            image: Image::default(),
            timestamp: Instant::now(),
        }
    }

    fn maps_with_area() -> MockLargeMapStore {
        let mut maps = MockLargeMapStore::default();
        maps.expect_reference_image()
            .with(eq("Area"))
            .returning(|area| {
                Some(LargeMap {
                    area: area.to_string(),
                    image: Image::default(),
                })
            });
        maps
    }

    #[test]
    fn update_initializing_to_transporting() {
        let mut resources = Resources::new(None, None);
        resources.maps = Box::new(maps_with_area());
        let mut route = RouteEntity::new(test_route(), 0, NavigationSettings::default());

        run_system(&resources, &mut route, &test_frame());

        assert_matches!(route.state, Navigation::Transporting);
        assert!(route.context.large_map.is_some());
    }

    #[test]
    fn update_initializing_skips_transport_when_not_from_start() {
        let mut resources = Resources::new(None, None);
        resources.maps = Box::new(maps_with_area());
        let mut route = RouteEntity::new(test_route(), 1, NavigationSettings::default());

        run_system(&resources, &mut route, &test_frame());

        assert_matches!(route.state, Navigation::SettingStart);
    }

    #[test]
    fn update_initializing_missing_map_is_configuration_failure() {
        let mut maps = MockLargeMapStore::default();
        maps.expect_reference_image().return_const(None);
        let mut resources = Resources::new(None, None);
        resources.maps = Box::new(maps);
        let mut route = RouteEntity::new(test_route(), 0, NavigationSettings::default());

        run_system(&resources, &mut route, &test_frame());

        assert_matches!(
            &route.state,
            Navigation::Failed(failure @ RouteFailure::MissingLargeMap(_)) if failure.is_configuration()
        );
    }

    #[test]
    fn update_initializing_empty_route() {
        let resources = Resources::new(None, None);
        let route = Route {
            waypoints: vec![],
            ..test_route()
        };
        let mut route = RouteEntity::new(route, 0, NavigationSettings::default());

        run_system(&resources, &mut route, &test_frame());

        assert_matches!(route.state, Navigation::Failed(RouteFailure::EmptyRoute(_)));
    }

    #[test]
    fn update_initializing_start_index_out_of_range() {
        let mut resources = Resources::new(None, None);
        resources.maps = Box::new(maps_with_area());
        let mut route = RouteEntity::new(test_route(), 5, NavigationSettings::default());

        run_system(&resources, &mut route, &test_frame());

        assert_matches!(
            route.state,
            Navigation::Failed(RouteFailure::UnresolvableStart(5))
        );
    }

    #[test]
    fn update_transporting_failure_aborts() {
        let mut transport = MockTransport::default();
        transport
            .expect_fast_travel()
            .with(eq("Area"), eq("Gate"))
            .once()
            .returning(|_, _| Err(anyhow!("loading screen timed out")));
        let mut resources = Resources::new(None, None);
        resources.transport = Box::new(transport);
        let mut route = RouteEntity::new(test_route(), 0, NavigationSettings::default());
        route.state = Navigation::Transporting;

        run_system(&resources, &mut route, &test_frame());

        assert_matches!(
            &route.state,
            Navigation::Failed(failure @ RouteFailure::TransportFailed(_)) if failure.is_retriable()
        );
    }

    #[test]
    fn update_transporting_to_setting_start() {
        let mut transport = MockTransport::default();
        transport.expect_fast_travel().once().returning(|_, _| Ok(()));
        let mut resources = Resources::new(None, None);
        resources.transport = Box::new(transport);
        let mut route = RouteEntity::new(test_route(), 0, NavigationSettings::default());
        route.state = Navigation::Transporting;

        run_system(&resources, &mut route, &test_frame());

        assert_matches!(route.state, Navigation::SettingStart);
    }

    #[test]
    fn update_setting_start_tilts_camera() {
        let mut actuator = MockActuator::default();
        actuator
            .expect_turn_vertical()
            .with(eq(300))
            .once()
            .return_const(());
        let resources = Resources::new(Some(actuator), None);
        let mut route = RouteEntity::new(test_route(), 1, NavigationSettings::default());
        route.state = Navigation::SettingStart;

        run_system(&resources, &mut route, &test_frame());

        assert_matches!(route.state, Navigation::RunningWaypoints);
        assert_eq!(route.context.position, Point::new(100, 100));
        assert_eq!(route.context.index, 1);
    }

    #[test]
    fn update_setting_start_unresolvable() {
        let resources = Resources::new(None, None);
        let route = Route {
            start: None,
            ..test_route()
        };
        let mut route = RouteEntity::new(route, 0, NavigationSettings::default());
        route.state = Navigation::SettingStart;

        run_system(&resources, &mut route, &test_frame());

        assert_matches!(
            route.state,
            Navigation::Failed(RouteFailure::UnresolvableStart(0))
        );
    }

    #[test]
    fn halt_system_stops_battle_only_in_battle() {
        let mut actuator = MockActuator::default();
        actuator.expect_stop_moving_forward().times(2).return_const(());
        let mut battle = MockAutoBattle::default();
        battle.expect_stop().once().return_const(());
        let resources = Resources::new(Some(actuator), Some(battle));
        let mut route = RouteEntity::new(test_route(), 0, NavigationSettings::default());

        route.state = Navigation::RunningWaypoints;
        halt_system(&resources, &route);
        route.state = Navigation::InBattle(Battling::Fighting {
            last_check: Instant::now(),
        });
        halt_system(&resources, &route);
    }

    #[test]
    fn resume_system_restarts_battle_when_fighting() {
        let mut battle = MockAutoBattle::default();
        battle.expect_start().once().return_const(());
        let resources = Resources::new(None, Some(battle));
        let mut route = RouteEntity::new(test_route(), 0, NavigationSettings::default());

        route.state = Navigation::RunningWaypoints;
        resume_system(&resources, &mut route);
        route.state = Navigation::InBattle(Battling::Fighting {
            last_check: Instant::now(),
        });
        resume_system(&resources, &mut route);
    }

    #[test]
    fn route_failure_status_strings() {
        assert_eq!(
            RouteFailure::StuckLimitExceeded.to_string(),
            "stuck limit exceeded"
        );
        assert_eq!(
            RouteFailure::MissingLargeMap("Area".to_string()).to_string(),
            "large map of area Area is missing"
        );
        assert!(!RouteFailure::Stopped.is_retriable());
        assert!(!RouteFailure::Stopped.is_configuration());
    }
}
