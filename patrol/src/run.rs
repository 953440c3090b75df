use std::{
    mem,
    ops::ControlFlow,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};
use tokio::sync::{broadcast, watch};

use crate::{
    bridge::{Actuator, AutoBattle, FrameSource, LargeMapStore, MinimapCutter, Transport},
    ecs::{Resources, RouteEvent},
    estimator::PositionEstimator,
    models::{NavigationSettings, Route},
    operation::Operation,
    runner::{Navigation, RouteEntity, RouteFailure, halt_system, resume_system, run_system},
};

const EVENTS_CAPACITY: usize = 64;

/// The collaborators one route run drives.
#[derive(Debug)]
pub struct Collaborators {
    pub frames: Box<dyn FrameSource>,
    pub cutter: Box<dyn MinimapCutter>,
    pub estimator: Box<dyn PositionEstimator>,
    pub actuator: Box<dyn Actuator>,
    pub battle: Box<dyn AutoBattle>,
    pub maps: Box<dyn LargeMapStore>,
    pub transport: Box<dyn Transport>,
}

/// A route running on its own thread.
#[derive(Debug)]
pub struct RouteRun {
    operation: watch::Sender<Operation>,
    events: broadcast::Sender<RouteEvent>,
    handle: JoinHandle<Result<(), RouteFailure>>,
}

impl RouteRun {
    /// Starts running `route` from waypoint `start_index`.
    pub fn spawn(
        collaborators: Collaborators,
        route: Route,
        start_index: usize,
        settings: NavigationSettings,
    ) -> RouteRun {
        let (operation, operation_rx) = watch::channel(Operation::Running);
        let events = broadcast::channel(EVENTS_CAPACITY).0;
        let Collaborators {
            mut frames,
            cutter,
            estimator,
            actuator,
            battle,
            maps,
            transport,
        } = collaborators;
        let mut resources = Resources {
            actuator,
            battle,
            cutter,
            estimator,
            maps,
            transport,
            events: events.clone(),
            operation: Operation::Running,
            tick: 0,
        };
        let mut entity = RouteEntity::new(route, start_index, settings);
        let handle = thread::spawn(move || {
            run_route(&mut resources, &mut entity, frames.as_mut(), operation_rx)
        });

        RouteRun {
            operation,
            events,
            handle,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RouteEvent> {
        self.events.subscribe()
    }

    /// Pauses the run at the next tick.
    pub fn halt(&self) {
        self.operation.send_replace(Operation::Halting);
    }

    pub fn resume(&self) {
        self.operation.send_replace(Operation::Running);
    }

    /// Ends the run at the next tick with [`RouteFailure::Stopped`].
    pub fn stop(&self) {
        self.operation.send_replace(Operation::Stopping);
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the run ends and returns its outcome.
    pub fn wait(self) -> Result<(), RouteFailure> {
        self.handle.join().unwrap_or(Err(RouteFailure::Panicked))
    }
}

/// Ticks `route` until it completes or fails.
///
/// `operation` is only observed between ticks.
pub fn run_route(
    resources: &mut Resources,
    route: &mut RouteEntity,
    frames: &mut dyn FrameSource,
    operation: watch::Receiver<Operation>,
) -> Result<(), RouteFailure> {
    let interval = route.context.settings.tick();
    info!(
        target: "run",
        "running route {} from waypoint {}",
        route.context.route.name,
        route.context.start_index
    );

    loop_with_interval(interval, || {
        let requested = *operation.borrow();
        update_operation(resources, route, requested);
        if resources.operation.halting() {
            return ControlFlow::Continue(());
        }

        resources.tick += 1;
        if !route.state.is_terminal() {
            match frames.capture_frame() {
                Ok(frame) => {
                    let previous = route.state.clone();
                    run_system(resources, route, &frame);
                    if mem::discriminant(&previous) != mem::discriminant(&route.state) {
                        debug!(target: "run", "{previous} -> {}", route.state);
                    }
                }
                Err(err) => {
                    warn!(target: "run", "skipping tick {} capture failed {err}", resources.tick);
                }
            }
        }

        match &route.state {
            Navigation::Completed => {
                resources.actuator.stop_moving_forward();
                info!(target: "run", "route {} completed", route.context.route.name);
                resources.publish(RouteEvent::Completed);
                ControlFlow::Break(Ok(()))
            }
            Navigation::Failed(failure) => {
                resources.actuator.stop_moving_forward();
                error!(
                    target: "run",
                    "route {} failed at waypoint {} {failure}",
                    route.context.route.name,
                    route.context.index
                );
                resources.publish(RouteEvent::Failed(failure.clone()));
                ControlFlow::Break(Err(failure.clone()))
            }
            _ => ControlFlow::Continue(()),
        }
    })
}

fn update_operation(resources: &mut Resources, route: &mut RouteEntity, requested: Operation) {
    let current = resources.operation;
    if current == requested {
        return;
    }

    info!(target: "run", "operation changed from {current} to {requested}");
    resources.operation = requested;
    match (current, requested) {
        (_, Operation::Stopping) => {
            halt_system(resources, route);
            if !route.state.is_terminal() {
                route.state = Navigation::Failed(RouteFailure::Stopped);
            }
        }
        (_, Operation::Halting) => {
            halt_system(resources, route);
            resources.publish(RouteEvent::Halted);
        }
        (Operation::Halting, Operation::Running) => {
            resume_system(resources, route);
            resources.publish(RouteEvent::Resumed);
        }
        (_, Operation::Running) => (),
    }
}

#[inline]
fn loop_with_interval<T>(interval: Duration, mut on_tick: impl FnMut() -> ControlFlow<T>) -> T {
    #[cfg(debug_assertions)]
    const LOG_INTERVAL_SECS: u64 = 5;
    #[cfg(debug_assertions)]
    let mut last_logged_instant = Instant::now();

    loop {
        let start = Instant::now();

        if let ControlFlow::Break(value) = on_tick() {
            return value;
        }

        let now = Instant::now();
        let elapsed = now.duration_since(start);
        if elapsed <= interval {
            thread::sleep(interval - elapsed);
        } else {
            #[cfg(debug_assertions)]
            if now.duration_since(last_logged_instant).as_secs() >= LOG_INTERVAL_SECS {
                last_logged_instant = now;
                debug!(target: "run", "ticking running late at {}ms", elapsed.as_millis());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::assert_matches;

    use anyhow::anyhow;

    use super::*;
    use crate::{
        bridge::{
            Frame, Image, LargeMap, MinimapCrop, MockActuator, MockAutoBattle, MockFrameSource,
            MockLargeMapStore, MockMinimapCutter, MockTransport,
        },
        estimator::MockPositionEstimator,
        geometry::Point,
        models::Waypoint,
    };

    fn settings() -> NavigationSettings {
        NavigationSettings {
            tick_millis: 1,
            ..NavigationSettings::default()
        }
    }

    fn route() -> Route {
        Route {
            name: "loop".to_string(),
            area: "荒原".to_string(),
            start: Some(Point::new(0, 0)),
            waypoints: vec![Waypoint::new(100, 100)],
            ..Route::default()
        }
    }

    fn frames() -> MockFrameSource {
        let mut frames = MockFrameSource::default();
        frames.expect_capture_frame().returning(|| {
            Ok(Frame {
                image: Image::default(),
                timestamp: Instant::now(),
            })
        });
        frames
    }

    fn collaborators(position: Option<Point>) -> Collaborators {
        let mut cutter = MockMinimapCutter::default();
        cutter.expect_cut().returning(|_| MinimapCrop {
            view_angle: Some(45.0),
            play_area_mask_found: true,
            ..MinimapCrop::default()
        });
        let mut estimator = MockPositionEstimator::default();
        estimator
            .expect_estimate()
            .returning(move |_, _, _| position);
        let mut maps = MockLargeMapStore::default();
        maps.expect_reference_image().returning(|area| {
            Some(LargeMap {
                area: area.to_string(),
                image: Image::default(),
            })
        });
        let mut actuator = MockActuator::default();
        actuator.expect_start_moving_forward().return_const(());
        actuator.expect_stop_moving_forward().return_const(());
        actuator.expect_turn_by_angle_delta().return_const(());
        actuator.expect_turn_vertical().return_const(());
        actuator.expect_strafe().return_const(());
        let mut battle = MockAutoBattle::default();
        battle
            .expect_switch_to_best_movement_agent()
            .return_const(());

        Collaborators {
            frames: Box::new(frames()),
            cutter: Box::new(cutter),
            estimator: Box::new(estimator),
            actuator: Box::new(actuator),
            battle: Box::new(battle),
            maps: Box::new(maps),
            transport: Box::new(MockTransport::default()),
        }
    }

    #[test]
    fn run_route_completes_and_stops_moving() {
        let Collaborators {
            mut frames,
            cutter,
            estimator,
            actuator,
            battle,
            maps,
            transport,
        } = collaborators(Some(Point::new(98, 101)));
        let mut resources = Resources::new(None, None);
        resources.cutter = cutter;
        resources.estimator = estimator;
        resources.actuator = actuator;
        resources.battle = battle;
        resources.maps = maps;
        resources.transport = transport;
        let mut events = resources.events.subscribe();
        let mut entity = RouteEntity::new(route(), 0, settings());
        let (_operation, operation_rx) = watch::channel(Operation::Running);

        let result = run_route(&mut resources, &mut entity, frames.as_mut(), operation_rx);

        assert_eq!(result, Ok(()));
        assert_eq!(entity.state, Navigation::Completed);
        assert_eq!(events.try_recv().ok(), Some(RouteEvent::WaypointReached(0)));
        assert_eq!(events.try_recv().ok(), Some(RouteEvent::Completed));
    }

    #[test]
    fn run_route_reports_configuration_failure() {
        let mut maps = MockLargeMapStore::default();
        maps.expect_reference_image().once().return_const(None);
        let mut actuator = MockActuator::default();
        actuator.expect_stop_moving_forward().once().return_const(());
        let mut resources = Resources::new(Some(actuator), None);
        resources.maps = Box::new(maps);
        let mut entity = RouteEntity::new(route(), 0, settings());
        let (_operation, operation_rx) = watch::channel(Operation::Running);

        let result = run_route(&mut resources, &mut entity, &mut frames(), operation_rx);

        assert_matches!(result, Err(failure) if failure.is_configuration());
    }

    #[test]
    fn run_route_skips_failed_capture() {
        let mut attempts = 0;
        let mut frames = MockFrameSource::default();
        frames.expect_capture_frame().returning(move || {
            attempts += 1;
            if attempts == 1 {
                Err(anyhow!("window minimized"))
            } else {
                Ok(Frame {
                    image: Image::default(),
                    timestamp: Instant::now(),
                })
            }
        });
        let mut resources = Resources::new(None, None);
        resources.actuator = collaborators(None).actuator;
        let mut entity = RouteEntity::new(
            Route {
                waypoints: vec![],
                ..route()
            },
            0,
            settings(),
        );
        let (_operation, operation_rx) = watch::channel(Operation::Running);

        let result = run_route(&mut resources, &mut entity, &mut frames, operation_rx);

        assert_matches!(result, Err(RouteFailure::EmptyRoute(_)));
        assert_eq!(resources.tick, 2);
    }

    #[test]
    fn route_run_halts_resumes_and_stops() {
        let run = RouteRun::spawn(collaborators(None), route(), 0, settings());
        let mut events = run.subscribe();

        run.halt();
        while let Ok(event) = events.blocking_recv() {
            if event == RouteEvent::Halted {
                break;
            }
        }
        run.resume();
        while let Ok(event) = events.blocking_recv() {
            if event == RouteEvent::Resumed {
                break;
            }
        }
        run.stop();

        assert_eq!(run.wait(), Err(RouteFailure::Stopped));
        assert_eq!(
            events.blocking_recv().ok(),
            Some(RouteEvent::Failed(RouteFailure::Stopped))
        );
    }
}
