use std::{thread, time::Instant};

use log::{info, warn};

use super::{
    Battling, Navigation, NavigationContext, RouteEntity, RouteFailure,
    stuck::{NoPosition, StuckAction},
    unstuck::perform_unstuck,
};
use crate::{
    bridge::Frame,
    ecs::{Resources, RouteEvent},
    estimator::search_window,
    geometry::{Point, bearing},
    transition, transition_if, try_some_transition,
};

/// Follows the current waypoint for one tick.
///
/// Order per tick: battle check, position estimate, stuck escalation, steering, then arrival.
pub fn update_running_state(resources: &Resources, route: &mut RouteEntity, frame: &Frame) {
    let now = frame.timestamp;
    transition_if!(
        route,
        Navigation::Completed,
        route.context.index >= route.context.route.len()
    );

    let crop = resources.cutter.cut(frame);
    transition_if!(
        route,
        Navigation::InBattle(Battling::new(now)),
        !crop.play_area_mask_found,
        {
            info!(target: "battle", "play area marker missing, entering battle");
            resources.actuator.stop_moving_forward();
            resources.battle.start();
            resources.publish(RouteEvent::BattleStarted);
        }
    );

    let context = &route.context;
    let hint = search_window(
        context.position,
        context.stuck.no_position_elapsed(now),
        crop.image.height,
        &context.settings,
    );
    let map = try_some_transition!(
        route,
        Navigation::Failed(RouteFailure::MissingLargeMap(
            route.context.route.area.clone()
        )),
        route.context.large_map.as_ref()
    );
    let Some(position) = resources.estimator.estimate(map, &crop, hint) else {
        update_no_position_state(resources, route, now);
        return;
    };

    let context = &mut route.context;
    context.position = position;
    let previous = context.route.position_before(context.index);
    match context
        .stuck
        .on_position(now, position, previous, &context.settings)
    {
        StuckAction::None => (),
        StuckAction::BacktrackStarted(target) => {
            resources.actuator.stop_moving_forward();
            resources.publish(RouteEvent::BacktrackStarted(target));
        }
        StuckAction::BacktrackReached(target) => {
            resources.publish(RouteEvent::BacktrackReached(target));
        }
        StuckAction::BacktrackTimedOut(target) => {
            resources.publish(RouteEvent::BacktrackTimedOut(target));
            resources.actuator.stop_moving_forward();
            transition_if!(
                route,
                Navigation::Failed(RouteFailure::StuckLimitExceeded),
                !try_unstuck(resources, &mut route.context)
            );
        }
        StuckAction::Stuck => {
            resources.actuator.stop_moving_forward();
            transition_if!(
                route,
                Navigation::Failed(RouteFailure::StuckLimitExceeded),
                !try_unstuck(resources, &mut route.context)
            );
        }
    }

    let target = try_some_transition!(route, Navigation::Completed, route.context.target());
    turn_and_move(resources, &mut route.context, target, crop.view_angle);

    let context = &mut route.context;
    transition_if!(context.stuck.backtrack_target().is_some());
    transition_if!(position.distance(target) >= context.settings.reach_distance);

    info!(target: "route", "reached waypoint {} at {position:?}", context.index);
    resources.publish(RouteEvent::WaypointReached(context.index));
    context.index += 1;
    context.stuck.reset_attempts();
    transition_if!(
        route,
        Navigation::Completed,
        route.context.index >= route.context.route.len()
    );
    if route.context.route.is_move(route.context.index) {
        tap_brake(resources, &route.context);
    }
}

fn update_no_position_state(resources: &Resources, route: &mut RouteEntity, now: Instant) {
    let context = &mut route.context;
    match context.stuck.on_position_missing(now, &context.settings) {
        NoPosition::Onset => {
            resources
                .actuator
                .turn_vertical(context.settings.camera_tilt);
        }
        NoPosition::Wait => (),
        NoPosition::Stop => resources.actuator.stop_moving_forward(),
        NoPosition::Unstuck => {
            resources.actuator.stop_moving_forward();
            transition_if!(
                route,
                Navigation::Failed(RouteFailure::StuckLimitExceeded),
                !try_unstuck(resources, &mut route.context)
            );
        }
        NoPosition::Lost => {
            transition!(route, Navigation::Failed(RouteFailure::PositionLost), {
                warn!(target: "stuck", "position lost for too long");
            });
        }
    }
}

/// Performs an unstuck maneuver if the attempt budget allows.
///
/// Returns `false` when the budget is exhausted and no maneuver was performed.
fn try_unstuck(resources: &Resources, context: &mut NavigationContext) -> bool {
    let Some(attempt) = context
        .stuck
        .consume_attempt(context.settings.max_unstuck_attempts)
    else {
        warn!(target: "stuck", "stuck limit exceeded at waypoint {}", context.index);
        return false;
    };

    let pattern = perform_unstuck(resources, &mut context.unstucking);
    resources.publish(RouteEvent::Unstucking { attempt, pattern });
    true
}

/// Turns toward `target` and keeps moving forward.
fn turn_and_move(
    resources: &Resources,
    context: &mut NavigationContext,
    target: Point,
    view_angle: Option<f32>,
) {
    let Some(current) = view_angle else {
        context.turn.reset();
        resources.actuator.start_moving_forward();
        return;
    };

    let command = context.turn.compute(
        current,
        bearing(context.position, target),
        &context.settings,
    );
    if command.stop_first {
        resources.actuator.stop_moving_forward();
    }
    resources.actuator.turn_by_angle_delta(command.degrees);
    resources.actuator.start_moving_forward();
}

/// Briefly stops and resumes forward motion so the next heading starts from rest.
fn tap_brake(resources: &Resources, context: &NavigationContext) {
    resources.actuator.stop_moving_forward();
    thread::sleep(context.settings.tap_brake());
    resources.actuator.start_moving_forward();
}
