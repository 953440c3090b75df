use std::time::Instant;

use log::info;

use super::{Navigation, RouteEntity};
use crate::{bridge::Frame, ecs::Resources, ecs::RouteEvent, transition, transition_if};

/// Battle sub-phases.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Battling {
    /// Auto-battle is running.
    ///
    /// `last_check` is when the minimap was last checked for the play area marker.
    Fighting { last_check: Instant },
    /// The battle is over and controls are being released until `until`.
    Releasing { until: Instant },
}

impl Battling {
    #[inline]
    pub fn new(now: Instant) -> Self {
        Battling::Fighting { last_check: now }
    }
}

pub fn update_battle_state(
    resources: &Resources,
    route: &mut RouteEntity,
    frame: &Frame,
    battling: Battling,
) {
    let now = frame.timestamp;
    let settings = &route.context.settings;

    match battling {
        Battling::Fighting { last_check } => {
            let release = Navigation::InBattle(Battling::Releasing {
                until: now + settings.battle_release(),
            });
            if let Some(result) = resources.battle.check_state(frame) {
                transition!(route, release, {
                    info!(target: "battle", "battle ended with {result}");
                    resources.battle.stop();
                    resources.actuator.stop_moving_forward();
                    resources.publish(RouteEvent::BattleEnded(Some(result)));
                });
            }

            transition_if!(now.saturating_duration_since(last_check) < settings.battle_recheck());
            transition_if!(
                route,
                release,
                resources.cutter.cut(frame).play_area_mask_found,
                {
                    info!(target: "battle", "play area marker found, leaving battle");
                    resources.battle.stop();
                    resources.actuator.stop_moving_forward();
                    resources.publish(RouteEvent::BattleEnded(None));
                }
            );
            transition!(
                route,
                Navigation::InBattle(Battling::Fighting { last_check: now })
            );
        }
        Battling::Releasing { until } => {
            transition_if!(now < until);

            info!(target: "battle", "controls released, resuming route");
            resources.actuator.turn_vertical(settings.camera_tilt);
            resources.battle.switch_to_best_movement_agent();
            route.context.stuck.interrupt();
            route.context.turn.reset();
            transition!(route, Navigation::RunningWaypoints);
        }
    }
}
