use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::impl_identifiable;

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(skip_serializing, default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub navigation: NavigationSettings,
    #[serde(default)]
    pub priority: PriorityConfig,
}

impl_identifiable!(Settings);

/// Tunables of the route runner.
///
/// The defaults are tuned for one game's minimap scale and movement speed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavigationSettings {
    /// Distance in map units below which a target counts as reached.
    #[serde(default = "reach_distance_default")]
    pub reach_distance: f32,
    #[serde(default = "no_position_stop_millis_default")]
    pub no_position_stop_millis: u64,
    #[serde(default = "no_position_unstuck_millis_default")]
    pub no_position_unstuck_millis: u64,
    #[serde(default = "no_position_lost_millis_default")]
    pub no_position_lost_millis: u64,
    /// How long the position may stay near the anchor before counting as stuck.
    #[serde(default = "stuck_millis_default")]
    pub stuck_millis: u64,
    #[serde(default = "backtrack_timeout_millis_default")]
    pub backtrack_timeout_millis: u64,
    #[serde(default = "max_unstuck_attempts_default")]
    pub max_unstuck_attempts: u32,
    #[serde(default = "sensitivity_min_default")]
    pub sensitivity_min: f32,
    #[serde(default = "sensitivity_max_default")]
    pub sensitivity_max: f32,
    /// Maximum sensitivity change per calibration.
    #[serde(default = "sensitivity_step_default")]
    pub sensitivity_step: f32,
    /// Turns larger than this in degrees stop forward motion first.
    #[serde(default = "sharp_turn_degrees_default")]
    pub sharp_turn_degrees: f32,
    /// Assumed movement speed in map units per second used to grow the search window.
    #[serde(default = "search_speed_default")]
    pub search_speed: f32,
    #[serde(default = "search_lead_millis_default")]
    pub search_lead_millis: u64,
    #[serde(default = "camera_tilt_default")]
    pub camera_tilt: i32,
    #[serde(default = "tap_brake_millis_default")]
    pub tap_brake_millis: u64,
    #[serde(default = "battle_recheck_millis_default")]
    pub battle_recheck_millis: u64,
    #[serde(default = "battle_release_millis_default")]
    pub battle_release_millis: u64,
    #[serde(default = "tick_millis_default")]
    pub tick_millis: u64,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            reach_distance: reach_distance_default(),
            no_position_stop_millis: no_position_stop_millis_default(),
            no_position_unstuck_millis: no_position_unstuck_millis_default(),
            no_position_lost_millis: no_position_lost_millis_default(),
            stuck_millis: stuck_millis_default(),
            backtrack_timeout_millis: backtrack_timeout_millis_default(),
            max_unstuck_attempts: max_unstuck_attempts_default(),
            sensitivity_min: sensitivity_min_default(),
            sensitivity_max: sensitivity_max_default(),
            sensitivity_step: sensitivity_step_default(),
            sharp_turn_degrees: sharp_turn_degrees_default(),
            search_speed: search_speed_default(),
            search_lead_millis: search_lead_millis_default(),
            camera_tilt: camera_tilt_default(),
            tap_brake_millis: tap_brake_millis_default(),
            battle_recheck_millis: battle_recheck_millis_default(),
            battle_release_millis: battle_release_millis_default(),
            tick_millis: tick_millis_default(),
        }
    }
}

impl NavigationSettings {
    #[inline]
    pub fn no_position_stop(&self) -> Duration {
        Duration::from_millis(self.no_position_stop_millis)
    }

    #[inline]
    pub fn no_position_unstuck(&self) -> Duration {
        Duration::from_millis(self.no_position_unstuck_millis)
    }

    #[inline]
    pub fn no_position_lost(&self) -> Duration {
        Duration::from_millis(self.no_position_lost_millis)
    }

    #[inline]
    pub fn stuck(&self) -> Duration {
        Duration::from_millis(self.stuck_millis)
    }

    #[inline]
    pub fn backtrack_timeout(&self) -> Duration {
        Duration::from_millis(self.backtrack_timeout_millis)
    }

    #[inline]
    pub fn search_lead(&self) -> Duration {
        Duration::from_millis(self.search_lead_millis)
    }

    #[inline]
    pub fn tap_brake(&self) -> Duration {
        Duration::from_millis(self.tap_brake_millis)
    }

    #[inline]
    pub fn battle_recheck(&self) -> Duration {
        Duration::from_millis(self.battle_recheck_millis)
    }

    #[inline]
    pub fn battle_release(&self) -> Duration {
        Duration::from_millis(self.battle_release_millis)
    }

    #[inline]
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }
}

fn reach_distance_default() -> f32 {
    10.0
}

fn no_position_stop_millis_default() -> u64 {
    2000
}

fn no_position_unstuck_millis_default() -> u64 {
    4000
}

fn no_position_lost_millis_default() -> u64 {
    20000
}

fn stuck_millis_default() -> u64 {
    2000
}

fn backtrack_timeout_millis_default() -> u64 {
    6000
}

fn max_unstuck_attempts_default() -> u32 {
    6
}

fn sensitivity_min_default() -> f32 {
    0.5
}

fn sensitivity_max_default() -> f32 {
    2.0
}

fn sensitivity_step_default() -> f32 {
    0.02
}

fn sharp_turn_degrees_default() -> f32 {
    2.0
}

fn search_speed_default() -> f32 {
    50.0
}

fn search_lead_millis_default() -> u64 {
    1000
}

fn camera_tilt_default() -> i32 {
    300
}

fn tap_brake_millis_default() -> u64 {
    6
}

fn battle_recheck_millis_default() -> u64 {
    1000
}

fn battle_release_millis_default() -> u64 {
    5000
}

fn tick_millis_default() -> u64 {
    300
}

/// User-configured rules for picking among collectible candidates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriorityConfig {
    #[serde(default)]
    pub priority_1: Vec<String>,
    #[serde(default)]
    pub priority_2: Vec<String>,
    /// Pick newly available candidates first, higher level first.
    #[serde(default = "consider_new_default")]
    pub consider_new: bool,
    /// Fill remaining slots with candidates no rule matches.
    #[serde(default)]
    pub consider_not_in_priority: bool,
    /// Horizontal distance in pixels under which two recognized texts are the same card.
    #[serde(default = "merge_distance_default")]
    pub merge_distance: i32,
    /// Horizontal distance in pixels under which two candidates overlap.
    #[serde(default = "overlap_distance_default")]
    pub overlap_distance: i32,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            priority_1: vec![],
            priority_2: vec![],
            consider_new: consider_new_default(),
            consider_not_in_priority: false,
            merge_distance: merge_distance_default(),
            overlap_distance: overlap_distance_default(),
        }
    }
}

fn consider_new_default() -> bool {
    true
}

fn merge_distance_default() -> i32 {
    90
}

fn overlap_distance_default() -> i32 {
    200
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_empty_uses_defaults() {
        let settings = serde_json::from_str::<Settings>("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.navigation.reach_distance, 10.0);
        assert_eq!(settings.navigation.max_unstuck_attempts, 6);
        assert_eq!(settings.priority.merge_distance, 90);
        assert!(settings.priority.consider_new);
    }

    #[test]
    fn deserialize_partial_navigation() {
        let settings =
            serde_json::from_str::<Settings>(r#"{"navigation":{"reach_distance":15.0}}"#).unwrap();
        assert_eq!(settings.navigation.reach_distance, 15.0);
        assert_eq!(
            settings.navigation.backtrack_timeout(),
            Duration::from_secs(6)
        );
    }
}
