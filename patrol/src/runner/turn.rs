use log::debug;

use crate::{geometry::angle_delta, models::NavigationSettings};

/// Commands below this magnitude are too small to calibrate from.
const COMMAND_EPSILON: f32 = 1e-6;

/// A horizontal turn to issue.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct TurnCommand {
    /// Calibrated degrees to pass to the actuator.
    pub degrees: f32,
    /// Whether forward motion must stop before turning.
    pub stop_first: bool,
}

/// Closed-loop bearing correction.
///
/// The commanded turn does not map one-to-one to the observed bearing change. Each call compares
/// the previous command against the bearing change it produced and nudges the sensitivity gain
/// toward the observed ratio.
#[derive(Clone, Copy, Debug)]
pub struct AdaptiveTurn {
    sensitivity: f32,
    last_bearing: Option<f32>,
    last_command: Option<f32>,
}

impl Default for AdaptiveTurn {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            last_bearing: None,
            last_command: None,
        }
    }
}

impl AdaptiveTurn {
    #[inline]
    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    /// Forgets the previous bearing and command.
    ///
    /// Called when the bearing could not be read so stale data is not calibrated against.
    #[inline]
    pub fn reset(&mut self) {
        self.last_bearing = None;
        self.last_command = None;
    }

    pub fn compute(
        &mut self,
        current: f32,
        target: f32,
        settings: &NavigationSettings,
    ) -> TurnCommand {
        let raw = angle_delta(current, target);

        if let Some(last_bearing) = self.last_bearing
            && let Some(last_command) = self.last_command
            && last_command.abs() > COMMAND_EPSILON
        {
            let actual = angle_delta(last_bearing, current);
            let theoretical = actual / last_command;
            let change = (theoretical - self.sensitivity)
                .clamp(-settings.sensitivity_step, settings.sensitivity_step);
            self.sensitivity = (self.sensitivity + change)
                .clamp(settings.sensitivity_min, settings.sensitivity_max);
            debug!(
                target: "turn",
                "calibrated sensitivity {} toward {theoretical}",
                self.sensitivity
            );
        }

        let degrees = raw * self.sensitivity;
        self.last_bearing = Some(current);
        self.last_command = Some(degrees);

        TurnCommand {
            degrees,
            stop_first: raw.abs() > settings.sharp_turn_degrees,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_first_call_uses_unit_sensitivity() {
        let settings = NavigationSettings::default();
        let mut turn = AdaptiveTurn::default();

        let command = turn.compute(350.0, 20.0, &settings);

        assert_eq!(command.degrees, 30.0);
        assert!(command.stop_first);
        assert_eq!(turn.sensitivity(), 1.0);
    }

    #[test]
    fn compute_fine_correction_keeps_moving() {
        let settings = NavigationSettings::default();
        let mut turn = AdaptiveTurn::default();

        let command = turn.compute(90.0, 91.5, &settings);

        assert!(!command.stop_first);
        assert_eq!(command.degrees, 1.5);
    }

    #[test]
    fn compute_nudges_sensitivity_by_at_most_step() {
        let settings = NavigationSettings::default();
        let mut turn = AdaptiveTurn::default();

        turn.compute(0.0, 10.0, &settings);
        // Commanded 10 degrees but the bearing changed by 20
        turn.compute(20.0, 30.0, &settings);
        assert!((turn.sensitivity() - 1.02).abs() < 1e-5);

        turn.reset();
        turn.compute(0.0, 10.0, &settings);
        // Commanded ~10.2 degrees but the bearing did not change
        turn.compute(0.0, 10.0, &settings);
        assert!((turn.sensitivity() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn compute_skips_calibration_after_zero_command() {
        let settings = NavigationSettings::default();
        let mut turn = AdaptiveTurn::default();

        turn.compute(45.0, 45.0, &settings);
        turn.compute(90.0, 100.0, &settings);

        assert_eq!(turn.sensitivity(), 1.0);
    }

    #[test]
    fn compute_sensitivity_stays_bounded() {
        let settings = NavigationSettings::default();
        let mut turn = AdaptiveTurn::default();
        let mut bearing = 0.0f32;
        let mut seed = 12345u32;

        for i in 0..5000 {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            let target = (seed % 360) as f32;
            // Alternate between wildly over and under turning
            bearing = if i % 3 == 0 {
                (bearing + 179.0) % 360.0
            } else {
                (bearing + (seed % 7) as f32) % 360.0
            };
            turn.compute(bearing, target, &settings);

            assert!(turn.sensitivity() >= settings.sensitivity_min);
            assert!(turn.sensitivity() <= settings.sensitivity_max);
        }
    }
}
