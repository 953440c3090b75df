use std::time::Duration;

use log::info;
use strum::{Display, EnumCount, EnumIter, IntoEnumIterator};

use crate::{bridge::MoveDirection, ecs::Resources};

/// Escape movements tried in order, one per unstuck maneuver.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display, EnumIter, EnumCount)]
pub enum UnstuckPattern {
    StrafeLeft,
    StrafeRight,
    BackLeftForwardShort,
    BackRightForwardShort,
    BackLeftForwardLong,
    BackRightForwardLong,
}

impl UnstuckPattern {
    /// The movements of this pattern, each held for its duration.
    pub fn steps(self) -> Vec<(MoveDirection, Duration)> {
        let short = Duration::from_secs(1);
        let long = Duration::from_secs(2);
        match self {
            UnstuckPattern::StrafeLeft => vec![(MoveDirection::Left, short)],
            UnstuckPattern::StrafeRight => vec![(MoveDirection::Right, short)],
            UnstuckPattern::BackLeftForwardShort => back_side_forward(MoveDirection::Left, short),
            UnstuckPattern::BackRightForwardShort => back_side_forward(MoveDirection::Right, short),
            UnstuckPattern::BackLeftForwardLong => back_side_forward(MoveDirection::Left, long),
            UnstuckPattern::BackRightForwardLong => back_side_forward(MoveDirection::Right, long),
        }
    }
}

#[inline]
fn back_side_forward(side: MoveDirection, hold: Duration) -> Vec<(MoveDirection, Duration)> {
    vec![
        (MoveDirection::Backward, hold),
        (side, hold),
        (MoveDirection::Forward, hold),
    ]
}

/// Cursor over [`UnstuckPattern`] that wraps around.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unstucking {
    cursor: usize,
}

impl Unstucking {
    /// Returns the pattern under the cursor and advances it.
    pub fn next_pattern(&mut self) -> UnstuckPattern {
        let pattern = UnstuckPattern::iter()
            .nth(self.cursor)
            .unwrap_or(UnstuckPattern::StrafeLeft);
        self.cursor = (self.cursor + 1) % UnstuckPattern::COUNT;
        pattern
    }
}

/// Performs one unstuck maneuver with the next pattern.
///
/// The active character is switched to the best movement agent before moving.
pub fn perform_unstuck(resources: &Resources, unstucking: &mut Unstucking) -> UnstuckPattern {
    let pattern = unstucking.next_pattern();
    info!(target: "stuck", "unstucking with {pattern}");

    resources.battle.switch_to_best_movement_agent();
    for (direction, duration) in pattern.steps() {
        resources.actuator.strafe(direction, duration);
    }

    pattern
}
