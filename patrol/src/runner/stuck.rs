use std::time::{Duration, Instant};

use log::{debug, info};

use crate::{geometry::Point, models::NavigationSettings};

/// What to do on a tick without a position.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NoPosition {
    /// The first tick of an episode.
    Onset,
    Wait,
    /// Stop moving forward and keep waiting.
    Stop,
    /// Perform the single unstuck maneuver of this episode.
    Unstuck,
    /// The position has been missing for too long.
    Lost,
}

/// What to do on a tick with a position.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StuckAction {
    None,
    /// Stop and drive toward the point instead of the current waypoint.
    BacktrackStarted(Point),
    BacktrackReached(Point),
    /// The backtrack did not reach the point in time and an unstuck attempt is due.
    BacktrackTimedOut(Point),
    /// Stuck with no backtrack available and an unstuck attempt is due.
    Stuck,
}

#[derive(Clone, Copy, Debug)]
struct Backtrack {
    target: Point,
    /// Restarted on the first position after an interruption when [`None`].
    deadline: Option<Instant>,
}

/// Tracks the two stuck signals of a route run.
///
/// Both signals share one unstuck attempt budget that only resets on waypoint arrival.
#[derive(Clone, Copy, Debug, Default)]
pub struct StuckTracker {
    no_position_since: Option<Instant>,
    no_position_unstucked: bool,
    anchor: Option<Point>,
    anchor_since: Option<Instant>,
    attempts: u32,
    backtrack: Option<Backtrack>,
    last_backtrack_target: Option<Point>,
}

impl StuckTracker {
    #[inline]
    pub fn backtrack_target(&self) -> Option<Point> {
        self.backtrack.map(|backtrack| backtrack.target)
    }

    /// Time spent without a position as of `now`.
    #[inline]
    pub fn no_position_elapsed(&self, now: Instant) -> Duration {
        self.no_position_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default()
    }

    /// Consumes one unstuck attempt.
    ///
    /// Returns the attempt number or [`None`] once the budget of `max` is exhausted, in which
    /// case no maneuver should be performed.
    pub fn consume_attempt(&mut self, max: u32) -> Option<u32> {
        self.attempts += 1;
        if self.attempts >= max {
            info!(target: "stuck", "unstuck attempts exhausted after {}", self.attempts);
            self.attempts = 0;
            return None;
        }

        Some(self.attempts)
    }

    #[inline]
    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
    }

    /// Restarts all timers after navigation was suspended.
    ///
    /// The attempt budget and backtrack target are kept. An active backtrack gets a full timeout
    /// again starting from the next position.
    pub fn interrupt(&mut self) {
        self.no_position_since = None;
        self.no_position_unstucked = false;
        self.anchor = None;
        self.anchor_since = None;
        if let Some(backtrack) = self.backtrack.as_mut() {
            backtrack.deadline = None;
        }
    }

    pub fn on_position_missing(
        &mut self,
        now: Instant,
        settings: &NavigationSettings,
    ) -> NoPosition {
        let Some(since) = self.no_position_since else {
            self.no_position_since = Some(now);
            self.no_position_unstucked = false;
            debug!(target: "stuck", "position lost");
            return NoPosition::Onset;
        };
        let elapsed = now.saturating_duration_since(since);

        if elapsed > settings.no_position_lost() {
            return NoPosition::Lost;
        }
        if elapsed >= settings.no_position_unstuck() && !self.no_position_unstucked {
            self.no_position_unstucked = true;
            return NoPosition::Unstuck;
        }
        if elapsed >= settings.no_position_stop() {
            return NoPosition::Stop;
        }

        NoPosition::Wait
    }

    /// Updates the tracker with the current `position`.
    ///
    /// `previous` is the position before the current waypoint and is used as the backtrack
    /// target.
    pub fn on_position(
        &mut self,
        now: Instant,
        position: Point,
        previous: Option<Point>,
        settings: &NavigationSettings,
    ) -> StuckAction {
        self.no_position_since = None;
        self.no_position_unstucked = false;

        if let Some(Backtrack { target, deadline }) = self.backtrack.as_mut() {
            let target = *target;
            if position.distance(target) < settings.reach_distance {
                info!(target: "stuck", "backtrack reached {target:?}");
                self.backtrack = None;
                self.reset_anchor(position);
                return StuckAction::BacktrackReached(target);
            }
            if now >= *deadline.get_or_insert(now + settings.backtrack_timeout()) {
                info!(target: "stuck", "backtrack to {target:?} timed out");
                self.backtrack = None;
                self.reset_anchor(position);
                return StuckAction::BacktrackTimedOut(target);
            }
            return StuckAction::None;
        }

        let near_anchor = self
            .anchor
            .is_some_and(|anchor| position.distance(anchor) < settings.reach_distance);
        if !near_anchor {
            self.reset_anchor(position);
            return StuckAction::None;
        }

        let since = *self.anchor_since.get_or_insert(now);
        if now.saturating_duration_since(since) <= settings.stuck() {
            return StuckAction::None;
        }

        self.reset_anchor(position);
        if let Some(target) = previous
            && self
                .last_backtrack_target
                .is_none_or(|last| last.distance(target) >= settings.reach_distance)
        {
            info!(target: "stuck", "stuck at {position:?}, backtracking to {target:?}");
            self.last_backtrack_target = Some(target);
            self.backtrack = Some(Backtrack {
                target,
                deadline: Some(now + settings.backtrack_timeout()),
            });
            return StuckAction::BacktrackStarted(target);
        }

        info!(target: "stuck", "stuck at {position:?} without backtrack");
        StuckAction::Stuck
    }

    #[inline]
    fn reset_anchor(&mut self, position: Point) {
        self.anchor = Some(position);
        self.anchor_since = None;
    }
}
