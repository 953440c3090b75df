use std::{
    fmt::Debug,
    time::{Duration, Instant},
};

use anyhow::Result;
#[cfg(test)]
use mockall::automock;
use strum::Display;

/// A BGRA image.
#[derive(Clone, Default)]
pub struct Image {
    pub width: i32,
    pub height: i32,
    pub data: Vec<u8>,
}

impl Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// A captured game frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: Image,
    /// When the frame was captured.
    ///
    /// All navigation timers are measured against this instead of the wall clock.
    pub timestamp: Instant,
}

/// A minimap cut out of a [`Frame`].
#[derive(Clone, Debug, Default)]
pub struct MinimapCrop {
    pub image: Image,
    /// Facing angle of the character in degrees if it can be read.
    pub view_angle: Option<f32>,
    /// Whether the open-world play area marker is visible.
    ///
    /// The marker is hidden while in combat.
    pub play_area_mask_found: bool,
}

/// The large-map reference image of one area.
#[derive(Clone, Debug)]
pub struct LargeMap {
    pub area: String,
    pub image: Image,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum MoveDirection {
    Forward,
    Backward,
    Left,
    Right,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum BattleResult {
    Victory,
    Defeat,
    Escaped,
}

/// A trait for grabbing frames from the game.
#[cfg_attr(test, automock)]
pub trait FrameSource: Debug + Send + 'static {
    fn capture_frame(&mut self) -> Result<Frame>;
}

/// A trait for extracting the minimap from a frame.
#[cfg_attr(test, automock)]
pub trait MinimapCutter: Debug + Send + 'static {
    fn cut(&self, frame: &Frame) -> MinimapCrop;
}

/// A trait for moving the character.
///
/// Calls are fire-and-forget except [`Self::strafe`] which holds the direction for `duration`.
#[cfg_attr(test, automock)]
pub trait Actuator: Debug + Send + 'static {
    fn start_moving_forward(&self);

    fn stop_moving_forward(&self);

    /// Rotates the view horizontally by `degrees`.
    fn turn_by_angle_delta(&self, degrees: f32);

    /// Rotates the camera pitch by `distance`.
    fn turn_vertical(&self, distance: i32);

    fn strafe(&self, direction: MoveDirection, duration: Duration);

    fn interact(&self);
}

/// A trait for the automatic combat collaborator.
#[cfg_attr(test, automock)]
pub trait AutoBattle: Debug + Send + 'static {
    fn start(&self);

    fn stop(&self);

    /// Polls combat state and returns [`Some`] once the fight is over.
    fn check_state(&self, frame: &Frame) -> Option<BattleResult>;

    /// Switches to the party member with the best movement.
    fn switch_to_best_movement_agent(&self);
}

/// A trait for loading large-map reference images.
#[cfg_attr(test, automock)]
pub trait LargeMapStore: Debug + Send + 'static {
    fn reference_image(&self, area: &str) -> Option<LargeMap>;
}

/// A trait for fast travel.
#[cfg_attr(test, automock)]
pub trait Transport: Debug + Send + 'static {
    fn fast_travel(&self, area: &str, point: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_debug_omits_bytes() {
        let image = Image {
            width: 2,
            height: 1,
            data: vec![0; 8],
        };
        assert_eq!(
            format!("{image:?}"),
            "Image { width: 2, height: 1, bytes: 8 }"
        );
    }
}
