use serde::{Deserialize, Serialize};

/// A coordinate in large-map pixel space.
///
/// `(0, 0)` is the top-left of the large map and `y` grows downward.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance between `self` and `other`.
    #[inline]
    pub fn distance(self, other: Point) -> f32 {
        let dx = (other.x - self.x) as f32;
        let dy = (other.y - self.y) as f32;
        dx.hypot(dy)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a square of side `2 * radius` centered at `center`.
    pub fn around(center: Point, radius: i32) -> Self {
        let radius = radius.max(0);
        Self::new(
            center.x - radius,
            center.y - radius,
            radius * 2,
            radius * 2,
        )
    }

    #[inline]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Intersection of `self` and `other` or [`None`] when they do not overlap.
    pub fn intersect(&self, other: Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        if right <= x || bottom <= y {
            return None;
        }

        Some(Rect::new(x, y, right - x, bottom - y))
    }
}

#[cfg(feature = "opencv")]
impl From<Rect> for opencv::core::Rect {
    fn from(value: Rect) -> Self {
        Self::new(value.x, value.y, value.width, value.height)
    }
}

/// Bearing in degrees in `[0, 360)` from `from` toward `to`.
///
/// Measured from the positive x-axis toward the positive y-axis, the same frame the minimap
/// view angle is reported in.
pub fn bearing(from: Point, to: Point) -> f32 {
    let dx = (to.x - from.x) as f32;
    let dy = (to.y - from.y) as f32;
    let degrees = dy.atan2(dx).to_degrees();
    if degrees < 0.0 {
        degrees + 360.0
    } else {
        degrees
    }
}

/// Signed smallest rotation in degrees that turns `from` into `to`, in `(-180, 180]`.
pub fn angle_delta(from: f32, to: f32) -> f32 {
    let delta = (to - from) % 360.0;
    if delta > 180.0 {
        delta - 360.0
    } else if delta <= -180.0 {
        delta + 360.0
    } else {
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_delta_wraps_around() {
        assert_eq!(angle_delta(350.0, 10.0), 20.0);
        assert_eq!(angle_delta(10.0, 350.0), -20.0);
        assert_eq!(angle_delta(0.0, 180.0), 180.0);
        assert_eq!(angle_delta(180.0, 0.0), 180.0);
        assert_eq!(angle_delta(90.0, 90.0), 0.0);
    }

    #[test]
    fn bearing_quadrants() {
        let origin = Point::new(100, 100);
        assert_eq!(bearing(origin, Point::new(200, 100)), 0.0);
        assert_eq!(bearing(origin, Point::new(100, 200)), 90.0);
        assert_eq!(bearing(origin, Point::new(0, 100)), 180.0);
        assert_eq!(bearing(origin, Point::new(100, 0)), 270.0);
    }

    #[test]
    fn rect_around_and_intersect() {
        let rect = Rect::around(Point::new(10, 10), 20);
        assert_eq!(rect, Rect::new(-10, -10, 40, 40));
        assert_eq!(
            rect.intersect(Rect::new(0, 0, 100, 100)),
            Some(Rect::new(0, 0, 30, 30))
        );
        assert_eq!(rect.intersect(Rect::new(50, 50, 10, 10)), None);
        assert_eq!(rect.center(), Point::new(10, 10));
    }

    #[test]
    fn point_distance() {
        assert_eq!(Point::new(0, 0).distance(Point::new(3, 4)), 5.0);
    }
}
