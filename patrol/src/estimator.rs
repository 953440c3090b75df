use std::{fmt::Debug, time::Duration};

#[cfg(test)]
use mockall::automock;

use crate::{
    bridge::{LargeMap, MinimapCrop},
    geometry::{Point, Rect},
    models::NavigationSettings,
};

/// A trait for resolving a minimap crop to a large-map position.
#[cfg_attr(test, automock)]
pub trait PositionEstimator: Debug + Send + 'static {
    /// Matches `crop` against `map` restricted to `hint`.
    ///
    /// Returns [`None`] when there is no confident match. This happens frequently and is not an
    /// error.
    fn estimate(&self, map: &LargeMap, crop: &MinimapCrop, hint: Rect) -> Option<Point>;
}

/// Computes the region of the large map to search the minimap in.
///
/// The window is centered at `last` and grows with the time spent without a position fix so a
/// character that kept moving while lost can still be found.
pub fn search_window(
    last: Point,
    elapsed_without_fix: Duration,
    minimap_size: i32,
    settings: &NavigationSettings,
) -> Rect {
    let seconds = (elapsed_without_fix + settings.search_lead()).as_secs_f32();
    let travel = (seconds * settings.search_speed).round() as i32;

    Rect::around(last, travel + minimap_size)
}

#[cfg(feature = "opencv")]
pub use template::TemplateMatchEstimator;

#[cfg(feature = "opencv")]
mod template {
    use anyhow::Result;
    use log::debug;
    use opencv::{
        core::{Mat, MatTraitConst, Point as CvPoint, Vec4b, min_max_loc, no_array},
        imgproc::{COLOR_BGRA2GRAY, TM_CCOEFF_NORMED, cvt_color_def, match_template},
    };

    use super::PositionEstimator;
    use crate::{
        bridge::{Image, LargeMap, MinimapCrop},
        geometry::{Point, Rect},
    };

    /// Default template matching threshold.
    const MATCH_THRESHOLD: f64 = 0.7;

    /// Estimates position by grayscale template matching the minimap against the large map.
    #[derive(Debug)]
    pub struct TemplateMatchEstimator {
        threshold: f64,
    }

    impl Default for TemplateMatchEstimator {
        fn default() -> Self {
            Self {
                threshold: MATCH_THRESHOLD,
            }
        }
    }

    impl TemplateMatchEstimator {
        pub fn new(threshold: f64) -> Self {
            Self { threshold }
        }

        fn try_estimate(
            &self,
            map: &LargeMap,
            crop: &MinimapCrop,
            hint: Rect,
        ) -> Result<Option<Point>> {
            let bounds = Rect::new(0, 0, map.image.width, map.image.height);
            let Some(region) = hint.intersect(bounds) else {
                return Ok(None);
            };
            if region.width < crop.image.width || region.height < crop.image.height {
                return Ok(None);
            }

            let large = to_grayscale(&map.image)?;
            let large = large.roi(region.into())?;
            let minimap = to_grayscale(&crop.image)?;

            let mut result = Mat::default();
            match_template(&large, &minimap, &mut result, TM_CCOEFF_NORMED, &no_array())?;
            let mut score = 0f64;
            let mut location = CvPoint::default();
            min_max_loc(
                &result,
                None,
                Some(&mut score),
                None,
                Some(&mut location),
                &no_array(),
            )?;
            if score < self.threshold {
                debug!(target: "estimator", "match score {score} below threshold");
                return Ok(None);
            }

            Ok(Some(Point::new(
                region.x + location.x + crop.image.width / 2,
                region.y + location.y + crop.image.height / 2,
            )))
        }
    }

    impl PositionEstimator for TemplateMatchEstimator {
        fn estimate(&self, map: &LargeMap, crop: &MinimapCrop, hint: Rect) -> Option<Point> {
            match self.try_estimate(map, crop, hint) {
                Ok(point) => point,
                Err(err) => {
                    debug!(target: "estimator", "template matching failed {err}");
                    None
                }
            }
        }
    }

    fn to_grayscale(image: &Image) -> Result<Mat> {
        let bgra = Mat::new_rows_cols_with_bytes::<Vec4b>(image.height, image.width, &image.data)?;
        let mut gray = Mat::default();
        cvt_color_def(&bgra, &mut gray, COLOR_BGRA2GRAY)?;
        Ok(gray)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_window_with_fix_uses_lead() {
        let settings = NavigationSettings::default();
        let window = search_window(Point::new(500, 500), Duration::ZERO, 100, &settings);
        // 1s lead * 50 units/s + 100
        assert_eq!(window, Rect::new(350, 350, 300, 300));
    }

    #[test]
    fn search_window_grows_without_fix() {
        let settings = NavigationSettings::default();
        let short = search_window(Point::new(0, 0), Duration::from_secs(1), 80, &settings);
        let long = search_window(Point::new(0, 0), Duration::from_secs(5), 80, &settings);
        assert_eq!(short.width, 2 * (100 + 80));
        assert_eq!(long.width, 2 * (300 + 80));
        assert_eq!(long.center(), Point::new(0, 0));
    }
}
