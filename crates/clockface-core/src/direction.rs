//! Head-direction classification from the nose-tip landmark.
//!
//! The classifier reduces a full landmark set to one horizontal coordinate:
//! the nose tip, normalized to [0, 1] across the frame. A 0.20-wide dead
//! zone centered on 0.5 absorbs frame-to-frame jitter — small head movement
//! near the middle never flips the classified direction. The thresholds are
//! part of the deployed calibration and must not drift.

use crate::types::{Direction, LandmarkSample};

/// Nose-x strictly below this classifies as Left.
pub const LEFT_THRESHOLD: f32 = 0.40;
/// Nose-x strictly above this classifies as Right.
pub const RIGHT_THRESHOLD: f32 = 0.60;

/// Classify a single landmark sample into a head direction.
///
/// Returns `None` when no face was found in the frame (or the coordinate is
/// not a number). "No signal" is distinct from `Center`: it can never
/// satisfy a challenge match.
pub fn classify(sample: &LandmarkSample) -> Option<Direction> {
    if !sample.found || sample.nose_x.is_nan() {
        return None;
    }
    if sample.nose_x < LEFT_THRESHOLD {
        Some(Direction::Left)
    } else if sample.nose_x > RIGHT_THRESHOLD {
        Some(Direction::Right)
    } else {
        Some(Direction::Center)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_left_of_dead_zone() {
        for x in [0.0, 0.1, 0.25, 0.399] {
            assert_eq!(
                classify(&LandmarkSample::face(x)),
                Some(Direction::Left),
                "x = {x}"
            );
        }
    }

    #[test]
    fn classifies_right_of_dead_zone() {
        for x in [0.601, 0.75, 0.9, 1.0] {
            assert_eq!(
                classify(&LandmarkSample::face(x)),
                Some(Direction::Right),
                "x = {x}"
            );
        }
    }

    #[test]
    fn classifies_dead_zone_as_center() {
        for x in [0.41, 0.5, 0.59] {
            assert_eq!(
                classify(&LandmarkSample::face(x)),
                Some(Direction::Center),
                "x = {x}"
            );
        }
    }

    #[test]
    fn boundary_values_are_center() {
        // Thresholds are strict inequalities: 0.40 and 0.60 land in the dead zone.
        assert_eq!(
            classify(&LandmarkSample::face(LEFT_THRESHOLD)),
            Some(Direction::Center)
        );
        assert_eq!(
            classify(&LandmarkSample::face(RIGHT_THRESHOLD)),
            Some(Direction::Center)
        );
    }

    #[test]
    fn no_face_yields_no_signal() {
        assert_eq!(classify(&LandmarkSample::no_face()), None);
    }

    #[test]
    fn nan_coordinate_yields_no_signal() {
        assert_eq!(classify(&LandmarkSample::face(f32::NAN)), None);
    }

    #[test]
    fn out_of_range_values_still_classify() {
        // Upstream trackers occasionally report slightly outside [0, 1] when
        // the face is partially out of frame; classify rather than reject.
        assert_eq!(
            classify(&LandmarkSample::face(-0.05)),
            Some(Direction::Left)
        );
        assert_eq!(
            classify(&LandmarkSample::face(1.05)),
            Some(Direction::Right)
        );
    }
}
