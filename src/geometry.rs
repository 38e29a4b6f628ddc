//! Per-frame geometric classification
//!
//! This module derives behavioral flags from a single landmark frame:
//! - Gaze deviation (yaw): nose offset from the ear midpoint
//! - Head tilt (roll): ear height asymmetry
//! - Smile: mouth width relative to face width

use crate::error::AnalysisError;
use crate::landmarks::{distance_2d, FacePoints};
use crate::types::{FrameClassification, LandmarkFrame, SignalDetails};

/// Absolute nose offset from the ear midpoint beyond which the subject is
/// looking away, as a fraction of normalized frame width
pub const YAW_THRESHOLD: f64 = 0.08;

/// Absolute ear height difference beyond which the head counts as tilted
pub const TILT_THRESHOLD: f64 = 0.05;

/// Mouth-to-face width ratio above which the frame counts as smiling
pub const SMILE_THRESHOLD: f64 = 0.48;

/// Classifier for deriving behavioral flags from one frame
pub struct GeometryClassifier;

impl GeometryClassifier {
    /// Classify a single frame.
    ///
    /// Pure and deterministic; fails only when a required landmark is
    /// absent. Threshold comparisons use the unrounded signal values;
    /// `details` carries the same values rounded to 3 decimals.
    pub fn classify(frame: &LandmarkFrame) -> Result<FrameClassification, AnalysisError> {
        let points = FacePoints::from_frame(frame)?;

        let yaw_deviation = compute_yaw_deviation(&points);
        let tilt_deviation = compute_tilt_deviation(&points);
        let smile_ratio = compute_smile_ratio(&points);

        Ok(FrameClassification {
            is_looking_away: yaw_deviation.abs() > YAW_THRESHOLD,
            is_smiling: smile_ratio > SMILE_THRESHOLD,
            is_tilted: tilt_deviation.abs() > TILT_THRESHOLD,
            details: SignalDetails {
                yaw_val: round3(yaw_deviation),
                smile_ratio: round3(smile_ratio),
                tilt_val: round3(tilt_deviation),
            },
        })
    }
}

/// Signed nose offset from the ear midpoint: nose.x - mean(ear xs).
/// A frontal face puts the nose at the horizontal midpoint of the ears.
fn compute_yaw_deviation(points: &FacePoints) -> f64 {
    let ear_mid_x = (points.left_ear.x + points.right_ear.x) / 2.0;
    points.nose_tip.x - ear_mid_x
}

/// Signed ear height difference: left_ear.y - right_ear.y
fn compute_tilt_deviation(points: &FacePoints) -> f64 {
    points.left_ear.y - points.right_ear.y
}

/// Mouth width over ear-to-ear width.
/// A zero face width yields 0: cannot determine, not smiling.
fn compute_smile_ratio(points: &FacePoints) -> f64 {
    let face_width = distance_2d(points.left_ear, points.right_ear);
    if face_width == 0.0 {
        return 0.0;
    }
    distance_2d(points.mouth_left, points.mouth_right) / face_width
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
