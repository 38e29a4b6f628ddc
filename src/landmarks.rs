//! Landmark names and the validated ingestion boundary
//!
//! Classification only ever touches five named points. This module resolves
//! them out of a raw frame before any arithmetic runs, so a missing landmark
//! surfaces as a typed error instead of a lookup failure mid-computation.

use crate::error::AnalysisError;
use crate::types::{LandmarkFrame, Point};

/// Nose tip landmark name
pub const NOSE_TIP: &str = "nose_tip";
/// Left ear landmark name
pub const LEFT_EAR: &str = "left_ear";
/// Right ear landmark name
pub const RIGHT_EAR: &str = "right_ear";
/// Left mouth corner landmark name
pub const MOUTH_LEFT: &str = "mouth_left";
/// Right mouth corner landmark name
pub const MOUTH_RIGHT: &str = "mouth_right";

/// Landmark names a frame must carry to be classifiable
pub const REQUIRED_LANDMARKS: [&str; 5] =
    [NOSE_TIP, LEFT_EAR, RIGHT_EAR, MOUTH_LEFT, MOUTH_RIGHT];

/// The five required points of one frame, resolved and validated
#[derive(Debug, Clone, Copy)]
pub struct FacePoints {
    pub nose_tip: Point,
    pub left_ear: Point,
    pub right_ear: Point,
    pub mouth_left: Point,
    pub mouth_right: Point,
}

impl FacePoints {
    /// Resolve the required landmarks from a raw frame.
    ///
    /// Fails on the first missing name in `REQUIRED_LANDMARKS` order. Extra
    /// landmark names in the frame (trackers often ship more points than we
    /// use) are ignored.
    pub fn from_frame(frame: &LandmarkFrame) -> Result<Self, AnalysisError> {
        Ok(Self {
            nose_tip: required(frame, NOSE_TIP)?,
            left_ear: required(frame, LEFT_EAR)?,
            right_ear: required(frame, RIGHT_EAR)?,
            mouth_left: required(frame, MOUTH_LEFT)?,
            mouth_right: required(frame, MOUTH_RIGHT)?,
        })
    }
}

fn required(frame: &LandmarkFrame, name: &str) -> Result<Point, AnalysisError> {
    frame.landmarks.get(name).copied().ok_or_else(|| {
        AnalysisError::MissingLandmark {
            name: name.to_string(),
        }
    })
}

/// Euclidean distance between two points in the x/y plane (z ignored)
pub fn distance_2d(a: Point, b: Point) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}
