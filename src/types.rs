//! Core types for the Mien analysis pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: landmark frames, per-frame classifications, windowed timeline
//! summaries, and the finalized session outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single facial keypoint in normalized frame coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position, 0.0 (left edge) to 1.0 (right edge)
    pub x: f64,
    /// Vertical position, 0.0 (top edge) to 1.0 (bottom edge)
    pub y: f64,
    /// Depth estimate from the upstream tracker; accepted but never used
    #[serde(default)]
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// One landmark snapshot captured by the client-side face tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Capture time in epoch milliseconds
    pub timestamp_ms: i64,
    /// Landmark name to position; unknown names are accepted and ignored
    pub landmarks: HashMap<String, Point>,
}

/// Raw geometric signal values behind the boolean flags
///
/// These are not re-derivable from the flags alone and are preserved for
/// downstream diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalDetails {
    /// Signed horizontal offset of the nose from the ear midpoint
    pub yaw_val: f64,
    /// Mouth width over ear-to-ear width (0 when face width is zero)
    pub smile_ratio: f64,
    /// Signed ear height difference
    pub tilt_val: f64,
}

/// Behavioral flags derived from one frame's geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameClassification {
    /// Nose deviates from the ear midpoint beyond the yaw threshold
    pub is_looking_away: bool,
    /// Mouth-to-face width ratio exceeds the smile threshold
    pub is_smiling: bool,
    /// Ear height asymmetry exceeds the tilt threshold
    pub is_tilted: bool,
    /// Raw signal values, rounded to 3 decimals
    pub details: SignalDetails,
}

/// A classified frame, the unit stored by the session aggregator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedFrame {
    /// Capture time in epoch milliseconds
    pub timestamp_ms: i64,
    /// Flags and signal details for this frame
    pub classification: FrameClassification,
}

/// Dominant behavioral state assigned to a session window
///
/// Serialized as the bare variant name; these tokens are the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngagementState {
    Distracted,
    Enthusiastic,
    Contemplative,
    Neutral,
}

impl EngagementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementState::Distracted => "Distracted",
            EngagementState::Enthusiastic => "Enthusiastic",
            EngagementState::Contemplative => "Contemplative",
            EngagementState::Neutral => "Neutral",
        }
    }
}

/// Presentation metrics for one window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowMetrics {
    /// Share of frames flagged looking-away, percent rounded to 1 decimal
    pub looking_away_pct: f64,
    /// Share of frames flagged smiling, percent rounded to 1 decimal
    pub smiling_pct: f64,
}

/// Summary of one populated window of session time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionWindow {
    /// Canonical bucket boundary label, e.g. "5-10s"
    pub time_range: String,
    /// Dominant behavioral state for the window
    pub state: EngagementState,
    /// Supporting percentages
    pub metrics: WindowMetrics,
}

/// How a submission batch reacts to an invalid frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// The first invalid frame rejects the whole batch; nothing is appended
    AbortOnError,
    /// Invalid frames are dropped; valid frames are appended
    SkipInvalid,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        BatchPolicy::AbortOnError
    }
}

/// JSON submission payload accepted by the engine, CLI, and FFI surfaces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameBatch {
    /// Target session; optional for one-shot analysis
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Landmark frames, in any order
    pub frames: Vec<LandmarkFrame>,
}

/// Identifies the engine build that produced an outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerInfo {
    /// Producer name
    pub name: String,
    /// Producer version
    pub version: String,
    /// Engine instance that computed the outcome, if one was involved
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

impl ProducerInfo {
    /// Producer block for this build, optionally tied to an engine instance
    pub fn current(instance_id: Option<String>) -> Self {
        Self {
            name: crate::PRODUCER_NAME.to_string(),
            version: crate::ENGINE_VERSION.to_string(),
            instance_id,
        }
    }
}

/// Finalized result for one session
///
/// The `timeline` and `report` fields are the analytic contract; the rest is
/// provenance metadata for the embedding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutcome {
    /// Session this outcome belongs to
    pub session_id: String,
    /// Engine build provenance
    pub producer: ProducerInfo,
    /// Number of classified frames behind the timeline
    pub frame_count: usize,
    /// Capture time of the earliest frame, when any frames were observed
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_at_utc: Option<DateTime<Utc>>,
    /// When the outcome was computed
    pub computed_at_utc: DateTime<Utc>,
    /// Ordered window summaries; unpopulated windows are absent
    pub timeline: Vec<SessionWindow>,
    /// Narrative report over the timeline
    pub report: String,
}
