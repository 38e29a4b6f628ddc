//! Mien - engagement analytics for facial landmark session streams
//!
//! Mien turns per-frame facial landmark snapshots into a windowed behavioral
//! timeline and a short coaching narrative through a deterministic pipeline:
//! geometric classification → session aggregation → narrative synthesis.
//!
//! ## Modules
//!
//! - **One-shot pipeline**: Analyze a complete batch of frames in one call
//! - **Session engine**: Accumulate live submissions per session and finalize
//!   on demand

pub mod aggregator;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod landmarks;
pub mod narrative;
pub mod pipeline;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use aggregator::{SessionAggregator, WINDOW_SIZE_SEC};
pub use engine::AnalysisEngine;
pub use error::AnalysisError;
pub use geometry::{GeometryClassifier, SMILE_THRESHOLD, TILT_THRESHOLD, YAW_THRESHOLD};
pub use narrative::{coaching_prompt, ReportProvider, RuleBasedNarrator, EMPTY_TIMELINE_REPORT};
pub use pipeline::{analyze_frames, analyze_json, classify_frames};

// Data model exports
pub use types::{
    BatchPolicy, ClassifiedFrame, EngagementState, FrameBatch, FrameClassification,
    LandmarkFrame, Point, SessionOutcome, SessionWindow, SignalDetails, WindowMetrics,
};

/// Mien version embedded in all outcome payloads
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for outcome payloads
pub const PRODUCER_NAME: &str = "mien";
