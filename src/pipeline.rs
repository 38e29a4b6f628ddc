//! Pipeline orchestration
//!
//! This module provides the one-shot public API for Mien. It orchestrates the
//! full pipeline from raw landmark frames to a finalized session outcome.

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use crate::aggregator::SessionAggregator;
use crate::error::AnalysisError;
use crate::geometry::GeometryClassifier;
use crate::narrative::{ReportProvider, RuleBasedNarrator};
use crate::types::{
    BatchPolicy, ClassifiedFrame, FrameBatch, LandmarkFrame, ProducerInfo, SessionOutcome,
};

/// Classify a batch of raw frames under the given policy.
///
/// Under `AbortOnError` the first invalid frame rejects the whole batch: the
/// error carries the failing frame's index, the count classified before it,
/// and the reason. Under `SkipInvalid` bad frames are dropped and the valid
/// remainder is returned.
pub fn classify_frames(
    frames: &[LandmarkFrame],
    policy: BatchPolicy,
) -> Result<Vec<ClassifiedFrame>, AnalysisError> {
    let mut classified = Vec::with_capacity(frames.len());

    for (index, frame) in frames.iter().enumerate() {
        match GeometryClassifier::classify(frame) {
            Ok(classification) => classified.push(ClassifiedFrame {
                timestamp_ms: frame.timestamp_ms,
                classification,
            }),
            Err(err) => match policy {
                BatchPolicy::AbortOnError => {
                    return Err(AnalysisError::BatchAborted {
                        index,
                        processed: classified.len(),
                        reason: err.to_string(),
                    })
                }
                BatchPolicy::SkipInvalid => continue,
            },
        }
    }

    Ok(classified)
}

/// Analyze a complete session in one shot.
///
/// Pipeline stages:
/// 1. GeometryClassifier - flag each frame (whole batch rejected on error)
/// 2. SessionAggregator - sort, bucket into windows, summarize
/// 3. RuleBasedNarrator - synthesize the report
pub fn analyze_frames(
    session_id: &str,
    frames: &[LandmarkFrame],
) -> Result<SessionOutcome, AnalysisError> {
    analyze_with_provider(session_id, frames, BatchPolicy::AbortOnError, &RuleBasedNarrator)
}

/// One-shot analysis with an explicit batch policy and report provider
pub fn analyze_with_provider(
    session_id: &str,
    frames: &[LandmarkFrame],
    policy: BatchPolicy,
    provider: &dyn ReportProvider,
) -> Result<SessionOutcome, AnalysisError> {
    let classified = classify_frames(frames, policy)?;

    let mut aggregator = SessionAggregator::new();
    aggregator.add_frames(classified);

    Ok(finalize_into_outcome(
        session_id.to_string(),
        None,
        aggregator,
        provider,
    ))
}

/// Analyze a JSON-encoded frame batch and return the outcome as JSON.
///
/// Accepts the submission payload shape `{"session_id": ..., "frames":
/// [...]}`; a missing session id gets a generated one.
pub fn analyze_json(batch_json: &str) -> Result<String, AnalysisError> {
    let batch: FrameBatch = serde_json::from_str(batch_json)?;
    let session_id = batch
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let outcome = analyze_frames(&session_id, &batch.frames)?;
    Ok(serde_json::to_string(&outcome)?)
}

/// Run the aggregation and narrative stages over an owned aggregator.
///
/// Taking the aggregator by value is what makes finalization final: the
/// frame collection cannot receive further writes once the outcome exists.
pub(crate) fn finalize_into_outcome(
    session_id: String,
    instance_id: Option<String>,
    mut aggregator: SessionAggregator,
    provider: &dyn ReportProvider,
) -> SessionOutcome {
    let frame_count = aggregator.frame_count();
    let observed_at_utc = aggregator
        .earliest_timestamp_ms()
        .and_then(|ts| Utc.timestamp_millis_opt(ts).single());

    let timeline = aggregator.generate_timeline();
    let report = provider.synthesize(&timeline);

    SessionOutcome {
        session_id,
        producer: ProducerInfo::current(instance_id),
        frame_count,
        observed_at_utc,
        computed_at_utc: Utc::now(),
        timeline,
        report,
    }
}
