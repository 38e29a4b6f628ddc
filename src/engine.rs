//! Session engine
//!
//! Keys aggregators by session identity so concurrent sessions never share
//! state. Each session's aggregator sits behind its own mutex inside a
//! read-write-locked registry: submissions to different sessions proceed
//! independently, while submissions to one session are serialized.
//! Finalization removes the aggregator from the registry and computes the
//! outcome on the owned value, so no further writes can land after it.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::aggregator::SessionAggregator;
use crate::error::AnalysisError;
use crate::narrative::{ReportProvider, RuleBasedNarrator};
use crate::pipeline::{classify_frames, finalize_into_outcome};
use crate::types::{BatchPolicy, LandmarkFrame, SessionOutcome};

type SessionMap = HashMap<String, Mutex<SessionAggregator>>;

/// Multi-session analysis engine.
///
/// Safe to share behind `Arc` across threads; the embedding transport calls
/// `submit_frames` as batches arrive and `finalize_session` when a session
/// ends. Frames are classified before any lock is taken.
pub struct AnalysisEngine {
    sessions: RwLock<SessionMap>,
    provider: Box<dyn ReportProvider + Send + Sync>,
    policy: BatchPolicy,
    instance_id: String,
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisEngine {
    /// Create an engine with the default batch policy and report provider
    pub fn new() -> Self {
        Self::with_provider(BatchPolicy::default(), Box::new(RuleBasedNarrator))
    }

    /// Create an engine with an explicit batch policy
    pub fn with_policy(policy: BatchPolicy) -> Self {
        Self::with_provider(policy, Box::new(RuleBasedNarrator))
    }

    /// Create an engine with an explicit policy and report provider
    pub fn with_provider(
        policy: BatchPolicy,
        provider: Box<dyn ReportProvider + Send + Sync>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            provider,
            policy,
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Identifier of this engine instance, carried in outcome provenance
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Batch policy this engine applies to submissions
    pub fn policy(&self) -> BatchPolicy {
        self.policy
    }

    /// Number of sessions currently accumulating frames
    pub fn active_sessions(&self) -> usize {
        self.read_sessions().len()
    }

    /// Frames accumulated so far for a session, if it exists
    pub fn frame_count(&self, session_id: &str) -> Option<usize> {
        let sessions = self.read_sessions();
        sessions
            .get(session_id)
            .map(|slot| lock_session(slot).frame_count())
    }

    /// Explicitly start a session and return its generated identifier.
    ///
    /// Optional: submitting to an unknown session id creates it as well.
    pub fn open_session(&self) -> String {
        let session_id = Uuid::new_v4().to_string();
        self.write_sessions()
            .insert(session_id.clone(), Mutex::new(SessionAggregator::new()));
        session_id
    }

    /// Classify a batch of frames and append them to the named session.
    ///
    /// The session is created on first submission. Returns the number of
    /// frames appended. Under `AbortOnError` a batch containing an invalid
    /// frame appends nothing and leaves previously accumulated state
    /// untouched; under `SkipInvalid` the valid remainder is appended.
    pub fn submit_frames(
        &self,
        session_id: &str,
        frames: &[LandmarkFrame],
    ) -> Result<usize, AnalysisError> {
        let classified = classify_frames(frames, self.policy)?;
        let accepted = classified.len();

        {
            let sessions = self.read_sessions();
            if let Some(slot) = sessions.get(session_id) {
                lock_session(slot).add_frames(classified);
                return Ok(accepted);
            }
        }

        let mut sessions = self.write_sessions();
        let slot = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Mutex::new(SessionAggregator::new()));
        lock_session(slot).add_frames(classified);
        Ok(accepted)
    }

    /// Parse a JSON array of landmark frames and submit it
    pub fn submit_frames_json(
        &self,
        session_id: &str,
        frames_json: &str,
    ) -> Result<usize, AnalysisError> {
        let frames: Vec<LandmarkFrame> = serde_json::from_str(frames_json)?;
        self.submit_frames(session_id, &frames)
    }

    /// Produce the timeline and narrative for a session and tear it down.
    ///
    /// The aggregator is removed from the registry before the timeline is
    /// computed, so no submission can interleave with finalization. Total:
    /// an unknown or never-submitted session yields the empty outcome, and a
    /// repeated finalize behaves like finalizing a fresh session.
    pub fn finalize_session(&self, session_id: &str) -> SessionOutcome {
        let removed = self.write_sessions().remove(session_id);
        let aggregator = match removed {
            Some(slot) => slot.into_inner().unwrap_or_else(PoisonError::into_inner),
            None => SessionAggregator::new(),
        };

        finalize_into_outcome(
            session_id.to_string(),
            Some(self.instance_id.clone()),
            aggregator,
            self.provider.as_ref(),
        )
    }

    /// Finalize a session and return the outcome as JSON
    pub fn finalize_session_json(&self, session_id: &str) -> Result<String, AnalysisError> {
        let outcome = self.finalize_session(session_id);
        Ok(serde_json::to_string(&outcome)?)
    }

    fn read_sessions(&self) -> RwLockReadGuard<'_, SessionMap> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_sessions(&self) -> RwLockWriteGuard<'_, SessionMap> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// A poisoned lock means a writer panicked elsewhere; the aggregator is
// structurally valid regardless, so recover the guard instead of propagating
fn lock_session(slot: &Mutex<SessionAggregator>) -> std::sync::MutexGuard<'_, SessionAggregator> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::EMPTY_TIMELINE_REPORT;
    use crate::types::{EngagementState, Point};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn make_landmark_frame(timestamp_ms: i64, looking_away: bool) -> LandmarkFrame {
        let nose_x = if looking_away { 0.62 } else { 0.5 };
        let mut landmarks = HashMap::new();
        landmarks.insert("nose_tip".to_string(), Point::new(nose_x, 0.45));
        landmarks.insert("left_ear".to_string(), Point::new(0.2, 0.5));
        landmarks.insert("right_ear".to_string(), Point::new(0.8, 0.5));
        landmarks.insert("mouth_left".to_string(), Point::new(0.4, 0.7));
        landmarks.insert("mouth_right".to_string(), Point::new(0.6, 0.7));
        LandmarkFrame {
            timestamp_ms,
            landmarks,
        }
    }

    fn frame_without_nose(timestamp_ms: i64) -> LandmarkFrame {
        let mut frame = make_landmark_frame(timestamp_ms, false);
        frame.landmarks.remove("nose_tip");
        frame
    }

    #[test]
    fn test_submission_creates_session() {
        let engine = AnalysisEngine::new();
        let processed = engine
            .submit_frames("sess-1", &[make_landmark_frame(0, false)])
            .unwrap();

        assert_eq!(processed, 1);
        assert_eq!(engine.active_sessions(), 1);
        assert_eq!(engine.frame_count("sess-1"), Some(1));
        assert_eq!(engine.frame_count("sess-2"), None);
    }

    #[test]
    fn test_finalize_tears_the_session_down() {
        let engine = AnalysisEngine::new();
        engine
            .submit_frames(
                "sess-1",
                &[
                    make_landmark_frame(0, true),
                    make_landmark_frame(1_000, true),
                ],
            )
            .unwrap();

        let outcome = engine.finalize_session("sess-1");
        assert_eq!(outcome.session_id, "sess-1");
        assert_eq!(outcome.frame_count, 2);
        assert_eq!(outcome.timeline.len(), 1);
        assert_eq!(outcome.timeline[0].state, EngagementState::Distracted);
        assert_eq!(engine.active_sessions(), 0);

        // A repeated finalize behaves like a fresh, empty session
        let again = engine.finalize_session("sess-1");
        assert!(again.timeline.is_empty());
        assert_eq!(again.report, EMPTY_TIMELINE_REPORT);
        assert_eq!(again.frame_count, 0);
    }

    #[test]
    fn test_unknown_session_finalizes_to_empty_outcome() {
        let engine = AnalysisEngine::new();
        let outcome = engine.finalize_session("never-seen");
        assert!(outcome.timeline.is_empty());
        assert_eq!(outcome.report, EMPTY_TIMELINE_REPORT);
        assert_eq!(outcome.producer.instance_id.as_deref(), Some(engine.instance_id()));
    }

    #[test]
    fn test_sessions_accumulate_independently() {
        let engine = AnalysisEngine::new();
        engine
            .submit_frames("a", &[make_landmark_frame(0, false)])
            .unwrap();
        engine
            .submit_frames(
                "b",
                &[
                    make_landmark_frame(0, false),
                    make_landmark_frame(100, false),
                ],
            )
            .unwrap();

        assert_eq!(engine.frame_count("a"), Some(1));
        assert_eq!(engine.frame_count("b"), Some(2));

        let outcome_a = engine.finalize_session("a");
        assert_eq!(outcome_a.frame_count, 1);
        assert_eq!(engine.frame_count("b"), Some(2));
    }

    #[test]
    fn test_aborted_batch_leaves_session_state_untouched() {
        let engine = AnalysisEngine::new();
        engine
            .submit_frames(
                "sess-1",
                &[
                    make_landmark_frame(0, false),
                    make_landmark_frame(1_000, false),
                ],
            )
            .unwrap();

        let err = engine
            .submit_frames(
                "sess-1",
                &[make_landmark_frame(2_000, false), frame_without_nose(3_000)],
            )
            .unwrap_err();

        match err {
            AnalysisError::BatchAborted {
                index, processed, ..
            } => {
                assert_eq!(index, 1);
                assert_eq!(processed, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Only the first batch is in the session
        assert_eq!(engine.frame_count("sess-1"), Some(2));
        let outcome = engine.finalize_session("sess-1");
        assert_eq!(outcome.frame_count, 2);
    }

    #[test]
    fn test_skip_policy_appends_valid_remainder() {
        let engine = AnalysisEngine::with_policy(BatchPolicy::SkipInvalid);
        let processed = engine
            .submit_frames(
                "sess-1",
                &[
                    make_landmark_frame(0, false),
                    frame_without_nose(500),
                    make_landmark_frame(1_000, false),
                ],
            )
            .unwrap();

        assert_eq!(processed, 2);
        assert_eq!(engine.frame_count("sess-1"), Some(2));
    }

    #[test]
    fn test_open_session_generates_identifier() {
        let engine = AnalysisEngine::new();
        let session_id = engine.open_session();

        assert!(!session_id.is_empty());
        assert_eq!(engine.active_sessions(), 1);
        assert_eq!(engine.frame_count(&session_id), Some(0));
    }

    #[test]
    fn test_concurrent_submissions_to_one_session() {
        let engine = Arc::new(AnalysisEngine::new());
        let mut handles = Vec::new();

        for worker in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(std::thread::spawn(move || {
                for i in 0..25 {
                    let ts = (worker * 25 + i) * 100;
                    engine
                        .submit_frames("shared", &[make_landmark_frame(ts, false)])
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.frame_count("shared"), Some(200));
        let outcome = engine.finalize_session("shared");
        assert_eq!(outcome.frame_count, 200);
    }

    #[test]
    fn test_custom_report_provider_is_honored() {
        struct CannedProvider;
        impl ReportProvider for CannedProvider {
            fn synthesize(&self, _timeline: &[crate::types::SessionWindow]) -> String {
                "canned report".to_string()
            }
        }

        let engine =
            AnalysisEngine::with_provider(BatchPolicy::AbortOnError, Box::new(CannedProvider));
        engine
            .submit_frames("sess-1", &[make_landmark_frame(0, false)])
            .unwrap();

        let outcome = engine.finalize_session("sess-1");
        assert_eq!(outcome.report, "canned report");
    }

    #[test]
    fn test_json_surfaces_round_trip() {
        let engine = AnalysisEngine::new();
        let frames_json = r#"[
            {
                "timestamp_ms": 0,
                "landmarks": {
                    "nose_tip": {"x": 0.5, "y": 0.45},
                    "left_ear": {"x": 0.2, "y": 0.5},
                    "right_ear": {"x": 0.8, "y": 0.5},
                    "mouth_left": {"x": 0.4, "y": 0.7},
                    "mouth_right": {"x": 0.6, "y": 0.7}
                }
            }
        ]"#;

        let processed = engine.submit_frames_json("sess-json", frames_json).unwrap();
        assert_eq!(processed, 1);

        let outcome_json = engine.finalize_session_json("sess-json").unwrap();
        let payload: serde_json::Value = serde_json::from_str(&outcome_json).unwrap();
        assert_eq!(payload["session_id"], "sess-json");
        assert_eq!(payload["frame_count"], 1);
        assert_eq!(payload["timeline"][0]["state"], "Neutral");
        assert!(payload["producer"]["instance_id"].is_string());
    }
}
