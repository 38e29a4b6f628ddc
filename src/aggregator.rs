//! Session aggregation
//!
//! This module buffers classified frames for the lifetime of a session and
//! reduces them into a timeline of fixed-duration windows, each carrying a
//! dominant behavioral state and supporting metrics.

use crate::types::{ClassifiedFrame, EngagementState, SessionWindow, WindowMetrics};

/// Length of one timeline window in seconds of elapsed session time
pub const WINDOW_SIZE_SEC: f64 = 5.0;

/// Share of looking-away frames above which a window is Distracted
pub const DISTRACTED_PCT: f64 = 60.0;

/// Share of smiling frames above which a window is Enthusiastic
pub const ENTHUSIASTIC_PCT: f64 = 40.0;

/// Fraction of tilted frames above which a window is Contemplative
pub const CONTEMPLATIVE_RATIO: f64 = 0.3;

/// Stateful accumulator for one session's classified frames
///
/// Owns the frame collection exclusively; nothing else retains references to
/// it once a timeline has been produced.
#[derive(Debug, Default)]
pub struct SessionAggregator {
    frames: Vec<ClassifiedFrame>,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Append a batch of classified frames.
    ///
    /// No ordering is assumed or enforced at insertion; `generate_timeline`
    /// sorts. Empty batches are no-ops. Never fails.
    pub fn add_frames(&mut self, batch: Vec<ClassifiedFrame>) {
        self.frames.extend(batch);
    }

    /// Number of frames accumulated so far
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Capture time of the earliest frame accumulated so far
    pub fn earliest_timestamp_ms(&self) -> Option<i64> {
        self.frames.iter().map(|f| f.timestamp_ms).min()
    }

    /// Bucket accumulated frames into windows and summarize each.
    ///
    /// Sorts the frame collection in place first (stable, so frames with
    /// equal timestamps keep their insertion order), making the result
    /// independent of submission order. Windows containing no frames are
    /// skipped, never emitted as zero-filled placeholders. An aggregator
    /// with no frames yields an empty timeline.
    pub fn generate_timeline(&mut self) -> Vec<SessionWindow> {
        if self.frames.is_empty() {
            return Vec::new();
        }
        self.frames.sort_by_key(|f| f.timestamp_ms);
        let start_time = self.frames[0].timestamp_ms;

        let mut timeline = Vec::new();
        let mut current_idx: u64 = 0;
        let mut window: Vec<ClassifiedFrame> = Vec::new();

        for frame in &self.frames {
            let elapsed_sec = (frame.timestamp_ms - start_time) as f64 / 1000.0;
            let window_idx = (elapsed_sec / WINDOW_SIZE_SEC).floor() as u64;
            // Timestamps are sorted, so window indices never decrease
            if window_idx > current_idx {
                if !window.is_empty() {
                    timeline.push(summarize_window(current_idx, &window));
                }
                current_idx = window_idx;
                window.clear();
            }
            window.push(*frame);
        }
        if !window.is_empty() {
            timeline.push(summarize_window(current_idx, &window));
        }
        timeline
    }
}

/// Reduce one window's frames to a dominant state plus metrics.
///
/// Rules are evaluated in strict priority order; the first match wins. The
/// comparisons use exact counts and unrounded percentages; rounding applies
/// only to the reported metrics.
fn summarize_window(index: u64, frames: &[ClassifiedFrame]) -> SessionWindow {
    let count = frames.len();
    let look_away_count = frames
        .iter()
        .filter(|f| f.classification.is_looking_away)
        .count();
    let smile_count = frames.iter().filter(|f| f.classification.is_smiling).count();
    let tilt_count = frames.iter().filter(|f| f.classification.is_tilted).count();

    let pct_look_away = 100.0 * look_away_count as f64 / count as f64;
    let pct_smile = 100.0 * smile_count as f64 / count as f64;

    let state = if pct_look_away > DISTRACTED_PCT {
        EngagementState::Distracted
    } else if pct_smile > ENTHUSIASTIC_PCT {
        EngagementState::Enthusiastic
    } else if tilt_count as f64 > CONTEMPLATIVE_RATIO * count as f64 {
        EngagementState::Contemplative
    } else {
        EngagementState::Neutral
    };

    SessionWindow {
        time_range: window_label(index),
        state,
        metrics: WindowMetrics {
            looking_away_pct: round1(pct_look_away),
            smiling_pct: round1(pct_smile),
        },
    }
}

/// Canonical bucket label for a window index, e.g. index 1 -> "5-10s".
/// Derived from the index and window size, not from observed timestamps.
fn window_label(index: u64) -> String {
    let start = (index as f64 * WINDOW_SIZE_SEC) as u64;
    let end = ((index + 1) as f64 * WINDOW_SIZE_SEC) as u64;
    format!("{start}-{end}s")
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FrameClassification, SignalDetails};

    fn make_test_frame(
        timestamp_ms: i64,
        looking_away: bool,
        smiling: bool,
        tilted: bool,
    ) -> ClassifiedFrame {
        ClassifiedFrame {
            timestamp_ms,
            classification: FrameClassification {
                is_looking_away: looking_away,
                is_smiling: smiling,
                is_tilted: tilted,
                details: SignalDetails {
                    yaw_val: 0.0,
                    smile_ratio: 0.3,
                    tilt_val: 0.0,
                },
            },
        }
    }

    fn neutral_frames(timestamps: &[i64]) -> Vec<ClassifiedFrame> {
        timestamps
            .iter()
            .map(|&ts| make_test_frame(ts, false, false, false))
            .collect()
    }

    #[test]
    fn test_empty_aggregator_yields_empty_timeline() {
        let mut aggregator = SessionAggregator::new();
        assert!(aggregator.generate_timeline().is_empty());
        assert!(aggregator.is_empty());
    }

    #[test]
    fn test_empty_batch_is_a_noop() {
        let mut aggregator = SessionAggregator::new();
        aggregator.add_frames(Vec::new());
        assert_eq!(aggregator.frame_count(), 0);
    }

    #[test]
    fn test_thirteen_frames_spread_over_twelve_seconds() {
        let mut aggregator = SessionAggregator::new();
        let timestamps: Vec<i64> = (0..13).map(|i| i * 1000).collect();
        aggregator.add_frames(neutral_frames(&timestamps));

        let timeline = aggregator.generate_timeline();
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline[0].time_range, "0-5s");
        assert_eq!(timeline[1].time_range, "5-10s");
        assert_eq!(timeline[2].time_range, "10-15s");
    }

    #[test]
    fn test_window_indexing_starts_at_first_frame() {
        // First frame at 7_000 ms: elapsed time is measured from it
        let mut aggregator = SessionAggregator::new();
        aggregator.add_frames(neutral_frames(&[7_000, 8_000, 13_000]));

        let timeline = aggregator.generate_timeline();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].time_range, "0-5s");
        assert_eq!(timeline[1].time_range, "5-10s");
    }

    #[test]
    fn test_unpopulated_windows_are_skipped() {
        let mut aggregator = SessionAggregator::new();
        aggregator.add_frames(neutral_frames(&[0, 1_000, 20_000]));

        let timeline = aggregator.generate_timeline();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].time_range, "0-5s");
        assert_eq!(timeline[1].time_range, "20-25s");
    }

    #[test]
    fn test_timeline_is_invariant_to_submission_order() {
        let mut frames = Vec::new();
        for i in 0..12 {
            frames.push(make_test_frame(i * 1000, i % 3 == 0, i % 4 == 0, i % 2 == 0));
        }

        let mut forward = SessionAggregator::new();
        forward.add_frames(frames.clone());

        let mut reversed = SessionAggregator::new();
        let mut shuffled = frames.clone();
        shuffled.reverse();
        // Split across two submissions as well
        let tail = shuffled.split_off(5);
        reversed.add_frames(tail);
        reversed.add_frames(shuffled);

        assert_eq!(forward.generate_timeline(), reversed.generate_timeline());
    }

    #[test]
    fn test_distracted_takes_priority_over_smiling() {
        // 7/10 looking away and 5/10 smiling: the look-away rule fires first
        let mut aggregator = SessionAggregator::new();
        let frames: Vec<ClassifiedFrame> = (0..10)
            .map(|i| make_test_frame(i * 100, i < 7, i < 5, false))
            .collect();
        aggregator.add_frames(frames);

        let timeline = aggregator.generate_timeline();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].state, EngagementState::Distracted);
        assert!((timeline[0].metrics.looking_away_pct - 70.0).abs() < 1e-9);
        assert!((timeline[0].metrics.smiling_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_look_away_at_exactly_sixty_percent_is_not_distracted() {
        // 6/10 is not strictly above the threshold; smiling rule fires next
        let mut aggregator = SessionAggregator::new();
        let frames: Vec<ClassifiedFrame> = (0..10)
            .map(|i| make_test_frame(i * 100, i < 6, i < 5, false))
            .collect();
        aggregator.add_frames(frames);

        let timeline = aggregator.generate_timeline();
        assert_eq!(timeline[0].state, EngagementState::Enthusiastic);
    }

    #[test]
    fn test_tilt_rule_uses_exact_counts() {
        // 4/10 tilted exceeds the 0.3 ratio; 3/10 does not
        let mut contemplative = SessionAggregator::new();
        contemplative.add_frames(
            (0..10)
                .map(|i| make_test_frame(i * 100, false, false, i < 4))
                .collect(),
        );
        assert_eq!(
            contemplative.generate_timeline()[0].state,
            EngagementState::Contemplative
        );

        let mut neutral = SessionAggregator::new();
        neutral.add_frames(
            (0..10)
                .map(|i| make_test_frame(i * 100, false, false, i < 3))
                .collect(),
        );
        assert_eq!(neutral.generate_timeline()[0].state, EngagementState::Neutral);
    }

    #[test]
    fn test_percentages_are_rounded_to_one_decimal() {
        let mut aggregator = SessionAggregator::new();
        aggregator.add_frames(vec![
            make_test_frame(0, true, false, false),
            make_test_frame(100, false, false, false),
            make_test_frame(200, false, false, false),
        ]);

        let timeline = aggregator.generate_timeline();
        // 1/3 = 33.333..., reported as 33.3
        assert!((timeline[0].metrics.looking_away_pct - 33.3).abs() < 1e-9);
        assert!((timeline[0].metrics.smiling_pct - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_generate_timeline_is_repeatable() {
        let mut aggregator = SessionAggregator::new();
        aggregator.add_frames(neutral_frames(&[3_000, 0, 9_000, 1_000]));

        let first = aggregator.generate_timeline();
        let second = aggregator.generate_timeline();
        assert_eq!(first, second);
        assert_eq!(aggregator.frame_count(), 4);
    }

    #[test]
    fn test_window_wire_shape() {
        let mut aggregator = SessionAggregator::new();
        aggregator.add_frames(
            (0..10)
                .map(|i| make_test_frame(i * 100, i < 8, false, false))
                .collect(),
        );

        let timeline = aggregator.generate_timeline();
        let value = serde_json::to_value(&timeline).unwrap();
        assert_eq!(value[0]["time_range"], "0-5s");
        assert_eq!(value[0]["state"], "Distracted");
        assert_eq!(value[0]["metrics"]["looking_away_pct"], 80.0);
        assert_eq!(value[0]["metrics"]["smiling_pct"], 0.0);
    }
}
