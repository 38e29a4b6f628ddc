//! Narrative report synthesis
//!
//! The final stage turns a window timeline into a short coaching narrative.
//! It sits behind a narrow provider trait so the deterministic rule engine
//! shipped here can later be swapped for a generative-text backend without
//! disturbing the rest of the pipeline. Any such backend must fully resolve
//! its result before returning so the pipeline contract stays synchronous.

use crate::types::{EngagementState, SessionWindow};

/// Report returned for a timeline with no windows
pub const EMPTY_TIMELINE_REPORT: &str = "No data collected.";

/// Synthesizes the session report from a finalized timeline.
///
/// Implementations must be total and deterministic for a given timeline.
pub trait ReportProvider {
    fn synthesize(&self, timeline: &[SessionWindow]) -> String;
}

/// Deterministic rule-based report provider, the default.
///
/// Picks an opening line from the first window's state, a body line from the
/// majority state across all windows, and a fixed closing recommendation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedNarrator;

impl ReportProvider for RuleBasedNarrator {
    fn synthesize(&self, timeline: &[SessionWindow]) -> String {
        if timeline.is_empty() {
            return EMPTY_TIMELINE_REPORT.to_string();
        }

        let mut report = String::from("Analysis of your session:\n");

        match timeline[0].state {
            EngagementState::Enthusiastic => {
                report.push_str("You started the session with high energy and enthusiasm.");
            }
            EngagementState::Distracted => {
                report.push_str(
                    "At the beginning, you seemed a bit distracted or were checking your surroundings.",
                );
            }
            _ => {
                report.push_str("You started with a calm, neutral focus.");
            }
        }

        let total = timeline.len();
        let distracted_count = timeline
            .iter()
            .filter(|w| w.state == EngagementState::Distracted)
            .count();
        let smiling_count = timeline
            .iter()
            .filter(|w| w.state == EngagementState::Enthusiastic)
            .count();

        // Majority means strictly more than half; ties fall through
        if distracted_count * 2 > total {
            report.push_str(
                "\nHowever, throughout most of the session, you frequently looked away from the camera. This might signal disinterest or multitasking.",
            );
        } else if smiling_count * 2 > total {
            report.push_str(
                "\nYou maintained a very positive and warm presence throughout, smiling frequently.",
            );
        } else {
            report.push_str("\nYou maintained steady focus for the majority of the time.");
        }

        report.push_str(
            "\nRecommendation: Try to maintain consistent eye contact for better engagement.",
        );

        report
    }
}

/// Render the prompt a generative-text provider would receive: coaching
/// context, the timeline as indented JSON, and the task instruction.
pub fn coaching_prompt(timeline: &[SessionWindow]) -> String {
    let data = serde_json::to_string_pretty(timeline).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You are a communication coach analyzing a video session. Here is the behavior timeline:\n{data}\nProvide a brief narrative interpretation of the user's engagement and behavior over time. Focus on the progression."
    )
}
