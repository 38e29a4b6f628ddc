//! Error types for Mien

use thiserror::Error;

/// Errors that can occur during analysis
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Missing required landmark: {name}")]
    MissingLandmark { name: String },

    #[error("Frame {index} rejected ({reason}); {processed} frames classified before failure")]
    BatchAborted {
        index: usize,
        processed: usize,
        reason: String,
    },

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid payload: {0}")]
    ParseError(String),
}
