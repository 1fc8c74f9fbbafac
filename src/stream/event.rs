use serde::{Deserialize, Serialize};

use crate::models::{EstimationResult, EstimationSummary};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    Log {
        message: String,
    },
    Progress {
        processed: usize,
        total: usize,
    },
    /// `index` is the zero-based position of the result in the final list.
    Result {
        result: EstimationResult,
        index: usize,
        total: usize,
    },
    #[serde(rename_all = "camelCase")]
    Complete {
        summary: EstimationSummary,
        estimations: Vec<EstimationResult>,
        csv_content: String,
    },
    Error {
        message: String,
    },
}

impl ProgressEvent {
    /// SSE `event:` name.
    pub fn name(&self) -> &'static str {
        match self {
            ProgressEvent::Log { .. } => "log",
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::Result { .. } => "result",
            ProgressEvent::Complete { .. } => "complete",
            ProgressEvent::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Complete { .. } | ProgressEvent::Error { .. })
    }
}
