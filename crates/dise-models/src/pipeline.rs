//! Pipeline phase and progress models.
//!
//! The analyze request runs the whole pipeline inline; the page polls a
//! progress endpoint while that request is in flight. These types are the
//! shape of that polling surface.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Observable phase of an in-flight analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    /// No analysis has been started for this upload
    #[default]
    Pending,
    /// Pushing the local file to the remote service
    Uploading,
    /// Waiting for the remote service to report the file ready
    Processing,
    /// Inference call in flight
    Analyzing,
    /// Report available
    Completed,
    /// Pipeline failed
    Failed,
}

impl PipelinePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Analyzing => "analyzing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns true if no further phase changes are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true while the pipeline is doing work.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Uploading | Self::Processing | Self::Analyzing)
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of an in-flight analysis for the UI progress indicator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisProgress {
    /// Current pipeline phase
    pub phase: PipelinePhase,
    /// Progress through the readiness wait (0-100)
    pub percent: u8,
    /// Raw remote state label while waiting, e.g. "PROCESSING"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_label: Option<String>,
    /// Error message when the phase is failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisProgress {
    /// Reset to the given phase, clearing poll state from earlier phases.
    pub fn enter_phase(&mut self, phase: PipelinePhase) {
        self.phase = phase;
        self.percent = 0;
        self.state_label = None;
        if !matches!(phase, PipelinePhase::Failed) {
            self.error = None;
        }
    }

    /// Record one readiness-poll observation.
    pub fn record_poll(&mut self, attempt: u32, max_attempts: u32, label: &str) {
        self.percent = ((attempt.min(max_attempts) * 100) / max_attempts.max(1)) as u8;
        self.state_label = Some(label.to_string());
    }

    /// Mark the pipeline failed with an operator-visible message.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.phase = PipelinePhase::Failed;
        self.error = Some(message.into());
    }
}
