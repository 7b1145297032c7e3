//! Shared data models for the DISE analyzer backend.
//!
//! This crate provides Serde-serializable types for:
//! - The structured obstruction report returned by the inference service
//! - The remote file lifecycle observed while polling the Files API
//! - Pipeline phases exposed to the UI progress indicator
//! - Obstruction severity bands for the gauge

pub mod band;
pub mod pipeline;
pub mod remote_file;
pub mod report;

// Re-export common types
pub use band::ObstructionBand;
pub use pipeline::{AnalysisProgress, PipelinePhase};
pub use remote_file::RemoteFileState;
pub use report::{parse_report, AnalysisReport, ReportError};
