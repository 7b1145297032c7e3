//! Gemini client error types.

use thiserror::Error;

pub type GeminiResult<T> = Result<T, GeminiError>;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("API key is not configured")]
    MissingApiKey,

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Remote processing failed for {0}")]
    ProcessingFailed(String),

    #[error("File {name} not ready after {attempts} status checks")]
    PollTimeout { name: String, attempts: u32 },

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Report error: {0}")]
    Report(#[from] dise_models::ReportError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
