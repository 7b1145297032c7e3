//! HTTP client for Google's Gemini media analysis APIs.
//!
//! Covers the three remote calls the analyzer makes:
//! - upload a local video to the Files API
//! - poll the file state until it is ready (bounded, with explicit
//!   ready / failed / timed-out outcomes)
//! - request the structured obstruction report via generateContent

pub mod client;
pub mod error;
pub mod types;

pub use client::{GeminiClient, GeminiConfig, DEFAULT_MODEL};
pub use error::{GeminiError, GeminiResult};
pub use types::RemoteFile;
