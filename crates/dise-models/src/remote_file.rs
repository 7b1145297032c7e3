//! Remote file lifecycle observed via the Files API.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Processing state the remote service reports for an uploaded file.
///
/// The service owns this state entirely; the local process only observes
/// it by polling. Unknown states deserialize as [`Unspecified`] and are
/// treated as still pending.
///
/// [`Unspecified`]: RemoteFileState::Unspecified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteFileState {
    /// The service is still ingesting the file.
    #[default]
    Processing,
    /// The file is ready for analysis.
    Active,
    /// Ingestion failed; the handle is unusable.
    Failed,
    /// Any state this client does not recognize.
    #[serde(other)]
    Unspecified,
}

impl RemoteFileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteFileState::Processing => "PROCESSING",
            RemoteFileState::Active => "ACTIVE",
            RemoteFileState::Failed => "FAILED",
            RemoteFileState::Unspecified => "STATE_UNSPECIFIED",
        }
    }

    /// True once the file can be referenced in an analysis call.
    pub fn is_ready(&self) -> bool {
        matches!(self, RemoteFileState::Active)
    }

    /// True if no further state changes are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteFileState::Active | RemoteFileState::Failed)
    }
}

impl fmt::Display for RemoteFileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
