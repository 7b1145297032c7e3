//! Application state.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use uuid::Uuid;

use dise_gemini::GeminiConfig;
use dise_models::{AnalysisProgress, AnalysisReport};

use crate::config::ApiConfig;

/// One uploaded video and everything the pipeline derives from it.
///
/// The temp file stays on disk for as long as the session is held; there
/// is no cleanup pass. Nothing outlives the process.
pub struct UploadSession {
    pub id: Uuid,
    /// Filename as declared by the browser, kept for display only. The
    /// temp file itself is always suffixed `.mp4`.
    pub original_filename: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    temp_file: NamedTempFile,
    /// Progress cell polled by the page while an analysis is in flight
    progress: RwLock<AnalysisProgress>,
    /// Last validated report
    report: RwLock<Option<AnalysisReport>>,
    /// In-flight guard; one analysis per session at a time
    pub analysis_lock: Mutex<()>,
}

impl UploadSession {
    pub fn new(original_filename: impl Into<String>, temp_file: NamedTempFile, size_bytes: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_filename: original_filename.into(),
            size_bytes,
            created_at: Utc::now(),
            temp_file,
            progress: RwLock::new(AnalysisProgress::default()),
            report: RwLock::new(None),
            analysis_lock: Mutex::new(()),
        }
    }

    /// Local path of the materialized video.
    pub fn video_path(&self) -> &Path {
        self.temp_file.path()
    }

    pub fn progress(&self) -> AnalysisProgress {
        self.progress
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Mutate the progress cell. Writers never hold the lock across an
    /// await point.
    pub fn with_progress<R>(&self, f: impl FnOnce(&mut AnalysisProgress) -> R) -> R {
        let mut progress = self
            .progress
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut progress)
    }

    pub fn report(&self) -> Option<AnalysisReport> {
        self.report
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_report(&self, report: Option<AnalysisReport>) {
        *self.report.write().unwrap_or_else(PoisonError::into_inner) = report;
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub gemini_config: GeminiConfig,
    sessions: Arc<tokio::sync::RwLock<HashMap<Uuid, Arc<UploadSession>>>>,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            gemini_config: GeminiConfig::from_env(),
            sessions: Arc::new(tokio::sync::RwLock::new(HashMap::new())),
        }
    }

    /// Register a new upload session.
    pub async fn insert_session(&self, session: UploadSession) -> Arc<UploadSession> {
        let session = Arc::new(session);
        self.sessions
            .write()
            .await
            .insert(session.id, Arc::clone(&session));
        session
    }

    /// Look up a session by id.
    pub async fn session(&self, id: &Uuid) -> Option<Arc<UploadSession>> {
        self.sessions.read().await.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use dise_models::PipelinePhase;

    fn test_session() -> UploadSession {
        let temp_file = NamedTempFile::new().unwrap();
        UploadSession::new("video.mov", temp_file, 42)
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let state = AppState::new(ApiConfig::default());
        let session = state.insert_session(test_session()).await;

        let found = state.session(&session.id).await.unwrap();
        assert_eq!(found.original_filename, "video.mov");
        assert_eq!(found.size_bytes, 42);

        let missing = state.session(&Uuid::new_v4()).await;
        assert!(missing.is_none());
    }

    #[test]
    fn test_progress_updates_are_visible() {
        let session = test_session();
        session.with_progress(|p| p.enter_phase(PipelinePhase::Uploading));
        assert_eq!(session.progress().phase, PipelinePhase::Uploading);
    }

    #[test]
    fn test_temp_path_has_mp4_suffix() {
        let temp_file = tempfile::Builder::new()
            .prefix("dise-")
            .suffix(".mp4")
            .tempfile()
            .unwrap();
        let session = UploadSession::new("clip.avi", temp_file, 0);
        assert!(session.video_path().to_string_lossy().ends_with(".mp4"));
        assert_eq!(session.original_filename, "clip.avi");
    }
}
