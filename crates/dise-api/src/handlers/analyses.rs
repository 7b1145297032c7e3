//! Analysis pipeline handlers.
//!
//! The analyze request runs the whole upload → readiness poll → inference
//! sequence inline; from the operator's point of view the click blocks
//! until the report (or an error) comes back. The page polls the progress
//! endpoint while the request is in flight.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::response::Html;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use dise_gemini::GeminiClient;
use dise_models::{AnalysisProgress, AnalysisReport, PipelinePhase};

use crate::config::resolve_api_key;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::render::render_report;
use crate::state::{AppState, UploadSession};

/// Analyze request. The page sends the masked operator-entered key when
/// no key was detected in the secret store.
#[derive(Debug, Deserialize, Default)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Analyze response.
#[derive(Serialize)]
pub struct AnalyzeResponse {
    pub upload_id: Uuid,
    pub report: AnalysisReport,
}

/// Run the full analysis pipeline for an uploaded video.
pub async fn start_analysis(
    State(state): State<AppState>,
    Path(upload_id): Path<Uuid>,
    body: Option<Json<AnalyzeRequest>>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let session = state
        .session(&upload_id)
        .await
        .ok_or_else(|| ApiError::not_found("Upload not found"))?;

    // An empty resolution blocks the pipeline before any remote call.
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let api_key = resolve_credential(request.api_key).ok_or_else(|| {
        ApiError::missing_credential("Set GOOGLE_API_KEY or enter an API key in the page")
    })?;

    // One analysis per upload at a time.
    let _in_flight = session
        .analysis_lock
        .try_lock()
        .map_err(|_| ApiError::conflict("An analysis is already running for this upload"))?;

    let client = GeminiClient::new(api_key, state.gemini_config.clone())?;

    metrics::record_analysis_started();
    let started = Instant::now();
    info!(upload_id = %session.id, "Starting analysis pipeline");

    match run_pipeline(&state, &session, &client).await {
        Ok(report) => {
            metrics::record_analysis_completed(started.elapsed());
            info!(
                upload_id = %session.id,
                obstruction = report.obstrucao_percentual,
                confidence = report.nivel_confianca,
                "Analysis completed"
            );
            Ok(Json(AnalyzeResponse {
                upload_id: session.id,
                report,
            }))
        }
        Err(e) => {
            metrics::record_analysis_failed();
            warn!(upload_id = %session.id, error = %e, "Analysis failed");
            session.with_progress(|p| p.fail(e.to_string()));
            Err(e)
        }
    }
}

/// Operator-entered key takes precedence over the secret store.
fn resolve_credential(request_key: Option<String>) -> Option<String> {
    request_key
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .or_else(resolve_api_key)
}

/// The sequential pipeline: push the file, wait for readiness, run the
/// inference call, validate and store the report.
async fn run_pipeline(
    state: &AppState,
    session: &Arc<UploadSession>,
    client: &GeminiClient,
) -> ApiResult<AnalysisReport> {
    session.set_report(None);
    session.with_progress(|p| p.enter_phase(PipelinePhase::Uploading));

    let uploaded = client.upload_file(session.video_path(), "video/mp4").await?;

    session.with_progress(|p| p.enter_phase(PipelinePhase::Processing));
    let max_attempts = state.gemini_config.max_poll_attempts;
    let poll_session = Arc::clone(session);
    let ready = client
        .wait_until_active(uploaded, move |attempt, observed| {
            poll_session.with_progress(|p| {
                p.record_poll(attempt, max_attempts, observed.as_str());
            });
            metrics::record_poll_attempt();
        })
        .await?;

    session.with_progress(|p| p.enter_phase(PipelinePhase::Analyzing));
    let report = client.analyze(&ready).await?;

    session.set_report(Some(report.clone()));
    session.with_progress(|p| {
        p.enter_phase(PipelinePhase::Completed);
        p.percent = 100;
    });

    Ok(report)
}

/// Progress snapshot for the page's indicator.
pub async fn get_progress(
    State(state): State<AppState>,
    Path(upload_id): Path<Uuid>,
) -> ApiResult<Json<AnalysisProgress>> {
    let session = state
        .session(&upload_id)
        .await
        .ok_or_else(|| ApiError::not_found("Upload not found"))?;

    Ok(Json(session.progress()))
}

/// Last validated report as JSON.
pub async fn get_report(
    State(state): State<AppState>,
    Path(upload_id): Path<Uuid>,
) -> ApiResult<Json<AnalysisReport>> {
    let session = state
        .session(&upload_id)
        .await
        .ok_or_else(|| ApiError::not_found("Upload not found"))?;

    session
        .report()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("No report available for this upload"))
}

/// Last validated report rendered as an HTML fragment.
pub async fn get_report_html(
    State(state): State<AppState>,
    Path(upload_id): Path<Uuid>,
) -> ApiResult<Html<String>> {
    let session = state
        .session(&upload_id)
        .await
        .ok_or_else(|| ApiError::not_found("Upload not found"))?;

    session
        .report()
        .map(|report| Html(render_report(&report)))
        .ok_or_else(|| ApiError::not_found("No report available for this upload"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_key_takes_precedence() {
        assert_eq!(
            resolve_credential(Some("operator-key".to_string())).as_deref(),
            Some("operator-key")
        );
    }

    #[test]
    fn test_operator_key_is_trimmed() {
        assert_eq!(
            resolve_credential(Some("  operator-key \n".to_string())).as_deref(),
            Some("operator-key")
        );
    }
}
