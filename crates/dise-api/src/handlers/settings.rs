//! Runtime configuration handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::config::resolve_api_key;
use crate::state::AppState;

/// Configuration surface for the page.
#[derive(Serialize)]
pub struct ConfigResponse {
    /// Active model identifier, shown in the page footer
    pub model: String,
    /// Whether a credential was detected in the secret store. The key
    /// itself never leaves the process.
    pub api_key_detected: bool,
}

/// Report the active model and credential status so the page can show
/// the detected / prompt-for-input indicator.
pub async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        model: state.gemini_config.model.clone(),
        api_key_detected: resolve_api_key().is_some(),
    })
}
