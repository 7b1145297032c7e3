//! Gemini API client for DISE video analysis.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part as MultipartPart};
use reqwest::Client;
use tracing::{debug, info, warn};

use dise_models::{parse_report, AnalysisReport, RemoteFileState};

use crate::error::{GeminiError, GeminiResult};
use crate::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part, RemoteFile,
    UploadResponse,
};

/// Model used for the obstruction analysis, unless overridden.
pub const DEFAULT_MODEL: &str = "gemini-flash-lite-latest";

const SYSTEM_INSTRUCTION: &str = r#"
Você é um software médico de precisão para análise de DISE (Drug-Induced Sleep Endoscopy).
Analise o vídeo para quantificar a obstrução da via aérea.

Saída JSON obrigatória:
{
    "obstrucao_percentual": (int 0-100),
    "nivel_confianca": (int 0-100),
    "estrutura_colapsada": (string completa, ex: "Palato Mole e Úvula"),
    "padrao_colapso": (string completa, ex: "Concêntrico"),
    "analise_clinica": (string, resumo claro e direto em pt-BR)
}
"#;

const USER_PROMPT: &str = "Analise o grau máximo de obstrução (Nadir) neste vídeo.";

/// Configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API base URL
    pub base_url: String,
    /// Model identifier for generateContent
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
    /// Delay between readiness polls
    pub poll_interval: Duration,
    /// Status checks before the readiness wait gives up
    pub max_poll_attempts: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_millis(200),
            max_poll_attempts: 100,
        }
    }
}

impl GeminiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model: std::env::var("GEMINI_MODEL").unwrap_or(defaults.model),
            timeout: Duration::from_secs(
                std::env::var("GEMINI_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            ..defaults
        }
    }
}

/// Client for the Files and generateContent APIs.
#[derive(Debug)]
pub struct GeminiClient {
    api_key: String,
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    /// Create a new client. Fails when the key is empty so the pipeline
    /// is blocked before any remote call is attempted.
    pub fn new(api_key: impl Into<String>, config: GeminiConfig) -> GeminiResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GeminiError::MissingApiKey);
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(GeminiError::Network)?;

        Ok(Self {
            api_key,
            http,
            config,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Upload a local video to the Files API.
    ///
    /// The declared MIME type is always `video/mp4` in this pipeline,
    /// whatever the original container was.
    pub async fn upload_file(&self, path: &Path, mime_type: &str) -> GeminiResult<RemoteFile> {
        let bytes = tokio::fs::read(path).await?;
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.mp4".to_string());

        info!(size_bytes = bytes.len(), "Uploading video to the Files API");

        let metadata = serde_json::json!({ "file": { "display_name": display_name } });
        let form = Form::new()
            .part(
                "metadata",
                MultipartPart::text(metadata.to_string()).mime_str("application/json")?,
            )
            .part("file", MultipartPart::bytes(bytes).mime_str(mime_type)?);

        let url = format!(
            "{}/upload/v1beta/files?key={}",
            self.config.base_url, self.api_key
        );

        let response = self.http.post(&url).multipart(form).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::UploadFailed(format!(
                "service returned {}: {}",
                status, body
            )));
        }

        let uploaded: UploadResponse = response.json().await?;
        debug!(name = %uploaded.file.name, state = %uploaded.file.state, "Upload accepted");
        Ok(uploaded.file)
    }

    /// Fetch the current state of a remote file by resource name.
    pub async fn get_file(&self, name: &str) -> GeminiResult<RemoteFile> {
        let url = format!("{}/v1beta/{}?key={}", self.config.base_url, name, self.api_key);

        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::RequestFailed(format!(
                "get-file returned {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }

    /// Wait until an uploaded file is ready for analysis.
    ///
    /// Polls the file state at a fixed interval, invoking `on_progress`
    /// with the attempt number and observed state after each non-terminal
    /// check. Ready, failed, and timed-out are distinct outcomes; poll
    /// exhaustion never hands back an unready handle.
    pub async fn wait_until_active<F>(
        &self,
        file: RemoteFile,
        mut on_progress: F,
    ) -> GeminiResult<RemoteFile>
    where
        F: FnMut(u32, RemoteFileState),
    {
        match file.state {
            RemoteFileState::Active => return Ok(file),
            RemoteFileState::Failed => return Err(GeminiError::ProcessingFailed(file.name)),
            _ => {}
        }

        for attempt in 1..=self.config.max_poll_attempts {
            tokio::time::sleep(self.config.poll_interval).await;

            let current = self.get_file(&file.name).await?;
            match current.state {
                RemoteFileState::Active => {
                    info!(name = %current.name, attempts = attempt, "Remote file is ready");
                    return Ok(current);
                }
                RemoteFileState::Failed => {
                    warn!(name = %current.name, attempts = attempt, "Remote processing failed");
                    return Err(GeminiError::ProcessingFailed(current.name));
                }
                state => on_progress(attempt, state),
            }
        }

        Err(GeminiError::PollTimeout {
            name: file.name,
            attempts: self.config.max_poll_attempts,
        })
    }

    /// Request the structured obstruction report for a ready file.
    pub async fn analyze(&self, file: &RemoteFile) -> GeminiResult<AnalysisReport> {
        let mime_type = file.mime_type.as_deref().unwrap_or("video/mp4");

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::file(file, mime_type), Part::text(USER_PROMPT)],
            }],
            system_instruction: Content {
                parts: vec![Part::text(SYSTEM_INSTRUCTION)],
            },
            generation_config: GenerationConfig {
                temperature: 0.2,
                response_mime_type: "application/json".to_string(),
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.base_url, self.config.model, self.api_key
        );

        info!(model = %self.config.model, file = %file.name, "Requesting obstruction analysis");

        let response = self.http.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::RequestFailed(format!(
                "generateContent returned {}: {}",
                status, body
            )));
        }

        let body: GenerateContentResponse = response.json().await?;

        let text = body
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| GeminiError::InvalidResponse("no content in model response".to_string()))?;

        Ok(parse_report(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String, max_poll_attempts: u32) -> GeminiConfig {
        GeminiConfig {
            base_url,
            model: "test-model".to_string(),
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(1),
            max_poll_attempts,
        }
    }

    fn file_body(state: &str) -> serde_json::Value {
        serde_json::json!({
            "name": "files/abc-123",
            "uri": "https://example.invalid/files/abc-123",
            "mimeType": "video/mp4",
            "state": state,
        })
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let err = GeminiClient::new("  ", GeminiConfig::default()).unwrap_err();
        assert!(matches!(err, GeminiError::MissingApiKey));
    }

    #[test]
    fn test_config_defaults() {
        let config = GeminiConfig::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.poll_interval, Duration::from_millis(200));
        assert_eq!(config.max_poll_attempts, 100);
    }

    #[tokio::test]
    async fn test_upload_returns_initial_handle() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/upload/v1beta/files"))
            .and(query_param("key", "test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "file": file_body("PROCESSING") })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut video = tempfile::NamedTempFile::new().unwrap();
        video.write_all(b"not really mp4 bytes").unwrap();

        let client = GeminiClient::new("test-key", test_config(server.uri(), 100)).unwrap();
        let file = client.upload_file(video.path(), "video/mp4").await.unwrap();

        assert_eq!(file.name, "files/abc-123");
        assert_eq!(file.state, RemoteFileState::Processing);
    }

    #[tokio::test]
    async fn test_poll_returns_after_third_observation() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1beta/files/abc-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(file_body("PROCESSING")))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1beta/files/abc-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(file_body("ACTIVE")))
            .mount(&server)
            .await;

        let client = GeminiClient::new("test-key", test_config(server.uri(), 100)).unwrap();
        let pending: RemoteFile =
            serde_json::from_value(file_body("PROCESSING")).unwrap();

        let mut observed = Vec::new();
        let ready = client
            .wait_until_active(pending, |attempt, state| observed.push((attempt, state)))
            .await
            .unwrap();

        assert_eq!(ready.state, RemoteFileState::Active);
        // Two non-terminal observations, then the third stops the poll.
        assert_eq!(
            observed,
            vec![
                (1, RemoteFileState::Processing),
                (2, RemoteFileState::Processing)
            ]
        );
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_poll_stops_at_failed_state() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1beta/files/abc-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(file_body("PROCESSING")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1beta/files/abc-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(file_body("FAILED")))
            .mount(&server)
            .await;

        let client = GeminiClient::new("test-key", test_config(server.uri(), 100)).unwrap();
        let pending: RemoteFile =
            serde_json::from_value(file_body("PROCESSING")).unwrap();

        let err = client
            .wait_until_active(pending, |_, _| {})
            .await
            .unwrap_err();

        assert!(matches!(err, GeminiError::ProcessingFailed(_)));
        // Failure at the second observation ends the poll there.
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_poll_exhaustion_is_a_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1beta/files/abc-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(file_body("PROCESSING")))
            .mount(&server)
            .await;

        let client = GeminiClient::new("test-key", test_config(server.uri(), 5)).unwrap();
        let pending: RemoteFile =
            serde_json::from_value(file_body("PROCESSING")).unwrap();

        let err = client
            .wait_until_active(pending, |_, _| {})
            .await
            .unwrap_err();

        match err {
            GeminiError::PollTimeout { attempts, .. } => assert_eq!(attempts, 5),
            other => panic!("expected PollTimeout, got {other:?}"),
        }
        assert_eq!(server.received_requests().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_already_active_handle_skips_polling() {
        let server = MockServer::start().await;

        let client = GeminiClient::new("test-key", test_config(server.uri(), 100)).unwrap();
        let active: RemoteFile = serde_json::from_value(file_body("ACTIVE")).unwrap();

        let ready = client.wait_until_active(active, |_, _| {}).await.unwrap();
        assert!(ready.state.is_ready());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_parses_fenced_report() {
        let server = MockServer::start().await;

        let report_text = "```json\n{\"obstrucao_percentual\": 82, \"nivel_confianca\": 90, \
                           \"estrutura_colapsada\": \"Palato Mole e Úvula\", \
                           \"padrao_colapso\": \"Concêntrico\", \
                           \"analise_clinica\": \"Colapso severo.\"}\n```";

        Mock::given(method("POST"))
            .and(path("/v1beta/models/test-model:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": { "parts": [{ "text": report_text }] }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new("test-key", test_config(server.uri(), 100)).unwrap();
        let active: RemoteFile = serde_json::from_value(file_body("ACTIVE")).unwrap();

        let report = client.analyze(&active).await.unwrap();
        assert_eq!(report.obstrucao_percentual, 82);
        assert_eq!(report.estrutura_colapsada, "Palato Mole e Úvula");
    }

    #[tokio::test]
    async fn test_analyze_rejects_incomplete_report() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/test-model:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "{\"obstrucao_percentual\": 82}" }] }
                }]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new("test-key", test_config(server.uri(), 100)).unwrap();
        let active: RemoteFile = serde_json::from_value(file_body("ACTIVE")).unwrap();

        let err = client.analyze(&active).await.unwrap_err();
        assert!(err.to_string().contains("nivel_confianca"));
    }

    #[tokio::test]
    async fn test_analyze_rejects_empty_candidates() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/test-model:generateContent"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })),
            )
            .mount(&server)
            .await;

        let client = GeminiClient::new("test-key", test_config(server.uri(), 100)).unwrap();
        let active: RemoteFile = serde_json::from_value(file_body("ACTIVE")).unwrap();

        let err = client.analyze(&active).await.unwrap_err();
        assert!(matches!(err, GeminiError::InvalidResponse(_)));
    }
}
