//! The structured obstruction report contract.
//!
//! The inference service is instructed to return a single JSON object with
//! exactly these five fields. Anything missing, mistyped, or out of range
//! rejects the whole report; there is no partial rendering.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Parsed and validated analysis result for one video.
///
/// Field names are the wire contract with the inference service and stay
/// in pt-BR exactly as the model is instructed to emit them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct AnalysisReport {
    /// Maximum airway obstruction observed across the video (0-100).
    #[validate(range(max = 100))]
    pub obstrucao_percentual: u8,

    /// Model-reported confidence in the reading (0-100).
    #[validate(range(max = 100))]
    pub nivel_confianca: u8,

    /// Anatomical structure that collapses, e.g. "Palato Mole e Úvula".
    #[validate(length(min = 1))]
    pub estrutura_colapsada: String,

    /// Collapse pattern, e.g. "Concêntrico".
    #[validate(length(min = 1))]
    pub padrao_colapso: String,

    /// Free-text clinical narrative (pt-BR).
    pub analise_clinica: String,
}

/// Errors produced while turning model response text into a report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("response is not valid report JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("report failed validation: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// Strip a markdown code fence around a model response, if present.
///
/// Models occasionally wrap JSON output in ```json fences even when asked
/// for a bare JSON body.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_prefix("```").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

/// Parse model response text into a validated [`AnalysisReport`].
pub fn parse_report(text: &str) -> Result<AnalysisReport, ReportError> {
    let report: AnalysisReport = serde_json::from_str(strip_code_fences(text))?;
    report.validate()?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = r#"{
        "obstrucao_percentual": 82,
        "nivel_confianca": 90,
        "estrutura_colapsada": "Palato Mole e Úvula",
        "padrao_colapso": "Concêntrico",
        "analise_clinica": "Colapso severo observado no nadir."
    }"#;

    #[test]
    fn test_parse_well_formed_report() {
        let report = parse_report(WELL_FORMED).unwrap();
        assert_eq!(report.obstrucao_percentual, 82);
        assert_eq!(report.nivel_confianca, 90);
        assert_eq!(report.estrutura_colapsada, "Palato Mole e Úvula");
        assert_eq!(report.padrao_colapso, "Concêntrico");
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let text = r#"{
            "obstrucao_percentual": 82,
            "estrutura_colapsada": "Palato Mole",
            "padrao_colapso": "Concêntrico",
            "analise_clinica": "..."
        }"#;
        let err = parse_report(text).unwrap_err();
        assert!(err.to_string().contains("nivel_confianca"));
    }

    #[test]
    fn test_mistyped_field_is_rejected() {
        let text = r#"{
            "obstrucao_percentual": "82",
            "nivel_confianca": 90,
            "estrutura_colapsada": "Palato Mole",
            "padrao_colapso": "Concêntrico",
            "analise_clinica": "..."
        }"#;
        assert!(matches!(parse_report(text), Err(ReportError::Json(_))));
    }

    #[test]
    fn test_out_of_range_percentage_is_rejected() {
        let text = r#"{
            "obstrucao_percentual": 150,
            "nivel_confianca": 90,
            "estrutura_colapsada": "Palato Mole",
            "padrao_colapso": "Concêntrico",
            "analise_clinica": "..."
        }"#;
        assert!(matches!(parse_report(text), Err(ReportError::Invalid(_))));
    }

    #[test]
    fn test_empty_structure_is_rejected() {
        let text = r#"{
            "obstrucao_percentual": 40,
            "nivel_confianca": 90,
            "estrutura_colapsada": "",
            "padrao_colapso": "Concêntrico",
            "analise_clinica": "..."
        }"#;
        assert!(matches!(parse_report(text), Err(ReportError::Invalid(_))));
    }

    #[test]
    fn test_code_fenced_response_parses() {
        let fenced = format!("```json\n{}\n```", WELL_FORMED);
        let report = parse_report(&fenced).unwrap();
        assert_eq!(report.obstrucao_percentual, 82);
    }

    #[test]
    fn test_strings_survive_round_trip_verbatim() {
        let report = parse_report(WELL_FORMED).unwrap();
        let json = serde_json::to_string(&report).unwrap();
        let back: AnalysisReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
        assert_eq!(back.estrutura_colapsada, "Palato Mole e Úvula");
    }
}
