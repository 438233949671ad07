use crate::llm::Provider;
use serde_json::Value;

/// A model call that returned something unusable. Keeps the raw payload so a
/// failed run can be diagnosed from the Sentry event alone.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{provider:?} {stage} failure: {detail}")]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

impl LlmDiagnosticsError {
    /// Raw model text clipped for log lines.
    pub fn output_excerpt(&self, max_chars: usize) -> Option<String> {
        self.raw_output
            .as_deref()
            .map(|s| s.chars().take(max_chars).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_stage_and_excerpt_is_clipped() {
        let err = LlmDiagnosticsError {
            provider: Provider::Anthropic,
            stage: "parse",
            detail: "missing ticker".to_string(),
            raw_output: Some("Sure! Here is".to_string()),
            raw_response_json: None,
        };
        assert_eq!(err.to_string(), "Anthropic parse failure: missing ticker");
        assert_eq!(err.output_excerpt(4).as_deref(), Some("Sure"));
    }
}
