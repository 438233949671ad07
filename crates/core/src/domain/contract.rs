use crate::domain::synthesis::{SynthesisResult, Ticker};
use anyhow::ensure;
use serde::{Deserialize, Serialize};

/// Raw synthesis payload as emitted by the model. Every field is optional here so
/// that a missing key is reported by validation rather than by serde.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmSynthesis {
    pub ticker: Option<String>,
    pub briefing: Option<String>,
    pub the_play: Option<String>,
    pub confidence_score: Option<f64>,
}

impl LlmSynthesis {
    /// Fails closed: any missing or out-of-range field rejects the whole payload.
    pub fn validate_and_into_result(self) -> anyhow::Result<SynthesisResult> {
        let mut missing = Vec::new();
        if self.ticker.is_none() {
            missing.push("ticker");
        }
        if self.briefing.as_deref().map_or(true, |s| s.trim().is_empty()) {
            missing.push("briefing");
        }
        if self.the_play.as_deref().map_or(true, |s| s.trim().is_empty()) {
            missing.push("the_play");
        }
        if self.confidence_score.is_none() {
            missing.push("confidence_score");
        }
        ensure!(
            missing.is_empty(),
            "synthesis is missing required fields: {}",
            missing.join(", ")
        );

        let confidence = self.confidence_score.unwrap_or_default();
        ensure!(
            confidence.is_finite() && (0.0..=10.0).contains(&confidence),
            "confidence_score must be between 0 and 10 (got {confidence})"
        );

        Ok(SynthesisResult {
            ticker: Ticker::parse(self.ticker.as_deref().unwrap_or_default()),
            briefing: self.briefing.unwrap_or_default().trim().to_string(),
            the_play: self.the_play.unwrap_or_default().trim().to_string(),
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_complete_payload() {
        let raw: LlmSynthesis = serde_json::from_value(json!({
            "ticker": "nvda",
            "briefing": " Strong DD, comments agree. ",
            "the_play": "Calls into earnings",
            "confidence_score": 7.5,
        }))
        .unwrap();

        let out = raw.validate_and_into_result().unwrap();
        assert_eq!(out.ticker, Ticker::Symbol("NVDA".to_string()));
        assert_eq!(out.briefing, "Strong DD, comments agree.");
        assert_eq!(out.confidence, 7.5);
    }

    #[test]
    fn rejects_missing_fields_listing_all_of_them() {
        let raw: LlmSynthesis = serde_json::from_value(json!({"ticker": "AMD"})).unwrap();
        let err = raw.validate_and_into_result().unwrap_err().to_string();
        assert!(err.contains("briefing, the_play, confidence_score"), "{err}");
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let raw = LlmSynthesis {
            ticker: Some("AMD".to_string()),
            briefing: Some("b".to_string()),
            the_play: Some("p".to_string()),
            confidence_score: Some(11.0),
        };
        assert!(raw.validate_and_into_result().is_err());
    }

    #[test]
    fn sentinel_ticker_is_not_a_validation_error() {
        let raw = LlmSynthesis {
            ticker: Some("N/A".to_string()),
            briefing: Some("Question post".to_string()),
            the_play: Some("No clear play identified.".to_string()),
            confidence_score: Some(7.0),
        };
        let out = raw.validate_and_into_result().unwrap();
        assert!(!out.ticker.is_actionable());
        assert_eq!(out.confidence, 7.0);
    }
}
