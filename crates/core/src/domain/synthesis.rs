use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel the model returns when a post has no single actionable ticker.
pub const NO_TICKER: &str = "N/A";

const NO_TICKER_ALIASES: &[&str] = &["N/A", "NA", "NAN", "NONE", "NOT SPECIFIED", "NULL"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Ticker {
    Symbol(String),
    NoActionable,
}

impl Ticker {
    /// Normalises model output: strips `<>` and a leading `$`, uppercases, and maps
    /// empty or placeholder values to [`Ticker::NoActionable`].
    pub fn parse(raw: &str) -> Self {
        let cleaned = raw
            .trim()
            .trim_matches(|c| c == '<' || c == '>')
            .trim()
            .trim_start_matches('$')
            .to_ascii_uppercase();

        if cleaned.is_empty() || NO_TICKER_ALIASES.contains(&cleaned.as_str()) {
            Ticker::NoActionable
        } else {
            Ticker::Symbol(cleaned)
        }
    }

    pub fn is_actionable(&self) -> bool {
        matches!(self, Ticker::Symbol(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Ticker::Symbol(s) => s,
            Ticker::NoActionable => NO_TICKER,
        }
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Ticker {
    fn from(s: String) -> Self {
        Ticker::parse(&s)
    }
}

impl From<Ticker> for String {
    fn from(t: Ticker) -> Self {
        t.as_str().to_string()
    }
}

/// Validated output of the synthesis model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub ticker: Ticker,
    pub briefing: String,
    pub the_play: String,
    /// Model's own estimate in [0, 10]. Not trusted for gating.
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_ticker_text() {
        assert_eq!(Ticker::parse(" <gme> "), Ticker::Symbol("GME".to_string()));
        assert_eq!(Ticker::parse("$tsla"), Ticker::Symbol("TSLA".to_string()));
        assert_eq!(Ticker::parse("n/a"), Ticker::NoActionable);
        assert_eq!(Ticker::parse("Not specified"), Ticker::NoActionable);
        assert_eq!(Ticker::parse(""), Ticker::NoActionable);
    }

    #[test]
    fn serializes_as_plain_string() {
        let v = serde_json::to_value(Ticker::NoActionable).unwrap();
        assert_eq!(v, serde_json::json!("N/A"));
        let t: Ticker = serde_json::from_value(serde_json::json!("amd")).unwrap();
        assert_eq!(t.as_str(), "AMD");
    }
}
