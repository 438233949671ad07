use crate::domain::contract::LlmSynthesis;
use crate::domain::synthesis::SynthesisResult;
use anyhow::Context;

/// Pulls the JSON object out of a model reply that may wrap it in a code
/// fence or surrounding prose.
pub fn extract_json(text: &str) -> Option<String> {
    let text = text.trim();
    if let Some(fenced) = text.strip_prefix("```") {
        let body = fenced.split_once('\n').map_or("", |(_lang, rest)| rest);
        let body = body.rsplit_once("```").map_or(body, |(inner, _)| inner);
        return Some(body.trim().to_string());
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(open), Some(close)) if open < close => Some(text[open..=close].to_string()),
        _ => None,
    }
}

pub fn parse_synthesis(text: &str) -> anyhow::Result<SynthesisResult> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let parsed = serde_json::from_str::<LlmSynthesis>(&json_str)
        .with_context(|| format!("synthesis reply is not the expected JSON: {json_str}"))?;
    parsed.validate_and_into_result()
}
