use crate::config::Settings;
use crate::domain::contract::LlmSynthesis;
use crate::domain::synthesis::SynthesisResult;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::json;
use crate::llm::{LlmClient, Provider, SynthesisInput};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_SYNTHESIS_MAX_TOKENS: u32 = 1024;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const SUMMARY_MAX_TOKENS: u32 = 200;
const CAPTION_MAX_TOKENS: u32 = 60;
const FORECAST_MAX_TOKENS: u32 = 500;

const TOOL_NAME_EMIT_SYNTHESIS: &str = "emit_synthesis";

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    messages_url: String,
    model: String,
    synthesis_max_tokens: u32,
}

impl AnthropicClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(settings.require_anthropic_api_key()?)
            .context("ANTHROPIC_API_KEY is not a valid header value")?;
        api_key.set_sensitive(true);
        headers.insert("x-api-key", api_key);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(
                settings
                    .anthropic_timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_TIMEOUT),
            )
            .build()
            .context("failed to build Anthropic HTTP client")?;

        let base_url = settings
            .anthropic_base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL);

        Ok(Self {
            http,
            messages_url: format!("{}/v1/messages", base_url.trim_end_matches('/')),
            model: settings
                .anthropic_model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            synthesis_max_tokens: settings
                .anthropic_max_tokens
                .unwrap_or(DEFAULT_SYNTHESIS_MAX_TOKENS),
        })
    }

    /// One POST to the messages endpoint. Non-2xx answers keep the body for diagnostics.
    async fn create_message(
        &self,
        req: &CreateMessageRequest,
    ) -> anyhow::Result<(serde_json::Value, CreateMessageResponse)> {
        let res = self
            .http
            .post(&self.messages_url)
            .json(req)
            .send()
            .await
            .with_context(|| format!("Anthropic request failed (model={})", req.model))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("failed to read Anthropic response body")?;
        let raw_json = serde_json::from_str::<serde_json::Value>(&body).ok();

        if !status.is_success() {
            return Err(LlmDiagnosticsError {
                provider: Provider::Anthropic,
                stage: "http",
                detail: format!("status={status}"),
                raw_output: Some(body),
                raw_response_json: raw_json,
            }
            .into());
        }

        let raw_json =
            raw_json.with_context(|| format!("Anthropic returned non-JSON body: {body}"))?;
        let parsed = CreateMessageResponse::deserialize(&raw_json)
            .context("unexpected Anthropic message shape")?;
        Ok((raw_json, parsed))
    }

    /// Plain text completion for the free-form calls.
    async fn complete_text(
        &self,
        system: String,
        content: MessageContent,
        max_tokens: u32,
        temperature: f32,
    ) -> anyhow::Result<String> {
        let req = CreateMessageRequest {
            model: self.model.clone(),
            max_tokens,
            temperature: Some(temperature),
            system: Some(system),
            messages: vec![Message {
                role: "user",
                content,
            }],
            tools: None,
            tool_choice: None,
        };

        let (raw_json, res) = self.create_message(&req).await?;
        let text = Self::response_text(&res);
        if text.trim().is_empty() {
            return Err(LlmDiagnosticsError {
                provider: Provider::Anthropic,
                stage: "empty_text",
                detail: format!("stop_reason={:?}", res.stop_reason),
                raw_output: None,
                raw_response_json: Some(raw_json),
            }
            .into());
        }
        Ok(text.trim().to_string())
    }

    fn tools() -> Vec<Tool> {
        let schema = serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["ticker", "briefing", "the_play", "confidence_score"],
            "properties": {
                "ticker": {"type": "string"},
                "briefing": {"type": "string"},
                "the_play": {"type": "string"},
                "confidence_score": {"type": "number", "minimum": 0, "maximum": 10}
            }
        });

        vec![Tool {
            name: TOOL_NAME_EMIT_SYNTHESIS,
            description: "Emit the post synthesis as structured JSON",
            input_schema: schema,
        }]
    }

    fn tool_choice() -> ToolChoice {
        ToolChoice::Tool {
            name: TOOL_NAME_EMIT_SYNTHESIS,
        }
    }

    fn synthesis_system_prompt() -> String {
        [
            "You are an expert retail investor, skilled at replicating the intuitive process of a human analyst to find actionable trading ideas on Reddit.",
            "Synthesize the original post with the community's reaction in the comments to form a holistic view.",
            "Fields:",
            "- ticker: the SINGLE stock ticker discussed. If multiple or none, return \"N/A\".",
            "- briefing: the core thesis, how the community reacted, and any strong counterarguments or validations.",
            "- the_play: the community-vetted actionable takeaway. If none, state \"No clear play identified.\"",
            "- confidence_score: 0.0 to 10.0, reflecting the quality of the thesis AND its reception. A great idea torn apart in the comments scores LOW.",
            "Rules:",
            "- If ticker is \"N/A\", confidence_score MUST be 0.0.",
            "- 8.0-10.0: clear, well-reasoned thesis with strong positive validation in the comments.",
            "- 4.0-7.9: decent thesis with mixed or moderate feedback.",
            "- 0.1-3.9: speculative, or heavily criticized in the comments.",
            "- 0.0: no actionable play, a question, or thoroughly debunked.",
            "Return ONLY the structured fields. Do not include any extra keys.",
        ]
        .join("\n")
    }

    fn synthesis_user_prompt(input: &SynthesisInput) -> String {
        format!(
            "**Original Post Title:** {}\n\n**Original Post Body:**\n{}\n\n**Top Comments:**\n{}",
            input.title, input.body, input.comments_text
        )
    }

    fn summary_system_prompt() -> String {
        [
            "You are an expert financial summarizer. For each Reddit post, do two things:",
            "1) Assign exactly one Tag from {DD, News, Results, Info}:",
            "   DD      = Deep-Dive or research",
            "   News    = Breaking news or new information",
            "   Results = Gains/Losses or bragging",
            "   Info    = Requests for opinions, advice, or feedback",
            "2) Write a TLDR of at most two sentences.",
            "",
            "Output exactly:",
            "Tag: <DD|News|Results|Info>",
            "TLDR: <summary>",
            "Ticker: <ticker>",
            "Direction: <Up|Down>",
            "Positions: <brief or None>",
            "Do not include anything else.",
        ]
        .join("\n")
    }

    fn caption_system_prompt() -> String {
        "You are an assistant that looks at a chart or screenshot and writes a brief, factual 1-2 sentence caption of what it shows.".to_string()
    }

    fn forecast_system_prompt() -> String {
        [
            "You are a professional market analyst.",
            "Given these Reddit activities from the past 24 hours, craft a daily market forecast in 3-5 concise bullet points,",
            "and finish with a TL;DR of overall sentiment (Bullish, Bearish, or Neutral).",
        ]
        .join(" ")
    }

    fn response_text(res: &CreateMessageResponse) -> String {
        let mut out = String::new();
        for block in &res.content {
            if let ContentBlock::Text { text } = block {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }

    fn response_tool_synthesis(res: &CreateMessageResponse) -> anyhow::Result<Option<LlmSynthesis>> {
        for block in &res.content {
            if let ContentBlock::ToolUse { name, input } = block {
                if name == TOOL_NAME_EMIT_SYNTHESIS {
                    let parsed = serde_json::from_value::<LlmSynthesis>(input.clone())
                        .context("failed to decode tool_use.input into LlmSynthesis")?;
                    return Ok(Some(parsed));
                }
            }
        }
        Ok(None)
    }
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn summarize(&self, title: &str, body: &str) -> anyhow::Result<String> {
        self.complete_text(
            Self::summary_system_prompt(),
            MessageContent::Text(format!("Title: {title}\n\nPost: {body}")),
            SUMMARY_MAX_TOKENS,
            0.7,
        )
        .await
    }

    async fn synthesize(&self, input: &SynthesisInput) -> anyhow::Result<SynthesisResult> {
        let req = CreateMessageRequest {
            model: self.model.clone(),
            max_tokens: self.synthesis_max_tokens,
            temperature: Some(0.5),
            system: Some(Self::synthesis_system_prompt()),
            messages: vec![Message {
                role: "user",
                content: MessageContent::Text(Self::synthesis_user_prompt(input)),
            }],
            tools: Some(Self::tools()),
            tool_choice: Some(Self::tool_choice()),
        };

        let (raw_json, res) = self.create_message(&req).await?;

        if let Some(tool_synthesis) = Self::response_tool_synthesis(&res)? {
            return tool_synthesis.validate_and_into_result();
        }

        // Tool use was ignored; the same fields may still arrive as a JSON text block.
        let text = Self::response_text(&res);
        json::parse_synthesis(&text).map_err(|err| {
            LlmDiagnosticsError {
                provider: Provider::Anthropic,
                stage: "parse",
                detail: format!("{err:#}"),
                raw_output: Some(text),
                raw_response_json: Some(raw_json),
            }
            .into()
        })
    }

    async fn caption_image(&self, image_url: &str) -> anyhow::Result<String> {
        let content = MessageContent::Blocks(vec![
            InputBlock::Image {
                source: ImageSource::Url {
                    url: image_url.to_string(),
                },
            },
            InputBlock::Text {
                text: "Please describe what this image shows.".to_string(),
            },
        ]);
        self.complete_text(Self::caption_system_prompt(), content, CAPTION_MAX_TOKENS, 0.0)
            .await
    }

    async fn forecast(&self, activity: &str) -> anyhow::Result<String> {
        self.complete_text(
            Self::forecast_system_prompt(),
            MessageContent::Text(activity.to_string()),
            FORECAST_MAX_TOKENS,
            0.7,
        )
        .await
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Blocks(Vec<InputBlock>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ImageSource {
    Url { url: String },
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,

    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Tool {
    name: &'static str,
    description: &'static str,
    input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum ToolChoice {
    #[serde(rename = "tool")]
    Tool { name: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::synthesis::Ticker;
    use serde_json::json;

    #[test]
    fn client_settings_override_defaults() {
        let settings = Settings {
            anthropic_api_key: Some("sk-test".to_string()),
            anthropic_base_url: Some("http://localhost:8089/".to_string()),
            anthropic_max_tokens: Some(2048),
            ..Default::default()
        };
        let client = AnthropicClient::from_settings(&settings).unwrap();
        assert_eq!(client.messages_url, "http://localhost:8089/v1/messages");
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.synthesis_max_tokens, 2048);

        assert!(AnthropicClient::from_settings(&Settings::default()).is_err());
    }

    #[test]
    fn parses_tool_use_synthesis_input() {
        let res: CreateMessageResponse = serde_json::from_value(json!({
            "content": [
                {"type": "thinking", "thinking": "..."},
                {
                    "type": "tool_use",
                    "id": "toolu_1",
                    "name": TOOL_NAME_EMIT_SYNTHESIS,
                    "input": {
                        "ticker": "sofi",
                        "briefing": "Comments mostly agree with the thesis.",
                        "the_play": "Shares ahead of earnings",
                        "confidence_score": 6.5
                    }
                }
            ],
            "stop_reason": "tool_use"
        }))
        .unwrap();

        let parsed = AnthropicClient::response_tool_synthesis(&res).unwrap().unwrap();
        let synthesis = parsed.validate_and_into_result().unwrap();
        assert_eq!(synthesis.ticker, Ticker::Symbol("SOFI".to_string()));
        assert_eq!(synthesis.confidence, 6.5);
    }

    #[test]
    fn tool_input_missing_fields_fails_closed() {
        let res: CreateMessageResponse = serde_json::from_value(json!({
            "content": [{
                "type": "tool_use",
                "name": TOOL_NAME_EMIT_SYNTHESIS,
                "input": {"ticker": "SOFI"}
            }]
        }))
        .unwrap();

        let parsed = AnthropicClient::response_tool_synthesis(&res).unwrap().unwrap();
        assert!(parsed.validate_and_into_result().is_err());
    }

    #[test]
    fn image_blocks_serialize_in_messages_api_shape() {
        let content = MessageContent::Blocks(vec![
            InputBlock::Image {
                source: ImageSource::Url {
                    url: "https://i.redd.it/x.png".to_string(),
                },
            },
            InputBlock::Text {
                text: "describe".to_string(),
            },
        ]);
        assert_eq!(
            serde_json::to_value(&content).unwrap(),
            json!([
                {"type": "image", "source": {"type": "url", "url": "https://i.redd.it/x.png"}},
                {"type": "text", "text": "describe"}
            ])
        );
        assert_eq!(
            serde_json::to_value(MessageContent::Text("hi".to_string())).unwrap(),
            json!("hi")
        );
    }

    #[test]
    fn response_text_joins_text_blocks_only() {
        let res: CreateMessageResponse = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "Tag: DD"},
                {"type": "redacted_thinking", "data": "x"},
                {"type": "text", "text": "Ticker: AMD"}
            ]
        }))
        .unwrap();
        assert_eq!(AnthropicClient::response_text(&res), "Tag: DD\nTicker: AMD");
    }
}
