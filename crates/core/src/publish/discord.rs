use crate::publish::{Announcement, DiscordConfig, PlayCard, Publisher};
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 15;
const FOOTER: &str = "Vulture Analysis";

// Discord rejects payloads over these sizes.
const MAX_THREAD_NAME: usize = 100;
const MAX_TITLE: usize = 256;
const MAX_DESCRIPTION: usize = 4096;
const MAX_FIELD_VALUE: usize = 1024;

#[derive(Debug, Clone)]
pub struct DiscordPublisher {
    http: reqwest::Client,
    config: DiscordConfig,
}

impl DiscordPublisher {
    pub fn new(config: DiscordConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build Discord http client")?;
        Ok(Self { http, config })
    }

    async fn post(&self, webhook: &str, payload: &Value) -> anyhow::Result<()> {
        let url = format!("{webhook}?wait=true");
        let res = self
            .http
            .post(url)
            .json(payload)
            .send()
            .await
            .context("Discord webhook request failed")?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            anyhow::bail!("Discord webhook HTTP {status}: {text}");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Publisher for DiscordPublisher {
    async fn publish_play(&self, card: &PlayCard) -> anyhow::Result<()> {
        let webhook = self
            .config
            .forum_webhook
            .as_deref()
            .context("DISCORD_WEBHOOK_FORUM is not configured")?;
        let payload = play_payload(card, &self.config, Utc::now());
        self.post(webhook, &payload)
            .await
            .with_context(|| format!("failed to publish play for {}", card.ticker))?;
        tracing::info!(ticker = %card.ticker, score = card.score, "published play to Discord");
        Ok(())
    }

    async fn announce(&self, message: &Announcement) -> anyhow::Result<()> {
        let webhook = self
            .config
            .news_webhook
            .as_deref()
            .context("DISCORD_WEBHOOK_NEWS is not configured")?;
        let payload = announcement_payload(message, Utc::now());
        self.post(webhook, &payload)
            .await
            .with_context(|| format!("failed to announce {:?}", message.title))?;
        tracing::info!(title = %message.title, "published announcement to Discord");
        Ok(())
    }
}

/// Forum thread payload for a confirmed play.
pub fn play_payload(card: &PlayCard, config: &DiscordConfig, now: DateTime<Utc>) -> Value {
    let band = card.band();
    let thread_name = format!(
        "{} | Confidence: {:.1} | {}",
        card.ticker,
        card.score,
        band.emoji()
    );

    let title = if card.flagship {
        format!("Vulture Analysis: {} \u{2B50}", card.ticker)
    } else {
        format!("Vulture Analysis: {}", card.ticker)
    };

    let description = if card.briefing.trim().is_empty() {
        "No briefing available."
    } else {
        card.briefing.as_str()
    };
    let play = if card.the_play.trim().is_empty() {
        "N/A"
    } else {
        card.the_play.as_str()
    };

    let applied_tags: Vec<&str> = config.tags.for_band(band).into_iter().collect();

    json!({
        "thread_name": truncate(&thread_name, MAX_THREAD_NAME),
        "embeds": [{
            "title": truncate(&title, MAX_TITLE),
            "description": truncate(description, MAX_DESCRIPTION),
            "color": band.color(),
            "fields": [
                {"name": "The Community-Vetted Play", "value": truncate(play, MAX_FIELD_VALUE), "inline": false},
                {"name": "Source", "value": format!("r/{}", card.source), "inline": true},
                {"name": "Link", "value": format!("[View Post]({})", card.url), "inline": true},
            ],
            "timestamp": now.to_rfc3339_opts(SecondsFormat::Secs, true),
            "footer": {"text": FOOTER},
        }],
        "applied_tags": applied_tags,
    })
}

pub fn announcement_payload(message: &Announcement, now: DateTime<Utc>) -> Value {
    let fields: Vec<Value> = message
        .fields
        .iter()
        .map(|f| {
            json!({
                "name": truncate(&f.name, MAX_TITLE),
                "value": truncate(&f.value, MAX_FIELD_VALUE),
                "inline": f.inline,
            })
        })
        .collect();

    let mut embed = json!({
        "title": truncate(&message.title, MAX_TITLE),
        "description": truncate(&message.description, MAX_DESCRIPTION),
        "fields": fields,
        "timestamp": now.to_rfc3339_opts(SecondsFormat::Secs, true),
        "footer": {"text": FOOTER},
    });
    if let Some(url) = &message.url {
        embed["url"] = json!(url);
    }
    if let Some(color) = message.color {
        embed["color"] = json!(color);
    }

    json!({ "embeds": [embed] })
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('\u{2026}');
    out
}
