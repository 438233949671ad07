pub mod discord;

use crate::config::Settings;
use crate::domain::review::ReviewRecord;

pub const HIGH_BAND_MIN: f64 = 8.0;
pub const MEDIUM_BAND_MIN: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_BAND_MIN {
            ConfidenceBand::High
        } else if score >= MEDIUM_BAND_MIN {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceBand::High => "high",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::Low => "low",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            ConfidenceBand::High => "\u{1F680}",
            ConfidenceBand::Medium => "\u{1F914}",
            ConfidenceBand::Low => "\u{26D4}\u{FE0F}",
        }
    }

    pub fn color(self) -> u32 {
        match self {
            ConfidenceBand::High => 0x00C775,
            ConfidenceBand::Medium => 0xFFFF00,
            ConfidenceBand::Low => 0xFF0000,
        }
    }
}

/// Forum tag ids applied per confidence band.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BandTags {
    pub low: Option<String>,
    pub medium: Option<String>,
    pub high: Option<String>,
}

impl BandTags {
    pub fn for_band(&self, band: ConfidenceBand) -> Option<&str> {
        match band {
            ConfidenceBand::High => self.high.as_deref(),
            ConfidenceBand::Medium => self.medium.as_deref(),
            ConfidenceBand::Low => self.low.as_deref(),
        }
    }
}

/// Webhook targets, built once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscordConfig {
    pub forum_webhook: Option<String>,
    pub news_webhook: Option<String>,
    pub tags: BandTags,
}

impl DiscordConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            forum_webhook: settings.discord_webhook_forum.clone(),
            news_webhook: settings.discord_webhook_news.clone(),
            tags: BandTags {
                low: settings.discord_tag_id_low.clone(),
                medium: settings.discord_tag_id_medium.clone(),
                high: settings.discord_tag_id_high.clone(),
            },
        }
    }
}

/// A confirmed play, ready for the forum channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayCard {
    pub ticker: String,
    pub score: f64,
    pub briefing: String,
    pub the_play: String,
    pub source: String,
    pub url: String,
    pub flagship: bool,
}

impl PlayCard {
    pub fn from_record(record: &ReviewRecord, flagship: bool) -> Self {
        Self {
            ticker: record.ticker.as_str().to_string(),
            score: record.score,
            briefing: record.briefing.clone(),
            the_play: record.the_play.clone(),
            source: record.source.clone(),
            url: record.url.clone(),
            flagship,
        }
    }

    pub fn band(&self) -> ConfidenceBand {
        ConfidenceBand::from_score(self.score)
    }
}

/// A message for the news channel (news items, calendar digest, forecasts).
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub title: String,
    pub description: String,
    pub url: Option<String>,
    pub color: Option<u32>,
    pub fields: Vec<AnnouncementField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnouncementField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl AnnouncementField {
    pub fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline,
        }
    }
}

/// Chat publish collaborator.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_play(&self, card: &PlayCard) -> anyhow::Result<()>;

    async fn announce(&self, message: &Announcement) -> anyhow::Result<()>;
}

/// Logs messages instead of delivering them. Used by `--dry-run`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

#[async_trait::async_trait]
impl Publisher for LogPublisher {
    async fn publish_play(&self, card: &PlayCard) -> anyhow::Result<()> {
        tracing::info!(
            ticker = %card.ticker,
            score = card.score,
            band = card.band().as_str(),
            flagship = card.flagship,
            "dry run: would publish play"
        );
        Ok(())
    }

    async fn announce(&self, message: &Announcement) -> anyhow::Result<()> {
        tracing::info!(title = %message.title, fields = message.fields.len(), "dry run: would announce");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_boundaries() {
        assert_eq!(ConfidenceBand::from_score(8.0), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::from_score(7.9), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::from_score(4.0), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::from_score(3.9), ConfidenceBand::Low);
        assert_eq!(ConfidenceBand::from_score(0.0), ConfidenceBand::Low);
    }

    #[test]
    fn tags_follow_band() {
        let settings = Settings {
            discord_tag_id_low: Some("1".to_string()),
            discord_tag_id_high: Some("3".to_string()),
            ..Default::default()
        };
        let config = DiscordConfig::from_settings(&settings);
        assert_eq!(config.tags.for_band(ConfidenceBand::High), Some("3"));
        assert_eq!(config.tags.for_band(ConfidenceBand::Medium), None);
        assert_eq!(config.tags.for_band(ConfidenceBand::Low), Some("1"));
    }
}
