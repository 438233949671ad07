pub mod domain;
pub mod ingest;
pub mod llm;
pub mod publish;
pub mod rank;
pub mod scoring;
pub mod storage;

pub mod config {
    use anyhow::Context;
    use std::fmt;
    use std::path::PathBuf;
    use std::str::FromStr;

    pub const DEFAULT_SUBREDDITS: &[&str] = &[
        "options",
        "wallstreetbets",
        "shortsqueeze",
        "DueDilligence",
        "WallStreetbetsELITE",
        "smallstreetbets",
        "valueinvesting",
        "technicalanalysis",
    ];

    pub const DEFAULT_NEWS_SUBREDDITS: &[&str] = &["stocks", "StockMarket", "investing"];

    const DEFAULT_DATA_DIR: &str = "data";
    const DEFAULT_CALENDAR_SHEET_NAME: &str = "Calendar";

    /// Independent scan types selectable from the command line.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum ScanMode {
        Community,
        News,
        Calendar,
        UserForecast,
    }

    impl ScanMode {
        pub fn as_str(self) -> &'static str {
            match self {
                ScanMode::Community => "community",
                ScanMode::News => "news",
                ScanMode::Calendar => "calendar",
                ScanMode::UserForecast => "user-forecast",
            }
        }
    }

    impl fmt::Display for ScanMode {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    impl FromStr for ScanMode {
        type Err = ConfigError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.trim().to_ascii_lowercase().as_str() {
                "community" => Ok(ScanMode::Community),
                "news" => Ok(ScanMode::News),
                "calendar" => Ok(ScanMode::Calendar),
                "user-forecast" | "user_forecast" => Ok(ScanMode::UserForecast),
                other => Err(ConfigError::UnknownMode(other.to_string())),
            }
        }
    }

    #[derive(Debug, thiserror::Error)]
    pub enum ConfigError {
        #[error("missing required environment variables for mode {mode}: {}", .missing.join(", "))]
        Missing {
            mode: ScanMode,
            missing: Vec<&'static str>,
        },
        #[error("unknown scan mode: {0} (expected community, news, calendar or user-forecast)")]
        UnknownMode(String),
    }

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub anthropic_model: Option<String>,
        pub anthropic_base_url: Option<String>,
        pub anthropic_timeout_secs: Option<u64>,
        pub anthropic_max_tokens: Option<u32>,
        pub sentry_dsn: Option<String>,
        pub reddit_client_id: Option<String>,
        pub reddit_client_secret: Option<String>,
        pub reddit_user_agent: Option<String>,
        pub discord_webhook_forum: Option<String>,
        pub discord_webhook_news: Option<String>,
        pub discord_tag_id_low: Option<String>,
        pub discord_tag_id_medium: Option<String>,
        pub discord_tag_id_high: Option<String>,
        pub sheet_name: Option<String>,
        pub training_sheet_name: Option<String>,
        pub calendar_sheet_name: Option<String>,
        pub calendar_base_url: Option<String>,
        pub calendar_api_key: Option<String>,
        pub forecast_usernames: Option<String>,
        pub subreddits: Option<String>,
        pub news_subreddits: Option<String>,
        pub data_dir: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: env_opt("DATABASE_URL"),
                anthropic_api_key: env_opt("ANTHROPIC_API_KEY"),
                anthropic_model: env_opt("ANTHROPIC_MODEL"),
                anthropic_base_url: env_opt("ANTHROPIC_BASE_URL"),
                anthropic_timeout_secs: env_opt("ANTHROPIC_TIMEOUT_SECS")
                    .map(|v| v.parse::<u64>())
                    .transpose()
                    .context("ANTHROPIC_TIMEOUT_SECS must be a whole number of seconds")?,
                anthropic_max_tokens: env_opt("ANTHROPIC_MAX_TOKENS")
                    .map(|v| v.parse::<u32>())
                    .transpose()
                    .context("ANTHROPIC_MAX_TOKENS must be a positive integer")?,
                sentry_dsn: env_opt("SENTRY_DSN"),
                reddit_client_id: env_opt("REDDIT_CLIENT_ID"),
                reddit_client_secret: env_opt("REDDIT_CLIENT_SECRET"),
                reddit_user_agent: env_opt("REDDIT_USER_AGENT"),
                discord_webhook_forum: env_opt("DISCORD_WEBHOOK_FORUM"),
                discord_webhook_news: env_opt("DISCORD_WEBHOOK_NEWS"),
                discord_tag_id_low: env_opt("DISCORD_TAG_ID_LOW"),
                discord_tag_id_medium: env_opt("DISCORD_TAG_ID_MEDIUM"),
                discord_tag_id_high: env_opt("DISCORD_TAG_ID_HIGH"),
                sheet_name: env_opt("SHEET_NAME"),
                training_sheet_name: env_opt("TRAINING_SHEET_NAME"),
                calendar_sheet_name: env_opt("CALENDAR_SHEET_NAME"),
                calendar_base_url: env_opt("CALENDAR_BASE_URL"),
                calendar_api_key: env_opt("CALENDAR_API_KEY"),
                forecast_usernames: env_opt("FORECAST_USERNAMES"),
                subreddits: env_opt("SUBREDDITS"),
                news_subreddits: env_opt("NEWS_SUBREDDITS"),
                data_dir: env_opt("VULTURE_DATA_DIR"),
            })
        }

        /// Checks every variable `mode` needs and reports all missing ones at once.
        pub fn validate_for(&self, mode: ScanMode) -> Result<(), ConfigError> {
            let missing: Vec<&'static str> = self
                .required_for(mode)
                .into_iter()
                .filter(|(_, value)| value.is_none())
                .map(|(name, _)| name)
                .collect();

            if missing.is_empty() {
                Ok(())
            } else {
                Err(ConfigError::Missing { mode, missing })
            }
        }

        fn required_for(&self, mode: ScanMode) -> Vec<(&'static str, Option<&str>)> {
            let reddit = [
                ("REDDIT_CLIENT_ID", self.reddit_client_id.as_deref()),
                ("REDDIT_CLIENT_SECRET", self.reddit_client_secret.as_deref()),
                ("REDDIT_USER_AGENT", self.reddit_user_agent.as_deref()),
            ];
            let llm = ("ANTHROPIC_API_KEY", self.anthropic_api_key.as_deref());
            let db = ("DATABASE_URL", self.database_url.as_deref());
            let news_webhook = ("DISCORD_WEBHOOK_NEWS", self.discord_webhook_news.as_deref());

            let mut out = Vec::new();
            match mode {
                ScanMode::Community => {
                    out.extend(reddit);
                    out.push(llm);
                    out.push(db);
                    out.push(("DISCORD_WEBHOOK_FORUM", self.discord_webhook_forum.as_deref()));
                    out.push(("DISCORD_TAG_ID_LOW", self.discord_tag_id_low.as_deref()));
                    out.push(("DISCORD_TAG_ID_MEDIUM", self.discord_tag_id_medium.as_deref()));
                    out.push(("DISCORD_TAG_ID_HIGH", self.discord_tag_id_high.as_deref()));
                    out.push(("SHEET_NAME", self.sheet_name.as_deref()));
                    out.push(("TRAINING_SHEET_NAME", self.training_sheet_name.as_deref()));
                }
                ScanMode::News => {
                    out.extend(reddit);
                    out.push(llm);
                    out.push(news_webhook);
                }
                ScanMode::Calendar => {
                    out.push(("CALENDAR_BASE_URL", self.calendar_base_url.as_deref()));
                    out.push(db);
                    out.push(news_webhook);
                }
                ScanMode::UserForecast => {
                    out.extend(reddit);
                    out.push(llm);
                    out.push(news_webhook);
                    out.push(("FORECAST_USERNAMES", self.forecast_usernames.as_deref()));
                }
            }
            out
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }

        pub fn require_calendar_base_url(&self) -> anyhow::Result<&str> {
            self.calendar_base_url
                .as_deref()
                .context("CALENDAR_BASE_URL is required")
        }

        pub fn calendar_sheet_name(&self) -> &str {
            self.calendar_sheet_name
                .as_deref()
                .unwrap_or(DEFAULT_CALENDAR_SHEET_NAME)
        }

        pub fn subreddits(&self) -> Vec<String> {
            split_list(self.subreddits.as_deref(), DEFAULT_SUBREDDITS)
        }

        pub fn news_subreddits(&self) -> Vec<String> {
            split_list(self.news_subreddits.as_deref(), DEFAULT_NEWS_SUBREDDITS)
        }

        pub fn forecast_usernames(&self) -> Vec<String> {
            split_list(self.forecast_usernames.as_deref(), &[])
        }

        pub fn data_dir(&self) -> PathBuf {
            PathBuf::from(self.data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR))
        }
    }

    // Blank values count as unset so `FOO=` in a .env file is reported as missing.
    fn env_opt(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    fn split_list(raw: Option<&str>, default: &[&str]) -> Vec<String> {
        let parsed: Vec<String> = raw
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if parsed.is_empty() {
            default.iter().map(|s| s.to_string()).collect()
        } else {
            parsed
        }
    }

}
