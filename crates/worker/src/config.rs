use chrono::Duration as ChronoDuration;
use std::path::PathBuf;
use std::time::Duration;
use vulture_core::config::Settings;
use vulture_core::storage::cache::SummaryCache;
use vulture_core::storage::ledger::Ledger;
use vulture_core::storage::marker::DailyRunMarker;

const POST_LIMIT: u32 = 100;
const COMMENT_LIMIT: u32 = 25;
const COMMENT_DELAY: Duration = Duration::from_secs(1);
const PUBLISH_DELAY: Duration = Duration::from_secs(2);
const DISCOVERY_MAX_AGE_HOURS: i64 = 48;
const NEWS_MAX_AGE_HOURS: i64 = 24;
const FORECAST_WINDOW_HOURS: i64 = 24;
const CALENDAR_HORIZON_DAYS: i64 = 7;

/// Immutable run configuration shared by every scan mode.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub subreddits: Vec<String>,
    pub news_subreddits: Vec<String>,
    pub forecast_usernames: Vec<String>,
    pub main_sheet: String,
    pub training_sheet: String,
    pub calendar_sheet: String,
    pub data_dir: PathBuf,
    pub post_limit: u32,
    pub comment_limit: u32,
    /// Pause after each comment fetch.
    pub comment_delay: Duration,
    /// Pause after each publish.
    pub publish_delay: Duration,
    pub discovery_max_age: ChronoDuration,
    pub news_max_age: ChronoDuration,
    pub forecast_window: ChronoDuration,
    pub calendar_horizon_days: i64,
    pub dry_run: bool,
}

impl ScanConfig {
    pub fn from_settings(settings: &Settings, dry_run: bool) -> Self {
        Self {
            subreddits: settings.subreddits(),
            news_subreddits: settings.news_subreddits(),
            forecast_usernames: settings.forecast_usernames(),
            main_sheet: settings.sheet_name.clone().unwrap_or_default(),
            training_sheet: settings.training_sheet_name.clone().unwrap_or_default(),
            calendar_sheet: settings.calendar_sheet_name().to_string(),
            data_dir: settings.data_dir(),
            post_limit: POST_LIMIT,
            comment_limit: COMMENT_LIMIT,
            comment_delay: COMMENT_DELAY,
            publish_delay: PUBLISH_DELAY,
            discovery_max_age: ChronoDuration::hours(DISCOVERY_MAX_AGE_HOURS),
            news_max_age: ChronoDuration::hours(NEWS_MAX_AGE_HOURS),
            forecast_window: ChronoDuration::hours(FORECAST_WINDOW_HOURS),
            calendar_horizon_days: CALENDAR_HORIZON_DAYS,
            dry_run,
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        Ledger::in_dir(&self.data_dir)
    }

    pub fn cache_path(&self) -> PathBuf {
        SummaryCache::in_dir(&self.data_dir)
    }

    pub fn marker(&self) -> DailyRunMarker {
        DailyRunMarker::in_dir(&self.data_dir)
    }
}

#[cfg(test)]
impl ScanConfig {
    /// Defaults with zero delays rooted in `data_dir`.
    pub fn for_tests(data_dir: &std::path::Path) -> Self {
        let settings = Settings {
            sheet_name: Some("feed".to_string()),
            training_sheet_name: Some("training".to_string()),
            subreddits: Some("wallstreetbets".to_string()),
            news_subreddits: Some("stocks".to_string()),
            forecast_usernames: Some("alice,bob".to_string()),
            data_dir: Some(data_dir.display().to_string()),
            ..Default::default()
        };
        Self {
            comment_delay: Duration::ZERO,
            publish_delay: Duration::ZERO,
            ..Self::from_settings(&settings, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheets_and_lists_come_from_settings() {
        let settings = Settings {
            sheet_name: Some("Vulture".to_string()),
            training_sheet_name: Some("Vulture Training".to_string()),
            ..Default::default()
        };
        let config = ScanConfig::from_settings(&settings, true);

        assert_eq!(config.main_sheet, "Vulture");
        assert_eq!(config.calendar_sheet, "Calendar");
        assert_eq!(config.subreddits.len(), 8);
        assert_eq!(config.ledger_path(), PathBuf::from("data/processed_posts.txt"));
        assert_eq!(config.publish_delay, Duration::from_secs(2));
        assert!(config.dry_run);
    }
}
