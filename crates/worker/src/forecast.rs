use crate::config::ScanConfig;
use crate::evaluate::Services;
use crate::report::{BatchReport, SkipReason};
use anyhow::Context;
use chrono::{DateTime, Utc};
use vulture_core::config::ScanMode;
use vulture_core::domain::post::UserActivity;
use vulture_core::publish::{Announcement, AnnouncementField};

pub const NO_ACTIVITY_MESSAGE: &str = "No activity found in the past 24 hours.";

/// Builds a market forecast from the tracked users' last day of activity.
pub async fn run(svc: Services<'_>, config: &ScanConfig, now: DateTime<Utc>) -> anyhow::Result<BatchReport> {
    let mut report = BatchReport::new(ScanMode::UserForecast, "forecast");
    let since = now - config.forecast_window;

    let mut collected: Vec<UserActivity> = Vec::new();
    let mut contributors: Vec<&str> = Vec::new();
    for username in &config.forecast_usernames {
        report.processed += 1;
        match svc.source.fetch_user_activity(username, since).await {
            Ok(activity) => {
                report.fetched += activity.len();
                if !activity.is_empty() {
                    contributors.push(username.as_str());
                    report.kept += 1;
                }
                collected.extend(activity);
            }
            Err(err) => {
                report.skip(username, &SkipReason::from_error(SkipReason::FetchFailed, &err));
            }
        }
    }

    if collected.is_empty() {
        tracing::info!("{}", NO_ACTIVITY_MESSAGE);
        return Ok(report);
    }

    collected.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
    let prompt = collected
        .iter()
        .map(UserActivity::prompt_block)
        .collect::<Vec<_>>()
        .join("\n\n");

    let forecast = svc
        .llm
        .forecast(&prompt)
        .await
        .context("forecast generation failed")?;

    let message = Announcement {
        title: format!("Daily market forecast \u{2013} {}", now.format("%Y-%m-%d")),
        description: forecast,
        url: None,
        color: None,
        fields: vec![AnnouncementField::new(
            "Based on",
            contributors
                .iter()
                .map(|u| format!("u/{u}"))
                .collect::<Vec<_>>()
                .join(", "),
            false,
        )],
    };

    if config.dry_run {
        tracing::info!(chars = message.description.len(), "dry run: would announce forecast");
        return Ok(report);
    }

    svc.publisher.announce(&message).await?;
    report.published = 1;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeLlm, FakeSource, RecordingPublisher};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use vulture_core::domain::post::ActivityKind;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 22, 0, 0).unwrap()
    }

    fn activity(kind: ActivityKind, title: &str, hours_ago: i64) -> UserActivity {
        UserActivity {
            kind,
            title: title.to_string(),
            body: format!("{title} body"),
            created_utc: now() - ChronoDuration::hours(hours_ago),
        }
    }

    #[tokio::test]
    async fn publishes_forecast_from_recent_activity() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig::for_tests(dir.path());

        let source = FakeSource::default().with_activity(
            "alice",
            vec![
                activity(ActivityKind::Submission, "Semis into CPI", 3),
                activity(ActivityKind::Comment, "Rates thread", 1),
                activity(ActivityKind::Submission, "Last week", 40),
            ],
        );
        let llm = FakeLlm::default();
        let publisher = RecordingPublisher::default();
        let svc = Services { source: &source, llm: &llm, publisher: &publisher };

        let report = run(svc, &config, now()).await.unwrap();
        assert_eq!(report.published, 1);
        assert_eq!(report.skipped.get("fetch_failed"), Some(&1));

        let inputs = llm.forecast_inputs();
        assert_eq!(inputs.len(), 1);
        assert!(inputs[0].starts_with("Title: Comment on \u{201c}Rates thread\u{201d}"));
        assert!(!inputs[0].contains("Last week"));

        let sent = publisher.announcements();
        assert_eq!(sent[0].fields[0].value, "u/alice");
        assert!(sent[0].description.contains("TL;DR: Bullish"));
    }

    #[tokio::test]
    async fn no_activity_publishes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig::for_tests(dir.path());

        let source = FakeSource::default()
            .with_activity("alice", vec![activity(ActivityKind::Comment, "Old", 30)])
            .with_activity("bob", Vec::new());
        let llm = FakeLlm::default();
        let publisher = RecordingPublisher::default();
        let svc = Services { source: &source, llm: &llm, publisher: &publisher };

        let report = run(svc, &config, now()).await.unwrap();
        assert_eq!(report.published, 0);
        assert!(llm.forecast_inputs().is_empty());
        assert!(publisher.announcements().is_empty());
    }
}
