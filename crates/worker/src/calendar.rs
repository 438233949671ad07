use crate::config::ScanConfig;
use crate::report::BatchReport;
use anyhow::Context;
use chrono::{Duration as ChronoDuration, NaiveDate};
use serde_json::Value;
use vulture_core::config::ScanMode;
use vulture_core::ingest::calendar::CalendarProvider;
use vulture_core::ingest::types::CalendarEvent;
use vulture_core::publish::{Announcement, AnnouncementField, Publisher};
use vulture_core::storage::sheets::{Row, SheetStore};

pub const CALENDAR_HEADER: [&str; 6] = ["date", "time", "kind", "symbol", "name", "estimate"];

const DIGEST_COLOR: u32 = 0x3498DB;

pub fn event_row(event: &CalendarEvent) -> Row {
    vec![
        Value::from(event.date.format("%Y-%m-%d").to_string()),
        Value::from(event.time.clone().unwrap_or_default()),
        Value::from(event.kind.as_str()),
        Value::from(event.symbol.clone().unwrap_or_default()),
        Value::from(event.name.as_str()),
        Value::from(event.estimate.clone().unwrap_or_default()),
    ]
}

/// Digest of today's events, or `None` when nothing is scheduled.
pub fn daily_digest(events: &[CalendarEvent], today: NaiveDate) -> Option<Announcement> {
    let todays: Vec<&CalendarEvent> = events.iter().filter(|e| e.date == today).collect();
    if todays.is_empty() {
        return None;
    }

    let fields = todays
        .iter()
        .map(|e| {
            let name = match &e.symbol {
                Some(symbol) => format!("{symbol} \u{2013} {}", e.name),
                None => e.name.clone(),
            };
            let mut value = format!("{} at {}", e.kind, e.time.as_deref().unwrap_or("TBD"));
            if let Some(estimate) = &e.estimate {
                value.push_str(&format!(" (est. {estimate})"));
            }
            AnnouncementField::new(name, value, false)
        })
        .collect();

    Some(Announcement {
        title: format!("Market calendar for {}", today.format("%A, %B %-d")),
        description: format!("{} scheduled event(s) today.", todays.len()),
        url: None,
        color: Some(DIGEST_COLOR),
        fields,
    })
}

/// Rewrites the calendar sheet with the coming week and announces today's events.
pub async fn run(
    provider: &dyn CalendarProvider,
    sheets: &dyn SheetStore,
    publisher: &dyn Publisher,
    config: &ScanConfig,
    today: NaiveDate,
) -> anyhow::Result<BatchReport> {
    let mut report = BatchReport::new(ScanMode::Calendar, "calendar");
    let until = today + ChronoDuration::days(config.calendar_horizon_days);

    let events = provider
        .fetch_events(today, until)
        .await
        .with_context(|| format!("{} calendar fetch failed", provider.provider_name()))?;
    report.fetched = events.len();
    report.processed = events.len();
    report.kept = events.len();
    tracing::info!(%today, %until, events = events.len(), provider = provider.provider_name(), "fetched calendar");

    let rows: Vec<Row> = events.iter().map(event_row).collect();
    let digest = daily_digest(&events, today);

    if config.dry_run {
        tracing::info!(rows = rows.len(), digest = digest.is_some(), "dry run: calendar not written");
        return Ok(report);
    }

    sheets
        .clear_and_rewrite(&config.calendar_sheet, &CALENDAR_HEADER, &rows)
        .await
        .with_context(|| format!("failed to rewrite sheet {}", config.calendar_sheet))?;
    report.persisted = rows.len();

    match digest {
        Some(message) => {
            publisher.announce(&message).await?;
            report.published = 1;
        }
        None => tracing::info!(%today, "no calendar events today; digest not sent"),
    }

    Ok(report)
}
