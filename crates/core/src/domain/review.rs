//! Review records and their positional sheet layouts.
//!
//! Main feed: `[id, ticker, briefing, play, score, url, source, created_at, processed_at, status]`.
//! Training: `[id, title, body, ticker, briefing, play, score, logged_at]`.

use crate::domain::post::Post;
use crate::domain::synthesis::{SynthesisResult, Ticker};
use crate::storage::sheets::{CellUpdate, Row};
use anyhow::{bail, Context};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::fmt;

pub const MAIN_FEED_HEADER: [&str; 10] = [
    "id",
    "ticker",
    "briefing",
    "the_play",
    "confidence_score",
    "url",
    "subreddit",
    "created_utc",
    "processed_at",
    "status",
];

pub const TRAINING_HEADER: [&str; 8] = [
    "id",
    "title",
    "selftext",
    "ticker",
    "briefing",
    "the_play",
    "confidence_score",
    "logged_at",
];

const COL_BRIEFING: usize = 2;
const COL_PLAY: usize = 3;
const COL_SCORE: usize = 4;
const COL_PROCESSED_AT: usize = 8;
const COL_STATUS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStatus {
    PendingReview,
    Confirmed,
}

impl ReviewStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::PendingReview => "Pending Review",
            ReviewStatus::Confirmed => "Confirmed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Pending Review" => Some(ReviewStatus::PendingReview),
            "Confirmed" => Some(ReviewStatus::Confirmed),
            _ => None,
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRecord {
    pub id: String,
    pub ticker: Ticker,
    pub briefing: String,
    pub the_play: String,
    pub score: f64,
    pub url: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    pub status: ReviewStatus,
}

impl ReviewRecord {
    /// New records always start in `Pending Review`.
    pub fn pending(
        post: &Post,
        synthesis: &SynthesisResult,
        score: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: post.id.clone(),
            ticker: synthesis.ticker.clone(),
            briefing: synthesis.briefing.clone(),
            the_play: synthesis.the_play.clone(),
            score,
            url: post.url.clone(),
            source: post.source.clone(),
            created_at: post.created_utc,
            processed_at: now,
            status: ReviewStatus::PendingReview,
        }
    }

    /// `Pending Review -> Confirmed`. `Confirmed` is terminal.
    pub fn confirm(
        self,
        synthesis: &SynthesisResult,
        score: f64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Self> {
        if self.status != ReviewStatus::PendingReview {
            bail!("record {} is already {}", self.id, self.status);
        }
        Ok(Self {
            ticker: synthesis.ticker.clone(),
            briefing: synthesis.briefing.clone(),
            the_play: synthesis.the_play.clone(),
            score,
            processed_at: now,
            status: ReviewStatus::Confirmed,
            ..self
        })
    }

    pub fn to_row(&self) -> Row {
        vec![
            Value::from(self.id.as_str()),
            Value::from(self.ticker.as_str()),
            Value::from(self.briefing.as_str()),
            Value::from(self.the_play.as_str()),
            Value::from(self.score),
            Value::from(self.url.as_str()),
            Value::from(self.source.as_str()),
            Value::from(rfc3339(self.created_at)),
            Value::from(rfc3339(self.processed_at)),
            Value::from(self.status.as_str()),
        ]
    }

    pub fn from_row(row: &[Value]) -> anyhow::Result<Self> {
        let id = cell_str(row, 0);
        anyhow::ensure!(!id.is_empty(), "row has no id");

        let status_raw = cell_str(row, COL_STATUS);
        let status = ReviewStatus::parse(&status_raw)
            .with_context(|| format!("row {id} has unknown status {status_raw:?}"))?;

        Ok(Self {
            ticker: Ticker::parse(&cell_str(row, 1)),
            briefing: cell_str(row, COL_BRIEFING),
            the_play: cell_str(row, COL_PLAY),
            score: cell_f64(row, COL_SCORE).unwrap_or_default(),
            url: cell_str(row, 5),
            source: cell_str(row, 6),
            created_at: parse_ts(&cell_str(row, 7))
                .with_context(|| format!("row {id} has invalid created_utc"))?,
            processed_at: parse_ts(&cell_str(row, COL_PROCESSED_AT))
                .with_context(|| format!("row {id} has invalid processed_at"))?,
            status,
            id,
        })
    }

    /// Matches rows still awaiting review. Confirmation writes go through it so a
    /// `Confirmed` row is never rewritten.
    pub fn pending_guard() -> CellUpdate {
        CellUpdate::new(COL_STATUS, ReviewStatus::PendingReview.as_str())
    }

    /// Closes a pending row whose id was already confirmed on an earlier row,
    /// leaving its briefing and play as queued.
    pub fn retirement_updates(now: DateTime<Utc>) -> Vec<CellUpdate> {
        vec![
            CellUpdate::new(COL_PROCESSED_AT, rfc3339(now)),
            CellUpdate::new(COL_STATUS, ReviewStatus::Confirmed.as_str()),
        ]
    }

    /// Cells rewritten when a record is confirmed in place.
    pub fn confirmation_updates(&self) -> Vec<CellUpdate> {
        vec![
            CellUpdate::new(COL_BRIEFING, self.briefing.as_str()),
            CellUpdate::new(COL_PLAY, self.the_play.as_str()),
            CellUpdate::new(COL_SCORE, self.score),
            CellUpdate::new(COL_PROCESSED_AT, rfc3339(self.processed_at)),
            CellUpdate::new(COL_STATUS, self.status.as_str()),
        ]
    }
}

pub fn training_row(post: &Post, synthesis: &SynthesisResult, logged_at: DateTime<Utc>) -> Row {
    vec![
        Value::from(post.id.as_str()),
        Value::from(post.title.as_str()),
        Value::from(post.body.as_str()),
        Value::from(synthesis.ticker.as_str()),
        Value::from(synthesis.briefing.as_str()),
        Value::from(synthesis.the_play.as_str()),
        Value::from(synthesis.confidence),
        Value::from(rfc3339(logged_at)),
    ]
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_ts(s: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s.trim())?.with_timezone(&Utc))
}

fn cell_str(row: &[Value], idx: usize) -> String {
    match row.get(idx) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn cell_f64(row: &[Value], idx: usize) -> Option<f64> {
    match row.get(idx)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::post::fixtures::post;
    use chrono::TimeZone;

    fn synthesis(ticker: &str, confidence: f64) -> SynthesisResult {
        SynthesisResult {
            ticker: Ticker::parse(ticker),
            briefing: "Thesis holds up".to_string(),
            the_play: "Shares".to_string(),
            confidence,
        }
    }

    #[test]
    fn pending_record_survives_a_row_round_trip() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap();
        let record = ReviewRecord::pending(&post("p1", "GME", 10, 2), &synthesis("GME", 6.0), 5.5, now);

        let row = record.to_row();
        assert_eq!(row.len(), MAIN_FEED_HEADER.len());
        assert_eq!(row[COL_STATUS], Value::from("Pending Review"));

        let back = ReviewRecord::from_row(&row).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn confirmation_is_terminal() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap();
        let later = now + chrono::Duration::hours(3);
        let record = ReviewRecord::pending(&post("p1", "GME", 10, 2), &synthesis("GME", 6.0), 5.5, now);

        let confirmed = record.confirm(&synthesis("GME", 8.0), 8.4, later).unwrap();
        assert_eq!(confirmed.status, ReviewStatus::Confirmed);
        assert_eq!(confirmed.score, 8.4);
        assert_eq!(confirmed.processed_at, later);
        assert_eq!(confirmed.created_at, now - chrono::Duration::hours(1));

        assert!(confirmed.confirm(&synthesis("GME", 9.0), 9.0, later).is_err());
    }

    #[test]
    fn confirmation_updates_touch_briefing_play_score_and_status() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap();
        let record = ReviewRecord::pending(&post("p1", "GME", 10, 2), &synthesis("GME", 6.0), 5.5, now)
            .confirm(&synthesis("GME", 8.0), 8.4, now)
            .unwrap();

        let cols: Vec<usize> = record.confirmation_updates().iter().map(|u| u.column).collect();
        assert_eq!(cols, vec![2, 3, 4, 8, 9]);
    }

    #[test]
    fn retirement_only_touches_timestamp_and_status() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap();
        let guard = ReviewRecord::pending_guard();
        assert_eq!(guard.column, COL_STATUS);
        assert_eq!(guard.value, Value::from("Pending Review"));

        let updates = ReviewRecord::retirement_updates(now);
        let cols: Vec<usize> = updates.iter().map(|u| u.column).collect();
        assert_eq!(cols, vec![COL_PROCESSED_AT, COL_STATUS]);
        assert_eq!(updates[1].value, Value::from("Confirmed"));
    }

    #[test]
    fn accepts_scores_stored_as_text() {
        let mut row = ReviewRecord::pending(
            &post("p9", "AMD", 1, 1),
            &synthesis("AMD", 1.0),
            2.0,
            Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap(),
        )
        .to_row();
        row[COL_SCORE] = Value::from("3.5");
        assert_eq!(ReviewRecord::from_row(&row).unwrap().score, 3.5);

        row[COL_STATUS] = Value::from("Archived");
        assert!(ReviewRecord::from_row(&row).is_err());
    }

    #[test]
    fn training_row_keeps_model_confidence() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap();
        let row = training_row(&post("p1", "GME", 10, 2), &synthesis("GME", 6.5), now);
        assert_eq!(row.len(), TRAINING_HEADER.len());
        assert_eq!(row[6], Value::from(6.5));
        assert_eq!(row[7], Value::from("2026-03-02T15:00:00Z"));
    }
}
