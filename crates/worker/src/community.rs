//! Discovery and confirmation of community trade ideas.
//!
//! Records move `Pending Review -> Confirmed`. Discovery creates pending rows;
//! confirmation re-synthesizes them with fresh comments, confirms them in place and
//! publishes. The first run of each UTC day only discovers; later runs confirm first.

use crate::config::ScanConfig;
use crate::evaluate::{self, Services};
use crate::report::{BatchReport, ItemOutcome, SkipReason};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use vulture_core::config::ScanMode;
use vulture_core::domain::post::Post;
use vulture_core::domain::review::{training_row, ReviewRecord, ReviewStatus};
use vulture_core::publish::PlayCard;
use vulture_core::rank::{rank, ScoredPost};
use vulture_core::storage::cache::SummaryCache;
use vulture_core::storage::ledger::Ledger;
use vulture_core::storage::sheets::{row_key, SheetStore};

const TITLE_PLACEHOLDER: &str = "Title not available";
const BODY_PLACEHOLDER: &str = "Body not available";

#[derive(Debug, Clone, PartialEq)]
pub struct CommunityReport {
    pub first_run_of_day: bool,
    pub confirmation: Option<BatchReport>,
    pub discovery: BatchReport,
}

pub async fn run(
    svc: Services<'_>,
    sheets: &dyn SheetStore,
    config: &ScanConfig,
    today: NaiveDate,
) -> anyhow::Result<CommunityReport> {
    let marker = config.marker();
    let first_run_of_day = marker.is_first_run(today).await;
    tracing::info!(%today, first_run_of_day, "community scan starting");

    let mut ledger = Ledger::load(config.ledger_path()).await;
    let mut cache = SummaryCache::load(config.cache_path(), Utc::now()).await;

    let confirmation = if first_run_of_day {
        tracing::info!("first run of the day; skipping confirmation");
        None
    } else {
        let report = confirm_pending(svc, sheets, &mut cache, config).await;
        report.log();
        Some(report)
    };

    let discovery = discover(svc, sheets, &mut ledger, &mut cache, config).await;
    discovery.log();

    if let Err(err) = cache.save().await {
        tracing::warn!(error = %format!("{err:#}"), "failed to save summary cache");
    }

    if first_run_of_day && !config.dry_run {
        marker.write(today).await?;
        tracing::info!(%today, "recorded first run of the day");
    }

    Ok(CommunityReport {
        first_run_of_day,
        confirmation,
        discovery,
    })
}

/// Finds new posts, scores them and queues survivors as `Pending Review`.
pub async fn discover(
    svc: Services<'_>,
    sheets: &dyn SheetStore,
    ledger: &mut Ledger,
    cache: &mut SummaryCache,
    config: &ScanConfig,
) -> BatchReport {
    let mut report = BatchReport::new(ScanMode::Community, "discovery");
    let now = Utc::now();
    let queued = queued_ids(sheets, config).await;

    let mut attempted: Vec<String> = Vec::new();
    let mut attempted_set: HashSet<String> = HashSet::new();
    let mut candidates: Vec<ScoredPost> = Vec::new();

    for subreddit in &config.subreddits {
        let posts = match svc.source.fetch_recent(subreddit, config.post_limit).await {
            Ok(posts) => posts,
            Err(err) => {
                sentry_anyhow::capture_anyhow(&err);
                tracing::warn!(subreddit = %subreddit, error = %format!("{err:#}"), "subreddit fetch failed");
                continue;
            }
        };
        tracing::info!(subreddit = %subreddit, posts = posts.len(), "fetched subreddit");

        for post in posts {
            report.fetched += 1;
            if ledger.has_seen(&post.id) || !attempted_set.insert(post.id.clone()) {
                report.already_seen += 1;
                continue;
            }
            if queued.contains(&post.id) {
                tracing::debug!(post_id = %post.id, "already has a review row");
                report.already_seen += 1;
                attempted.push(post.id.clone());
                continue;
            }

            let outcome = evaluate::evaluate_discovery(svc, cache, config, &post, now).await;
            if !matches!(&outcome, ItemOutcome::Skipped(reason) if reason.is_prefilter()) {
                attempted.push(post.id.clone());
            }
            if let Some(scored) = report.record(&post.id, outcome) {
                candidates.push(scored);
            }
        }
    }

    let candidate_ids: Vec<String> = candidates.iter().map(|c| c.post.id.clone()).collect();
    let ranked = rank(candidates);
    let ranked_ids: HashSet<&str> = ranked.iter().map(|c| c.post.id.as_str()).collect();
    for id in candidate_ids.iter().filter(|id| !ranked_ids.contains(id.as_str())) {
        report.skip(id, &SkipReason::Ranked);
    }

    if !ranked.is_empty() {
        queue_for_review(sheets, config, &ranked, now, &mut report).await;
    }

    if config.dry_run {
        tracing::info!(attempted = attempted.len(), "dry run: ledger not updated");
    } else {
        match ledger.mark_seen(&attempted).await {
            Ok(written) => tracing::debug!(written, "ledger updated"),
            Err(err) => tracing::warn!(error = %format!("{err:#}"), "failed to update ledger"),
        }
    }

    report
}

/// Ids that already have a row in the main feed, whatever their status.
async fn queued_ids(sheets: &dyn SheetStore, config: &ScanConfig) -> HashSet<String> {
    match sheets.read_rows(&config.main_sheet).await {
        Ok(rows) => rows
            .iter()
            .map(|row| row_key(row))
            .filter(|id| !id.is_empty())
            .collect(),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), sheet = %config.main_sheet, "failed to read review rows; relying on the ledger alone");
            HashSet::new()
        }
    }
}

async fn queue_for_review(
    sheets: &dyn SheetStore,
    config: &ScanConfig,
    ranked: &[ScoredPost],
    now: DateTime<Utc>,
    report: &mut BatchReport,
) {
    let main_rows: Vec<_> = ranked
        .iter()
        .map(|c| ReviewRecord::pending(&c.post, &c.synthesis, c.score, now).to_row())
        .collect();
    let training_rows: Vec<_> = ranked
        .iter()
        .map(|c| training_row(&c.post, &c.synthesis, now))
        .collect();

    if config.dry_run {
        for c in ranked {
            tracing::info!(post_id = %c.post.id, ticker = %c.synthesis.ticker, score = c.score, "dry run: would queue for review");
        }
        return;
    }

    match sheets.append_rows(&config.main_sheet, &main_rows).await {
        Ok(()) => {
            report.persisted += ranked.len();
            tracing::info!(rows = main_rows.len(), sheet = %config.main_sheet, "queued posts for review");
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            let reason = SkipReason::from_error(SkipReason::PersistFailed, &err);
            for c in ranked {
                report.skip(&c.post.id, &reason);
            }
            return;
        }
    }

    if let Err(err) = sheets.append_rows(&config.training_sheet, &training_rows).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::warn!(error = %format!("{err:#}"), sheet = %config.training_sheet, "failed to append training rows");
    }
}

/// Re-evaluates every `Pending Review` record, confirms it and publishes it.
pub async fn confirm_pending(
    svc: Services<'_>,
    sheets: &dyn SheetStore,
    cache: &mut SummaryCache,
    config: &ScanConfig,
) -> BatchReport {
    let mut report = BatchReport::new(ScanMode::Community, "confirmation");

    let rows = match sheets.read_rows(&config.main_sheet).await {
        Ok(rows) => rows,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %format!("{err:#}"), "failed to read review records");
            return report;
        }
    };

    let records: Vec<ReviewRecord> = rows
        .iter()
        .filter_map(|row| match ReviewRecord::from_row(row) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "skipping malformed review row");
                None
            }
        })
        .collect();

    let confirmed_ids: HashSet<String> = records
        .iter()
        .filter(|r| r.status == ReviewStatus::Confirmed)
        .map(|r| r.id.clone())
        .collect();
    let mut pending_ids: HashSet<String> = HashSet::new();
    let pending: Vec<ReviewRecord> = records
        .into_iter()
        .filter(|r| r.status == ReviewStatus::PendingReview && pending_ids.insert(r.id.clone()))
        .collect();

    report.fetched = pending.len();
    if pending.is_empty() {
        tracing::info!("no posts are pending review");
        return report;
    }
    tracing::info!(pending = pending.len(), "confirming pending posts");

    for record in pending {
        let id = record.id.clone();
        if confirmed_ids.contains(&id) {
            report.record::<()>(&id, ItemOutcome::Skipped(SkipReason::AlreadyConfirmed));
            if !config.dry_run {
                retire_duplicates(sheets, config, &id).await;
            }
            continue;
        }

        let outcome: ItemOutcome<(ReviewRecord, bool)> =
            confirm_one(svc, cache, config, record).await.into();
        let Some((confirmed, flagship)) = report.record(&id, outcome) else {
            continue;
        };

        if config.dry_run {
            tracing::info!(post_id = %id, ticker = %confirmed.ticker, score = confirmed.score, "dry run: would confirm and publish");
            continue;
        }

        match sheets
            .find_and_update_row_where(
                &config.main_sheet,
                &id,
                &ReviewRecord::pending_guard(),
                &confirmed.confirmation_updates(),
            )
            .await
        {
            Ok(true) => report.persisted += 1,
            Ok(false) => {
                report.skip(&id, &SkipReason::PersistFailed("pending review row not found".to_string()));
                continue;
            }
            Err(err) => {
                sentry_anyhow::capture_anyhow(&err);
                report.skip(&id, &SkipReason::from_error(SkipReason::PersistFailed, &err));
                continue;
            }
        }

        if confirmed.score <= 0.0 || !confirmed.ticker.is_actionable() {
            tracing::info!(post_id = %id, ticker = %confirmed.ticker, "confirmed without an actionable play; not publishing");
            continue;
        }

        let card = PlayCard::from_record(&confirmed, flagship);
        match svc.publisher.publish_play(&card).await {
            Ok(()) => report.published += 1,
            Err(err) => {
                sentry_anyhow::capture_anyhow(&err);
                report.skip(&id, &SkipReason::from_error(SkipReason::PublishFailed, &err));
            }
        }
        tokio::time::sleep(config.publish_delay).await;
    }

    report
}

/// Closes every remaining pending row for an id that was confirmed on another row.
async fn retire_duplicates(sheets: &dyn SheetStore, config: &ScanConfig, id: &str) {
    let guard = ReviewRecord::pending_guard();
    let updates = ReviewRecord::retirement_updates(Utc::now());
    let mut retired = 0usize;
    loop {
        match sheets
            .find_and_update_row_where(&config.main_sheet, id, &guard, &updates)
            .await
        {
            Ok(true) => retired += 1,
            Ok(false) => break,
            Err(err) => {
                sentry_anyhow::capture_anyhow(&err);
                tracing::warn!(post_id = id, error = %format!("{err:#}"), "failed to retire duplicate review row");
                break;
            }
        }
    }
    tracing::info!(post_id = id, retired, "retired duplicate review rows");
}

async fn confirm_one(
    svc: Services<'_>,
    cache: &mut SummaryCache,
    config: &ScanConfig,
    record: ReviewRecord,
) -> Result<(ReviewRecord, bool), SkipReason> {
    let post = match svc.source.fetch_post(&record.id).await {
        Ok(Some(post)) => post,
        Ok(None) => {
            tracing::info!(post_id = %record.id, "post no longer available; using placeholders");
            placeholder_post(&record)
        }
        Err(err) => {
            tracing::warn!(post_id = %record.id, error = %format!("{err:#}"), "post re-fetch failed; using placeholders");
            placeholder_post(&record)
        }
    };

    let summary_text = evaluate::cached_summary(svc.llm, cache, &post).await?;
    let scored = evaluate::assess(svc, config, &post, &summary_text).await?;

    let confirmed = record
        .confirm(&scored.synthesis, scored.score, Utc::now())
        .map_err(|err| SkipReason::from_error(SkipReason::PersistFailed, &err))?;
    Ok((confirmed, scored.flagship))
}

fn placeholder_post(record: &ReviewRecord) -> Post {
    Post {
        id: record.id.clone(),
        source: record.source.clone(),
        title: TITLE_PLACEHOLDER.to_string(),
        body: BODY_PLACEHOLDER.to_string(),
        url: record.url.clone(),
        link_url: record.url.clone(),
        created_utc: record.created_at,
        upvotes: 0,
        num_comments: 0,
        author: None,
        image_url: None,
        stickied: false,
    }
}
