use crate::config::ScanConfig;
use crate::evaluate::{self, Screened, Services, TagPolicy};
use crate::report::{BatchReport, ItemOutcome, SkipReason};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use vulture_core::config::ScanMode;
use vulture_core::domain::post::Post;
use vulture_core::domain::synthesis::Ticker;
use vulture_core::llm::summary::Direction;
use vulture_core::publish::{Announcement, AnnouncementField, ConfidenceBand};
use vulture_core::rank::{final_score, rank, Rankable};
use vulture_core::storage::cache::SummaryCache;
use vulture_core::storage::ledger::Ledger;

#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub post: Post,
    pub screened: Screened,
    pub score: f64,
    pub flagship: bool,
}

impl Rankable for NewsItem {
    fn post(&self) -> &Post {
        &self.post
    }

    fn ticker(&self) -> &Ticker {
        &self.screened.ticker
    }

    fn score(&self) -> f64 {
        self.score
    }
}

impl NewsItem {
    pub fn announcement(&self) -> Announcement {
        let summary = &self.screened.summary;
        let band = ConfidenceBand::from_score(self.score);
        let direction = summary.direction().unwrap_or(Direction::Down);
        let positions = summary
            .positions
            .clone()
            .unwrap_or_else(|| "None listed".to_string());

        let mut title = format!("{} | {} | {}", self.screened.ticker, direction.as_str(), band.emoji());
        if self.flagship {
            title.push_str(" \u{2B50}");
        }

        Announcement {
            title,
            description: summary.tldr.clone().unwrap_or_else(|| self.post.title.clone()),
            url: Some(self.post.url.clone()),
            color: Some(band.color()),
            fields: vec![
                AnnouncementField::new(
                    "Tag",
                    summary.tag().map(|t| t.to_string()).unwrap_or_default(),
                    true,
                ),
                AnnouncementField::new("Confidence", format!("{:.1}/10", self.score), true),
                AnnouncementField::new("Source", format!("r/{}", self.post.source), true),
                AnnouncementField::new("Positions", positions, false),
            ],
        }
    }
}

/// Sweeps the news subreddits and posts each ranked item to the news channel.
pub async fn run(svc: Services<'_>, config: &ScanConfig, now: DateTime<Utc>) -> anyhow::Result<BatchReport> {
    let mut report = BatchReport::new(ScanMode::News, "news");
    let mut ledger = Ledger::load(config.ledger_path()).await;
    let mut cache = SummaryCache::load(config.cache_path(), now).await;

    let mut attempted: Vec<String> = Vec::new();
    let mut attempted_set: HashSet<String> = HashSet::new();
    let mut items: Vec<NewsItem> = Vec::new();

    for subreddit in &config.news_subreddits {
        let posts = match svc.source.fetch_recent(subreddit, config.post_limit).await {
            Ok(posts) => posts,
            Err(err) => {
                sentry_anyhow::capture_anyhow(&err);
                tracing::warn!(subreddit = %subreddit, error = %format!("{err:#}"), "subreddit fetch failed");
                continue;
            }
        };

        for post in posts {
            report.fetched += 1;
            if ledger.has_seen(&post.id) || !attempted_set.insert(post.id.clone()) {
                report.already_seen += 1;
                continue;
            }

            let outcome: ItemOutcome<NewsItem> =
                evaluate_news(svc, &mut cache, config, &post, now).await.into();
            if !matches!(&outcome, ItemOutcome::Skipped(reason) if reason.is_prefilter()) {
                attempted.push(post.id.clone());
            }
            if let Some(item) = report.record(&post.id, outcome) {
                items.push(item);
            }
        }
    }

    let candidate_ids: Vec<String> = items.iter().map(|i| i.post.id.clone()).collect();
    let ranked = rank(items);
    let ranked_ids: HashSet<&str> = ranked.iter().map(|i| i.post.id.as_str()).collect();
    for id in candidate_ids.iter().filter(|id| !ranked_ids.contains(id.as_str())) {
        report.skip(id, &SkipReason::Ranked);
    }

    for item in &ranked {
        let message = item.announcement();
        if config.dry_run {
            tracing::info!(post_id = %item.post.id, title = %message.title, "dry run: would announce news item");
            continue;
        }
        match svc.publisher.announce(&message).await {
            Ok(()) => report.published += 1,
            Err(err) => {
                sentry_anyhow::capture_anyhow(&err);
                report.skip(&item.post.id, &SkipReason::from_error(SkipReason::PublishFailed, &err));
            }
        }
        tokio::time::sleep(config.publish_delay).await;
    }

    if !config.dry_run {
        if let Err(err) = ledger.mark_seen(&attempted).await {
            tracing::warn!(error = %format!("{err:#}"), "failed to update ledger");
        }
    }
    if let Err(err) = cache.save().await {
        tracing::warn!(error = %format!("{err:#}"), "failed to save summary cache");
    }

    Ok(report)
}

async fn evaluate_news(
    svc: Services<'_>,
    cache: &mut SummaryCache,
    config: &ScanConfig,
    post: &Post,
    now: DateTime<Utc>,
) -> Result<NewsItem, SkipReason> {
    evaluate::prefilter(post, config.news_max_age, now)?;
    let screened = evaluate::summarize_and_screen(svc.llm, cache, post, TagPolicy::NewsOnly).await?;
    let signals = evaluate::gather_signals(svc, config, post).await;
    let card = evaluate::score_post(post, &screened.summary_text, &signals);

    Ok(NewsItem {
        post: post.clone(),
        score: final_score(card.confidence, &screened.ticker),
        flagship: card.flagship,
        screened,
    })
}
