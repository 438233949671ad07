//! Per-post evaluation shared by the scan modes.

use crate::config::ScanConfig;
use crate::report::{ItemOutcome, SkipReason};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use vulture_core::domain::post::{AuthorProfile, Post};
use vulture_core::domain::synthesis::{SynthesisResult, Ticker};
use vulture_core::ingest::reddit::PostSource;
use vulture_core::llm::summary::{parse_summary, ParsedSummary, PostTag};
use vulture_core::llm::error::LlmDiagnosticsError;
use vulture_core::llm::{LlmClient, SynthesisInput};
use vulture_core::publish::Publisher;
use vulture_core::rank::{final_score, ScoredPost};
use vulture_core::scoring::{self, ScoreCard, ScoringInputs};
use vulture_core::storage::cache::SummaryCache;

/// Collaborators injected into every Reddit-driven scan.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub source: &'a dyn PostSource,
    pub llm: &'a dyn LlmClient,
    pub publisher: &'a dyn Publisher,
}

/// Which summary tags a scan keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagPolicy {
    /// Everything except results and info posts.
    TradeIdeas,
    /// News and DD only.
    NewsOnly,
}

impl TagPolicy {
    fn admits(self, tag: &PostTag) -> bool {
        match self {
            TagPolicy::TradeIdeas => !tag.is_discardable(),
            TagPolicy::NewsOnly => matches!(tag, PostTag::News | PostTag::DueDiligence),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Screened {
    pub summary_text: String,
    pub summary: ParsedSummary,
    pub ticker: Ticker,
}

/// Inputs gathered from Reddit and the model before scoring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signals {
    pub comments: Vec<String>,
    pub caption: Option<String>,
    pub author: AuthorProfile,
}

pub fn prefilter(post: &Post, max_age: ChronoDuration, now: DateTime<Utc>) -> Result<(), SkipReason> {
    if post.stickied {
        return Err(SkipReason::Stickied);
    }
    if post.is_media_only() {
        return Err(SkipReason::MediaOnly);
    }
    if post.is_older_than(max_age, now) {
        return Err(SkipReason::TooOld);
    }
    Ok(())
}

/// Cached summary text for a post. The model is only called on a cache miss.
pub async fn cached_summary(
    llm: &dyn LlmClient,
    cache: &mut SummaryCache,
    post: &Post,
) -> Result<String, SkipReason> {
    cache
        .get_or_compute(&post.id, || llm.summarize(&post.title, &post.body))
        .await
        .map_err(|err| {
            sentry_anyhow::capture_anyhow(&err);
            SkipReason::from_error(SkipReason::SummaryFailed, &err)
        })
}

pub async fn summarize_and_screen(
    llm: &dyn LlmClient,
    cache: &mut SummaryCache,
    post: &Post,
    policy: TagPolicy,
) -> Result<Screened, SkipReason> {
    let summary_text = cached_summary(llm, cache, post).await?;
    let summary = parse_summary(&summary_text);

    let tag = summary.tag().ok_or(SkipReason::MissingTag)?;
    if !policy.admits(&tag) {
        return Err(SkipReason::DiscardedTag(tag.to_string()));
    }

    let ticker = summary.ticker();
    if !ticker.is_actionable() {
        return Err(SkipReason::NoTicker);
    }

    Ok(Screened {
        summary_text,
        summary,
        ticker,
    })
}

/// Comments, image caption and author profile. Failures degrade to empty signals.
pub async fn gather_signals(svc: Services<'_>, config: &ScanConfig, post: &Post) -> Signals {
    let comments = match svc
        .source
        .fetch_top_comments(&post.id, config.comment_limit)
        .await
    {
        Ok(comments) => comments,
        Err(err) => {
            tracing::warn!(post_id = %post.id, error = %format!("{err:#}"), "comment fetch failed");
            Vec::new()
        }
    };
    tokio::time::sleep(config.comment_delay).await;

    let caption = match post.image_url.as_deref() {
        Some(url) => match svc.llm.caption_image(url).await {
            Ok(caption) => Some(caption),
            Err(err) => {
                tracing::warn!(post_id = %post.id, error = %format!("{err:#}"), "image caption failed");
                None
            }
        },
        None => None,
    };

    let author = match post.author.as_deref() {
        Some(name) => svc.source.fetch_author(name).await.unwrap_or_else(|err| {
            tracing::debug!(post_id = %post.id, author = name, error = %format!("{err:#}"), "author lookup failed");
            AuthorProfile::default()
        }),
        None => AuthorProfile::default(),
    };

    Signals {
        comments,
        caption,
        author,
    }
}

pub fn score_post(post: &Post, summary_text: &str, signals: &Signals) -> ScoreCard {
    scoring::score(&ScoringInputs {
        summary_text,
        body: &post.body,
        image_caption: signals.caption.as_deref(),
        comments: &signals.comments,
        upvotes: post.upvotes,
        num_comments: post.num_comments,
        author: signals.author,
    })
}

pub async fn synthesize(
    llm: &dyn LlmClient,
    post: &Post,
    comments: &[String],
) -> Result<SynthesisResult, SkipReason> {
    let input = SynthesisInput {
        title: post.title.clone(),
        body: post.body.clone(),
        comments_text: comments.join("\n"),
    };
    llm.synthesize(&input).await.map_err(|err| {
        if let Some(diag) = err.downcast_ref::<LlmDiagnosticsError>() {
            tracing::warn!(
                post_id = %post.id,
                stage = diag.stage,
                output = diag.output_excerpt(300).as_deref().unwrap_or(""),
                "synthesis reply unusable"
            );
        }
        sentry_anyhow::capture_anyhow(&err);
        SkipReason::from_error(SkipReason::SynthesisFailed, &err)
    })
}

/// Scores and synthesizes a post and combines them into its final score.
pub async fn assess(
    svc: Services<'_>,
    config: &ScanConfig,
    post: &Post,
    summary_text: &str,
) -> Result<ScoredPost, SkipReason> {
    let signals = gather_signals(svc, config, post).await;
    let card = score_post(post, summary_text, &signals);
    let synthesis = synthesize(svc.llm, post, &signals.comments).await?;
    let score = final_score(card.confidence, &synthesis.ticker);

    tracing::debug!(
        post_id = %post.id,
        ticker = %synthesis.ticker,
        engine_score = card.confidence,
        model_confidence = synthesis.confidence,
        score,
        flagship = card.flagship,
        "post assessed"
    );

    Ok(ScoredPost {
        post: post.clone(),
        synthesis,
        score,
        flagship: card.flagship,
    })
}

/// Discovery path for one post: filter, summarize, screen, score, synthesize.
pub async fn evaluate_discovery(
    svc: Services<'_>,
    cache: &mut SummaryCache,
    config: &ScanConfig,
    post: &Post,
    now: DateTime<Utc>,
) -> ItemOutcome<ScoredPost> {
    let result = async {
        prefilter(post, config.discovery_max_age, now)?;
        let screened = summarize_and_screen(svc.llm, cache, post, TagPolicy::TradeIdeas).await?;
        assess(svc, config, post, &screened.summary_text).await
    }
    .await;
    result.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{post_at, FakeLlm, FakeSource, RecordingPublisher};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap()
    }

    #[test]
    fn prefilter_rejects_stickied_media_and_stale() {
        let max_age = ChronoDuration::hours(48);
        let mut p = post_at("p1", "GME thesis", now() - ChronoDuration::hours(2));
        assert_eq!(prefilter(&p, max_age, now()), Ok(()));

        p.stickied = true;
        assert_eq!(prefilter(&p, max_age, now()), Err(SkipReason::Stickied));
        p.stickied = false;

        p.link_url = "https://i.redd.it/chart.jpeg".to_string();
        assert_eq!(prefilter(&p, max_age, now()), Err(SkipReason::MediaOnly));
        p.link_url = p.url.clone();

        p.created_utc = now() - ChronoDuration::hours(49);
        assert_eq!(prefilter(&p, max_age, now()), Err(SkipReason::TooOld));
    }

    #[test]
    fn tag_policies() {
        assert!(TagPolicy::TradeIdeas.admits(&PostTag::DueDiligence));
        assert!(TagPolicy::TradeIdeas.admits(&PostTag::Other("Meme".to_string())));
        assert!(!TagPolicy::TradeIdeas.admits(&PostTag::Results));
        assert!(TagPolicy::NewsOnly.admits(&PostTag::News));
        assert!(!TagPolicy::NewsOnly.admits(&PostTag::Other("Meme".to_string())));
    }

    #[tokio::test]
    async fn discovery_keeps_a_screened_post() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig::for_tests(dir.path());
        let mut cache = SummaryCache::load(config.cache_path(), now()).await;

        let post = post_at("p1", "GME thesis", now() - ChronoDuration::hours(1));
        let source = FakeSource::default().with_comments("p1", &["Great DD, I bought 10 shares"]);
        let llm = FakeLlm::default()
            .with_summary("GME thesis", "Tag: DD\nTLDR: Buy GME at $20, target $40 by June because of earnings\nTicker: $gme")
            .with_synthesis("GME thesis", "GME", 7.0);
        let publisher = RecordingPublisher::default();
        let svc = Services { source: &source, llm: &llm, publisher: &publisher };

        let outcome = evaluate_discovery(svc, &mut cache, &config, &post, now()).await;
        let ItemOutcome::Kept(scored) = outcome else {
            panic!("expected kept, got {outcome:?}");
        };
        assert_eq!(scored.synthesis.ticker.as_str(), "GME");
        assert!(scored.score > 0.0);
        assert_eq!(cache.get("p1").map(|s| s.starts_with("Tag: DD")), Some(true));
    }

    #[tokio::test]
    async fn discovery_screens_out_results_posts_before_synthesis() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig::for_tests(dir.path());
        let mut cache = SummaryCache::load(config.cache_path(), now()).await;

        let post = post_at("p2", "Up 400% on calls", now() - ChronoDuration::hours(1));
        let source = FakeSource::default();
        let llm = FakeLlm::default()
            .with_summary("Up 400% on calls", "Tag: Results\nTicker: NVDA")
            .with_synthesis("Up 400% on calls", "NVDA", 9.0);
        let publisher = RecordingPublisher::default();
        let svc = Services { source: &source, llm: &llm, publisher: &publisher };

        let outcome = evaluate_discovery(svc, &mut cache, &config, &post, now()).await;
        assert_eq!(
            outcome,
            ItemOutcome::Skipped(SkipReason::DiscardedTag("Results".to_string()))
        );
        assert_eq!(llm.synthesis_calls(), 0);
    }

    #[tokio::test]
    async fn sentinel_synthesis_ticker_zeroes_the_score() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig::for_tests(dir.path());
        let mut cache = SummaryCache::load(config.cache_path(), now()).await;

        let post = post_at("p3", "Thoughts on the market", now() - ChronoDuration::hours(1));
        let source = FakeSource::default();
        let llm = FakeLlm::default()
            .with_summary("Thoughts on the market", "Tag: DD\nTLDR: buy SPY calls\nTicker: SPY")
            .with_synthesis("Thoughts on the market", "N/A", 7.0);
        let publisher = RecordingPublisher::default();
        let svc = Services { source: &source, llm: &llm, publisher: &publisher };

        let outcome = evaluate_discovery(svc, &mut cache, &config, &post, now()).await;
        let ItemOutcome::Kept(scored) = outcome else {
            panic!("expected kept, got {outcome:?}");
        };
        assert_eq!(scored.score, 0.0);
        assert_eq!(scored.synthesis.confidence, 7.0);
    }

    #[tokio::test]
    async fn author_profile_feeds_credibility() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig::for_tests(dir.path());
        let mut post = post_at("p5", "TSLA deliveries", now() - ChronoDuration::hours(1));
        post.author = Some("veteran".to_string());
        let veteran = AuthorProfile {
            account_age_years: 5.0,
            total_karma: 20_000,
            finance_post_count: 4,
        };
        let source = FakeSource::default().with_author("veteran", veteran);
        let llm = FakeLlm::default();
        let publisher = RecordingPublisher::default();
        let svc = Services { source: &source, llm: &llm, publisher: &publisher };

        let signals = gather_signals(svc, &config, &post).await;
        assert_eq!(signals.author, veteran);
        let card = score_post(&post, "Tag: DD\nTicker: TSLA", &signals);
        assert_eq!(card.sub_scores.credibility, 3.0);
    }

    #[tokio::test]
    async fn failed_author_lookup_scores_zero_credibility_and_still_keeps() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig::for_tests(dir.path());
        let mut cache = SummaryCache::load(config.cache_path(), now()).await;

        let mut post = post_at("p6", "TSLA deliveries", now() - ChronoDuration::hours(1));
        post.author = Some("deleted_account".to_string());
        let source = FakeSource::default();
        let llm = FakeLlm::default()
            .with_summary("TSLA deliveries", "Tag: DD\nTLDR: buy TSLA before deliveries\nTicker: TSLA")
            .with_synthesis("TSLA deliveries", "TSLA", 6.0);
        let publisher = RecordingPublisher::default();
        let svc = Services { source: &source, llm: &llm, publisher: &publisher };

        let signals = gather_signals(svc, &config, &post).await;
        assert_eq!(signals.author, AuthorProfile::default());
        let card = score_post(&post, "Tag: DD\nTicker: TSLA", &signals);
        assert_eq!(card.sub_scores.credibility, 0.0);

        let outcome = evaluate_discovery(svc, &mut cache, &config, &post, now()).await;
        assert!(matches!(outcome, ItemOutcome::Kept(_)), "got {outcome:?}");
    }

    #[tokio::test]
    async fn synthesis_failure_is_a_skip() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig::for_tests(dir.path());
        let mut cache = SummaryCache::load(config.cache_path(), now()).await;

        let post = post_at("p4", "AMD breakout", now() - ChronoDuration::hours(1));
        let source = FakeSource::default();
        let llm = FakeLlm::default().with_summary("AMD breakout", "Tag: DD\nTicker: AMD");
        let publisher = RecordingPublisher::default();
        let svc = Services { source: &source, llm: &llm, publisher: &publisher };

        let outcome = evaluate_discovery(svc, &mut cache, &config, &post, now()).await;
        assert!(matches!(
            outcome,
            ItemOutcome::Skipped(SkipReason::SynthesisFailed(_))
        ));
    }
}
