use std::collections::BTreeMap;
use vulture_core::config::ScanMode;

/// Why an item left the pipeline without being kept.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkipReason {
    #[error("stickied post")]
    Stickied,
    #[error("media-only link")]
    MediaOnly,
    #[error("older than the scan window")]
    TooOld,
    #[error("summary call failed: {0}")]
    SummaryFailed(String),
    #[error("summary has no tag")]
    MissingTag,
    #[error("tag {0} is not a trade idea")]
    DiscardedTag(String),
    #[error("no actionable ticker")]
    NoTicker,
    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),
    #[error("post fetch failed: {0}")]
    FetchFailed(String),
    #[error("dropped by ranking")]
    Ranked,
    #[error("persistence failed: {0}")]
    PersistFailed(String),
    #[error("publish failed: {0}")]
    PublishFailed(String),
    #[error("already confirmed in an earlier run")]
    AlreadyConfirmed,
}

impl SkipReason {
    pub fn kind(&self) -> &'static str {
        match self {
            SkipReason::Stickied => "stickied",
            SkipReason::MediaOnly => "media_only",
            SkipReason::TooOld => "too_old",
            SkipReason::SummaryFailed(_) => "summary_failed",
            SkipReason::MissingTag => "missing_tag",
            SkipReason::DiscardedTag(_) => "discarded_tag",
            SkipReason::NoTicker => "no_ticker",
            SkipReason::SynthesisFailed(_) => "synthesis_failed",
            SkipReason::FetchFailed(_) => "fetch_failed",
            SkipReason::Ranked => "ranked_out",
            SkipReason::PersistFailed(_) => "persist_failed",
            SkipReason::PublishFailed(_) => "publish_failed",
            SkipReason::AlreadyConfirmed => "already_confirmed",
        }
    }

    /// Metadata rejections decided before any model call; never written to the ledger.
    pub fn is_prefilter(&self) -> bool {
        matches!(
            self,
            SkipReason::Stickied | SkipReason::MediaOnly | SkipReason::TooOld
        )
    }

    /// External-call failures, as opposed to content filters.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SkipReason::SummaryFailed(_)
                | SkipReason::SynthesisFailed(_)
                | SkipReason::FetchFailed(_)
                | SkipReason::PersistFailed(_)
                | SkipReason::PublishFailed(_)
        )
    }

    pub fn from_error(wrap: fn(String) -> SkipReason, err: &anyhow::Error) -> Self {
        wrap(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome<T> {
    Kept(T),
    Skipped(SkipReason),
}

impl<T> From<Result<T, SkipReason>> for ItemOutcome<T> {
    fn from(r: Result<T, SkipReason>) -> Self {
        match r {
            Ok(v) => ItemOutcome::Kept(v),
            Err(reason) => ItemOutcome::Skipped(reason),
        }
    }
}

/// Per-phase counters logged at the end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub phase: &'static str,
    pub mode: ScanMode,
    pub fetched: usize,
    pub already_seen: usize,
    pub processed: usize,
    pub kept: usize,
    pub persisted: usize,
    pub published: usize,
    pub skipped: BTreeMap<&'static str, usize>,
}

impl BatchReport {
    pub fn new(mode: ScanMode, phase: &'static str) -> Self {
        Self {
            phase,
            mode,
            fetched: 0,
            already_seen: 0,
            processed: 0,
            kept: 0,
            persisted: 0,
            published: 0,
            skipped: BTreeMap::new(),
        }
    }

    /// Counts an outcome and hands back the kept value.
    pub fn record<T>(&mut self, item_id: &str, outcome: ItemOutcome<T>) -> Option<T> {
        self.processed += 1;
        match outcome {
            ItemOutcome::Kept(v) => {
                self.kept += 1;
                Some(v)
            }
            ItemOutcome::Skipped(reason) => {
                self.skip(item_id, &reason);
                None
            }
        }
    }

    /// Counts a skip that happens after an item was already kept.
    pub fn skip(&mut self, item_id: &str, reason: &SkipReason) {
        *self.skipped.entry(reason.kind()).or_default() += 1;
        if reason.is_failure() {
            tracing::warn!(post_id = item_id, reason = %reason, "item skipped");
        } else {
            tracing::debug!(post_id = item_id, reason = %reason, "item filtered");
        }
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn log(&self) {
        tracing::info!(
            mode = %self.mode,
            phase = self.phase,
            fetched = self.fetched,
            already_seen = self.already_seen,
            processed = self.processed,
            kept = self.kept,
            persisted = self.persisted,
            published = self.published,
            skipped = self.skipped_total(),
            skipped_by_reason = ?self.skipped,
            "batch complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_kept_and_skipped_by_kind() {
        let mut report = BatchReport::new(ScanMode::Community, "discovery");
        assert_eq!(report.record("a", ItemOutcome::Kept(1)), Some(1));
        assert_eq!(report.record::<i32>("b", ItemOutcome::Skipped(SkipReason::NoTicker)), None);
        assert_eq!(report.record::<i32>("c", ItemOutcome::Skipped(SkipReason::NoTicker)), None);
        report.skip("a", &SkipReason::Ranked);

        assert_eq!(report.processed, 3);
        assert_eq!(report.kept, 1);
        assert_eq!(report.skipped.get("no_ticker"), Some(&2));
        assert_eq!(report.skipped_total(), 3);
    }

    #[test]
    fn error_chain_is_kept_in_reason() {
        let err = anyhow::anyhow!("HTTP 500").context("Anthropic request failed");
        let reason = SkipReason::from_error(SkipReason::SynthesisFailed, &err);
        assert_eq!(
            reason.to_string(),
            "synthesis failed: Anthropic request failed: HTTP 500"
        );
        assert!(reason.is_failure());
        assert!(!SkipReason::TooOld.is_failure());
    }

    #[test]
    fn only_metadata_rejections_are_prefilter() {
        assert!(SkipReason::Stickied.is_prefilter());
        assert!(SkipReason::TooOld.is_prefilter());
        assert!(!SkipReason::NoTicker.is_prefilter());
        assert!(!SkipReason::AlreadyConfirmed.is_prefilter());
        assert!(!SkipReason::AlreadyConfirmed.is_failure());
    }
}
