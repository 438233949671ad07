//! Post-scoring consolidation: drop non-actionable items, order by popularity,
//! keep one item per title.

use crate::domain::post::Post;
use crate::domain::synthesis::{SynthesisResult, Ticker};
use std::collections::HashSet;

pub trait Rankable {
    fn post(&self) -> &Post;
    fn ticker(&self) -> &Ticker;
    fn score(&self) -> f64;
}

/// A discovered post with its synthesis and final confidence score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPost {
    pub post: Post,
    pub synthesis: SynthesisResult,
    pub score: f64,
    pub flagship: bool,
}

impl Rankable for ScoredPost {
    fn post(&self) -> &Post {
        &self.post
    }

    fn ticker(&self) -> &Ticker {
        &self.synthesis.ticker
    }

    fn score(&self) -> f64 {
        self.score
    }
}

/// Final score for a post: the engine score, or zero when the model found no ticker.
pub fn final_score(engine_score: f64, ticker: &Ticker) -> f64 {
    if ticker.is_actionable() {
        engine_score
    } else {
        0.0
    }
}

/// Drops items scored `<= 0` or without a ticker, sorts by (upvotes, comments)
/// descending and keeps the first item per title. The sort is stable, so equal
/// popularity keeps input order.
pub fn rank<T: Rankable>(items: Vec<T>) -> Vec<T> {
    let mut kept: Vec<T> = items
        .into_iter()
        .filter(|item| item.score() > 0.0 && item.ticker().is_actionable())
        .collect();

    kept.sort_by(|a, b| b.post().popularity().cmp(&a.post().popularity()));

    let mut titles = HashSet::new();
    kept.retain(|item| titles.insert(item.post().title.clone()));
    kept
}
