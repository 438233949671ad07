//! Deterministic multi-factor confidence scoring.
//!
//! Every factor is a pure function of observable text and counters. The final
//! confidence is the capped sum of the factors, clamped to [`MAX_CONFIDENCE`] and
//! rounded to one decimal.

pub mod factors;

use crate::domain::post::AuthorProfile;
use serde::{Deserialize, Serialize};

pub const MAX_CONFIDENCE: f64 = 10.0;

/// Unweighted total above which a post is presented as a flagship find.
pub const FLAGSHIP_THRESHOLD: f64 = 10.0;

pub const MAX_THESIS_CLARITY: f64 = 5.0;
pub const MAX_CATALYST: f64 = 1.5;
pub const MAX_FORMATTING: f64 = 0.5;
pub const MAX_IMAGE_INSIGHT: f64 = 0.5;
pub const MAX_ENGAGEMENT: f64 = 1.0;
pub const MAX_POSITION_BONUS: f64 = 0.5;
pub const MAX_CREDIBILITY: f64 = 3.0;

/// Signals the factors are computed from.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInputs<'a> {
    /// Model summary of the post; thesis and catalyst are read from it.
    pub summary_text: &'a str,
    pub body: &'a str,
    pub image_caption: Option<&'a str>,
    pub comments: &'a [String],
    pub upvotes: i64,
    pub num_comments: i64,
    pub author: AuthorProfile,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub thesis_clarity: f64,
    pub catalyst_present: f64,
    pub formatting_quality: f64,
    pub image_insight: f64,
    pub engagement_quality: f64,
    pub position_disclosure_bonus: f64,
    pub credibility: f64,
}

impl SubScores {
    pub fn compute(inputs: &ScoringInputs<'_>) -> Self {
        Self {
            thesis_clarity: factors::thesis_clarity(inputs.summary_text),
            catalyst_present: factors::catalyst_present(inputs.summary_text),
            formatting_quality: factors::formatting_quality(inputs.body),
            image_insight: inputs.image_caption.map_or(0.0, factors::image_insight),
            engagement_quality: factors::engagement_quality(
                inputs.comments,
                inputs.upvotes,
                inputs.num_comments,
            ),
            position_disclosure_bonus: factors::position_disclosure(inputs.body, inputs.comments),
            credibility: factors::credibility(&inputs.author),
        }
    }

    /// Each factor clamped into its declared range.
    pub fn capped(&self) -> Self {
        Self {
            thesis_clarity: cap(self.thesis_clarity, MAX_THESIS_CLARITY),
            catalyst_present: cap(self.catalyst_present, MAX_CATALYST),
            formatting_quality: cap(self.formatting_quality, MAX_FORMATTING),
            image_insight: cap(self.image_insight, MAX_IMAGE_INSIGHT),
            engagement_quality: cap(self.engagement_quality, MAX_ENGAGEMENT),
            position_disclosure_bonus: cap(self.position_disclosure_bonus, MAX_POSITION_BONUS),
            credibility: cap(self.credibility, MAX_CREDIBILITY),
        }
    }

    pub fn confidence_score(&self) -> f64 {
        let c = self.capped();
        let total = c.thesis_clarity
            + c.catalyst_present
            + c.formatting_quality
            + c.image_insight
            + c.engagement_quality
            + c.position_disclosure_bonus
            + c.credibility;
        round1(total.min(MAX_CONFIDENCE))
    }

    fn content_total(&self) -> f64 {
        self.thesis_clarity
            + self.catalyst_present
            + self.engagement_quality
            + self.formatting_quality
            + self.image_insight
            + self.position_disclosure_bonus
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub sub_scores: SubScores,
    pub confidence: f64,
    /// Presentation emphasis only; never used for gating.
    pub flagship: bool,
}

pub fn score(inputs: &ScoringInputs<'_>) -> ScoreCard {
    let sub_scores = SubScores::compute(inputs);
    let flagship =
        sub_scores.content_total() + normalized_credibility(&inputs.author) > FLAGSHIP_THRESHOLD;
    ScoreCard {
        confidence: sub_scores.confidence_score(),
        sub_scores,
        flagship,
    }
}

/// Continuous counterpart of the tiered credibility factor, each component in [0, 1].
pub fn normalized_credibility(author: &AuthorProfile) -> f64 {
    let age = (author.account_age_years / 3.0).clamp(0.0, 1.0);
    let karma = (author.total_karma as f64 / 1000.0).clamp(0.0, 1.0);
    let history = (f64::from(author.finance_post_count) / 3.0).clamp(0.0, 1.0);
    age + karma + history
}

fn cap(v: f64, max: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, max)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> SubScores {
        SubScores {
            thesis_clarity: 5.0,
            catalyst_present: 1.5,
            formatting_quality: 0.5,
            image_insight: 0.5,
            engagement_quality: 1.0,
            position_disclosure_bonus: 0.5,
            credibility: 3.0,
        }
    }

    #[test]
    fn maximal_sub_scores_land_exactly_on_the_cap() {
        assert_eq!(full().confidence_score(), 10.0);
    }

    #[test]
    fn out_of_range_inputs_are_capped() {
        let s = SubScores {
            thesis_clarity: 40.0,
            credibility: -2.0,
            ..Default::default()
        };
        assert_eq!(s.confidence_score(), 5.0);
        assert_eq!(SubScores::default().confidence_score(), 0.0);
    }

    #[test]
    fn rounds_to_one_decimal() {
        let s = SubScores {
            catalyst_present: 0.75,
            formatting_quality: 0.5,
            ..Default::default()
        };
        assert_eq!(s.confidence_score(), 1.3);
    }

    #[test]
    fn score_is_bounded_and_monotonic_in_each_factor() {
        let steps = [0.0, 0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 5.0, 8.0];
        let setters: [fn(&mut SubScores, f64); 7] = [
            |s, v| s.thesis_clarity = v,
            |s, v| s.catalyst_present = v,
            |s, v| s.formatting_quality = v,
            |s, v| s.image_insight = v,
            |s, v| s.engagement_quality = v,
            |s, v| s.position_disclosure_bonus = v,
            |s, v| s.credibility = v,
        ];

        for base in [SubScores::default(), full(), SubScores { thesis_clarity: 2.0, credibility: 1.5, ..Default::default() }] {
            for set in setters {
                let mut prev = f64::MIN;
                for v in steps {
                    let mut s = base;
                    set(&mut s, v);
                    let c = s.confidence_score();
                    assert!((0.0..=MAX_CONFIDENCE).contains(&c));
                    assert!(c >= prev, "score decreased: {prev} -> {c}");
                    prev = c;
                }
            }
        }
    }

    #[test]
    fn flagship_needs_more_than_the_threshold() {
        let veteran = AuthorProfile {
            account_age_years: 6.0,
            total_karma: 50_000,
            finance_post_count: 12,
        };
        assert_eq!(normalized_credibility(&veteran), 3.0);

        let comments = vec!["Solid DD, I'm in".to_string()];
        let summary = "Buy $40 calls because FDA decision on March 3 at 8am, targeting from $20 to $35 by next week.";
        let body = "I'm long $50k of this.\n\n- chart\n- thesis";
        let inputs = ScoringInputs {
            summary_text: summary,
            body,
            image_caption: Some("Screenshot of 200 shares at $21"),
            comments: &comments,
            upvotes: 900,
            num_comments: 100,
            author: veteran,
        };
        let card = score(&inputs);
        assert_eq!(card.confidence, 10.0);
        assert!(card.flagship);

        let newcomer = ScoringInputs {
            author: AuthorProfile::default(),
            ..inputs
        };
        let card = score(&newcomer);
        assert!(!card.flagship);
        assert_eq!(card.confidence, 9.0);
    }
}
