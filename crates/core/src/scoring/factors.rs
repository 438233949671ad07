use crate::domain::post::AuthorProfile;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

const CATALYST_KEYWORDS: &[&str] = &[
    "earnings",
    "fda",
    "merger",
    "acquisition",
    "guidance",
    "split",
    "dividend",
];

/// Comments considered when looking for positive community reception.
const ENGAGEMENT_COMMENT_SAMPLE: usize = 5;

static PRICE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\d+(?:\.\d+)?").expect("valid regex"));
static PRICE_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bfrom\s+\$\d+.*\sto\s+\$\d+").expect("valid regex"));
static ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(buy|sell|go long|go short|call|put|position)\b").expect("valid regex")
});
static TIMEFRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(by|into|before|after)\b.*\b(am|pm|day|week|month|earnings|fri|today|tomorrow)\b")
        .expect("valid regex")
});
static JUSTIFICATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(because|due to|as a result|suggests|indicates|based on)\b").expect("valid regex")
});
static CATALYST_TIMING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(earnings|fda|merger).{0,30}\d{1,2}(am|pm)?").expect("valid regex"));
static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#{1,3}\s+").expect("valid regex"));
static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(?:[-*] |\d+\. )").expect("valid regex"));
static IMAGE_POSITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\d+|shares?|calls?|puts?|contracts?").expect("valid regex"));
static POSITIVE_RECEPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(solid dd|good bot|i['’]m in|great post)\b").expect("valid regex")
});
static POSITION_DISCLOSURE: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r"\bi['’]?m (long|short|in)\b").expect("valid regex"),
        Regex::new(r"\bmy position\b").expect("valid regex"),
        Regex::new(r"\bi (?:have|hold|own)\b.*\$\d+").expect("valid regex"),
        Regex::new(r"\$\d+[km]\b.*\b(my|i)\b").expect("valid regex"),
    ]
});

/// 0-5: price levels (0-2), action verb (1), timeframe (1), justification (1).
pub fn thesis_clarity(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let mut score = 0.0;

    let prices: BTreeSet<&str> = PRICE.find_iter(text).map(|m| m.as_str()).collect();
    if prices.len() >= 2 || PRICE_RANGE.is_match(&lower) {
        score += 2.0;
    } else if prices.len() == 1 {
        score += 1.0;
    }

    if ACTION.is_match(&lower) {
        score += 1.0;
    }
    if TIMEFRAME.is_match(&lower) {
        score += 1.0;
    }
    if JUSTIFICATION.is_match(&lower) {
        score += 1.0;
    }

    f64::min(score, 5.0)
}

/// 1.5 for a catalyst with a nearby time marker, 0.75 for the keyword alone.
pub fn catalyst_present(text: &str) -> f64 {
    let lower = text.to_lowercase();
    if !CATALYST_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return 0.0;
    }
    if CATALYST_TIMING.is_match(&lower) {
        1.5
    } else {
        0.75
    }
}

pub fn formatting_quality(body: &str) -> f64 {
    let normalized = body.replace("\r\n", "\n");
    if normalized.contains("\n\n") || HEADING.is_match(&normalized) || LIST_ITEM.is_match(&normalized)
    {
        0.5
    } else {
        0.0
    }
}

pub fn image_insight(caption: &str) -> f64 {
    if IMAGE_POSITION.is_match(&caption.to_lowercase()) {
        0.5
    } else {
        0.0
    }
}

/// Upvote/comment ratio, boosted when the top comments are openly positive.
pub fn engagement_quality(comments: &[String], upvotes: i64, num_comments: i64) -> f64 {
    let ratio = upvotes as f64 / num_comments.max(1) as f64;
    let sample = comments
        .iter()
        .take(ENGAGEMENT_COMMENT_SAMPLE)
        .map(|c| c.to_lowercase())
        .collect::<Vec<_>>()
        .join("\n\n");

    if ratio >= 2.0 && POSITIVE_RECEPTION.is_match(&sample) {
        1.0
    } else if ratio >= 1.0 {
        0.5
    } else {
        0.0
    }
}

/// First-person position disclosure in the body or any sampled comment.
pub fn position_disclosure(body: &str, comments: &[String]) -> f64 {
    let discloses = |text: &str| {
        let lower = text.to_lowercase();
        POSITION_DISCLOSURE.iter().any(|re| re.is_match(&lower))
    };

    if discloses(body) || comments.iter().any(|c| discloses(c)) {
        0.5
    } else {
        0.0
    }
}

/// Sum of three tiered components, each worth up to 1.0.
pub fn credibility(author: &AuthorProfile) -> f64 {
    let age = if author.account_age_years >= 3.0 {
        1.0
    } else if author.account_age_years >= 1.0 {
        0.5
    } else {
        0.0
    };

    let karma = if author.total_karma >= 1000 {
        1.0
    } else if author.total_karma >= 100 {
        0.5
    } else {
        0.0
    };

    let history = if author.finance_post_count >= 3 {
        1.0
    } else if author.finance_post_count > 0 {
        0.5
    } else {
        0.0
    };

    age + karma + history
}
