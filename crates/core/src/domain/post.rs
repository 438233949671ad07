use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const MEDIA_SUFFIXES: &[&str] = &[".jpeg", ".jpg", ".png", ".gif"];
const MEDIA_HOSTS: &[&str] = &["v.redd.it"];

/// A harvested submission. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    /// Subreddit the post was fetched from.
    pub source: String,
    pub title: String,
    pub body: String,
    /// Canonical permalink.
    pub url: String,
    /// Link target of the submission (equal to `url` for self posts).
    pub link_url: String,
    pub created_utc: DateTime<Utc>,
    pub upvotes: i64,
    pub num_comments: i64,
    pub author: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub stickied: bool,
}

impl Post {
    pub fn is_media_only(&self) -> bool {
        let link = self.link_url.to_ascii_lowercase();
        MEDIA_SUFFIXES.iter().any(|s| link.ends_with(s))
            || MEDIA_HOSTS.iter().any(|h| link.contains(h))
    }

    pub fn is_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.created_utc < now - max_age
    }

    /// (upvotes, comments) popularity tuple used for ranking.
    pub fn popularity(&self) -> (i64, i64) {
        (self.upvotes, self.num_comments)
    }
}

/// Author metadata used by the credibility factor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub account_age_years: f64,
    pub total_karma: i64,
    pub finance_post_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityKind {
    Submission,
    Comment,
}

/// A submission or comment authored by a tracked user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserActivity {
    pub kind: ActivityKind,
    pub title: String,
    pub body: String,
    pub created_utc: DateTime<Utc>,
}

impl UserActivity {
    pub fn prompt_block(&self) -> String {
        let body = if self.body.trim().is_empty() {
            "[no body]"
        } else {
            self.body.trim()
        };
        match self.kind {
            ActivityKind::Submission => format!("Title: {}\nContent: {body}", self.title),
            ActivityKind::Comment => {
                format!("Title: Comment on \u{201c}{}\u{201d}\nContent: {body}", self.title)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::post;
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn detects_media_only_links() {
        let mut p = post("a1", "chart", 1, 1);
        assert!(!p.is_media_only());

        p.link_url = "https://i.redd.it/abc.PNG".to_string();
        assert!(p.is_media_only());

        p.link_url = "https://v.redd.it/xyz".to_string();
        assert!(p.is_media_only());
    }

    #[test]
    fn age_cutoff_is_strict() {
        let p = post("a1", "t", 1, 1);
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 14, 0, 0).unwrap();
        assert!(!p.is_older_than(Duration::hours(48), now));
        assert!(p.is_older_than(Duration::hours(47), now));
    }

    #[test]
    fn comment_blocks_name_the_parent_post() {
        let a = UserActivity {
            kind: ActivityKind::Comment,
            title: "GME earnings".to_string(),
            body: "  ".to_string(),
            created_utc: Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap(),
        };
        assert_eq!(
            a.prompt_block(),
            "Title: Comment on \u{201c}GME earnings\u{201d}\nContent: [no body]"
        );
    }
}
