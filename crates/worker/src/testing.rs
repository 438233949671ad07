//! In-process fakes of the external collaborators.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use vulture_core::domain::post::{AuthorProfile, Post, UserActivity};
use vulture_core::domain::synthesis::{SynthesisResult, Ticker};
use vulture_core::ingest::calendar::CalendarProvider;
use vulture_core::ingest::reddit::PostSource;
use vulture_core::ingest::types::CalendarEvent;
use vulture_core::llm::{LlmClient, Provider, SynthesisInput};
use vulture_core::publish::{Announcement, PlayCard, Publisher};

pub fn post_at(id: &str, title: &str, created_utc: DateTime<Utc>) -> Post {
    let url = format!("https://reddit.com/r/wallstreetbets/comments/{id}/");
    Post {
        id: id.to_string(),
        source: "wallstreetbets".to_string(),
        title: title.to_string(),
        body: "Long time lurker.\n\nHere is the thesis.".to_string(),
        url: url.clone(),
        link_url: url,
        created_utc,
        upvotes: 40,
        num_comments: 10,
        author: None,
        image_url: None,
        stickied: false,
    }
}

#[derive(Default)]
pub struct FakeSource {
    listings: HashMap<String, Vec<Post>>,
    posts: HashMap<String, Post>,
    comments: HashMap<String, Vec<String>>,
    authors: HashMap<String, AuthorProfile>,
    activity: HashMap<String, Vec<UserActivity>>,
}

impl FakeSource {
    pub fn with_listing(mut self, source: &str, posts: Vec<Post>) -> Self {
        for p in &posts {
            self.posts.insert(p.id.clone(), p.clone());
        }
        self.listings.insert(source.to_string(), posts);
        self
    }

    pub fn with_post(mut self, post: Post) -> Self {
        self.posts.insert(post.id.clone(), post);
        self
    }

    pub fn with_comments(mut self, post_id: &str, comments: &[&str]) -> Self {
        self.comments.insert(
            post_id.to_string(),
            comments.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    pub fn with_author(mut self, name: &str, profile: AuthorProfile) -> Self {
        self.authors.insert(name.to_string(), profile);
        self
    }

    pub fn with_activity(mut self, username: &str, activity: Vec<UserActivity>) -> Self {
        self.activity.insert(username.to_string(), activity);
        self
    }
}

#[async_trait::async_trait]
impl PostSource for FakeSource {
    async fn fetch_recent(&self, source: &str, limit: u32) -> anyhow::Result<Vec<Post>> {
        let posts = self
            .listings
            .get(source)
            .ok_or_else(|| anyhow::anyhow!("Reddit HTTP 404 for /r/{source}/new"))?;
        Ok(posts.iter().take(limit as usize).cloned().collect())
    }

    async fn fetch_post(&self, id: &str) -> anyhow::Result<Option<Post>> {
        Ok(self.posts.get(id).cloned())
    }

    async fn fetch_top_comments(&self, post_id: &str, limit: u32) -> anyhow::Result<Vec<String>> {
        Ok(self
            .comments
            .get(post_id)
            .map(|c| c.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn fetch_author(&self, username: &str) -> anyhow::Result<AuthorProfile> {
        self.authors
            .get(username)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("unknown author {username}"))
    }

    async fn fetch_user_activity(
        &self,
        username: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<UserActivity>> {
        let activity = self
            .activity
            .get(username)
            .ok_or_else(|| anyhow::anyhow!("Reddit HTTP 404 for /user/{username}/about"))?;
        Ok(activity
            .iter()
            .filter(|a| a.created_utc >= since)
            .cloned()
            .collect())
    }
}

/// Answers keyed by post title. Unknown titles fail like a malformed response.
#[derive(Default)]
pub struct FakeLlm {
    summaries: HashMap<String, String>,
    syntheses: HashMap<String, (String, f64)>,
    summary_calls: AtomicUsize,
    synthesis_calls: AtomicUsize,
    forecast_inputs: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn with_summary(mut self, title: &str, text: &str) -> Self {
        self.summaries.insert(title.to_string(), text.to_string());
        self
    }

    pub fn with_synthesis(mut self, title: &str, ticker: &str, confidence: f64) -> Self {
        self.syntheses
            .insert(title.to_string(), (ticker.to_string(), confidence));
        self
    }

    pub fn summary_calls(&self) -> usize {
        self.summary_calls.load(Ordering::SeqCst)
    }

    pub fn synthesis_calls(&self) -> usize {
        self.synthesis_calls.load(Ordering::SeqCst)
    }

    pub fn forecast_inputs(&self) -> Vec<String> {
        self.forecast_inputs.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for FakeLlm {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn summarize(&self, title: &str, _body: &str) -> anyhow::Result<String> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        self.summaries
            .get(title)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no summary scripted for {title:?}"))
    }

    async fn synthesize(&self, input: &SynthesisInput) -> anyhow::Result<SynthesisResult> {
        self.synthesis_calls.fetch_add(1, Ordering::SeqCst);
        let (ticker, confidence) = self
            .syntheses
            .get(&input.title)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("missing required fields: ticker, briefing"))?;
        Ok(SynthesisResult {
            ticker: Ticker::parse(&ticker),
            briefing: format!("Briefing for {}", input.title),
            the_play: format!("Play from {} comment lines", input.comments_text.lines().count()),
            confidence,
        })
    }

    async fn caption_image(&self, _image_url: &str) -> anyhow::Result<String> {
        Ok("A brokerage screenshot showing 20 call contracts worth $4,000".to_string())
    }

    async fn forecast(&self, activity: &str) -> anyhow::Result<String> {
        self.forecast_inputs.lock().unwrap().push(activity.to_string());
        Ok("- Semis look strong\n- Rates steady\nTL;DR: Bullish".to_string())
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    plays: Mutex<Vec<PlayCard>>,
    announcements: Mutex<Vec<Announcement>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn plays(&self) -> Vec<PlayCard> {
        self.plays.lock().unwrap().clone()
    }

    pub fn announcements(&self) -> Vec<Announcement> {
        self.announcements.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Publisher for RecordingPublisher {
    async fn publish_play(&self, card: &PlayCard) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("Discord webhook HTTP 500");
        }
        self.plays.lock().unwrap().push(card.clone());
        Ok(())
    }

    async fn announce(&self, message: &Announcement) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("Discord webhook HTTP 500");
        }
        self.announcements.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeCalendar {
    pub events: Vec<CalendarEvent>,
    pub fail: bool,
}

#[async_trait::async_trait]
impl CalendarProvider for FakeCalendar {
    fn provider_name(&self) -> &'static str {
        "fake"
    }

    async fn fetch_events(&self, from: NaiveDate, to: NaiveDate) -> anyhow::Result<Vec<CalendarEvent>> {
        if self.fail {
            anyhow::bail!("calendar provider HTTP 503");
        }
        Ok(self
            .events
            .iter()
            .filter(|e| (from..=to).contains(&e.date))
            .cloned()
            .collect())
    }
}
