use crate::config::Settings;
use crate::domain::post::{ActivityKind, AuthorProfile, Post, UserActivity};
use crate::ingest::types::{
    utc_from_epoch, Listing, RawAccessToken, RawComment, RawPost, RawUserAbout, Thing,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::Duration;

const DEFAULT_AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
const DEFAULT_API_URL: &str = "https://oauth.reddit.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const PERMALINK_BASE: &str = "https://reddit.com";
const HISTORY_LIMIT: u32 = 100;

// Refresh a little early so a token never expires mid-batch.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Social-media fetch collaborator.
#[async_trait::async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch_recent(&self, source: &str, limit: u32) -> Result<Vec<Post>>;

    async fn fetch_post(&self, id: &str) -> Result<Option<Post>>;

    /// Top-sorted comment bodies, stickied comments excluded.
    async fn fetch_top_comments(&self, post_id: &str, limit: u32) -> Result<Vec<String>>;

    async fn fetch_author(&self, username: &str) -> Result<AuthorProfile>;

    /// Submissions and comments created at or after `since`, newest first.
    async fn fetch_user_activity(
        &self,
        username: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<UserActivity>>;
}

#[derive(Debug)]
pub struct RedditClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    user_agent: String,
    auth_url: String,
    api_url: String,
    finance_subreddits: HashSet<String>,

    // Application-only token, reused for the whole invocation.
    token_cache: tokio::sync::Mutex<Option<CachedToken>>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl RedditClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client_id = settings
            .reddit_client_id
            .clone()
            .context("REDDIT_CLIENT_ID is required")?;
        let client_secret = settings
            .reddit_client_secret
            .clone()
            .context("REDDIT_CLIENT_SECRET is required")?;
        let user_agent = settings
            .reddit_user_agent
            .clone()
            .context("REDDIT_USER_AGENT is required")?;

        let timeout_secs = std::env::var("REDDIT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build Reddit http client")?;

        let finance_subreddits = settings
            .subreddits()
            .into_iter()
            .chain(settings.news_subreddits())
            .map(|s| s.to_ascii_lowercase())
            .collect();

        Ok(Self {
            http,
            client_id,
            client_secret,
            user_agent,
            auth_url: std::env::var("REDDIT_AUTH_URL")
                .unwrap_or_else(|_| DEFAULT_AUTH_URL.to_string()),
            api_url: std::env::var("REDDIT_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            finance_subreddits,
            token_cache: tokio::sync::Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String> {
        let mut cache = self.token_cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.expires_at > Utc::now() {
                return Ok(cached.token.clone());
            }
        }

        let res = self
            .http
            .post(&self.auth_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(USER_AGENT, &self.user_agent)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .context("Reddit token request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Reddit token response")?;
        if !status.is_success() {
            anyhow::bail!("Reddit token HTTP {status}: {text}");
        }

        let token = serde_json::from_str::<RawAccessToken>(&text)
            .context("failed to parse Reddit token response")?;
        let expires_at = Utc::now()
            + ChronoDuration::seconds((token.expires_in - TOKEN_REFRESH_MARGIN_SECS).max(0));
        *cache = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at,
        });

        tracing::debug!(%expires_at, "issued Reddit access token");
        Ok(token.access_token)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let token = self.access_token().await?;

        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("bearer {token}"))?,
        );
        headers.insert(USER_AGENT, HeaderValue::from_str(&self.user_agent)?);

        let url = format!("{}{}", self.api_url.trim_end_matches('/'), path);
        let res = self
            .http
            .get(&url)
            .headers(headers)
            .query(&[("raw_json", "1".to_string())])
            .query(query)
            .send()
            .await
            .with_context(|| format!("Reddit request failed: {path}"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read Reddit response: {path}"))?;
        if !status.is_success() {
            anyhow::bail!("Reddit HTTP {status} for {path}");
        }

        serde_json::from_str::<T>(&text)
            .with_context(|| format!("unexpected Reddit response shape for {path}"))
    }

    async fn submissions_of(&self, username: &str) -> Result<Vec<RawPost>> {
        let listing: Listing<RawPost> = self
            .get_json(
                &format!("/user/{username}/submitted"),
                &[("limit", HISTORY_LIMIT.to_string()), ("sort", "new".to_string())],
            )
            .await?;
        Ok(things_of_kind(listing.data.children, "t3"))
    }

    async fn comments_of(&self, username: &str) -> Result<Vec<RawComment>> {
        let listing: Listing<RawComment> = self
            .get_json(
                &format!("/user/{username}/comments"),
                &[("limit", HISTORY_LIMIT.to_string()), ("sort", "new".to_string())],
            )
            .await?;
        Ok(things_of_kind(listing.data.children, "t1"))
    }
}

#[async_trait::async_trait]
impl PostSource for RedditClient {
    async fn fetch_recent(&self, source: &str, limit: u32) -> Result<Vec<Post>> {
        let listing: Listing<RawPost> = self
            .get_json(&format!("/r/{source}/new"), &[("limit", limit.to_string())])
            .await?;

        let mut out = Vec::with_capacity(listing.data.children.len());
        for raw in things_of_kind(listing.data.children, "t3") {
            match post_from_raw(raw, source) {
                Some(post) => out.push(post),
                None => tracing::debug!(subreddit = source, "dropping post with invalid created_utc"),
            }
        }
        Ok(out)
    }

    async fn fetch_post(&self, id: &str) -> Result<Option<Post>> {
        let listing: Listing<RawPost> = self.get_json(&format!("/by_id/t3_{id}"), &[]).await?;
        Ok(things_of_kind(listing.data.children, "t3")
            .into_iter()
            .next()
            .and_then(|raw| {
                let source = raw.subreddit.clone();
                post_from_raw(raw, &source)
            }))
    }

    async fn fetch_top_comments(&self, post_id: &str, limit: u32) -> Result<Vec<String>> {
        let (_post, comments): (Listing<serde_json::Value>, Listing<RawComment>) = self
            .get_json(
                &format!("/comments/{post_id}"),
                &[
                    ("sort", "top".to_string()),
                    ("limit", limit.to_string()),
                    ("depth", "1".to_string()),
                ],
            )
            .await?;

        Ok(top_comment_bodies(
            things_of_kind(comments.data.children, "t1"),
            limit as usize,
        ))
    }

    async fn fetch_author(&self, username: &str) -> Result<AuthorProfile> {
        let about: Thing<RawUserAbout> = self
            .get_json(&format!("/user/{username}/about"), &[])
            .await?;
        let created = utc_from_epoch(about.data.created_utc)
            .context("author created_utc out of range")?;

        let finance_post_count = self
            .submissions_of(username)
            .await?
            .iter()
            .filter(|p| self.finance_subreddits.contains(&p.subreddit.to_ascii_lowercase()))
            .count();

        Ok(AuthorProfile {
            account_age_years: (Utc::now() - created).num_days() as f64 / 365.0,
            total_karma: about.data.link_karma + about.data.comment_karma,
            finance_post_count: u32::try_from(finance_post_count).unwrap_or(u32::MAX),
        })
    }

    async fn fetch_user_activity(
        &self,
        username: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<UserActivity>> {
        let mut out = Vec::new();

        for raw in self.submissions_of(username).await? {
            let Some(created_utc) = utc_from_epoch(raw.created_utc) else {
                continue;
            };
            out.push(UserActivity {
                kind: ActivityKind::Submission,
                title: raw.title,
                body: raw.selftext,
                created_utc,
            });
        }

        for raw in self.comments_of(username).await? {
            let Some(created_utc) = raw.created_utc.and_then(utc_from_epoch) else {
                continue;
            };
            out.push(UserActivity {
                kind: ActivityKind::Comment,
                title: raw.link_title.unwrap_or_default(),
                body: raw.body.unwrap_or_default(),
                created_utc,
            });
        }

        Ok(recent_activity(out, since))
    }
}

fn things_of_kind<T>(children: Vec<Thing<T>>, kind: &str) -> Vec<T> {
    children
        .into_iter()
        .filter(|t| t.kind == kind)
        .map(|t| t.data)
        .collect()
}

fn post_from_raw(raw: RawPost, source: &str) -> Option<Post> {
    let created_utc = utc_from_epoch(raw.created_utc)?;
    let url = format!("{PERMALINK_BASE}{}", raw.permalink);
    let link_url = if raw.url.is_empty() { url.clone() } else { raw.url };
    let image_url = raw
        .preview
        .and_then(|p| p.images.into_iter().next())
        .map(|img| img.source.url);
    let author = raw
        .author
        .filter(|a| !a.is_empty() && a != "[deleted]");

    Some(Post {
        id: raw.id,
        source: if raw.subreddit.is_empty() {
            source.to_string()
        } else {
            raw.subreddit
        },
        title: raw.title,
        body: raw.selftext,
        url,
        link_url,
        created_utc,
        upvotes: raw.score,
        num_comments: raw.num_comments,
        author,
        image_url,
        stickied: raw.stickied,
    })
}

fn top_comment_bodies(mut comments: Vec<RawComment>, limit: usize) -> Vec<String> {
    comments.retain(|c| !c.stickied);
    // Stable sort keeps Reddit's own order among equal scores.
    comments.sort_by(|a, b| b.score.cmp(&a.score));
    comments
        .into_iter()
        .filter_map(|c| c.body)
        .filter(|b| !b.trim().is_empty() && b != "[deleted]" && b != "[removed]")
        .take(limit)
        .collect()
}

fn recent_activity(mut items: Vec<UserActivity>, since: DateTime<Utc>) -> Vec<UserActivity> {
    items.retain(|a| a.created_utc >= since);
    items.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
    items
}
