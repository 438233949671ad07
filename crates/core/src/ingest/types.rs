//! Wire shapes of the Reddit and calendar HTTP APIs.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Listing<T> {
    pub data: ListingData<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingData<T> {
    #[serde(default = "Vec::new")]
    pub children: Vec<Thing<T>>,
    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thing<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPost {
    pub id: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub preview: Option<RawPreview>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPreview {
    #[serde(default)]
    pub images: Vec<RawPreviewImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPreviewImage {
    pub source: RawImageSource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawImageSource {
    pub url: String,
}

/// `t1` comments and `more` stubs share a listing, so every field is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RawComment {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub created_utc: Option<f64>,
    #[serde(default)]
    pub link_title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUserAbout {
    pub created_utc: f64,
    #[serde(default)]
    pub link_karma: i64,
    #[serde(default)]
    pub comment_karma: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAccessToken {
    pub access_token: String,
    #[serde(default = "default_token_ttl")]
    pub expires_in: i64,
}

fn default_token_ttl() -> i64 {
    3600
}

pub fn utc_from_epoch(secs: f64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs.trunc() as i64, 0).single()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarResponse {
    #[serde(default)]
    pub events: Vec<CalendarEvent>,
}

/// An earnings report or macro release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub date: NaiveDate,
    #[serde(default)]
    pub time: Option<String>,
    pub kind: String,
    #[serde(default)]
    pub symbol: Option<String>,
    pub name: String,
    #[serde(default)]
    pub estimate: Option<String>,
}
