use crate::config::Settings;
use crate::ingest::types::{CalendarEvent, CalendarResponse};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PATH: &str = "/v1/calendar";

#[async_trait::async_trait]
pub trait CalendarProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Events dated within `[from, to]`, inclusive.
    async fn fetch_events(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<CalendarEvent>>;
}

#[derive(Debug, Clone)]
pub struct HttpJsonCalendarProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
}

impl HttpJsonCalendarProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_calendar_base_url()?.to_string();
        let api_key = settings.calendar_api_key.clone();

        let timeout_secs = std::env::var("CALENDAR_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let path = std::env::var("CALENDAR_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build calendar http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            path,
        })
    }

    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl CalendarProvider for HttpJsonCalendarProvider {
    fn provider_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_events(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<CalendarEvent>> {
        let res = self
            .http
            .get(self.url())
            .headers(self.headers()?)
            .query(&[("from", from.to_string()), ("to", to.to_string())])
            .send()
            .await
            .context("calendar provider request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read calendar provider response")?;
        if !status.is_success() {
            anyhow::bail!("calendar provider HTTP {status}: {text}");
        }

        let parsed = serde_json::from_str::<CalendarResponse>(&text)
            .with_context(|| format!("calendar response is not valid JSON: {text}"))?;

        Ok(normalize_events(parsed.events, from, to))
    }
}

/// Drops blank or out-of-window events and orders the rest by date, time and name.
pub fn normalize_events(
    events: Vec<CalendarEvent>,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<CalendarEvent> {
    let mut out: Vec<CalendarEvent> = events
        .into_iter()
        .filter(|e| !e.name.trim().is_empty())
        .filter(|e| (from..=to).contains(&e.date))
        .map(|mut e| {
            e.symbol = e
                .symbol
                .map(|s| s.trim().to_ascii_uppercase())
                .filter(|s| !s.is_empty());
            e
        })
        .collect();

    out.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.time.cmp(&b.time))
            .then_with(|| a.name.cmp(&b.name))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(date: NaiveDate, name: &str, symbol: Option<&str>) -> CalendarEvent {
        CalendarEvent {
            date,
            time: None,
            kind: "earnings".to_string(),
            symbol: symbol.map(str::to_string),
            name: name.to_string(),
            estimate: None,
        }
    }

    #[test]
    fn keeps_window_and_sorts() {
        let d = |day| NaiveDate::from_ymd_opt(2026, 3, day).unwrap();
        let out = normalize_events(
            vec![
                event(d(5), "Zscaler", Some(" zs ")),
                event(d(1), "Too early", None),
                event(d(3), "Adobe", Some("ADBE")),
                event(d(3), "  ", None),
                event(d(12), "Too late", None),
                event(d(3), "Abercrombie", Some("")),
            ],
            d(2),
            d(9),
        );

        let names: Vec<_> = out.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Abercrombie", "Adobe", "Zscaler"]);
        assert_eq!(out[0].symbol, None);
        assert_eq!(out[2].symbol.as_deref(), Some("ZS"));
    }
}
