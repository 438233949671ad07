use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};

pub const CACHE_FILE: &str = "cache.json";
pub const CACHE_TTL_HOURS: i64 = 48;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub summary: String,
    pub timestamp: String,
}

impl CacheEntry {
    fn new(summary: String, now: DateTime<Utc>) -> Self {
        Self {
            summary,
            timestamp: now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

/// Post id to summary text, swept of expired entries when loaded.
#[derive(Debug)]
pub struct SummaryCache {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
    swept_at: DateTime<Utc>,
    dirty: bool,
}

impl SummaryCache {
    pub fn in_dir(data_dir: &Path) -> PathBuf {
        data_dir.join(CACHE_FILE)
    }

    /// Loads the cache file and drops every entry older than the TTL as of `now`.
    /// The remainder is written back when anything was pruned.
    pub async fn load(path: impl Into<PathBuf>, now: DateTime<Utc>) -> Self {
        let path = path.into();
        let raw = read_entries(&path).await;
        let before = raw.len();
        let entries = prune(raw, now);

        let mut cache = Self {
            path,
            entries,
            swept_at: now,
            dirty: false,
        };

        let pruned = before - cache.entries.len();
        if pruned > 0 {
            tracing::info!(pruned, kept = cache.entries.len(), "pruned expired cache entries");
            cache.dirty = true;
            if let Err(e) = cache.save().await {
                tracing::warn!(error = %e, "failed to persist pruned cache");
            }
        }
        cache
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(|e| e.summary.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the cached summary for `id`, or runs `compute` and stores its result.
    pub async fn get_or_compute<F, Fut>(&mut self, id: &str, compute: F) -> anyhow::Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<String>>,
    {
        if let Some(hit) = self.get(id) {
            tracing::debug!(post_id = id, "summary cache hit");
            return Ok(hit.to_string());
        }

        let summary = compute().await?;
        self.entries
            .insert(id.to_string(), CacheEntry::new(summary.clone(), Utc::now()));
        self.dirty = true;
        Ok(summary)
    }

    /// Writes the cache back, first folding in entries another scan saved since
    /// this one loaded. The file is replaced by rename, never truncated in place.
    pub async fn save(&mut self) -> anyhow::Result<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let on_disk = prune(read_entries(&self.path).await, self.swept_at);
        let mut merged = 0usize;
        for (id, entry) in on_disk {
            if let std::collections::btree_map::Entry::Vacant(slot) = self.entries.entry(id) {
                slot.insert(entry);
                merged += 1;
            }
        }
        if merged > 0 {
            tracing::debug!(merged, "merged cache entries saved by another scan");
        }

        let json = serde_json::to_string_pretty(&self.entries).context("failed to encode cache")?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("failed to write cache {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace cache {}", self.path.display()))?;

        self.dirty = false;
        Ok(())
    }

    // Per-process name so two scans never write the same temp file.
    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| CACHE_FILE.to_string());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", std::process::id()))
    }
}

async fn read_entries(path: &Path) -> BTreeMap<String, CacheEntry> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cache unreadable; starting empty");
            return BTreeMap::new();
        }
    };

    match serde_json::from_str(&text) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cache is not valid JSON; starting empty");
            BTreeMap::new()
        }
    }
}

fn prune(entries: BTreeMap<String, CacheEntry>, now: DateTime<Utc>) -> BTreeMap<String, CacheEntry> {
    let ttl = chrono::Duration::hours(CACHE_TTL_HOURS);
    entries
        .into_iter()
        .filter(|(_, entry)| match entry.created_at() {
            Some(created) => now - created <= ttl,
            None => false,
        })
        .collect()
}

// Accepts RFC 3339 as well as naive ISO-8601 timestamps, which are read as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
