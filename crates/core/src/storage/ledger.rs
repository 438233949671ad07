use anyhow::Context;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub const LEDGER_FILE: &str = "processed_posts.txt";

/// Append-only set of post ids that have already been attempted.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    seen: HashSet<String>,
}

impl Ledger {
    pub fn in_dir(data_dir: &Path) -> PathBuf {
        data_dir.join(LEDGER_FILE)
    }

    /// Reads the ledger file. A missing or unreadable file yields an empty ledger.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let seen = match tokio::fs::read_to_string(&path).await {
            Ok(text) => parse_ids(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ledger unreadable; treating as empty");
                HashSet::new()
            }
        };

        Self { path, seen }
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Appends ids not already recorded. Returns how many lines were written.
    pub async fn mark_seen<I, S>(&mut self, ids: I) -> anyhow::Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fresh = Vec::new();
        for id in ids {
            let id = id.as_ref().trim();
            if id.is_empty() || self.seen.contains(id) {
                continue;
            }
            self.seen.insert(id.to_string());
            fresh.push(id.to_string());
        }

        if fresh.is_empty() {
            return Ok(0);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut buf = String::new();
        for id in &fresh {
            buf.push_str(id);
            buf.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed to open ledger {}", self.path.display()))?;
        file.write_all(buf.as_bytes())
            .await
            .with_context(|| format!("failed to append ledger {}", self.path.display()))?;
        file.flush().await.context("failed to flush ledger")?;

        Ok(fresh.len())
    }
}

fn parse_ids(text: &str) -> HashSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_empty_and_append_creates_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = Ledger::in_dir(&dir.path().join("nested"));

        let mut ledger = Ledger::load(&path).await;
        assert!(ledger.is_empty());

        let written = ledger.mark_seen(["a", "b", "a", " "]).await.unwrap();
        assert_eq!(written, 2);
        assert!(ledger.has_seen("a"));

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "a\nb\n");
    }

    #[tokio::test]
    async fn known_ids_are_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LEDGER_FILE);
        std::fs::write(&path, "p1\n\np2\n").unwrap();

        let mut ledger = Ledger::load(&path).await;
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.mark_seen(vec!["p2".to_string(), "p3".to_string()]).await.unwrap(), 1);

        let reloaded = Ledger::load(&path).await;
        assert!(reloaded.has_seen("p1"));
        assert!(reloaded.has_seen("p3"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "p1\n\np2\np3\n");
    }

    #[tokio::test]
    async fn unreadable_ledger_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        // A directory at the ledger path cannot be read as a file.
        let ledger = Ledger::load(dir.path()).await;
        assert!(ledger.is_empty());
    }
}
