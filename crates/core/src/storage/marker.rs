use anyhow::Context;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

pub const MARKER_FILE: &str = "last_run_date.txt";

/// Persisted date of the last day whose first run completed.
#[derive(Debug, Clone)]
pub struct DailyRunMarker {
    path: PathBuf,
}

impl DailyRunMarker {
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(MARKER_FILE),
        }
    }

    /// Last recorded date. Missing, unreadable or malformed markers read as `None`.
    pub async fn last_run(&self) -> Option<NaiveDate> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "run marker unreadable");
                return None;
            }
        };

        match NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                tracing::warn!(path = %self.path.display(), raw = text.trim(), "run marker malformed");
                None
            }
        }
    }

    pub async fn is_first_run(&self, today: NaiveDate) -> bool {
        self.last_run().await != Some(today)
    }

    pub async fn write(&self, today: NaiveDate) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&self.path, today.format("%Y-%m-%d").to_string())
            .await
            .with_context(|| format!("failed to write run marker {}", self.path.display()))
    }
}
