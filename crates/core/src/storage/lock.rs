use crate::config::ScanMode;
use anyhow::Context;
use sqlx::pool::PoolConnection;
use sqlx::Postgres;

// Advisory locks are scoped to the Postgres session, so the guard pins one pooled
// connection for as long as the run holds the lock.
const LOCK_NAMESPACE: i64 = 0x5655_4C54_5552; // "VULTUR"

fn lock_key_for_mode(mode: ScanMode) -> i64 {
    let ordinal = match mode {
        ScanMode::Community => 1,
        ScanMode::News => 2,
        ScanMode::Calendar => 3,
        ScanMode::UserForecast => 4,
    };
    LOCK_NAMESPACE ^ ordinal
}

pub struct ScanLock {
    conn: PoolConnection<Postgres>,
    key: i64,
}

/// Returns `None` when another invocation of the same mode holds the lock.
pub async fn try_acquire_scan_lock(
    pool: &sqlx::PgPool,
    mode: ScanMode,
) -> anyhow::Result<Option<ScanLock>> {
    let key = lock_key_for_mode(mode);
    let mut conn = pool
        .acquire()
        .await
        .context("failed to acquire connection for scan lock")?;
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(key)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("failed to acquire advisory lock (key={key})"))?;

    Ok(acquired.0.then_some(ScanLock { conn, key }))
}

impl ScanLock {
    pub async fn release(mut self) -> anyhow::Result<()> {
        let key = self.key;
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .persistent(false)
            .bind(key)
            .execute(&mut *self.conn)
            .await
            .with_context(|| format!("failed to release advisory lock (key={key})"))?;
        Ok(())
    }
}
