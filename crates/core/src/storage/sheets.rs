//! Row-oriented sheet persistence.
//!
//! A sheet is an ordered list of positional rows whose first cell is the row key.

use anyhow::Context;
use serde_json::Value;
use sqlx::types::Json;
use std::collections::HashMap;
use std::sync::Mutex;

pub type Row = Vec<Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct CellUpdate {
    pub column: usize,
    pub value: Value,
}

impl CellUpdate {
    pub fn new(column: usize, value: impl Into<Value>) -> Self {
        Self {
            column,
            value: value.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait SheetStore: Send + Sync {
    async fn append_rows(&self, sheet: &str, rows: &[Row]) -> anyhow::Result<()>;

    /// Updates the first row whose key equals `key`. Returns `false` when no row matches.
    async fn find_and_update_row(
        &self,
        sheet: &str,
        key: &str,
        updates: &[CellUpdate],
    ) -> anyhow::Result<bool>;

    /// Like [`SheetStore::find_and_update_row`], but only rows whose `guard.column`
    /// currently holds `guard.value` are candidates.
    async fn find_and_update_row_where(
        &self,
        sheet: &str,
        key: &str,
        guard: &CellUpdate,
        updates: &[CellUpdate],
    ) -> anyhow::Result<bool>;

    async fn clear_and_rewrite(
        &self,
        sheet: &str,
        header: &[&str],
        rows: &[Row],
    ) -> anyhow::Result<()>;

    /// Data rows in insertion order, header excluded.
    async fn read_rows(&self, sheet: &str) -> anyhow::Result<Vec<Row>>;
}

pub fn row_key(row: &[Value]) -> String {
    match row.first() {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

pub fn apply_updates(row: &mut Row, updates: &[CellUpdate]) {
    for update in updates {
        if row.len() <= update.column {
            row.resize(update.column + 1, Value::Null);
        }
        row[update.column] = update.value.clone();
    }
}

#[derive(Debug, Clone)]
pub struct PgSheetStore {
    pool: sqlx::PgPool,
}

impl PgSheetStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    async fn update_first(
        &self,
        sheet: &str,
        key: &str,
        guard: Option<&CellUpdate>,
        updates: &[CellUpdate],
    ) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await.context("begin transaction failed")?;

        let found = match guard {
            None => {
                sqlx::query_as::<_, (i64, Json<Row>)>(
                    "SELECT id, cells FROM sheet_rows \
                     WHERE sheet = $1 AND row_key = $2 \
                     ORDER BY id ASC \
                     LIMIT 1 \
                     FOR UPDATE",
                )
                .bind(sheet)
                .bind(key)
                .fetch_optional(&mut *tx)
                .await
            }
            Some(guard) => {
                let column = i32::try_from(guard.column).context("guard column out of range")?;
                sqlx::query_as::<_, (i64, Json<Row>)>(
                    "SELECT id, cells FROM sheet_rows \
                     WHERE sheet = $1 AND row_key = $2 AND cells -> $3 = $4 \
                     ORDER BY id ASC \
                     LIMIT 1 \
                     FOR UPDATE",
                )
                .bind(sheet)
                .bind(key)
                .bind(column)
                .bind(Json(&guard.value))
                .fetch_optional(&mut *tx)
                .await
            }
        }
        .with_context(|| format!("select sheet row failed (sheet={sheet}, key={key})"))?;

        let Some((id, Json(mut cells))) = found else {
            return Ok(false);
        };

        apply_updates(&mut cells, updates);

        sqlx::query("UPDATE sheet_rows SET cells = $1, updated_at = now() WHERE id = $2")
            .bind(Json(&cells))
            .bind(id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("update sheet row failed (sheet={sheet}, key={key})"))?;

        tx.commit().await.context("commit transaction failed")?;
        Ok(true)
    }
}

#[async_trait::async_trait]
impl SheetStore for PgSheetStore {
    async fn append_rows(&self, sheet: &str, rows: &[Row]) -> anyhow::Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.context("begin transaction failed")?;
        for row in rows {
            insert_row(&mut tx, sheet, row).await?;
        }
        tx.commit().await.context("commit transaction failed")?;

        tracing::debug!(sheet, rows = rows.len(), "appended sheet rows");
        Ok(())
    }

    async fn find_and_update_row(
        &self,
        sheet: &str,
        key: &str,
        updates: &[CellUpdate],
    ) -> anyhow::Result<bool> {
        self.update_first(sheet, key, None, updates).await
    }

    async fn find_and_update_row_where(
        &self,
        sheet: &str,
        key: &str,
        guard: &CellUpdate,
        updates: &[CellUpdate],
    ) -> anyhow::Result<bool> {
        self.update_first(sheet, key, Some(guard), updates).await
    }

    async fn clear_and_rewrite(
        &self,
        sheet: &str,
        header: &[&str],
        rows: &[Row],
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await.context("begin transaction failed")?;

        sqlx::query("DELETE FROM sheet_rows WHERE sheet = $1")
            .bind(sheet)
            .execute(&mut *tx)
            .await
            .context("clear sheet rows failed")?;

        sqlx::query(
            "INSERT INTO sheet_headers (sheet, header) VALUES ($1, $2) \
             ON CONFLICT (sheet) DO UPDATE SET header = EXCLUDED.header, updated_at = now()",
        )
        .bind(sheet)
        .bind(Json(header))
        .execute(&mut *tx)
        .await
        .context("upsert sheet header failed")?;

        for row in rows {
            insert_row(&mut tx, sheet, row).await?;
        }

        tx.commit().await.context("commit transaction failed")?;
        Ok(())
    }

    async fn read_rows(&self, sheet: &str) -> anyhow::Result<Vec<Row>> {
        let rows = sqlx::query_as::<_, (Json<Row>,)>(
            "SELECT cells FROM sheet_rows WHERE sheet = $1 ORDER BY id ASC",
        )
        .bind(sheet)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("read sheet rows failed (sheet={sheet})"))?;

        Ok(rows.into_iter().map(|(Json(cells),)| cells).collect())
    }
}

async fn insert_row(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    sheet: &str,
    row: &Row,
) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO sheet_rows (sheet, row_key, cells) VALUES ($1, $2, $3)")
        .bind(sheet)
        .bind(row_key(row))
        .bind(Json(row))
        .execute(&mut **tx)
        .await
        .context("insert sheet_rows failed")?;
    Ok(())
}

/// In-process sheet store. Backs dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySheetStore {
    sheets: Mutex<HashMap<String, MemorySheet>>,
}

#[derive(Debug, Clone, Default)]
struct MemorySheet {
    header: Vec<String>,
    rows: Vec<Row>,
}

impl MemorySheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&self, sheet: &str) -> Vec<String> {
        self.lock()
            .get(sheet)
            .map(|s| s.header.clone())
            .unwrap_or_default()
    }

    pub fn rows(&self, sheet: &str) -> Vec<Row> {
        self.lock()
            .get(sheet)
            .map(|s| s.rows.clone())
            .unwrap_or_default()
    }

    fn update_first(
        &self,
        sheet: &str,
        key: &str,
        guard: Option<&CellUpdate>,
        updates: &[CellUpdate],
    ) -> bool {
        let mut sheets = self.lock();
        let Some(row) = sheets.get_mut(sheet).and_then(|s| {
            s.rows.iter_mut().find(|r| {
                row_key(r) == key && guard.map_or(true, |g| r.get(g.column) == Some(&g.value))
            })
        }) else {
            return false;
        };
        apply_updates(row, updates);
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, MemorySheet>> {
        // A panic while holding the lock cannot leave a sheet half-written.
        self.sheets.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl SheetStore for MemorySheetStore {
    async fn append_rows(&self, sheet: &str, rows: &[Row]) -> anyhow::Result<()> {
        self.lock()
            .entry(sheet.to_string())
            .or_default()
            .rows
            .extend(rows.iter().cloned());
        Ok(())
    }

    async fn find_and_update_row(
        &self,
        sheet: &str,
        key: &str,
        updates: &[CellUpdate],
    ) -> anyhow::Result<bool> {
        Ok(self.update_first(sheet, key, None, updates))
    }

    async fn find_and_update_row_where(
        &self,
        sheet: &str,
        key: &str,
        guard: &CellUpdate,
        updates: &[CellUpdate],
    ) -> anyhow::Result<bool> {
        Ok(self.update_first(sheet, key, Some(guard), updates))
    }

    async fn clear_and_rewrite(
        &self,
        sheet: &str,
        header: &[&str],
        rows: &[Row],
    ) -> anyhow::Result<()> {
        self.lock().insert(
            sheet.to_string(),
            MemorySheet {
                header: header.iter().map(|h| h.to_string()).collect(),
                rows: rows.to_vec(),
            },
        );
        Ok(())
    }

    async fn read_rows(&self, sheet: &str) -> anyhow::Result<Vec<Row>> {
        Ok(self.rows(sheet))
    }
}
