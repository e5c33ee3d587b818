//! SQLite report backend
//!
//! Timestamps are stored as Unix milliseconds so ordering and day bucketing
//! happen in SQL. `wrapped` is kept as JSON text and handed back untouched.

use async_trait::async_trait;
use chrono::{SubsecRound, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;
use witness_core::time::now_millis;
use witness_core::{DailyCount, NewReport, ReportId, StoredReport};

use crate::{ReportStore, Result, StoreError};

const SELECT_REPORT: &str = "SELECT id, manifest_hash, cipher, iv, salt, wrapped, media_data_url, \
     created_at FROM reports";

/// SQLite-backed report store
#[derive(Clone)]
pub struct SqliteReportStore {
    pool: SqlitePool,
}

impl SqliteReportStore {
    /// Open or create the report database
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every connection to `:memory:` is a separate database, so pin one.
        let pool_options = if is_memory_url(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = pool_options.connect_with(options).await?;
        let store = Self { pool };
        store.migrate().await?;

        tracing::info!(database = %database_url, "Report store ready");
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS reports (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                manifest_hash TEXT NOT NULL,
                cipher TEXT NOT NULL,
                iv TEXT NOT NULL,
                salt TEXT NOT NULL,
                wrapped TEXT,
                media_data_url TEXT,
                created_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_reports_created_at ON reports(created_at DESC)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

fn report_from_row(row: &SqliteRow) -> Result<StoredReport> {
    let id: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id)
        .map(ReportId)
        .map_err(|e| StoreError::Corrupt(format!("bad id {}: {}", id, e)))?;

    let created_ms: i64 = row.try_get("created_at")?;
    let created_at = Utc
        .timestamp_millis_opt(created_ms)
        .single()
        .ok_or_else(|| StoreError::Corrupt(format!("bad timestamp {} for {}", created_ms, id)))?;

    let wrapped: Option<String> = row.try_get("wrapped")?;
    let wrapped = wrapped.as_deref().map(serde_json::from_str).transpose()?;

    Ok(StoredReport {
        id,
        manifest_hash: row.try_get("manifest_hash")?,
        cipher: row.try_get("cipher")?,
        iv: row.try_get("iv")?,
        salt: row.try_get("salt")?,
        wrapped,
        media_data_url: row.try_get("media_data_url")?,
        created_at,
    })
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    async fn insert(&self, report: NewReport) -> Result<StoredReport> {
        let id = ReportId::generate();
        let created_at = report
            .created_at
            .map(|at| at.trunc_subsecs(3))
            .unwrap_or_else(now_millis);
        let wrapped = report
            .wrapped
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            "INSERT INTO reports
                (id, manifest_hash, cipher, iv, salt, wrapped, media_data_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(id.to_string())
        .bind(&report.manifest_hash)
        .bind(&report.cipher)
        .bind(&report.iv)
        .bind(&report.salt)
        .bind(wrapped)
        .bind(&report.media_data_url)
        .bind(created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        tracing::debug!(report_id = %id, "Stored report");
        Ok(report.into_stored(id, created_at))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<StoredReport>> {
        let sql = format!("{} ORDER BY created_at DESC, seq DESC LIMIT ?1", SELECT_REPORT);
        let rows = sqlx::query(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(report_from_row).collect()
    }

    async fn daily_counts(&self) -> Result<Vec<DailyCount>> {
        // Real division so pre-epoch instants floor into the previous day
        let rows = sqlx::query(
            "SELECT strftime('%Y-%m-%d', created_at / 1000.0, 'unixepoch') AS day,
                    COUNT(*) AS count
             FROM reports
             GROUP BY day
             ORDER BY day ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<DailyCount> {
                let count: i64 = row.try_get("count")?;
                Ok(DailyCount {
                    day: row.try_get("day")?,
                    count: count.max(0) as u64,
                })
            })
            .collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
