//! Witness Store - Report persistence
//!
//! One collection of reports, written once and never mutated. Backends
//! implement [`ReportStore`]; the server only ever sees the trait object.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryReportStore;
pub use sqlite::SqliteReportStore;

use async_trait::async_trait;
use std::sync::Arc;
use witness_core::{DailyCount, NewReport, StoredReport};

/// URL that selects the in-process store
pub const MEMORY_URL: &str = "memory://";

/// Errors from storage operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Report storage backend
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persist a report, assigning `createdAt` when the report has none
    async fn insert(&self, report: NewReport) -> Result<StoredReport>;

    /// Up to `limit` reports, newest first
    async fn list_recent(&self, limit: usize) -> Result<Vec<StoredReport>>;

    /// Report counts per UTC day, oldest day first. Days without reports are absent.
    async fn daily_counts(&self) -> Result<Vec<DailyCount>>;

    /// Release connections on shutdown
    async fn close(&self) {}
}

/// Open the backend named by `database_url`
pub async fn open(database_url: &str) -> Result<Arc<dyn ReportStore>> {
    if database_url == MEMORY_URL {
        tracing::warn!("Using in-memory report store; reports are lost on exit");
        return Ok(Arc::new(MemoryReportStore::new()));
    }
    let store = SqliteReportStore::connect(database_url).await?;
    Ok(Arc::new(store))
}
