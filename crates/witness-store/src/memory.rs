//! In-process report backend
//!
//! Same ordering and bucketing rules as the SQLite backend. Used for local
//! development and as the store behind HTTP tests.

use async_trait::async_trait;
use chrono::SubsecRound;
use std::collections::BTreeMap;
use std::sync::Mutex;
use witness_core::time::{day_bucket, now_millis};
use witness_core::{DailyCount, NewReport, ReportId, StoredReport};

use crate::{ReportStore, Result, StoreError};

/// Report store held in memory, in insertion order
#[derive(Default)]
pub struct MemoryReportStore {
    reports: Mutex<Vec<StoredReport>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<StoredReport>>> {
        self.reports
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn insert(&self, report: NewReport) -> Result<StoredReport> {
        let id = ReportId::generate();
        let created_at = report
            .created_at
            .map(|at| at.trunc_subsecs(3))
            .unwrap_or_else(now_millis);
        let stored = report.into_stored(id, created_at);

        self.lock()?.push(stored.clone());
        Ok(stored)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<StoredReport>> {
        // Reverse first so the stable sort keeps later inserts ahead on ties
        let mut recent: Vec<StoredReport> = self.lock()?.iter().rev().cloned().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn daily_counts(&self) -> Result<Vec<DailyCount>> {
        let mut buckets: BTreeMap<String, u64> = BTreeMap::new();
        for report in self.lock()?.iter() {
            *buckets.entry(day_bucket(&report.created_at)).or_default() += 1;
        }

        Ok(buckets
            .into_iter()
            .map(|(day, count)| DailyCount { day, count })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[tokio::test]
    async fn test_list_recent_orders_and_limits() {
        let store = MemoryReportStore::new();
        let base = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        // Insert out of chronological order
        for i in [3i64, 0, 4, 1, 2] {
            let report = NewReport::new(format!("h{}", i), "c", "i", "s")
                .created_at(base + Duration::hours(i));
            store.insert(report).await.unwrap();
        }

        let recent = store.list_recent(3).await.unwrap();
        let hashes: Vec<_> = recent.iter().map(|r| r.manifest_hash.as_str()).collect();
        assert_eq!(hashes, vec!["h4", "h3", "h2"]);
    }

    #[tokio::test]
    async fn test_daily_counts_skip_empty_days() {
        let store = MemoryReportStore::new();
        let day1 = Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap();
        let day4 = Utc.with_ymd_and_hms(2024, 2, 4, 10, 0, 0).unwrap();

        store.insert(NewReport::new("a", "c", "i", "s").created_at(day4)).await.unwrap();
        store.insert(NewReport::new("b", "c", "i", "s").created_at(day1)).await.unwrap();
        store.insert(NewReport::new("c", "c", "i", "s").created_at(day4)).await.unwrap();

        let counts = store.daily_counts().await.unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0], DailyCount { day: "2024-02-01".into(), count: 1 });
        assert_eq!(counts[1], DailyCount { day: "2024-02-04".into(), count: 2 });
    }
}
