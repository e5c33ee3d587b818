//! Witness Core - Report model and input contract
//!
//! Shared by the store, the notifier and the HTTP server. The server is a
//! blind store: nothing in here looks inside the encrypted fields.

pub mod report;
pub mod time;

pub use report::{
    DailyCount, NewReport, ReportId, ReportSubmission, StoredReport, ValidationError,
};

/// Maximum number of reports returned by the recent-reports listing
pub const DEFAULT_RECENT_LIMIT: usize = 50;

/// Largest accepted request body (encrypted media travels inline as base64)
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;
