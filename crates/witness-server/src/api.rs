//! Report intake API
//!
//! Routes:
//!   POST /api/reports         - store an encrypted report, then alert operators
//!   GET  /api/reports         - latest reports, newest first
//!   GET  /api/reports/trends  - report counts per UTC day
//!   GET  /api/reports/__time  - server clock for client anchoring
//!   GET  /health              - liveness

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use witness_core::time::{now_millis, to_iso_millis};
use witness_core::{
    DailyCount, ReportSubmission, StoredReport, DEFAULT_RECENT_LIMIT, MAX_BODY_BYTES,
};
use witness_notify::Notifier;
use witness_store::ReportStore;

use crate::error::ApiError;

/// Services shared by every handler, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReportStore>,
    pub notifier: Arc<Notifier>,
}

impl AppState {
    pub fn new(store: Arc<dyn ReportStore>, notifier: Notifier) -> Self {
        Self {
            store,
            notifier: Arc::new(notifier),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub message: &'static str,
    pub report_id: String,
}

/// Build the full application router
pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/reports", get(list_reports).post(ingest_report))
        .route("/api/reports/trends", get(report_trends))
        .route("/api/reports/__time", get(server_time))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(security_header(header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .layer(security_header(header::X_FRAME_OPTIONS, "SAMEORIGIN"))
        .layer(security_header(header::REFERRER_POLICY, "no-referrer"))
        .layer(security_header(header::X_DNS_PREFETCH_CONTROL, "off"))
        .layer(security_header(
            header::STRICT_TRANSPORT_SECURITY,
            "max-age=15552000; includeSubDomains",
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn security_header(
    name: header::HeaderName,
    value: &'static str,
) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(name, HeaderValue::from_static(value))
}

async fn health() -> &'static str {
    "OK"
}

async fn ingest_report(
    State(state): State<AppState>,
    payload: Result<Json<ReportSubmission>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let Json(submission) = payload?;
    let report = submission.validate()?;

    let stored = state
        .store
        .insert(report)
        .await
        .map_err(ApiError::storage("Failed to save report"))?;

    // Alerts are best-effort; failures are logged inside the notifier
    state.notifier.notify(&stored).await;

    tracing::info!(report_id = %stored.id, "Report received");
    Ok(Json(IngestResponse {
        message: "Report received",
        report_id: stored.id.to_string(),
    }))
}

async fn list_reports(State(state): State<AppState>) -> Result<Json<Vec<StoredReport>>, ApiError> {
    let reports = state
        .store
        .list_recent(DEFAULT_RECENT_LIMIT)
        .await
        .map_err(ApiError::storage("Failed to load reports"))?;
    Ok(Json(reports))
}

async fn report_trends(State(state): State<AppState>) -> Result<Json<Vec<DailyCount>>, ApiError> {
    let counts = state
        .store
        .daily_counts()
        .await
        .map_err(ApiError::storage("Failed to aggregate reports"))?;
    Ok(Json(counts))
}

async fn server_time() -> String {
    to_iso_millis(&now_millis())
}
