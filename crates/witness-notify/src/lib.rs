//! Witness Notify - Operator alerts for new reports
//!
//! Channels are optional and independent. A failing channel is logged and
//! skipped; it never fails the request that stored the report.

pub mod email;
pub mod telegram;

pub use email::{EmailChannel, EmailConfig};
pub use telegram::{TelegramChannel, TelegramConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use witness_core::time::to_iso_millis;
use witness_core::{ReportId, StoredReport};

/// Errors from a single notification attempt
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),
}

/// What operators are told about a new report
///
/// Only the timestamp and manifest hash leave the server; the encrypted
/// payload never does.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportAlert {
    pub report_id: ReportId,
    pub created_at: DateTime<Utc>,
    pub manifest_hash: String,
}

impl ReportAlert {
    pub fn subject(&self) -> &'static str {
        "New Police Abuse Report"
    }

    pub fn email_body(&self) -> String {
        format!(
            "New report received at {}. Hash: {}",
            to_iso_millis(&self.created_at),
            self.manifest_hash
        )
    }

    pub fn chat_text(&self) -> String {
        format!(
            "⚠️ New Report @ {}\nHash: {}",
            to_iso_millis(&self.created_at),
            self.manifest_hash
        )
    }
}

impl From<&StoredReport> for ReportAlert {
    fn from(report: &StoredReport) -> Self {
        Self {
            report_id: report.id,
            created_at: report.created_at,
            manifest_hash: report.manifest_hash.clone(),
        }
    }
}

/// A destination for report alerts
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn send(&self, alert: &ReportAlert) -> Result<(), NotifyError>;
}

/// Outcome of one fan-out
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliverySummary {
    pub delivered: Vec<&'static str>,
    pub failed: Vec<(&'static str, String)>,
}

impl DeliverySummary {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Sequential best-effort fan-out over the configured channels
#[derive(Default)]
pub struct Notifier {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl Notifier {
    /// Notifier with no channels
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from startup configuration. `None` leaves that channel off.
    pub fn from_config(
        email: Option<EmailConfig>,
        telegram: Option<TelegramConfig>,
    ) -> Result<Self, NotifyError> {
        let mut notifier = Self::new();
        if let Some(config) = email {
            notifier = notifier.with_channel(EmailChannel::new(config)?);
        }
        if let Some(config) = telegram {
            notifier = notifier.with_channel(TelegramChannel::new(config));
        }
        Ok(notifier)
    }

    pub fn with_channel(mut self, channel: impl NotificationChannel + 'static) -> Self {
        self.channels.push(Box::new(channel));
        self
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Alert every channel about a stored report, in order
    pub async fn notify(&self, report: &StoredReport) -> DeliverySummary {
        let alert = ReportAlert::from(report);
        let mut summary = DeliverySummary::default();

        for channel in &self.channels {
            match channel.send(&alert).await {
                Ok(()) => {
                    tracing::debug!(
                        channel = channel.name(),
                        report_id = %alert.report_id,
                        "Alert sent"
                    );
                    summary.delivered.push(channel.name());
                }
                Err(e) => {
                    tracing::warn!(
                        channel = channel.name(),
                        report_id = %alert.report_id,
                        error = %e,
                        "Alert failed"
                    );
                    summary.failed.push((channel.name(), e.to_string()));
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};
    use witness_core::NewReport;

    struct Recording {
        name: &'static str,
        sent: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationChannel for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn send(&self, alert: &ReportAlert) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(format!("{}:{}", self.name, alert.manifest_hash));
            if self.fail {
                Err(NotifyError::Address("not-an-address".parse::<lettre::Address>().unwrap_err()))
            } else {
                Ok(())
            }
        }
    }

    fn stored() -> StoredReport {
        let at = Utc.with_ymd_and_hms(2024, 7, 4, 15, 30, 0).unwrap();
        NewReport::new("deadbeef", "c", "i", "s").into_stored(ReportId::generate(), at)
    }

    #[test]
    fn test_alert_templates() {
        let alert = ReportAlert::from(&stored());
        assert_eq!(alert.subject(), "New Police Abuse Report");
        assert_eq!(
            alert.email_body(),
            "New report received at 2024-07-04T15:30:00.000Z. Hash: deadbeef"
        );
        assert_eq!(
            alert.chat_text(),
            "⚠️ New Report @ 2024-07-04T15:30:00.000Z\nHash: deadbeef"
        );
    }

    #[tokio::test]
    async fn test_no_channels_is_a_noop() {
        let summary = Notifier::new().notify(&stored()).await;
        assert!(summary.delivered.is_empty());
        assert!(summary.all_delivered());
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_channels() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let notifier = Notifier::new()
            .with_channel(Recording { name: "email", sent: sent.clone(), fail: true })
            .with_channel(Recording { name: "telegram", sent: sent.clone(), fail: false });

        let summary = notifier.notify(&stored()).await;

        assert_eq!(*sent.lock().unwrap(), vec!["email:deadbeef", "telegram:deadbeef"]);
        assert_eq!(summary.delivered, vec!["telegram"]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "email");
    }

    #[test]
    fn test_from_config_without_channels() {
        let notifier = Notifier::from_config(None, None).unwrap();
        assert!(notifier.channel_names().is_empty());
    }
}
