//! Email alerts over an SMTP relay (implicit TLS)

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};

use crate::{NotificationChannel, NotifyError, ReportAlert};

/// Default SMTPS port
pub const DEFAULT_SMTP_PORT: u16 = 465;

/// SMTP relay settings
#[derive(Debug)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    /// Login name, also used as the sender address
    pub user: String,
    pub password: SecretString,
    /// The single address that receives alerts
    pub recipient: String,
}

/// Sends alerts to one fixed recipient
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailChannel {
    /// Parse addresses and prepare the transport. No connection is made yet.
    pub fn new(config: EmailConfig) -> Result<Self, NotifyError> {
        let from: Mailbox = config.user.parse()?;
        let to: Mailbox = config.recipient.parse()?;

        let credentials = Credentials::new(
            config.user.clone(),
            config.password.expose_secret().to_string(),
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        tracing::info!(host = %config.host, port = config.port, to = %to, "Email alerts enabled");
        Ok(Self { transport, from, to })
    }

    fn message(&self, alert: &ReportAlert) -> Result<Message, NotifyError> {
        Ok(Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(alert.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(alert.email_body())?)
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, alert: &ReportAlert) -> Result<(), NotifyError> {
        let message = self.message(alert)?;
        self.transport.send(message).await?;
        Ok(())
    }
}
