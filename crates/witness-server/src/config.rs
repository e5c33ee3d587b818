//! Environment-driven server configuration
//!
//! Recognized variables: DATABASE_URL, PORT, FRONTEND_URL, SMTP_HOST,
//! SMTP_PORT, SMTP_USER, SMTP_PASS, WATCHDOG_EMAIL, TELEGRAM_BOT_TOKEN,
//! TELEGRAM_CHAT_ID. Empty values count as unset.

use anyhow::Context;
use axum::http::HeaderValue;
use secrecy::SecretString;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use witness_notify::email::DEFAULT_SMTP_PORT;
use witness_notify::{EmailConfig, TelegramConfig};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://witness.db";
pub const DEFAULT_PORT: u16 = 5000;

/// Which browser origins may call the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigin {
    Any,
    Exact(String),
}

impl CorsOrigin {
    fn parse(raw: Option<String>) -> Self {
        match raw {
            None => CorsOrigin::Any,
            Some(v) if v == "*" => CorsOrigin::Any,
            Some(v) => CorsOrigin::Exact(v),
        }
    }

    pub fn layer(&self) -> anyhow::Result<CorsLayer> {
        let origin = match self {
            CorsOrigin::Any => AllowOrigin::from(Any),
            CorsOrigin::Exact(origin) => {
                let value = HeaderValue::from_str(origin)
                    .with_context(|| format!("Invalid FRONTEND_URL: {}", origin))?;
                AllowOrigin::exact(value)
            }
        };

        Ok(CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any))
    }
}

/// Everything the server needs at startup
#[derive(Debug)]
pub struct ServerConfig {
    pub database_url: String,
    pub port: u16,
    pub cors_origin: CorsOrigin,
    /// `None` when SMTP_USER is unset
    pub email: Option<EmailConfig>,
    /// `None` when TELEGRAM_BOT_TOKEN is unset
    pub telegram: Option<TelegramConfig>,
}

impl ServerConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Secrets keep their exact bytes; everything else is trimmed.
        let get_secret = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get = |key: &str| get_secret(key).map(|v| v.trim().to_string());
        let require = |key: &str, because: &str| {
            get(key).with_context(|| format!("{} is required when {} is set", key, because))
        };

        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("Invalid PORT (expected u16): {}", raw))?,
            None => DEFAULT_PORT,
        };

        let email = match get("SMTP_USER") {
            Some(user) => {
                let smtp_port = match get("SMTP_PORT") {
                    Some(raw) => raw
                        .parse::<u16>()
                        .with_context(|| format!("Invalid SMTP_PORT (expected u16): {}", raw))?,
                    None => DEFAULT_SMTP_PORT,
                };
                let password = get_secret("SMTP_PASS")
                    .context("SMTP_PASS is required when SMTP_USER is set")?;
                Some(EmailConfig {
                    host: require("SMTP_HOST", "SMTP_USER")?,
                    port: smtp_port,
                    user,
                    password: SecretString::new(password),
                    recipient: require("WATCHDOG_EMAIL", "SMTP_USER")?,
                })
            }
            None => None,
        };

        let telegram = match get_secret("TELEGRAM_BOT_TOKEN") {
            Some(token) => Some(TelegramConfig {
                token: SecretString::new(token),
                chat_id: require("TELEGRAM_CHAT_ID", "TELEGRAM_BOT_TOKEN")?,
            }),
            None => None,
        };

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            port,
            cors_origin: CorsOrigin::parse(get("FRONTEND_URL")),
            email,
            telegram,
        })
    }

    /// Effective settings with secrets left out
    pub fn redacted(&self) -> serde_json::Value {
        serde_json::json!({
            "databaseUrl": self.database_url,
            "port": self.port,
            "corsOrigin": match &self.cors_origin {
                CorsOrigin::Any => "*",
                CorsOrigin::Exact(origin) => origin.as_str(),
            },
            "email": self.email.as_ref().map(|e| serde_json::json!({
                "host": e.host,
                "port": e.port,
                "user": e.user,
                "recipient": e.recipient,
            })),
            "telegram": self.telegram.as_ref().map(|t| serde_json::json!({
                "chatId": t.chat_id,
            })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.port, 5000);
        assert_eq!(config.cors_origin, CorsOrigin::Any);
        assert!(config.email.is_none());
        assert!(config.telegram.is_none());
    }

    #[test]
    fn test_full_configuration() {
        let config = load(&[
            ("DATABASE_URL", "sqlite:///var/lib/witness/reports.db"),
            ("PORT", "8080"),
            ("FRONTEND_URL", "https://report.example.org"),
            ("SMTP_HOST", "smtp.example.org"),
            ("SMTP_PORT", "587"),
            ("SMTP_USER", "alerts@example.org"),
            ("SMTP_PASS", "hunter2"),
            ("WATCHDOG_EMAIL", "watchdog@example.org"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("TELEGRAM_CHAT_ID", "-100123"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(
            config.cors_origin,
            CorsOrigin::Exact("https://report.example.org".into())
        );
        let email = config.email.as_ref().unwrap();
        assert_eq!(email.port, 587);
        assert_eq!(email.password.expose_secret(), "hunter2");
        assert_eq!(config.telegram.as_ref().unwrap().chat_id, "-100123");
    }

    #[test]
    fn test_smtp_port_defaults_to_smtps() {
        let config = load(&[
            ("SMTP_HOST", "smtp.example.org"),
            ("SMTP_USER", "alerts@example.org"),
            ("SMTP_PASS", "pw"),
            ("WATCHDOG_EMAIL", "watchdog@example.org"),
        ])
        .unwrap();
        assert_eq!(config.email.unwrap().port, 465);
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config =
            load(&[("SMTP_USER", ""), ("TELEGRAM_BOT_TOKEN", "  "), ("PORT", "")]).unwrap();
        assert!(config.email.is_none());
        assert!(config.telegram.is_none());
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_secrets_keep_surrounding_whitespace() {
        let config = load(&[
            ("SMTP_HOST", " smtp.example.org "),
            ("SMTP_USER", "alerts@example.org"),
            ("SMTP_PASS", " pass phrase "),
            ("WATCHDOG_EMAIL", "watchdog@example.org"),
            ("TELEGRAM_BOT_TOKEN", "123:abc\t"),
            ("TELEGRAM_CHAT_ID", " 42 "),
        ])
        .unwrap();

        let email = config.email.unwrap();
        assert_eq!(email.host, "smtp.example.org");
        assert_eq!(email.password.expose_secret(), " pass phrase ");
        let telegram = config.telegram.unwrap();
        assert_eq!(telegram.token.expose_secret(), "123:abc\t");
        assert_eq!(telegram.chat_id, "42");
    }

    #[test]
    fn test_blank_password_counts_as_missing() {
        let err = load(&[
            ("SMTP_HOST", "smtp.example.org"),
            ("SMTP_USER", "alerts@example.org"),
            ("SMTP_PASS", "   "),
            ("WATCHDOG_EMAIL", "watchdog@example.org"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("SMTP_PASS"));
    }

    #[test]
    fn test_incomplete_channels_fail() {
        let err = load(&[("SMTP_USER", "alerts@example.org"), ("SMTP_PASS", "pw")]).unwrap_err();
        assert!(err.to_string().contains("SMTP_HOST"));

        let err = load(&[("TELEGRAM_BOT_TOKEN", "123:abc")]).unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_CHAT_ID"));
    }

    #[test]
    fn test_invalid_port() {
        let err = load(&[("PORT", "http")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_redacted_hides_secrets() {
        let config = load(&[
            ("SMTP_HOST", "smtp.example.org"),
            ("SMTP_USER", "alerts@example.org"),
            ("SMTP_PASS", "hunter2"),
            ("WATCHDOG_EMAIL", "watchdog@example.org"),
            ("TELEGRAM_BOT_TOKEN", "123:very-secret"),
            ("TELEGRAM_CHAT_ID", "42"),
        ])
        .unwrap();

        let shown = config.redacted().to_string();
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("very-secret"));
        assert!(shown.contains("watchdog@example.org"));
    }

    #[test]
    fn test_cors_layer_rejects_bad_origin() {
        assert!(CorsOrigin::Exact("bad\norigin".into()).layer().is_err());
        assert!(CorsOrigin::Any.layer().is_ok());
    }
}
