//! Report types and the submission contract

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::time::iso_millis;

/// Why a submission was refused before reaching the store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field must not be empty: {0}")]
    EmptyField(&'static str),

    #[error("Field `wrapped` must be an object or an array")]
    InvalidWrapped,
}

/// Server-generated report identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub Uuid);

impl ReportId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A report exactly as the client sent it
///
/// Every field is optional at the wire level so that a missing field is
/// reported through [`ValidationError`] instead of a deserializer message.
/// Unknown fields (including any client-supplied `createdAt`) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSubmission {
    pub manifest_hash: Option<String>,
    pub cipher: Option<String>,
    pub iv: Option<String>,
    pub salt: Option<String>,
    pub wrapped: Option<Value>,
    #[serde(rename = "mediaDataURL")]
    pub media_data_url: Option<String>,
}

impl ReportSubmission {
    /// Check the submission against the input contract
    pub fn validate(self) -> Result<NewReport, ValidationError> {
        let wrapped = match self.wrapped {
            None | Some(Value::Null) => None,
            Some(v @ (Value::Object(_) | Value::Array(_))) => Some(v),
            Some(_) => return Err(ValidationError::InvalidWrapped),
        };

        Ok(NewReport {
            manifest_hash: required("manifestHash", self.manifest_hash)?,
            cipher: required("cipher", self.cipher)?,
            iv: required("iv", self.iv)?,
            salt: required("salt", self.salt)?,
            wrapped,
            media_data_url: self.media_data_url.filter(|s| !s.is_empty()),
            created_at: None,
        })
    }
}

fn required(name: &'static str, value: Option<String>) -> Result<String, ValidationError> {
    match value {
        None => Err(ValidationError::MissingField(name)),
        Some(s) if s.trim().is_empty() => Err(ValidationError::EmptyField(name)),
        Some(s) => Ok(s),
    }
}

/// A validated report waiting to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    /// Hash of the plaintext manifest (tamper evidence)
    pub manifest_hash: String,
    /// Encrypted manifest
    pub cipher: String,
    pub iv: String,
    pub salt: String,
    /// Optional escrowed key blob, stored verbatim
    pub wrapped: Option<Value>,
    /// Optional base64 media attachment
    pub media_data_url: Option<String>,
    /// Assigned by the store when `None`
    pub created_at: Option<DateTime<Utc>>,
}

impl NewReport {
    /// Minimal report with only the required fields set
    pub fn new(
        manifest_hash: impl Into<String>,
        cipher: impl Into<String>,
        iv: impl Into<String>,
        salt: impl Into<String>,
    ) -> Self {
        Self {
            manifest_hash: manifest_hash.into(),
            cipher: cipher.into(),
            iv: iv.into(),
            salt: salt.into(),
            wrapped: None,
            media_data_url: None,
            created_at: None,
        }
    }

    /// Pin the creation time instead of letting the store assign it
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Turn into a stored record with the given id and timestamp
    pub fn into_stored(self, id: ReportId, created_at: DateTime<Utc>) -> StoredReport {
        StoredReport {
            id,
            manifest_hash: self.manifest_hash,
            cipher: self.cipher,
            iv: self.iv,
            salt: self.salt,
            wrapped: self.wrapped,
            media_data_url: self.media_data_url,
            created_at,
        }
    }
}

/// A persisted report, serialized in the shape clients already consume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReport {
    #[serde(rename = "_id")]
    pub id: ReportId,
    pub manifest_hash: String,
    pub cipher: String,
    pub iv: String,
    pub salt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapped: Option<Value>,
    #[serde(
        rename = "mediaDataURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub media_data_url: Option<String>,
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
}

/// Number of reports received on one UTC calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    /// Day bucket, `YYYY-MM-DD`
    #[serde(rename = "_id")]
    pub day: String,
    pub count: u64,
}
