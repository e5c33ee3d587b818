//! Timestamp helpers
//!
//! Report timestamps are kept at millisecond precision and rendered the way
//! browsers render `Date.toISOString()`, so clients can compare them directly.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Current instant truncated to milliseconds
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Render as `YYYY-MM-DDTHH:MM:SS.mmmZ`
pub fn to_iso_millis(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// UTC calendar day bucket (`YYYY-MM-DD`)
pub fn day_bucket(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

/// Serde adapter for millisecond ISO-8601 timestamps
pub mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::to_iso_millis(at))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_iso_millis_always_has_three_digits() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 1).unwrap();
        assert_eq!(to_iso_millis(&at), "2024-03-09T23:59:01.000Z");
    }

    #[test]
    fn test_now_millis_drops_sub_millisecond_precision() {
        let now = now_millis();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_day_bucket_uses_utc_day() {
        let late = Utc.with_ymd_and_hms(2024, 12, 31, 23, 30, 0).unwrap();
        assert_eq!(day_bucket(&late), "2024-12-31");
    }
}
