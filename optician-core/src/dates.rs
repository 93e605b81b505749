//! Customer visit dates.
//!
//! Dates are stored and transmitted as ISO-8601 calendar dates
//! (`YYYY-MM-DD`). Older records and clients used `dd/mm/yyyy`, which is
//! still accepted on input and rewritten to ISO by the schema migration.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer};

/// Canonical storage format
pub const ISO_FORMAT: &str = "%Y-%m-%d";

/// Legacy day-first format
pub const LEGACY_FORMAT: &str = "%d/%m/%Y";

/// Parse a date in any accepted representation
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, ISO_FORMAT) {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, LEGACY_FORMAT) {
        return Some(date);
    }

    // Full timestamps from date pickers ("2024-03-01T00:00:00.000Z")
    DateTime::parse_from_rfc3339(input)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Format a date for storage
pub fn format_date(date: NaiveDate) -> String {
    date.format(ISO_FORMAT).to_string()
}

/// Serde adapter accepting every format `parse_date` understands
pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!(
            "invalid date '{}', expected YYYY-MM-DD or dd/mm/yyyy",
            raw
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso() {
        assert_eq!(
            parse_date("2024-03-01"),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
    }

    #[test]
    fn test_parse_legacy_day_first() {
        assert_eq!(
            parse_date("01/03/2024"),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(
            parse_date(" 31/12/2023 "),
            NaiveDate::from_ymd_opt(2023, 12, 31)
        );
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            parse_date("2024-03-01T10:15:00.000Z"),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("31/02/2024"), None);
        assert_eq!(parse_date("2024-13-01"), None);
    }

    #[test]
    fn test_format_round_trip() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();
        assert_eq!(format_date(date), "2024-01-09");
        assert_eq!(parse_date(&format_date(date)), Some(date));
    }
}
