//! Date utilities for the planning calendar

use crate::{Error, Result};
use chrono::{Local, NaiveDate};

/// Current local date
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parse an ISO-8601 calendar date (`YYYY-MM-DD`)
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| Error::InvalidInput(format!("Invalid date '{}': {}", s, e)))
}

/// Format a date the way the persisted document stores it
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format_round_trip() {
        let date = parse_date("2026-03-09").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
        assert_eq!(format_date(date), "2026-03-09");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_date("09/03/2026"), Err(Error::InvalidInput(_))));
        assert!(parse_date("2026-02-30").is_err());
    }

    #[test]
    fn test_today_is_recent() {
        let t = today();
        assert!(t > NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
    }
}
