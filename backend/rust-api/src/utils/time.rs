use chrono::{DateTime, NaiveDate, Utc};

/// Daily-ledger key for a UTC instant, `YYYY-MM-DD`.
pub fn date_key(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d").to_string()
}

pub fn is_valid_date_key(value: &str) -> bool {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

#[cfg(test)]
mod tests {
    use super::{date_key, is_valid_date_key};
    use chrono::{TimeZone, Utc};

    #[test]
    fn date_key_is_utc_calendar_date() {
        let instant = Utc.with_ymd_and_hms(2026, 3, 7, 23, 59, 59).unwrap();
        assert_eq!(date_key(instant), "2026-03-07");
    }

    #[test]
    fn date_key_validation() {
        assert!(is_valid_date_key("2026-03-07"));
        assert!(!is_valid_date_key("07-03-2026"));
        assert!(!is_valid_date_key("2026-13-01"));
        assert!(!is_valid_date_key("today"));
    }
}
