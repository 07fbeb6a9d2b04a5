use chrono::{DateTime, SecondsFormat, Utc};

/// Get current UTC timestamp.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a whole-seconds timestamp to `DateTime<Utc>`.
pub fn from_secs(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

/// RFC-3339 rendering of a whole-seconds timestamp, for error messages and
/// Coinbase query parameters. Out-of-range values fall back to the raw number.
pub fn rfc3339(secs: i64) -> String {
    match from_secs(secs) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, false),
        None => secs.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_renders_utc_seconds() {
        assert_eq!(rfc3339(1657378800), "2022-07-09T15:00:00+00:00");
        assert_eq!(rfc3339(0), "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn from_secs_round_trips() {
        let dt = from_secs(1657378800).unwrap();
        assert_eq!(dt.timestamp(), 1657378800);
    }
}
