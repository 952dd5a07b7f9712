use chrono::{DateTime, Utc};

/// Format a timestamp the way the document store expects `@timestamp`:
/// ISO-8601 with millisecond precision and a literal `Z` suffix, e.g.
/// `2020-06-15T09:30:00.123Z`.
///
/// Existing stored documents use exactly this shape, so the format must
/// not change.
pub fn to_es_date(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_es_date_has_millisecond_precision_and_z_suffix() {
        let ts = Utc.with_ymd_and_hms(2020, 6, 15, 9, 30, 0).unwrap()
            + chrono::Duration::milliseconds(123);
        assert_eq!(to_es_date(ts), "2020-06-15T09:30:00.123Z");
    }

    #[test]
    fn test_es_date_pads_zero_milliseconds() {
        let ts = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(to_es_date(ts), "2020-01-02T03:04:05.000Z");
    }
}
