//! Date window helpers for the metrics aggregation
//!
//! The dashboard reports a rolling 30-day window anchored to the merchant's
//! business timezone, expressed as a fixed UTC offset. Bounds are converted
//! back to UTC before being sent upstream.

use chrono::{DateTime, Duration, FixedOffset, SecondsFormat, Utc};

/// Returns the last-30-days window as UTC RFC 3339 instants with milliseconds.
///
/// The window runs from 00:00:00.000 twenty-nine days ago through 23:59:59.999
/// today, both taken in the business timezone, so "today" is inclusive.
pub fn last_30_days_range(business_utc_offset_hours: i32) -> (String, String) {
    range_ending_at(Utc::now(), business_utc_offset_hours)
}

fn range_ending_at(now: DateTime<Utc>, business_utc_offset_hours: i32) -> (String, String) {
    let offset = FixedOffset::east_opt(business_utc_offset_hours * 3600)
        .expect("validated offset is within chrono bounds");

    let today = now.with_timezone(&offset).date_naive();

    let from_local = (today - Duration::days(29))
        .and_hms_milli_opt(0, 0, 0, 0)
        .expect("midnight is always a valid time");
    let to_local = today
        .and_hms_milli_opt(23, 59, 59, 999)
        .expect("end of day is always a valid time");

    let from_utc = from_local
        .and_local_timezone(offset)
        .unwrap()
        .with_timezone(&Utc);
    let to_utc = to_local
        .and_local_timezone(offset)
        .unwrap()
        .with_timezone(&Utc);

    (
        from_utc.to_rfc3339_opts(SecondsFormat::Millis, true),
        to_utc.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_bounds_in_plus_four_offset() {
        // 10:00 UTC is 14:00 in UTC+4, so "today" there is the same date.
        let now = Utc.with_ymd_and_hms(2025, 8, 6, 10, 0, 0).unwrap();
        let (from, to) = range_ending_at(now, 4);

        assert_eq!(from, "2025-07-07T20:00:00.000Z");
        assert_eq!(to, "2025-08-06T19:59:59.999Z");
    }

    #[test]
    fn test_offset_can_shift_the_anchor_date() {
        // 22:00 UTC is already past midnight in UTC+4; the window anchors to
        // the next business day.
        let now = Utc.with_ymd_and_hms(2025, 8, 6, 22, 0, 0).unwrap();
        let (_, to) = range_ending_at(now, 4);
        assert_eq!(to, "2025-08-07T19:59:59.999Z");

        // A negative offset keeps the previous business day alive instead.
        let early = Utc.with_ymd_and_hms(2025, 8, 6, 2, 0, 0).unwrap();
        let (_, to) = range_ending_at(early, -5);
        assert_eq!(to, "2025-08-06T04:59:59.999Z");
    }

    #[test]
    fn test_window_spans_thirty_calendar_days() {
        let now = Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap();
        let (from, to) = range_ending_at(now, 4);

        let from = DateTime::parse_from_rfc3339(&from).unwrap();
        let to = DateTime::parse_from_rfc3339(&to).unwrap();
        let span = to - from;

        assert_eq!(span, Duration::days(30) - Duration::milliseconds(1));
    }
}
