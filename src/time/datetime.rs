//! Date string parsing shared by the EXIF and video extractors

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeDelta};

/// Parse a video metadata datetime and normalize it to UTC
///
/// Values without an offset are assumed to already be UTC, which is what
/// QuickTime/MP4 containers store.
pub fn parse_video_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    // Apple writes offsets without a colon: 2024-01-15T14:30:00+0800
    for format in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.naive_utc());
        }
    }

    let s = s.trim_end_matches('Z');
    let formats = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    formats
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
}

/// Earliest capture time accepted from embedded metadata
fn earliest_capture() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1990, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Check that an embedded timestamp lies in [1990-01-01, now + 1 day]
///
/// Cameras with a dead clock battery write 1970 or 2000-01-01 style values,
/// and a misconfigured clock can run into the future.
pub fn within_capture_window(timestamp: &NaiveDateTime) -> bool {
    let latest = Local::now().naive_local() + TimeDelta::days(1);
    *timestamp >= earliest_capture() && *timestamp <= latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_video_datetime() {
        // ISO 8601 with Z
        let dt = parse_video_datetime("2024-01-15T14:30:00Z").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 1);
        assert_eq!(dt.day(), 15);

        // With milliseconds
        let dt = parse_video_datetime("2024-01-15T14:30:00.123Z").unwrap();
        assert_eq!(dt.hour(), 14);

        // With timezone offset - converted to UTC
        let dt = parse_video_datetime("2024-01-15T14:30:00+08:00").unwrap();
        assert_eq!(dt.hour(), 6);
        assert_eq!(dt.minute(), 30);

        // Apple style offset
        let dt = parse_video_datetime("2024-01-15T14:30:00+0100").unwrap();
        assert_eq!(dt.hour(), 13);

        // Without timezone (assumed UTC)
        let dt = parse_video_datetime("2024-01-15T14:30:00").unwrap();
        assert_eq!(dt.hour(), 14);

        // Space separator
        let dt = parse_video_datetime("2024-01-15 14:30:00").unwrap();
        assert_eq!(dt.year(), 2024);

        assert!(parse_video_datetime("invalid").is_none());
    }

    #[test]
    fn test_capture_window() {
        let ok = NaiveDateTime::parse_from_str("2015-06-01 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let too_old =
            NaiveDateTime::parse_from_str("1989-12-31 23:59:59", "%Y-%m-%d %H:%M:%S").unwrap();
        let future = Local::now().naive_local() + TimeDelta::days(3);

        assert!(within_capture_window(&ok));
        assert!(within_capture_window(&earliest_capture()));
        assert!(!within_capture_window(&too_old));
        assert!(!within_capture_window(&future));
    }
}
