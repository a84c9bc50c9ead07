//! Publish date normalisation.
//!
//! The feed has carried two encodings over time: a textual calendar form and
//! an epoch-milliseconds token wrapped as `/Date(1760569500000+0900)/`. Both
//! end up as a UTC instant.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// Naive layouts interpreted in the configured offset.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parses a publish date in any supported encoding.
///
/// Naive calendar forms carry no zone and are read as local time in
/// `offset`. Returns `None` when nothing matches.
#[must_use]
pub fn parse_publish_date(raw: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(instant) = parse_epoch_token(raw) {
        return Some(instant);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS.iter().find_map(|fmt| {
        let naive = NaiveDateTime::parse_from_str(raw, fmt).ok()?;
        offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

/// Parses `/Date(<millis>[±HHMM])/`.
///
/// The millisecond count is already UTC; the optional suffix only records
/// the producer's zone, so it is validated and otherwise ignored.
fn parse_epoch_token(raw: &str) -> Option<DateTime<Utc>> {
    let inner = raw.strip_prefix("/Date(")?.strip_suffix(")/")?;

    // A leading '-' belongs to the millisecond count, not the zone suffix.
    let split = inner
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '+' || *c == '-')
        .map(|(i, _)| i);

    let (millis, zone) = match split {
        Some(i) => inner.split_at(i),
        None => (inner, ""),
    };

    if !zone.is_empty() && (zone.len() != 5 || !zone[1..].bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }

    let millis: i64 = millis.parse().ok()?;
    DateTime::from_timestamp_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn textual_and_epoch_forms_agree() {
        let expected = utc(2025, 10, 15, 23, 25);
        let textual = parse_publish_date("Thu, 16 Oct 2025 08:25:00 +0900", jst());
        let epoch = parse_publish_date("/Date(1760570700000)/", jst());
        assert_eq!(textual, Some(expected));
        assert_eq!(epoch, Some(expected));
    }

    #[test]
    fn epoch_token_accepts_zone_suffix() {
        assert_eq!(
            parse_publish_date("/Date(1760570700000+0900)/", jst()),
            Some(utc(2025, 10, 15, 23, 25))
        );
        assert_eq!(
            parse_publish_date("/Date(1760570700000-0500)/", jst()),
            Some(utc(2025, 10, 15, 23, 25))
        );
        assert!(parse_publish_date("/Date(1760570700000+09)/", jst()).is_none());
    }

    #[test]
    fn epoch_token_allows_negative_millis() {
        assert_eq!(
            parse_publish_date("/Date(-60000)/", jst()),
            Some(Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 0).unwrap())
        );
    }

    #[test]
    fn rfc3339_is_parsed() {
        assert_eq!(
            parse_publish_date("2025-10-16T08:25:00+09:00", jst()),
            Some(utc(2025, 10, 15, 23, 25))
        );
    }

    #[test]
    fn naive_forms_use_configured_offset() {
        let expected = Some(utc(2025, 10, 15, 23, 25));
        assert_eq!(parse_publish_date("2025-10-16 08:25", jst()), expected);
        assert_eq!(parse_publish_date("2025/10/16 08:25:00", jst()), expected);
        assert_eq!(
            parse_publish_date("2025-10-16 08:25", FixedOffset::east_opt(0).unwrap()),
            Some(utc(2025, 10, 16, 8, 25))
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_publish_date("", jst()).is_none());
        assert!(parse_publish_date("yesterday", jst()).is_none());
        assert!(parse_publish_date("/Date(abc)/", jst()).is_none());
        assert!(parse_publish_date("2025-13-40 08:25", jst()).is_none());
    }
}
