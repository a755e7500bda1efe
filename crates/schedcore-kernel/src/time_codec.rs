//! Timestamp and duration parsing/formatting for the scheduling boundary.
//!
//! # Timestamp format
//!
//! `YYYY-MM-DD HH:MM:SS` with an optional trailing `Z`. Presence of `Z`
//! means UTC; absence means local. The broken-down fields themselves are
//! always interpreted as UTC calendar fields — unlike the system this crate
//! reimplements, parsing does *not* depend on the process's `TZ` environment
//! variable (see the scheduling core's open questions: relying on an ambient
//! `TZ=UTC` is implicit and easy to get wrong in a reimplementation).
//! `is_utc` only records whether the caller *means* the value as UTC; the
//! scheduler decides what to do with local-meaning timestamps via its own
//! local/UTC offset, not via the process timezone.
//!
//! # Duration format
//!
//! Case-insensitive `(?:(\d+)D)?(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?`, at least
//! one field nonzero. Returned as whole seconds.

use std::sync::LazyLock;

use chrono::{NaiveDateTime, Utc};
use regex::Regex;

use crate::error::SchedCoreError;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(\d+)d)?(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$")
        .expect("duration regex is a compile-time constant")
});

/// Smart-interval minute counts that are explicitly allowed, beyond whole
/// multiples of a day.
const SMART_ALLOWED_MINUTES: [u32; 9] = [5, 10, 15, 20, 30, 60, 180, 360, 720];

/// Parse `"YYYY-MM-DD HH:MM:SS"`, optionally `Z`-suffixed, into
/// `(epoch_seconds, is_utc)`.
pub fn parse_timestamp(s: &str) -> Result<(i64, bool), SchedCoreError> {
    let (body, is_utc) = match s.strip_suffix('Z') {
        Some(rest) => (rest, true),
        None => (s, false),
    };

    let naive = NaiveDateTime::parse_from_str(body, TIMESTAMP_FORMAT)
        .map_err(|_| SchedCoreError::InvalidTime(s.to_string()))?;

    Ok((naive.and_utc().timestamp(), is_utc))
}

/// Format `epoch_seconds` as `"YYYY-MM-DD HH:MM:SS"`, appending `Z` iff
/// `is_utc`.
pub fn format_timestamp(epoch_seconds: i64, is_utc: bool) -> String {
    let naive = chrono::DateTime::<Utc>::from_timestamp(epoch_seconds, 0)
        .unwrap_or_else(|| chrono::DateTime::<Utc>::from_timestamp(0, 0).unwrap())
        .naive_utc();
    let body = naive.format(TIMESTAMP_FORMAT);
    if is_utc {
        format!("{body}Z")
    } else {
        body.to_string()
    }
}

/// Parse a duration string into whole seconds.
///
/// When `smart` is set, additionally enforces the aligned-interval
/// allow-list: a whole number of minutes that is either in
/// `{5,10,15,20,30,60,180,360,720}` or a positive multiple of `1440`.
pub fn parse_duration(s: &str, smart: bool) -> Result<u32, SchedCoreError> {
    let caps = DURATION_RE
        .captures(s)
        .ok_or_else(|| SchedCoreError::InvalidDuration(s.to_string()))?;

    let field = |idx: usize| -> Result<u32, SchedCoreError> {
        caps.get(idx)
            .map(|m| m.as_str().parse::<u32>())
            .transpose()
            .map_err(|_| SchedCoreError::InvalidDuration(s.to_string()))
            .map(|v| v.unwrap_or(0))
    };

    let days = field(1)?;
    let hours = field(2)?;
    let minutes = field(3)?;
    let seconds = field(4)?;

    let total = seconds
        .saturating_add(minutes.saturating_mul(60))
        .saturating_add(hours.saturating_mul(3600))
        .saturating_add(days.saturating_mul(86_400));

    if total == 0 {
        return Err(SchedCoreError::InvalidDuration(s.to_string()));
    }

    if !smart {
        return Ok(total);
    }

    if total % 60 != 0 {
        return Err(SchedCoreError::InvalidSmartInterval(s.to_string()));
    }

    let total_minutes = total / 60;
    let allowed = SMART_ALLOWED_MINUTES.contains(&total_minutes) || total_minutes % 1440 == 0;

    if allowed {
        Ok(total)
    } else {
        Err(SchedCoreError::InvalidSmartInterval(s.to_string()))
    }
}

/// Format a duration in whole seconds back into its canonical string,
/// emitting only the nonzero fields in `d h m s` order (e.g. `"1d12h"`,
/// `"30m"`, `"45s"`).
pub fn format_duration(mut total_seconds: u32) -> String {
    let seconds = total_seconds % 60;
    total_seconds /= 60;
    let minutes = total_seconds % 60;
    total_seconds /= 60;
    let hours = total_seconds % 24;
    let days = total_seconds / 24;

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{days}d"));
    }
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 {
        out.push_str(&format!("{seconds}s"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trip_utc() {
        let s = "2024-03-05 12:30:00Z";
        let (epoch, is_utc) = parse_timestamp(s).unwrap();
        assert!(is_utc);
        assert_eq!(format_timestamp(epoch, is_utc), s);
    }

    #[test]
    fn timestamp_round_trip_local() {
        let s = "2024-03-05 12:30:00";
        let (epoch, is_utc) = parse_timestamp(s).unwrap();
        assert!(!is_utc);
        assert_eq!(format_timestamp(epoch, is_utc), s);
    }

    #[test]
    fn timestamp_rejects_bad_trailing_char() {
        let err = parse_timestamp("2024-03-05 12:30:00X").unwrap_err();
        assert!(matches!(err, SchedCoreError::InvalidTime(_)));
    }

    #[test]
    fn timestamp_rejects_garbage() {
        assert!(parse_timestamp("not a time").is_err());
    }

    #[test]
    fn duration_parses_all_fields() {
        assert_eq!(parse_duration("1d1h1m1s", false).unwrap(), 90_061);
        assert_eq!(parse_duration("1D1H1M1S", false).unwrap(), 90_061);
    }

    #[test]
    fn duration_round_trip() {
        assert_eq!(format_duration(90_061), "1d1h1m1s");
        assert_eq!(parse_duration(&format_duration(90_061), false).unwrap(), 90_061);
        assert_eq!(format_duration(1800), "30m");
        assert_eq!(format_duration(45), "45s");
    }

    #[test]
    fn duration_rejects_all_zero() {
        let err = parse_duration("0s", false).unwrap_err();
        assert!(matches!(err, SchedCoreError::InvalidDuration(_)));
    }

    #[test]
    fn duration_rejects_unparseable() {
        assert!(parse_duration("banana", false).is_err());
    }

    #[test]
    fn smart_interval_accepts_allow_listed_minutes() {
        for s in ["5m", "10m", "15m", "20m", "30m", "1h", "3h", "6h", "12h"] {
            assert!(parse_duration(s, true).is_ok(), "{s} should be allowed");
        }
    }

    #[test]
    fn smart_interval_accepts_whole_days() {
        assert!(parse_duration("2d", true).is_ok());
        assert!(parse_duration("10d", true).is_ok());
    }

    #[test]
    fn smart_interval_rejects_arbitrary_minutes() {
        let err = parse_duration("7m", true).unwrap_err();
        assert!(matches!(err, SchedCoreError::InvalidSmartInterval(_)));
    }

    #[test]
    fn smart_interval_rejects_sub_minute_precision() {
        let err = parse_duration("90s", true).unwrap_err();
        assert!(matches!(err, SchedCoreError::InvalidSmartInterval(_)));
    }
}
