//! Date/time utilities for Warden.
//!
//! Upstream log records carry epoch-second timestamps; rate-limit state is
//! tracked in epoch milliseconds. Everything here is UTC.

use chrono::{DateTime, Datelike, Days, NaiveTime, Utc};

/// Current time as epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Start of the current week: Monday 00:00 UTC.
///
/// Weekly shift quotas reset on this boundary.
pub fn week_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_back = now.weekday().num_days_from_monday() as u64;
    let monday = now.date_naive() - Days::new(days_back);
    monday.and_time(NaiveTime::MIN).and_utc()
}

/// Format a duration in whole seconds as `"1h 23m 45s"`.
///
/// Zero-valued leading units are omitted; a zero duration renders as `"0s"`.
pub fn format_duration(total_secs: i64) -> String {
    let total_secs = total_secs.max(0);
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
