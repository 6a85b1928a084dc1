use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in unix seconds, or 0 if the clock is before the epoch.
pub(crate) fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
