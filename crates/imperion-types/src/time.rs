//! Wall-clock helpers.
//!
//! Every persisted timestamp is milliseconds since the Unix epoch.

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
