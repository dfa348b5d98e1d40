use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{SecondsFormat, Utc};

/// Milliseconds since the Unix epoch. Injected so tests can move time by hand.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// RFC 3339 timestamp source used for generated reports.
pub type Timestamp = Arc<dyn Fn() -> String + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    })
}

pub fn utc_timestamp() -> Timestamp {
    Arc::new(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}
