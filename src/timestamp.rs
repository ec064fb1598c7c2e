use std::time::{Duration, SystemTime};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Wall-clock time at which an engine notification was received.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Timestamp(SystemTime);

impl Timestamp {
    pub fn now() -> Self {
        Self(SystemTime::now())
    }

    /// Time since this timestamp, zero if the clock went backwards.
    pub fn elapsed(&self) -> Duration {
        self.0.elapsed().unwrap_or_default()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Self(time)
    }
}

impl From<Timestamp> for SystemTime {
    fn from(timestamp: Timestamp) -> Self {
        timestamp.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let datetime: DateTime<Utc> = self.0.into();
        write!(f, "{}", datetime.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_now() {
        let timestamp = Timestamp::now();
        assert!(timestamp.elapsed().as_secs() < 1);
    }

    #[test]
    fn test_timestamp_system_time_conversions() {
        let time = SystemTime::UNIX_EPOCH + Duration::from_secs(42);
        assert_eq!(SystemTime::from(Timestamp::from(time)), time);
    }

    #[test]
    fn test_future_timestamp_elapsed_is_zero() {
        let future = Timestamp::from(SystemTime::now() + Duration::from_secs(3600));
        assert_eq!(future.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_timestamp_display() {
        let timestamp = Timestamp::from(SystemTime::UNIX_EPOCH + Duration::from_millis(1_500));
        assert_eq!(timestamp.to_string(), "1970-01-01T00:00:01.500Z");
    }
}
