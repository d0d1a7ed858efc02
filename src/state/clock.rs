//! Time source for store-written timestamps.

use chrono::{DateTime, Utc};

/// Format used for every timestamp the store writes.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Supplies the current time to the catalog store.
///
/// Production code uses [`SystemClock`]; tests inject a clock they control so
/// set-once timestamp behaviour can be asserted exactly.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time in UTC.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Render a timestamp the way it is stored.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Clock that only moves when told to.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock(std::sync::Mutex<DateTime<Utc>>);

#[cfg(test)]
impl ManualClock {
    pub fn at(ts: &str) -> Self {
        let ts = DateTime::parse_from_rfc3339(ts)
            .expect("valid RFC 3339 timestamp")
            .with_timezone(&Utc);
        Self(std::sync::Mutex::new(ts))
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.0.lock().unwrap();
        *now += chrono::Duration::seconds(secs);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        let clock = ManualClock::at("2024-01-02T03:04:05Z");
        assert_eq!(format_timestamp(clock.now()), "2024-01-02T03:04:05Z");
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::at("2024-01-02T03:04:05Z");
        clock.advance_secs(61);
        assert_eq!(format_timestamp(clock.now()), "2024-01-02T03:05:06Z");
    }

    #[test]
    fn test_system_clock_is_utc_now() {
        let before = Utc::now();
        let now = SystemClock.now();
        assert!(now >= before);
    }
}
