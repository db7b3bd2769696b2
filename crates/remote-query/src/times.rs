//! Time ranges carried by query keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Named relative window ending now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelativeTime {
    Last5Minutes,
    #[default]
    Last15Minutes,
    Last30Minutes,
    Last1Hour,
    Last3Hours,
    Last6Hours,
    Last12Hours,
    Last1Day,
    Last2Days,
    Last7Days,
    Last30Days,
    Custom,
}

impl RelativeTime {
    /// Window length in seconds; `None` for [`RelativeTime::Custom`].
    pub fn seconds(self) -> Option<i64> {
        let minutes = match self {
            RelativeTime::Last5Minutes => 5,
            RelativeTime::Last15Minutes => 15,
            RelativeTime::Last30Minutes => 30,
            RelativeTime::Last1Hour => 60,
            RelativeTime::Last3Hours => 3 * 60,
            RelativeTime::Last6Hours => 6 * 60,
            RelativeTime::Last12Hours => 12 * 60,
            RelativeTime::Last1Day => 24 * 60,
            RelativeTime::Last2Days => 2 * 24 * 60,
            RelativeTime::Last7Days => 7 * 24 * 60,
            RelativeTime::Last30Days => 30 * 24 * 60,
            RelativeTime::Custom => return None,
        };
        Some(minutes * 60)
    }
}

/// A resolved time range in epoch seconds.
///
/// Part of query keys, so picking a new range (or refreshing a relative one)
/// makes views fetch again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub time: RelativeTime,
    pub time_start: i64,
    pub time_end: i64,
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::relative(RelativeTime::default(), Utc::now())
    }
}

impl TimeRange {
    /// Resolve `time` against `now`. A custom window resolves to an empty range at `now`.
    pub fn relative(time: RelativeTime, now: DateTime<Utc>) -> Self {
        let time_end = now.timestamp();
        let time_start = time_end - time.seconds().unwrap_or(0);
        Self {
            time,
            time_start,
            time_end,
        }
    }

    /// Explicit range; the bounds are swapped if given in reverse.
    pub fn custom(start: i64, end: i64) -> Self {
        Self {
            time: RelativeTime::Custom,
            time_start: start.min(end),
            time_end: start.max(end),
        }
    }

    /// The last 15 minutes.
    pub fn last_15_minutes() -> Self {
        Self::relative(RelativeTime::Last15Minutes, Utc::now())
    }

    /// Re-resolve a relative range against `now`; custom ranges are unchanged.
    pub fn refreshed(self, now: DateTime<Utc>) -> Self {
        match self.time {
            RelativeTime::Custom => self,
            time => Self::relative(time, now),
        }
    }

    pub fn duration_seconds(&self) -> i64 {
        self.time_end - self.time_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_window_is_fifteen_minutes() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let range = TimeRange::relative(RelativeTime::default(), now);
        assert_eq!(range.time_end, 1_700_000_000);
        assert_eq!(range.time_start, 1_700_000_000 - 900);
        assert_eq!(range.duration_seconds(), 900);
    }

    #[test]
    fn custom_ranges_are_ordered_and_stable() {
        let range = TimeRange::custom(20, 10);
        assert_eq!((range.time_start, range.time_end), (10, 20));
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        assert_eq!(range.refreshed(now), range);
    }

    #[test]
    fn wire_format() {
        let range = TimeRange::custom(1, 2);
        assert_eq!(
            serde_json::to_string(&range).unwrap(),
            r#"{"time":"custom","timeStart":1,"timeEnd":2}"#
        );
        let time: RelativeTime = serde_json::from_str("\"last15Minutes\"").unwrap();
        assert_eq!(time, RelativeTime::Last15Minutes);
    }
}
