//! Query time ranges and the `<integer><unit>` shorthand used by dashboards.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{TelemetryError, TelemetryResult};
use crate::store::SampleQuery;

/// Window used when a range string is missing or malformed.
pub fn default_range() -> Duration {
    Duration::hours(1)
}

/// Parse a range such as `30s`, `15m`, `6h` or `7d`.
///
/// Never fails: missing, malformed, zero or overflowing input falls back to
/// one hour.
pub fn parse_time_range(input: Option<&str>) -> Duration {
    input.and_then(parse_strict).unwrap_or_else(default_range)
}

fn parse_strict(input: &str) -> Option<Duration> {
    let input = input.trim();
    let unit = input.chars().last()?;
    let amount: i64 = input[..input.len() - unit.len_utf8()].parse().ok()?;
    if amount <= 0 {
        return None;
    }
    match unit {
        's' => Duration::try_seconds(amount),
        'm' => Duration::try_minutes(amount),
        'h' => Duration::try_hours(amount),
        'd' => Duration::try_days(amount),
        _ => None,
    }
}

/// Inclusive time range `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Trailing window ending now
    pub fn last(window: Duration) -> Self {
        let end = Utc::now();
        Self::new(end - window, end)
    }

    /// Trailing window from a range string, see [`parse_time_range`]
    pub fn last_from_str(input: Option<&str>) -> Self {
        Self::last(parse_time_range(input))
    }

    pub fn validate(&self) -> TelemetryResult<()> {
        if self.start > self.end {
            return Err(TelemetryError::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Unbounded sample query over this range
    pub fn to_query(&self) -> SampleQuery {
        SampleQuery::new(self.start, self.end).unbounded()
    }
}
