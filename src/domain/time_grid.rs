// Analysis window and the shared uniform time grid
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::error::{MeterError, MeterResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisWindow {
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(rename = "interval_seconds", serialize_with = "serialize_seconds")]
    pub interval: Duration,
}

impl AnalysisWindow {
    pub fn new(begin: DateTime<Utc>, end: DateTime<Utc>, interval: Duration) -> MeterResult<Self> {
        if end < begin {
            return Err(MeterError::InvalidWindow {
                what: format!("end {} precedes begin {}", end, begin),
            });
        }
        if interval <= Duration::zero() {
            return Err(MeterError::InvalidWindow {
                what: format!("interval must be positive, got {}s", interval.num_seconds()),
            });
        }
        Ok(Self {
            begin,
            end,
            interval,
        })
    }

    /// The window widened by `margin` on both sides, used when fetching raw data so the
    /// aligner has anchors beyond the grid edges.
    pub fn padded(&self, margin: Duration) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.begin
                .checked_sub_signed(margin)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            self.end
                .checked_add_signed(margin)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    }
}

fn serialize_seconds<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i64(d.num_seconds())
}

/// Evenly spaced timestamps covering `[begin, end]`, both ends included when `end`
/// falls on the interval.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    timestamps_ms: Vec<i64>,
}

impl TimeGrid {
    pub fn new(window: &AnalysisWindow) -> Self {
        let begin = window.begin.timestamp_millis();
        let end = window.end.timestamp_millis();
        let step = window.interval.num_milliseconds().max(1);

        let timestamps_ms = (0..)
            .map_while(|i: i64| i.checked_mul(step).and_then(|offset| begin.checked_add(offset)))
            .take_while(|&t| t <= end)
            .collect();

        Self { timestamps_ms }
    }

    pub fn len(&self) -> usize {
        self.timestamps_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps_ms.is_empty()
    }

    pub fn timestamps_ms(&self) -> &[i64] {
        &self.timestamps_ms
    }
}

/// Grid interval from a minute count, rejecting values chrono cannot represent.
pub fn interval_from_minutes(minutes: i64) -> MeterResult<Duration> {
    Duration::try_minutes(minutes).ok_or_else(|| MeterError::InvalidWindow {
        what: format!("interval of {} minutes is out of range", minutes),
    })
}
