// Raw telemetry domain models
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSeriesPoint {
    pub time_ms: i64,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(time_ms: i64, value: f64) -> Self {
        Self { time_ms, value }
    }
}

/// Irregularly sampled readings of one sensor, keyed by epoch milliseconds.
///
/// Duplicate timestamps keep the last value written. Non-finite readings are dropped
/// on ingestion, so every stored sample is usable for interpolation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSeries {
    samples: BTreeMap<i64, f64>,
}

impl RawSeries {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = TimeSeriesPoint>,
    {
        let mut series = Self::empty();
        for point in points {
            series.insert(point.time_ms, point.value);
        }
        series
    }

    pub fn insert(&mut self, time_ms: i64, value: f64) {
        if value.is_finite() {
            self.samples.insert(time_ms, value);
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in ascending timestamp order.
    pub fn points(&self) -> impl Iterator<Item = TimeSeriesPoint> + '_ {
        self.samples
            .iter()
            .map(|(&time_ms, &value)| TimeSeriesPoint::new(time_ms, value))
    }
}
