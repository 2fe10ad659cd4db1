// In-memory series store used by pipeline tests
use crate::application::series_store::SeriesStore;
use crate::domain::error::FetchError;
use crate::domain::telemetry::{RawSeries, TimeSeriesPoint};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct MemorySeriesStore {
    series: HashMap<String, Vec<TimeSeriesPoint>>,
    failing: HashSet<String>,
}

impl MemorySeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, sensor_id: &str, points: Vec<TimeSeriesPoint>) -> Self {
        self.series.insert(sensor_id.to_string(), points);
        self
    }

    /// Forget `sensor_id`, so fetching it reports an unknown sensor.
    pub fn without_series(mut self, sensor_id: &str) -> Self {
        self.series.remove(sensor_id);
        self
    }

    /// Make every fetch of `sensor_id` fail as a transport error.
    pub fn with_failure(mut self, sensor_id: &str) -> Self {
        self.failing.insert(sensor_id.to_string());
        self
    }
}

#[async_trait]
impl SeriesStore for MemorySeriesStore {
    async fn fetch(
        &self,
        sensor_id: &str,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<RawSeries, FetchError> {
        if self.failing.contains(sensor_id) {
            return Err(FetchError::Retrieval {
                sensor: sensor_id.to_string(),
                source: anyhow::anyhow!("connection reset"),
            });
        }
        let points = self.series.get(sensor_id).ok_or_else(|| FetchError::NotFound {
            sensor: sensor_id.to_string(),
        })?;

        let (begin, end) = (begin.timestamp_millis(), end.timestamp_millis());
        Ok(RawSeries::from_points(
            points
                .iter()
                .copied()
                .filter(|p| p.time_ms >= begin && p.time_ms <= end),
        ))
    }
}
