// Series store trait for raw telemetry access
use crate::domain::error::FetchError;
use crate::domain::telemetry::RawSeries;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait SeriesStore: Send + Sync {
    /// Fetch every sample of `sensor_id` between `begin` and `end` (inclusive).
    ///
    /// No samples in range is an empty `RawSeries`, not an error. `FetchError::NotFound`
    /// is reserved for identifiers the store does not know at all.
    async fn fetch(
        &self,
        sensor_id: &str,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<RawSeries, FetchError>;
}
