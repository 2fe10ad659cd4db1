// Error kinds of a metering run
use thiserror::Error;

pub type MeterResult<T> = Result<T, MeterError>;

/// Failures reported by a `SeriesStore` adapter.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The store has never heard of this sensor.
    #[error("Sensor {sensor} is not known to the series store")]
    NotFound { sensor: String },

    #[error("Failed to retrieve series for sensor {sensor}: {source}")]
    Retrieval {
        sensor: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Fatal conditions of a run. Missing topology or missing data are not errors; they
/// surface as unavailable estimates in the report.
#[derive(Error, Debug)]
pub enum MeterError {
    #[error("Invalid analysis window: {what}")]
    InvalidWindow { what: String },

    #[error("Unknown equipment: {id}")]
    UnknownEquipment { id: String },

    #[error("Topology query failed: {0}")]
    Topology(#[source] anyhow::Error),

    #[error("Failed to retrieve series for sensor {sensor}: {source}")]
    Retrieval {
        sensor: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Shape mismatch for {what}: expected {expected} samples, found {found}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("Not enough samples to fit: {observations} observations for {predictors} predictors")]
    InsufficientSamples {
        observations: usize,
        predictors: usize,
    },

    #[error("Singular design matrix: {what}")]
    SingularDesign { what: String },
}
