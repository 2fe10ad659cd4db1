// Domain layer - Pure data model of a metering run
pub mod calibration;
pub mod equipment;
pub mod error;
pub mod power;
pub mod report;
pub mod telemetry;
pub mod time_grid;
pub mod topology;
