// Run report domain model
use serde::Serialize;

use super::calibration::CalibrationResult;
use super::equipment::{EntityId, PointRole, ResolvedPoints};
use super::power::{PowerSeries, Quantity};
use super::time_grid::AnalysisWindow;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum VavStatus {
    /// A cooling power series was produced.
    Available,
    /// Required roles missing from the topology.
    Unresolved { roles: Vec<PointRole> },
    /// Points resolved, but at least one sensor had no usable series in the window.
    NoData { roles: Vec<PointRole> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VavOutcome {
    pub vav: EntityId,
    pub zone: Option<EntityId>,
    #[serde(flatten)]
    pub status: VavStatus,
}

/// How many VAVs contributed to the aggregate and the compensation factor applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VavCoverage {
    pub available: usize,
    pub total: usize,
    pub scale: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum CalibrationOutcome {
    Fitted(CalibrationResult),
    Skipped { reason: String },
}

/// Everything a single run produced. Owned by the caller of the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub ahu: EntityId,
    /// AHU role bindings, including points no formula consumes.
    pub ahu_points: ResolvedPoints,
    pub plant: Option<EntityId>,
    pub window: AnalysisWindow,
    pub timestamps_ms: Vec<i64>,
    pub powers: Vec<PowerSeries>,
    pub vavs: Vec<VavOutcome>,
    pub coverage: VavCoverage,
    pub calibration: CalibrationOutcome,
}

impl RunReport {
    pub fn power(&self, quantity: Quantity) -> impl Iterator<Item = &PowerSeries> {
        self.powers.iter().filter(move |p| p.quantity == quantity)
    }
}
