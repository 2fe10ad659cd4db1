// Aligned series and the power estimates derived from them
use serde::Serialize;
use std::sync::Arc;

use super::equipment::EntityId;
use super::error::{MeterError, MeterResult};
use super::time_grid::TimeGrid;

/// Values positionally indexed against a shared `TimeGrid`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSeries {
    grid: Arc<TimeGrid>,
    values: Vec<f64>,
}

impl AlignedSeries {
    pub fn new(grid: Arc<TimeGrid>, values: Vec<f64>) -> MeterResult<Self> {
        if values.len() != grid.len() {
            return Err(MeterError::ShapeMismatch {
                what: "aligned series".to_string(),
                expected: grid.len(),
                found: values.len(),
            });
        }
        Ok(Self { grid, values })
    }

    pub fn constant(grid: Arc<TimeGrid>, value: f64) -> Self {
        let values = vec![value; grid.len()];
        Self { grid, values }
    }

    pub fn grid(&self) -> &Arc<TimeGrid> {
        &self.grid
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn shares_grid(&self, other: &AlignedSeries) -> bool {
        Arc::ptr_eq(&self.grid, &other.grid) || self.grid == other.grid
    }

    /// Fails with `ShapeMismatch` unless `other` lives on the same grid.
    pub fn ensure_same_grid(&self, other: &AlignedSeries, what: &str) -> MeterResult<()> {
        if self.shares_grid(other) {
            Ok(())
        } else {
            Err(MeterError::ShapeMismatch {
                what: what.to_string(),
                expected: self.len(),
                found: other.len(),
            })
        }
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            grid: self.grid.clone(),
            values: self.values.iter().map(|&v| f(v)).collect(),
        }
    }

    pub fn zip_with(
        &self,
        other: &AlignedSeries,
        what: &str,
        f: impl Fn(f64, f64) -> f64,
    ) -> MeterResult<Self> {
        self.ensure_same_grid(other, what)?;
        Ok(Self {
            grid: self.grid.clone(),
            values: self
                .values
                .iter()
                .zip(&other.values)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    AhuCoolingPower,
    AhuReturnedPower,
    VavCoolingPower,
    AggregatedVavCoolingPower,
    PlantThermalPower,
}

/// An aligned series tagged with the node and physical quantity that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerSeries {
    pub node: EntityId,
    pub quantity: Quantity,
    #[serde(rename = "values", serialize_with = "serialize_values")]
    pub series: AlignedSeries,
}

impl PowerSeries {
    pub fn new(node: EntityId, quantity: Quantity, series: AlignedSeries) -> Self {
        Self {
            node,
            quantity,
            series,
        }
    }
}

fn serialize_values<S: serde::Serializer>(series: &AlignedSeries, s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(series.values())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::time_grid::AnalysisWindow;
    use chrono::{Duration, TimeZone, Utc};

    fn grid(points: i64) -> Arc<TimeGrid> {
        let begin = Utc.with_ymd_and_hms(2018, 4, 6, 0, 0, 0).unwrap();
        let window = AnalysisWindow::new(
            begin,
            begin + Duration::minutes(5 * (points - 1)),
            Duration::minutes(5),
        )
        .unwrap();
        Arc::new(TimeGrid::new(&window))
    }

    #[test]
    fn test_length_must_match_grid() {
        let result = AlignedSeries::new(grid(3), vec![1.0, 2.0]);
        assert!(matches!(
            result,
            Err(MeterError::ShapeMismatch {
                expected: 3,
                found: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_equal_grids_from_separate_allocations_are_shared() {
        let a = AlignedSeries::constant(grid(3), 1.0);
        let b = AlignedSeries::constant(grid(3), 2.0);
        let sum = a.zip_with(&b, "sum", |x, y| x + y).unwrap();
        assert_eq!(sum.values(), &[3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_different_grids_rejected() {
        let a = AlignedSeries::constant(grid(3), 1.0);
        let b = AlignedSeries::constant(grid(4), 1.0);
        assert!(a.zip_with(&b, "sum", |x, y| x + y).is_err());
    }
}
