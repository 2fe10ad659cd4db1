// Aggregator - Combines per-VAV series into AHU-level totals
use crate::domain::error::MeterResult;
use crate::domain::power::AlignedSeries;

/// Result of combining the VAV series under one AHU.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    /// `None` when no VAV had a series.
    pub series: Option<AlignedSeries>,
    pub available: usize,
    pub total: usize,
    /// Factor applied to the raw sum, `total / available`.
    pub scale: Option<f64>,
}

fn sum<'a>(series: impl Iterator<Item = &'a AlignedSeries>) -> MeterResult<Option<AlignedSeries>> {
    let mut acc: Option<AlignedSeries> = None;
    for s in series {
        acc = Some(match acc {
            None => s.clone(),
            Some(total) => total.zip_with(s, "aggregated series", |a, b| a + b)?,
        });
    }
    Ok(acc)
}

/// Elementwise sum of the available series with no compensation. Used for physical
/// totals such as the airflow delivered by an AHU.
pub fn sum_available(series: &[Option<&AlignedSeries>]) -> MeterResult<Option<AlignedSeries>> {
    sum(series.iter().flatten().copied())
}

/// Sum of the available series scaled by `total / available`.
///
/// Missing VAVs are assumed to behave like the average of the observed ones. This is
/// a modeling heuristic, not an accurate estimator: with few reporting VAVs the factor
/// grows large and amplifies whatever the reporting ones show.
pub fn aggregate_with_compensation(series: &[Option<&AlignedSeries>]) -> MeterResult<Aggregate> {
    let total = series.len();
    let available = series.iter().filter(|s| s.is_some()).count();

    if available == 0 {
        return Ok(Aggregate {
            series: None,
            available,
            total,
            scale: None,
        });
    }

    let scale = total as f64 / available as f64;
    let summed = sum_available(series)?;
    let scaled = if available == total {
        summed
    } else {
        summed.map(|s| s.map(|v| v * scale))
    };

    Ok(Aggregate {
        series: scaled,
        available,
        total,
        scale: Some(scale),
    })
}
