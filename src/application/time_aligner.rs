// Time aligner - Resamples raw series onto the shared grid
use crate::domain::power::AlignedSeries;
use crate::domain::telemetry::RawSeries;
use crate::domain::time_grid::TimeGrid;
use std::sync::Arc;

/// Piecewise-linear interpolation of `raw` at every grid timestamp.
///
/// Returns `None` when `raw` has fewer than two distinct timestamps: a single sample
/// carries no slope and is treated like a missing sensor.
///
/// Grid timestamps before the first sample or after the last one take that boundary
/// sample's value (flat extrapolation), the same edge behavior as `numpy.interp`.
pub fn align(raw: &RawSeries, grid: &Arc<TimeGrid>) -> Option<AlignedSeries> {
    if raw.len() < 2 {
        return None;
    }

    let (times, values): (Vec<i64>, Vec<f64>) = raw.points().map(|p| (p.time_ms, p.value)).unzip();
    let last = times.len() - 1;

    let aligned = grid
        .timestamps_ms()
        .iter()
        .map(|&t| {
            if t <= times[0] {
                return values[0];
            }
            if t >= times[last] {
                return values[last];
            }
            // First sample strictly after t; 1..=last because of the edge checks above.
            let hi = times.partition_point(|&x| x <= t);
            let lo = hi - 1;
            if times[lo] == t {
                return values[lo];
            }
            let fraction = (t - times[lo]) as f64 / (times[hi] - times[lo]) as f64;
            values[lo] + fraction * (values[hi] - values[lo])
        })
        .collect();

    // One value per grid timestamp, so the length check cannot fail.
    AlignedSeries::new(grid.clone(), aligned).ok()
}
