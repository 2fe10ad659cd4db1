// Calibrator - Ordinary least squares fit of plant power against estimates
use nalgebra::{DMatrix, DVector};

use crate::domain::calibration::{CalibrationResult, Coefficient};
use crate::domain::error::{MeterError, MeterResult};
use crate::domain::power::AlignedSeries;

/// A named column of the design matrix.
pub struct Predictor<'a> {
    pub name: &'a str,
    pub series: &'a AlignedSeries,
}

impl<'a> Predictor<'a> {
    pub fn new(name: &'a str, series: &'a AlignedSeries) -> Self {
        Self { name, series }
    }
}

/// Fit `response ≈ Σ βᵢ · predictorᵢ` in one batch.
///
/// Every predictor must share the response's grid. No intercept is added implicitly;
/// pass a constant series as one of the predictors to fit one.
pub fn fit(
    response_name: &str,
    response: &AlignedSeries,
    predictors: &[Predictor<'_>],
) -> MeterResult<CalibrationResult> {
    for p in predictors {
        response.ensure_same_grid(p.series, p.name)?;
    }

    let n = response.len();
    let k = predictors.len();
    if k == 0 || n < k {
        return Err(MeterError::InsufficientSamples {
            observations: n,
            predictors: k,
        });
    }

    let x = DMatrix::from_fn(n, k, |row, col| predictors[col].series.values()[row]);
    let y = DVector::from_column_slice(response.values());

    let dependent = || MeterError::SingularDesign {
        what: format!(
            "predictors [{}] are linearly dependent",
            predictors.iter().map(|p| p.name).collect::<Vec<_>>().join(", ")
        ),
    };

    let svd = x.clone().svd(true, true);
    let tolerance = svd.singular_values.max() * n as f64 * f64::EPSILON;
    if svd.rank(tolerance) < k {
        return Err(dependent());
    }
    let beta = svd
        .solve(&y, tolerance)
        .map_err(|e| MeterError::SingularDesign {
            what: e.to_string(),
        })?;
    let xtx_inv = (x.transpose() * &x).try_inverse().ok_or_else(dependent)?;

    let residuals = &y - &x * &beta;
    let rss = residuals.norm_squared();
    let dof = n - k;
    let sigma2 = if dof > 0 { rss / dof as f64 } else { f64::NAN };

    let mean = y.mean();
    let tss: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { f64::NAN };
    let adjusted_r_squared = if dof > 0 {
        1.0 - (1.0 - r_squared) * (n as f64 - 1.0) / dof as f64
    } else {
        f64::NAN
    };

    let coefficients = predictors
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let std_error = (sigma2 * xtx_inv[(i, i)]).sqrt();
            let t_value = beta[i] / std_error;
            let p_value = if dof > 0 && t_value.is_finite() {
                students_t_two_sided(t_value, dof as f64)
            } else {
                f64::NAN
            };
            Coefficient {
                predictor: p.name.to_string(),
                value: beta[i],
                std_error,
                t_value,
                p_value,
            }
        })
        .collect();

    tracing::debug!(
        "Fitted {} on {} predictors over {} observations, rss={:.4e}, r2={:.4}",
        response_name,
        k,
        n,
        rss,
        r_squared
    );

    Ok(CalibrationResult {
        response: response_name.to_string(),
        coefficients,
        observations: n,
        residual_dof: dof,
        residual_sum_of_squares: rss,
        residual_variance: sigma2,
        r_squared,
        adjusted_r_squared,
    })
}

/// P(|T| > |t|) for Student's t with `dof` degrees of freedom.
fn students_t_two_sided(t: f64, dof: f64) -> f64 {
    let x = dof / (dof + t * t);
    regularized_incomplete_beta(0.5 * dof, 0.5, x)
}

fn ln_gamma(x: f64) -> f64 {
    // Lanczos approximation, g = 7.
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut a = COEFFS[0];
    let t = x + 7.5;
    for (i, c) in COEFFS.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();
    // The continued fraction converges fast only on this side of the mean.
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 1e-15;
    const TINY: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    h
}
