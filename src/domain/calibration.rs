// Calibration result domain model
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coefficient {
    pub predictor: String,
    pub value: f64,
    pub std_error: f64,
    pub t_value: f64,
    /// Two-sided p-value of the t statistic. NaN when the residual variance is zero
    /// or there are no residual degrees of freedom.
    pub p_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationResult {
    pub response: String,
    pub coefficients: Vec<Coefficient>,
    pub observations: usize,
    pub residual_dof: usize,
    pub residual_sum_of_squares: f64,
    pub residual_variance: f64,
    pub r_squared: f64,
    pub adjusted_r_squared: f64,
}

impl CalibrationResult {
    pub fn coefficient(&self, predictor: &str) -> Option<f64> {
        self.coefficients
            .iter()
            .find(|c| c.predictor == predictor)
            .map(|c| c.value)
    }
}
