//! Single-feature ordinary least squares on closing prices.

use ndarray::Array1;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("feature has zero variance; slope is undefined")]
    DegenerateFeature,

    #[error("dimension mismatch: {features} features vs {targets} targets")]
    DimensionMismatch { features: usize, targets: usize },

    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,
}

/// `target ≈ slope * feature + intercept`, fit by least squares.
#[derive(Debug, Clone, Copy)]
pub struct LinearModel {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearModel {
    pub fn fit(x: &Array1<f64>, y: &Array1<f64>) -> Result<Self, ModelError> {
        if x.len() != y.len() {
            return Err(ModelError::DimensionMismatch {
                features: x.len(),
                targets: y.len(),
            });
        }
        if x.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }

        let x_mean = x.mean().unwrap_or(0.0);
        let y_mean = y.mean().unwrap_or(0.0);

        let var: f64 = x.iter().map(|&xi| (xi - x_mean).powi(2)).sum();
        if var < 1e-12 {
            return Err(ModelError::DegenerateFeature);
        }

        let cov: f64 = x
            .iter()
            .zip(y.iter())
            .map(|(&xi, &yi)| (xi - x_mean) * (yi - y_mean))
            .sum();

        let slope = cov / var;
        let intercept = y_mean - slope * x_mean;

        Ok(Self { slope, intercept })
    }

    pub fn predict(&self, x: &Array1<f64>) -> Array1<f64> {
        x.mapv(|xi| self.slope * xi + self.intercept)
    }

    pub fn predict_one(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Mean of squared residuals, in squared price units.
pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len() as f64;
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| (t - p).powi(2))
        .sum::<f64>()
        / n
}
