//! Метрики регрессии

use std::fmt;
use std::str::FromStr;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    R2,
    Mae,
    Rmse,
    Mse,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::R2, Metric::Mae, Metric::Rmse, Metric::Mse];

    /// Имя, под которым метрика пишется в трекер
    pub fn name(&self) -> &'static str {
        match self {
            Metric::R2 => "r2_score",
            Metric::Mae => "MAE",
            Metric::Rmse => "RMSE",
            Metric::Mse => "MSE",
        }
    }

    pub fn compute(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
        if y_true.len() != y_pred.len() {
            return Err(PipelineError::ShapeMismatch {
                expected: format!("{} predictions", y_true.len()),
                found: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(PipelineError::EmptyDataset);
        }
        Ok(match self {
            Metric::R2 => r2_score(y_true, y_pred),
            Metric::Mae => mean_absolute_error(y_true, y_pred),
            Metric::Rmse => mean_squared_error(y_true, y_pred).sqrt(),
            Metric::Mse => mean_squared_error(y_true, y_pred),
        })
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "r2" | "r2_score" => Ok(Metric::R2),
            "mae" => Ok(Metric::Mae),
            "rmse" => Ok(Metric::Rmse),
            "mse" => Ok(Metric::Mse),
            other => Err(PipelineError::InvalidStrategy(format!(
                "unknown metric {:?} (expected r2, mae, rmse, mse)",
                other
            ))),
        }
    }
}

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    (y_true - y_pred).mapv(|e| e * e).mean().unwrap_or(0.0)
}

pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    (y_true - y_pred).mapv(f64::abs).mean().unwrap_or(0.0)
}

/// Коэффициент детерминации; для константного y_true: 1 при точном совпадении, иначе 0
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = (y_true - y_pred).mapv(|e| e * e).sum();
    let ss_tot: f64 = y_true.mapv(|v| (v - mean).powi(2)).sum();
    if ss_tot < 1e-12 {
        return if ss_res < 1e-12 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
