//! Линейная регрессия

#![allow(non_snake_case)]

use linfa::traits::Fit;
use linfa::DatasetBase;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::{check_training_data, Regressor};
use crate::error::{PipelineError, Result};

/// Регуляризация для решения при вырожденной матрице признаков
const FALLBACK_ALPHA: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearParams {
    pub fit_intercept: bool,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self { fit_intercept: true }
    }
}

/// Метод наименьших квадратов через linfa-linear
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    fit_intercept: bool,
    weights: Option<Array1<f64>>,
    intercept: f64,
}

impl LinearModel {
    pub fn new(params: LinearParams) -> Self {
        Self {
            fit_intercept: params.fit_intercept,
            weights: None,
            intercept: 0.0,
        }
    }

    pub fn params(&self) -> LinearParams {
        LinearParams {
            fit_intercept: self.fit_intercept,
        }
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.weights.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Default for LinearModel {
    fn default() -> Self {
        Self::new(LinearParams::default())
    }
}

impl Regressor for LinearModel {
    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(X, y)?;

        let dataset = DatasetBase::new(X.to_owned(), y.to_owned());
        let fitted = LinearRegression::new()
            .with_intercept(self.fit_intercept)
            .fit(&dataset)
            .map(|model| (model.params().to_owned(), model.intercept()));

        let (weights, intercept) = match fitted {
            Ok((weights, intercept))
                if weights.iter().all(|w| w.is_finite()) && intercept.is_finite() =>
            {
                (weights, intercept)
            }
            Ok(_) => {
                tracing::warn!("Least squares produced non-finite weights, using ridge solve");
                ridge_fit(X, y, FALLBACK_ALPHA, self.fit_intercept)?
            }
            Err(e) => {
                tracing::warn!("Least squares failed ({}), using ridge solve", e);
                ridge_fit(X, y, FALLBACK_ALPHA, self.fit_intercept)?
            }
        };

        self.weights = Some(weights);
        self.intercept = intercept;
        Ok(())
    }

    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        let weights = self
            .weights
            .as_ref()
            .ok_or(PipelineError::NotFitted("LinearModel"))?;
        if X.ncols() != weights.len() {
            return Err(PipelineError::ShapeMismatch {
                expected: format!("{} features", weights.len()),
                found: format!("{} features", X.ncols()),
            });
        }
        Ok(X.dot(weights) + self.intercept)
    }
}

/// Ridge Regression: (X^T X + αI)^(-1) X^T y по центрированным данным
pub(crate) fn ridge_fit(
    X: &Array2<f64>,
    y: &Array1<f64>,
    alpha: f64,
    fit_intercept: bool,
) -> Result<(Array1<f64>, f64)> {
    let n_features = X.ncols();

    let (x_mean, y_mean) = if fit_intercept {
        (
            X.mean_axis(Axis(0)).ok_or(PipelineError::EmptyDataset)?,
            y.mean().unwrap_or(0.0),
        )
    } else {
        (Array1::zeros(n_features), 0.0)
    };
    let Xc = X - &x_mean;
    let yc = y - y_mean;

    let mut xtx = Xc.t().dot(&Xc);
    for i in 0..n_features {
        xtx[[i, i]] += alpha;
    }
    let xty = Xc.t().dot(&yc);

    let weights = solve_linear_system(&xtx, &xty)?;
    let intercept = y_mean - x_mean.dot(&weights);
    Ok((weights, intercept))
}

/// Метод Гаусса с выбором главного элемента
fn solve_linear_system(A: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = A.nrows();
    let mut augmented = Array2::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            augmented[[i, j]] = A[[i, j]];
        }
        augmented[[i, n]] = b[i];
    }

    // Прямой ход
    for i in 0..n {
        let mut max_row = i;
        let mut max_val = augmented[[i, i]].abs();
        for k in (i + 1)..n {
            if augmented[[k, i]].abs() > max_val {
                max_val = augmented[[k, i]].abs();
                max_row = k;
            }
        }

        if max_row != i {
            for j in 0..=n {
                augmented.swap([i, j], [max_row, j]);
            }
        }

        let pivot = augmented[[i, i]];
        if pivot.abs() < 1e-12 {
            return Err(PipelineError::Training("singular matrix".to_string()));
        }

        for k in (i + 1)..n {
            let factor = augmented[[k, i]] / pivot;
            for j in i..=n {
                augmented[[k, j]] -= factor * augmented[[i, j]];
            }
        }
    }

    // Обратный ход
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = augmented[[i, n]];
        for j in (i + 1)..n {
            sum -= augmented[[i, j]] * x[j];
        }
        x[i] = sum / augmented[[i, i]];
    }

    Ok(x)
}
