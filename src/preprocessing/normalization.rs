//! Нормализация данных: коррекция асимметрии и робастное масштабирование

#![allow(non_snake_case)]

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Границы поиска λ для преобразования Йео-Джонсона
const LAMBDA_BOUNDS: (f64, f64) = (-5.0, 5.0);
const LAMBDA_TOLERANCE: f64 = 1e-6;

fn check_columns(expected: usize, X: &Array2<f64>) -> Result<()> {
    if X.ncols() != expected {
        return Err(PipelineError::ShapeMismatch {
            expected: format!("{} columns", expected),
            found: format!("{} columns", X.ncols()),
        });
    }
    Ok(())
}

/// Степенное преобразование Йео-Джонсона с последующей стандартизацией.
///
/// λ для каждой колонки подбирается максимизацией логарифма правдоподобия
/// на обучающих данных; при `transform` используются только сохранённые λ,
/// среднее и стандартное отклонение.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerTransformer {
    standardize: bool,
    lambdas: Option<Array1<f64>>,
    mean: Option<Array1<f64>>,
    std: Option<Array1<f64>>,
}

impl PowerTransformer {
    pub fn new() -> Self {
        Self {
            standardize: true,
            lambdas: None,
            mean: None,
            std: None,
        }
    }

    pub fn without_standardize() -> Self {
        Self {
            standardize: false,
            ..Self::new()
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.lambdas.is_some()
    }

    pub fn lambdas(&self) -> Option<&Array1<f64>> {
        self.lambdas.as_ref()
    }

    pub fn fit(&mut self, X: &Array2<f64>) -> Result<()> {
        if X.nrows() == 0 {
            return Err(PipelineError::EmptyDataset);
        }

        let lambdas: Array1<f64> = X.columns().into_iter().map(optimal_lambda).collect();
        let transformed = apply_yeo_johnson(X, &lambdas);

        if self.standardize {
            let mean = transformed
                .mean_axis(Axis(0))
                .ok_or(PipelineError::EmptyDataset)?;
            let mut std = transformed.std_axis(Axis(0), 0.0);
            // Избегаем деления на ноль
            for val in std.iter_mut() {
                if *val < 1e-10 {
                    *val = 1.0;
                }
            }
            self.mean = Some(mean);
            self.std = Some(std);
        }

        self.lambdas = Some(lambdas);
        Ok(())
    }

    pub fn transform(&self, X: &Array2<f64>) -> Result<Array2<f64>> {
        let lambdas = self
            .lambdas
            .as_ref()
            .ok_or(PipelineError::NotFitted("PowerTransformer"))?;
        check_columns(lambdas.len(), X)?;

        let mut transformed = apply_yeo_johnson(X, lambdas);
        if let (Some(mean), Some(std)) = (&self.mean, &self.std) {
            for mut row in transformed.rows_mut() {
                for (i, val) in row.iter_mut().enumerate() {
                    *val = (*val - mean[i]) / std[i];
                }
            }
        }
        Ok(transformed)
    }

    pub fn inverse_transform(&self, X: &Array2<f64>) -> Result<Array2<f64>> {
        let lambdas = self
            .lambdas
            .as_ref()
            .ok_or(PipelineError::NotFitted("PowerTransformer"))?;
        check_columns(lambdas.len(), X)?;

        let mut restored = X.clone();
        for mut row in restored.rows_mut() {
            for (i, val) in row.iter_mut().enumerate() {
                let mut y = *val;
                if let (Some(mean), Some(std)) = (&self.mean, &self.std) {
                    y = y * std[i] + mean[i];
                }
                *val = yeo_johnson_inverse(y, lambdas[i]);
            }
        }
        Ok(restored)
    }

    pub fn fit_transform(&mut self, X: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(X)?;
        self.transform(X)
    }
}

impl Default for PowerTransformer {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_yeo_johnson(X: &Array2<f64>, lambdas: &Array1<f64>) -> Array2<f64> {
    let mut transformed = X.clone();
    for mut row in transformed.rows_mut() {
        for (i, val) in row.iter_mut().enumerate() {
            *val = yeo_johnson(*val, lambdas[i]);
        }
    }
    transformed
}

pub(crate) fn yeo_johnson(x: f64, lambda: f64) -> f64 {
    if x >= 0.0 {
        if lambda.abs() < f64::EPSILON {
            x.ln_1p()
        } else {
            ((x + 1.0).powf(lambda) - 1.0) / lambda
        }
    } else if (lambda - 2.0).abs() < f64::EPSILON {
        -(-x).ln_1p()
    } else {
        -((1.0 - x).powf(2.0 - lambda) - 1.0) / (2.0 - lambda)
    }
}

pub(crate) fn yeo_johnson_inverse(y: f64, lambda: f64) -> f64 {
    if y >= 0.0 {
        if lambda.abs() < f64::EPSILON {
            y.exp_m1()
        } else {
            (y * lambda + 1.0).powf(1.0 / lambda) - 1.0
        }
    } else if (lambda - 2.0).abs() < f64::EPSILON {
        -(-y).exp_m1()
    } else {
        1.0 - (-(2.0 - lambda) * y + 1.0).powf(1.0 / (2.0 - lambda))
    }
}

fn log_likelihood(column: &ArrayView1<f64>, lambda: f64) -> f64 {
    let n = column.len() as f64;
    let transformed: Vec<f64> = column.iter().map(|&x| yeo_johnson(x, lambda)).collect();
    let mean = transformed.iter().sum::<f64>() / n;
    let variance = transformed.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n;
    if !(variance > 0.0) || !variance.is_finite() {
        return f64::NEG_INFINITY;
    }
    let jacobian: f64 = column.iter().map(|&x| x.signum() * x.abs().ln_1p()).sum();
    -n / 2.0 * variance.ln() + (lambda - 1.0) * jacobian
}

/// Поиск λ методом золотого сечения
fn optimal_lambda(column: ArrayView1<f64>) -> f64 {
    let min = column.iter().copied().fold(f64::INFINITY, f64::min);
    let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // Константная колонка: преобразование не нужно
    if (max - min).abs() < 1e-12 {
        return 1.0;
    }

    let ratio = (5f64.sqrt() - 1.0) / 2.0;
    let (mut a, mut b) = LAMBDA_BOUNDS;
    let mut c = b - ratio * (b - a);
    let mut d = a + ratio * (b - a);
    let mut fc = log_likelihood(&column, c);
    let mut fd = log_likelihood(&column, d);

    while (b - a).abs() > LAMBDA_TOLERANCE {
        if fc > fd {
            b = d;
            d = c;
            fd = fc;
            c = b - ratio * (b - a);
            fc = log_likelihood(&column, c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + ratio * (b - a);
            fd = log_likelihood(&column, d);
        }
    }

    (a + b) / 2.0
}

/// Масштабирование, устойчивое к выбросам: (x - медиана) / IQR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustScaler {
    center: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl RobustScaler {
    pub fn new() -> Self {
        Self {
            center: None,
            scale: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.center.is_some()
    }

    pub fn center(&self) -> Option<&Array1<f64>> {
        self.center.as_ref()
    }

    pub fn scale(&self) -> Option<&Array1<f64>> {
        self.scale.as_ref()
    }

    pub fn fit(&mut self, X: &Array2<f64>) -> Result<()> {
        if X.nrows() == 0 {
            return Err(PipelineError::EmptyDataset);
        }

        let mut center = Array1::zeros(X.ncols());
        let mut scale = Array1::zeros(X.ncols());
        for (i, column) in X.columns().into_iter().enumerate() {
            let mut sorted: Vec<f64> = column.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            center[i] = percentile(&sorted, 50.0);
            let iqr = percentile(&sorted, 75.0) - percentile(&sorted, 25.0);
            scale[i] = if iqr.abs() < 1e-10 { 1.0 } else { iqr };
        }

        self.center = Some(center);
        self.scale = Some(scale);
        Ok(())
    }

    pub fn transform(&self, X: &Array2<f64>) -> Result<Array2<f64>> {
        let (center, scale) = self.params()?;
        check_columns(center.len(), X)?;

        let mut scaled = X.clone();
        for mut row in scaled.rows_mut() {
            for (i, val) in row.iter_mut().enumerate() {
                *val = (*val - center[i]) / scale[i];
            }
        }
        Ok(scaled)
    }

    pub fn inverse_transform(&self, X: &Array2<f64>) -> Result<Array2<f64>> {
        let (center, scale) = self.params()?;
        check_columns(center.len(), X)?;

        let mut restored = X.clone();
        for mut row in restored.rows_mut() {
            for (i, val) in row.iter_mut().enumerate() {
                *val = *val * scale[i] + center[i];
            }
        }
        Ok(restored)
    }

    pub fn fit_transform(&mut self, X: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(X)?;
        self.transform(X)
    }

    fn params(&self) -> Result<(&Array1<f64>, &Array1<f64>)> {
        match (&self.center, &self.scale) {
            (Some(center), Some(scale)) => Ok((center, scale)),
            _ => Err(PipelineError::NotFitted("RobustScaler")),
        }
    }
}

impl Default for RobustScaler {
    fn default() -> Self {
        Self::new()
    }
}

/// Перцентиль с линейной интерполяцией по отсортированным значениям
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
