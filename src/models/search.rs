//! Поиск гиперпараметров по сетке с k-fold кросс-валидацией

#![allow(non_snake_case)]

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::ensemble::StackingParams;
use super::linear::LinearParams;
use super::{Model, Regressor};
use crate::config::{LinearGrid, StackingGrid};
use crate::error::{PipelineError, Result};
use crate::metrics::{mean_absolute_error, mean_squared_error, r2_score};

/// Критерий отбора; чем больше значение, тем лучше
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scoring {
    #[default]
    NegMeanSquaredError,
    NegMeanAbsoluteError,
    R2,
}

impl Scoring {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scoring::NegMeanSquaredError => "neg_mean_squared_error",
            Scoring::NegMeanAbsoluteError => "neg_mean_absolute_error",
            Scoring::R2 => "r2",
        }
    }

    pub fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        match self {
            Scoring::NegMeanSquaredError => -mean_squared_error(y_true, y_pred),
            Scoring::NegMeanAbsoluteError => -mean_absolute_error(y_true, y_pred),
            Scoring::R2 => r2_score(y_true, y_pred),
        }
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scoring {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "neg_mean_squared_error" => Ok(Scoring::NegMeanSquaredError),
            "neg_mean_absolute_error" => Ok(Scoring::NegMeanAbsoluteError),
            "r2" => Ok(Scoring::R2),
            "accuracy" | "balanced_accuracy" | "f1" | "precision" | "recall" | "roc_auc" => {
                Err(PipelineError::InvalidScoring(format!(
                    "{} is a classification metric and cannot score a regressor",
                    s
                )))
            }
            other => Err(PipelineError::InvalidScoring(format!(
                "unknown scoring {:?} (expected neg_mean_squared_error, neg_mean_absolute_error, r2)",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Scoring {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Scoring> for String {
    fn from(value: Scoring) -> Self {
        value.as_str().to_string()
    }
}

/// Разбиение 0..n на k последовательных фолдов без перемешивания.
/// Первые n % k фолдов на одну строку длиннее.
pub fn kfold_indices(n_samples: usize, k: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
    if k < 2 || k > n_samples {
        return Err(PipelineError::Training(format!(
            "cannot split {} samples into {} folds",
            n_samples, k
        )));
    }

    let base = n_samples / k;
    let extra = n_samples % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let valid: Vec<usize> = (start..start + size).collect();
        let train: Vec<usize> = (0..start).chain(start + size..n_samples).collect();
        folds.push((train, valid));
        start += size;
    }
    Ok(folds)
}

pub fn linear_candidates(grid: &LinearGrid) -> Vec<LinearParams> {
    grid.fit_intercept
        .iter()
        .map(|&fit_intercept| LinearParams { fit_intercept })
        .collect()
}

/// Декартово произведение сетки стекинга
pub fn stacking_candidates(grid: &StackingGrid) -> Vec<StackingParams> {
    let mut candidates = Vec::new();
    for &rf_n_estimators in &grid.rf_n_estimators {
        for &gb_n_estimators in &grid.gb_n_estimators {
            for &rf_max_depth in &grid.rf_max_depth {
                for &gb_max_depth in &grid.gb_max_depth {
                    candidates.push(StackingParams {
                        rf_n_estimators,
                        rf_max_depth,
                        gb_n_estimators,
                        gb_max_depth,
                    });
                }
            }
        }
    }
    candidates
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore<P> {
    pub params: P,
    pub mean_score: f64,
    pub fold_scores: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct SearchResult<P> {
    pub best_params: P,
    pub best_score: f64,
    pub best_model: Model,
    pub candidates: Vec<CandidateScore<P>>,
}

#[derive(Debug, Clone, Copy)]
pub struct GridSearch {
    cv: usize,
    scoring: Scoring,
}

impl GridSearch {
    pub fn new(cv: usize, scoring: Scoring) -> Self {
        Self { cv, scoring }
    }

    /// Оценивает каждого кандидата по фолдам, лучший переобучается на всех данных.
    /// При равенстве счёта побеждает кандидат, идущий раньше в сетке.
    pub fn fit<P, F>(&self, X: &Array2<f64>, y: &Array1<f64>, candidates: &[P], build: F) -> Result<SearchResult<P>>
    where
        P: Clone + fmt::Debug,
        F: Fn(&P) -> Model,
    {
        if candidates.is_empty() {
            return Err(PipelineError::Training("empty parameter grid".to_string()));
        }
        let folds = kfold_indices(X.nrows(), self.cv)?;

        let mut scored = Vec::with_capacity(candidates.len());
        for params in candidates {
            let mut fold_scores = Vec::with_capacity(folds.len());
            for (train_idx, valid_idx) in &folds {
                let mut model = build(params);
                model.fit(&X.select(Axis(0), train_idx), &y.select(Axis(0), train_idx))?;
                let pred = model.predict(&X.select(Axis(0), valid_idx))?;
                fold_scores.push(self.scoring.score(&y.select(Axis(0), valid_idx), &pred));
            }
            let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
            tracing::debug!("{:?}: mean {} = {:.6}", params, self.scoring, mean_score);
            scored.push(CandidateScore {
                params: params.clone(),
                mean_score,
                fold_scores,
            });
        }

        let best = best_index(scored.iter().map(|c| c.mean_score)).ok_or_else(|| {
            PipelineError::Training("no candidate produced a finite cross-validation score".to_string())
        })?;

        let best_params = scored[best].params.clone();
        let best_score = scored[best].mean_score;
        let mut best_model = build(&best_params);
        best_model.fit(X, y)?;

        tracing::info!(
            "Grid search over {} candidates ({} folds): best {} = {:.6} with {:?}",
            candidates.len(),
            self.cv,
            self.scoring,
            best_score,
            best_params
        );

        Ok(SearchResult {
            best_params,
            best_score,
            best_model,
            candidates: scored,
        })
    }
}

/// Индекс наибольшего конечного счёта; NaN и бесконечности пропускаются,
/// при равенстве побеждает более ранний
fn best_index(scores: impl IntoIterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, score) in scores.into_iter().enumerate() {
        if !score.is_finite() {
            continue;
        }
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}
