//! ML модели

#![allow(non_snake_case)]

pub mod ensemble;
pub mod evaluation;
pub mod linear;
pub mod search;
pub mod training;
pub mod tree;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::artifacts::{read_json, write_json};
use crate::error::{PipelineError, Result};

pub use ensemble::{GradientBoosting, RandomForest, StackingParams, StackingRegressor};
pub use evaluation::{EvaluationReport, Evaluator};
pub use linear::{LinearModel, LinearParams};
pub use search::{GridSearch, Scoring, SearchResult};
pub use training::{ModelTrainer, TrainedModel};
pub use tree::RegressionTree;

/// Общий контракт регрессоров
pub trait Regressor {
    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()>;
    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>>;
}

/// Семейство моделей, выбираемое по имени
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Linear,
    Stacking,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Linear, ModelKind::Stacking];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Linear => "linear",
            ModelKind::Stacking => "stacking",
        }
    }

    /// Имя модели в реестре
    pub fn registry_name(&self) -> &'static str {
        match self {
            ModelKind::Linear => "linear-model",
            ModelKind::Stacking => "stacking-model",
        }
    }

    pub fn run_name(&self) -> &'static str {
        match self {
            ModelKind::Linear => "LinearRegressionModel",
            ModelKind::Stacking => "StackingRegressorModel",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(ModelKind::Linear),
            "stacking" => Ok(ModelKind::Stacking),
            other => Err(PipelineError::InvalidModel(other.to_string())),
        }
    }
}

/// Обученная модель любого семейства в сериализуемом виде
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Model {
    Linear(LinearModel),
    Stacking(StackingRegressor),
}

impl Model {
    pub fn kind(&self) -> ModelKind {
        match self {
            Model::Linear(_) => ModelKind::Linear,
            Model::Stacking(_) => ModelKind::Stacking,
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_json(path, self)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path)
    }
}

impl Regressor for Model {
    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Model::Linear(model) => model.fit(X, y),
            Model::Stacking(model) => model.fit(X, y),
        }
    }

    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Model::Linear(model) => model.predict(X),
            Model::Stacking(model) => model.predict(X),
        }
    }
}

/// Проверка согласованности X и y перед обучением
pub(crate) fn check_training_data(X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if X.nrows() == 0 {
        return Err(PipelineError::EmptyDataset);
    }
    if X.nrows() != y.len() {
        return Err(PipelineError::ShapeMismatch {
            expected: format!("{} targets", X.nrows()),
            found: format!("{} targets", y.len()),
        });
    }
    Ok(())
}
