//! Ансамбли деревьев и стекинг

#![allow(non_snake_case)]

use ndarray::{concatenate, Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::linear::LinearModel;
use super::search::kfold_indices;
use super::tree::RegressionTree;
use super::{check_training_data, Regressor};
use crate::error::{PipelineError, Result};

const MIN_SAMPLES_SPLIT: usize = 2;

/// Случайный лес: деревья на бутстреп-выборках, предсказание усредняется
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_estimators: usize,
    max_depth: usize,
    seed: u64,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn new(n_estimators: usize, max_depth: usize, seed: u64) -> Self {
        Self {
            n_estimators,
            max_depth,
            seed,
            trees: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(X, y)?;
        if self.n_estimators == 0 {
            return Err(PipelineError::Training("random forest needs at least one tree".to_string()));
        }

        let n = X.nrows();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trees = Vec::with_capacity(self.n_estimators);
        for _ in 0..self.n_estimators {
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let X_boot = X.select(Axis(0), &sample);
            let y_boot = y.select(Axis(0), &sample);

            let mut tree = RegressionTree::new(self.max_depth, MIN_SAMPLES_SPLIT);
            tree.fit(&X_boot, &y_boot)?;
            trees.push(tree);
        }

        self.trees = trees;
        Ok(())
    }

    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::NotFitted("RandomForest"));
        }
        let mut sum = Array1::zeros(X.nrows());
        for tree in &self.trees {
            sum += &tree.predict(X)?;
        }
        Ok(sum / self.trees.len() as f64)
    }
}

/// Градиентный бустинг с квадратичной функцией потерь
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    n_estimators: usize,
    max_depth: usize,
    learning_rate: f64,
    init: Option<f64>,
    trees: Vec<RegressionTree>,
}

impl GradientBoosting {
    pub fn new(n_estimators: usize, max_depth: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            max_depth,
            learning_rate,
            init: None,
            trees: Vec::new(),
        }
    }
}

impl Regressor for GradientBoosting {
    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(X, y)?;
        if !(self.learning_rate > 0.0) {
            return Err(PipelineError::Training(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }

        // Начальное приближение: среднее цели
        let init = y.mean().ok_or(PipelineError::EmptyDataset)?;
        let mut current = Array1::from_elem(y.len(), init);
        let mut trees = Vec::with_capacity(self.n_estimators);

        for _ in 0..self.n_estimators {
            let residuals = y - &current;
            let mut tree = RegressionTree::new(self.max_depth, MIN_SAMPLES_SPLIT);
            tree.fit(X, &residuals)?;
            current.scaled_add(self.learning_rate, &tree.predict(X)?);
            trees.push(tree);
        }

        self.init = Some(init);
        self.trees = trees;
        Ok(())
    }

    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        let init = self.init.ok_or(PipelineError::NotFitted("GradientBoosting"))?;
        let mut prediction = Array1::from_elem(X.nrows(), init);
        for tree in &self.trees {
            prediction.scaled_add(self.learning_rate, &tree.predict(X)?);
        }
        Ok(prediction)
    }
}

/// Гиперпараметры стекинга, перебираемые поиском по сетке
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackingParams {
    pub rf_n_estimators: usize,
    pub rf_max_depth: usize,
    pub gb_n_estimators: usize,
    pub gb_max_depth: usize,
}

/// Стекинг: лес и бустинг -> линейная мета-модель.
///
/// Мета-модель обучается на out-of-fold предсказаниях базовых моделей
/// (внутренняя k-fold валидация) и исходных признаках; затем базовые модели
/// переобучаются на всех строках.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackingRegressor {
    params: StackingParams,
    cv: usize,
    learning_rate: f64,
    seed: u64,
    passthrough: bool,
    n_features: usize,
    forest: Option<RandomForest>,
    boosting: Option<GradientBoosting>,
    meta: LinearModel,
}

impl StackingRegressor {
    pub fn new(params: StackingParams, cv: usize, learning_rate: f64, seed: u64) -> Self {
        Self {
            params,
            cv,
            learning_rate,
            seed,
            passthrough: true,
            n_features: 0,
            forest: None,
            boosting: None,
            meta: LinearModel::default(),
        }
    }

    pub fn with_passthrough(mut self, passthrough: bool) -> Self {
        self.passthrough = passthrough;
        self
    }

    pub fn params(&self) -> StackingParams {
        self.params
    }

    fn base_learners(&self) -> (RandomForest, GradientBoosting) {
        (
            RandomForest::new(self.params.rf_n_estimators, self.params.rf_max_depth, self.seed),
            GradientBoosting::new(
                self.params.gb_n_estimators,
                self.params.gb_max_depth,
                self.learning_rate,
            ),
        )
    }

    fn meta_features(&self, base: Array2<f64>, X: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.passthrough {
            return Ok(base);
        }
        concatenate(Axis(1), &[base.view(), X.view()]).map_err(|e| PipelineError::ShapeMismatch {
            expected: format!("{} rows", base.nrows()),
            found: e.to_string(),
        })
    }
}

impl Regressor for StackingRegressor {
    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(X, y)?;

        let mut out_of_fold = Array2::zeros((X.nrows(), 2));
        for (train_idx, valid_idx) in kfold_indices(X.nrows(), self.cv)? {
            let X_train = X.select(Axis(0), &train_idx);
            let y_train = y.select(Axis(0), &train_idx);
            let X_valid = X.select(Axis(0), &valid_idx);

            let (mut forest, mut boosting) = self.base_learners();
            forest.fit(&X_train, &y_train)?;
            boosting.fit(&X_train, &y_train)?;

            let forest_pred = forest.predict(&X_valid)?;
            let boosting_pred = boosting.predict(&X_valid)?;
            for (k, &row) in valid_idx.iter().enumerate() {
                out_of_fold[[row, 0]] = forest_pred[k];
                out_of_fold[[row, 1]] = boosting_pred[k];
            }
        }

        let meta_X = self.meta_features(out_of_fold, X)?;
        let mut meta = LinearModel::default();
        meta.fit(&meta_X, y)?;

        let (mut forest, mut boosting) = self.base_learners();
        forest.fit(X, y)?;
        boosting.fit(X, y)?;

        self.n_features = X.ncols();
        self.forest = Some(forest);
        self.boosting = Some(boosting);
        self.meta = meta;
        Ok(())
    }

    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        let (Some(forest), Some(boosting)) = (&self.forest, &self.boosting) else {
            return Err(PipelineError::NotFitted("StackingRegressor"));
        };
        if X.ncols() != self.n_features {
            return Err(PipelineError::ShapeMismatch {
                expected: format!("{} features", self.n_features),
                found: format!("{} features", X.ncols()),
            });
        }

        let base = ndarray::stack(
            Axis(1),
            &[forest.predict(X)?.view(), boosting.predict(X)?.view()],
        )
        .map_err(|e| PipelineError::ShapeMismatch {
            expected: format!("{} rows", X.nrows()),
            found: e.to_string(),
        })?;
        self.meta.predict(&self.meta_features(base, X)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::r2_score;

    fn dataset(n: usize) -> (Array2<f64>, Array1<f64>) {
        let mut rng = StdRng::seed_from_u64(3);
        let X = Array2::from_shape_fn((n, 3), |_| rng.gen_range(-2.0..2.0));
        let y = X
            .rows()
            .into_iter()
            .map(|r| 3.0 * r[0] - 2.0 * r[1] + if r[2] > 0.0 { 1.5 } else { -1.5 })
            .collect();
        (X, y)
    }

    fn small_params() -> StackingParams {
        StackingParams {
            rf_n_estimators: 10,
            rf_max_depth: 4,
            gb_n_estimators: 20,
            gb_max_depth: 3,
        }
    }

    #[test]
    fn test_random_forest_is_seeded() {
        let (X, y) = dataset(60);
        let mut first = RandomForest::new(8, 4, 42);
        let mut second = RandomForest::new(8, 4, 42);
        first.fit(&X, &y).unwrap();
        second.fit(&X, &y).unwrap();

        assert_eq!(first.n_trees(), 8);
        assert_eq!(first.predict(&X).unwrap(), second.predict(&X).unwrap());
    }

    #[test]
    fn test_boosting_reduces_training_error() {
        let (X, y) = dataset(60);
        let mut short = GradientBoosting::new(1, 3, 0.1);
        let mut long = GradientBoosting::new(50, 3, 0.1);
        short.fit(&X, &y).unwrap();
        long.fit(&X, &y).unwrap();

        let r2_short = r2_score(&y, &short.predict(&X).unwrap());
        let r2_long = r2_score(&y, &long.predict(&X).unwrap());
        assert!(r2_long > r2_short);
        assert!(r2_long > 0.8);
    }

    #[test]
    fn test_stacking_fits_and_predicts() {
        let (X, y) = dataset(60);
        let mut model = StackingRegressor::new(small_params(), 3, 0.1, 42);
        model.fit(&X, &y).unwrap();

        let pred = model.predict(&X).unwrap();
        assert_eq!(pred.len(), 60);
        assert!(r2_score(&y, &pred) > 0.8);
    }

    #[test]
    fn test_stacking_needs_enough_rows_for_cv() {
        let (X, y) = dataset(2);
        let mut model = StackingRegressor::new(small_params(), 3, 0.1, 42);
        assert!(model.fit(&X, &y).is_err());
        assert!(matches!(
            StackingRegressor::new(small_params(), 3, 0.1, 42).predict(&X),
            Err(PipelineError::NotFitted(_))
        ));
    }

    #[test]
    fn test_narrower_features_are_rejected() {
        let (X, y) = dataset(30);
        let narrow = X.select(Axis(1), &[0]);

        let mut forest = RandomForest::new(4, 3, 42);
        forest.fit(&X, &y).unwrap();
        assert!(matches!(
            forest.predict(&narrow),
            Err(PipelineError::ShapeMismatch { .. })
        ));

        let mut model = StackingRegressor::new(small_params(), 3, 0.1, 42);
        model.fit(&X, &y).unwrap();
        assert!(matches!(
            model.predict(&narrow),
            Err(PipelineError::ShapeMismatch { .. })
        ));
    }
}
