//! Обучение модели выбранного семейства с логированием в трекер

#![allow(non_snake_case)]

use ndarray::{Array1, Array2};

use super::ensemble::StackingRegressor;
use super::linear::LinearModel;
use super::search::{linear_candidates, stacking_candidates, GridSearch};
use super::{Model, ModelKind, Regressor};
use crate::config::TrainingConfig;
use crate::error::{PipelineError, Result};
use crate::metrics::{mean_squared_error, r2_score};
use crate::tracking::{Run, RunStatus, Tracker};

#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub run_id: String,
    pub model: Model,
    pub best_cv_score: f64,
}

pub struct ModelTrainer<'a> {
    config: &'a TrainingConfig,
    tracker: &'a Tracker,
}

impl<'a> ModelTrainer<'a> {
    pub fn new(config: &'a TrainingConfig, tracker: &'a Tracker) -> Self {
        Self { config, tracker }
    }

    /// Поиск по сетке, логирование параметров, метрик и модели.
    /// Возвращает идентификатор запуска.
    pub fn train(&self, kind: ModelKind, X: &Array2<f64>, y: &Array1<f64>) -> Result<TrainedModel> {
        tracing::info!("Training {} model on {} rows x {} features", kind, X.nrows(), X.ncols());

        let mut run = self.tracker.start_run(kind.run_name())?;
        match self.train_in_run(&mut run, kind, X, y) {
            Ok((model, best_cv_score)) => {
                let record = run.finish(RunStatus::Finished)?;
                tracing::info!("Run {} finished, best cv score {:.6}", record.run_id, best_cv_score);
                Ok(TrainedModel {
                    run_id: record.run_id,
                    model,
                    best_cv_score,
                })
            }
            Err(e) => {
                tracing::error!("Training {} model failed: {}", kind, e);
                Err(abandon_run(run, e))
            }
        }
    }

    fn train_in_run(&self, run: &mut Run, kind: ModelKind, X: &Array2<f64>, y: &Array1<f64>) -> Result<(Model, f64)> {
        let config = self.config;
        run.log_param("model", kind)?;
        run.log_param("cv", config.cv_folds)?;
        run.log_param("scoring", config.scoring)?;
        run.log_param("n_samples", X.nrows())?;
        run.log_param("n_features", X.ncols())?;

        let search = GridSearch::new(config.cv_folds, config.scoring);
        let (model, best_score) = match kind {
            ModelKind::Linear => {
                let result = search.fit(X, y, &linear_candidates(&config.linear_grid), |p| {
                    Model::Linear(LinearModel::new(*p))
                })?;
                run.log_param("fit_intercept", result.best_params.fit_intercept)?;
                run.log_param("n_candidates", result.candidates.len())?;
                (result.best_model, result.best_score)
            }
            ModelKind::Stacking => {
                run.log_param("stacking_cv", config.stacking_cv)?;
                run.log_param("learning_rate", config.learning_rate)?;
                run.log_param("passthrough", true)?;
                let result = search.fit(X, y, &stacking_candidates(&config.stacking_grid), |p| {
                    Model::Stacking(StackingRegressor::new(
                        *p,
                        config.stacking_cv,
                        config.learning_rate,
                        config.seed,
                    ))
                })?;
                let best = result.best_params;
                run.log_param("rf__n_estimators", best.rf_n_estimators)?;
                run.log_param("rf__max_depth", best.rf_max_depth)?;
                run.log_param("gb__n_estimators", best.gb_n_estimators)?;
                run.log_param("gb__max_depth", best.gb_max_depth)?;
                run.log_param("n_candidates", result.candidates.len())?;
                (result.best_model, result.best_score)
            }
        };

        let train_pred = model.predict(X)?;
        run.log_metric("best_cv_score", best_score)?;
        run.log_metric("training_r2_score", r2_score(y, &train_pred))?;
        run.log_metric("training_mean_squared_error", mean_squared_error(y, &train_pred))?;
        run.log_model(&model)?;

        Ok((model, best_score))
    }
}

/// Помечает запуск неудачным; наружу уходит ошибка обучения, а не ошибка записи статуса
fn abandon_run(run: Run, error: PipelineError) -> PipelineError {
    let run_id = run.id().to_string();
    if let Err(finish_error) = run.finish(RunStatus::Failed) {
        tracing::warn!("Could not mark run {} as failed: {}", run_id, finish_error);
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LinearGrid, StackingGrid};
    use crate::models::search::Scoring;
    use crate::tracking::TrackingConfig;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn data() -> (Array2<f64>, Array1<f64>) {
        let mut rng = StdRng::seed_from_u64(11);
        let X = Array2::from_shape_fn((40, 2), |_| rng.gen_range(-1.0..1.0));
        let y = X.column(0).mapv(|v| 2.0 * v) - X.column(1).mapv(|v| v * v) + 0.5;
        (X, y)
    }

    fn config() -> TrainingConfig {
        TrainingConfig {
            cv_folds: 3,
            linear_grid: LinearGrid {
                fit_intercept: vec![true],
            },
            stacking_grid: StackingGrid {
                rf_n_estimators: vec![5],
                gb_n_estimators: vec![10],
                rf_max_depth: vec![3],
                gb_max_depth: vec![2, 3],
            },
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_training_logs_run() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::new(TrackingConfig {
            root: dir.path().to_path_buf(),
            experiment: "House Price Prediction".to_string(),
        });
        let config = config();
        let (X, y) = data();

        let trained = ModelTrainer::new(&config, &tracker)
            .train(ModelKind::Stacking, &X, &y)
            .unwrap();
        assert_eq!(trained.model.kind(), ModelKind::Stacking);

        let run = tracker.open_run(&trained.run_id).unwrap();
        let record = run.record();
        assert_eq!(record.status, RunStatus::Finished);
        assert_eq!(record.name, "StackingRegressorModel");
        assert_eq!(record.params["scoring"], "neg_mean_squared_error");
        assert_eq!(record.params["n_candidates"], "2");
        assert_eq!(record.metrics["best_cv_score"], trained.best_cv_score);
        assert!(record.metrics.contains_key("training_r2_score"));

        assert_eq!(tracker.load_model(&trained.run_id).unwrap(), trained.model);
    }

    #[test]
    fn test_failed_training_marks_run() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::new(TrackingConfig {
            root: dir.path().to_path_buf(),
            experiment: "exp".to_string(),
        });
        let config = TrainingConfig {
            cv_folds: 50,
            scoring: Scoring::R2,
            ..config()
        };
        let (X, y) = data();

        let err = ModelTrainer::new(&config, &tracker)
            .train(ModelKind::Linear, &X, &y)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Training(_)));

        let runs: Vec<_> = std::fs::read_dir(dir.path().join("exp"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(runs.len(), 1);
        assert_eq!(tracker.open_run(&runs[0]).unwrap().record().status, RunStatus::Failed);
    }

    #[test]
    fn test_failed_status_write_keeps_training_error() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::new(TrackingConfig {
            root: dir.path().to_path_buf(),
            experiment: "exp".to_string(),
        });
        let run = tracker.start_run("LinearRegressionModel").unwrap();

        // Каталог запуска подменён файлом: run.json больше не записать
        let run_dir = dir.path().join("exp").join(run.id());
        std::fs::remove_dir_all(&run_dir).unwrap();
        std::fs::write(&run_dir, "").unwrap();

        let err = abandon_run(run, PipelineError::Training("singular fold".to_string()));
        assert!(matches!(err, PipelineError::Training(msg) if msg == "singular fold"));
    }
}
