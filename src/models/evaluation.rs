//! Оценка зарегистрированной модели на тестовой выборке

#![allow(non_snake_case)]

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use serde::Serialize;

use super::{ModelKind, Regressor};
use crate::error::{PipelineError, Result};
use crate::metrics::Metric;
use crate::tracking::Tracker;

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub run_id: String,
    pub model_name: String,
    pub version: u32,
    pub metrics: BTreeMap<String, f64>,
}

pub struct Evaluator<'a> {
    kind: ModelKind,
    tracker: &'a Tracker,
}

impl<'a> Evaluator<'a> {
    pub fn new(kind: ModelKind, tracker: &'a Tracker) -> Self {
        Self { kind, tracker }
    }

    /// Загружает модель запуска `run_id`, регистрирует её (или берёт
    /// существующую регистрацию) и дописывает выбранные метрики в запуск
    pub fn evaluate(
        &self,
        run_id: &str,
        X_test: &Array2<f64>,
        y_test: &Array1<f64>,
        metrics: &[Metric],
    ) -> Result<EvaluationReport> {
        let model = self.tracker.load_model(run_id)?;
        if model.kind() != self.kind {
            return Err(PipelineError::InvalidModel(format!(
                "run {} holds a {} model, not {}",
                run_id,
                model.kind(),
                self.kind
            )));
        }

        let model_name = self.kind.registry_name();
        let version = self.tracker.register_model(model_name, run_id)?;

        let y_pred = model.predict(X_test)?;
        let mut run = self.tracker.open_run(run_id)?;
        let mut values = BTreeMap::new();
        for metric in metrics {
            let value = metric.compute(y_test, &y_pred)?;
            run.log_metric(metric.name(), value)?;
            tracing::info!("{} v{} {} = {:.6}", model_name, version.version, metric, value);
            values.insert(metric.name().to_string(), value);
        }

        Ok(EvaluationReport {
            run_id: run_id.to_string(),
            model_name: model_name.to_string(),
            version: version.version,
            metrics: values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LinearModel, Model};
    use crate::tracking::{RunStatus, TrackingConfig};
    use ndarray::array;

    fn logged_run(tracker: &Tracker) -> String {
        let mut model = LinearModel::default();
        model
            .fit(&array![[0.0], [1.0], [2.0], [3.0]], &array![1.0, 3.0, 5.0, 7.0])
            .unwrap();
        let mut run = tracker.start_run("LinearRegressionModel").unwrap();
        run.log_model(&Model::Linear(model)).unwrap();
        run.finish(RunStatus::Finished).unwrap().run_id
    }

    #[test]
    fn test_evaluate_logs_selected_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::new(TrackingConfig {
            root: dir.path().to_path_buf(),
            experiment: "exp".to_string(),
        });
        let run_id = logged_run(&tracker);

        let X_test = array![[4.0], [5.0]];
        let y_test = array![9.0, 12.0];
        let report = Evaluator::new(ModelKind::Linear, &tracker)
            .evaluate(&run_id, &X_test, &y_test, &[Metric::Mse, Metric::Mae])
            .unwrap();

        assert_eq!(report.version, 1);
        assert_eq!(report.metrics.len(), 2);
        assert!((report.metrics["MSE"] - 0.5).abs() < 1e-6);
        assert!((report.metrics["MAE"] - 0.5).abs() < 1e-6);

        let record = tracker.open_run(&run_id).unwrap().record().clone();
        assert!(record.metrics.contains_key("MSE"));
        assert!(!record.metrics.contains_key("r2_score"));

        // Повторная оценка использует ту же регистрацию
        let again = Evaluator::new(ModelKind::Linear, &tracker)
            .evaluate(&run_id, &X_test, &y_test, &Metric::ALL)
            .unwrap();
        assert_eq!(again.version, 1);
        assert_eq!(again.metrics.len(), 4);
    }

    #[test]
    fn test_evaluate_errors() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::new(TrackingConfig {
            root: dir.path().to_path_buf(),
            experiment: "exp".to_string(),
        });
        let run_id = logged_run(&tracker);
        let X = array![[1.0]];
        let y = array![3.0];

        assert!(matches!(
            Evaluator::new(ModelKind::Stacking, &tracker).evaluate(&run_id, &X, &y, &Metric::ALL),
            Err(PipelineError::InvalidModel(_))
        ));
        assert!(matches!(
            Evaluator::new(ModelKind::Linear, &tracker).evaluate("missing", &X, &y, &Metric::ALL),
            Err(PipelineError::ModelNotFound(_))
        ));
    }
}
