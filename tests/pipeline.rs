mod common;

use house_price_ml::metrics::Metric;
use house_price_ml::tracking::RunStatus;
use house_price_ml::{FeaturePipeline, Model, ModelKind, Pipeline, PipelineError, Table};

#[test]
fn test_linear_pipeline_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(common::test_config(dir.path()));
    let layout = pipeline.layout().clone();

    let summary = pipeline.ingest().unwrap();
    assert_eq!(summary.source, "Housing.csv");
    assert_eq!((summary.rows, summary.columns), (80, 13));
    assert!(layout.raw_csv().exists());

    let clean = pipeline.clean().unwrap();
    assert_eq!(clean.missing_count(), 0);
    assert_eq!(clean.height(), 80);

    let split = pipeline.split().unwrap();
    assert_eq!(split.x_train.height(), 64);
    assert_eq!(split.x_test.height(), 16);
    assert!(!split.x_train.contains("price"));
    assert_eq!(split.y_train.column_names(), vec!["price"]);

    let arrays = pipeline.engineer().unwrap();
    // area + 4 выбросоустойчивых + 6 флагов + 2 категории мебели
    assert_eq!(arrays.x_train.ncols(), 13);
    assert_eq!(arrays.x_test.ncols(), 13);
    assert_eq!(arrays.y_train.len(), 64);
    let features = FeaturePipeline::load(layout.feature_transformer()).unwrap();
    assert!(features.is_fitted());

    let trained = pipeline.train(ModelKind::Linear).unwrap();
    assert_eq!(pipeline.last_run_id(ModelKind::Linear).unwrap(), trained.run_id);
    assert_eq!(Model::load(layout.model(ModelKind::Linear)).unwrap().kind(), ModelKind::Linear);

    let report = pipeline
        .evaluate(ModelKind::Linear, &trained.run_id, &[Metric::R2, Metric::Mae])
        .unwrap();
    assert_eq!(report.model_name, "linear-model");
    assert_eq!(report.version, 1);
    assert!(report.metrics["r2_score"] > 0.5, "r2 = {}", report.metrics["r2_score"]);

    let run = pipeline.tracker().open_run(&trained.run_id).unwrap();
    let record = run.record();
    assert_eq!(record.status, RunStatus::Finished);
    assert_eq!(record.params["model"], "linear");
    assert!(record.metrics.contains_key("best_cv_score"));
    assert!(record.metrics.contains_key("MAE"));
    assert!(!record.metrics.contains_key("RMSE"));

    // Повторная оценка того же запуска не создаёт новую версию
    let again = pipeline
        .evaluate(ModelKind::Linear, &trained.run_id, &[Metric::Rmse])
        .unwrap();
    assert_eq!(again.version, 1);
}

#[test]
fn test_run_stacking_with_small_grid() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(common::test_config(dir.path()));

    let report = pipeline.run(ModelKind::Stacking).unwrap();
    assert_eq!(report.model_name, "stacking-model");
    for metric in Metric::ALL {
        let value = report.metrics[metric.name()];
        assert!(value.is_finite(), "{} = {}", metric, value);
    }

    let registry = pipeline.tracker().registry().unwrap();
    assert_eq!(registry.versions("stacking-model").len(), 1);
    assert!(registry.versions("linear-model").is_empty());
}

#[test]
fn test_evaluator_rejects_other_model_family() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(common::test_config(dir.path()));
    pipeline.run(ModelKind::Linear).unwrap();

    let run_id = pipeline.last_run_id(ModelKind::Linear).unwrap();
    let err = pipeline
        .evaluate(ModelKind::Stacking, &run_id, &[Metric::R2])
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidModel(_)));
}

#[test]
fn test_stages_require_previous_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(common::test_config(dir.path()));

    assert!(pipeline.clean().is_err());
    assert!(matches!(
        pipeline.last_run_id(ModelKind::Stacking),
        Err(PipelineError::ModelNotFound(_))
    ));
}

#[test]
fn test_archive_without_csv_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config(dir.path());
    let archive = dir.path().join("notes.zip");
    common::write_archive(&archive, "README.txt", "no data here");
    config.archive = archive;

    let err = Pipeline::new(config).ingest().unwrap_err();
    assert!(matches!(err, PipelineError::NoDataFileFound(_)));
}

#[test]
fn test_clean_output_is_readable_csv() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(common::test_config(dir.path()));
    pipeline.ingest().unwrap();
    let clean = pipeline.clean().unwrap();

    let reread = Table::read_csv(pipeline.layout().clean_csv()).unwrap();
    assert_eq!(reread.shape(), clean.shape());
    assert_eq!(reread.category_values("furnishingstatus").unwrap().len(), 80);
}
