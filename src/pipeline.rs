//! Стадии пайплайна, связанные через файлы артефактов

use std::fs;

use ndarray::{Array1, Array2, Axis};

use crate::artifacts::{read_array, write_array};
use crate::config::{ArtifactLayout, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::ingestion::{ingestor_for, IngestSummary};
use crate::metrics::Metric;
use crate::models::{EvaluationReport, Evaluator, ModelKind, ModelTrainer, TrainedModel};
use crate::preprocessing::{FeatureEngineer, MissingValueStrategy, Mode, SplitArtifact, TrainTestSplit};
use crate::table::Table;
use crate::tracking::Tracker;

/// Признаки и цель после feature engineering
#[derive(Debug, Clone, PartialEq)]
pub struct EngineeredArrays {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
}

impl EngineeredArrays {
    pub fn save(&self, layout: &ArtifactLayout) -> Result<()> {
        write_array(layout.array("x_train"), &self.x_train)?;
        write_array(layout.array("x_test"), &self.x_test)?;
        write_array(layout.array("y_train"), &self.y_train.clone().insert_axis(Axis(1)))?;
        write_array(layout.array("y_test"), &self.y_test.clone().insert_axis(Axis(1)))?;
        Ok(())
    }

    pub fn load(layout: &ArtifactLayout) -> Result<Self> {
        Ok(Self {
            x_train: read_array(layout.array("x_train"))?,
            x_test: read_array(layout.array("x_test"))?,
            y_train: target_column(read_array(layout.array("y_train"))?)?,
            y_test: target_column(read_array(layout.array("y_test"))?)?,
        })
    }
}

fn target_column(y: Array2<f64>) -> Result<Array1<f64>> {
    if y.ncols() != 1 {
        return Err(PipelineError::ShapeMismatch {
            expected: "a single target column".to_string(),
            found: format!("{} columns", y.ncols()),
        });
    }
    Ok(y.column(0).to_owned())
}

pub struct Pipeline {
    config: PipelineConfig,
    layout: ArtifactLayout,
    tracker: Tracker,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let layout = config.layout();
        let tracker = Tracker::new(config.tracking.clone());
        Self {
            config,
            layout,
            tracker,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn ingest(&self) -> Result<IngestSummary> {
        tracing::info!("Data ingestion has started");
        let archive = &self.config.archive;
        let summary = ingestor_for(archive)?.ingest(archive, &self.layout)?;
        tracing::info!("Data ingestion has ended");
        Ok(summary)
    }

    pub fn clean(&self) -> Result<Table> {
        tracing::info!("Handling missing values has started");
        let raw = Table::read_csv(self.layout.raw_csv())?;
        let strategy = MissingValueStrategy::from_config(&self.config.missing)?;
        for (column, action) in strategy.plan(&raw)? {
            tracing::debug!("{}: {}", column, action);
        }

        let clean = strategy.handle(&raw)?;
        clean.write_csv(self.layout.clean_csv())?;
        tracing::info!(
            "Missing values handled: {} -> {} missing cells, shape {:?}",
            raw.missing_count(),
            clean.missing_count(),
            clean.shape()
        );
        Ok(clean)
    }

    pub fn split(&self) -> Result<SplitArtifact> {
        let clean = Table::read_csv(self.layout.clean_csv())?;
        let split = TrainTestSplit::from_config(&self.config.split, &self.config.target).split(&clean)?;
        split.save(&self.layout)?;
        Ok(split)
    }

    /// Обучает преобразования на train, применяет к test и сохраняет их состояние
    pub fn engineer(&self) -> Result<EngineeredArrays> {
        tracing::info!("Feature engineering has started");
        let split = SplitArtifact::load(&self.layout)?;
        let features_config = &self.config.features;

        let mut features = FeatureEngineer::features(
            features_config.groups(),
            features_config.one_hot_drop,
            features_config.handle_unknown,
        );
        let x_train = features.execute(&split.x_train, Mode::Train)?;
        let x_test = features.execute(&split.x_test, Mode::Test)?;

        let mut target = FeatureEngineer::target();
        let y_train = target.execute(&split.y_train, Mode::Train)?;
        let y_test = target.execute(&split.y_test, Mode::Test)?;

        features.save(self.layout.feature_transformer())?;
        target.save(self.layout.target_transformer())?;

        let arrays = EngineeredArrays {
            x_train,
            x_test,
            y_train: target_column(y_train)?,
            y_test: target_column(y_test)?,
        };
        arrays.save(&self.layout)?;
        tracing::info!(
            "Feature engineering has ended: {} train / {} test rows, {} features",
            arrays.x_train.nrows(),
            arrays.x_test.nrows(),
            arrays.x_train.ncols()
        );
        Ok(arrays)
    }

    /// Обучает модель и сохраняет её вместе с идентификатором запуска
    pub fn train(&self, kind: ModelKind) -> Result<TrainedModel> {
        let arrays = EngineeredArrays::load(&self.layout)?;
        let trained = ModelTrainer::new(&self.config.training, &self.tracker)
            .train(kind, &arrays.x_train, &arrays.y_train)?;

        trained.model.save(self.layout.model(kind))?;
        fs::write(self.layout.run_id(kind), &trained.run_id)?;
        tracing::info!("Model {} trained in run {}", kind, trained.run_id);
        Ok(trained)
    }

    /// Идентификатор последнего запуска обучения для семейства моделей
    pub fn last_run_id(&self, kind: ModelKind) -> Result<String> {
        let path = self.layout.run_id(kind);
        if !path.exists() {
            return Err(PipelineError::ModelNotFound(format!(
                "no {} run recorded at {}",
                kind,
                path.display()
            )));
        }
        Ok(fs::read_to_string(path)?.trim().to_string())
    }

    pub fn evaluate(&self, kind: ModelKind, run_id: &str, metrics: &[Metric]) -> Result<EvaluationReport> {
        let arrays = EngineeredArrays::load(&self.layout)?;
        Evaluator::new(kind, &self.tracker).evaluate(run_id, &arrays.x_test, &arrays.y_test, metrics)
    }

    /// Все стадии подряд; первая ошибка останавливает пайплайн
    pub fn run(&self, kind: ModelKind) -> Result<EvaluationReport> {
        self.ingest()?;
        self.clean()?;
        self.split()?;
        self.engineer()?;
        let trained = self.train(kind)?;
        self.evaluate(kind, &trained.run_id, &self.config.evaluation.metrics)
    }
}
