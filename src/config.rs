//! Конфигурация пайплайна
//!
//! Все пути, группы колонок и параметры стадий передаются явно через
//! `PipelineConfig`; значения по умолчанию соответствуют датасету цен на дома.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::artifacts::read_json;
use crate::error::Result;
use crate::models::search::Scoring;
use crate::models::ModelKind;
use crate::preprocessing::encoding::{CategoryDrop, UnknownCategory};
use crate::preprocessing::feature_engineering::ColumnGroups;
use crate::preprocessing::missing_values::{CategoricalFill, MissingValueMethod, NumericFill};
use crate::tracking::TrackingConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_archive")]
    pub archive: PathBuf,
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default)]
    pub missing: MissingValueConfig,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub serving: ServingConfig,
}

fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_archive() -> PathBuf { PathBuf::from("data/zip_data/archive.zip") }
fn default_target() -> String { "price".to_string() }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            archive: default_archive(),
            target: default_target(),
            missing: MissingValueConfig::default(),
            split: SplitConfig::default(),
            features: FeatureConfig::default(),
            training: TrainingConfig::default(),
            evaluation: EvaluationConfig::default(),
            tracking: TrackingConfig::default(),
            serving: ServingConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path)
    }

    /// Конфиг из файла, если он существует, иначе значения по умолчанию
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!("Config {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn layout(&self) -> ArtifactLayout {
        ArtifactLayout::new(&self.data_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingValueConfig {
    #[serde(default = "default_missing_method")]
    pub method: MissingValueMethod,
    #[serde(default)]
    pub axis: usize,
    #[serde(default = "default_numeric_fill")]
    pub numeric_strategy: NumericFill,
    #[serde(default = "default_categorical_fill")]
    pub categorical_strategy: CategoricalFill,
    /// Пустой список = все колонки таблицы
    #[serde(default)]
    pub columns: Vec<String>,
}

fn default_missing_method() -> MissingValueMethod { MissingValueMethod::Fill }
fn default_numeric_fill() -> NumericFill { NumericFill::Mean }
fn default_categorical_fill() -> CategoricalFill { CategoricalFill::MostFrequent }

impl Default for MissingValueConfig {
    fn default() -> Self {
        Self {
            method: default_missing_method(),
            axis: 0,
            numeric_strategy: default_numeric_fill(),
            categorical_strategy: default_categorical_fill(),
            columns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
}

fn default_test_size() -> f64 { 0.2 }
fn default_seed() -> u64 { 42 }
fn default_shuffle() -> bool { true }

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
            seed: default_seed(),
            shuffle: default_shuffle(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default = "default_skewed")]
    pub skewed: Vec<String>,
    #[serde(default = "default_outliers")]
    pub outliers: Vec<String>,
    #[serde(default = "default_categorical")]
    pub categorical: Vec<String>,
    #[serde(default = "default_category_drop")]
    pub one_hot_drop: CategoryDrop,
    #[serde(default)]
    pub handle_unknown: UnknownCategory,
}

fn default_skewed() -> Vec<String> {
    vec!["area".to_string()]
}

fn default_outliers() -> Vec<String> {
    ["bedrooms", "bathrooms", "stories", "parking"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_categorical() -> Vec<String> {
    [
        "mainroad",
        "guestroom",
        "basement",
        "hotwaterheating",
        "airconditioning",
        "prefarea",
        "furnishingstatus",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

// Полное one-hot кодирование вместе со свободным членом делает матрицу вырожденной
fn default_category_drop() -> CategoryDrop { CategoryDrop::First }

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            skewed: default_skewed(),
            outliers: default_outliers(),
            categorical: default_categorical(),
            one_hot_drop: default_category_drop(),
            handle_unknown: UnknownCategory::default(),
        }
    }
}

impl FeatureConfig {
    pub fn groups(&self) -> ColumnGroups {
        ColumnGroups {
            skewed: self.skewed.clone(),
            outliers: self.outliers.clone(),
            categorical: self.categorical.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_model")]
    pub model: ModelKind,
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,
    #[serde(default)]
    pub scoring: Scoring,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub linear_grid: LinearGrid,
    #[serde(default)]
    pub stacking_grid: StackingGrid,
    #[serde(default = "default_stacking_cv")]
    pub stacking_cv: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

fn default_model() -> ModelKind { ModelKind::Linear }
fn default_cv_folds() -> usize { 5 }
fn default_stacking_cv() -> usize { 3 }
fn default_learning_rate() -> f64 { 0.1 }

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            cv_folds: default_cv_folds(),
            scoring: Scoring::default(),
            seed: default_seed(),
            linear_grid: LinearGrid::default(),
            stacking_grid: StackingGrid::default(),
            stacking_cv: default_stacking_cv(),
            learning_rate: default_learning_rate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearGrid {
    #[serde(default = "default_fit_intercept")]
    pub fit_intercept: Vec<bool>,
}

fn default_fit_intercept() -> Vec<bool> { vec![true, false] }

impl Default for LinearGrid {
    fn default() -> Self {
        Self {
            fit_intercept: default_fit_intercept(),
        }
    }
}

/// Сетка гиперпараметров для стекинга (число деревьев и глубина базовых моделей)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackingGrid {
    #[serde(default = "default_n_estimators")]
    pub rf_n_estimators: Vec<usize>,
    #[serde(default = "default_n_estimators")]
    pub gb_n_estimators: Vec<usize>,
    #[serde(default = "default_max_depth")]
    pub rf_max_depth: Vec<usize>,
    #[serde(default = "default_max_depth")]
    pub gb_max_depth: Vec<usize>,
}

fn default_n_estimators() -> Vec<usize> { vec![50, 100] }
fn default_max_depth() -> Vec<usize> { vec![3, 5] }

impl Default for StackingGrid {
    fn default() -> Self {
        Self {
            rf_n_estimators: default_n_estimators(),
            gb_n_estimators: default_n_estimators(),
            rf_max_depth: default_max_depth(),
            gb_max_depth: default_max_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_metrics")]
    pub metrics: Vec<crate::metrics::Metric>,
}

fn default_metrics() -> Vec<crate::metrics::Metric> {
    crate::metrics::Metric::ALL.to_vec()
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            metrics: default_metrics(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServingConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default = "default_model")]
    pub model: ModelKind,
    #[serde(default = "default_precision")]
    pub precision: u32,
}

fn default_addr() -> String { "0.0.0.0:2662".to_string() }
fn default_database() -> PathBuf { PathBuf::from("predictions.db") }
fn default_precision() -> u32 { 2 }

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            database: default_database(),
            model: default_model(),
            precision: default_precision(),
        }
    }
}

/// Расположение промежуточных артефактов внутри `data_dir`
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn extracted_dir(&self) -> PathBuf {
        self.root.join("extracted_data")
    }

    pub fn raw_csv(&self) -> PathBuf {
        self.root.join("raw_data").join("raw.csv")
    }

    pub fn clean_csv(&self) -> PathBuf {
        self.root.join("clean_data").join("clean.csv")
    }

    /// `part`: x_train, x_test, y_train или y_test
    pub fn split_csv(&self, part: &str) -> PathBuf {
        self.root.join("splitted_data").join(format!("{}.csv", part))
    }

    pub fn array(&self, part: &str) -> PathBuf {
        self.root.join("arr_data").join(format!("{}.json", part))
    }

    pub fn feature_transformer(&self) -> PathBuf {
        self.root.join("transformers").join("features.json")
    }

    pub fn target_transformer(&self) -> PathBuf {
        self.root.join("transformers").join("target.json")
    }

    pub fn model(&self, kind: ModelKind) -> PathBuf {
        self.root.join("models").join(format!("{}.json", kind))
    }

    /// Идентификатор последнего запуска обучения для семейства моделей
    pub fn run_id(&self, kind: ModelKind) -> PathBuf {
        self.root.join("models").join(format!("{}.run", kind))
    }
}
