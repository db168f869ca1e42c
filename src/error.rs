//! Ошибки пайплайна

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    // Загрузка данных
    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("No CSV file found in archive {0}")]
    NoDataFileFound(PathBuf),

    #[error("Archive {archive} contains several CSV files: {candidates:?}")]
    AmbiguousDataFile {
        archive: PathBuf,
        candidates: Vec<String>,
    },

    // Очистка и разбиение
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Invalid strategy: {0}")]
    InvalidStrategy(String),

    #[error("Invalid split ratio {0}: expected a value in (0, 1) leaving both parts non-empty")]
    InvalidRatio(f64),

    #[error("Column {0} has no observed values to impute from")]
    AllMissing(String),

    // Признаки
    #[error("{0} is not fitted")]
    NotFitted(&'static str),

    #[error("Invalid column groups: {0}")]
    InvalidColumnGroups(String),

    #[error("Column {column} must be {expected}")]
    ColumnType { column: String, expected: &'static str },

    #[error("Column {0} contains missing values")]
    MissingValues(String),

    #[error("Unknown category {value:?} in column {column}")]
    UnknownCategory { column: String, value: String },

    #[error("Shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: String, found: String },

    #[error("Empty dataset")]
    EmptyDataset,

    // Модели
    #[error("Invalid model: {0} (expected one of: linear, stacking)")]
    InvalidModel(String),

    #[error("No model logged for run {0}")]
    ModelNotFound(String),

    #[error("Invalid scoring: {0}")]
    InvalidScoring(String),

    #[error("Training error: {0}")]
    Training(String),

    // Внешние
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data frame error: {0}")]
    Frame(#[from] polars::prelude::PolarsError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl PipelineError {
    /// Ошибка вызвана входными данными запроса (а не состоянием сервиса)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::ColumnNotFound(_)
                | PipelineError::ColumnType { .. }
                | PipelineError::MissingValues(_)
                | PipelineError::UnknownCategory { .. }
                | PipelineError::ShapeMismatch { .. }
                | PipelineError::EmptyDataset
        )
    }
}
