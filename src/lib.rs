//! House Price ML - Rust библиотека
//!
//! Пайплайн: загрузка архива -> пропуски -> разбиение -> признаки ->
//! обучение -> оценка -> HTTP API предсказаний.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod serving;
pub mod storage;
pub mod table;
pub mod tracking;
pub mod types;

pub use types::*;
pub use models::*;
pub use preprocessing::*;

// Re-export для удобства
pub use config::{ArtifactLayout, PipelineConfig};
pub use error::{PipelineError, Result};
pub use pipeline::{EngineeredArrays, Pipeline};
pub use table::Table;
