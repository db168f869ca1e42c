//! Локальный трекинг экспериментов и реестр моделей
//!
//! Структура на диске:
//! `<root>/<experiment>/<run_id>/run.json`, `<root>/<experiment>/<run_id>/artifacts/model.json`,
//! `<root>/registry.json`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifacts::{read_json, write_json};
use crate::error::{PipelineError, Result};
use crate::models::Model;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_experiment")]
    pub experiment: String,
}

fn default_root() -> PathBuf { PathBuf::from("mlruns") }
fn default_experiment() -> String { "House Price Prediction".to_string() }

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            experiment: default_experiment(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub name: String,
    pub experiment: String,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

/// Открытый запуск; каждое изменение сразу сохраняется в run.json
#[derive(Debug)]
pub struct Run {
    dir: PathBuf,
    record: RunRecord,
}

impl Run {
    pub fn id(&self) -> &str {
        &self.record.run_id
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    pub fn log_param(&mut self, key: &str, value: impl ToString) -> Result<()> {
        self.record.params.insert(key.to_string(), value.to_string());
        self.save()
    }

    pub fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        self.record.metrics.insert(key.to_string(), value);
        self.save()
    }

    pub fn log_model(&mut self, model: &Model) -> Result<()> {
        model.save(self.dir.join("artifacts").join("model.json"))
    }

    pub fn finish(mut self, status: RunStatus) -> Result<RunRecord> {
        self.record.status = status;
        self.record.end_time = Some(Utc::now());
        self.save()?;
        Ok(self.record)
    }

    fn save(&self) -> Result<()> {
        write_json(self.dir.join("run.json"), &self.record)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    pub version: u32,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub models: BTreeMap<String, Vec<ModelVersion>>,
}

impl Registry {
    pub fn versions(&self, name: &str) -> &[ModelVersion] {
        self.models.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone)]
pub struct Tracker {
    config: TrackingConfig,
}

impl Tracker {
    pub fn new(config: TrackingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.config.root.join(&self.config.experiment).join(run_id)
    }

    fn registry_path(&self) -> PathBuf {
        self.config.root.join("registry.json")
    }

    pub fn start_run(&self, name: &str) -> Result<Run> {
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let run = Run {
            dir: self.run_dir(&run_id),
            record: RunRecord {
                run_id,
                name: name.to_string(),
                experiment: self.config.experiment.clone(),
                status: RunStatus::Running,
                start_time: Utc::now(),
                end_time: None,
                params: BTreeMap::new(),
                metrics: BTreeMap::new(),
            },
        };
        run.save()?;
        tracing::info!("Started run {} ({}) in experiment {:?}", run.id(), name, self.config.experiment);
        Ok(run)
    }

    /// Повторное открытие существующего запуска для дозаписи метрик
    pub fn open_run(&self, run_id: &str) -> Result<Run> {
        let dir = self.run_dir(run_id);
        let path = dir.join("run.json");
        if !path.exists() {
            return Err(PipelineError::ModelNotFound(run_id.to_string()));
        }
        let record = read_json(path)?;
        Ok(Run { dir, record })
    }

    pub fn load_model(&self, run_id: &str) -> Result<Model> {
        let path = self.run_dir(run_id).join("artifacts").join("model.json");
        if !path.exists() {
            return Err(PipelineError::ModelNotFound(run_id.to_string()));
        }
        Model::load(path)
    }

    pub fn registry(&self) -> Result<Registry> {
        let path = self.registry_path();
        if !path.exists() {
            return Ok(Registry::default());
        }
        read_json(path)
    }

    /// Регистрирует модель запуска; повторная регистрация того же run_id
    /// возвращает существующую версию
    pub fn register_model(&self, name: &str, run_id: &str) -> Result<ModelVersion> {
        let mut registry = self.registry()?;
        if let Some(existing) = registry.versions(name).iter().find(|v| v.run_id == run_id) {
            tracing::info!("Model {} already registered as version {}", name, existing.version);
            return Ok(existing.clone());
        }
        if !self.run_dir(run_id).join("artifacts").join("model.json").exists() {
            return Err(PipelineError::ModelNotFound(run_id.to_string()));
        }

        let versions = registry.models.entry(name.to_string()).or_default();
        let version = ModelVersion {
            name: name.to_string(),
            version: versions.iter().map(|v| v.version).max().unwrap_or(0) + 1,
            run_id: run_id.to_string(),
            created_at: Utc::now(),
        };
        versions.push(version.clone());
        write_json(self.registry_path(), &registry)?;

        tracing::info!("Registered {} version {} from run {}", name, version.version, run_id);
        Ok(version)
    }
}
