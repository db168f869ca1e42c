//! Feature engineering для модели цены
//!
//! Признаки: три непересекающиеся группы колонок (асимметричные -> степенное
//! преобразование, с выбросами -> робастное масштабирование, категориальные ->
//! one-hot), остальные колонки передаются без изменений.
//! Цель: степенное преобразование, затем робастное масштабирование.
//!
//! Параметры всех преобразований вычисляются только в режиме `Train`;
//! режим `Test` использует сохранённое состояние и никогда не переобучает его.

#![allow(non_snake_case)]

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use ndarray::{concatenate, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::artifacts::{read_json, write_json};
use crate::error::{PipelineError, Result};
use crate::preprocessing::encoding::{CategoryDrop, OneHotEncoder, UnknownCategory};
use crate::preprocessing::normalization::{PowerTransformer, RobustScaler};
use crate::table::{ColumnKind, Table};

/// Группы колонок задаются вызывающим кодом, а не выводятся из статистик
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnGroups {
    #[serde(default)]
    pub skewed: Vec<String>,
    #[serde(default)]
    pub outliers: Vec<String>,
    #[serde(default)]
    pub categorical: Vec<String>,
}

impl ColumnGroups {
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for name in self.all() {
            if !seen.insert(name) {
                return Err(PipelineError::InvalidColumnGroups(format!(
                    "column {} is listed more than once",
                    name
                )));
            }
        }
        Ok(())
    }

    fn all(&self) -> impl Iterator<Item = &String> {
        self.skewed
            .iter()
            .chain(&self.outliers)
            .chain(&self.categorical)
    }

    fn contains(&self, name: &str) -> bool {
        self.all().any(|c| c == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Test,
}

impl FromStr for Mode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Mode::Train),
            "test" => Ok(Mode::Test),
            other => Err(PipelineError::InvalidStrategy(format!(
                "unknown mode {:?} (expected train or test)",
                other
            ))),
        }
    }
}

/// Общий контракт преобразований: обучение на train, применение на test
pub trait Transformer {
    fn fit_transform(&mut self, table: &Table) -> Result<Array2<f64>>;
    fn transform(&self, table: &Table) -> Result<Array2<f64>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    groups: ColumnGroups,
    skew: PowerTransformer,
    outliers: RobustScaler,
    encoder: OneHotEncoder,
    passthrough: Vec<String>,
    schema: Option<Vec<SchemaField>>,
    feature_names: Vec<String>,
}

impl FeaturePipeline {
    pub fn new(groups: ColumnGroups, drop: CategoryDrop, handle_unknown: UnknownCategory) -> Self {
        Self {
            groups,
            skew: PowerTransformer::new(),
            outliers: RobustScaler::new(),
            encoder: OneHotEncoder::new(drop, handle_unknown),
            passthrough: Vec::new(),
            schema: None,
            feature_names: Vec::new(),
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.schema.is_some()
    }

    pub fn groups(&self) -> &ColumnGroups {
        &self.groups
    }

    /// Схема входной таблицы, зафиксированная при обучении
    pub fn schema(&self) -> Option<&[SchemaField]> {
        self.schema.as_deref()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features_out(&self) -> usize {
        self.feature_names.len()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_json(path, self)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path)
    }

    fn check_fit_input(&self, table: &Table) -> Result<Vec<String>> {
        self.groups.validate()?;

        for name in self.groups.skewed.iter().chain(&self.groups.outliers) {
            if table.kind(name)? != ColumnKind::Numeric {
                return Err(PipelineError::ColumnType {
                    column: name.clone(),
                    expected: "numeric",
                });
            }
        }
        for name in &self.groups.categorical {
            table.column(name)?;
        }

        let mut passthrough = Vec::new();
        for name in table.column_names() {
            if self.groups.contains(name) {
                continue;
            }
            if table.kind(name)? != ColumnKind::Numeric {
                return Err(PipelineError::ColumnType {
                    column: name.to_string(),
                    expected: "numeric to pass through (or listed as categorical)",
                });
            }
            passthrough.push(name.to_string());
        }
        Ok(passthrough)
    }

    fn check_schema(&self, table: &Table) -> Result<()> {
        let schema = self
            .schema
            .as_ref()
            .ok_or(PipelineError::NotFitted("FeaturePipeline"))?;
        for field in schema {
            if table.kind(&field.name)? != field.kind {
                return Err(PipelineError::ColumnType {
                    column: field.name.clone(),
                    expected: field.kind.as_str(),
                });
            }
        }
        Ok(())
    }

    fn assemble(&self, table: &Table, blocks: [Array2<f64>; 3]) -> Result<Array2<f64>> {
        let passthrough = numeric_matrix(table, &self.passthrough)?;
        let [skewed, outliers, encoded] = blocks;
        concatenate(
            Axis(1),
            &[skewed.view(), outliers.view(), encoded.view(), passthrough.view()],
        )
        .map_err(|e| PipelineError::ShapeMismatch {
            expected: "blocks with equal row counts".to_string(),
            found: e.to_string(),
        })
    }
}

impl Transformer for FeaturePipeline {
    fn fit_transform(&mut self, table: &Table) -> Result<Array2<f64>> {
        if table.height() == 0 {
            return Err(PipelineError::EmptyDataset);
        }
        let passthrough = self.check_fit_input(table)?;

        let skewed = self.skew.fit_transform(&numeric_matrix(table, &self.groups.skewed)?)?;
        let outliers = self
            .outliers
            .fit_transform(&numeric_matrix(table, &self.groups.outliers)?)?;
        let encoded = self.encoder.fit_transform(table, &self.groups.categorical)?;

        self.passthrough = passthrough;
        self.schema = Some(
            table
                .frame()
                .get_columns()
                .iter()
                .map(|s| SchemaField {
                    name: s.name().to_string(),
                    kind: ColumnKind::of(s.dtype()),
                })
                .collect(),
        );
        self.feature_names = self
            .groups
            .skewed
            .iter()
            .chain(&self.groups.outliers)
            .cloned()
            .chain(self.encoder.feature_names())
            .chain(self.passthrough.iter().cloned())
            .collect();

        let X = self.assemble(table, [skewed, outliers, encoded])?;
        tracing::info!(
            "Feature pipeline fitted: {} input columns -> {} features",
            table.width(),
            X.ncols()
        );
        Ok(X)
    }

    fn transform(&self, table: &Table) -> Result<Array2<f64>> {
        self.check_schema(table)?;

        let skewed = self.skew.transform(&numeric_matrix(table, &self.groups.skewed)?)?;
        let outliers = self
            .outliers
            .transform(&numeric_matrix(table, &self.groups.outliers)?)?;
        let encoded = self.encoder.transform(table)?;

        self.assemble(table, [skewed, outliers, encoded])
    }
}

/// Двухшаговый пайплайн для целевой колонки
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetPipeline {
    column: Option<String>,
    power: PowerTransformer,
    scaler: RobustScaler,
}

impl TargetPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.column.is_some()
    }

    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_json(path, self)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path)
    }

    fn target_matrix(table: &Table) -> Result<(String, Array2<f64>)> {
        if table.width() != 1 {
            return Err(PipelineError::ShapeMismatch {
                expected: "a single target column".to_string(),
                found: format!("{} columns", table.width()),
            });
        }
        let name = table.column_names()[0].to_string();
        let y = numeric_matrix(table, std::slice::from_ref(&name))?;
        Ok((name, y))
    }

    /// Преобразование значений цели тем же обученным состоянием
    pub fn transform_values(&self, values: &Array1<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(PipelineError::NotFitted("TargetPipeline"));
        }
        let y = values.clone().insert_axis(Axis(1));
        let scaled = self.scaler.transform(&self.power.transform(&y)?)?;
        Ok(scaled.column(0).to_owned())
    }

    /// Возврат из масштабированного пространства в исходные единицы цены
    pub fn inverse_transform(&self, values: &Array1<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(PipelineError::NotFitted("TargetPipeline"));
        }
        let y = values.clone().insert_axis(Axis(1));
        let restored = self.power.inverse_transform(&self.scaler.inverse_transform(&y)?)?;
        Ok(restored.column(0).to_owned())
    }
}

impl Transformer for TargetPipeline {
    fn fit_transform(&mut self, table: &Table) -> Result<Array2<f64>> {
        let (name, y) = Self::target_matrix(table)?;
        let skewed = self.power.fit_transform(&y)?;
        let scaled = self.scaler.fit_transform(&skewed)?;
        self.column = Some(name);
        Ok(scaled)
    }

    fn transform(&self, table: &Table) -> Result<Array2<f64>> {
        let expected = self
            .column
            .as_deref()
            .ok_or(PipelineError::NotFitted("TargetPipeline"))?;
        let (name, y) = Self::target_matrix(table)?;
        if name != expected {
            return Err(PipelineError::ColumnNotFound(expected.to_string()));
        }
        self.scaler.transform(&self.power.transform(&y)?)
    }
}

/// Закрытый набор стратегий feature engineering
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureEngineer {
    Features(FeaturePipeline),
    Target(TargetPipeline),
}

impl FeatureEngineer {
    pub fn features(groups: ColumnGroups, drop: CategoryDrop, handle_unknown: UnknownCategory) -> Self {
        FeatureEngineer::Features(FeaturePipeline::new(groups, drop, handle_unknown))
    }

    pub fn target() -> Self {
        FeatureEngineer::Target(TargetPipeline::new())
    }

    /// Сохраняет обученное состояние стратегии
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        match self {
            FeatureEngineer::Features(pipeline) => pipeline.save(path),
            FeatureEngineer::Target(pipeline) => pipeline.save(path),
        }
    }

    /// `Train` обучает и преобразует, `Test` только применяет обученное состояние
    pub fn execute(&mut self, table: &Table, mode: Mode) -> Result<Array2<f64>> {
        let transformer: &mut dyn Transformer = match self {
            FeatureEngineer::Features(pipeline) => pipeline,
            FeatureEngineer::Target(pipeline) => pipeline,
        };
        match mode {
            Mode::Train => transformer.fit_transform(table),
            Mode::Test => transformer.transform(table),
        }
    }
}

/// Матрица n x k из числовых колонок без пропусков
fn numeric_matrix(table: &Table, names: &[String]) -> Result<Array2<f64>> {
    let mut X = Array2::zeros((table.height(), names.len()));
    for (j, name) in names.iter().enumerate() {
        let values = table.numeric_values(name)?;
        for (i, v) in values.into_iter().enumerate() {
            X[[i, j]] = v;
        }
    }
    Ok(X)
}
