//! Обработка пропущенных значений
//!
//! Две стратегии: удаление строк/колонок с пропусками и заполнение.
//! При заполнении способ выбирается по типу колонки: числовые колонки
//! заполняются средним или медианой, категориальные самым частым значением.
//! Каждая колонка заполняется независимо.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::MissingValueConfig;
use crate::error::{PipelineError, Result};
use crate::table::{ColumnKind, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValueMethod {
    Fill,
    Drop,
}

impl FromStr for MissingValueMethod {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fill" => Ok(MissingValueMethod::Fill),
            "drop" => Ok(MissingValueMethod::Drop),
            other => Err(PipelineError::InvalidStrategy(format!(
                "unknown method {:?} (expected fill or drop)",
                other
            ))),
        }
    }
}

/// Ось удаления: 0 = строки, 1 = колонки
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropAxis {
    Rows,
    Columns,
}

impl TryFrom<usize> for DropAxis {
    type Error = PipelineError;

    fn try_from(axis: usize) -> Result<Self> {
        match axis {
            0 => Ok(DropAxis::Rows),
            1 => Ok(DropAxis::Columns),
            other => Err(PipelineError::InvalidStrategy(format!(
                "unknown axis {} (expected 0 or 1)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericFill {
    Mean,
    Median,
}

impl FromStr for NumericFill {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(NumericFill::Mean),
            "median" => Ok(NumericFill::Median),
            other => Err(PipelineError::InvalidStrategy(format!(
                "unknown numeric strategy {:?} (expected mean or median)",
                other
            ))),
        }
    }
}

impl NumericFill {
    fn statistic(&self, observed: &mut [f64]) -> f64 {
        match self {
            NumericFill::Mean => observed.iter().sum::<f64>() / observed.len() as f64,
            NumericFill::Median => {
                observed.sort_by(|a, b| a.total_cmp(b));
                let mid = observed.len() / 2;
                if observed.len() % 2 == 0 {
                    (observed[mid - 1] + observed[mid]) / 2.0
                } else {
                    observed[mid]
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalFill {
    MostFrequent,
}

impl FromStr for CategoricalFill {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "most_frequent" => Ok(CategoricalFill::MostFrequent),
            other => Err(PipelineError::InvalidStrategy(format!(
                "unknown categorical strategy {:?} (expected most_frequent)",
                other
            ))),
        }
    }
}

impl CategoricalFill {
    fn statistic(&self, observed: &[&str]) -> String {
        match self {
            CategoricalFill::MostFrequent => {
                let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
                for value in observed {
                    *counts.entry(*value).or_insert(0) += 1;
                }
                // При равенстве частот выигрывает наименьшее значение
                let mut best: Option<(&str, usize)> = None;
                for (value, count) in counts {
                    if best.map_or(true, |(_, c)| count > c) {
                        best = Some((value, count));
                    }
                }
                best.map(|(v, _)| v.to_string()).unwrap_or_default()
            }
        }
    }
}

/// Действие, выбранное для колонки по её типу
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnAction {
    FillNumeric(NumericFill),
    FillCategorical(CategoricalFill),
}

impl fmt::Display for ColumnAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnAction::FillNumeric(s) => write!(f, "fill-numeric({:?})", s),
            ColumnAction::FillCategorical(s) => write!(f, "fill-categorical({:?})", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MissingValueStrategy {
    Drop {
        axis: DropAxis,
    },
    /// Пустой `columns` означает все колонки таблицы
    Fill {
        numeric: NumericFill,
        categorical: CategoricalFill,
        columns: Vec<String>,
    },
}

impl MissingValueStrategy {
    pub fn from_names(
        method: &str,
        axis: usize,
        numeric: &str,
        categorical: &str,
        columns: Vec<String>,
    ) -> Result<Self> {
        match method.parse::<MissingValueMethod>()? {
            MissingValueMethod::Drop => Ok(MissingValueStrategy::Drop {
                axis: DropAxis::try_from(axis)?,
            }),
            MissingValueMethod::Fill => Ok(MissingValueStrategy::Fill {
                numeric: numeric.parse()?,
                categorical: categorical.parse()?,
                columns,
            }),
        }
    }

    pub fn from_config(config: &MissingValueConfig) -> Result<Self> {
        match config.method {
            MissingValueMethod::Drop => Ok(MissingValueStrategy::Drop {
                axis: DropAxis::try_from(config.axis)?,
            }),
            MissingValueMethod::Fill => Ok(MissingValueStrategy::Fill {
                numeric: config.numeric_strategy,
                categorical: config.categorical_strategy,
                columns: config.columns.clone(),
            }),
        }
    }

    /// Выведенная по типам колонок политика заполнения
    pub fn plan(&self, table: &Table) -> Result<Vec<(String, ColumnAction)>> {
        match self {
            MissingValueStrategy::Drop { .. } => Ok(Vec::new()),
            MissingValueStrategy::Fill {
                numeric,
                categorical,
                columns,
            } => target_columns(table, columns)?
                .into_iter()
                .map(|name| {
                    let action = match table.kind(&name)? {
                        ColumnKind::Numeric => ColumnAction::FillNumeric(*numeric),
                        ColumnKind::Categorical => ColumnAction::FillCategorical(*categorical),
                    };
                    Ok((name, action))
                })
                .collect(),
        }
    }

    pub fn handle(&self, table: &Table) -> Result<Table> {
        match self {
            MissingValueStrategy::Drop { axis } => drop_missing(table, *axis),
            MissingValueStrategy::Fill { .. } => {
                let mut result = table.clone();
                for (name, action) in self.plan(table)? {
                    let filled = fill_column(result.column(&name)?, action)?;
                    if let Some(series) = filled {
                        result.replace_column(series)?;
                    }
                }
                Ok(result)
            }
        }
    }
}

fn target_columns(table: &Table, columns: &[String]) -> Result<Vec<String>> {
    if columns.is_empty() {
        return Ok(table.column_names().iter().map(|s| s.to_string()).collect());
    }
    for name in columns {
        table.column(name)?;
    }
    Ok(columns.to_vec())
}

fn drop_missing(table: &Table, axis: DropAxis) -> Result<Table> {
    match axis {
        DropAxis::Rows => table.drop_null_rows(),
        DropAxis::Columns => {
            let keep: Vec<&str> = table
                .frame()
                .get_columns()
                .iter()
                .filter(|s| s.null_count() == 0)
                .map(|s| s.name())
                .collect();
            table.select(&keep)
        }
    }
}

/// Заполненная копия колонки; `None`, если пропусков нет
fn fill_column(series: &Series, action: ColumnAction) -> Result<Option<Series>> {
    if series.null_count() == 0 {
        return Ok(None);
    }
    let name = series.name();

    let filled = match (ColumnKind::of(series.dtype()), action) {
        (ColumnKind::Numeric, ColumnAction::FillNumeric(strategy)) => {
            let floats = series.cast(&DataType::Float64)?;
            let values = floats.f64()?;
            let mut observed: Vec<f64> = values.into_iter().flatten().collect();
            if observed.is_empty() {
                return Err(PipelineError::AllMissing(name.to_string()));
            }
            let fill = strategy.statistic(&mut observed);
            let column: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(fill)).collect();
            Series::new(name, column)
        }
        (ColumnKind::Categorical, ColumnAction::FillCategorical(strategy)) => {
            let strings = series.cast(&DataType::String)?;
            let values = strings.str()?;
            let observed: Vec<&str> = values.into_iter().flatten().collect();
            if observed.is_empty() {
                return Err(PipelineError::AllMissing(name.to_string()));
            }
            let fill = strategy.statistic(&observed);
            let column: Vec<&str> = values
                .into_iter()
                .map(|v| v.unwrap_or(fill.as_str()))
                .collect();
            Series::new(name, column)
        }
        _ => {
            return Err(PipelineError::ColumnType {
                column: name.to_string(),
                expected: "of the kind its fill strategy was planned for",
            })
        }
    };

    tracing::debug!("Filled missing values in column {} ({})", name, action);
    Ok(Some(filled))
}
