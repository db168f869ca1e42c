//! Табличные данные поверх polars `DataFrame`

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Значения, которые при чтении CSV считаются пропуском
const MISSING_TOKENS: [&str; 8] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// Грубый тип колонки: всё числовое против всего остального
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

impl ColumnKind {
    pub fn of(dtype: &DataType) -> Self {
        if dtype.is_numeric() {
            ColumnKind::Numeric
        } else {
            ColumnKind::Categorical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Categorical => "categorical",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    frame: DataFrame,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.frame.equals_missing(&other.frame)
    }
}

impl From<DataFrame> for Table {
    fn from(frame: DataFrame) -> Self {
        Self { frame }
    }
}

impl Table {
    /// Колонки должны иметь уникальные имена и одинаковую длину
    pub fn new(columns: Vec<Series>) -> Result<Self> {
        Ok(Self {
            frame: DataFrame::new(columns)?,
        })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.frame.shape()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.frame.get_column_names()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.frame.get_column_index(name).is_some()
    }

    pub fn column(&self, name: &str) -> Result<&Series> {
        self.frame
            .column(name)
            .map_err(|_| PipelineError::ColumnNotFound(name.to_string()))
    }

    pub fn kind(&self, name: &str) -> Result<ColumnKind> {
        Ok(ColumnKind::of(self.column(name)?.dtype()))
    }

    /// Заменяет колонку с тем же именем
    pub fn replace_column(&mut self, series: Series) -> Result<()> {
        self.column(series.name())?;
        self.frame.with_column(series)?;
        Ok(())
    }

    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Table> {
        let names: Vec<&str> = names.iter().map(|name| name.as_ref()).collect();
        for name in &names {
            self.column(name)?;
        }
        let frame = self.frame.select(names)?;
        Ok(Table { frame })
    }

    pub fn drop_column(&self, name: &str) -> Result<Table> {
        self.column(name)?;
        Ok(Table {
            frame: self.frame.drop(name)?,
        })
    }

    /// Выборка строк по индексам (в заданном порядке)
    pub fn take(&self, indices: &[usize]) -> Result<Table> {
        let idx = IdxCa::from_vec("", indices.iter().map(|&i| i as IdxSize).collect());
        Ok(Table {
            frame: self.frame.take(&idx)?,
        })
    }

    /// Строки без единого пропуска
    pub fn drop_null_rows(&self) -> Result<Table> {
        Ok(Table {
            frame: self.frame.drop_nulls::<String>(None)?,
        })
    }

    pub fn missing_count(&self) -> usize {
        self.frame.get_columns().iter().map(|s| s.null_count()).sum()
    }

    /// Числовая колонка без пропусков
    pub fn numeric_values(&self, name: &str) -> Result<Vec<f64>> {
        let series = self.column(name)?;
        if ColumnKind::of(series.dtype()) != ColumnKind::Numeric {
            return Err(PipelineError::ColumnType {
                column: name.to_string(),
                expected: "numeric",
            });
        }
        let floats = series.cast(&DataType::Float64)?;
        let values = floats
            .f64()?
            .into_iter()
            .map(|v| v.ok_or_else(|| PipelineError::MissingValues(name.to_string())))
            .collect();
        values
    }

    /// Любая колонка без пропусков в строковом виде (для кодирования категорий)
    pub fn category_values(&self, name: &str) -> Result<Vec<String>> {
        let strings = self.column(name)?.cast(&DataType::String)?;
        let values = strings
            .str()?
            .into_iter()
            .map(|v| {
                v.map(str::to_string)
                    .ok_or_else(|| PipelineError::MissingValues(name.to_string()))
            })
            .collect();
        values
    }

    pub fn read_csv(path: impl AsRef<Path>) -> Result<Table> {
        let frame = CsvReader::from_path(path.as_ref())?
            .has_header(true)
            .with_null_values(Some(null_values()))
            .infer_schema(None)
            .finish()?;
        Ok(Table { frame })
    }

    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Table> {
        let frame = CsvReader::new(Cursor::new(bytes.to_vec()))
            .has_header(true)
            .with_null_values(Some(null_values()))
            .infer_schema(None)
            .finish()?;
        Ok(Table { frame })
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path)?;
        self.to_csv_writer(file)
    }

    pub fn to_csv_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut frame = self.frame.clone();
        CsvWriter::new(writer)
            .include_header(true)
            .finish(&mut frame)?;
        Ok(())
    }
}

fn null_values() -> NullValues {
    NullValues::AllColumns(MISSING_TOKENS.iter().map(|s| s.to_string()).collect())
}
