//! One-hot кодирование категориальных колонок

use std::collections::BTreeSet;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::table::Table;

/// Какую категорию не кодировать отдельным столбцом
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryDrop {
    #[default]
    None,
    First,
    IfBinary,
}

/// Поведение при категории, не встречавшейся при обучении
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCategory {
    #[default]
    Error,
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedColumn {
    pub name: String,
    /// Отсортированный словарь категорий
    pub categories: Vec<String>,
    pub dropped: Option<usize>,
}

impl EncodedColumn {
    fn kept(&self) -> impl Iterator<Item = (usize, &String)> {
        self.categories
            .iter()
            .enumerate()
            .filter(move |(i, _)| Some(*i) != self.dropped)
    }

    pub fn width(&self) -> usize {
        self.kept().count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    drop: CategoryDrop,
    handle_unknown: UnknownCategory,
    columns: Option<Vec<EncodedColumn>>,
}

impl OneHotEncoder {
    pub fn new(drop: CategoryDrop, handle_unknown: UnknownCategory) -> Self {
        Self {
            drop,
            handle_unknown,
            columns: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.columns.is_some()
    }

    pub fn encoded_columns(&self) -> Option<&[EncodedColumn]> {
        self.columns.as_deref()
    }

    pub fn fit(&mut self, table: &Table, names: &[String]) -> Result<()> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let values = table.category_values(name)?;
            let categories: Vec<String> = values
                .into_iter()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let dropped = match self.drop {
                CategoryDrop::None => None,
                CategoryDrop::First => Some(0),
                CategoryDrop::IfBinary if categories.len() == 2 => Some(0),
                CategoryDrop::IfBinary => None,
            };
            columns.push(EncodedColumn {
                name: name.clone(),
                categories,
                dropped,
            });
        }
        self.columns = Some(columns);
        Ok(())
    }

    pub fn transform(&self, table: &Table) -> Result<Array2<f64>> {
        let columns = self
            .columns
            .as_ref()
            .ok_or(PipelineError::NotFitted("OneHotEncoder"))?;

        let width: usize = columns.iter().map(|c| c.width()).sum();
        let mut encoded = Array2::zeros((table.height(), width));

        let mut offset = 0;
        for column in columns {
            let values = table.category_values(&column.name)?;
            for (row, value) in values.iter().enumerate() {
                match column.categories.binary_search(value) {
                    Ok(idx) => {
                        if let Some(pos) = column.kept().position(|(i, _)| i == idx) {
                            encoded[[row, offset + pos]] = 1.0;
                        }
                    }
                    Err(_) => {
                        if self.handle_unknown == UnknownCategory::Error {
                            return Err(PipelineError::UnknownCategory {
                                column: column.name.clone(),
                                value: value.clone(),
                            });
                        }
                    }
                }
            }
            offset += column.width();
        }

        Ok(encoded)
    }

    pub fn fit_transform(&mut self, table: &Table, names: &[String]) -> Result<Array2<f64>> {
        self.fit(table, names)?;
        self.transform(table)
    }

    /// Имена выходных признаков вида `колонка_категория`
    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .flatten()
            .flat_map(|c| c.kept().map(move |(_, cat)| format!("{}_{}", c.name, cat)))
            .collect()
    }
}

impl Default for OneHotEncoder {
    fn default() -> Self {
        Self::new(CategoryDrop::default(), UnknownCategory::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use polars::prelude::*;

    fn houses() -> Table {
        Table::new(vec![
            Series::new(
                "furnishingstatus",
                &["furnished", "unfurnished", "semi-furnished", "furnished"],
            ),
            Series::new("mainroad", &["yes", "no", "yes", "yes"]),
        ])
        .unwrap()
    }

    fn names() -> Vec<String> {
        vec!["furnishingstatus".to_string(), "mainroad".to_string()]
    }

    #[test]
    fn test_one_hot_single_active_position() {
        let mut encoder = OneHotEncoder::default();
        let encoded = encoder.fit_transform(&houses(), &names()).unwrap();
        assert_eq!(
            encoded,
            array![
                [1.0, 0.0, 0.0, 0.0, 1.0],
                [0.0, 0.0, 1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0, 0.0, 1.0],
                [1.0, 0.0, 0.0, 0.0, 1.0],
            ]
        );
        assert_eq!(
            encoder.feature_names(),
            vec![
                "furnishingstatus_furnished",
                "furnishingstatus_semi-furnished",
                "furnishingstatus_unfurnished",
                "mainroad_no",
                "mainroad_yes",
            ]
        );
    }

    #[test]
    fn test_drop_policies() {
        let mut first = OneHotEncoder::new(CategoryDrop::First, UnknownCategory::Error);
        let encoded = first.fit_transform(&houses(), &names()).unwrap();
        assert_eq!(encoded.ncols(), 3);
        assert_eq!(encoded.row(0).to_vec(), vec![0.0, 0.0, 1.0]);

        let mut binary = OneHotEncoder::new(CategoryDrop::IfBinary, UnknownCategory::Error);
        let encoded = binary.fit_transform(&houses(), &names()).unwrap();
        assert_eq!(encoded.ncols(), 4);
        assert_eq!(binary.feature_names().last().unwrap(), "mainroad_yes");
    }

    #[test]
    fn test_unknown_category_handling() {
        let unseen = Table::new(vec![
            Series::new("furnishingstatus", &["luxury"]),
            Series::new("mainroad", &["yes"]),
        ])
        .unwrap();

        let mut strict = OneHotEncoder::default();
        strict.fit(&houses(), &names()).unwrap();
        assert!(matches!(
            strict.transform(&unseen),
            Err(PipelineError::UnknownCategory { column, value })
                if column == "furnishingstatus" && value == "luxury"
        ));

        let mut lenient = OneHotEncoder::new(CategoryDrop::None, UnknownCategory::Ignore);
        lenient.fit(&houses(), &names()).unwrap();
        let encoded = lenient.transform(&unseen).unwrap();
        assert_eq!(encoded.row(0).to_vec(), vec![0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_transform_requires_fit() {
        assert!(matches!(
            OneHotEncoder::default().transform(&houses()),
            Err(PipelineError::NotFitted(_))
        ));
    }
}
