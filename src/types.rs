/// Типы данных для API предсказаний

use polars::prelude::{NamedFrom, Series};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::table::Table;

/// Флаг удобства: 1/0, "1"/"0", "yes"/"no", true/false
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFlag", into = "bool")]
pub struct Flag(pub bool);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl TryFrom<RawFlag> for Flag {
    type Error = String;

    fn try_from(raw: RawFlag) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawFlag::Bool(value) => Ok(Flag(value)),
            RawFlag::Int(1) => Ok(Flag(true)),
            RawFlag::Int(0) => Ok(Flag(false)),
            RawFlag::Int(other) => Err(format!("invalid flag {}, expected 1 or 0", other)),
            RawFlag::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "1" | "yes" | "true" => Ok(Flag(true)),
                "0" | "no" | "false" => Ok(Flag(false)),
                _ => Err(format!("invalid flag {:?}, expected yes or no", text)),
            },
        }
    }
}

impl From<Flag> for bool {
    fn from(flag: Flag) -> Self {
        flag.0
    }
}

impl Flag {
    /// Категория в исходном датасете
    pub fn as_category(&self) -> &'static str {
        if self.0 {
            "yes"
        } else {
            "no"
        }
    }
}

/// Число из JSON: как число или как строка с числом
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNumber", into = "f64")]
pub struct Number(pub f64);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Float(f64),
    Text(String),
}

impl TryFrom<RawNumber> for Number {
    type Error = String;

    fn try_from(raw: RawNumber) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawNumber::Float(value) => Ok(Number(value)),
            RawNumber::Text(text) => text
                .trim()
                .parse()
                .map(Number)
                .map_err(|_| format!("invalid number {:?}", text)),
        }
    }
}

impl From<Number> for f64 {
    fn from(number: Number) -> Self {
        number.0
    }
}

/// Тело запроса POST /predict; отсутствующие поля берут значения веб-формы
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    #[serde(default)]
    pub area: Number,
    #[serde(default)]
    pub bedrooms: Number,
    #[serde(default)]
    pub bathrooms: Number,
    #[serde(default)]
    pub stories: Number,
    #[serde(default)]
    pub mainroad: Flag,
    #[serde(default)]
    pub guestroom: Flag,
    #[serde(default)]
    pub basement: Flag,
    #[serde(default)]
    pub hotwaterheating: Flag,
    #[serde(default)]
    pub airconditioning: Flag,
    #[serde(default)]
    pub parking: Number,
    #[serde(default)]
    pub prefarea: Flag,
    #[serde(default = "default_furnishing")]
    pub furnishingstatus: String,
    #[serde(default = "default_name")]
    pub name: String,
}

fn default_furnishing() -> String { "unfurnished".to_string() }
fn default_name() -> String { "Anonymous".to_string() }

/// Проверенные признаки одного дома
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseFeatures {
    pub area: f64,
    pub bedrooms: i64,
    pub bathrooms: f64,
    pub stories: i64,
    pub mainroad: bool,
    pub guestroom: bool,
    pub basement: bool,
    pub hotwaterheating: bool,
    pub airconditioning: bool,
    pub parking: i64,
    pub prefarea: bool,
    pub furnishingstatus: String,
}

impl PredictionRequest {
    pub fn features(&self) -> Result<HouseFeatures> {
        fn finite(column: &str, value: Number) -> Result<f64> {
            if value.0.is_finite() {
                Ok(value.0)
            } else {
                Err(PipelineError::ColumnType {
                    column: column.to_string(),
                    expected: "a finite number",
                })
            }
        }
        // Счётчики обрезаются до целого
        fn count(column: &str, value: Number) -> Result<i64> {
            Ok(finite(column, value)?.trunc() as i64)
        }

        Ok(HouseFeatures {
            area: finite("area", self.area)?,
            bedrooms: count("bedrooms", self.bedrooms)?,
            bathrooms: finite("bathrooms", self.bathrooms)?,
            stories: count("stories", self.stories)?,
            mainroad: self.mainroad.0,
            guestroom: self.guestroom.0,
            basement: self.basement.0,
            hotwaterheating: self.hotwaterheating.0,
            airconditioning: self.airconditioning.0,
            parking: count("parking", self.parking)?,
            prefarea: self.prefarea.0,
            furnishingstatus: self.furnishingstatus.trim().to_string(),
        })
    }
}

impl HouseFeatures {
    /// Однострочная таблица с колонками датасета
    pub fn to_table(&self) -> Result<Table> {
        let numeric = |name: &str, value: f64| Series::new(name, &[value]);
        let flag = |name: &str, value: bool| Series::new(name, &[Flag(value).as_category()]);

        Table::new(vec![
            numeric("area", self.area),
            numeric("bedrooms", self.bedrooms as f64),
            numeric("bathrooms", self.bathrooms),
            numeric("stories", self.stories as f64),
            flag("mainroad", self.mainroad),
            flag("guestroom", self.guestroom),
            flag("basement", self.basement),
            flag("hotwaterheating", self.hotwaterheating),
            flag("airconditioning", self.airconditioning),
            numeric("parking", self.parking as f64),
            flag("prefarea", self.prefarea),
            Series::new("furnishingstatus", &[self.furnishingstatus.as_str()]),
        ])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub success: bool,
    pub predicted_price: f64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Строка журнала предсказаний
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub features: HouseFeatures,
    pub predicted_price: f64,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: PredictionRequest = serde_json::from_str("{}").unwrap();
        let features = request.features().unwrap();
        assert_eq!(features.area, 0.0);
        assert!(!features.mainroad);
        assert_eq!(features.furnishingstatus, "unfurnished");
        assert_eq!(request.name, "Anonymous");
    }

    #[test]
    fn test_flag_forms() {
        let request: PredictionRequest = serde_json::from_str(
            r#"{"mainroad": 1, "guestroom": "0", "basement": "yes", "hotwaterheating": false,
                "airconditioning": "True", "prefarea": "no", "area": "7420", "bedrooms": 4.0}"#,
        )
        .unwrap();
        let f = request.features().unwrap();
        assert!(f.mainroad && f.basement && f.airconditioning);
        assert!(!f.guestroom && !f.hotwaterheating && !f.prefarea);
        assert_eq!(f.area, 7420.0);
        assert_eq!(f.bedrooms, 4);

        assert!(serde_json::from_str::<PredictionRequest>(r#"{"mainroad": 2}"#).is_err());
        assert!(serde_json::from_str::<PredictionRequest>(r#"{"mainroad": "maybe"}"#).is_err());
        assert!(serde_json::from_str::<PredictionRequest>(r#"{"area": "big"}"#).is_err());
    }

    #[test]
    fn test_non_finite_input_rejected() {
        let request: PredictionRequest = serde_json::from_str(r#"{"area": "NaN"}"#).unwrap();
        assert!(matches!(
            request.features(),
            Err(PipelineError::ColumnType { column, .. }) if column == "area"
        ));
    }

    #[test]
    fn test_features_to_table() {
        let request: PredictionRequest =
            serde_json::from_str(r#"{"area": 7420, "mainroad": 1, "furnishingstatus": "furnished"}"#).unwrap();
        let table = request.features().unwrap().to_table().unwrap();
        assert_eq!(table.shape(), (1, 12));
        assert_eq!(table.category_values("mainroad").unwrap(), vec!["yes"]);
        assert_eq!(table.category_values("prefarea").unwrap(), vec!["no"]);
        assert_eq!(table.numeric_values("area").unwrap(), vec![7420.0]);
    }
}
