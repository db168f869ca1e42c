//! HTTP API предсказания цены

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use ndarray::Array1;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ArtifactLayout;
use crate::error::{PipelineError, Result};
use crate::models::{Model, ModelKind, Regressor};
use crate::preprocessing::{FeaturePipeline, TargetPipeline, Transformer};
use crate::storage::PredictionLog;
use crate::types::{ErrorResponse, HouseFeatures, PredictionRequest, PredictionResponse};

/// Обученные артефакты, загруженные только для чтения
#[derive(Debug, Clone)]
pub struct PredictionService {
    features: FeaturePipeline,
    target: TargetPipeline,
    model: Model,
    precision: u32,
}

impl PredictionService {
    pub fn new(features: FeaturePipeline, target: TargetPipeline, model: Model, precision: u32) -> Result<Self> {
        if !features.is_fitted() {
            return Err(PipelineError::NotFitted("FeaturePipeline"));
        }
        if !target.is_fitted() {
            return Err(PipelineError::NotFitted("TargetPipeline"));
        }
        Ok(Self {
            features,
            target,
            model,
            precision,
        })
    }

    pub fn load(layout: &ArtifactLayout, kind: ModelKind, precision: u32) -> Result<Self> {
        let features = FeaturePipeline::load(layout.feature_transformer())?;
        let target = TargetPipeline::load(layout.target_transformer())?;
        let model_path = layout.model(kind);
        if !model_path.exists() {
            return Err(PipelineError::ModelNotFound(model_path.display().to_string()));
        }
        let model = Model::load(model_path)?;
        if model.kind() != kind {
            return Err(PipelineError::InvalidModel(format!(
                "{} holds a {} model",
                layout.model(kind).display(),
                model.kind()
            )));
        }
        tracing::info!("Loaded {} model with {} features", kind, features.n_features_out());
        Self::new(features, target, model, precision)
    }

    pub fn model_kind(&self) -> ModelKind {
        self.model.kind()
    }

    /// Признаки -> модель -> обратное преобразование цели -> округление
    pub fn predict(&self, house: &HouseFeatures) -> Result<f64> {
        let encoded = self.features.transform(&house.to_table()?)?;
        let scaled = self.model.predict(&encoded)?;
        let price = self.target.inverse_transform(&Array1::from_elem(1, scaled[0]))?[0];
        let rounded = round_to(price, self.precision);
        if !rounded.is_finite() {
            return Err(PipelineError::Training(format!("model produced a non-finite price ({})", price)));
        }
        Ok(rounded)
    }
}

pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub log: Arc<Mutex<PredictionLog>>,
}

impl AppState {
    pub fn new(service: PredictionService, log: PredictionLog) -> Self {
        Self {
            service: Arc::new(service),
            log: Arc::new(Mutex::new(log)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .layer(cors)
        .with_state(state)
}

/// Ошибка запроса в формате `{success: false, error}`
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Prediction failed: {}", self.message);
        } else {
            tracing::warn!("Rejected prediction request: {}", self.message);
        }
        let body = ErrorResponse {
            success: false,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "House Price Prediction API (Rust)",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.service.model_kind().to_string()
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn predict(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PredictionRequest>, JsonRejection>,
) -> std::result::Result<Json<PredictionResponse>, ApiError> {
    let Json(request) = payload?;
    let house = request.features()?;
    tracing::info!("Predict request from {}: area {}", request.name, house.area);

    let predicted_price = state.service.predict(&house)?;

    let log = state.log.lock().await;
    let id = log.append(&request.name, &house, predicted_price)?;
    tracing::debug!("Logged prediction {} = {}", id, predicted_price);

    Ok(Json(PredictionResponse {
        success: true,
        predicted_price,
        message: "Prediction completed successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_precision() {
        assert_eq!(round_to(4_235_812.3456, 2), 4_235_812.35);
        assert_eq!(round_to(1.5, 0), 2.0);
        assert_eq!(round_to(-2.345, 1), -2.3);
    }

    #[test]
    fn test_error_status_mapping() {
        let client: ApiError = PipelineError::UnknownCategory {
            column: "furnishingstatus".to_string(),
            value: "luxury".to_string(),
        }
        .into();
        assert_eq!(client.status, StatusCode::BAD_REQUEST);

        let server: ApiError = PipelineError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")).into();
        assert_eq!(server.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
