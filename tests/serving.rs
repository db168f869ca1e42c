mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use house_price_ml::serving::{router, AppState, PredictionService};
use house_price_ml::storage::PredictionLog;
use house_price_ml::{ModelKind, Pipeline, PipelineError};

struct TestApp {
    _dir: tempfile::TempDir,
    app: Router,
    state: AppState,
}

fn trained_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(dir.path());
    let pipeline = Pipeline::new(config.clone());
    pipeline.run(ModelKind::Linear).unwrap();

    let service = PredictionService::load(&config.layout(), ModelKind::Linear, config.serving.precision).unwrap();
    let log = PredictionLog::open(&config.serving.database).unwrap();
    let state = AppState::new(service, log);
    TestApp {
        _dir: dir,
        app: router(state.clone()),
        state,
    }
}

async fn post_json(app: &Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn log_count(state: &AppState) -> usize {
    state.log.lock().await.count().unwrap()
}

#[tokio::test]
async fn test_predict_logs_prediction() {
    let test = trained_app();
    let before = log_count(&test.state).await;

    let (status, body) = post_json(
        &test.app,
        json!({
            "name": "Alice",
            "area": 7420,
            "bedrooms": 4,
            "bathrooms": 2,
            "stories": 3,
            "mainroad": 1,
            "guestroom": 1,
            "basement": 1,
            "hotwaterheating": 1,
            "airconditioning": 1,
            "parking": 2,
            "prefarea": 1,
            "furnishingstatus": "furnished"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);
    let price = body["predicted_price"].as_f64().unwrap();
    assert!(price > 0.0, "price = {}", price);
    assert_eq!((price * 100.0).round() / 100.0, price);
    assert_eq!(log_count(&test.state).await, before + 1);

    let recent = test.state.log.lock().await.recent(1).unwrap();
    assert_eq!(recent[0].name, "Alice");
    assert_eq!(recent[0].predicted_price, price);
    assert!(recent[0].features.airconditioning);
}

#[tokio::test]
async fn test_form_style_fields_are_accepted() {
    let test = trained_app();

    let (status, body) = post_json(
        &test.app,
        json!({
            "area": "5000",
            "bedrooms": "3",
            "bathrooms": "1",
            "stories": "2",
            "mainroad": "yes",
            "parking": "1"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    let recent = test.state.log.lock().await.recent(1).unwrap();
    assert_eq!(recent[0].name, "Anonymous");
    assert_eq!(recent[0].features.furnishingstatus, "unfurnished");
    assert!(!recent[0].features.guestroom);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected_without_logging() {
    let test = trained_app();
    let before = log_count(&test.state).await;

    let (status, body) = post_json(&test.app, json!({ "area": 7420, "furnishingstatus": "luxury" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("luxury"));

    let (status, body) = post_json(&test.app, json!({ "area": "big" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = post_json(&test.app, json!({ "mainroad": 2 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(log_count(&test.state).await, before);
}

#[tokio::test]
async fn test_health_and_root() {
    let test = trained_app();

    let response = test
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = test
        .app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["model"], "linear");
}

#[test]
fn test_service_requires_trained_model() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(dir.path());
    let pipeline = Pipeline::new(config.clone());
    pipeline.ingest().unwrap();
    pipeline.clean().unwrap();
    pipeline.split().unwrap();
    pipeline.engineer().unwrap();

    let err = PredictionService::load(&config.layout(), ModelKind::Stacking, 2).unwrap_err();
    assert!(matches!(err, PipelineError::ModelNotFound(_)));
}
