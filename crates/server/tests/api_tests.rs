//! Integration tests for the server API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use predict_lib::{
    estimator::{FailingEstimator, FixedEstimator},
    health::{components, HealthRegistry},
    models::ModelType,
    observability::{ServiceMetrics, StructuredLogger},
    registry::{ModelBundle, ModelRegistry},
};
use predict_server::api::{create_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn test_registry() -> ModelRegistry {
    ModelRegistry::from_bundles([
        ModelBundle::new(
            "expense_regressor",
            Arc::new(FixedEstimator::new(vec![4321.987])),
            vec!["flat_size".to_string(), "resident_count".to_string()],
            ModelType::Regression,
        ),
        ModelBundle::new(
            "complaint_classifier",
            Arc::new(FixedEstimator::new(vec![0.1, 0.72345, 0.17655])),
            vec!["ticket_age_days".to_string(), "priority".to_string()],
            ModelType::Classification,
        ),
        ModelBundle::new(
            "resident_segments",
            Arc::new(FixedEstimator::new(vec![2.0])),
            vec!["monthly_spend".to_string()],
            ModelType::Clustering,
        ),
        ModelBundle::new(
            "broken_model",
            Arc::new(FailingEstimator::new("tensor shape mismatch")),
            vec!["a".to_string()],
            ModelType::Regression,
        ),
    ])
    .unwrap()
}

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::REGISTRY).await;
    health_registry.register(components::PREDICTOR).await;
    health_registry.register(components::FORECASTER).await;

    let state = Arc::new(AppState::new(
        Arc::new(test_registry()),
        health_registry,
        ServiceMetrics::new(),
        StructuredLogger::new("predict-server-test"),
        None,
    ));
    let router = create_router(state.clone());

    (router, state)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_predict_regression_response_shape() {
    let (app, _state) = setup_test_app().await;

    let request = post_json(
        "/predict",
        &json!({"model": "expense_regressor", "data": {"flat_size": 3, "resident_count": 4}}),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["type"], "regression");
    assert_eq!(body["model"], "expense_regressor");
    assert_eq!(body["predicted_amount"], 4321.99);
    assert_eq!(body["risk_level"], "High");
    assert_eq!(body["confidence"], 0.85);
}

#[tokio::test]
async fn test_predict_classification_response_shape() {
    let (app, _state) = setup_test_app().await;

    let request = post_json(
        "/predict",
        &json!({"model": "complaint_classifier", "data": {"ticket_age_days": 12}}),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["type"], "classification");
    assert_eq!(body["prediction"], 1);
    assert_eq!(body["confidence"], 0.723);
}

#[tokio::test]
async fn test_predict_clustering_response_shape() {
    let (app, _state) = setup_test_app().await;

    let request = post_json(
        "/predict",
        &json!({"model": "resident_segments", "data": {"monthly_spend": 1800}}),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["type"], "clustering");
    assert_eq!(body["cluster"], 2);
}

#[tokio::test]
async fn test_predict_unknown_model_returns_404() {
    let (app, _state) = setup_test_app().await;

    let request = post_json("/predict", &json!({"model": "nonexistent", "data": {}}));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Model 'nonexistent' not found");
}

#[tokio::test]
async fn test_predict_missing_top_level_keys_returns_400() {
    let (app, _state) = setup_test_app().await;

    let request = post_json("/predict", &json!({"model": "expense_regressor"}));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Invalid input payload");
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn test_predict_unparseable_body_returns_400() {
    let (app, _state) = setup_test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Invalid input payload");
}

#[tokio::test]
async fn test_predict_estimator_failure_returns_500() {
    let (app, _state) = setup_test_app().await;

    let request = post_json("/predict", &json!({"model": "broken_model", "data": {"a": 1}}));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Prediction failed");
    assert!(body["details"]
        .as_str()
        .unwrap()
        .contains("tensor shape mismatch"));
}

#[tokio::test]
async fn test_predict_is_idempotent_against_static_registry() {
    let (app, state) = setup_test_app().await;

    let payload =
        json!({"model": "expense_regressor", "data": {"flat_size": 3, "resident_count": 4}});
    let first = app.oneshot(post_json("/predict", &payload)).await.unwrap();
    let second = create_router(state)
        .oneshot(post_json("/predict", &payload))
        .await
        .unwrap();

    assert_eq!(response_json(first).await, response_json(second).await);
}

#[tokio::test]
async fn test_maintenance_forecast_returns_three_points() {
    let (app, _state) = setup_test_app().await;

    let request = post_json(
        "/forecast/maintenance",
        &json!([
            {"ds": "2024-01", "y": 80},
            {"ds": "2024-02", "y": 82}
        ]),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let points = body.as_array().unwrap();
    assert_eq!(points.len(), 3);
    for point in points {
        let yhat = point["yhat"].as_f64().unwrap();
        let lower = point["yhat_lower"].as_f64().unwrap();
        let upper = point["yhat_upper"].as_f64().unwrap();
        assert!(lower <= yhat && yhat <= upper);
        assert!(point.get("failure_risk").is_none());
    }
}

#[tokio::test]
async fn test_maintenance_forecast_rejects_single_observation() {
    let (app, _state) = setup_test_app().await;

    let request = post_json("/forecast/maintenance", &json!([{"ds": "2024-01", "y": 80}]));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("insufficient data"));
}

#[tokio::test]
async fn test_equipment_forecast_returns_seven_flagged_points() {
    let (app, _state) = setup_test_app().await;

    let request = post_json(
        "/forecast/equipment-failure",
        &json!([
            {"ds": "2024-05-01", "y": 80, "temperature_avg": 31.0},
            {"ds": "2024-05-02", "y": 84, "temperature_avg": 32.0},
            {"ds": "2024-05-03", "y": 88, "temperature_avg": 33.0},
            {"ds": "2024-05-04", "y": 92, "temperature_avg": 34.0}
        ]),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let points = body.as_array().unwrap();
    assert_eq!(points.len(), 7);
    for point in points {
        assert_eq!(point["failure_risk"], true);
        assert!(point.get("yhat_lower").is_none());
    }
}

#[tokio::test]
async fn test_equipment_forecast_rejects_malformed_body() {
    let (app, _state) = setup_test_app().await;

    let request = post_json("/forecast/equipment-failure", &json!({"ds": "2024-05-01"}));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Invalid input payload");
}

#[tokio::test]
async fn test_healthz_returns_ok_with_component_details() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let health = response_json(response).await;
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["registry"].is_object());
    assert!(health["components"]["predictor"].is_object());
    assert!(health["components"]["forecaster"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::PREDICTOR, "Model execution failing")
        .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_readyz_flips_with_readiness() {
    let (app, state) = setup_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    state.health_registry.set_ready(true).await;
    let response = create_router(state)
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_service_metrics() {
    let (app, state) = setup_test_app().await;

    state.metrics.observe_prediction_latency(0.001);
    state.metrics.observe_forecast_latency(0.02);
    state.metrics.set_models_loaded(4);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("prediction_service_prediction_latency_seconds"));
    assert!(metrics_text.contains("prediction_service_forecast_latency_seconds"));
    assert!(metrics_text.contains("prediction_service_models_loaded"));
}
