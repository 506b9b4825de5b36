//! Drive the router in-process.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use prediction_service::{panic_response, router, AppState, GITHUB_EVENT_HEADER};
use risk_model::models::{LogisticModel, TrainedModel};
use risk_model::{ArtifactBundle, RiskContext, SchemaRegistry, UnknownCategoryPolicy};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn bundle(weights: impl Fn(usize) -> Vec<f64>, policy: UnknownCategoryPolicy) -> ArtifactBundle {
  let schema = SchemaRegistry::from_categories(["CONTRIBUTOR", "MEMBER", "NONE"], policy);
  let d = schema.len();
  let model = TrainedModel::LogisticRegression(LogisticModel {
    means: vec![0.0; d],
    scales: vec![1.0; d],
    weights: weights(d),
    intercept: 0.0,
  });
  ArtifactBundle::new(42, schema, 0.6, "logistic_regression", model)
}

/// Rises with lines_added, falls with lines_deleted.
fn sensible(d: usize) -> Vec<f64> {
  let mut w = vec![0.0; d];
  w[0] = 0.1;
  w[1] = -0.05;
  w
}

fn app_with(bundle: ArtifactBundle) -> Router {
  let context = RiskContext::from_bundle(bundle).unwrap();
  router(Arc::new(AppState::loaded(context)))
}

fn app() -> Router {
  app_with(bundle(sensible, UnknownCategoryPolicy::Ignore))
}

fn post_json(body: &str) -> Request<Body> {
  Request::builder()
    .method("POST")
    .uri("/predict")
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from(body.to_string()))
    .unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
  let res = app.oneshot(req).await.unwrap();
  let status = res.status();
  let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
  let value = serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()));
  (status, value)
}

#[tokio::test]
async fn health_is_ok() {
  let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
  let (status, body) = send(app(), req).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn predict_returns_score_label_and_threshold() {
  let (status, body) = send(app(), post_json(r#"{"lines_added": 20, "lines_deleted": 0}"#)).await;
  assert_eq!(status, StatusCode::OK);
  // sigmoid(2.0) = 0.880797...
  assert_eq!(body["risk_score"], json!(0.8808));
  assert_eq!(body["high_risk"], json!(true));
  assert_eq!(body["threshold"], json!(0.6));

  let (_, low) = send(app(), post_json(r#"{"lines_added": 5, "lines_deleted": 500}"#)).await;
  assert_eq!(low["high_risk"], json!(false));
}

#[tokio::test]
async fn missing_required_field_is_bad_request() {
  let (status, body) = send(app(), post_json(r#"{"lines_added": 20}"#)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "bad request");
}

#[tokio::test]
async fn malformed_and_non_object_bodies_are_bad_requests() {
  let (status, body) = send(app(), post_json("{not json")).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "bad request");

  let (status, _) = send(app(), post_json("[1, 2, 3]")).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn overflowing_counts_are_bad_requests() {
  let (status, body) = send(app(), post_json(r#"{"lines_added": 1e308, "lines_deleted": 1e308}"#)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "bad request");
}

#[tokio::test]
async fn unknown_category_is_ignored_or_rejected_per_bundle() {
  let body = r#"{"lines_added": 20, "lines_deleted": 0, "author_association": "FIRST_TIMER"}"#;
  let (status, _) = send(app(), post_json(body)).await;
  assert_eq!(status, StatusCode::OK);

  let strict = app_with(bundle(sensible, UnknownCategoryPolicy::Reject));
  let (status, resp) = send(strict, post_json(body)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(resp["error"], "bad request");
}

#[tokio::test]
async fn no_model_means_service_unavailable() {
  let app = router(Arc::new(AppState::unavailable()));
  let (status, body) = send(app.clone(), post_json(r#"{"lines_added": 20, "lines_deleted": 0}"#)).await;
  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
  assert_eq!(body["error"], "service unavailable");
  assert!(body.get("risk_score").is_none());

  let req = Request::builder().uri("/model").body(Body::empty()).unwrap();
  let (status, _) = send(app, req).await;
  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn missing_bundle_file_leaves_service_unavailable() {
  let dir = tempfile::tempdir().unwrap();
  let state = AppState::from_bundle_path(&dir.path().join("absent.json"));
  assert!(!state.is_ready());
}

#[tokio::test]
async fn bundle_file_is_served_after_load() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("risk_bundle.json");
  let b = bundle(sensible, UnknownCategoryPolicy::Ignore);
  let id = b.bundle_id;
  b.save(&path).unwrap();

  let app = router(Arc::new(AppState::from_bundle_path(&path)));
  let req = Request::builder().uri("/model").body(Body::empty()).unwrap();
  let (status, body) = send(app, req).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["bundle_id"], json!(id.to_string()));
  assert_eq!(body["model_name"], "logistic_regression");
  assert_eq!(body["columns"].as_array().unwrap().len(), 10);
  assert_eq!(body["unknown_category"], "ignore");
}

#[tokio::test]
async fn non_finite_model_output_is_prediction_failed() {
  // +inf and -inf contributions sum to NaN.
  let broken = bundle(
    |d| {
      let mut w = vec![0.0; d];
      w[0] = 1e308;
      w[1] = -1e308;
      w
    },
    UnknownCategoryPolicy::Ignore,
  );
  let (status, body) = send(app_with(broken), post_json(r#"{"lines_added": 10, "lines_deleted": 10}"#)).await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body, json!({"error": "prediction failed"}));
}

#[tokio::test]
async fn panics_map_to_generic_failure() {
  let res = panic_response(Box::new("boom"));
  assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
  let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
  let body: Value = serde_json::from_slice(&bytes).unwrap();
  assert_eq!(body, json!({"error": "prediction failed"}));
}

fn webhook(event: &str, body: Value) -> Request<Body> {
  Request::builder()
    .method("POST")
    .uri("/webhook/github")
    .header(header::CONTENT_TYPE, "application/json")
    .header(GITHUB_EVENT_HEADER, event)
    .body(Body::from(body.to_string()))
    .unwrap()
}

fn pull_request(action: &str, repo: u64, number: u64, additions: u64, deletions: u64) -> Value {
  json!({
    "action": action,
    "repository": {"id": repo, "full_name": "acme/widgets"},
    "pull_request": {
      "id": 9000 + number,
      "number": number,
      "title": format!("PR {}", number),
      "additions": additions,
      "deletions": deletions,
      "changed_files": 2,
      "author_association": "CONTRIBUTOR"
    }
  })
}

fn list(repo: u64) -> Request<Body> {
  Request::builder()
    .uri(format!("/predictions/{}", repo))
    .body(Body::empty())
    .unwrap()
}

#[tokio::test]
async fn opened_pull_request_is_scored_and_listed() {
  let app = app();
  let (status, body) = send(app.clone(), webhook("pull_request", pull_request("opened", 77, 5, 20, 0))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "scored");
  assert_eq!(body["prediction"]["risk_score"], json!(0.8808));
  assert_eq!(body["prediction"]["high_risk"], json!(true));
  assert_eq!(body["prediction"]["pr_number"], json!(5));

  let (_, body) = send(app.clone(), webhook("pull_request", pull_request("synchronize", 77, 6, 5, 500))).await;
  assert_eq!(body["prediction"]["high_risk"], json!(false));

  let (status, listed) = send(app.clone(), list(77)).await;
  assert_eq!(status, StatusCode::OK);
  let numbers: Vec<u64> = listed
    .as_array()
    .unwrap()
    .iter()
    .map(|p| p["pr_number"].as_u64().unwrap())
    .collect();
  assert_eq!(numbers, vec![5, 6]);

  let (_, other) = send(app, list(78)).await;
  assert_eq!(other, json!([]));
}

#[tokio::test]
async fn other_events_and_actions_are_ignored() {
  let app = app();
  let (status, body) = send(app.clone(), webhook("push", json!({"ref": "refs/heads/main"}))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "ignored");

  let (status, body) = send(app.clone(), webhook("pull_request", pull_request("closed", 77, 5, 20, 0))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "ignored");

  let (_, listed) = send(app, list(77)).await;
  assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn webhook_without_counts_is_bad_request() {
  let mut payload = pull_request("opened", 77, 5, 20, 0);
  payload["pull_request"].as_object_mut().unwrap().remove("additions");
  let (status, body) = send(app(), webhook("pull_request", payload)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "bad request");

  let (status, _) = send(app(), webhook("pull_request", json!({"action": "opened"}))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_without_model_is_unavailable() {
  let app = router(Arc::new(AppState::unavailable()));
  let (status, body) = send(app, webhook("pull_request", pull_request("opened", 77, 5, 20, 0))).await;
  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
  assert_eq!(body["error"], "service unavailable");
}
