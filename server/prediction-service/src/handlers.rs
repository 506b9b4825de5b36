//! HTTP handlers for the prediction service.

use axum::{
  extract::{rejection::JsonRejection, Path, State},
  http::{HeaderMap, StatusCode},
  response::{IntoResponse, Response},
  Json,
};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::state::AppState;
use crate::types::{
  ErrorBody, ModelInfo, PullRequestEvent, WebhookAck, BAD_REQUEST, PREDICTION_FAILED, SERVICE_UNAVAILABLE,
};

/// Header naming the webhook event type.
pub const GITHUB_EVENT_HEADER: &str = "x-github-event";

pub async fn health() -> &'static str {
  "ok"
}

pub async fn predict(State(state): State<Arc<AppState>>, body: Result<Json<Value>, JsonRejection>) -> Response {
  let request_id = Uuid::new_v4();

  let context = match &state.context {
    Some(c) => c,
    None => {
      warn!(%request_id, "predict: no model loaded");
      return error_response(StatusCode::SERVICE_UNAVAILABLE, ErrorBody::new(SERVICE_UNAVAILABLE));
    }
  };

  let Json(body) = match body {
    Ok(b) => b,
    Err(rejection) => {
      warn!(%request_id, "predict: unreadable body: {}", rejection);
      return error_response(
        StatusCode::BAD_REQUEST,
        ErrorBody::new(BAD_REQUEST).with_detail(rejection.body_text()),
      );
    }
  };

  match context.score_json(&body) {
    Ok(assessment) => {
      info!(
        %request_id,
        risk_score = assessment.risk_score,
        high_risk = assessment.high_risk,
        "predict: scored"
      );
      (StatusCode::OK, Json(assessment)).into_response()
    }
    Err(e) if e.is_bad_request() => {
      warn!(%request_id, "predict: invalid input: {}", e);
      error_response(StatusCode::BAD_REQUEST, ErrorBody::new(BAD_REQUEST).with_detail(e.to_string()))
    }
    Err(e) => {
      error!(%request_id, "predict: {}", e);
      error_response(StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::new(PREDICTION_FAILED))
    }
  }
}

/// GitHub webhook receiver. `pull_request` opened/synchronize deliveries are
/// scored and recorded per repository; every other delivery is acknowledged
/// and ignored.
pub async fn github_webhook(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  body: Result<Json<Value>, JsonRejection>,
) -> Response {
  let request_id = Uuid::new_v4();
  let event_type = headers
    .get(GITHUB_EVENT_HEADER)
    .and_then(|v| v.to_str().ok())
    .unwrap_or_default();
  info!(%request_id, event_type, "webhook: received");
  if event_type != "pull_request" {
    return (StatusCode::OK, Json(WebhookAck::ignored())).into_response();
  }

  let event: PullRequestEvent = match body.map_err(|r| r.body_text()).and_then(|Json(v)| {
    serde_json::from_value::<PullRequestEvent>(v).map_err(|e| e.to_string())
  }) {
    Ok(e) => e,
    Err(detail) => {
      warn!(%request_id, "webhook: unreadable pull_request payload: {}", detail);
      return error_response(StatusCode::BAD_REQUEST, ErrorBody::new(BAD_REQUEST).with_detail(detail));
    }
  };
  if !event.is_scored_action() {
    return (StatusCode::OK, Json(WebhookAck::ignored())).into_response();
  }

  let context = match &state.context {
    Some(c) => c,
    None => {
      warn!(%request_id, "webhook: no model loaded");
      return error_response(StatusCode::SERVICE_UNAVAILABLE, ErrorBody::new(SERVICE_UNAVAILABLE));
    }
  };

  let pr = &event.pull_request;
  match context.score(&pr.to_record()) {
    Ok(assessment) => {
      let stored = state.predictions.record(&event, &assessment);
      info!(
        %request_id,
        repo = %event.repository.full_name,
        pr = pr.number,
        risk_score = assessment.risk_score,
        high_risk = assessment.high_risk,
        "webhook: scored"
      );
      (StatusCode::OK, Json(WebhookAck::scored(stored))).into_response()
    }
    Err(e) if e.is_bad_request() => {
      warn!(%request_id, pr = pr.number, "webhook: invalid input: {}", e);
      error_response(StatusCode::BAD_REQUEST, ErrorBody::new(BAD_REQUEST).with_detail(e.to_string()))
    }
    Err(e) => {
      error!(%request_id, pr = pr.number, "webhook: {}", e);
      error_response(StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::new(PREDICTION_FAILED))
    }
  }
}

/// Webhook predictions for one repository, oldest first.
pub async fn repo_predictions(State(state): State<Arc<AppState>>, Path(repo_id): Path<u64>) -> Response {
  (StatusCode::OK, Json(state.predictions.for_repo(repo_id))).into_response()
}

pub async fn model_info(State(state): State<Arc<AppState>>) -> Response {
  let context = match &state.context {
    Some(c) => c,
    None => return error_response(StatusCode::SERVICE_UNAVAILABLE, ErrorBody::new(SERVICE_UNAVAILABLE)),
  };
  let schema = context.schema();
  let info = ModelInfo {
    bundle_id: context.bundle_id(),
    trained_at: context.trained_at(),
    model_name: context.model_name().to_string(),
    threshold: context.threshold(),
    schema_fingerprint: schema.fingerprint(),
    unknown_category: schema.unknown_category(),
    columns: schema.columns().to_vec(),
  };
  (StatusCode::OK, Json(info)).into_response()
}

/// Handler panics become the generic 500 body; the panic message stays in the log.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
  let message = if let Some(s) = err.downcast_ref::<String>() {
    s.clone()
  } else if let Some(s) = err.downcast_ref::<&str>() {
    s.to_string()
  } else {
    "unknown panic".to_string()
  };
  error!("handler panicked: {}", message);
  error_response(StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::new(PREDICTION_FAILED))
}

fn error_response(status: StatusCode, body: ErrorBody) -> Response {
  (status, Json(body)).into_response()
}
