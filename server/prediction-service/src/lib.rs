//! PushLog Build Risk Prediction Service
//!
//! HTTP shell around [`risk_model::RiskContext`]. Bind to 127.0.0.1 by default.

mod handlers;
mod state;
mod store;
mod types;

use axum::{routing::get, routing::post, Router};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use handlers::{
  github_webhook, health, model_info, panic_response, predict, repo_predictions, GITHUB_EVENT_HEADER,
};
pub use state::AppState;
pub use store::{PredictionStore, MAX_PER_REPO};
pub use types::{
  ErrorBody, ModelInfo, PullRequestEvent, StoredPrediction, WebhookAck, BAD_REQUEST, PREDICTION_FAILED,
  SERVICE_UNAVAILABLE,
};

pub fn router(state: Arc<AppState>) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/model", get(model_info))
    .route("/predict", post(predict))
    .route("/webhook/github", post(github_webhook))
    .route("/predictions/:repo_id", get(repo_predictions))
    .layer(CatchPanicLayer::custom(panic_response))
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
    .with_state(state)
}
