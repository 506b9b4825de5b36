//! Request and response bodies for the prediction service.

use chrono::{DateTime, Utc};
use risk_model::{RawRecord, UnknownCategoryPolicy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SERVICE_UNAVAILABLE: &str = "service unavailable";
pub const BAD_REQUEST: &str = "bad request";
pub const PREDICTION_FAILED: &str = "prediction failed";

/// Every non-2xx body. `error` is one of the stable categories above.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
  pub error: String,
  #[serde(skip_serializing_if = "Option::is_none", default)]
  pub detail: Option<String>,
}

impl ErrorBody {
  pub fn new(category: &str) -> Self {
    Self {
      error: category.to_string(),
      detail: None,
    }
  }

  pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
    self.detail = Some(detail.into());
    self
  }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelInfo {
  pub bundle_id: Uuid,
  pub trained_at: DateTime<Utc>,
  pub model_name: String,
  pub threshold: f64,
  pub schema_fingerprint: String,
  pub unknown_category: UnknownCategoryPolicy,
  pub columns: Vec<String>,
}

/// The parts of a GitHub `pull_request` webhook delivery we read.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
  pub action: String,
  pub repository: Repository,
  pub pull_request: PullRequestPayload,
}

impl PullRequestEvent {
  /// Only new code is scored: a PR being opened or receiving new commits.
  pub fn is_scored_action(&self) -> bool {
    matches!(self.action.as_str(), "opened" | "synchronize")
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
  pub id: u64,
  #[serde(default)]
  pub full_name: String,
}

/// Webhook deliveries carry the full pull request, counts included.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestPayload {
  pub id: u64,
  pub number: u64,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub additions: Option<u64>,
  #[serde(default)]
  pub deletions: Option<u64>,
  #[serde(default)]
  pub changed_files: Option<u64>,
  #[serde(default)]
  pub commits: Option<u64>,
  #[serde(default)]
  pub comments: Option<u64>,
  #[serde(default)]
  pub author_association: Option<String>,
}

impl PullRequestPayload {
  /// Same field names as the training table; absent counts stay absent.
  pub fn to_record(&self) -> RawRecord {
    RawRecord::new()
      .with("lines_added", self.additions)
      .with("lines_deleted", self.deletions)
      .with("files_changed", self.changed_files)
      .with("commits", self.commits)
      .with("comments", self.comments)
      .with("author_association", self.author_association.clone())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPrediction {
  pub id: u64,
  pub repo_id: u64,
  pub repo_full_name: String,
  pub pr_id: u64,
  pub pr_number: u64,
  pub pr_title: String,
  pub risk_score: f64,
  pub high_risk: bool,
  pub threshold: f64,
  pub status: String,
  pub created_at: DateTime<Utc>,
}

/// 200 body of the webhook: `scored` with the stored prediction, or `ignored`.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
  pub status: String,
  #[serde(skip_serializing_if = "Option::is_none", default)]
  pub prediction: Option<StoredPrediction>,
}

impl WebhookAck {
  pub fn ignored() -> Self {
    Self {
      status: "ignored".to_string(),
      prediction: None,
    }
  }

  pub fn scored(prediction: StoredPrediction) -> Self {
    Self {
      status: "scored".to_string(),
      prediction: Some(prediction),
    }
  }
}
