//! Risk decision: score one raw record against a loaded bundle.
//!
//! A [`RiskContext`] is built once from a verified bundle and never changes;
//! it is shared read-only between request handlers.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::Path;
use uuid::Uuid;

use crate::bundle::ArtifactBundle;
use crate::error::{ArtifactError, ScoreError};
use crate::features::transform;
use crate::models::TrainedModel;
use crate::schema::SchemaRegistry;
use crate::types::{RawRecord, RiskAssessment};

#[derive(Debug, Clone)]
pub struct RiskContext {
  schema: SchemaRegistry,
  model: TrainedModel,
  threshold: f64,
  model_name: String,
  bundle_id: Uuid,
  trained_at: DateTime<Utc>,
}

impl RiskContext {
  pub fn from_bundle(bundle: ArtifactBundle) -> Result<Self, ArtifactError> {
    bundle.verify()?;
    Ok(Self {
      schema: bundle.schema,
      model: bundle.model,
      threshold: bundle.threshold,
      model_name: bundle.model_name,
      bundle_id: bundle.bundle_id,
      trained_at: bundle.trained_at,
    })
  }

  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactError> {
    Self::from_bundle(ArtifactBundle::load(path)?)
  }

  /// transform -> align -> P(failure) -> rounded score and label.
  pub fn score(&self, record: &RawRecord) -> Result<RiskAssessment, ScoreError> {
    let features = transform(record)?;
    let aligned = self.schema.align(&features)?;
    if aligned.len() != self.model.feature_count() {
      return Err(ScoreError::Inference(format!(
        "aligned width {} does not match model width {}",
        aligned.len(),
        self.model.feature_count()
      )));
    }

    let p = self.model.predict_proba(aligned.as_slice());
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
      return Err(ScoreError::Inference(format!("model produced {}", p)));
    }

    Ok(RiskAssessment {
      risk_score: round_score(p),
      high_risk: p >= self.threshold,
      threshold: self.threshold,
    })
  }

  pub fn score_json(&self, body: &Value) -> Result<RiskAssessment, ScoreError> {
    let record = RawRecord::from_json(body)?;
    self.score(&record)
  }

  pub fn schema(&self) -> &SchemaRegistry {
    &self.schema
  }

  pub fn threshold(&self) -> f64 {
    self.threshold
  }

  pub fn model_name(&self) -> &str {
    &self.model_name
  }

  pub fn bundle_id(&self) -> Uuid {
    self.bundle_id
  }

  pub fn trained_at(&self) -> DateTime<Utc> {
    self.trained_at
  }
}

/// Round to 4 decimal places.
pub fn round_score(p: f64) -> f64 {
  (p * 10_000.0).round() / 10_000.0
}
