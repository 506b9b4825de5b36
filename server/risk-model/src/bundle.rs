//! Versioned artifact bundle: schema, model and threshold in one JSON file.
//!
//! Loading is all-or-nothing. A bundle whose recorded fingerprint, model
//! width or threshold disagrees with its own contents is refused.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::error::ArtifactError;
use crate::models::TrainedModel;
use crate::resample::CorrectionReport;
use crate::schema::SchemaRegistry;
use crate::search::SearchSummary;
use crate::selector::CandidateEvaluation;

pub const BUNDLE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBundle {
  pub format_version: u32,
  pub bundle_id: Uuid,
  pub trained_at: DateTime<Utc>,
  pub seed: u64,
  pub schema: SchemaRegistry,
  pub schema_fingerprint: String,
  pub threshold: f64,
  pub model_name: String,
  pub model: TrainedModel,
  pub evaluation: Vec<CandidateEvaluation>,
  #[serde(default)]
  pub search: Option<SearchSummary>,
  #[serde(default)]
  pub resample: Option<CorrectionReport>,
}

impl ArtifactBundle {
  /// New bundle with a fresh id and timestamp; the fingerprint is computed here.
  pub fn new(
    seed: u64,
    schema: SchemaRegistry,
    threshold: f64,
    model_name: impl Into<String>,
    model: TrainedModel,
  ) -> Self {
    let schema_fingerprint = schema.fingerprint();
    Self {
      format_version: BUNDLE_FORMAT_VERSION,
      bundle_id: Uuid::new_v4(),
      trained_at: Utc::now(),
      seed,
      schema,
      schema_fingerprint,
      threshold,
      model_name: model_name.into(),
      model,
      evaluation: Vec::new(),
      search: None,
      resample: None,
    }
  }

  /// Internal consistency checks, run before save and after load.
  pub fn verify(&self) -> Result<(), ArtifactError> {
    if self.format_version != BUNDLE_FORMAT_VERSION {
      return Err(ArtifactError::UnsupportedVersion {
        found: self.format_version,
        expected: BUNDLE_FORMAT_VERSION,
      });
    }
    self.schema.validate()?;

    let fingerprint = self.schema.fingerprint();
    if fingerprint != self.schema_fingerprint {
      return Err(ArtifactError::SchemaMismatch(format!(
        "fingerprint {} does not match recorded {}",
        fingerprint, self.schema_fingerprint
      )));
    }
    if self.model.feature_count() != self.schema.len() {
      return Err(ArtifactError::SchemaMismatch(format!(
        "model expects {} features, schema has {} columns",
        self.model.feature_count(),
        self.schema.len()
      )));
    }
    if !self.model.is_well_formed() {
      return Err(ArtifactError::SchemaMismatch(
        "model parameters are inconsistent with the schema".to_string(),
      ));
    }
    if !(0.0..=1.0).contains(&self.threshold) {
      return Err(ArtifactError::InvalidThreshold(self.threshold));
    }
    Ok(())
  }

  /// Verify, then write atomically (temp file + rename).
  pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ArtifactError> {
    self.verify()?;
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(self)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    info!("wrote bundle {} to {}", self.bundle_id, path.display());
    Ok(())
  }

  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactError> {
    let bytes = std::fs::read(path.as_ref())?;
    Self::from_slice(&bytes)
  }

  pub fn from_slice(bytes: &[u8]) -> Result<Self, ArtifactError> {
    let bundle: Self = serde_json::from_slice(bytes)?;
    bundle.verify()?;
    Ok(bundle)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::LogisticModel;
  use crate::schema::UnknownCategoryPolicy;

  fn bundle() -> ArtifactBundle {
    let schema = SchemaRegistry::from_categories(["MEMBER", "NONE"], UnknownCategoryPolicy::Ignore);
    let d = schema.len();
    let model = TrainedModel::LogisticRegression(LogisticModel {
      means: vec![0.0; d],
      scales: vec![1.0; d],
      weights: vec![0.1; d],
      intercept: -1.0,
    });
    ArtifactBundle::new(42, schema, 0.4, "logistic_regression", model)
  }

  #[test]
  fn save_then_load_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models").join("risk_bundle.json");
    let b = bundle();
    b.save(&path).unwrap();
    assert_eq!(ArtifactBundle::load(&path).unwrap(), b);
    assert!(!path.with_extension("json.tmp").exists());
  }

  #[test]
  fn tampered_columns_are_a_schema_mismatch() {
    let mut json = serde_json::to_value(bundle()).unwrap();
    json["schema"]["columns"][5] = serde_json::Value::String("author_OWNER".into());
    let bytes = serde_json::to_vec(&json).unwrap();
    assert!(matches!(
      ArtifactBundle::from_slice(&bytes),
      Err(ArtifactError::SchemaMismatch(_))
    ));
  }

  #[test]
  fn width_mismatch_is_refused() {
    let mut b = bundle();
    b.model = TrainedModel::LogisticRegression(LogisticModel {
      means: vec![0.0; 3],
      scales: vec![1.0; 3],
      weights: vec![0.0; 3],
      intercept: 0.0,
    });
    assert!(matches!(b.verify(), Err(ArtifactError::SchemaMismatch(_))));
  }

  #[test]
  fn out_of_range_threshold_is_refused() {
    let mut b = bundle();
    b.threshold = 1.5;
    assert!(matches!(b.verify(), Err(ArtifactError::InvalidThreshold(t)) if t == 1.5));
  }

  #[test]
  fn unknown_version_is_refused() {
    let mut b = bundle();
    b.format_version = 99;
    assert!(matches!(
      b.verify(),
      Err(ArtifactError::UnsupportedVersion { found: 99, expected: 1 })
    ));
  }

  #[test]
  fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      ArtifactBundle::load(dir.path().join("absent.json")),
      Err(ArtifactError::Io(_))
    ));
  }
}
