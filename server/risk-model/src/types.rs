//! Record and vector types shared by training and serving.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::InputError;

/// build_status label for a green build.
pub const SUCCESS: u8 = 0;
/// build_status label for a broken build (the class we optimise recall for).
pub const FAILURE: u8 = 1;

// ---------------------------------------------------------------------------
// Historical rows (CSV contract between collector and trainer)
// ---------------------------------------------------------------------------

/// One labeled row of the collector CSV. Empty cells deserialize to `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
  pub pr_number: u64,
  #[serde(default)]
  pub lines_added: Option<u64>,
  #[serde(default)]
  pub lines_deleted: Option<u64>,
  #[serde(default)]
  pub files_changed: Option<u64>,
  #[serde(default)]
  pub commits: Option<u64>,
  #[serde(default)]
  pub comments: Option<u64>,
  #[serde(default)]
  pub author_association: Option<String>,
  pub build_status: u8,
}

// ---------------------------------------------------------------------------
// Raw records (what the feature transform consumes)
// ---------------------------------------------------------------------------

/// A raw change record: field name to JSON value, any subset present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
  fields: Map<String, Value>,
}

impl RawRecord {
  pub fn new() -> Self {
    Self::default()
  }

  /// Wrap a live JSON request body. Only objects are records.
  pub fn from_json(value: &Value) -> Result<Self, InputError> {
    match value {
      Value::Object(fields) => Ok(Self {
        fields: fields.clone(),
      }),
      _ => Err(InputError::NotAnObject),
    }
  }

  pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
    self.fields.insert(field.to_string(), value.into());
    self
  }

  pub fn get(&self, field: &str) -> Option<&Value> {
    self.fields.get(field)
  }

  pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
    self.fields.iter()
  }
}

/// Historical rows are filled the way the training table is: missing counts are 0,
/// a missing or empty author produces no category at all.
impl From<&HistoricalRecord> for RawRecord {
  fn from(r: &HistoricalRecord) -> Self {
    let mut record = RawRecord::new()
      .with("lines_added", r.lines_added.unwrap_or(0))
      .with("lines_deleted", r.lines_deleted.unwrap_or(0))
      .with("files_changed", r.files_changed.unwrap_or(0))
      .with("commits", r.commits.unwrap_or(0))
      .with("comments", r.comments.unwrap_or(0));
    if let Some(author) = r.author_association.as_deref().filter(|a| !a.is_empty()) {
      record = record.with("author_association", author);
    }
    record
  }
}

// ---------------------------------------------------------------------------
// Feature vectors
// ---------------------------------------------------------------------------

/// Unaligned features: an arbitrary column set keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
  values: BTreeMap<String, f64>,
}

impl FeatureVector {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, name: impl Into<String>, value: f64) {
    self.values.insert(name.into(), value);
  }

  pub fn get(&self, name: &str) -> Option<f64> {
    self.values.get(name).copied()
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
    self.values.iter().map(|(k, v)| (k.as_str(), *v))
  }
}

impl<S: Into<String>> FromIterator<(S, f64)> for FeatureVector {
  fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
    Self {
      values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
    }
  }
}

/// Features in schema-registry order, ready for a model.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedVector(pub Vec<f64>);

impl AlignedVector {
  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn as_slice(&self) -> &[f64] {
    &self.0
  }
}

// ---------------------------------------------------------------------------
// Decision output (JSON contract with callers)
// ---------------------------------------------------------------------------

/// Scored live record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
  /// P(build failure), rounded to 4 decimal places.
  pub risk_score: f64,
  /// True when the unrounded probability reaches `threshold`.
  pub high_risk: bool,
  pub threshold: f64,
}
