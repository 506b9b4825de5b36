//! Structured error types for the risk model.

use thiserror::Error;

/// A live or historical record that cannot be encoded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
  #[error("record must be a JSON object")]
  NotAnObject,

  #[error("missing required field: {field}")]
  Missing { field: String },

  #[error("field {field} must be numeric")]
  NotNumeric { field: String },

  #[error("field {field} must be non-negative")]
  Negative { field: String },

  #[error("field {field} must be a string")]
  NotText { field: String },

  #[error("derived field {field} is not finite")]
  Overflow { field: String },

  #[error("unknown author_association category: {category}")]
  UnknownCategory { category: String },
}

impl InputError {
  pub fn missing(field: &str) -> Self {
    Self::Missing {
      field: field.to_string(),
    }
  }

  pub fn not_numeric(field: &str) -> Self {
    Self::NotNumeric {
      field: field.to_string(),
    }
  }

  pub fn negative(field: &str) -> Self {
    Self::Negative {
      field: field.to_string(),
    }
  }

  pub fn not_text(field: &str) -> Self {
    Self::NotText {
      field: field.to_string(),
    }
  }

  pub fn overflow(field: &str) -> Self {
    Self::Overflow {
      field: field.to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
  #[error("schema has no columns")]
  Empty,

  #[error("duplicate column: {0}")]
  DuplicateColumn(String),
}

/// Statistical preconditions of the imbalance corrector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResampleError {
  #[error("insufficient minority data: found {found} failure examples, need at least {required}")]
  InsufficientMinorityData { found: usize, required: usize },

  #[error("training split has no {class} examples")]
  MissingClass { class: &'static str },
}

#[derive(Debug, Error)]
pub enum DatasetError {
  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  #[error("csv: {0}")]
  Csv(#[from] csv::Error),

  #[error("row {row}: build_status must be 0 or 1, got {value}")]
  InvalidLabel { row: usize, value: u8 },

  #[error("row {row}: {source}")]
  Encode { row: usize, source: InputError },

  #[error("dataset is empty")]
  Empty,
}

/// Loading or saving the persisted artifact bundle.
#[derive(Debug, Error)]
pub enum ArtifactError {
  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("unsupported bundle format version {found} (expected {expected})")]
  UnsupportedVersion { found: u32, expected: u32 },

  #[error("schema mismatch: {0}")]
  SchemaMismatch(String),

  #[error("threshold {0} is outside [0, 1]")]
  InvalidThreshold(f64),

  #[error("schema: {0}")]
  Schema(#[from] SchemaError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  #[error("toml: {0}")]
  Toml(#[from] toml::de::Error),

  #[error("invalid config: {field}: {reason}")]
  Invalid { field: String, reason: String },
}

impl ConfigError {
  pub fn invalid(field: &str, reason: &str) -> Self {
    Self::Invalid {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }
}

#[derive(Debug, Error)]
pub enum TrainError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Dataset(#[from] DatasetError),

  #[error(transparent)]
  Resample(#[from] ResampleError),

  #[error(transparent)]
  Artifact(#[from] ArtifactError),

  #[error("dataset has no {class} examples")]
  MissingClass { class: &'static str },

  #[error("evaluation split received no failure examples")]
  NoEvaluationFailures,

  #[error("cannot fit a model on an empty dataset")]
  EmptyDataset,

  #[error("no candidate models configured")]
  NoCandidates,
}

/// Failure while scoring a single live record.
#[derive(Debug, Error)]
pub enum ScoreError {
  #[error(transparent)]
  Input(#[from] InputError),

  #[error("inference failed: {0}")]
  Inference(String),
}

impl ScoreError {
  /// True when the caller sent a bad record (as opposed to a server-side fault).
  pub fn is_bad_request(&self) -> bool {
    matches!(self, Self::Input(_))
  }
}
