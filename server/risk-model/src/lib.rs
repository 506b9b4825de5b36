//! PushLog Build Risk Model: P(CI failure) for a pull request.
//!
//! One feature transform and one schema alignment serve both offline training
//! and live scoring, so a record encodes identically in both. Training
//! oversamples the failure class, searches a random forest, and selects among
//! candidates by failure recall; the result is one versioned bundle that
//! [`RiskContext`] loads for scoring.

pub mod bundle;
pub mod config;
pub mod dataset;
pub mod decision;
pub mod deterministic;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod resample;
pub mod schema;
pub mod search;
pub mod selector;
pub mod threshold;
pub mod train;
pub mod tree;
pub mod types;

pub use bundle::{ArtifactBundle, BUNDLE_FORMAT_VERSION};
pub use config::TrainingConfig;
pub use decision::RiskContext;
pub use error::{ArtifactError, InputError, ScoreError, TrainError};
pub use schema::{SchemaRegistry, UnknownCategoryPolicy};
pub use train::{train, train_from_csv};
pub use types::{HistoricalRecord, RawRecord, RiskAssessment};

/// Initialise `tracing` for a binary: `RUST_LOG` if set, else `info`.
pub fn init_tracing() {
  let filter = tracing_subscriber::EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .try_init();
}
