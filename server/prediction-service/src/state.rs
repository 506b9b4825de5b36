//! Shared service state: the read-only scoring context plus webhook history.

use risk_model::RiskContext;
use std::path::Path;
use tracing::{info, warn};

use crate::store::PredictionStore;

/// `context` is `None` when no usable bundle was found at startup; every
/// prediction then answers "service unavailable".
pub struct AppState {
  pub context: Option<RiskContext>,
  pub predictions: PredictionStore,
}

impl AppState {
  pub fn loaded(context: RiskContext) -> Self {
    Self {
      context: Some(context),
      predictions: PredictionStore::new(),
    }
  }

  pub fn unavailable() -> Self {
    Self {
      context: None,
      predictions: PredictionStore::new(),
    }
  }

  /// Load the bundle at `path`; a missing or invalid bundle is logged and
  /// leaves the service unavailable.
  pub fn from_bundle_path(path: &Path) -> Self {
    match RiskContext::load(path) {
      Ok(context) => {
        info!(
          "loaded bundle {} ({}, threshold {:.4}, {} columns) from {}",
          context.bundle_id(),
          context.model_name(),
          context.threshold(),
          context.schema().len(),
          path.display()
        );
        Self::loaded(context)
      }
      Err(e) => {
        warn!("no usable bundle at {}: {}", path.display(), e);
        Self::unavailable()
      }
    }
  }

  pub fn is_ready(&self) -> bool {
    self.context.is_some()
  }
}
