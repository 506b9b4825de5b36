//! Training configuration with the documented defaults.
//!
//! Every field has a default, so a TOML file only needs the values it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::models::boosting::BoostingConfig;
use crate::models::logistic::LogisticConfig;
use crate::resample::ResampleConfig;
use crate::schema::UnknownCategoryPolicy;
use crate::search::SearchConfig;

/// Knobs for one offline training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
  /// Share of rows held out for evaluation (stratified).
  pub test_size: f64,
  /// Base seed for the split, oversampling, search and every tree.
  pub seed: u64,
  /// Use this cut instead of the F1-optimal one chosen on the evaluation split.
  pub fixed_threshold: Option<f64>,
  pub unknown_category: UnknownCategoryPolicy,
  /// Only used with the `reserve` policy.
  pub min_category_count: usize,
  pub resample: ResampleConfig,
  pub search: SearchConfig,
  pub logistic: LogisticConfig,
  pub boosting: BoostingConfig,
}

impl Default for TrainingConfig {
  fn default() -> Self {
    Self {
      test_size: 0.2,
      seed: 42,
      fixed_threshold: None,
      unknown_category: UnknownCategoryPolicy::Ignore,
      min_category_count: 1,
      resample: ResampleConfig::default(),
      search: SearchConfig::default(),
      logistic: LogisticConfig::default(),
      boosting: BoostingConfig::default(),
    }
  }
}

impl TrainingConfig {
  pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
    let config: Self = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    Self::from_toml_str(&raw)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(self.test_size > 0.0 && self.test_size < 1.0) {
      return Err(ConfigError::invalid("test_size", "must be between 0 and 1 (exclusive)"));
    }
    if let Some(t) = self.fixed_threshold {
      if !(0.0..=1.0).contains(&t) {
        return Err(ConfigError::invalid("fixed_threshold", "must lie in [0, 1]"));
      }
    }
    if self.resample.k_neighbors == 0 {
      return Err(ConfigError::invalid("resample.k_neighbors", "must be at least 1"));
    }
    if self.search.n_iter == 0 {
      return Err(ConfigError::invalid("search.n_iter", "must be at least 1"));
    }
    if self.search.cv_folds < 2 {
      return Err(ConfigError::invalid("search.cv_folds", "must be at least 2"));
    }
    if self.search.space.is_empty() {
      return Err(ConfigError::invalid("search.space", "every parameter needs at least one value"));
    }
    if self.logistic.c <= 0.0 {
      return Err(ConfigError::invalid("logistic.c", "must be positive"));
    }
    if self.boosting.n_rounds == 0 {
      return Err(ConfigError::invalid("boosting.n_rounds", "must be at least 1"));
    }
    if !(self.boosting.learning_rate > 0.0 && self.boosting.learning_rate <= 1.0) {
      return Err(ConfigError::invalid("boosting.learning_rate", "must lie in (0, 1]"));
    }
    Ok(())
  }
}
