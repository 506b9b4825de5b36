//! Candidate classifiers and the persisted model representation.

pub mod boosting;
pub mod forest;
pub mod logistic;

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::TrainError;

pub use boosting::{BoostedModel, BoostingConfig, GradientBoosting};
pub use forest::{ForestModel, ForestParams, RandomForest};
pub use logistic::{LogisticConfig, LogisticModel, LogisticRegression};

/// Probability at or above which `predict` says "failure".
pub const DEFAULT_CUT: f64 = 0.5;

/// A fitted classifier mapping an aligned vector to P(failure).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainedModel {
  LogisticRegression(LogisticModel),
  RandomForest(ForestModel),
  GradientBoosting(BoostedModel),
}

impl TrainedModel {
  pub fn predict_proba(&self, row: &[f64]) -> f64 {
    match self {
      Self::LogisticRegression(m) => m.predict_proba(row),
      Self::RandomForest(m) => m.predict_proba(row),
      Self::GradientBoosting(m) => m.predict_proba(row),
    }
  }

  pub fn predict_proba_all(&self, rows: &[Vec<f64>]) -> Vec<f64> {
    rows.iter().map(|r| self.predict_proba(r)).collect()
  }

  /// Hard labels at the 0.5 cut.
  pub fn predict_all(&self, rows: &[Vec<f64>]) -> Vec<u8> {
    rows
      .iter()
      .map(|r| u8::from(self.predict_proba(r) >= DEFAULT_CUT))
      .collect()
  }

  /// Input width the model was fit on.
  pub fn feature_count(&self) -> usize {
    match self {
      Self::LogisticRegression(m) => m.weights.len(),
      Self::RandomForest(m) => m.feature_count,
      Self::GradientBoosting(m) => m.feature_count,
    }
  }

  /// Internal consistency of a model read from disk.
  pub fn is_well_formed(&self) -> bool {
    match self {
      Self::LogisticRegression(m) => m.is_well_formed(),
      Self::RandomForest(m) => m.is_well_formed(),
      Self::GradientBoosting(m) => m.is_well_formed(),
    }
  }
}

/// A candidate configuration that can be fit on a balanced training set.
pub trait Estimator: Send + Sync {
  fn name(&self) -> &str;
  fn fit(&self, data: &Dataset) -> Result<TrainedModel, TrainError>;
}

/// Numerically stable logistic function.
pub fn sigmoid(z: f64) -> f64 {
  if z >= 0.0 {
    1.0 / (1.0 + (-z).exp())
  } else {
    let e = z.exp();
    e / (1.0 + e)
  }
}

pub(crate) fn labels_as_f64(labels: &[u8]) -> Vec<f64> {
  labels.iter().map(|&l| f64::from(l)).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sigmoid_is_stable_at_extremes() {
    assert_eq!(sigmoid(0.0), 0.5);
    assert!(sigmoid(800.0) <= 1.0);
    assert!(sigmoid(-800.0) >= 0.0);
    assert!(sigmoid(-800.0).is_finite());
    assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-12);
  }

  #[test]
  fn model_serializes_with_kind_tag() {
    let model = TrainedModel::LogisticRegression(LogisticModel {
      means: vec![0.0],
      scales: vec![1.0],
      weights: vec![2.0],
      intercept: -1.0,
    });
    let json = serde_json::to_value(&model).unwrap();
    assert_eq!(json["kind"], "logistic_regression");
    let back: TrainedModel = serde_json::from_value(json).unwrap();
    assert_eq!(back, model);
    assert_eq!(back.feature_count(), 1);
    assert_eq!(back.predict_all(&[vec![0.0], vec![1.0]]), vec![0, 1]);
  }
}
