//! Gradient-boosted trees on logistic loss (second-order, XGBoost-style).

use serde::{Deserialize, Serialize};

use super::{labels_as_f64, sigmoid, Estimator, TrainedModel};
use crate::dataset::Dataset;
use crate::deterministic::stream_rng;
use crate::error::TrainError;
use crate::tree::{Criterion, Tree, TreeBuilder, TreeParams};

const MIN_HESSIAN: f64 = 1e-16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingConfig {
  pub n_rounds: usize,
  pub max_depth: usize,
  pub learning_rate: f64,
  /// L2 penalty on leaf values.
  pub lambda: f64,
  /// Minimum hessian sum per child.
  pub min_child_weight: f64,
}

impl Default for BoostingConfig {
  fn default() -> Self {
    Self {
      n_rounds: 100,
      max_depth: 6,
      learning_rate: 0.3,
      lambda: 1.0,
      min_child_weight: 1.0,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoostedModel {
  pub base_margin: f64,
  pub feature_count: usize,
  /// Leaf values already include the learning rate.
  pub trees: Vec<Tree>,
}

impl BoostedModel {
  pub fn predict_proba(&self, row: &[f64]) -> f64 {
    sigmoid(self.margin(row))
  }

  fn margin(&self, row: &[f64]) -> f64 {
    self.base_margin + self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
  }

  pub(crate) fn is_well_formed(&self) -> bool {
    self.base_margin.is_finite() && self.trees.iter().all(|t| t.is_well_formed(self.feature_count))
  }
}

pub struct GradientBoosting {
  config: BoostingConfig,
  seed: u64,
}

impl GradientBoosting {
  pub fn new(config: BoostingConfig, seed: u64) -> Self {
    Self { config, seed }
  }
}

impl Estimator for GradientBoosting {
  fn name(&self) -> &str {
    "gradient_boosting"
  }

  fn fit(&self, data: &Dataset) -> Result<TrainedModel, TrainError> {
    if data.is_empty() {
      return Err(TrainError::EmptyDataset);
    }
    let n = data.len();
    let y = labels_as_f64(&data.labels);
    let criterion = Criterion::Newton {
      lambda: self.config.lambda,
      min_child_weight: self.config.min_child_weight,
      eta: self.config.learning_rate,
    };
    let params = TreeParams {
      max_depth: Some(self.config.max_depth),
      ..TreeParams::default()
    };
    let rows: Vec<usize> = (0..n).collect();

    // base_score 0.5
    let base_margin = 0.0;
    let mut margins = vec![base_margin; n];
    let mut trees = Vec::with_capacity(self.config.n_rounds);
    let mut grads = vec![0.0; n];
    let mut hess = vec![0.0; n];

    for round in 0..self.config.n_rounds {
      for i in 0..n {
        let p = sigmoid(margins[i]);
        grads[i] = p - y[i];
        hess[i] = (p * (1.0 - p)).max(MIN_HESSIAN);
      }

      let tree = TreeBuilder::new(&data.features, &grads, &hess, params.clone(), criterion)
        .build(&rows, &mut stream_rng(self.seed, round as u64));
      for (m, row) in margins.iter_mut().zip(&data.features) {
        *m += tree.predict(row);
      }
      trees.push(tree);
    }

    Ok(TrainedModel::GradientBoosting(BoostedModel {
      base_margin,
      feature_count: data.feature_count,
      trees,
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fits_threshold_rule() {
    let mut ds = Dataset::new(Vec::new(), Vec::new());
    for i in 0..60 {
      ds.push(vec![i as f64, (i % 7) as f64], u8::from(i % 20 < 5));
    }
    let config = BoostingConfig {
      n_rounds: 20,
      ..BoostingConfig::default()
    };
    let model = GradientBoosting::new(config, 42).fit(&ds).unwrap();
    let TrainedModel::GradientBoosting(boosted) = &model else {
      panic!("wrong model kind");
    };
    assert_eq!(boosted.trees.len(), 20);
    assert!(model.predict_proba(&[2.0, 2.0]) > 0.5);
    assert!(model.predict_proba(&[12.0, 5.0]) < 0.5);
    assert!(model.is_well_formed());
  }

  #[test]
  fn zero_rounds_predicts_base_score() {
    let ds = Dataset::new(vec![vec![1.0], vec![2.0]], vec![0, 1]);
    let config = BoostingConfig {
      n_rounds: 0,
      ..BoostingConfig::default()
    };
    let model = GradientBoosting::new(config, 0).fit(&ds).unwrap();
    assert_eq!(model.predict_proba(&[1.0]), 0.5);
  }
}
