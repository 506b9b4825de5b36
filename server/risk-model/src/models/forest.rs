//! Random forest of Gini CART trees, built in parallel.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{labels_as_f64, Estimator, TrainedModel};
use crate::dataset::Dataset;
use crate::deterministic::stream_rng;
use crate::error::TrainError;
use crate::tree::{Criterion, Tree, TreeBuilder, TreeParams};

/// One point of the random-forest hyperparameter space.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForestParams {
  pub n_estimators: usize,
  /// `None` means unbounded.
  pub max_depth: Option<usize>,
  pub min_samples_split: usize,
  pub min_samples_leaf: usize,
  pub bootstrap: bool,
}

impl Default for ForestParams {
  fn default() -> Self {
    Self {
      n_estimators: 100,
      max_depth: None,
      min_samples_split: 2,
      min_samples_leaf: 1,
      bootstrap: true,
    }
  }
}

impl fmt::Display for ForestParams {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let depth = self.max_depth.map_or_else(|| "none".to_string(), |d| d.to_string());
    write!(
      f,
      "n_estimators={} max_depth={} min_samples_split={} min_samples_leaf={} bootstrap={}",
      self.n_estimators, depth, self.min_samples_split, self.min_samples_leaf, self.bootstrap
    )
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
  pub params: ForestParams,
  pub feature_count: usize,
  pub trees: Vec<Tree>,
}

impl ForestModel {
  /// Mean of the trees' leaf failure fractions.
  pub fn predict_proba(&self, row: &[f64]) -> f64 {
    if self.trees.is_empty() {
      return 0.0;
    }
    self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / self.trees.len() as f64
  }

  pub(crate) fn is_well_formed(&self) -> bool {
    !self.trees.is_empty() && self.trees.iter().all(|t| t.is_well_formed(self.feature_count))
  }
}

pub struct RandomForest {
  params: ForestParams,
  seed: u64,
}

impl RandomForest {
  pub fn new(params: ForestParams, seed: u64) -> Self {
    Self { params, seed }
  }

  pub fn params(&self) -> &ForestParams {
    &self.params
  }

  /// Fit without the `TrainedModel` wrapper; used by the search.
  pub fn fit_forest(&self, data: &Dataset) -> Result<ForestModel, TrainError> {
    if data.is_empty() {
      return Err(TrainError::EmptyDataset);
    }
    let n = data.len();
    let d = data.feature_count;
    let labels = labels_as_f64(&data.labels);
    let ones = vec![1.0; n];

    let tree_params = TreeParams {
      max_depth: self.params.max_depth,
      min_samples_split: self.params.min_samples_split,
      min_samples_leaf: self.params.min_samples_leaf,
      max_features: Some(max_features(d)),
    };
    let builder = TreeBuilder::new(&data.features, &labels, &ones, tree_params, Criterion::Gini);

    let trees = (0..self.params.n_estimators)
      .into_par_iter()
      .map(|i| {
        let mut rng = stream_rng(self.seed, i as u64);
        let rows: Vec<usize> = if self.params.bootstrap {
          (0..n).map(|_| rng.gen_range(0..n)).collect()
        } else {
          (0..n).collect()
        };
        builder.build(&rows, &mut rng)
      })
      .collect();

    Ok(ForestModel {
      params: self.params.clone(),
      feature_count: d,
      trees,
    })
  }
}

impl Estimator for RandomForest {
  fn name(&self) -> &str {
    "tuned_random_forest"
  }

  fn fit(&self, data: &Dataset) -> Result<TrainedModel, TrainError> {
    Ok(TrainedModel::RandomForest(self.fit_forest(data)?))
  }
}

/// `floor(sqrt(d))`, at least 1.
fn max_features(d: usize) -> usize {
  ((d as f64).sqrt() as usize).max(1)
}
