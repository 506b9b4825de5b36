//! Randomized hyperparameter search over the random forest.
//!
//! Samples distinct points of a fixed grid without replacement and scores
//! each by stratified k-fold mean failure recall. Trials run on rayon; each
//! trial's forest seed is derived from the base seed and the trial index.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::deterministic::derive_seed;
use crate::error::TrainError;
use crate::metrics::ClassificationReport;
use crate::models::{ForestParams, RandomForest};

/// Candidate values per forest hyperparameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSpace {
  pub n_estimators: Vec<usize>,
  pub max_depth: Vec<Option<usize>>,
  pub min_samples_split: Vec<usize>,
  pub min_samples_leaf: Vec<usize>,
  pub bootstrap: Vec<bool>,
}

impl Default for SearchSpace {
  fn default() -> Self {
    Self {
      n_estimators: vec![100, 200, 300],
      max_depth: vec![Some(10), Some(20), Some(30), None],
      min_samples_split: vec![2, 5, 10],
      min_samples_leaf: vec![1, 2, 4],
      bootstrap: vec![true, false],
    }
  }
}

impl SearchSpace {
  pub fn len(&self) -> usize {
    self.n_estimators.len()
      * self.max_depth.len()
      * self.min_samples_split.len()
      * self.min_samples_leaf.len()
      * self.bootstrap.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Every grid point, in a fixed nested order (last parameter varies fastest).
  pub fn combinations(&self) -> Vec<ForestParams> {
    let mut out = Vec::with_capacity(self.len());
    for &n_estimators in &self.n_estimators {
      for &max_depth in &self.max_depth {
        for &min_samples_split in &self.min_samples_split {
          for &min_samples_leaf in &self.min_samples_leaf {
            for &bootstrap in &self.bootstrap {
              out.push(ForestParams {
                n_estimators,
                max_depth,
                min_samples_split,
                min_samples_leaf,
                bootstrap,
              });
            }
          }
        }
      }
    }
    out
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
  pub n_iter: usize,
  pub cv_folds: usize,
  /// Not read from TOML; the grid is fixed unless set in code.
  #[serde(skip)]
  pub space: SearchSpace,
}

impl Default for SearchConfig {
  fn default() -> Self {
    Self {
      n_iter: 50,
      cv_folds: 3,
      space: SearchSpace::default(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
  pub trial: usize,
  pub params: ForestParams,
  pub mean_recall: f64,
  pub fold_recalls: Vec<f64>,
}

/// Persisted in the bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSummary {
  pub best_params: ForestParams,
  pub best_cv_recall: f64,
  pub best_trial: usize,
  pub n_trials: usize,
  pub cv_folds: usize,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
  pub summary: SearchSummary,
  pub trials: Vec<TrialResult>,
}

pub struct RandomizedSearch {
  config: SearchConfig,
  seed: u64,
}

impl RandomizedSearch {
  pub fn new(config: SearchConfig, seed: u64) -> Self {
    Self { config, seed }
  }

  /// Grid points to evaluate, in trial order.
  pub fn sample(&self) -> Vec<ForestParams> {
    let grid = self.config.space.combinations();
    if self.config.n_iter >= grid.len() {
      return grid;
    }
    let mut rng = StdRng::seed_from_u64(self.seed);
    rand::seq::index::sample(&mut rng, grid.len(), self.config.n_iter)
      .into_iter()
      .map(|i| grid[i].clone())
      .collect()
  }

  /// Score every sampled point; the best mean recall wins, ties keep the
  /// lower trial index.
  pub fn run(&self, data: &Dataset) -> Result<SearchOutcome, TrainError> {
    if data.is_empty() {
      return Err(TrainError::EmptyDataset);
    }
    let candidates = self.sample();
    if candidates.is_empty() {
      return Err(TrainError::NoCandidates);
    }
    let folds = data.stratified_folds(self.config.cv_folds);
    info!(
      "randomized search: {} trials x {} folds on {} rows",
      candidates.len(),
      folds.len(),
      data.len()
    );

    let trials = candidates
      .into_par_iter()
      .enumerate()
      .map(|(trial, params)| -> Result<TrialResult, TrainError> {
        let forest = RandomForest::new(params.clone(), derive_seed(self.seed, trial as u64));
        let mut fold_recalls = Vec::with_capacity(folds.len());
        for (train_idx, test_idx) in &folds {
          let model = forest.fit_forest(&data.subset(train_idx))?;
          let test = data.subset(test_idx);
          let predicted: Vec<u8> = test
            .features
            .iter()
            .map(|row| u8::from(model.predict_proba(row) >= 0.5))
            .collect();
          fold_recalls.push(ClassificationReport::from_labels(&predicted, &test.labels).failure_recall());
        }
        let mean_recall = fold_recalls.iter().sum::<f64>() / fold_recalls.len() as f64;
        debug!("trial {} ({}): mean recall {:.4}", trial, params, mean_recall);
        Ok(TrialResult {
          trial,
          params,
          mean_recall,
          fold_recalls,
        })
      })
      .collect::<Result<Vec<_>, TrainError>>()?;

    let best = best_trial(&trials).ok_or(TrainError::NoCandidates)?;
    let summary = SearchSummary {
      best_params: best.params.clone(),
      best_cv_recall: best.mean_recall,
      best_trial: best.trial,
      n_trials: trials.len(),
      cv_folds: folds.len(),
    };
    info!(
      "best search parameters ({}): cv recall {:.4}",
      summary.best_params, summary.best_cv_recall
    );

    Ok(SearchOutcome { summary, trials })
  }
}

fn best_trial(trials: &[TrialResult]) -> Option<&TrialResult> {
  let mut best: Option<&TrialResult> = None;
  for t in trials {
    if best.map_or(true, |b| t.mean_recall > b.mean_recall) {
      best = Some(t);
    }
  }
  best
}
