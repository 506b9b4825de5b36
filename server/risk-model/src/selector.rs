//! Model selection by failure-class recall on the untouched evaluation split.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::TrainingConfig;
use crate::dataset::Dataset;
use crate::error::TrainError;
use crate::metrics::ClassificationReport;
use crate::models::{Estimator, ForestParams, GradientBoosting, LogisticRegression, RandomForest, TrainedModel};

/// One candidate's result on the evaluation split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvaluation {
  pub name: String,
  /// Position in the candidate list; lower wins ties.
  pub priority: usize,
  pub report: ClassificationReport,
}

#[derive(Debug, Clone)]
pub struct Selection {
  pub name: String,
  pub model: TrainedModel,
  pub evaluations: Vec<CandidateEvaluation>,
}

pub struct ModelSelector {
  candidates: Vec<Box<dyn Estimator>>,
}

impl ModelSelector {
  /// Candidates in priority order.
  pub fn new(candidates: Vec<Box<dyn Estimator>>) -> Self {
    Self { candidates }
  }

  /// logistic_regression, tuned_random_forest, gradient_boosting.
  pub fn standard(config: &TrainingConfig, tuned: ForestParams) -> Self {
    Self::new(vec![
      Box::new(LogisticRegression::new(config.logistic.clone())),
      Box::new(RandomForest::new(tuned, config.seed)),
      Box::new(GradientBoosting::new(config.boosting.clone(), config.seed)),
    ])
  }

  pub fn names(&self) -> Vec<&str> {
    self.candidates.iter().map(|c| c.name()).collect()
  }

  /// Fit every candidate on `train`, score each on `eval` at the 0.5 cut,
  /// keep the one with strictly highest failure recall.
  pub fn select(&self, train: &Dataset, eval: &Dataset) -> Result<Selection, TrainError> {
    let mut fitted = Vec::with_capacity(self.candidates.len());
    let mut evaluations = Vec::with_capacity(self.candidates.len());

    for (priority, candidate) in self.candidates.iter().enumerate() {
      let model = candidate.fit(train)?;
      let report = ClassificationReport::from_labels(&model.predict_all(&eval.features), &eval.labels);
      info!(
        "candidate {} (failure recall {:.4}):\n{}",
        candidate.name(),
        report.failure_recall(),
        report
      );
      evaluations.push(CandidateEvaluation {
        name: candidate.name().to_string(),
        priority,
        report,
      });
      fitted.push(model);
    }

    let recalls: Vec<f64> = evaluations.iter().map(|e| e.report.failure_recall()).collect();
    let best = pick_best(&recalls).ok_or(TrainError::NoCandidates)?;
    let name = evaluations[best].name.clone();
    info!("selected {} with failure recall {:.4}", name, recalls[best]);

    Ok(Selection {
      name,
      model: fitted.swap_remove(best),
      evaluations,
    })
  }
}

/// Index of the strictly highest score; equal scores keep the earlier index.
pub fn pick_best(scores: &[f64]) -> Option<usize> {
  let mut best: Option<usize> = None;
  for (i, &s) in scores.iter().enumerate() {
    if best.map_or(true, |b| s > scores[b]) {
      best = Some(i);
    }
  }
  best
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::LogisticModel;

  /// Always predicts the same probability.
  struct Constant {
    name: &'static str,
    p: f64,
  }

  impl Estimator for Constant {
    fn name(&self) -> &str {
      self.name
    }

    fn fit(&self, data: &Dataset) -> Result<TrainedModel, TrainError> {
      let d = data.feature_count;
      Ok(TrainedModel::LogisticRegression(LogisticModel {
        means: vec![0.0; d],
        scales: vec![1.0; d],
        weights: vec![0.0; d],
        intercept: (self.p / (1.0 - self.p)).ln(),
      }))
    }
  }

  fn eval() -> Dataset {
    Dataset::new(vec![vec![0.0]; 4], vec![0, 0, 1, 1])
  }

  #[test]
  fn strictly_higher_recall_wins() {
    assert_eq!(pick_best(&[0.5, 0.8, 0.7]), Some(1));
  }

  #[test]
  fn equal_recall_keeps_priority_order() {
    assert_eq!(pick_best(&[0.8, 0.8, 0.8]), Some(0));
    assert_eq!(pick_best(&[0.2, 0.9, 0.9]), Some(1));
    assert_eq!(pick_best(&[]), None);
  }

  #[test]
  fn select_reports_every_candidate() {
    let selector = ModelSelector::new(vec![
      Box::new(Constant { name: "never", p: 0.1 }),
      Box::new(Constant { name: "always", p: 0.9 }),
      Box::new(Constant { name: "always_too", p: 0.95 }),
    ]);
    let data = eval();
    let selection = selector.select(&data, &data).unwrap();

    assert_eq!(selection.name, "always");
    assert_eq!(selection.evaluations.len(), 3);
    assert_eq!(selection.evaluations[0].report.failure_recall(), 0.0);
    assert_eq!(selection.evaluations[2].priority, 2);
    assert!(selection.model.predict_proba(&[0.0]) > 0.5);
  }

  #[test]
  fn standard_candidates_in_priority_order() {
    let selector = ModelSelector::standard(&TrainingConfig::default(), ForestParams::default());
    assert_eq!(
      selector.names(),
      vec!["logistic_regression", "tuned_random_forest", "gradient_boosting"]
    );
  }

  #[test]
  fn no_candidates_is_an_error() {
    let data = eval();
    assert!(matches!(
      ModelSelector::new(Vec::new()).select(&data, &data),
      Err(TrainError::NoCandidates)
    ));
  }
}
