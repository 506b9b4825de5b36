//! L2-regularised logistic regression on standardised inputs.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{labels_as_f64, sigmoid, Estimator, TrainedModel};
use crate::dataset::Dataset;
use crate::error::TrainError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticConfig {
  /// Inverse regularisation strength.
  pub c: f64,
  pub max_iter: usize,
  pub learning_rate: f64,
  /// Stop when every gradient component is below this.
  pub tolerance: f64,
}

impl Default for LogisticConfig {
  fn default() -> Self {
    Self {
      c: 1.0,
      max_iter: 1000,
      learning_rate: 0.1,
      tolerance: 1e-6,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
  pub means: Vec<f64>,
  pub scales: Vec<f64>,
  pub weights: Vec<f64>,
  pub intercept: f64,
}

impl LogisticModel {
  pub fn predict_proba(&self, row: &[f64]) -> f64 {
    sigmoid(self.margin(row))
  }

  fn margin(&self, row: &[f64]) -> f64 {
    self.intercept
      + row
        .iter()
        .zip(&self.means)
        .zip(&self.scales)
        .zip(&self.weights)
        .map(|(((x, m), s), w)| w * (x - m) / s)
        .sum::<f64>()
  }

  pub(crate) fn is_well_formed(&self) -> bool {
    let n = self.weights.len();
    self.means.len() == n
      && self.scales.len() == n
      && self.scales.iter().all(|s| s.is_finite() && *s > 0.0)
      && self.means.iter().chain(&self.weights).all(|v| v.is_finite())
      && self.intercept.is_finite()
  }
}

pub struct LogisticRegression {
  config: LogisticConfig,
}

impl LogisticRegression {
  pub fn new(config: LogisticConfig) -> Self {
    Self { config }
  }
}

impl Estimator for LogisticRegression {
  fn name(&self) -> &str {
    "logistic_regression"
  }

  /// Full-batch gradient descent on mean log-loss plus `|w|^2 / (2 C n)`.
  /// The intercept is not penalised.
  fn fit(&self, data: &Dataset) -> Result<TrainedModel, TrainError> {
    if data.is_empty() {
      return Err(TrainError::EmptyDataset);
    }
    let n = data.len() as f64;
    let d = data.feature_count;
    let (means, scales) = standardisation(&data.features, d);
    let x: Vec<Vec<f64>> = data
      .features
      .iter()
      .map(|row| row.iter().zip(&means).zip(&scales).map(|((v, m), s)| (v - m) / s).collect())
      .collect();
    let y = labels_as_f64(&data.labels);

    let penalty = 1.0 / (self.config.c * n);
    let lr = self.config.learning_rate;
    let mut weights = vec![0.0; d];
    let mut intercept = 0.0;
    let mut iterations = 0;

    for _ in 0..self.config.max_iter {
      iterations += 1;
      let mut grad_w = vec![0.0; d];
      let mut grad_b: f64 = 0.0;

      for (row, target) in x.iter().zip(&y) {
        let z = intercept + row.iter().zip(&weights).map(|(a, w)| a * w).sum::<f64>();
        let err = sigmoid(z) - target;
        grad_b += err;
        for (g, a) in grad_w.iter_mut().zip(row) {
          *g += err * a;
        }
      }

      grad_b /= n;
      for (g, w) in grad_w.iter_mut().zip(&weights) {
        *g = *g / n + penalty * w;
      }

      intercept -= lr * grad_b;
      for (w, g) in weights.iter_mut().zip(&grad_w) {
        *w -= lr * g;
      }

      let largest = grad_w.iter().fold(grad_b.abs(), |acc, g| acc.max(g.abs()));
      if largest < self.config.tolerance {
        break;
      }
    }
    debug!("logistic regression converged after {} iterations", iterations);

    Ok(TrainedModel::LogisticRegression(LogisticModel {
      means,
      scales,
      weights,
      intercept,
    }))
  }
}

/// Column means and population standard deviations; constant columns scale by 1.
fn standardisation(rows: &[Vec<f64>], d: usize) -> (Vec<f64>, Vec<f64>) {
  let n = rows.len() as f64;
  let mut means = vec![0.0; d];
  for row in rows {
    for (m, v) in means.iter_mut().zip(row) {
      *m += v;
    }
  }
  for m in &mut means {
    *m /= n;
  }

  let mut scales = vec![0.0; d];
  for row in rows {
    for ((s, v), m) in scales.iter_mut().zip(row).zip(&means) {
      *s += (v - m) * (v - m);
    }
  }
  for s in &mut scales {
    *s = (*s / n).sqrt();
    if !(s.is_finite() && *s > 0.0) {
      *s = 1.0;
    }
  }
  (means, scales)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn learns_a_monotone_boundary() {
    let mut ds = Dataset::new(Vec::new(), Vec::new());
    for i in 0..40 {
      ds.push(vec![i as f64, 3.0], u8::from(i >= 20));
    }
    let model = LogisticRegression::new(LogisticConfig::default()).fit(&ds).unwrap();
    assert!(model.predict_proba(&[2.0, 3.0]) < 0.2);
    assert!(model.predict_proba(&[38.0, 3.0]) > 0.8);
    assert!(model.is_well_formed());
  }

  #[test]
  fn constant_columns_do_not_break_scaling() {
    let (means, scales) = standardisation(&[vec![1.0, 5.0], vec![3.0, 5.0]], 2);
    assert_eq!(means, vec![2.0, 5.0]);
    assert_eq!(scales, vec![1.0, 1.0]);
  }

  #[test]
  fn empty_dataset_is_an_error() {
    let ds = Dataset::new(Vec::new(), Vec::new());
    assert!(matches!(
      LogisticRegression::new(LogisticConfig::default()).fit(&ds),
      Err(TrainError::EmptyDataset)
    ));
  }
}
