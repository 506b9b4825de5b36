//! Binary classification metrics with "failure" as the positive class.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{FAILURE, SUCCESS};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
  pub tp: usize,
  pub tn: usize,
  pub fp: usize,
  pub fn_: usize,
}

impl ConfusionMatrix {
  pub fn from_labels(predicted: &[u8], actual: &[u8]) -> Self {
    let mut m = Self::default();
    for (&p, &a) in predicted.iter().zip(actual) {
      match (p == FAILURE, a == FAILURE) {
        (true, true) => m.tp += 1,
        (false, false) => m.tn += 1,
        (true, false) => m.fp += 1,
        (false, true) => m.fn_ += 1,
      }
    }
    m
  }

  pub fn total(&self) -> usize {
    self.tp + self.tn + self.fp + self.fn_
  }

  pub fn accuracy(&self) -> f64 {
    ratio(self.tp + self.tn, self.total())
  }

  /// Metrics for one class, treating it as the positive one.
  pub fn class_metrics(&self, class: u8) -> ClassMetrics {
    let (tp, fp, fn_) = if class == FAILURE {
      (self.tp, self.fp, self.fn_)
    } else {
      (self.tn, self.fn_, self.fp)
    };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall == 0.0 {
      0.0
    } else {
      2.0 * precision * recall / (precision + recall)
    };
    ClassMetrics {
      precision,
      recall,
      f1,
      support: tp + fn_,
    }
  }
}

/// 0 when the denominator is 0.
fn ratio(num: usize, den: usize) -> f64 {
  if den == 0 {
    0.0
  } else {
    num as f64 / den as f64
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
  pub precision: f64,
  pub recall: f64,
  pub f1: f64,
  pub support: usize,
}

/// Per-class precision/recall/F1/support plus accuracy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
  pub success: ClassMetrics,
  pub failure: ClassMetrics,
  pub accuracy: f64,
  pub confusion: ConfusionMatrix,
}

impl ClassificationReport {
  pub fn from_labels(predicted: &[u8], actual: &[u8]) -> Self {
    let confusion = ConfusionMatrix::from_labels(predicted, actual);
    Self {
      success: confusion.class_metrics(SUCCESS),
      failure: confusion.class_metrics(FAILURE),
      accuracy: confusion.accuracy(),
      confusion,
    }
  }

  /// The selection criterion.
  pub fn failure_recall(&self) -> f64 {
    self.failure.recall
  }
}

impl fmt::Display for ClassificationReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "{:>12} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
    for (name, m) in [("0 (success)", &self.success), ("1 (failure)", &self.failure)] {
      writeln!(
        f,
        "{:>12} {:>9.4} {:>9.4} {:>9.4} {:>9}",
        name, m.precision, m.recall, m.f1, m.support
      )?;
    }
    write!(f, "{:>12} {:>29.4} {:>9}", "accuracy", self.accuracy, self.confusion.total())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn report_matches_hand_counts() {
    let actual = [1, 1, 1, 0, 0, 0, 0, 0];
    let predicted = [1, 1, 0, 1, 0, 0, 0, 0];
    let r = ClassificationReport::from_labels(&predicted, &actual);

    assert_eq!(r.confusion, ConfusionMatrix { tp: 2, tn: 4, fp: 1, fn_: 1 });
    assert!((r.failure.recall - 2.0 / 3.0).abs() < 1e-12);
    assert!((r.failure.precision - 2.0 / 3.0).abs() < 1e-12);
    assert_eq!(r.failure.support, 3);
    assert_eq!(r.success.recall, 0.8);
    assert_eq!(r.success.support, 5);
    assert_eq!(r.accuracy, 0.75);
  }

  #[test]
  fn no_positives_gives_zero_recall() {
    let r = ClassificationReport::from_labels(&[0, 0], &[0, 0]);
    assert_eq!(r.failure_recall(), 0.0);
    assert_eq!(r.failure.f1, 0.0);
  }

  #[test]
  fn display_lists_both_classes() {
    let text = ClassificationReport::from_labels(&[1, 0], &[1, 0]).to_string();
    assert!(text.contains("1 (failure)"));
    assert!(text.contains("accuracy"));
  }
}
