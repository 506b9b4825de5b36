//! Imbalance corrector: SMOTE oversampling of the failure class.
//!
//! Applied to the training split only. Synthetic failures are interpolated
//! between a real failure and one of its nearest failure neighbours, never
//! copied, until both classes have the same count.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::{ClassCounts, Dataset};
use crate::error::ResampleError;
use crate::types::FAILURE;

/// Interpolation needs a sample plus at least two neighbours.
pub const MIN_MINORITY_SAMPLES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleConfig {
  /// Neighbours considered per minority sample (clamped to minority - 1).
  pub k_neighbors: usize,
}

impl Default for ResampleConfig {
  fn default() -> Self {
    Self { k_neighbors: 5 }
  }
}

/// What one correction run did; persisted with the bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionReport {
  pub seed: u64,
  pub k_neighbors: usize,
  pub before: ClassCounts,
  pub after: ClassCounts,
  pub synthetic: usize,
}

pub struct ImbalanceCorrector {
  config: ResampleConfig,
  seed: u64,
}

impl ImbalanceCorrector {
  pub fn new(config: ResampleConfig, seed: u64) -> Self {
    Self { config, seed }
  }

  pub fn seed(&self) -> u64 {
    self.seed
  }

  /// Return a balanced copy of `train` plus a report of what was added.
  ///
  /// A split whose failures already match or outnumber successes comes back
  /// unchanged.
  pub fn correct(&self, train: &Dataset) -> Result<(Dataset, CorrectionReport), ResampleError> {
    let before = train.class_counts();
    if before.failure == 0 {
      return Err(ResampleError::MissingClass { class: "failure" });
    }
    if before.success == 0 {
      return Err(ResampleError::MissingClass { class: "success" });
    }

    if before.failure >= before.success {
      debug!("training split already balanced; skipping oversampling");
      return Ok((
        train.clone(),
        CorrectionReport {
          seed: self.seed,
          k_neighbors: 0,
          before,
          after: before,
          synthetic: 0,
        },
      ));
    }

    if before.failure < MIN_MINORITY_SAMPLES {
      return Err(ResampleError::InsufficientMinorityData {
        found: before.failure,
        required: MIN_MINORITY_SAMPLES,
      });
    }

    let minority: Vec<usize> = (0..train.len()).filter(|&i| train.labels[i] == FAILURE).collect();
    let k = self.config.k_neighbors.clamp(1, minority.len() - 1);
    let neighbors = nearest_neighbors(train, &minority, k);

    let synthetic = before.success - before.failure;
    let mut rng = StdRng::seed_from_u64(self.seed);
    let mut balanced = train.clone();

    for _ in 0..synthetic {
      let pick = rng.gen_range(0..minority.len());
      let neighbor = neighbors[pick][rng.gen_range(0..k)];
      let gap: f64 = rng.gen();

      let base = &train.features[minority[pick]];
      let other = &train.features[neighbor];
      let row = base
        .iter()
        .zip(other)
        .map(|(a, b)| a + gap * (b - a))
        .collect();
      balanced.push(row, FAILURE);
    }

    let after = balanced.class_counts();
    info!(
      "oversampled failures: {} -> {} ({} synthetic, k={}, seed={})",
      before.failure, after.failure, synthetic, k, self.seed
    );

    Ok((
      balanced,
      CorrectionReport {
        seed: self.seed,
        k_neighbors: k,
        before,
        after,
        synthetic,
      },
    ))
  }
}

/// For each minority row, the dataset indices of its `k` nearest other
/// minority rows (Euclidean; ties by index).
fn nearest_neighbors(data: &Dataset, minority: &[usize], k: usize) -> Vec<Vec<usize>> {
  minority
    .iter()
    .map(|&i| {
      let mut dists: Vec<(f64, usize)> = minority
        .iter()
        .filter(|&&j| j != i)
        .map(|&j| (squared_distance(&data.features[i], &data.features[j]), j))
        .collect();
      dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
      dists.into_iter().take(k).map(|(_, j)| j).collect()
    })
    .collect()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
  a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::SUCCESS;

  fn imbalanced(n_success: usize, n_failure: usize) -> Dataset {
    let mut ds = Dataset::new(Vec::new(), Vec::new());
    for i in 0..n_success {
      ds.push(vec![100.0 + i as f64, 200.0], SUCCESS);
    }
    for i in 0..n_failure {
      ds.push(vec![i as f64 * 2.0, 0.0], FAILURE);
    }
    ds
  }

  #[test]
  fn balances_95_to_5() {
    let train = imbalanced(95, 5);
    let corrector = ImbalanceCorrector::new(ResampleConfig::default(), 42);
    let (balanced, report) = corrector.correct(&train).unwrap();

    assert_eq!(balanced.class_counts(), ClassCounts { success: 95, failure: 95 });
    assert_eq!(report.synthetic, 90);
    assert_eq!(report.before, ClassCounts { success: 95, failure: 5 });
    assert_eq!(report.k_neighbors, 4);
    assert_eq!(report.seed, 42);
    // Originals are kept untouched at the front.
    assert_eq!(&balanced.features[..100], &train.features[..]);
  }

  #[test]
  fn synthetic_points_lie_between_minority_samples() {
    let train = imbalanced(40, 4);
    let corrector = ImbalanceCorrector::new(ResampleConfig::default(), 1);
    let (balanced, _) = corrector.correct(&train).unwrap();

    for row in &balanced.features[train.len()..] {
      // Failures span x in [0, 6] with y == 0.
      assert!(row[0] >= 0.0 && row[0] <= 6.0, "x out of hull: {}", row[0]);
      assert_eq!(row[1], 0.0);
    }
  }

  #[test]
  fn same_seed_same_output() {
    let train = imbalanced(30, 6);
    let a = ImbalanceCorrector::new(ResampleConfig::default(), 9).correct(&train).unwrap();
    let b = ImbalanceCorrector::new(ResampleConfig::default(), 9).correct(&train).unwrap();
    assert_eq!(a, b);

    let c = ImbalanceCorrector::new(ResampleConfig::default(), 10).correct(&train).unwrap();
    assert_ne!(a.0, c.0);
  }

  #[test]
  fn too_few_failures_is_an_error() {
    let train = imbalanced(20, 2);
    let err = ImbalanceCorrector::new(ResampleConfig::default(), 42)
      .correct(&train)
      .unwrap_err();
    assert_eq!(
      err,
      ResampleError::InsufficientMinorityData {
        found: 2,
        required: MIN_MINORITY_SAMPLES
      }
    );
  }

  #[test]
  fn missing_class_is_an_error() {
    let train = imbalanced(20, 0);
    let err = ImbalanceCorrector::new(ResampleConfig::default(), 42)
      .correct(&train)
      .unwrap_err();
    assert_eq!(err, ResampleError::MissingClass { class: "failure" });
  }

  #[test]
  fn balanced_input_is_returned_unchanged() {
    let train = imbalanced(5, 5);
    let (out, report) = ImbalanceCorrector::new(ResampleConfig::default(), 42)
      .correct(&train)
      .unwrap();
    assert_eq!(out, train);
    assert_eq!(report.synthetic, 0);
  }
}
