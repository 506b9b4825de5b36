//! Decision threshold chosen on the evaluation split.

use crate::types::FAILURE;

pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Cut maximizing failure-class F1 when labeling `p >= t` as failure.
///
/// Candidates are the distinct predicted probabilities. Equal F1 keeps the
/// lower cut. Without any failure in `labels` the default 0.5 is returned.
pub fn optimal_threshold(scores: &[f64], labels: &[u8]) -> f64 {
  let positives = labels.iter().filter(|&&l| l == FAILURE).count();
  if positives == 0 || scores.is_empty() {
    return DEFAULT_THRESHOLD;
  }

  let mut pairs: Vec<(f64, bool)> = scores
    .iter()
    .zip(labels)
    .filter(|(s, _)| s.is_finite())
    .map(|(&s, &l)| (s, l == FAILURE))
    .collect();
  // Descending, so each prefix is the set predicted positive.
  pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

  let mut best = (f64::NEG_INFINITY, DEFAULT_THRESHOLD);
  let mut tp = 0usize;
  let mut predicted = 0usize;
  let mut i = 0;
  while i < pairs.len() {
    let cut = pairs[i].0;
    while i < pairs.len() && pairs[i].0 == cut {
      predicted += 1;
      tp += usize::from(pairs[i].1);
      i += 1;
    }
    let f1 = 2.0 * tp as f64 / (predicted + positives) as f64;
    // Cuts arrive in descending order: ">=" moves ties to the lower cut.
    if f1 >= best.0 {
      best = (f1, cut);
    }
  }

  best.1.clamp(0.0, 1.0)
}
