//! CART decision tree shared by the random forest and gradient boosting.
//!
//! Exact-greedy construction over `f64` features. Each row carries a
//! (sum, weight) statistic; the criterion decides what those mean:
//!
//! - `Gini`: sum = label, weight = 1, leaf = failure fraction.
//! - `Newton`: sum = gradient, weight = hessian, leaf = -G / (H + lambda) * eta.
//!
//! Nodes are stored flat, root first; children always sit after their parent.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Minimum gain for a split to be kept.
const MIN_GAIN: f64 = 1e-12;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub feature: usize,
  pub threshold: f64,
  pub left: usize,
  pub right: usize,
  /// Set on leaves only.
  pub value: Option<f64>,
}

impl Node {
  fn leaf(value: f64) -> Self {
    Self {
      feature: 0,
      threshold: 0.0,
      left: 0,
      right: 0,
      value: Some(value),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tree {
  pub nodes: Vec<Node>,
}

impl Tree {
  /// Leaf value for `row`. Rows go left when `row[feature] <= threshold`.
  pub fn predict(&self, row: &[f64]) -> f64 {
    let mut idx = 0;
    loop {
      let node = &self.nodes[idx];
      if let Some(v) = node.value {
        return v;
      }
      idx = if row[node.feature] <= node.threshold {
        node.left
      } else {
        node.right
      };
    }
  }

  /// Structural check for trees read from disk: non-empty, children after
  /// parents (so traversal terminates), features inside `feature_count`.
  pub fn is_well_formed(&self, feature_count: usize) -> bool {
    if self.nodes.is_empty() {
      return false;
    }
    let n = self.nodes.len();
    self.nodes.iter().enumerate().all(|(i, node)| match node.value {
      Some(v) => v.is_finite(),
      None => {
        node.feature < feature_count
          && node.threshold.is_finite()
          && node.left > i
          && node.right > i
          && node.left < n
          && node.right < n
      }
    })
  }

  pub fn leaf_count(&self) -> usize {
    self.nodes.iter().filter(|n| n.value.is_some()).count()
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Criterion {
  Gini,
  Newton {
    lambda: f64,
    min_child_weight: f64,
    eta: f64,
  },
}

impl Criterion {
  /// Node score; gain = score(left) + score(right) - score(parent).
  fn score(&self, s: NodeStats) -> f64 {
    match *self {
      Criterion::Gini => {
        if s.weight <= 0.0 {
          0.0
        } else {
          -2.0 * s.sum * (s.weight - s.sum) / s.weight
        }
      }
      Criterion::Newton { lambda, .. } => s.sum * s.sum / (s.weight + lambda),
    }
  }

  fn leaf_value(&self, s: NodeStats) -> f64 {
    match *self {
      Criterion::Gini => {
        if s.weight <= 0.0 {
          0.0
        } else {
          s.sum / s.weight
        }
      }
      Criterion::Newton { lambda, eta, .. } => -s.sum / (s.weight + lambda) * eta,
    }
  }

  fn is_pure(&self, s: NodeStats) -> bool {
    match self {
      Criterion::Gini => s.sum <= 0.0 || s.sum >= s.weight,
      Criterion::Newton { .. } => false,
    }
  }

  fn child_ok(&self, s: NodeStats) -> bool {
    match *self {
      Criterion::Gini => true,
      Criterion::Newton { min_child_weight, .. } => s.weight >= min_child_weight,
    }
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct NodeStats {
  sum: f64,
  weight: f64,
}

impl NodeStats {
  fn add(&mut self, sum: f64, weight: f64) {
    self.sum += sum;
    self.weight += weight;
  }

  fn minus(self, other: NodeStats) -> NodeStats {
    NodeStats {
      sum: self.sum - other.sum,
      weight: self.weight - other.weight,
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TreeParams {
  /// `None` grows until leaves are pure or too small.
  pub max_depth: Option<usize>,
  pub min_samples_split: usize,
  pub min_samples_leaf: usize,
  /// Features examined per split; `None` examines all.
  pub max_features: Option<usize>,
}

impl Default for TreeParams {
  fn default() -> Self {
    Self {
      max_depth: None,
      min_samples_split: 2,
      min_samples_leaf: 1,
      max_features: None,
    }
  }
}

struct Split {
  feature: usize,
  threshold: f64,
  gain: f64,
}

/// Builds one tree over borrowed per-row statistics.
pub struct TreeBuilder<'a> {
  features: &'a [Vec<f64>],
  sums: &'a [f64],
  weights: &'a [f64],
  feature_count: usize,
  params: TreeParams,
  criterion: Criterion,
}

impl<'a> TreeBuilder<'a> {
  pub fn new(
    features: &'a [Vec<f64>],
    sums: &'a [f64],
    weights: &'a [f64],
    params: TreeParams,
    criterion: Criterion,
  ) -> Self {
    debug_assert_eq!(features.len(), sums.len());
    debug_assert_eq!(features.len(), weights.len());
    let feature_count = features.first().map_or(0, |r| r.len());
    Self {
      features,
      sums,
      weights,
      feature_count,
      params,
      criterion,
    }
  }

  /// Grow a tree over `rows` (indices may repeat, e.g. a bootstrap sample).
  pub fn build<R: Rng>(&self, rows: &[usize], rng: &mut R) -> Tree {
    let mut nodes = Vec::new();
    self.build_node(rows.to_vec(), 0, &mut nodes, rng);
    Tree { nodes }
  }

  fn build_node<R: Rng>(&self, rows: Vec<usize>, depth: usize, nodes: &mut Vec<Node>, rng: &mut R) -> usize {
    let current = nodes.len();
    let stats = self.stats(&rows);
    let leaf = Node::leaf(self.criterion.leaf_value(stats));

    let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
    if depth_reached
      || rows.len() < self.params.min_samples_split.max(2)
      || rows.len() < 2 * self.params.min_samples_leaf.max(1)
      || self.criterion.is_pure(stats)
    {
      nodes.push(leaf);
      return current;
    }

    let split = match self.best_split(&rows, stats, rng) {
      Some(s) => s,
      None => {
        nodes.push(leaf);
        return current;
      }
    };

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
      .into_iter()
      .partition(|&r| self.features[r][split.feature] <= split.threshold);

    nodes.push(Node {
      feature: split.feature,
      threshold: split.threshold,
      left: 0,
      right: 0,
      value: None,
    });

    let left = self.build_node(left_rows, depth + 1, nodes, rng);
    let right = self.build_node(right_rows, depth + 1, nodes, rng);
    nodes[current].left = left;
    nodes[current].right = right;

    current
  }

  fn stats(&self, rows: &[usize]) -> NodeStats {
    let mut s = NodeStats::default();
    for &r in rows {
      s.add(self.sums[r], self.weights[r]);
    }
    s
  }

  /// Best split over a random feature order. With `max_features`, the search
  /// stops once that many non-constant features were examined and a valid
  /// split exists.
  fn best_split<R: Rng>(&self, rows: &[usize], parent: NodeStats, rng: &mut R) -> Option<Split> {
    let mut order: Vec<usize> = (0..self.feature_count).collect();
    if self.params.max_features.is_some() {
      order.shuffle(rng);
    }
    let budget = self.params.max_features.unwrap_or(self.feature_count).max(1);
    let parent_score = self.criterion.score(parent);
    let min_leaf = self.params.min_samples_leaf.max(1);

    let mut best: Option<Split> = None;
    let mut examined = 0;
    let mut column: Vec<(f64, usize)> = Vec::with_capacity(rows.len());

    for feature in order {
      if examined >= budget && best.is_some() {
        break;
      }

      column.clear();
      column.extend(rows.iter().map(|&r| (self.features[r][feature], r)));
      column.sort_by(|a, b| a.0.total_cmp(&b.0));

      if column.first().map(|c| c.0) == column.last().map(|c| c.0) {
        continue;
      }
      examined += 1;

      let mut left = NodeStats::default();
      for i in 0..column.len() - 1 {
        let (value, row) = column[i];
        left.add(self.sums[row], self.weights[row]);

        let next = column[i + 1].0;
        if value >= next {
          continue;
        }
        let n_left = i + 1;
        if n_left < min_leaf || column.len() - n_left < min_leaf {
          continue;
        }
        let right = parent.minus(left);
        if !self.criterion.child_ok(left) || !self.criterion.child_ok(right) {
          continue;
        }

        let gain = self.criterion.score(left) + self.criterion.score(right) - parent_score;
        if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
          best = Some(Split {
            feature,
            threshold: midpoint(value, next),
            gain,
          });
        }
      }
    }

    best
  }
}

/// Split point strictly below `hi`, so `lo` goes left and `hi` goes right.
fn midpoint(lo: f64, hi: f64) -> f64 {
  let mid = lo / 2.0 + hi / 2.0;
  if mid >= lo && mid < hi {
    mid
  } else {
    lo
  }
}
