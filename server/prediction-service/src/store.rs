//! In-memory history of webhook predictions, keyed by repository id.
//!
//! Nothing is persisted; a restart starts empty.

use chrono::Utc;
use parking_lot::RwLock;
use risk_model::RiskAssessment;
use std::collections::HashMap;

use crate::types::{PullRequestEvent, StoredPrediction};

/// Oldest entries are dropped past this many per repository.
pub const MAX_PER_REPO: usize = 500;

#[derive(Default)]
pub struct PredictionStore {
  inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
  next_id: u64,
  by_repo: HashMap<u64, Vec<StoredPrediction>>,
}

impl PredictionStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record(&self, event: &PullRequestEvent, assessment: &RiskAssessment) -> StoredPrediction {
    let mut inner = self.inner.write();
    inner.next_id += 1;
    let pr = &event.pull_request;
    let prediction = StoredPrediction {
      id: inner.next_id,
      repo_id: event.repository.id,
      repo_full_name: event.repository.full_name.clone(),
      pr_id: pr.id,
      pr_number: pr.number,
      pr_title: pr.title.clone(),
      risk_score: assessment.risk_score,
      high_risk: assessment.high_risk,
      threshold: assessment.threshold,
      status: "open".to_string(),
      created_at: Utc::now(),
    };

    let history = inner.by_repo.entry(prediction.repo_id).or_default();
    history.push(prediction.clone());
    if history.len() > MAX_PER_REPO {
      let excess = history.len() - MAX_PER_REPO;
      history.drain(..excess);
    }
    prediction
  }

  /// Oldest first; empty for a repository never seen.
  pub fn for_repo(&self, repo_id: u64) -> Vec<StoredPrediction> {
    self.inner.read().by_repo.get(&repo_id).cloned().unwrap_or_default()
  }

  pub fn len(&self) -> usize {
    self.inner.read().by_repo.values().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn event(repo: u64, number: u64) -> PullRequestEvent {
    serde_json::from_value(json!({
      "action": "opened",
      "repository": {"id": repo, "full_name": "acme/widgets"},
      "pull_request": {"id": number * 10, "number": number, "title": "Fix", "additions": 1, "deletions": 0}
    }))
    .unwrap()
  }

  fn assessment(score: f64) -> RiskAssessment {
    RiskAssessment {
      risk_score: score,
      high_risk: score >= 0.5,
      threshold: 0.5,
    }
  }

  #[test]
  fn predictions_are_kept_per_repository() {
    let store = PredictionStore::new();
    store.record(&event(1, 7), &assessment(0.9));
    store.record(&event(2, 8), &assessment(0.1));
    let second = store.record(&event(1, 9), &assessment(0.2));

    assert_eq!(second.id, 3);
    let numbers: Vec<u64> = store.for_repo(1).iter().map(|p| p.pr_number).collect();
    assert_eq!(numbers, vec![7, 9]);
    assert_eq!(store.for_repo(2).len(), 1);
    assert!(store.for_repo(3).is_empty());
    assert_eq!(store.len(), 3);
  }

  #[test]
  fn history_is_capped_oldest_first() {
    let store = PredictionStore::new();
    for n in 0..(MAX_PER_REPO as u64 + 5) {
      store.record(&event(1, n), &assessment(0.5));
    }
    let history = store.for_repo(1);
    assert_eq!(history.len(), MAX_PER_REPO);
    assert_eq!(history[0].pr_number, 5);
  }
}
