//! Schema registry: the ordered feature columns fixed at training time.
//!
//! Every vector handed to a model, whether a training row or a live request,
//! goes through [`SchemaRegistry::align`]. The registry is persisted inside the
//! artifact bundle and identified by [`SchemaRegistry::fingerprint`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::{InputError, SchemaError};
use crate::features::{author_category, author_column, COUNT_FIELDS, DERIVED_FIELDS};
use crate::types::{AlignedVector, FeatureVector, HistoricalRecord};

/// Reserved indicator for author categories the registry has no column for.
pub const UNKNOWN_AUTHOR_COLUMN: &str = "author__unknown";

/// What alignment does with an author category that has no column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCategoryPolicy {
  /// Drop the indicator; every author column stays 0.
  #[default]
  Ignore,
  /// Fail alignment with `InputError::UnknownCategory`.
  Reject,
  /// Set the reserved `author__unknown` column instead.
  Reserve,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRegistry {
  columns: Vec<String>,
  #[serde(default)]
  unknown_category: UnknownCategoryPolicy,
}

impl SchemaRegistry {
  pub fn new(columns: Vec<String>, unknown_category: UnknownCategoryPolicy) -> Result<Self, SchemaError> {
    let registry = Self {
      columns,
      unknown_category,
    };
    registry.validate()?;
    Ok(registry)
  }

  /// Canonical column order: raw counts, author indicators sorted by
  /// category, then derived fields.
  pub fn from_categories<I, S>(categories: I, unknown_category: UnknownCategoryPolicy) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut authors: Vec<String> = categories
      .into_iter()
      .filter(|c| !c.as_ref().is_empty())
      .map(|c| author_column(c.as_ref()))
      .collect();
    if unknown_category == UnknownCategoryPolicy::Reserve {
      authors.push(UNKNOWN_AUTHOR_COLUMN.to_string());
    }
    authors.sort();
    authors.dedup();

    let columns = COUNT_FIELDS
      .iter()
      .map(|c| c.to_string())
      .chain(authors)
      .chain(DERIVED_FIELDS.iter().map(|c| c.to_string()))
      .collect();

    Self {
      columns,
      unknown_category,
    }
  }

  /// Build the registry from the historical table of one training run.
  ///
  /// `min_category_count` only applies under [`UnknownCategoryPolicy::Reserve`]:
  /// rarer categories get no column of their own and fold into the reserved one.
  pub fn from_training(
    records: &[HistoricalRecord],
    unknown_category: UnknownCategoryPolicy,
    min_category_count: usize,
  ) -> Self {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for r in records {
      if let Some(author) = r.author_association.as_deref().filter(|a| !a.is_empty()) {
        *counts.entry(author).or_insert(0) += 1;
      }
    }
    let min_count = match unknown_category {
      UnknownCategoryPolicy::Reserve => min_category_count.max(1),
      _ => 1,
    };
    let kept = counts
      .into_iter()
      .filter(|(_, n)| *n >= min_count)
      .map(|(c, _)| c);
    Self::from_categories(kept, unknown_category)
  }

  pub fn columns(&self) -> &[String] {
    &self.columns
  }

  pub fn len(&self) -> usize {
    self.columns.len()
  }

  pub fn is_empty(&self) -> bool {
    self.columns.is_empty()
  }

  pub fn unknown_category(&self) -> UnknownCategoryPolicy {
    self.unknown_category
  }

  /// Author categories that have a dedicated column.
  pub fn known_categories(&self) -> Vec<&str> {
    self
      .columns
      .iter()
      .filter(|c| c.as_str() != UNKNOWN_AUTHOR_COLUMN)
      .filter_map(|c| author_category(c))
      .collect()
  }

  pub fn validate(&self) -> Result<(), SchemaError> {
    if self.columns.is_empty() {
      return Err(SchemaError::Empty);
    }
    let mut seen = HashSet::new();
    for c in &self.columns {
      if !seen.insert(c.as_str()) {
        return Err(SchemaError::DuplicateColumn(c.clone()));
      }
    }
    Ok(())
  }

  /// Stable BLAKE3 identity of the column list and unknown-category policy.
  pub fn fingerprint(&self) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"risk-schema/v1");
    hasher.update(b"|");
    hasher.update(policy_tag(self.unknown_category).as_bytes());
    for column in &self.columns {
      hasher.update(b"|");
      hasher.update(column.as_bytes());
    }
    let hex = hasher.finalize().to_hex();
    hex[..32].to_string()
  }

  /// Project a feature vector onto the registry.
  ///
  /// Registry columns missing from `features` are 0, columns the registry
  /// does not know are dropped, and the output follows registry order.
  /// Unknown author indicators are handled per the registry's policy.
  pub fn align(&self, features: &FeatureVector) -> Result<AlignedVector, InputError> {
    let mut values = vec![0.0; self.columns.len()];
    let unknown_slot = self.position(UNKNOWN_AUTHOR_COLUMN);

    for (name, value) in features.iter() {
      if let Some(i) = self.position(name) {
        values[i] = value;
        continue;
      }
      let category = match author_category(name) {
        Some(c) if value != 0.0 => c,
        _ => continue,
      };
      match self.unknown_category {
        UnknownCategoryPolicy::Ignore => {}
        UnknownCategoryPolicy::Reject => {
          return Err(InputError::UnknownCategory {
            category: category.to_string(),
          })
        }
        UnknownCategoryPolicy::Reserve => {
          if let Some(i) = unknown_slot {
            values[i] = values[i].max(value);
          }
        }
      }
    }

    Ok(AlignedVector(values))
  }

  /// Name an aligned vector's values with the registry columns.
  pub fn to_features(&self, aligned: &AlignedVector) -> FeatureVector {
    self
      .columns
      .iter()
      .zip(aligned.as_slice())
      .map(|(c, v)| (c.clone(), *v))
      .collect()
  }

  fn position(&self, column: &str) -> Option<usize> {
    self.columns.iter().position(|c| c == column)
  }
}

fn policy_tag(policy: UnknownCategoryPolicy) -> &'static str {
  match policy {
    UnknownCategoryPolicy::Ignore => "ignore",
    UnknownCategoryPolicy::Reject => "reject",
    UnknownCategoryPolicy::Reserve => "reserve",
  }
}
