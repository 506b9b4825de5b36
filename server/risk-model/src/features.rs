//! Feature transform: raw change record to unaligned feature vector.
//!
//! Training rows and live requests both go through [`transform`]; the derived
//! fields below are what the persisted models were fit on, so the formulas are
//! fixed.

use serde_json::Value;

use crate::error::InputError;
use crate::types::{FeatureVector, RawRecord};

pub const LINES_ADDED: &str = "lines_added";
pub const LINES_DELETED: &str = "lines_deleted";
pub const FILES_CHANGED: &str = "files_changed";
pub const COMMITS: &str = "commits";
pub const COMMENTS: &str = "comments";
pub const AUTHOR_ASSOCIATION: &str = "author_association";

pub const CHANGE_SIZE: &str = "change_size";
pub const ADD_DELETE_RATIO: &str = "add_delete_ratio";

/// Prefix of the one-hot author indicator columns.
pub const AUTHOR_PREFIX: &str = "author_";

/// Raw count columns, in training-table order.
pub const COUNT_FIELDS: [&str; 5] = [LINES_ADDED, LINES_DELETED, FILES_CHANGED, COMMITS, COMMENTS];

/// Derived columns, appended after the author indicators.
pub const DERIVED_FIELDS: [&str; 2] = [CHANGE_SIZE, ADD_DELETE_RATIO];

/// Identifier and label fields that never become features.
const NON_FEATURE_FIELDS: [&str; 2] = ["pr_number", "build_status"];

pub fn change_size(lines_added: f64, lines_deleted: f64) -> f64 {
  lines_added + lines_deleted
}

/// `lines_added / (lines_deleted + 1)`; the `+ 1` keeps zero-deletion PRs finite.
pub fn add_delete_ratio(lines_added: f64, lines_deleted: f64) -> f64 {
  lines_added / (lines_deleted + 1.0)
}

pub fn author_column(category: &str) -> String {
  format!("{}{}", AUTHOR_PREFIX, category)
}

/// Category name of an author indicator column, if `column` is one.
pub fn author_category(column: &str) -> Option<&str> {
  column.strip_prefix(AUTHOR_PREFIX)
}

/// Encode one raw record.
///
/// `lines_added` and `lines_deleted` are required. Other count fields are
/// optional; when present they must be non-negative numbers. Extra numeric
/// fields pass through by name so alignment can keep or drop them, except
/// `author_*` names: indicators only ever come from `author_association`.
/// Missing columns are not filled here.
pub fn transform(record: &RawRecord) -> Result<FeatureVector, InputError> {
  let lines_added = required_count(record, LINES_ADDED)?;
  let lines_deleted = required_count(record, LINES_DELETED)?;

  let mut features = FeatureVector::new();

  for (name, value) in record.fields() {
    let name = name.as_str();
    if NON_FEATURE_FIELDS.contains(&name) || name == AUTHOR_ASSOCIATION || author_category(name).is_some() {
      continue;
    }
    if COUNT_FIELDS.contains(&name) {
      if let Some(v) = optional_count(record, name)? {
        features.insert(name, v);
      }
      continue;
    }
    // Unknown extras: keep numbers, ignore everything else.
    if let Some(v) = value.as_f64().filter(|v| v.is_finite()) {
      features.insert(name, v);
    }
  }

  match record.get(AUTHOR_ASSOCIATION) {
    None | Some(Value::Null) => {}
    Some(Value::String(category)) if category.is_empty() => {}
    Some(Value::String(category)) => features.insert(author_column(category), 1.0),
    Some(_) => return Err(InputError::not_text(AUTHOR_ASSOCIATION)),
  }

  for (name, value) in [
    (CHANGE_SIZE, change_size(lines_added, lines_deleted)),
    (ADD_DELETE_RATIO, add_delete_ratio(lines_added, lines_deleted)),
  ] {
    if !value.is_finite() {
      return Err(InputError::overflow(name));
    }
    features.insert(name, value);
  }

  Ok(features)
}

fn required_count(record: &RawRecord, field: &str) -> Result<f64, InputError> {
  optional_count(record, field)?.ok_or_else(|| InputError::missing(field))
}

fn optional_count(record: &RawRecord, field: &str) -> Result<Option<f64>, InputError> {
  match record.get(field) {
    None | Some(Value::Null) => Ok(None),
    Some(Value::Number(n)) => {
      let v = n
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| InputError::not_numeric(field))?;
      if v < 0.0 {
        return Err(InputError::negative(field));
      }
      Ok(Some(v))
    }
    Some(_) => Err(InputError::not_numeric(field)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn record(added: u64, deleted: u64) -> RawRecord {
    RawRecord::new()
      .with(LINES_ADDED, added)
      .with(LINES_DELETED, deleted)
  }

  #[test]
  fn derived_features_match_formulas() {
    let f = transform(&record(50, 10)).unwrap();
    assert_eq!(f.get(CHANGE_SIZE), Some(60.0));
    let ratio = f.get(ADD_DELETE_RATIO).unwrap();
    assert_eq!(ratio, 50.0 / 11.0);
    assert_eq!((ratio * 10_000.0).round() / 10_000.0, 4.5455);
  }

  #[test]
  fn zero_deletions_ratio_equals_additions() {
    let f = transform(&record(37, 0)).unwrap();
    assert_eq!(f.get(ADD_DELETE_RATIO), Some(37.0));
    assert_eq!(f.get(CHANGE_SIZE), Some(37.0));
  }

  #[test]
  fn author_becomes_indicator() {
    let f = transform(&record(1, 1).with(AUTHOR_ASSOCIATION, "MEMBER")).unwrap();
    assert_eq!(f.get("author_MEMBER"), Some(1.0));
    assert_eq!(f.get(AUTHOR_ASSOCIATION), None);
  }

  #[test]
  fn missing_required_fields_are_invalid_input() {
    let only_added = RawRecord::new().with(LINES_ADDED, 3);
    assert_eq!(transform(&only_added), Err(InputError::missing(LINES_DELETED)));
    let only_deleted = RawRecord::new().with(LINES_DELETED, 3);
    assert_eq!(transform(&only_deleted), Err(InputError::missing(LINES_ADDED)));
  }

  #[test]
  fn non_numeric_and_negative_counts_are_invalid_input() {
    let text = RawRecord::new().with(LINES_ADDED, "50").with(LINES_DELETED, 1);
    assert_eq!(transform(&text), Err(InputError::not_numeric(LINES_ADDED)));

    let negative = record(5, 0).with(LINES_DELETED, -1);
    assert_eq!(transform(&negative), Err(InputError::negative(LINES_DELETED)));

    let bad_optional = record(5, 0).with(COMMITS, json!([1]));
    assert_eq!(transform(&bad_optional), Err(InputError::not_numeric(COMMITS)));

    let bad_author = record(5, 0).with(AUTHOR_ASSOCIATION, 4);
    assert_eq!(transform(&bad_author), Err(InputError::not_text(AUTHOR_ASSOCIATION)));
  }

  #[test]
  fn optional_fields_are_not_filled_here() {
    let f = transform(&record(5, 5)).unwrap();
    assert_eq!(f.get(FILES_CHANGED), None);
    assert_eq!(f.len(), 4);
  }

  #[test]
  fn identifiers_and_non_numeric_extras_are_skipped() {
    let f = transform(
      &record(5, 5)
        .with("pr_number", 99)
        .with("build_status", 1)
        .with("branch", "main")
        .with("custom_signal", 2.5),
    )
    .unwrap();
    assert_eq!(f.get("pr_number"), None);
    assert_eq!(f.get("build_status"), None);
    assert_eq!(f.get("branch"), None);
    assert_eq!(f.get("custom_signal"), Some(2.5));
  }

  #[test]
  fn overflowing_derived_features_are_invalid_input() {
    let huge = RawRecord::new().with(LINES_ADDED, 1e308).with(LINES_DELETED, 1e308);
    assert_eq!(transform(&huge), Err(InputError::overflow(CHANGE_SIZE)));

    // Fits on its own, but the sum does not.
    let ratio_ok = RawRecord::new().with(LINES_ADDED, 1.5e308).with(LINES_DELETED, 0.5e308);
    assert_eq!(transform(&ratio_ok), Err(InputError::overflow(CHANGE_SIZE)));
  }

  #[test]
  fn request_cannot_set_author_indicators_directly() {
    let r = record(5, 5)
      .with(AUTHOR_ASSOCIATION, "MEMBER")
      .with("author_NONE", 1)
      .with("author_CONTRIBUTOR", 1);
    let f = transform(&r).unwrap();
    assert_eq!(f.get("author_MEMBER"), Some(1.0));
    assert_eq!(f.get("author_NONE"), None);
    assert_eq!(f.get("author_CONTRIBUTOR"), None);

    let without_category = transform(&record(5, 5).with("author_OWNER", 1)).unwrap();
    assert_eq!(without_category.get("author_OWNER"), None);
  }

  #[test]
  fn transform_is_deterministic() {
    let r = record(123, 45).with(COMMENTS, 3).with(AUTHOR_ASSOCIATION, "NONE");
    assert_eq!(transform(&r).unwrap(), transform(&r).unwrap());
  }
}
