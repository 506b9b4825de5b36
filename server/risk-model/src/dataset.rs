//! Historical CSV loading, encoding, and stratified partitioning.
//!
//! The CSV written by the collector is the only training input. Rows are
//! encoded through the shared feature transform and schema alignment, so a
//! training row and a live request with the same fields encode identically.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::DatasetError;
use crate::features::transform;
use crate::schema::SchemaRegistry;
use crate::types::{HistoricalRecord, RawRecord, FAILURE, SUCCESS};

/// Label distribution of a dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
  pub success: usize,
  pub failure: usize,
}

impl ClassCounts {
  pub fn from_labels(labels: &[u8]) -> Self {
    let failure = labels.iter().filter(|&&l| l == FAILURE).count();
    Self {
      success: labels.len() - failure,
      failure,
    }
  }

  pub fn total(&self) -> usize {
    self.success + self.failure
  }
}

/// Read the collector CSV (header row required).
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<HistoricalRecord>, DatasetError> {
  let file = File::open(path.as_ref())?;
  read_records_from(file)
}

pub fn read_records_from<R: Read>(reader: R) -> Result<Vec<HistoricalRecord>, DatasetError> {
  let mut rdr = csv::ReaderBuilder::new()
    .trim(csv::Trim::All)
    .from_reader(reader);

  let mut records = Vec::new();
  for (idx, row) in rdr.deserialize::<HistoricalRecord>().enumerate() {
    let record = row?;
    if record.build_status != SUCCESS && record.build_status != FAILURE {
      return Err(DatasetError::InvalidLabel {
        row: idx + 1,
        value: record.build_status,
      });
    }
    records.push(record);
  }
  Ok(records)
}

/// Header of the collector CSV, in [`HistoricalRecord`] field order.
pub const CSV_COLUMNS: [&str; 8] = [
  "pr_number",
  "lines_added",
  "lines_deleted",
  "files_changed",
  "commits",
  "comments",
  "author_association",
  "build_status",
];

/// Write rows in the collector CSV layout. The header is written even when
/// `records` is empty.
pub fn write_records<P: AsRef<Path>>(path: P, records: &[HistoricalRecord]) -> Result<(), DatasetError> {
  if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)?;
  }
  let mut writer = csv::WriterBuilder::new()
    .has_headers(false)
    .from_path(path.as_ref())?;
  writer.write_record(CSV_COLUMNS)?;
  for record in records {
    writer.serialize(record)?;
  }
  writer.flush()?;
  Ok(())
}

/// Encoded feature matrix (registry order) with binary labels.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
  pub features: Vec<Vec<f64>>,
  pub labels: Vec<u8>,
  pub feature_count: usize,
}

impl Dataset {
  pub fn new(features: Vec<Vec<f64>>, labels: Vec<u8>) -> Self {
    debug_assert_eq!(features.len(), labels.len());
    let feature_count = features.first().map_or(0, |row| row.len());
    Self {
      features,
      labels,
      feature_count,
    }
  }

  /// Encode historical rows against a registry.
  pub fn encode(records: &[HistoricalRecord], schema: &SchemaRegistry) -> Result<Self, DatasetError> {
    if records.is_empty() {
      return Err(DatasetError::Empty);
    }

    let mut features = Vec::with_capacity(records.len());
    let mut labels = Vec::with_capacity(records.len());

    for (idx, record) in records.iter().enumerate() {
      let encoded = transform(&RawRecord::from(record))
        .and_then(|f| schema.align(&f))
        .map_err(|source| DatasetError::Encode { row: idx + 1, source })?;
      features.push(encoded.0);
      labels.push(record.build_status);
    }

    Ok(Self {
      features,
      labels,
      feature_count: schema.len(),
    })
  }

  pub fn len(&self) -> usize {
    self.features.len()
  }

  pub fn is_empty(&self) -> bool {
    self.features.is_empty()
  }

  pub fn class_counts(&self) -> ClassCounts {
    ClassCounts::from_labels(&self.labels)
  }

  pub fn push(&mut self, row: Vec<f64>, label: u8) {
    if self.features.is_empty() {
      self.feature_count = row.len();
    }
    self.features.push(row);
    self.labels.push(label);
  }

  pub fn subset(&self, indices: &[usize]) -> Self {
    Self {
      features: indices.iter().map(|&i| self.features[i].clone()).collect(),
      labels: indices.iter().map(|&i| self.labels[i]).collect(),
      feature_count: self.feature_count,
    }
  }

  /// Split into (train, test) keeping each class's share in both parts.
  ///
  /// Every class with at least two rows contributes at least one row to
  /// each side. Row order within each part follows the original order.
  pub fn stratified_split(&self, test_size: f64, seed: u64) -> (Dataset, Dataset) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_idx = Vec::new();
    let mut test_idx = Vec::new();

    for class in [SUCCESS, FAILURE] {
      let mut idx: Vec<usize> = (0..self.len()).filter(|&i| self.labels[i] == class).collect();
      idx.shuffle(&mut rng);

      let n = idx.len();
      let n_test = ((n as f64 * test_size).round() as usize)
        .clamp(usize::from(n > 1), n.saturating_sub(1));

      test_idx.extend_from_slice(&idx[..n_test]);
      train_idx.extend_from_slice(&idx[n_test..]);
    }

    train_idx.sort_unstable();
    test_idx.sort_unstable();
    (self.subset(&train_idx), self.subset(&test_idx))
  }

  /// Stratified k-fold partition as (train indices, test indices) per fold.
  ///
  /// Rows of each class are dealt round-robin over the folds in their
  /// original order; no shuffling.
  pub fn stratified_folds(&self, k: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
    let k = k.max(2);
    let mut folds: Vec<Vec<usize>> = vec![Vec::new(); k];

    for class in [SUCCESS, FAILURE] {
      let members = (0..self.len()).filter(|&i| self.labels[i] == class);
      for (pos, i) in members.enumerate() {
        folds[pos % k].push(i);
      }
    }

    (0..k)
      .map(|f| {
        let mut test = folds[f].clone();
        test.sort_unstable();
        let mut train: Vec<usize> = folds
          .iter()
          .enumerate()
          .filter(|(g, _)| *g != f)
          .flat_map(|(_, rows)| rows.iter().copied())
          .collect();
        train.sort_unstable();
        (train, test)
      })
      .collect()
  }
}
