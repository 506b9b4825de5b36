//! Offline training pipeline: historical rows in, one verified bundle out.

use std::path::Path;
use tracing::{info, warn};

use crate::bundle::ArtifactBundle;
use crate::config::TrainingConfig;
use crate::dataset::{read_records, Dataset};
use crate::error::TrainError;
use crate::resample::ImbalanceCorrector;
use crate::schema::SchemaRegistry;
use crate::search::RandomizedSearch;
use crate::selector::ModelSelector;
use crate::threshold::optimal_threshold;
use crate::types::HistoricalRecord;

/// Run every training stage:
/// registry -> encode -> stratified split -> oversample (train only)
/// -> forest search -> candidate selection -> threshold -> bundle.
pub fn train(records: &[HistoricalRecord], config: &TrainingConfig) -> Result<ArtifactBundle, TrainError> {
  config.validate()?;
  if records.is_empty() {
    return Err(TrainError::EmptyDataset);
  }

  let schema = SchemaRegistry::from_training(records, config.unknown_category, config.min_category_count);
  info!(
    "schema: {} columns ({} author categories), fingerprint {}",
    schema.len(),
    schema.known_categories().len(),
    schema.fingerprint()
  );

  let data = Dataset::encode(records, &schema)?;
  let counts = data.class_counts();
  info!("class distribution: {} success / {} failure", counts.success, counts.failure);
  if counts.failure == 0 {
    return Err(TrainError::MissingClass { class: "failure" });
  }
  if counts.success == 0 {
    return Err(TrainError::MissingClass { class: "success" });
  }

  let (train_split, eval_split) = data.stratified_split(config.test_size, config.seed);
  if eval_split.class_counts().failure == 0 {
    return Err(TrainError::NoEvaluationFailures);
  }
  info!("split: {} training rows, {} evaluation rows", train_split.len(), eval_split.len());

  let corrector = ImbalanceCorrector::new(config.resample.clone(), config.seed);
  let (balanced, correction) = corrector.correct(&train_split)?;
  info!(
    "training distribution after correction: {} success / {} failure",
    correction.after.success, correction.after.failure
  );

  let search = RandomizedSearch::new(config.search.clone(), config.seed).run(&balanced)?;

  let selector = ModelSelector::standard(config, search.summary.best_params.clone());
  let selection = selector.select(&balanced, &eval_split)?;

  let threshold = match config.fixed_threshold {
    Some(t) => {
      info!("using configured threshold {:.4}", t);
      t
    }
    None => {
      let scores = selection.model.predict_proba_all(&eval_split.features);
      let t = optimal_threshold(&scores, &eval_split.labels);
      info!("F1-optimal threshold on evaluation split: {:.4}", t);
      t
    }
  };
  if selection.evaluations.iter().all(|e| e.report.failure_recall() == 0.0) {
    warn!("no candidate recalled any evaluation failure at the 0.5 cut");
  }

  let mut bundle = ArtifactBundle::new(config.seed, schema, threshold, selection.name, selection.model);
  bundle.evaluation = selection.evaluations;
  bundle.search = Some(search.summary);
  bundle.resample = Some(correction);
  bundle.verify()?;
  Ok(bundle)
}

/// Load the collector CSV, train, and write the bundle.
pub fn train_from_csv<P: AsRef<Path>, Q: AsRef<Path>>(
  csv_path: P,
  bundle_path: Q,
  config: &TrainingConfig,
) -> Result<ArtifactBundle, TrainError> {
  let records = read_records(csv_path.as_ref())?;
  info!("loaded {} rows from {}", records.len(), csv_path.as_ref().display());
  let bundle = train(&records, config)?;
  bundle.save(bundle_path)?;
  Ok(bundle)
}
