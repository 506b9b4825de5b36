//! train-model: offline batch training from the collector CSV.

use anyhow::{Context, Result};
use clap::Parser;
use risk_model::{init_tracing, train_from_csv, TrainingConfig, UnknownCategoryPolicy};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "train-model")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train the PR build-risk model and write an artifact bundle", long_about = None)]
struct Args {
  /// Historical CSV written by pr-collector
  #[arg(short, long, default_value = "data/training_data.csv")]
  input: PathBuf,

  /// Bundle output path
  #[arg(short, long, default_value = "models/risk_bundle.json")]
  output: PathBuf,

  /// Optional TOML file with training settings
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Base seed (overrides the config file)
  #[arg(long)]
  seed: Option<u64>,

  /// Evaluation share (overrides the config file)
  #[arg(long)]
  test_size: Option<f64>,

  /// Randomized search trials (overrides the config file)
  #[arg(long)]
  n_iter: Option<usize>,

  /// Use this threshold instead of the F1-optimal one
  #[arg(long)]
  threshold: Option<f64>,

  /// Unknown author category policy: ignore, reject or reserve
  #[arg(long, value_parser = parse_policy)]
  unknown_category: Option<UnknownCategoryPolicy>,
}

fn parse_policy(raw: &str) -> Result<UnknownCategoryPolicy, String> {
  match raw {
    "ignore" => Ok(UnknownCategoryPolicy::Ignore),
    "reject" => Ok(UnknownCategoryPolicy::Reject),
    "reserve" => Ok(UnknownCategoryPolicy::Reserve),
    other => Err(format!("unknown policy '{}' (expected ignore, reject or reserve)", other)),
  }
}

fn main() -> Result<()> {
  init_tracing();
  let args = Args::parse();

  let mut config = match &args.config {
    Some(path) => TrainingConfig::from_toml_file(path)
      .with_context(|| format!("failed to read config {}", path.display()))?,
    None => TrainingConfig::default(),
  };
  if let Some(seed) = args.seed {
    config.seed = seed;
  }
  if let Some(test_size) = args.test_size {
    config.test_size = test_size;
  }
  if let Some(n_iter) = args.n_iter {
    config.search.n_iter = n_iter;
  }
  if let Some(t) = args.threshold {
    config.fixed_threshold = Some(t);
  }
  if let Some(policy) = args.unknown_category {
    config.unknown_category = policy;
  }
  config.validate().context("invalid training configuration")?;

  info!("train-model v{} (seed {})", env!("CARGO_PKG_VERSION"), config.seed);
  let bundle = train_from_csv(&args.input, &args.output, &config)
    .with_context(|| format!("training from {} failed", args.input.display()))?;

  info!(
    "bundle {}: model {} threshold {:.4} -> {}",
    bundle.bundle_id,
    bundle.model_name,
    bundle.threshold,
    args.output.display()
  );
  Ok(())
}
