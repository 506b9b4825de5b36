//! risk-score: read one JSON record from stdin, write its risk assessment to stdout.

use anyhow::{Context, Result};
use clap::Parser;
use risk_model::RiskContext;
use std::io::{self, Read, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "risk-score")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Score one PR record from stdin against a bundle", long_about = None)]
struct Args {
  /// Artifact bundle written by train-model
  #[arg(long, env = "RISK_BUNDLE", default_value = "models/risk_bundle.json")]
  bundle: PathBuf,
}

fn main() -> Result<()> {
  let args = Args::parse();
  let context =
    RiskContext::load(&args.bundle).with_context(|| format!("failed to load bundle {}", args.bundle.display()))?;

  let mut raw = String::new();
  io::stdin().lock().read_to_string(&mut raw).context("failed to read stdin")?;
  let record: serde_json::Value = serde_json::from_str(&raw).context("stdin is not JSON")?;

  let out = context.score_json(&record)?;
  let json = serde_json::to_vec(&out)?;
  io::stdout().write_all(&json)?;
  Ok(())
}
