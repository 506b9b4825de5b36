//! Binary entrypoint for the prediction service.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use prediction_service::{router, AppState};

#[derive(Parser, Debug)]
#[command(name = "prediction-service")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Serve build-risk predictions over HTTP", long_about = None)]
struct Args {
  /// Artifact bundle written by train-model
  #[arg(long, env = "RISK_BUNDLE", default_value = "models/risk_bundle.json")]
  bundle: PathBuf,

  #[arg(long, env = "HOST", default_value = "127.0.0.1")]
  host: IpAddr,

  #[arg(long, env = "PORT", default_value_t = 5000)]
  port: u16,

  /// Exit at startup instead of serving 503s when the bundle is unusable
  #[arg(long, env = "REQUIRE_MODEL", value_parser = clap::builder::BoolishValueParser::new())]
  require_model: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  risk_model::init_tracing();
  let args = Args::parse();

  let state = AppState::from_bundle_path(&args.bundle);
  if args.require_model && !state.is_ready() {
    bail!("no usable bundle at {}", args.bundle.display());
  }
  let app = router(Arc::new(state));

  let addr = SocketAddr::new(args.host, args.port);
  let listener = tokio::net::TcpListener::bind(addr)
    .await
    .with_context(|| format!("failed to bind {}", addr))?;
  info!("prediction-service listening on http://{}", addr);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  info!("prediction-service stopped");
  Ok(())
}

async fn shutdown_signal() {
  let _ = tokio::signal::ctrl_c().await;
}
