//! pr-collector: harvest labeled pull-request history from GitHub.
//!
//! Usage:
//!   GITHUB_PERSONAL_ACCESS_TOKEN=... pr-collector --pages 35 -o data/training_data.csv
//!
//! Walks closed pull requests page by page, keeps merged ones, labels each by
//! the CI check run on its merge commit (success = 0, failure = 1) and writes
//! the training CSV consumed by `train-model`.

mod github;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use github::{record_from_detail, status_label, GitHubClient, API_ROOT};
use risk_model::dataset::{write_records, ClassCounts};

#[derive(Parser, Debug)]
#[command(name = "pr-collector")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Collect labeled PR history for build-risk training", long_about = None)]
struct Args {
    /// GitHub personal access token
    #[arg(long, env = "GITHUB_PERSONAL_ACCESS_TOKEN", hide_env_values = true)]
    token: String,

    #[arg(long, default_value = "pandas-dev")]
    owner: String,

    #[arg(long, default_value = "pandas")]
    repo: String,

    /// Pages of closed pull requests to walk (100 per page)
    #[arg(long, default_value_t = 35)]
    pages: u32,

    #[arg(short, long, default_value = "data/training_data.csv")]
    output: PathBuf,

    /// Pause between per-PR requests, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pause_ms: u64,

    /// Stop after a page once the remaining core quota drops below this
    #[arg(long, default_value_t = 50)]
    min_remaining: u64,

    #[arg(long, default_value = API_ROOT, hide = true)]
    api_root: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    risk_model::init_tracing();
    let args = Args::parse();

    let client = GitHubClient::new(&args.token, &args.api_root, &args.owner, &args.repo)?;
    let pause = Duration::from_millis(args.pause_ms);

    info!("collecting {}/{} ({} pages)", args.owner, args.repo, args.pages);
    log_quota(&client).await;

    let mut rows = Vec::new();
    for page in 1..=args.pages {
        info!("fetching page {}/{}", page, args.pages);
        let pulls = match client.closed_pulls(page).await {
            Ok(p) => p,
            Err(e) => {
                warn!("{:#}", e);
                break;
            }
        };
        if pulls.is_empty() {
            info!("no more pull requests");
            break;
        }

        for summary in pulls.iter().filter(|p| p.is_merged()) {
            tokio::time::sleep(pause).await;
            let detail = match client.pull_detail(&summary.url).await {
                Ok(Some(d)) => d,
                Ok(None) => {
                    warn!("could not fetch details for PR #{}; skipping", summary.number);
                    continue;
                }
                Err(e) => {
                    warn!("PR #{}: {:#}", summary.number, e);
                    continue;
                }
            };

            let sha = match detail.merge_commit_sha.as_deref().or(summary.merge_commit_sha.as_deref()) {
                Some(s) => s,
                None => continue,
            };
            let conclusion = match client.build_conclusion(sha).await {
                Ok(c) => c,
                Err(e) => {
                    warn!("PR #{}: check runs: {:#}", detail.number, e);
                    None
                }
            };

            if let Some(label) = conclusion.as_deref().and_then(status_label) {
                rows.push(record_from_detail(&detail, label));
                info!(
                    "processed PR #{}: build {}",
                    detail.number,
                    conclusion.as_deref().unwrap_or_default()
                );
            }
            tokio::time::sleep(pause).await;
        }

        let remaining = client
            .rate_limit()
            .await
            .ok()
            .flatten()
            .map_or(0, |q| q.remaining);
        info!("rate limit: {} requests remaining", remaining);
        if remaining < args.min_remaining {
            warn!("rate limit low; stopping collection");
            break;
        }
    }

    write_records(&args.output, &rows).with_context(|| format!("failed to write {}", args.output.display()))?;

    let counts = ClassCounts::from_labels(&rows.iter().map(|r| r.build_status).collect::<Vec<_>>());
    info!(
        "saved {} records to {} ({} success / {} failure)",
        rows.len(),
        args.output.display(),
        counts.success,
        counts.failure
    );
    Ok(())
}

async fn log_quota(client: &GitHubClient) {
    match client.rate_limit().await {
        Ok(Some(q)) => info!("rate limit: {}/{} requests remaining", q.remaining, q.limit),
        Ok(None) => warn!("rate limit endpoint unavailable"),
        Err(e) => warn!("rate limit: {:#}", e),
    }
}
