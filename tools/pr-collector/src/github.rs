//! Minimal GitHub REST v3 client for pull requests and check runs.

use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::warn;

use risk_model::types::{FAILURE, SUCCESS};
use risk_model::HistoricalRecord;

pub const API_ROOT: &str = "https://api.github.com";

/// One entry of `GET /repos/{owner}/{repo}/pulls`.
#[derive(Debug, Clone, Deserialize)]
pub struct PullSummary {
    pub number: u64,
    pub url: String,
    #[serde(default)]
    pub merged_at: Option<String>,
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
}

impl PullSummary {
    pub fn is_merged(&self) -> bool {
        self.merged_at.is_some() && self.merge_commit_sha.is_some()
    }
}

/// The fields of a full pull request we keep. The list endpoint omits the counts.
#[derive(Debug, Clone, Deserialize)]
pub struct PullDetail {
    pub number: u64,
    #[serde(default)]
    pub additions: Option<u64>,
    #[serde(default)]
    pub deletions: Option<u64>,
    #[serde(default)]
    pub changed_files: Option<u64>,
    #[serde(default)]
    pub commits: Option<u64>,
    #[serde(default)]
    pub comments: Option<u64>,
    #[serde(default)]
    pub author_association: Option<String>,
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRun {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckRunList {
    #[serde(default)]
    check_runs: Vec<CheckRun>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Quota {
    pub limit: u64,
    pub remaining: u64,
}

#[derive(Debug, Deserialize)]
struct RateLimitResources {
    core: Quota,
}

#[derive(Debug, Deserialize)]
struct RateLimit {
    resources: RateLimitResources,
}

/// Conclusion of the run that stands for "the CI build": the first completed
/// run whose name contains `CI`, else the first completed run.
pub fn select_ci_conclusion(runs: &[CheckRun]) -> Option<&str> {
    let completed = || runs.iter().filter(|r| r.status == "completed");
    completed()
        .find(|r| r.name.contains("CI"))
        .or_else(|| completed().next())
        .and_then(|r| r.conclusion.as_deref())
}

/// build_status for a conclusion; anything but success/failure is skipped.
pub fn status_label(conclusion: &str) -> Option<u8> {
    match conclusion {
        "success" => Some(SUCCESS),
        "failure" => Some(FAILURE),
        _ => None,
    }
}

pub fn record_from_detail(pr: &PullDetail, build_status: u8) -> HistoricalRecord {
    HistoricalRecord {
        pr_number: pr.number,
        lines_added: pr.additions,
        lines_deleted: pr.deletions,
        files_changed: pr.changed_files,
        commits: pr.commits,
        comments: pr.comments,
        author_association: pr.author_association.clone(),
        build_status,
    }
}

pub struct GitHubClient {
    http: Client,
    api_root: String,
    owner: String,
    repo: String,
}

impl GitHubClient {
    pub fn new(token: &str, api_root: &str, owner: &str, repo: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));
        let mut auth = HeaderValue::from_str(&format!("token {}", token)).context("token is not a valid header value")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("pr-collector/", env!("CARGO_PKG_VERSION"))),
        );

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            api_root: api_root.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    /// Core quota, or `None` when the endpoint does not answer 200.
    pub async fn rate_limit(&self) -> Result<Option<Quota>> {
        let url = format!("{}/rate_limit", self.api_root);
        let res = self.http.get(&url).send().await?;
        if res.status() != StatusCode::OK {
            return Ok(None);
        }
        let body: RateLimit = res.json().await?;
        Ok(Some(body.resources.core))
    }

    /// One page (100 per page) of closed pull requests.
    pub async fn closed_pulls(&self, page: u32) -> Result<Vec<PullSummary>> {
        let url = format!(
            "{}/repos/{}/{}/pulls?state=closed&per_page=100&page={}",
            self.api_root, self.owner, self.repo, page
        );
        let res = self.http.get(&url).send().await?;
        let status = res.status();
        if status != StatusCode::OK {
            let text = res.text().await.unwrap_or_default();
            bail!("listing pull requests failed: {} {}", status, text);
        }
        Ok(res.json().await?)
    }

    /// Full pull request at `url`, or `None` when it cannot be fetched.
    pub async fn pull_detail(&self, url: &str) -> Result<Option<PullDetail>> {
        let res = self.http.get(url).send().await?;
        if res.status() != StatusCode::OK {
            warn!("detail request {} answered {}", url, res.status());
            return Ok(None);
        }
        Ok(Some(res.json().await?))
    }

    pub async fn build_conclusion(&self, sha: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/repos/{}/{}/commits/{}/check-runs",
            self.api_root, self.owner, self.repo, sha
        );
        let res = self.http.get(&url).send().await?;
        if res.status() != StatusCode::OK {
            return Ok(None);
        }
        let list: CheckRunList = res.json().await?;
        Ok(select_ci_conclusion(&list.check_runs).map(str::to_string))
    }
}
