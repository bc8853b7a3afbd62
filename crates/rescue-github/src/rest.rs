//! GitHub REST collaborators.
//!
//! `GithubClient` covers the workflow side of a run: listing jobs, pulling
//! a bounded tail of job logs, and resolving the pull request the run
//! belongs to. `GithubPrClient` binds a client to one resolved PR and
//! implements the [`PrClient`] comment capabilities on top of it.
//!
//! Log fetching degrades to a placeholder string on any error; missing
//! logs must never fail a triage run.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use rescue_core::models::{FailureConclusion, FailureRecord};

use crate::client::{IssueCommentRecord, PrClient, PullRequestRef, ReviewCommentRecord};
use crate::error::{GithubError, GithubResult};

const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Maximum characters of job log kept (tail).
const LOG_TAIL_CHARS: usize = 5000;

/// GitHub connection and run context.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// API token (sent as `Authorization: token ...`).
    pub token: String,
    /// `owner/name` repository slug.
    pub repository: String,
    /// Workflow run being triaged.
    pub run_id: String,
    /// Commit SHA the run was triggered for.
    pub sha: Option<String>,
    /// Triggering event name (`pull_request`, `push`, ...).
    pub event_name: Option<String>,
    /// Path to the event payload file, when the runner provides one.
    pub event_path: Option<PathBuf>,
    /// API base URL; overridable for tests.
    pub api_base: String,
}

impl GithubConfig {
    pub fn new(token: &str, repository: &str, run_id: &str) -> Self {
        Self {
            token: token.to_string(),
            repository: repository.to_string(),
            run_id: run_id.to_string(),
            sha: None,
            event_name: None,
            event_path: None,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_sha(mut self, sha: &str) -> Self {
        self.sha = Some(sha.to_string());
        self
    }

    pub fn with_event(mut self, event_name: &str, event_path: Option<PathBuf>) -> Self {
        self.event_name = Some(event_name.to_string());
        self.event_path = event_path;
        self
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }
}

// Wire shapes for the endpoints we consume. Unknown fields are ignored.

#[derive(Debug, Deserialize)]
struct JobsResponse {
    #[serde(default)]
    jobs: Vec<Job>,
}

#[derive(Debug, Deserialize)]
struct Job {
    id: u64,
    name: Option<String>,
    conclusion: Option<String>,
    #[serde(default)]
    steps: Vec<JobStep>,
}

#[derive(Debug, Deserialize)]
struct JobStep {
    name: Option<String>,
    conclusion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    number: u64,
    title: Option<String>,
    head: PullHead,
    base: PullBase,
}

#[derive(Debug, Deserialize)]
struct PullHead {
    sha: String,
    #[serde(rename = "ref")]
    branch: String,
}

#[derive(Debug, Deserialize)]
struct PullBase {
    repo: Option<RepoInfo>,
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct ReviewCommentWire {
    id: u64,
    path: String,
    line: Option<u32>,
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
struct IssueCommentWire {
    id: u64,
    #[serde(default)]
    body: String,
}

/// GitHub REST client for workflow runs and pull requests.
#[derive(Clone)]
pub struct GithubClient {
    config: GithubConfig,
    http: reqwest::Client,
}

impl GithubClient {
    pub fn new(config: GithubConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ci-rescue/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, http }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(self.url(path))
            .header("Authorization", format!("token {}", self.config.token))
            .header("Accept", "application/vnd.github.v3+json")
    }

    /// Read the response body as an error message, mapping any status
    /// outside 2xx to [`GithubError::Api`].
    async fn check(response: reqwest::Response) -> GithubResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(GithubError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// One `FailureRecord` per failed step of every non-successful job in
    /// the run. A non-200 jobs listing degrades to an empty list with a
    /// warning; the caller treats that as "nothing to triage".
    pub async fn workflow_run_failures(&self, include_logs: bool) -> GithubResult<Vec<FailureRecord>> {
        let path = format!(
            "/repos/{}/actions/runs/{}/jobs",
            self.config.repository, self.config.run_id
        );

        let response = self.get(&path).send().await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "Could not list workflow jobs");
            return Ok(Vec::new());
        }

        let jobs: JobsResponse = response
            .json()
            .await
            .map_err(|e| GithubError::MalformedResponse(e.to_string()))?;

        let mut failures = Vec::new();
        for job in jobs.jobs {
            let Some(conclusion) = job
                .conclusion
                .as_deref()
                .and_then(FailureConclusion::from_conclusion)
            else {
                continue;
            };

            let job_name = job.name.unwrap_or_else(|| "Unknown Job".to_string());
            let failed_steps: Vec<&JobStep> = job
                .steps
                .iter()
                .filter(|s| s.conclusion.as_deref() == Some("failure"))
                .collect();

            for step in failed_steps {
                let logs = if include_logs {
                    self.job_logs(job.id).await
                } else {
                    String::new()
                };

                failures.push(FailureRecord {
                    job_name: job_name.clone(),
                    step_name: step
                        .name
                        .clone()
                        .unwrap_or_else(|| "Unknown Step".to_string()),
                    conclusion,
                    logs,
                });
            }
        }

        Ok(failures)
    }

    /// Raw logs for one job, truncated to the last 5000 characters.
    ///
    /// Degrades to a descriptive placeholder on any error.
    pub async fn job_logs(&self, job_id: u64) -> String {
        let path = format!(
            "/repos/{}/actions/jobs/{}/logs",
            self.config.repository, job_id
        );

        let response = match self.get(&path).send().await {
            Ok(r) => r,
            Err(e) => return format!("Error retrieving logs: {}", e),
        };

        if !response.status().is_success() {
            return format!("Could not retrieve logs (status: {})", response.status().as_u16());
        }

        match response.text().await {
            Ok(logs) => tail_chars(&logs, LOG_TAIL_CHARS).to_string(),
            Err(e) => format!("Error retrieving logs: {}", e),
        }
    }

    /// Resolve the pull request this run belongs to.
    ///
    /// For `pull_request` events the PR number comes from the event
    /// payload file; for anything else, open PRs are scanned for one whose
    /// head SHA matches the run's SHA. `None` means the run has no PR and
    /// there is nowhere to comment.
    pub async fn find_pull_request(&self) -> GithubResult<Option<PullRequestRef>> {
        if self.config.event_name.as_deref() == Some("pull_request") {
            if let Some(number) = self.pr_number_from_event().await? {
                return Ok(Some(self.pull_request(number).await?));
            }
        }

        let Some(sha) = self.config.sha.as_deref() else {
            return Ok(None);
        };

        let path = format!("/repos/{}/pulls?state=open", self.config.repository);
        let response = Self::check(self.get(&path).send().await?).await?;
        let pulls: Vec<PullResponse> = response
            .json()
            .await
            .map_err(|e| GithubError::MalformedResponse(e.to_string()))?;

        Ok(pulls
            .into_iter()
            .find(|p| p.head.sha == sha)
            .map(|p| self.to_pr_ref(p)))
    }

    /// PR number from the event payload file, if present and well-formed.
    async fn pr_number_from_event(&self) -> GithubResult<Option<u64>> {
        let Some(event_path) = self.config.event_path.as_ref() else {
            return Ok(None);
        };

        let raw = tokio::fs::read_to_string(event_path)
            .await
            .map_err(|e| GithubError::EventPayload(e.to_string()))?;
        let event: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| GithubError::EventPayload(e.to_string()))?;

        Ok(event
            .get("pull_request")
            .and_then(|pr| pr.get("number"))
            .and_then(|n| n.as_u64()))
    }

    async fn pull_request(&self, number: u64) -> GithubResult<PullRequestRef> {
        let path = format!("/repos/{}/pulls/{}", self.config.repository, number);
        let response = Self::check(self.get(&path).send().await?).await?;
        let pull: PullResponse = response
            .json()
            .await
            .map_err(|e| GithubError::MalformedResponse(e.to_string()))?;
        Ok(self.to_pr_ref(pull))
    }

    fn to_pr_ref(&self, pull: PullResponse) -> PullRequestRef {
        PullRequestRef {
            number: pull.number,
            title: pull.title.unwrap_or_default(),
            head_sha: pull.head.sha,
            head_branch: pull.head.branch,
            repo_full_name: pull
                .base
                .repo
                .map(|r| r.full_name)
                .unwrap_or_else(|| self.config.repository.clone()),
        }
    }
}

/// A `GithubClient` bound to one pull request, exposing the comment
/// capabilities the deliverer needs.
pub struct GithubPrClient {
    client: GithubClient,
    pr: PullRequestRef,
}

impl GithubPrClient {
    pub fn new(client: GithubClient, pr: PullRequestRef) -> Self {
        Self { client, pr }
    }

    pub fn pr(&self) -> &PullRequestRef {
        &self.pr
    }

    fn repo(&self) -> &str {
        &self.client.config.repository
    }
}

#[async_trait]
impl PrClient for GithubPrClient {
    fn repo_full_name(&self) -> &str {
        &self.pr.repo_full_name
    }

    fn head_branch(&self) -> &str {
        &self.pr.head_branch
    }

    async fn list_review_comments(&self) -> GithubResult<Vec<ReviewCommentRecord>> {
        let path = format!("/repos/{}/pulls/{}/comments", self.repo(), self.pr.number);
        let response = GithubClient::check(self.client.get(&path).send().await?).await?;
        let comments: Vec<ReviewCommentWire> = response
            .json()
            .await
            .map_err(|e| GithubError::MalformedResponse(e.to_string()))?;

        Ok(comments
            .into_iter()
            .map(|c| ReviewCommentRecord {
                id: c.id,
                path: c.path,
                line: c.line,
                body: c.body,
            })
            .collect())
    }

    async fn delete_review_comment(&self, id: u64) -> GithubResult<()> {
        let url = self
            .client
            .url(&format!("/repos/{}/pulls/comments/{}", self.repo(), id));
        let response = self
            .client
            .http
            .delete(url)
            .header("Authorization", format!("token {}", self.client.config.token))
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await?;
        GithubClient::check(response).await?;
        Ok(())
    }

    async fn create_review_comment(&self, path: &str, line: u32, body: &str) -> GithubResult<()> {
        let url = self
            .client
            .url(&format!("/repos/{}/pulls/{}/comments", self.repo(), self.pr.number));

        let response = self
            .client
            .http
            .post(url)
            .header("Authorization", format!("token {}", self.client.config.token))
            .header("Accept", "application/vnd.github.v3+json")
            .json(&json!({
                "body": body,
                "commit_id": self.pr.head_sha,
                "path": path,
                "line": line,
                "side": "RIGHT",
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        // 422 on this endpoint means the line is outside the diff hunks.
        if status.as_u16() == 422 || message.contains("must be part of the diff") {
            return Err(GithubError::OutsideDiff {
                path: path.to_string(),
                line,
            });
        }
        Err(GithubError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn list_issue_comments(&self) -> GithubResult<Vec<IssueCommentRecord>> {
        let path = format!("/repos/{}/issues/{}/comments", self.repo(), self.pr.number);
        let response = GithubClient::check(self.client.get(&path).send().await?).await?;
        let comments: Vec<IssueCommentWire> = response
            .json()
            .await
            .map_err(|e| GithubError::MalformedResponse(e.to_string()))?;

        Ok(comments
            .into_iter()
            .map(|c| IssueCommentRecord {
                id: c.id,
                body: c.body,
            })
            .collect())
    }

    async fn create_issue_comment(&self, body: &str) -> GithubResult<()> {
        let url = self
            .client
            .url(&format!("/repos/{}/issues/{}/comments", self.repo(), self.pr.number));
        let response = self
            .client
            .http
            .post(url)
            .header("Authorization", format!("token {}", self.client.config.token))
            .header("Accept", "application/vnd.github.v3+json")
            .json(&json!({ "body": body }))
            .send()
            .await?;
        GithubClient::check(response).await?;
        Ok(())
    }

    async fn edit_issue_comment(&self, id: u64, body: &str) -> GithubResult<()> {
        let url = self
            .client
            .url(&format!("/repos/{}/issues/comments/{}", self.repo(), id));
        let response = self
            .client
            .http
            .patch(url)
            .header("Authorization", format!("token {}", self.client.config.token))
            .header("Accept", "application/vnd.github.v3+json")
            .json(&json!({ "body": body }))
            .send()
            .await?;
        GithubClient::check(response).await?;
        Ok(())
    }
}

/// Last `max` characters of `s`, on a char boundary.
fn tail_chars(s: &str, max: usize) -> &str {
    if max == 0 {
        return "";
    }
    match s.char_indices().rev().nth(max - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
