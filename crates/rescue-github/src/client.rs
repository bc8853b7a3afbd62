//! Pull-request client trait.
//!
//! The annotation deliverer posts through this capability set instead of a
//! concrete HTTP client, so delivery can be tested against the in-memory
//! fake in `fakes`. The real implementation lives in `rest`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GithubResult;

/// A review (line-anchored) comment as the platform reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewCommentRecord {
    pub id: u64,
    pub path: String,
    /// Absent when the platform has outdated the anchor.
    pub line: Option<u32>,
    pub body: String,
}

/// A plain (non-anchored) PR comment as the platform reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueCommentRecord {
    pub id: u64,
    pub body: String,
}

/// The pull request a run resolves to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub number: u64,
    pub title: String,
    /// Latest commit on the PR head; inline comments anchor to it.
    pub head_sha: String,
    /// Branch name deep-edit links point at.
    pub head_branch: String,
    /// `owner/name` of the base repository.
    pub repo_full_name: String,
}

/// Comment capabilities the delivery pipeline requires of a pull request.
///
/// Guarantees:
/// - `create_review_comment` fails with a recognizable
///   [`GithubError::OutsideDiff`](crate::GithubError::OutsideDiff) when the
///   target line is not part of the PR diff.
/// - `delete_review_comment` on an unknown id is an error, never a panic.
/// - Listing returns comments in platform order; callers must not rely on
///   any particular ordering.
#[async_trait]
pub trait PrClient: Send + Sync {
    /// `owner/name` of the base repository (for deep-edit links).
    fn repo_full_name(&self) -> &str;

    /// Head branch name (for deep-edit links).
    fn head_branch(&self) -> &str;

    /// All review comments currently on the PR.
    async fn list_review_comments(&self) -> GithubResult<Vec<ReviewCommentRecord>>;

    /// Delete one review comment by id.
    async fn delete_review_comment(&self, id: u64) -> GithubResult<()>;

    /// Post an inline review comment anchored to the PR head commit.
    async fn create_review_comment(&self, path: &str, line: u32, body: &str) -> GithubResult<()>;

    /// All plain PR comments.
    async fn list_issue_comments(&self) -> GithubResult<Vec<IssueCommentRecord>>;

    /// Post a plain PR comment.
    async fn create_issue_comment(&self, body: &str) -> GithubResult<()>;

    /// Replace the body of an existing plain PR comment.
    async fn edit_issue_comment(&self, id: u64, body: &str) -> GithubResult<()>;
}
