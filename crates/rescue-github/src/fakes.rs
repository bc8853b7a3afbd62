//! In-memory fake for the `PrClient` trait (testing only)
//!
//! `MemoryPrClient` satisfies the trait contract without any network: it
//! stores posted comments in Mutex-held Vecs and can be configured to
//! reject specific inline placements (simulating lines outside the PR
//! diff) or to fail issue-comment posting entirely.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{IssueCommentRecord, PrClient, ReviewCommentRecord};
use crate::error::{GithubError, GithubResult};

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    review_comments: Vec<ReviewCommentRecord>,
    issue_comments: Vec<IssueCommentRecord>,
}

/// In-memory pull request backing a `PrClient`.
#[derive(Debug)]
pub struct MemoryPrClient {
    repo_full_name: String,
    head_branch: String,
    state: Mutex<State>,
    /// (path, line) pairs the fake treats as outside the diff.
    rejected_lines: HashSet<(String, u32)>,
    /// When set, every review-comment post fails with a generic API error.
    fail_review_comments: bool,
    /// When set, every issue-comment post fails.
    fail_issue_comments: bool,
    /// When set, every review-comment deletion fails.
    fail_deletes: bool,
}

impl MemoryPrClient {
    pub fn new(repo_full_name: &str, head_branch: &str) -> Self {
        Self {
            repo_full_name: repo_full_name.to_string(),
            head_branch: head_branch.to_string(),
            state: Mutex::new(State::default()),
            rejected_lines: HashSet::new(),
            fail_review_comments: false,
            fail_issue_comments: false,
            fail_deletes: false,
        }
    }

    /// Treat `path:line` as outside the PR diff.
    pub fn reject_line(mut self, path: &str, line: u32) -> Self {
        self.rejected_lines.insert((path.to_string(), line));
        self
    }

    /// Make every review-comment post fail with a generic API error
    /// (not a diff rejection).
    pub fn with_failing_review_comments(mut self) -> Self {
        self.fail_review_comments = true;
        self
    }

    /// Make every issue-comment post fail.
    pub fn with_failing_issue_comments(mut self) -> Self {
        self.fail_issue_comments = true;
        self
    }

    /// Make every review-comment deletion fail.
    pub fn with_failing_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    /// Snapshot of review comments currently on the fake PR.
    pub fn review_comments(&self) -> Vec<ReviewCommentRecord> {
        self.state.lock().unwrap().review_comments.clone()
    }

    /// Snapshot of issue comments currently on the fake PR.
    pub fn issue_comments(&self) -> Vec<IssueCommentRecord> {
        self.state.lock().unwrap().issue_comments.clone()
    }
}

#[async_trait]
impl PrClient for MemoryPrClient {
    fn repo_full_name(&self) -> &str {
        &self.repo_full_name
    }

    fn head_branch(&self) -> &str {
        &self.head_branch
    }

    async fn list_review_comments(&self) -> GithubResult<Vec<ReviewCommentRecord>> {
        Ok(self.state.lock().unwrap().review_comments.clone())
    }

    async fn delete_review_comment(&self, id: u64) -> GithubResult<()> {
        if self.fail_deletes {
            return Err(GithubError::Api {
                status: 500,
                message: "delete failed".to_string(),
            });
        }
        let mut state = self.state.lock().unwrap();
        let before = state.review_comments.len();
        state.review_comments.retain(|c| c.id != id);
        if state.review_comments.len() == before {
            return Err(GithubError::Api {
                status: 404,
                message: format!("review comment {} not found", id),
            });
        }
        Ok(())
    }

    async fn create_review_comment(&self, path: &str, line: u32, body: &str) -> GithubResult<()> {
        if self.fail_review_comments {
            return Err(GithubError::Api {
                status: 500,
                message: "review comment failed".to_string(),
            });
        }
        if self.rejected_lines.contains(&(path.to_string(), line)) {
            return Err(GithubError::OutsideDiff {
                path: path.to_string(),
                line,
            });
        }
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.review_comments.push(ReviewCommentRecord {
            id,
            path: path.to_string(),
            line: Some(line),
            body: body.to_string(),
        });
        Ok(())
    }

    async fn list_issue_comments(&self) -> GithubResult<Vec<IssueCommentRecord>> {
        Ok(self.state.lock().unwrap().issue_comments.clone())
    }

    async fn create_issue_comment(&self, body: &str) -> GithubResult<()> {
        if self.fail_issue_comments {
            return Err(GithubError::Api {
                status: 500,
                message: "issue comment failed".to_string(),
            });
        }
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.issue_comments.push(IssueCommentRecord {
            id,
            body: body.to_string(),
        });
        Ok(())
    }

    async fn edit_issue_comment(&self, id: u64, body: &str) -> GithubResult<()> {
        let mut state = self.state.lock().unwrap();
        let comment = state
            .issue_comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| GithubError::Api {
                status: 404,
                message: format!("issue comment {} not found", id),
            })?;
        comment.body = body.to_string();
        Ok(())
    }
}
