//! Error types for GitHub operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GithubError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Line {line} of {path} is not part of the pull request diff")]
    OutsideDiff { path: String, line: u32 },

    #[error("Malformed API response: {0}")]
    MalformedResponse(String),

    #[error("Event payload error: {0}")]
    EventPayload(String),
}

impl GithubError {
    /// Whether this error means the platform refused an inline placement
    /// because the target line is outside the PR's diff hunks.
    pub fn is_outside_diff(&self) -> bool {
        matches!(self, GithubError::OutsideDiff { .. })
    }
}

/// Result type for GitHub operations
pub type GithubResult<T> = std::result::Result<T, GithubError>;
