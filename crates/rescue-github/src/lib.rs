//! CI Rescue GitHub integration
//!
//! Provides:
//! - The `PrClient` capability trait the annotation deliverer posts through
//! - A GitHub REST implementation (jobs, logs, pull requests, comments)
//! - The resilient annotation delivery pipeline (inline-then-fallback)
//! - In-memory fakes for testing without a network

pub mod client;
pub mod deliver;
pub mod error;
pub mod fakes;
pub mod rest;

// Re-export key types
pub use client::{IssueCommentRecord, PrClient, PullRequestRef, ReviewCommentRecord};
pub use deliver::{post_or_update_summary, AnnotationDeliverer, CommentMode};
pub use error::{GithubError, GithubResult};
pub use rest::{GithubClient, GithubConfig, GithubPrClient};
