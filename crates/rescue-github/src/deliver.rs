//! Resilient annotation delivery.
//!
//! Converts structured annotations into platform comments, maximizing the
//! number that land as precise inline comments while guaranteeing no
//! annotation is silently dropped.
//!
//! Per delivery run:
//! 1. CLEANUP: delete every existing review comment carrying the
//!    annotation marker, so a rerun never accumulates stale annotations.
//!    Deletion failures are logged and skipped.
//! 2. VALIDATE: drop (with a warning) annotations with an empty path or
//!    line 0; structurally broken payload entries never reach this point.
//! 3. STRATEGY 1: per annotation, attempt an inline review comment
//!    anchored to the PR head commit.
//! 4. STRATEGY 2: for annotations the platform refused (line outside the
//!    diff, or any other posting error), post a plain PR comment carrying
//!    the explicit location and deep-edit links instead.
//!
//! Past validation, failures are data: every annotation ends in exactly
//! one [`DeliveryOutcome`], and no single posting error aborts the batch.

use tracing::{info, warn};

use rescue_core::markers::{ANNOTATION_MARKER, SUMMARY_COMMENT_MARKER};
use rescue_core::models::{Annotation, DeliveryOutcome, DeliveryReport, ReviewComment};

use crate::client::PrClient;
use crate::error::GithubResult;

/// How the summary comment is placed on reruns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentMode {
    /// Edit the previous marker-tagged summary comment if one exists.
    #[default]
    UpdateExisting,
    /// Always create a new summary comment.
    CreateNew,
}

impl std::str::FromStr for CommentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update-existing" => Ok(CommentMode::UpdateExisting),
            "create-new" => Ok(CommentMode::CreateNew),
            other => Err(format!(
                "unknown comment mode '{}' (expected 'update-existing' or 'create-new')",
                other
            )),
        }
    }
}

/// Annotation delivery pipeline.
pub struct AnnotationDeliverer;

impl AnnotationDeliverer {
    /// Deliver all annotations to the PR, returning one outcome per
    /// annotation in input order.
    pub async fn deliver(client: &dyn PrClient, annotations: &[Annotation]) -> DeliveryReport {
        if annotations.is_empty() {
            info!("No annotations to deliver");
            return DeliveryReport::default();
        }

        info!(count = annotations.len(), "Starting annotation delivery");
        Self::cleanup_previous(client).await;

        let mut outcomes = Vec::with_capacity(annotations.len());

        for annotation in annotations {
            if annotation.path.is_empty() || annotation.start_line == 0 {
                warn!(
                    path = %annotation.path,
                    line = annotation.start_line,
                    "Dropping annotation with missing path or line"
                );
                outcomes.push(DeliveryOutcome::Failed);
                continue;
            }

            outcomes.push(Self::deliver_one(client, annotation).await);
        }

        let report = DeliveryReport { outcomes };
        info!(
            inline = report.inline_count(),
            fallback = report.fallback_count(),
            failed = report.failed_count(),
            "Annotation delivery finished"
        );
        report
    }

    /// Inline first, plain comment second. Returns an outcome, never an
    /// error; isolation between annotations is mandatory.
    async fn deliver_one(client: &dyn PrClient, annotation: &Annotation) -> DeliveryOutcome {
        let comment = ReviewComment {
            path: annotation.path.clone(),
            line: annotation.start_line,
            body: Self::inline_body(annotation),
        };

        match client
            .create_review_comment(&comment.path, comment.line, &comment.body)
            .await
        {
            Ok(()) => {
                info!(
                    path = %annotation.path,
                    line = annotation.start_line,
                    "Posted inline annotation"
                );
                return DeliveryOutcome::PostedInline;
            }
            Err(e) if e.is_outside_diff() => {
                warn!(
                    path = %annotation.path,
                    line = annotation.start_line,
                    "Line not part of the PR diff; falling back to plain comment"
                );
            }
            Err(e) => {
                warn!(
                    path = %annotation.path,
                    line = annotation.start_line,
                    error = %e,
                    "Inline annotation failed; falling back to plain comment"
                );
            }
        }

        let fallback = Self::fallback_body(client.repo_full_name(), client.head_branch(), annotation);
        match client.create_issue_comment(&fallback).await {
            Ok(()) => {
                info!(
                    path = %annotation.path,
                    line = annotation.start_line,
                    "Posted fallback comment"
                );
                DeliveryOutcome::PostedFallback
            }
            Err(e) => {
                warn!(
                    path = %annotation.path,
                    line = annotation.start_line,
                    error = %e,
                    "Fallback comment failed"
                );
                DeliveryOutcome::Failed
            }
        }
    }

    /// Delete every review comment this system posted previously.
    ///
    /// Ownership is substring containment of the annotation marker.
    /// Idempotent: running delivery twice leaves the same set of comments
    /// as running it once. Never fatal: a failed deletion is logged and
    /// the rest of the cleanup continues.
    async fn cleanup_previous(client: &dyn PrClient) {
        let existing = match client.list_review_comments().await {
            Ok(comments) => comments,
            Err(e) => {
                warn!(error = %e, "Could not list review comments for cleanup");
                return;
            }
        };

        let stale: Vec<_> = existing
            .into_iter()
            .filter(|c| c.body.contains(ANNOTATION_MARKER))
            .collect();

        if stale.is_empty() {
            return;
        }

        info!(count = stale.len(), "Removing previous annotations");
        for comment in stale {
            if let Err(e) = client.delete_review_comment(comment.id).await {
                warn!(id = comment.id, error = %e, "Failed to delete stale annotation");
            }
        }
    }

    /// Body of an inline review comment. Carries the annotation marker so
    /// a later run can claim and clean it up.
    fn inline_body(annotation: &Annotation) -> String {
        let mut body = format!(
            "{} **{}**\n\n{}",
            annotation.level.glyph(),
            ANNOTATION_MARKER,
            annotation.message
        );
        if annotation.end_line > annotation.start_line {
            body.push_str(&format!("\n\n_Applies through line {}._", annotation.end_line));
        }
        body
    }

    /// Body of the plain-comment fallback: explicit location plus deep-edit
    /// links, each built verbatim from repository name, branch, path, and
    /// line.
    fn fallback_body(repo: &str, branch: &str, annotation: &Annotation) -> String {
        let path = &annotation.path;
        let line = annotation.start_line;

        let github_dev = format!("https://github.dev/{repo}/blob/{branch}/{path}#L{line}");
        let cursor = format!("cursor://file/{repo}/{path}:{line}");
        let vscode = format!("vscode://file/{repo}/{path}:{line}");
        let github = format!("https://github.com/{repo}/blob/{branch}/{path}#L{line}");

        format!(
            "{} **{}** (line comment rejected, posted as PR comment)\n\n\
             **📁 File:** `{path}` **📍 Line:** `{line}`\n\n\
             {}\n\n\
             ---\n\
             **🛠️ Quick Edit Links:**\n\
             - 🌐 [GitHub.dev Editor]({github_dev})\n\
             - 🎯 [Cursor Editor]({cursor})\n\
             - 📝 [VSCode Editor]({vscode})\n\
             - 👁️ [View on GitHub]({github})",
            annotation.level.glyph(),
            ANNOTATION_MARKER,
            annotation.message,
        )
    }
}

/// Post the PR-level summary comment, or update the previous one.
///
/// In [`CommentMode::UpdateExisting`], the first plain comment whose body
/// contains the summary marker is edited in place; otherwise a new comment
/// is created. [`CommentMode::CreateNew`] always creates.
pub async fn post_or_update_summary(
    client: &dyn PrClient,
    analysis: &str,
    mode: CommentMode,
) -> GithubResult<()> {
    let body = format!("{}\n{}", SUMMARY_COMMENT_MARKER, analysis);

    if mode == CommentMode::UpdateExisting {
        let comments = client.list_issue_comments().await?;
        if let Some(existing) = comments
            .iter()
            .find(|c| c.body.contains(SUMMARY_COMMENT_MARKER))
        {
            client.edit_issue_comment(existing.id, &body).await?;
            info!(id = existing.id, "Updated existing summary comment");
            return Ok(());
        }
    }

    client.create_issue_comment(&body).await?;
    info!("Created new summary comment");
    Ok(())
}
