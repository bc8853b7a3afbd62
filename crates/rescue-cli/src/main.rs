//! CI Rescue - AI-assisted triage for failed GitHub Actions runs
//!
//! Reads its configuration from the environment the Actions runner
//! provides (`INPUT_*` action inputs plus the standard `GITHUB_*` context
//! variables), analyzes the first failure of the current run, and posts a
//! summary comment and line-level annotations to the originating pull
//! request.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{ArgAction, Parser};
use tracing::{info, Level};

use rescue_core::models::{Annotation, FailureRecord};
use rescue_core::payload::parse_analysis;
use rescue_core::telemetry::init_tracing;
use rescue_github::{
    post_or_update_summary, AnnotationDeliverer, CommentMode, GithubClient, GithubConfig,
    GithubPrClient,
};
use rescue_llm::OpenRouterClient;

#[derive(Parser, Debug)]
#[command(name = "ci-rescue")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Analyze a failed CI run and annotate its pull request", long_about = None)]
struct Cli {
    /// GitHub API token
    #[arg(long, env = "INPUT_GITHUB_TOKEN", hide_env_values = true)]
    github_token: String,

    /// OpenRouter API key
    #[arg(long, env = "INPUT_OPENROUTER_API_KEY", hide_env_values = true)]
    openrouter_api_key: String,

    /// Model used for failure analysis
    #[arg(long, env = "INPUT_MODEL", default_value = "openai/gpt-4o-mini")]
    model: String,

    /// Token budget for the analysis response
    #[arg(long, env = "INPUT_MAX_TOKENS", default_value_t = 1000)]
    max_tokens: u32,

    /// Fetch job logs for context (disable to analyze status only)
    #[arg(
        long,
        env = "INPUT_INCLUDE_LOGS",
        default_value_t = true,
        action = ArgAction::Set
    )]
    include_logs: bool,

    /// Summary comment placement: update-existing or create-new
    #[arg(long, env = "INPUT_COMMENT_MODE", default_value = "update-existing")]
    comment_mode: String,

    /// Repository slug (owner/name)
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: String,

    /// Workflow run to triage
    #[arg(long, env = "GITHUB_RUN_ID")]
    run_id: String,

    /// Commit SHA the run was triggered for
    #[arg(long, env = "GITHUB_SHA")]
    sha: Option<String>,

    /// Triggering event name
    #[arg(long, env = "GITHUB_EVENT_NAME")]
    event_name: Option<String>,

    /// Path to the event payload file
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    event_path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let comment_mode: CommentMode = cli.comment_mode.parse().map_err(|e: String| anyhow!(e))?;

    let mut config = GithubConfig::new(&cli.github_token, &cli.repository, &cli.run_id);
    if let Some(sha) = &cli.sha {
        config = config.with_sha(sha);
    }
    if let Some(event_name) = &cli.event_name {
        config = config.with_event(event_name, cli.event_path.clone());
    }

    let github = GithubClient::new(config);

    info!("Starting CI failure analysis");
    let failures = github.workflow_run_failures(cli.include_logs).await?;

    if failures.is_empty() {
        info!("No failures detected in this workflow run");
        return Ok(());
    }
    info!(count = failures.len(), "Found failed steps");

    let Some(pr) = github.find_pull_request().await? else {
        info!("No pull request found for this run; skipping comment");
        return Ok(());
    };
    info!(number = pr.number, title = %pr.title, "Found pull request");

    // Analyze the primary (first) failure; the rest are listed by name.
    let llm = OpenRouterClient::new(&cli.openrouter_api_key, &cli.model);
    let primary = &failures[0];
    info!(job = %primary.job_name, step = %primary.step_name, "Analyzing failure");

    let mut analysis = llm.analyze_failure(primary, cli.max_tokens).await;
    if failures.len() > 1 {
        analysis.push_str(&additional_failures_section(&failures[1..]));
    }

    let parsed = parse_analysis(&analysis)?;

    let mut comment = parsed.comment.clone();
    if !parsed.annotations.is_empty() {
        comment.push_str(&annotations_section(&parsed.annotations));
    }
    comment.push_str(&format!(
        "\n\n_Last analyzed: {}_",
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    ));

    let pr_client = GithubPrClient::new(github, pr);
    post_or_update_summary(&pr_client, &comment, comment_mode).await?;

    let report = AnnotationDeliverer::deliver(&pr_client, &parsed.annotations).await;
    info!(
        pr = pr_client.pr().number,
        inline = report.inline_count(),
        fallback = report.fallback_count(),
        failed = report.failed_count(),
        "Analysis complete"
    );

    Ok(())
}

/// Markdown section listing failures beyond the analyzed one.
fn additional_failures_section(rest: &[FailureRecord]) -> String {
    let mut out = String::from("\n\n**Additional Failures:**\n");
    for failure in rest {
        out.push_str(&format!(
            "- **{}** → {} ({})\n",
            failure.job_name, failure.step_name, failure.conclusion
        ));
    }
    out
}

/// Markdown section mirroring the delivered annotations inside the summary
/// comment, so the findings survive even when every inline placement is
/// rejected.
fn annotations_section(annotations: &[Annotation]) -> String {
    let mut out = String::from("\n\n---\n\n**📌 Code Annotations:**\n");
    for annotation in annotations {
        out.push_str(&format!(
            "- {} `{}` — Line {}: {}\n",
            annotation.level.glyph(),
            annotation.path,
            annotation.start_line,
            annotation.message
        ));
    }
    out
}
