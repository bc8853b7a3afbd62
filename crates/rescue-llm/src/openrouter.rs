//! OpenRouter chat-completions client.
//!
//! One call per triage run: `analyze_failure` sends the failure context to
//! the configured model and returns its markdown analysis. Any transport
//! or response-shape problem degrades to a fixed "manual review needed"
//! analysis instead of an error; a broken summarizer must never take the
//! whole run down with it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use rescue_core::extract::extract_context;
use rescue_core::markers::ANNOTATIONS_SENTINEL;
use rescue_core::models::FailureRecord;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Characters of raw log tail included in the prompt alongside the
/// extracted context.
const RAW_LOG_TAIL_CHARS: usize = 1500;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenRouter API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Response contained no choices")]
    EmptyResponse,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Client for the OpenRouter chat-completions API.
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenRouterClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ci-rescue/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the API base URL (tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Analyze one failure and return a markdown comment body.
    ///
    /// Never fails: transport errors, non-2xx statuses, and empty
    /// responses all degrade to [`fallback_analysis`](Self::fallback_analysis).
    pub async fn analyze_failure(&self, failure: &FailureRecord, max_tokens: u32) -> String {
        let prompt = Self::build_prompt(failure);

        match self.complete(&prompt, max_tokens).await {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, job = %failure.job_name, "Analysis request failed");
                Self::fallback_analysis(failure, &e)
            }
        }
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens,
            temperature: 0.1,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse)
    }

    /// Prompt template: failure header, extracted error context, bounded
    /// raw-log tail, and the annotations payload contract.
    fn build_prompt(failure: &FailureRecord) -> String {
        let error_context = extract_context(&failure.logs);
        let recent_logs = tail_chars(&failure.logs, RAW_LOG_TAIL_CHARS);

        format!(
            r#"You are an expert CI/CD assistant. Analyze this GitHub Actions workflow failure and provide a concise, actionable comment for the pull request.

- Job: {job}
- Step: {step}
- Status: {conclusion}

**Error Details:**
{error_context}

**Recent Log Output:**
```
{recent_logs}
```

Please provide:
1. **Root Cause**: Identify the specific error
2. **Solution**: Provide clear, actionable steps to fix the issue
3. **Code Fix**: If applicable, suggest specific code changes or commands

Be specific about:
- File names and line numbers if mentioned in logs
- Exact error messages and their meaning
- Command-line fixes when possible

Format as a helpful GitHub comment in markdown. Start with "🚨 **CI Failure Analysis**".

If the failure is related to specific files, provide annotations in a JSON block:
{sentinel}
{{
  "annotations": [
    {{
      "path": "path/to/offending_file.py",
      "start_line": 42,
      "end_line": 42,
      "annotation_level": "failure",
      "message": "A brief explanation of why this line is causing a failure."
    }}
  ]
}}
{sentinel}"#,
            job = failure.job_name,
            step = failure.step_name,
            conclusion = failure.conclusion,
            sentinel = ANNOTATIONS_SENTINEL,
        )
    }

    /// Degraded analysis when the model is unreachable: still a valid
    /// summary comment pointing the reader at the logs.
    fn fallback_analysis(failure: &FailureRecord, error: &LlmError) -> String {
        format!(
            "🚨 **CI Failure Analysis**\n\n\
             ❌ Failed to analyze the error with AI: {}\n\n\
             **Manual Review Needed:**\n\
             Job `{}` failed at step `{}` with status `{}`.\n\n\
             Please check the logs for more details.",
            error, failure.job_name, failure.step_name, failure.conclusion
        )
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
