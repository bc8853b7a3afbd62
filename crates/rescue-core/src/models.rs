//! Shared records for failures, annotations, and delivery outcomes.

use serde::{Deserialize, Serialize};

/// Why a job ended without success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureConclusion {
    Failure,
    Cancelled,
    TimedOut,
}

impl FailureConclusion {
    /// Parse a GitHub job conclusion string. Only non-success conclusions
    /// map to a value; anything else returns `None`.
    pub fn from_conclusion(s: &str) -> Option<Self> {
        match s {
            "failure" => Some(FailureConclusion::Failure),
            "cancelled" => Some(FailureConclusion::Cancelled),
            "timed_out" => Some(FailureConclusion::TimedOut),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureConclusion::Failure => "failure",
            FailureConclusion::Cancelled => "cancelled",
            FailureConclusion::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for FailureConclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One failed step of one job, with the job's raw logs attached.
///
/// Immutable once constructed; owned by the orchestrator and passed by
/// value into the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Job name as reported by the CI platform.
    pub job_name: String,

    /// Name of the step that failed within the job.
    pub step_name: String,

    /// Why the job ended.
    pub conclusion: FailureConclusion,

    /// Raw job log text (possibly pre-truncated to a bounded tail).
    pub logs: String,
}

/// Inferred source position for a context block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// File path, truncated to its last two segments.
    pub file: String,
    /// 1-based line number.
    pub line: u32,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A bounded, contiguous slice of log lines surrounding one or more
/// indicator matches. Produced fresh per extraction call; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBlock {
    /// Human-readable label (source location or log line number).
    pub header: String,

    /// Right-trimmed log lines, in original order.
    pub lines: Vec<String>,

    /// Source position inferred from nearby lines, if any pattern matched.
    pub source_location: Option<SourceLocation>,
}

impl ContextBlock {
    /// The block rendered as text: header line followed by its log lines.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.header.len() + 64);
        out.push_str(&self.header);
        for line in &self.lines {
            out.push('\n');
            out.push_str(line);
        }
        out
    }
}

/// Severity of an annotation. Unrecognized level strings degrade to
/// `Notice` during payload validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationLevel {
    Failure,
    Error,
    Warning,
    Notice,
}

impl AnnotationLevel {
    /// Parse a level string, falling back to `Notice` for anything
    /// unrecognized. The mapping is cosmetic and never affects delivery.
    pub fn from_level(s: &str) -> Self {
        match s {
            "failure" => AnnotationLevel::Failure,
            "error" => AnnotationLevel::Error,
            "warning" => AnnotationLevel::Warning,
            _ => AnnotationLevel::Notice,
        }
    }

    /// Presentation glyph for comment bodies.
    pub fn glyph(&self) -> &'static str {
        match self {
            AnnotationLevel::Failure => "❌",
            AnnotationLevel::Error => "🔴",
            AnnotationLevel::Warning => "⚠️",
            AnnotationLevel::Notice => "ℹ️",
        }
    }
}

/// A line-level finding produced by the summarizer, validated before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Repository-relative file path.
    pub path: String,

    /// 1-based first line of the finding.
    pub start_line: u32,

    /// 1-based last line; defaults to `start_line`. Descriptive only,
    /// placement always uses `start_line`.
    pub end_line: u32,

    /// Severity, for presentation.
    pub level: AnnotationLevel,

    /// Human explanation of the finding.
    pub message: String,
}

/// The platform-postable projection of an [`Annotation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewComment {
    pub path: String,
    pub line: u32,
    pub body: String,
}

/// How a single annotation ended up after a delivery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Landed as an inline review comment in the diff view.
    PostedInline,
    /// Landed as a plain PR comment with deep-edit links.
    PostedFallback,
    /// Both strategies failed; logged, never silently dropped.
    Failed,
}

/// Aggregated result of one delivery run.
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    /// Per-annotation outcomes, in input order.
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DeliveryReport {
    pub fn inline_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| **o == DeliveryOutcome::PostedInline)
            .count()
    }

    pub fn fallback_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| **o == DeliveryOutcome::PostedFallback)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| **o == DeliveryOutcome::Failed)
            .count()
    }

    /// Annotations that reached the PR in some form.
    pub fn delivered_count(&self) -> usize {
        self.inline_count() + self.fallback_count()
    }
}
