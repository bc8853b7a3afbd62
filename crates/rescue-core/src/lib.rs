//! CI Rescue core - failure triage domain model
//!
//! Provides the pieces of CI Rescue that need no network access:
//! - Failure and annotation records shared across crates
//! - Error-context extraction from raw job logs
//! - Summarizer payload parsing (annotations embedded in analysis text)
//! - Marker constants for comment ownership

pub mod error;
pub mod extract;
pub mod markers;
pub mod models;
pub mod payload;
pub mod telemetry;

// Re-export key types
pub use error::{CoreError, Result};
pub use extract::{extract_context, extract_error_blocks};
pub use models::{
    Annotation, AnnotationLevel, ContextBlock, DeliveryOutcome, DeliveryReport,
    FailureConclusion, FailureRecord, ReviewComment, SourceLocation,
};
pub use payload::{parse_analysis, ParsedAnalysis};
