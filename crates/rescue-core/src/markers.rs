//! Marker constants for comment ownership and payload delimiting.
//!
//! Ownership of previously posted comments is decided by substring
//! containment against these constants, never by structured parsing, so
//! backward compatibility with comments posted by earlier versions
//! depends on the same loose check.

/// Marker identifying the PR-level summary comment (update-vs-create).
pub const SUMMARY_COMMENT_MARKER: &str = "<!-- CI-RESCUE-COMMENT -->";

/// Marker identifying line-level annotation comments (cleanup before re-post).
pub const ANNOTATION_MARKER: &str = "CI Rescue Analysis";

/// Sentinel delimiting the JSON annotations payload inside analysis text.
/// Appears twice: once opening, once closing.
pub const ANNOTATIONS_SENTINEL: &str = "<<<CI-RESCUE-ANNOTATIONS>>>";

/// Returned by the extractor when the input log is empty.
pub const NO_LOGS_SENTINEL: &str = "No logs available";

/// Separator joining distinct context blocks in extractor output.
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Fixed substrings whose case-insensitive presence marks a log line as
/// error-bearing. Substring matching over-matches; see the extractor docs.
pub const ERROR_INDICATORS: &[&str] = &[
    "ERROR",
    "FAILED",
    "Error:",
    "error:",
    "Exception:",
    "Traceback",
    "TabError:",
    "SyntaxError:",
    "ImportError:",
    "ModuleNotFoundError:",
    "AssertionError:",
    "##[error]",
    "FAIL:",
    "FAILURE:",
];
