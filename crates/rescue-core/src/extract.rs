//! Error-context extraction from raw CI logs.
//!
//! Given a large, noisy log, surface only the lines worth showing a human
//! or a downstream summarizer, bounded in size regardless of log length.
//!
//! Two variants exist:
//! - [`extract_context`] merges overlapping windows into combined blocks
//!   and returns joined text (fed to the summarizer prompt).
//! - [`extract_error_blocks`] keeps one block per detected error, marks the
//!   matched line, and infers a source location for each block.
//!
//! Detection is case-insensitive substring containment against a fixed
//! indicator set. That over-matches (any line containing "error") and
//! under-matches (errors using none of the listed vocabulary); both are
//! accepted imprecision, not defects.

use std::sync::LazyLock;

use regex::Regex;

use crate::markers::{BLOCK_SEPARATOR, ERROR_INDICATORS, NO_LOGS_SENTINEL};
use crate::models::{ContextBlock, SourceLocation};

/// Lines of leading context kept before a matched line.
const CONTEXT_BEFORE: usize = 5;
/// Lines of trailing context kept after a matched line.
const CONTEXT_AFTER: usize = 5;
/// Maximum merged blocks returned by [`extract_context`].
const MERGED_BLOCK_CAP: usize = 3;
/// Maximum per-error blocks returned by [`extract_error_blocks`].
const PER_ERROR_BLOCK_CAP: usize = 5;
/// Tail lines returned when no indicator matches.
const FALLBACK_TAIL_LINES: usize = 10;
/// How far around an error line location inference searches.
const LOCATION_SEARCH_RADIUS: usize = 10;

// Location patterns, in priority order. Python tracebacks, compiler-style
// `path:line: Kind` diagnostics, bare `file.py:line` references, and
// JS-style `at path:line:col` stack frames.
static TRACEBACK_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"File "([^"]+)", line (\d+)"#).unwrap());
static DIAGNOSTIC_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\w./\\-]+):(\d+):\s*[A-Za-z]*(?:Error|error|warning)").unwrap());
static BARE_PY_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\w./\\-]+\.py):(\d+)").unwrap());
static STACK_FRAME_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"at ([\w./\\-]+):(\d+):\d+").unwrap());

/// Shared scanning helpers for both extraction variants.
struct ContextExtractor;

impl ContextExtractor {
    /// Indices of lines containing any error indicator, case-insensitively.
    ///
    /// Linear in total input size: each line is lowercased once and checked
    /// against the (lowercased) indicator set.
    fn indicator_indices(lines: &[&str]) -> Vec<usize> {
        let indicators: Vec<String> = ERROR_INDICATORS
            .iter()
            .map(|s| s.to_lowercase())
            .collect();

        lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| {
                let lowered = line.to_lowercase();
                indicators
                    .iter()
                    .any(|ind| lowered.contains(ind.as_str()))
                    .then_some(i)
            })
            .collect()
    }

    /// The context window around a matched index: five lines either side,
    /// clamped to the log bounds. End is exclusive.
    fn window(index: usize, len: usize) -> (usize, usize) {
        let start = index.saturating_sub(CONTEXT_BEFORE);
        let end = (index + CONTEXT_AFTER + 1).min(len);
        (start, end)
    }

    /// Merge windows sorted by start. Two windows combine only when the
    /// next start is strictly inside the current range. Touching but not
    /// overlapping windows stay separate, so two logically distinct errors
    /// whose contexts merely abut produce two blocks.
    ///
    /// Each merged range carries the index of its last contributing error
    /// for labeling.
    fn merge_windows(mut ranges: Vec<(usize, usize, usize)>) -> Vec<(usize, usize, usize)> {
        ranges.sort();
        let mut merged = Vec::with_capacity(ranges.len());
        let mut iter = ranges.into_iter();
        let Some((mut cur_start, mut cur_end, mut cur_idx)) = iter.next() else {
            return merged;
        };

        for (start, end, idx) in iter {
            if start < cur_end {
                cur_end = cur_end.max(end);
                cur_idx = idx;
            } else {
                merged.push((cur_start, cur_end, cur_idx));
                (cur_start, cur_end, cur_idx) = (start, end, idx);
            }
        }
        merged.push((cur_start, cur_end, cur_idx));
        merged
    }

    /// Last `count` non-blank lines, trimmed, in original order.
    fn tail_lines(lines: &[&str], count: usize) -> Vec<String> {
        let mut tail: Vec<String> = lines
            .iter()
            .rev()
            .filter(|l| !l.trim().is_empty())
            .take(count)
            .map(|l| l.trim().to_string())
            .collect();
        tail.reverse();
        tail
    }

    /// Search ±10 lines around `error_index` for a recognizable
    /// `file:line` pattern. The first matching line wins; paths keep only
    /// their last two segments so absolute build-machine paths never leak.
    fn infer_location(lines: &[&str], error_index: usize) -> Option<SourceLocation> {
        let start = error_index.saturating_sub(LOCATION_SEARCH_RADIUS);
        let end = (error_index + LOCATION_SEARCH_RADIUS + 1).min(lines.len());

        for line in &lines[start..end] {
            for pattern in [
                &*TRACEBACK_LOCATION,
                &*DIAGNOSTIC_LOCATION,
                &*BARE_PY_LOCATION,
                &*STACK_FRAME_LOCATION,
            ] {
                if let Some(caps) = pattern.captures(line) {
                    let path = trim_path(&caps[1]);
                    if let Ok(line_no) = caps[2].parse::<u32>() {
                        return Some(SourceLocation {
                            file: path,
                            line: line_no,
                        });
                    }
                }
            }
        }
        None
    }
}

/// Keep only the last two path segments (directory + filename).
fn trim_path(path: &str) -> String {
    let segments: Vec<&str> = path.split(['/', '\\']).collect();
    if segments.len() > 2 {
        segments[segments.len() - 2..].join("/")
    } else {
        segments.join("/")
    }
}

/// Extract bounded error context as joined text (merged-block variant).
///
/// Overlapping windows merge into one block; at most three blocks are
/// returned, preferring the most recent errors. Non-empty logs always
/// produce something: when no indicator matches, the last ten non-blank
/// trimmed lines are returned as the sole block.
pub fn extract_context(logs: &str) -> String {
    if logs.is_empty() {
        return NO_LOGS_SENTINEL.to_string();
    }

    let lines: Vec<&str> = logs.split('\n').collect();
    let error_indices = ContextExtractor::indicator_indices(&lines);

    if error_indices.is_empty() {
        return ContextExtractor::tail_lines(&lines, FALLBACK_TAIL_LINES).join("\n");
    }

    let ranges: Vec<(usize, usize, usize)> = error_indices
        .iter()
        .map(|&i| {
            let (start, end) = ContextExtractor::window(i, lines.len());
            (start, end, i)
        })
        .collect();

    let merged = ContextExtractor::merge_windows(ranges);

    let mut blocks: Vec<String> = merged
        .iter()
        .map(|&(start, end, _)| {
            lines[start..end]
                .iter()
                .map(|l| l.trim_end())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect();

    // Most recent errors matter most; keep the trailing blocks.
    if blocks.len() > MERGED_BLOCK_CAP {
        blocks = blocks.split_off(blocks.len() - MERGED_BLOCK_CAP);
    }

    blocks.join(BLOCK_SEPARATOR)
}

/// Extract one [`ContextBlock`] per detected error (per-error variant).
///
/// Each block marks its matched line with a `>>> ` prefix and carries a
/// source location when one of the known `file:line` patterns appears
/// within ten lines of the error. At most five blocks are returned,
/// preferring the most recent errors, in original order.
pub fn extract_error_blocks(logs: &str) -> Vec<ContextBlock> {
    if logs.is_empty() {
        return Vec::new();
    }

    let lines: Vec<&str> = logs.split('\n').collect();
    let mut error_indices = ContextExtractor::indicator_indices(&lines);

    if error_indices.is_empty() {
        let tail = ContextExtractor::tail_lines(&lines, FALLBACK_TAIL_LINES);
        if tail.is_empty() {
            return Vec::new();
        }
        return vec![ContextBlock {
            header: "Log tail (no error indicator matched)".to_string(),
            lines: tail,
            source_location: None,
        }];
    }

    if error_indices.len() > PER_ERROR_BLOCK_CAP {
        error_indices = error_indices.split_off(error_indices.len() - PER_ERROR_BLOCK_CAP);
    }

    error_indices
        .into_iter()
        .map(|idx| {
            let (start, end) = ContextExtractor::window(idx, lines.len());
            let block_lines: Vec<String> = (start..end)
                .map(|i| {
                    let trimmed = lines[i].trim_end();
                    if i == idx {
                        format!(">>> {trimmed}")
                    } else {
                        trimmed.to_string()
                    }
                })
                .collect();

            let source_location = ContextExtractor::infer_location(&lines, idx);
            let header = match &source_location {
                Some(loc) => format!("Error at {loc}"),
                None => format!("Error at log line {}", idx + 1),
            };

            ContextBlock {
                header,
                lines: block_lines,
                source_location,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_logs_returns_sentinel() {
        assert_eq!(extract_context(""), NO_LOGS_SENTINEL);
    }

    #[test]
    fn test_no_indicators_falls_back_to_tail() {
        let logs = "Starting application\n\
                    Loading configuration\n\
                    Processing request\n\
                    Application ready\n\
                    Shutting down gracefully";
        let result = extract_context(logs);
        assert!(result.contains("Application ready"));
        assert!(result.contains("Shutting down gracefully"));
        // Exactly the original lines, in order, no separator.
        assert_eq!(result, logs);
    }

    #[test]
    fn test_tail_fallback_caps_at_ten_lines() {
        let lines: Vec<String> = (1..=15).map(|i| format!("step {i} done")).collect();
        let logs = lines.join("\n");

        let result = extract_context(&logs);
        assert_eq!(result.lines().count(), 10);
        // The ten most recent lines, in original order.
        assert_eq!(result.lines().next(), Some("step 6 done"));
        assert_eq!(result.lines().last(), Some("step 15 done"));
        assert!(!result.contains("step 5 done"));
    }

    #[test]
    fn test_tail_skips_blank_lines_and_trims() {
        let logs = "one  \n\n two \n   \nthree";
        let result = extract_context(logs);
        assert_eq!(result, "one\ntwo\nthree");
    }

    #[test]
    fn test_single_error_window() {
        let logs = "Line 1: Starting process\n\
                    Line 2: Loading module\n\
                    Line 3: Initializing database\n\
                    Line 4: Connecting to server\n\
                    Line 5: Processing data\n\
                    Line 6: ERROR: Connection timeout\n\
                    Line 7: Retrying connection\n\
                    Line 8: Failed to recover\n\
                    Line 9: Shutting down\n\
                    Line 10: Process ended";
        let result = extract_context(logs);

        assert!(result.contains("Line 1: Starting process"));
        assert!(result.contains("Line 6: ERROR: Connection timeout"));
        assert!(result.contains("Line 10: Process ended"));
        // "Failed to recover" also matches FAILED, windows merge: one block.
        assert_eq!(result.lines().count(), 10);
        assert!(!result.contains("---"));
    }

    #[test]
    fn test_single_error_window_unclamped() {
        // Long enough that neither window edge hits a log boundary: the
        // error at index 5 yields exactly the [0, 11) slice, 11 lines.
        let mut lines: Vec<String> = (1..=20).map(|i| format!("Line {i}: Normal")).collect();
        lines[5] = "Line 6: ERROR: Connection timeout".to_string();
        let logs = lines.join("\n");

        let result = extract_context(&logs);
        assert_eq!(result.lines().count(), 11);
        assert!(!result.contains("---"));
        assert!(result.contains("Line 1: Normal"));
        assert!(result.contains("Line 6: ERROR: Connection timeout"));
        assert!(result.contains("Line 11: Normal"));
        assert!(!result.contains("Line 12: Normal"));
    }

    #[test]
    fn test_separate_errors_produce_separate_blocks() {
        let mut lines: Vec<String> = (1..=15).map(|i| format!("Line {i}: Normal")).collect();
        lines[1] = "Line 2: ERROR: First error".to_string();
        lines[12] = "Line 13: FAILURE: Second error".to_string();
        let logs = lines.join("\n");

        let result = extract_context(&logs);
        assert!(result.contains("---"));
        assert!(result.contains("ERROR: First error"));
        assert!(result.contains("FAILURE: Second error"));
    }

    #[test]
    fn test_overlapping_errors_merge_into_one_block() {
        let logs = "Line 1: Starting\n\
                    Line 2: Loading\n\
                    Line 3: ERROR: First error\n\
                    Line 4: Processing\n\
                    Line 5: FAILURE: Second error\n\
                    Line 6: Recovery\n\
                    Line 7: Finished";
        let result = extract_context(logs);

        assert!(!result.contains("---"));
        assert!(result.contains("ERROR: First error"));
        assert!(result.contains("FAILURE: Second error"));
        assert_eq!(result.lines().count(), 7);
    }

    #[test]
    fn test_touching_windows_are_not_merged() {
        // Error at index 5 (window [0, 11)) and at index 16 (window [11, 22)):
        // next.start == cur.end, so the blocks must stay separate.
        let mut lines: Vec<String> = (0..22).map(|i| format!("line {i}")).collect();
        lines[5] = "ERROR: first".to_string();
        lines[16] = "ERROR: second".to_string();
        let logs = lines.join("\n");

        let result = extract_context(&logs);
        assert_eq!(result.matches("---").count(), 1);
    }

    #[test]
    fn test_case_insensitive_detection() {
        let logs = "Line 1: Starting\n\
                    Line 2: error: lowercase error\n\
                    Line 3: Normal\n\
                    Line 4: Error: Mixed case error\n\
                    Line 5: Normal\n\
                    Line 6: ERROR: Uppercase error\n\
                    Line 7: Finished";
        let result = extract_context(logs);
        assert!(result.contains("error: lowercase error"));
        assert!(result.contains("Error: Mixed case error"));
        assert!(result.contains("ERROR: Uppercase error"));
    }

    #[test]
    fn test_various_indicator_vocabulary() {
        let logs = "Line 1: Starting\n\
                    Line 2: Exception: Runtime exception\n\
                    Line 3: Normal\n\
                    Line 4: Traceback (most recent call last):\n\
                    Line 5: Normal\n\
                    Line 6: SyntaxError: Invalid syntax\n\
                    Line 7: Normal\n\
                    Line 8: ##[error] GitHub Actions error\n\
                    Line 9: Normal\n\
                    Line 10: FAILURE: Build failed\n\
                    Line 11: Finished";
        let result = extract_context(logs);
        assert!(result.contains("Exception: Runtime exception"));
        assert!(result.contains("Traceback"));
        assert!(result.contains("SyntaxError"));
        assert!(result.contains("##[error]"));
        assert!(result.contains("FAILURE:"));
    }

    #[test]
    fn test_error_on_first_line() {
        let logs = "ERROR: Error at start\n\
                    Line 2: Recovery\n\
                    Line 3: Normal\n\
                    Line 4: Normal\n\
                    Line 5: Normal\n\
                    Line 6: Finished";
        let result = extract_context(logs);
        assert!(result.contains("ERROR: Error at start"));
        assert!(result.contains("Line 6: Finished"));
    }

    #[test]
    fn test_error_on_last_line() {
        let logs = "Line 1: Starting\n\
                    Line 2: Normal\n\
                    Line 3: Normal\n\
                    Line 4: Normal\n\
                    Line 5: Normal\n\
                    Line 6: ERROR: Error at end";
        let result = extract_context(logs);
        assert!(result.contains("Line 1: Starting"));
        assert!(result.contains("ERROR: Error at end"));
    }

    #[test]
    fn test_trailing_whitespace_stripped() {
        let logs = "Line 1: Normal    \n\
                    Line 2: ERROR: Error with trailing spaces   \t\n\
                    Line 3: Normal\n\
                    Line 4: Finished";
        let result = extract_context(logs);
        for line in result.lines() {
            assert_eq!(line, line.trim_end());
        }
        assert!(result.contains("ERROR: Error with trailing spaces"));
    }

    #[test]
    fn test_merged_block_cap_keeps_most_recent() {
        // Five widely separated errors; only the last three survive,
        // joined by exactly two separators.
        let mut parts = Vec::new();
        for i in 1..=5 {
            for j in 1..=10 {
                parts.push(format!("Section {i} line {j}"));
            }
            parts.push(format!("ERROR: Error {i}"));
            for j in 1..=10 {
                parts.push(format!("Section {i} end line {j}"));
            }
        }
        let logs = parts.join("\n");
        let result = extract_context(&logs);

        assert!(!result.contains("ERROR: Error 1"));
        assert!(!result.contains("ERROR: Error 2"));
        assert!(result.contains("ERROR: Error 3"));
        assert!(result.contains("ERROR: Error 4"));
        assert!(result.contains("ERROR: Error 5"));
        assert_eq!(result.matches("---").count(), 2);

        // Retained blocks appear in original order.
        let p3 = result.find("Error 3").unwrap();
        let p4 = result.find("Error 4").unwrap();
        let p5 = result.find("Error 5").unwrap();
        assert!(p3 < p4 && p4 < p5);
    }

    #[test]
    fn test_per_error_blocks_mark_matched_line() {
        let logs = "Line 1\nLine 2\nERROR: boom\nLine 4\nLine 5";
        let blocks = extract_error_blocks(logs);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].lines.iter().any(|l| l == ">>> ERROR: boom"));
        assert_eq!(blocks[0].header, "Error at log line 3");
    }

    #[test]
    fn test_per_error_block_cap() {
        let mut parts = Vec::new();
        for i in 1..=7 {
            parts.push(format!("ERROR: failure number {i}"));
            for j in 1..=25 {
                parts.push(format!("padding {i}-{j}"));
            }
        }
        let logs = parts.join("\n");
        let blocks = extract_error_blocks(&logs);

        assert_eq!(blocks.len(), 5);
        // Oldest two errors dropped; the rest kept in original order.
        let rendered: Vec<String> = blocks.iter().map(|b| b.render()).collect();
        assert!(!rendered.iter().any(|b| b.contains("failure number 1\n")
            || b.contains("failure number 2")));
        assert!(rendered[0].contains("failure number 3"));
        assert!(rendered[4].contains("failure number 7"));
    }

    #[test]
    fn test_per_error_blocks_empty_logs() {
        assert!(extract_error_blocks("").is_empty());
    }

    #[test]
    fn test_location_from_traceback() {
        let logs = "Traceback (most recent call last):\n\
                    File \"/home/runner/work/repo/src/a/b/c.py\", line 42, in main\n\
                    AssertionError: expected 1 == 2";
        let blocks = extract_error_blocks(logs);
        assert!(!blocks.is_empty());
        let loc = blocks[0].source_location.as_ref().expect("location inferred");
        // Last two path segments only; the absolute prefix must not leak.
        assert_eq!(loc.file, "b/c.py");
        assert_eq!(loc.line, 42);
        assert!(blocks[0].header.contains("b/c.py:42"));
    }

    #[test]
    fn test_location_from_compiler_diagnostic() {
        let logs = "building\nsrc/lib.rs:17: error: mismatched types\ndone";
        let blocks = extract_error_blocks(logs);
        let loc = blocks[0].source_location.as_ref().expect("location inferred");
        assert_eq!(loc.file, "src/lib.rs");
        assert_eq!(loc.line, 17);
    }

    #[test]
    fn test_location_from_stack_frame() {
        let logs = "FAILED tests\n    at dist/bundle/app.js:88:12\nend";
        let blocks = extract_error_blocks(logs);
        let loc = blocks[0].source_location.as_ref().expect("location inferred");
        assert_eq!(loc.file, "bundle/app.js");
        assert_eq!(loc.line, 88);
    }

    #[test]
    fn test_location_absent_labels_by_line_number() {
        let logs = "a\nb\nERROR: no file mentioned anywhere\nc";
        let blocks = extract_error_blocks(logs);
        assert!(blocks[0].source_location.is_none());
        assert_eq!(blocks[0].header, "Error at log line 3");
    }

    #[test]
    fn test_trim_path_short_paths_unchanged() {
        assert_eq!(trim_path("c.py"), "c.py");
        assert_eq!(trim_path("b/c.py"), "b/c.py");
        assert_eq!(trim_path("a/b/c.py"), "b/c.py");
        assert_eq!(trim_path("a\\b\\c.py"), "b/c.py");
    }
}
