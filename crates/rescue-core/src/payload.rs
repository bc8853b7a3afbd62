//! Summarizer payload parsing.
//!
//! The summarizer returns a markdown analysis that may embed a JSON
//! annotations payload between two fixed sentinel tokens. This module
//! splits the visible comment from the payload and validates each entry.
//!
//! Malformed JSON between the sentinels is recoverable: the sentinels are
//! stripped from the visible comment and parsing yields zero annotations
//! instead of failing the run. A payload entry that is not an object at
//! all is a contract violation by the summarizer and rejects the whole
//! payload.

use serde_json::Value;
use tracing::warn;

use crate::error::{CoreError, Result};
use crate::markers::ANNOTATIONS_SENTINEL;
use crate::models::{Annotation, AnnotationLevel};

/// Visible comment text plus validated annotations.
#[derive(Debug, Clone, Default)]
pub struct ParsedAnalysis {
    /// What gets posted as the PR summary comment.
    pub comment: String,

    /// Annotations that survived validation, in payload order.
    pub annotations: Vec<Annotation>,
}

/// Split analysis text into the visible comment and its annotations.
///
/// - No sentinel (or an unpaired one): the full text, zero annotations.
/// - Paired sentinels with valid JSON: text outside the sentinels, trimmed,
///   plus the validated annotation list.
/// - Paired sentinels with malformed JSON: the original text with both
///   sentinel tokens removed, zero annotations.
pub fn parse_analysis(text: &str) -> Result<ParsedAnalysis> {
    let Some(open) = text.find(ANNOTATIONS_SENTINEL) else {
        return Ok(ParsedAnalysis {
            comment: text.to_string(),
            annotations: Vec::new(),
        });
    };

    let after_open = open + ANNOTATIONS_SENTINEL.len();
    let Some(close_rel) = text[after_open..].find(ANNOTATIONS_SENTINEL) else {
        // Unpaired sentinel: nothing to parse.
        return Ok(ParsedAnalysis {
            comment: text.to_string(),
            annotations: Vec::new(),
        });
    };
    let close = after_open + close_rel;

    let payload = &text[after_open..close];
    let prefix = &text[..open];
    let suffix = &text[close + ANNOTATIONS_SENTINEL.len()..];

    match serde_json::from_str::<Value>(payload) {
        Ok(value) => {
            let annotations = validate_annotations(&value)?;
            Ok(ParsedAnalysis {
                comment: format!("{}{}", prefix, suffix).trim().to_string(),
                annotations,
            })
        }
        Err(e) => {
            warn!(error = %e, "Malformed annotations payload; stripping sentinels");
            Ok(ParsedAnalysis {
                comment: text.replace(ANNOTATIONS_SENTINEL, ""),
                annotations: Vec::new(),
            })
        }
    }
}

/// Validate the `annotations` list inside a parsed payload.
///
/// Entries missing a path or a line, or with a non-integer line, are
/// skipped with a warning. An entry that is not an object rejects the
/// whole payload.
fn validate_annotations(value: &Value) -> Result<Vec<Annotation>> {
    let Some(entries) = value.get("annotations").and_then(|a| a.as_array()) else {
        return Ok(Vec::new());
    };

    let mut annotations = Vec::with_capacity(entries.len());

    for (i, entry) in entries.iter().enumerate() {
        let Some(obj) = entry.as_object() else {
            return Err(CoreError::StructuralPayload(format!(
                "annotation {} is not an object",
                i
            )));
        };

        let Some(path) = obj.get("path").and_then(|p| p.as_str()) else {
            warn!(index = i, "Skipping annotation without a path");
            continue;
        };
        if path.is_empty() {
            warn!(index = i, "Skipping annotation with empty path");
            continue;
        }

        let Some(start_line) = obj.get("start_line").and_then(|l| l.as_u64()) else {
            warn!(index = i, path, "Skipping annotation without an integer start_line");
            continue;
        };
        if start_line == 0 || start_line > u32::MAX as u64 {
            warn!(index = i, path, start_line, "Skipping annotation with out-of-range line");
            continue;
        }
        let start_line = start_line as u32;

        let end_line = obj
            .get("end_line")
            .and_then(|l| l.as_u64())
            .map(|l| l as u32)
            .filter(|&l| l >= start_line)
            .unwrap_or(start_line);

        let level = obj
            .get("annotation_level")
            .and_then(|l| l.as_str())
            .map(AnnotationLevel::from_level)
            .unwrap_or(AnnotationLevel::Notice);

        let message = obj
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("")
            .to_string();

        annotations.push(Annotation {
            path: path.to_string(),
            start_line,
            end_line,
            level,
            message,
        });
    }

    Ok(annotations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(payload: &str) -> String {
        format!(
            "This is the analysis.{}{}{}",
            ANNOTATIONS_SENTINEL, payload, ANNOTATIONS_SENTINEL
        )
    }

    #[test]
    fn test_parse_valid_annotations() {
        let text = wrap(
            r#"{"annotations": [{"path": "src/main.py", "start_line": 10, "message": "Test annotation"}]}"#,
        );
        let parsed = parse_analysis(&text).expect("parse failed");

        assert_eq!(parsed.comment, "This is the analysis.");
        assert_eq!(parsed.annotations.len(), 1);
        assert_eq!(parsed.annotations[0].path, "src/main.py");
        assert_eq!(parsed.annotations[0].start_line, 10);
        assert_eq!(parsed.annotations[0].end_line, 10);
        assert_eq!(parsed.annotations[0].level, AnnotationLevel::Notice);
    }

    #[test]
    fn test_parse_no_sentinel() {
        let text = "This is a simple analysis with no annotations.";
        let parsed = parse_analysis(text).expect("parse failed");
        assert_eq!(parsed.comment, text);
        assert!(parsed.annotations.is_empty());
    }

    #[test]
    fn test_parse_unpaired_sentinel() {
        let text = format!("Analysis. {} dangling", ANNOTATIONS_SENTINEL);
        let parsed = parse_analysis(&text).expect("parse failed");
        assert_eq!(parsed.comment, text);
        assert!(parsed.annotations.is_empty());
    }

    #[test]
    fn test_parse_malformed_json_strips_sentinels_only() {
        let malformed = r#"{"annotations": [{"path": "file.py"}]"#;
        let text = wrap(malformed);
        let parsed = parse_analysis(&text).expect("parse failed");

        // The broken payload stays visible; only the sentinel tokens go.
        assert_eq!(parsed.comment, text.replace(ANNOTATIONS_SENTINEL, ""));
        assert!(parsed.comment.contains(malformed));
        assert!(!parsed.comment.contains(ANNOTATIONS_SENTINEL));
        assert!(parsed.annotations.is_empty());
    }

    #[test]
    fn test_invalid_entries_skipped_individually() {
        let text = wrap(
            r#"{"annotations": [
                {"path": "a.py", "start_line": 1, "message": "ok"},
                {"start_line": 2, "message": "no path"},
                {"path": "b.py", "message": "no line"},
                {"path": "c.py", "start_line": "seven", "message": "non-integer line"},
                {"path": "", "start_line": 3, "message": "empty path"},
                {"path": "d.py", "start_line": 0, "message": "line zero"},
                {"path": "e.py", "start_line": 4, "message": "also ok"}
            ]}"#,
        );
        let parsed = parse_analysis(&text).expect("parse failed");
        let paths: Vec<&str> = parsed.annotations.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec!["a.py", "e.py"]);
    }

    #[test]
    fn test_non_object_entry_is_structural_error() {
        let text = wrap(r#"{"annotations": ["not an object"]}"#);
        let err = parse_analysis(&text).expect_err("should reject");
        assert!(matches!(err, CoreError::StructuralPayload(_)));
    }

    #[test]
    fn test_level_and_end_line_defaults() {
        let text = wrap(
            r#"{"annotations": [
                {"path": "a.py", "start_line": 5, "end_line": 9,
                 "annotation_level": "failure", "message": "m"},
                {"path": "b.py", "start_line": 5, "end_line": 2,
                 "annotation_level": "mystery", "message": "m"}
            ]}"#,
        );
        let parsed = parse_analysis(&text).expect("parse failed");

        assert_eq!(parsed.annotations[0].end_line, 9);
        assert_eq!(parsed.annotations[0].level, AnnotationLevel::Failure);
        // end_line below start_line falls back to start_line.
        assert_eq!(parsed.annotations[1].end_line, 5);
        assert_eq!(parsed.annotations[1].level, AnnotationLevel::Notice);
    }

    #[test]
    fn test_missing_annotations_key_yields_empty() {
        let text = wrap(r#"{"other": 1}"#);
        let parsed = parse_analysis(&text).expect("parse failed");
        assert!(parsed.annotations.is_empty());
        assert_eq!(parsed.comment, "This is the analysis.");
    }
}
