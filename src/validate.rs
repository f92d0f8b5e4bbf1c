//! Input normalization and bounds checking for suggestion requests.

use serde::Serialize;

use crate::config::InputLimits;
use crate::error::{Result, VirelyaError};

/// A normalized, bounds-checked set of context lines.
///
/// Only [`RequestValidator::validate`] constructs this type, so holding one
/// means the limits it was checked against were satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionRequest {
    lines: Vec<String>,
}

impl SuggestionRequest {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// Stateless validator configured with [`InputLimits`].
#[derive(Debug, Clone, Default)]
pub struct RequestValidator {
    limits: InputLimits,
}

impl RequestValidator {
    pub fn new(limits: InputLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &InputLimits {
        &self.limits
    }

    /// Normalize `raw` and check it against the configured limits.
    ///
    /// Trailing whitespace is trimmed from every line and empty trailing lines
    /// are dropped before the length bounds are checked.
    pub fn validate(&self, raw: &[String]) -> Result<SuggestionRequest> {
        let limits = &self.limits;

        if raw.len() > limits.max_lines && !limits.keep_last_lines {
            return Err(VirelyaError::InvalidInput(format!(
                "at most {} lines are allowed, got {}",
                limits.max_lines,
                raw.len()
            )));
        }

        let mut lines: Vec<String> = raw.iter().map(|l| l.trim_end().to_string()).collect();
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }

        if lines.is_empty() {
            return Err(VirelyaError::InvalidInput(
                "at least one non-empty line is required".into(),
            ));
        }

        if lines.len() > limits.max_lines {
            lines.drain(..lines.len() - limits.max_lines);
        }

        let mut total = 0usize;
        for (i, line) in lines.iter().enumerate() {
            let chars = line.chars().count();
            if chars > limits.max_line_chars {
                return Err(VirelyaError::InvalidInput(format!(
                    "line {} has {} characters, limit is {}",
                    i + 1,
                    chars,
                    limits.max_line_chars
                )));
            }
            total += chars;
        }
        if total > limits.max_total_chars {
            return Err(VirelyaError::InvalidInput(format!(
                "request has {} characters, limit is {}",
                total, limits.max_total_chars
            )));
        }

        Ok(SuggestionRequest { lines })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(lines: &[&str]) -> Result<SuggestionRequest> {
        let raw: Vec<String> = lines.iter().map(|s| s.to_string()).collect();
        RequestValidator::default().validate(&raw)
    }

    #[test]
    fn test_accepts_one_to_three_lines() {
        assert!(v(&["The moon hangs low"]).is_ok());
        assert!(v(&["a", "b"]).is_ok());
        assert!(v(&["a", "b", "c"]).is_ok());
    }

    #[test]
    fn test_rejects_four_lines() {
        let err = v(&["a", "b", "c", "d"]).unwrap_err();
        assert!(matches!(err, VirelyaError::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_empty_and_blank_input() {
        assert!(matches!(v(&[]), Err(VirelyaError::InvalidInput(_))));
        assert!(matches!(v(&["", "   "]), Err(VirelyaError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_long_line() {
        let long = "x".repeat(81);
        assert!(matches!(v(&[&long]), Err(VirelyaError::InvalidInput(_))));
        let exact = "x".repeat(80);
        assert!(v(&[&exact]).is_ok());
    }

    #[test]
    fn test_line_length_counts_chars_not_bytes() {
        // 80 two-byte characters is still within the limit.
        let accented = "é".repeat(80);
        assert!(v(&[&accented]).is_ok());
    }

    #[test]
    fn test_rejects_total_over_limit() {
        let mut validator = RequestValidator::default();
        validator.limits.max_total_chars = 10;
        let raw = vec!["hello".to_string(), "world!".to_string()];
        assert!(matches!(
            validator.validate(&raw),
            Err(VirelyaError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_trims_trailing_whitespace_and_empty_tail() {
        let req = v(&["roses are red  ", "violets\t", "  "]).unwrap();
        assert_eq!(req.lines(), &["roses are red", "violets"]);
    }

    #[test]
    fn test_keeps_leading_whitespace_and_interior_blank_lines() {
        let req = v(&["  indented", "", "after gap"]).unwrap();
        assert_eq!(req.lines(), &["  indented", "", "after gap"]);
    }

    #[test]
    fn test_trailing_whitespace_does_not_count_toward_limit() {
        let padded = format!("{}{}", "x".repeat(80), "   ");
        assert!(v(&[&padded]).is_ok());
    }

    #[test]
    fn test_keep_last_lines_truncates_instead_of_rejecting() {
        let validator = RequestValidator::new(InputLimits {
            keep_last_lines: true,
            ..InputLimits::default()
        });
        let raw: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let req = validator.validate(&raw).unwrap();
        assert_eq!(req.lines(), &["b", "c", "d"]);
    }
}
