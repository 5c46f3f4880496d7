//! Keyword heuristic that labels a chat prompt `simple`, `medium` or `complex`.
//!
//! The keyword lists, the comparison order and the thresholds are arbitrary
//! constants that existing clients depend on. Changing any of them silently
//! changes where prompts are served.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Keywords suggesting a task that needs a cloud model.
pub const COMPLEX_KEYWORDS: [&str; 9] = [
    "analyze",
    "complex",
    "detailed",
    "comprehensive",
    "research",
    "strategy",
    "business plan",
    "architecture",
    "design patterns",
];

/// Keywords suggesting a task a local model handles well.
pub const SIMPLE_KEYWORDS: [&str; 10] = [
    "hello", "test", "simple", "quick", "comment", "explain", "summary", "list", "format",
    "fix typo",
];

/// Complex keyword hits needed to label a prompt complex outright.
pub const COMPLEX_SCORE_THRESHOLD: usize = 2;

/// Prompts longer than this are labelled complex.
pub const LONG_PROMPT_THRESHOLD: usize = 500;

/// Coarse complexity of a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLabel {
    Simple,
    Medium,
    Complex,
}

impl ComplexityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityLabel::Simple => "simple",
            ComplexityLabel::Medium => "medium",
            ComplexityLabel::Complex => "complex",
        }
    }

    /// Whether the local provider should serve prompts with this label.
    pub fn is_local(&self) -> bool {
        !matches!(self, ComplexityLabel::Complex)
    }
}

impl fmt::Display for ComplexityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label plus the keyword scores that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub label: ComplexityLabel,
    pub simple_score: usize,
    pub complex_score: usize,
}

/// Classify a prompt.
///
/// Scores count how many keywords of each list occur as substrings of the
/// lower-cased prompt (each keyword counts at most once). Decision order:
/// more simple than complex hits is `simple`; more than two complex hits is
/// `complex`; a prompt over 500 UTF-16 code units is `complex`; anything
/// else is `medium`.
pub fn classify(prompt: &str) -> Classification {
    let lowered = prompt.to_lowercase();

    let complex_score = count_hits(&lowered, &COMPLEX_KEYWORDS);
    let simple_score = count_hits(&lowered, &SIMPLE_KEYWORDS);

    let label = if simple_score > complex_score {
        ComplexityLabel::Simple
    } else if complex_score > COMPLEX_SCORE_THRESHOLD {
        ComplexityLabel::Complex
    } else if prompt_length(prompt) > LONG_PROMPT_THRESHOLD {
        ComplexityLabel::Complex
    } else {
        ComplexityLabel::Medium
    };

    Classification {
        label,
        simple_score,
        complex_score,
    }
}

fn count_hits(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|kw| text.contains(*kw)).count()
}

/// Length as browsers and JSON clients count it (UTF-16 code units).
fn prompt_length(prompt: &str) -> usize {
    prompt.encode_utf16().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_is_simple() {
        let c = classify("hello");
        assert_eq!(c.label, ComplexityLabel::Simple);
        assert_eq!(c.simple_score, 1);
        assert_eq!(c.complex_score, 0);
    }

    #[test]
    fn test_explain_is_simple() {
        assert_eq!(classify("explain this function").label, ComplexityLabel::Simple);
    }

    #[test]
    fn test_many_complex_keywords_is_complex() {
        let c = classify("Please provide a comprehensive, detailed architecture analysis");
        assert_eq!(c.label, ComplexityLabel::Complex);
        assert_eq!(c.complex_score, 3);
    }

    #[test]
    fn test_long_prompt_without_keywords_is_complex() {
        let prompt = "a".repeat(600);
        let c = classify(&prompt);
        assert_eq!(c.simple_score, 0);
        assert_eq!(c.complex_score, 0);
        assert_eq!(c.label, ComplexityLabel::Complex);
    }

    #[test]
    fn test_exactly_500_is_medium() {
        assert_eq!(classify(&"a".repeat(500)).label, ComplexityLabel::Medium);
        assert_eq!(classify(&"a".repeat(501)).label, ComplexityLabel::Complex);
    }

    #[test]
    fn test_length_counts_utf16_units() {
        // Each emoji is two UTF-16 code units
        let prompt = "\u{1F600}".repeat(251);
        assert_eq!(classify(&prompt).label, ComplexityLabel::Complex);
    }

    #[test]
    fn test_no_keywords_short_is_medium() {
        assert_eq!(classify("what is the capital of france").label, ComplexityLabel::Medium);
        assert_eq!(classify("").label, ComplexityLabel::Medium);
    }

    #[test]
    fn test_case_insensitive_matching() {
        assert_eq!(classify("HELLO THERE").label, ComplexityLabel::Simple);
        let c = classify("RESEARCH the STRATEGY and ARCHITECTURE");
        assert_eq!(c.complex_score, 3);
        assert_eq!(c.label, ComplexityLabel::Complex);
    }

    #[test]
    fn test_tie_is_not_simple() {
        // one simple (test) vs one complex (research): tie falls through to medium
        let c = classify("test the research");
        assert_eq!(c.simple_score, 1);
        assert_eq!(c.complex_score, 1);
        assert_eq!(c.label, ComplexityLabel::Medium);
    }

    #[test]
    fn test_simple_beats_complex_by_raw_count() {
        // three complex hits lose to four simple hits
        let c = classify("hello, quick simple test: analyze the detailed research");
        assert_eq!(c.complex_score, 3);
        assert_eq!(c.simple_score, 4);
        assert_eq!(c.label, ComplexityLabel::Simple);
    }

    #[test]
    fn test_keyword_counts_once_and_as_substring() {
        // "complexity" contains "complex"; repeats do not add
        let c = classify("complexity complexity complexity");
        assert_eq!(c.complex_score, 1);
        assert_eq!(c.label, ComplexityLabel::Medium);
    }

    #[test]
    fn test_multi_word_keywords() {
        assert_eq!(classify("please fix typo").simple_score, 1);
        assert_eq!(classify("write a business plan").complex_score, 1);
        assert_eq!(classify("design patterns in rust").complex_score, 1);
    }

    #[test]
    fn test_label_serialization() {
        assert_eq!(
            serde_json::to_value(ComplexityLabel::Complex).unwrap(),
            serde_json::json!("complex")
        );
        assert_eq!(ComplexityLabel::Medium.to_string(), "medium");
        assert!(ComplexityLabel::Simple.is_local());
        assert!(ComplexityLabel::Medium.is_local());
        assert!(!ComplexityLabel::Complex.is_local());
    }
}
