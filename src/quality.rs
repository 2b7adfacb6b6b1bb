//! Text-quality gating.
//!
//! An attempt only counts as a success when its extracted text clears a
//! minimum length and a printable-character ratio; HTTP 200 alone proves
//! nothing with scraped sources. The same gate decides whether a PDF
//! backend's output is usable and whether text is full content or just an
//! abstract.

use crate::config::QualityConfig;

/// Section headings that appear in full papers but not in abstracts
const FULL_TEXT_MARKERS: [&str; 9] = [
    "introduction",
    "methods",
    "results",
    "discussion",
    "conclusion",
    "references",
    "materials and methods",
    "figure 1",
    "table 1",
];

/// Quality gate policy object shared by the orchestrator and the PDF
/// pipeline.
#[derive(Debug, Clone)]
pub struct QualityGate {
    min_chars: usize,
    min_printable_ratio: f64,
    full_text_min_chars: usize,
    section_marker_threshold: usize,
}

impl QualityGate {
    #[must_use]
    pub fn new(config: &QualityConfig) -> Self {
        Self {
            min_chars: config.min_chars,
            min_printable_ratio: config.min_printable_ratio,
            full_text_min_chars: config.full_text_min_chars,
            section_marker_threshold: config.section_marker_threshold,
        }
    }

    /// Whether extracted text is usable at all: long enough and not
    /// garbled.
    #[must_use]
    pub fn accepts(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.chars().count() < self.min_chars {
            return false;
        }
        self.printable_ratio(trimmed) >= self.min_printable_ratio
    }

    /// Whether text is likely full content rather than an abstract:
    /// either long, or carrying enough section markers.
    #[must_use]
    pub fn is_full_text(&self, text: &str) -> bool {
        if text.chars().count() > self.full_text_min_chars {
            return true;
        }
        let lowered = text.to_lowercase();
        let matches = FULL_TEXT_MARKERS
            .iter()
            .filter(|marker| lowered.contains(*marker))
            .count();
        matches >= self.section_marker_threshold
    }

    fn printable_ratio(&self, text: &str) -> f64 {
        let total = text.chars().count();
        if total == 0 {
            return 0.0;
        }
        let printable = text
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_ascii_punctuation() || c.is_whitespace())
            .count();
        printable as f64 / total as f64
    }
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new(&QualityConfig::default())
    }
}
