//! Resolution results and the per-source provenance trail.

use crate::identifier::Identifier;
use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one strategy invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure,
    Skipped,
}

/// Why an attempt failed or was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptErrorKind {
    /// Per-call timeout elapsed
    Timeout,
    /// Connection-level failure
    Network,
    /// 4xx (other than 429): blocked, gone, forbidden
    HttpPermanent,
    /// 5xx or another retryable status, retries exhausted
    HttpTransient,
    /// 429 from the source
    RateLimited,
    /// Response body could not be interpreted
    Parse,
    /// PDF bytes could not be handled by any backend
    Extraction,
    /// The source answered but returned nothing usable
    EmptyContent,
    /// Extracted text failed the quality gate
    QualityRejected,
    /// Strategy is disabled or missing configuration
    NotConfigured,
    /// Strategy needs an identifier this request does not carry
    MissingIdentifier,
    /// An earlier strategy already succeeded
    NotAttempted,
}

impl AttemptErrorKind {
    /// Map a contained engine error onto the trail taxonomy
    #[must_use]
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::Timeout { .. } => AttemptErrorKind::Timeout,
            Error::Http(_) => AttemptErrorKind::Network,
            Error::PermanentSource { .. } => AttemptErrorKind::HttpPermanent,
            Error::TransientSource { .. } => AttemptErrorKind::HttpTransient,
            Error::RateLimitExceeded { .. } => AttemptErrorKind::RateLimited,
            Error::NoContent { .. } => AttemptErrorKind::EmptyContent,
            Error::Extraction { .. } => AttemptErrorKind::Extraction,
            Error::Parse { .. } | Error::Serde(_) => AttemptErrorKind::Parse,
            _ => AttemptErrorKind::Network,
        }
    }
}

/// One immutable entry in the provenance trail. Appended for every
/// strategy invocation, never mutated afterwards; this is what the
/// "test sources" diagnostics expose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAttempt {
    pub source_name: String,
    pub started_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
    pub error_kind: Option<AttemptErrorKind>,
    pub extracted_chars: usize,
    pub latency_ms: u64,
}

impl SourceAttempt {
    #[must_use]
    pub fn success(
        source_name: &str,
        started_at: DateTime<Utc>,
        extracted_chars: usize,
        latency_ms: u64,
    ) -> Self {
        Self {
            source_name: source_name.to_string(),
            started_at,
            outcome: AttemptOutcome::Success,
            error_kind: None,
            extracted_chars,
            latency_ms,
        }
    }

    #[must_use]
    pub fn failure(
        source_name: &str,
        started_at: DateTime<Utc>,
        error_kind: AttemptErrorKind,
        extracted_chars: usize,
        latency_ms: u64,
    ) -> Self {
        Self {
            source_name: source_name.to_string(),
            started_at,
            outcome: AttemptOutcome::Failure,
            error_kind: Some(error_kind),
            extracted_chars,
            latency_ms,
        }
    }

    #[must_use]
    pub fn skipped(source_name: &str, error_kind: AttemptErrorKind) -> Self {
        Self {
            source_name: source_name.to_string(),
            started_at: Utc::now(),
            outcome: AttemptOutcome::Skipped,
            error_kind: Some(error_kind),
            extracted_chars: 0,
            latency_ms: 0,
        }
    }
}

/// Canonical bibliographic metadata merged from structurally different
/// upstream schemas. Missing fields stay empty; partial metadata is
/// normal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub abstract_text: Option<String>,
    pub journal: Option<String>,
    pub year: Option<u32>,
    pub doi: Option<String>,
    pub pmid: Option<String>,
    pub pmcid: Option<String>,
}

impl PaperMetadata {
    /// True when no bibliographic field carries anything
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.authors.is_empty()
            && self.abstract_text.is_none()
            && self.journal.is_none()
            && self.year.is_none()
    }

    /// Fill fields this record is missing from another record.
    /// Existing values win; the other record only supplements.
    pub fn supplement(&mut self, other: PaperMetadata) {
        if self.title.is_none() {
            self.title = other.title;
        }
        if self.authors.is_empty() {
            self.authors = other.authors;
        }
        if self.abstract_text.is_none() {
            self.abstract_text = other.abstract_text;
        }
        if self.journal.is_none() {
            self.journal = other.journal;
        }
        if self.year.is_none() {
            self.year = other.year;
        }
        if self.doi.is_none() {
            self.doi = other.doi;
        }
        if self.pmid.is_none() {
            self.pmid = other.pmid;
        }
        if self.pmcid.is_none() {
            self.pmcid = other.pmcid;
        }
    }
}

/// The assembled outcome of one resolution call.
///
/// `attempts` maps 1:1, in order, onto the configured content strategies;
/// metadata lookups keep their own trail so diagnostics can tell the two
/// apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperResult {
    pub identifier: Identifier,
    pub metadata: PaperMetadata,
    pub full_text: Option<String>,
    /// Whether `full_text` looks like full content rather than an abstract
    pub is_full_text: bool,
    pub primary_source: Option<String>,
    pub attempts: Vec<SourceAttempt>,
    pub metadata_attempts: Vec<SourceAttempt>,
    pub retrieved_at: DateTime<Utc>,
}

impl PaperResult {
    #[must_use]
    pub fn empty(identifier: Identifier) -> Self {
        Self {
            identifier,
            metadata: PaperMetadata::default(),
            full_text: None,
            is_full_text: false,
            primary_source: None,
            attempts: Vec::new(),
            metadata_attempts: Vec::new(),
            retrieved_at: Utc::now(),
        }
    }

    /// True iff metadata or full text carries anything
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.metadata.is_empty()
            || self.full_text.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Full text when present, abstract otherwise
    #[must_use]
    pub fn primary_text(&self) -> Option<&str> {
        self.full_text
            .as_deref()
            .or(self.metadata.abstract_text.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_content_from_metadata_only() {
        let mut result = PaperResult::empty(Identifier::Pmid("23831765".to_string()));
        assert!(!result.has_content());

        result.metadata.title = Some("A title".to_string());
        assert!(result.has_content());
    }

    #[test]
    fn test_has_content_from_full_text_only() {
        let mut result = PaperResult::empty(Identifier::Doi("10.1/x".to_string()));
        result.full_text = Some("body text".to_string());
        assert!(result.has_content());

        result.full_text = Some(String::new());
        assert!(!result.has_content());
    }

    #[test]
    fn test_metadata_supplement_keeps_existing() {
        let mut base = PaperMetadata {
            title: Some("CrossRef title".to_string()),
            ..PaperMetadata::default()
        };
        base.supplement(PaperMetadata {
            title: Some("PubMed title".to_string()),
            abstract_text: Some("PubMed abstract".to_string()),
            ..PaperMetadata::default()
        });

        assert_eq!(base.title.as_deref(), Some("CrossRef title"));
        assert_eq!(base.abstract_text.as_deref(), Some("PubMed abstract"));
    }

    #[test]
    fn test_primary_text_prefers_full_text() {
        let mut result = PaperResult::empty(Identifier::Pmid("12345678".to_string()));
        result.metadata.abstract_text = Some("abstract".to_string());
        assert_eq!(result.primary_text(), Some("abstract"));

        result.full_text = Some("full body".to_string());
        assert_eq!(result.primary_text(), Some("full body"));
    }
}
