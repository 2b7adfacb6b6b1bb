//! Identifier normalization.
//!
//! Raw user input is classified into a typed [`Identifier`]. Anything that
//! cannot be recognized as a DOI, PMID, arXiv ID or URL falls back to a
//! title query so callers can always attempt a best-effort search; only
//! empty input is rejected.

use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

fn doi_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^10\.\d{4,9}/[-._;()/:A-Za-z0-9]+$").expect("valid DOI regex")
    })
}

fn doi_extract_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b10\.\d{4,9}/[-._;()/:A-Za-z0-9]+\b").expect("valid DOI regex")
    })
}

fn pmid_extract_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{7,9}\b").expect("valid PMID regex"))
}

fn arxiv_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(arxiv:)?\d{4}\.\d{4,5}(v\d+)?$").expect("valid arXiv regex")
    })
}

/// Typed paper identifier; exactly one variant per request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Identifier {
    Doi(String),
    Pmid(String),
    Arxiv(String),
    Url(String),
    Title(String),
}

impl Identifier {
    /// Canonical string used as the cache key
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Identifier::Doi(doi) => format!("doi:{}", doi.to_lowercase()),
            Identifier::Pmid(pmid) => format!("pmid:{pmid}"),
            Identifier::Arxiv(id) => format!("arxiv:{}", id.to_lowercase()),
            Identifier::Url(url) => format!("url:{url}"),
            Identifier::Title(title) => {
                format!("title:{}", title.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" "))
            }
        }
    }

    #[must_use]
    pub fn as_doi(&self) -> Option<&str> {
        match self {
            Identifier::Doi(doi) => Some(doi),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_pmid(&self) -> Option<&str> {
        match self {
            Identifier::Pmid(pmid) => Some(pmid),
            _ => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// Classify raw input into a typed identifier.
///
/// DOI prefixes (`doi:`, `https://doi.org/`) are stripped, arXiv IDs are
/// recognized with or without the `arXiv:` prefix, all-digit tokens become
/// PMIDs, anything starting with a scheme is a URL, and the rest is a
/// title query. Errors only on empty input.
pub fn detect_identifier(raw: &str) -> Result<Identifier> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidIdentifier {
            reason: "empty input".to_string(),
        });
    }

    // doi.org URLs and doi: prefixes classify as DOIs, not URLs
    let lowered = trimmed.to_lowercase();
    for prefix in [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi:",
    ] {
        if lowered.starts_with(prefix) {
            let candidate = trimmed[prefix.len()..].trim();
            if doi_regex().is_match(candidate) {
                return Ok(Identifier::Doi(candidate.to_string()));
            }
        }
    }

    if doi_regex().is_match(trimmed) {
        return Ok(Identifier::Doi(trimmed.to_string()));
    }

    if arxiv_regex().is_match(trimmed) {
        let id = trimmed.rsplit(':').next().unwrap_or(trimmed);
        return Ok(Identifier::Arxiv(id.to_string()));
    }

    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Ok(Identifier::Pmid(trimmed.to_string()));
    }

    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        return Ok(Identifier::Url(trimmed.to_string()));
    }

    Ok(Identifier::Title(trimmed.to_string()))
}

/// Validate the shape of a DOI. Pure predicate, no side effects.
#[must_use]
pub fn validate_doi(doi: &str) -> bool {
    doi_regex().is_match(doi.trim())
}

/// Validate the shape of a PMID (7-9 digits). Pure predicate.
#[must_use]
pub fn validate_pmid(pmid: &str) -> bool {
    let trimmed = pmid.trim();
    (7..=9).contains(&trimmed.len()) && trimmed.chars().all(|c| c.is_ascii_digit())
}

/// Pull an embedded DOI out of free text, if any
#[must_use]
pub fn extract_doi(text: &str) -> Option<String> {
    doi_extract_regex()
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';']).to_string())
}

/// Pull an embedded PMID out of free text, if any
#[must_use]
pub fn extract_pmid(text: &str) -> Option<String> {
    pmid_extract_regex().find(text).map(|m| m.as_str().to_string())
}
