//! Engine configuration.
//!
//! Layered loading: built-in defaults, then an optional TOML file, then
//! `FULLTEXT_`-prefixed environment variables. Quality-gate thresholds,
//! timeouts and retry counts are policy knobs here rather than constants
//! baked into the resolver.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub resolver: ResolverConfig,
    pub quality: QualityConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub metadata: MetadataConfig,
    pub sources: SourcesConfig,
    pub pdf: PdfConfig,
}

/// Orchestrator-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Per-strategy call timeout in seconds (wraps retries and all)
    pub source_timeout_secs: u64,
    /// User agent sent to every external source
    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            source_timeout_secs: 15,
            user_agent: format!(
                "fulltext-engine/{} (Academic Research Tool)",
                env!("CARGO_PKG_VERSION")
            ),
        }
    }
}

impl ResolverConfig {
    #[must_use]
    pub const fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }
}

/// Quality gate thresholds.
///
/// Defaults mirror what works in practice for journal articles; they are
/// policy, not contract, and callers may tune them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Minimum extracted characters for an attempt to count as success
    pub min_chars: usize,
    /// Minimum ratio of printable characters (garbled-text heuristic)
    pub min_printable_ratio: f64,
    /// Length above which text is assumed to be full text, not an abstract
    pub full_text_min_chars: usize,
    /// Number of section markers that also qualify text as full text
    pub section_marker_threshold: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_chars: 200,
            min_printable_ratio: 0.85,
            full_text_min_chars: 4000,
            section_marker_threshold: 3,
        }
    }
}

/// Retry/backoff policy settings applied to every network call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first (3 = initial + 2 retries)
    pub max_attempts: u32,
    /// Initial backoff delay in milliseconds
    pub initial_delay_ms: u64,
    /// Backoff cap in milliseconds
    pub max_delay_ms: u64,
    /// Exponential multiplier
    pub multiplier: f64,
    /// Jitter as a fraction of the computed delay
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

/// Result cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached resolutions (LRU beyond this)
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 128 }
    }
}

/// Metadata resolver endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub enabled: bool,
    pub crossref_base: String,
    pub eutils_base: String,
    /// Contact email appended to polite-pool requests
    pub mailto: Option<String>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            crossref_base: "https://api.crossref.org".to_string(),
            eutils_base: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            mailto: None,
        }
    }
}

/// Per-source strategy configuration. Disabled strategies stay in the
/// registry and record skipped attempts so the trail keeps the full
/// configured order.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SourcesConfig {
    pub publisher: PublisherSourceConfig,
    pub pubmed_central: PmcSourceConfig,
    pub europe_pmc: EuropePmcSourceConfig,
    pub institutional: InstitutionalSourceConfig,
    pub google_scholar: ScholarSourceConfig,
    pub sci_hub: SciHubSourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherSourceConfig {
    pub enabled: bool,
}

impl Default for PublisherSourceConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PmcSourceConfig {
    pub enabled: bool,
    /// NCBI ID converter endpoint (PMID/DOI -> PMCID)
    pub idconv_base: String,
    /// E-utilities endpoint for PMC full-text XML
    pub eutils_base: String,
    /// Article page base for the HTML fallback
    pub article_base: String,
}

impl Default for PmcSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            idconv_base: "https://www.ncbi.nlm.nih.gov/pmc/utils/idconv/v1.0".to_string(),
            eutils_base: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            article_base: "https://www.ncbi.nlm.nih.gov/pmc/articles".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EuropePmcSourceConfig {
    pub enabled: bool,
    pub base_url: String,
}

impl Default for EuropePmcSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://www.ebi.ac.uk/europepmc/webservices/rest".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InstitutionalSourceConfig {
    pub enabled: bool,
    /// EZproxy login prefix, e.g. `https://login.proxy.lib.example.edu/login?url=`
    pub proxy_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScholarSourceConfig {
    pub enabled: bool,
    pub base_url: String,
}

impl Default for ScholarSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://scholar.google.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SciHubSourceConfig {
    /// Off by default; enable only where legal
    pub enabled: bool,
    pub mirrors: Vec<String>,
}

impl Default for SciHubSourceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mirrors: vec![
                "https://sci-hub.se".to_string(),
                "https://sci-hub.st".to_string(),
                "https://sci-hub.ru".to_string(),
            ],
        }
    }
}

/// PDF extraction pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// External headless-render service for the last-resort backend;
    /// backend is skipped when unset
    pub render_service_url: Option<String>,
    /// Minimum spacing between render-service calls in seconds
    pub render_min_interval_secs: u64,
    /// Timeout for a render-service call in seconds
    pub render_timeout_secs: u64,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            render_service_url: None,
            render_min_interval_secs: 10,
            render_timeout_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional file and environment
    /// overrides (`FULLTEXT_RESOLVER__SOURCE_TIMEOUT_SECS=30` style).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("FULLTEXT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut loaded: Self = settings.try_deserialize()?;
        // Sections absent from both file and env fall back to defaults
        loaded.validate()?;
        Ok(loaded)
    }

    /// Validate cross-field invariants; returns `Error::InvalidInput` on
    /// the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.resolver.source_timeout_secs == 0 {
            return Err(Error::InvalidInput {
                field: "resolver.source_timeout_secs".to_string(),
                reason: "timeout must be non-zero".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidInput {
                field: "retry.max_attempts".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }
        if self.cache.max_entries == 0 {
            return Err(Error::InvalidInput {
                field: "cache.max_entries".to_string(),
                reason: "cache must hold at least one entry".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.quality.min_printable_ratio) {
            return Err(Error::InvalidInput {
                field: "quality.min_printable_ratio".to_string(),
                reason: "ratio must be within 0.0..=1.0".to_string(),
            });
        }
        if self.sources.institutional.enabled && self.sources.institutional.proxy_url.is_none() {
            return Err(Error::InvalidInput {
                field: "sources.institutional.proxy_url".to_string(),
                reason: "institutional access is enabled but no proxy URL is configured"
                    .to_string(),
            });
        }
        if self.sources.sci_hub.enabled && self.sources.sci_hub.mirrors.is_empty() {
            return Err(Error::InvalidInput {
                field: "sources.sci_hub.mirrors".to_string(),
                reason: "sci-hub is enabled but no mirrors are configured".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.resolver.source_timeout_secs, 15);
        assert_eq!(config.quality.min_chars, 200);
        assert_eq!(config.cache.max_entries, 128);
        assert!(!config.sources.sci_hub.enabled);
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let mut config = Config::default();
        config.resolver.source_timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_validation_requires_proxy_when_institutional_enabled() {
        let mut config = Config::default();
        config.sources.institutional.enabled = true;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidInput { .. })
        ));

        config.sources.institutional.proxy_url =
            Some("https://login.proxy.lib.odu.edu/login?url=".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_printable_ratio() {
        let mut config = Config::default();
        config.quality.min_printable_ratio = 1.5;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidInput { .. })
        ));
    }
}
