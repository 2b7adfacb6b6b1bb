//! Full-text source strategies.
//!
//! Every retrieval route implements [`SourceStrategy`] behind a uniform
//! contract so the resolver can iterate them in a fixed priority order
//! without knowing any route's internals. Strategies report whether they
//! can run for a given request (`availability`) before the resolver
//! spends a network attempt on them.

pub mod europe_pmc;
pub mod google_scholar;
pub mod institutional;
pub mod publisher;
pub mod pubmed_central;
pub mod sci_hub;

use crate::config::Config;
use crate::error::Result;
use crate::resolver::result::AttemptErrorKind;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use europe_pmc::EuropePmcSource;
pub use google_scholar::GoogleScholarSource;
pub use institutional::InstitutionalSource;
pub use publisher::PublisherSource;
pub use pubmed_central::PubmedCentralSource;
pub use sci_hub::SciHubSource;

/// What a strategy needs to attempt retrieval. Built once per resolution
/// from the normalized identifier plus any metadata already resolved.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub doi: Option<String>,
    pub pmid: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
}

impl FetchRequest {
    #[must_use]
    pub fn has_any_identifier(&self) -> bool {
        self.doi.is_some() || self.pmid.is_some() || self.url.is_some()
    }
}

/// Payload a strategy hands back. Text is used as-is (after the quality
/// gate); PDF bytes go through the extraction pipeline.
#[derive(Debug, Clone)]
pub enum SourceContent {
    Text(String),
    Pdf(Vec<u8>),
}

impl SourceContent {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Pdf(bytes) => bytes.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pre-flight answer: run the strategy, or record a skip with the given
/// reason and move on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Ready,
    Skip(AttemptErrorKind),
}

/// A single full-text retrieval route.
#[async_trait]
pub trait SourceStrategy: Send + Sync {
    /// Stable name recorded in attempt trails (snake_case).
    fn name(&self) -> &'static str;

    /// Whether this strategy can run for the request. Disabled strategies
    /// and strategies missing a required identifier report a skip here so
    /// the attempt trail still carries one entry per registered strategy.
    fn availability(&self, request: &FetchRequest) -> Availability;

    /// Attempt retrieval. Only called when `availability` returned
    /// `Ready`; errors are categorized by the caller for retry decisions.
    async fn fetch(&self, request: &FetchRequest) -> Result<SourceContent>;
}

/// Decoded body of a page request. Publisher landing URLs sometimes point
/// straight at the PDF (arXiv, repository deposit links), so scraping
/// strategies must sniff before treating the body as HTML.
pub(crate) enum PageBody {
    Pdf(Vec<u8>),
    Html { body: String, final_url: String },
}

/// Read a response body, distinguishing PDF payloads from HTML pages by
/// Content-Type header or the `%PDF-` magic prefix.
pub(crate) async fn read_page_body(
    source_name: &str,
    response: reqwest::Response,
) -> Result<PageBody> {
    let status = response.status();
    if !status.is_success() {
        return Err(crate::error::Error::from_status(source_name, status.as_u16()));
    }
    let final_url = response.url().to_string();
    let declared_pdf = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|ct| ct.contains("application/pdf"));
    let bytes = response.bytes().await?;
    if declared_pdf || bytes.starts_with(b"%PDF-") {
        return Ok(PageBody::Pdf(bytes.to_vec()));
    }
    Ok(PageBody::Html {
        body: String::from_utf8_lossy(&bytes).into_owned(),
        final_url,
    })
}

/// Shared HTTP client used by all strategies. Redirect-following and a
/// browser-like user agent matter here: publisher landing pages and
/// Sci-Hub mirrors both serve different markup to obvious bots.
pub fn build_http_client(config: &Config) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.resolver.source_timeout_secs))
        .user_agent(config.resolver.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()?;
    Ok(client)
}

/// Build the full strategy registry in priority order. Every strategy is
/// always present; disabled ones surface as skips at resolution time.
pub fn build_registry(config: &Config, client: reqwest::Client) -> Vec<Arc<dyn SourceStrategy>> {
    vec![
        Arc::new(PublisherSource::new(config, client.clone())),
        Arc::new(PubmedCentralSource::new(config, client.clone())),
        Arc::new(EuropePmcSource::new(config, client.clone())),
        Arc::new(InstitutionalSource::new(config, client.clone())),
        Arc::new(GoogleScholarSource::new(config, client.clone())),
        Arc::new(SciHubSource::new(config, client)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_priority_order() {
        let config = Config::default();
        let client = build_http_client(&config).unwrap();
        let registry = build_registry(&config, client);

        let names: Vec<&str> = registry.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "publisher",
                "pubmed_central",
                "europe_pmc",
                "institutional",
                "google_scholar",
                "sci_hub",
            ]
        );
    }

    #[test]
    fn test_fetch_request_identifiers() {
        let request = FetchRequest {
            doi: Some("10.1038/nature12373".to_string()),
            ..Default::default()
        };
        assert!(request.has_any_identifier());
        assert!(!FetchRequest::default().has_any_identifier());
    }
}
