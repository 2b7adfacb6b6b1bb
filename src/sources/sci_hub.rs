//! Sci-Hub mirror retrieval. Disabled by default; legality varies by
//! jurisdiction, so enabling it is an explicit configuration decision.
//!
//! Mirrors are tried in configured order. A mirror page embeds the PDF in
//! an iframe or embed tag; the src is normalized (protocol-relative URLs,
//! bare paths) before download.

use super::{Availability, FetchRequest, SourceContent, SourceStrategy};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::resolver::result::AttemptErrorKind;
use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};

/// Pull the embedded PDF URL out of a mirror's article page.
pub(crate) fn extract_pdf_url(html: &str, mirror: &str) -> Option<String> {
    let document = Html::parse_document(html);
    for raw in ["iframe#pdf", "embed#pdf", "iframe", "embed"] {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        if let Some(src) = document
            .select(&selector)
            .find_map(|el| el.value().attr("src"))
        {
            return Some(normalize_pdf_url(src, mirror));
        }
    }
    None
}

fn normalize_pdf_url(src: &str, mirror: &str) -> String {
    if src.starts_with("//") {
        format!("https:{src}")
    } else if src.starts_with('/') {
        format!("{}{}", mirror.trim_end_matches('/'), src)
    } else {
        src.to_string()
    }
}

pub struct SciHubSource {
    enabled: bool,
    mirrors: Vec<String>,
    client: reqwest::Client,
}

impl SciHubSource {
    #[must_use]
    pub fn new(config: &Config, client: reqwest::Client) -> Self {
        let sci_hub = &config.sources.sci_hub;
        Self {
            enabled: sci_hub.enabled,
            mirrors: sci_hub.mirrors.clone(),
            client,
        }
    }

    async fn try_mirror(&self, mirror: &str, doi: &str) -> Result<SourceContent> {
        let page_url = format!("{}/{}", mirror.trim_end_matches('/'), doi);
        let response = self.client.get(&page_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::from_status("sci_hub", status.as_u16()));
        }
        let body = response.text().await?;

        let pdf_url = extract_pdf_url(&body, mirror).ok_or(Error::NoContent {
            source_name: "sci_hub".to_string(),
        })?;
        debug!("Mirror {} embeds PDF at {}", mirror, pdf_url);

        let response = self.client.get(&pdf_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::from_status("sci_hub", status.as_u16()));
        }
        Ok(SourceContent::Pdf(response.bytes().await?.to_vec()))
    }
}

#[async_trait]
impl SourceStrategy for SciHubSource {
    fn name(&self) -> &'static str {
        "sci_hub"
    }

    fn availability(&self, request: &FetchRequest) -> Availability {
        if !self.enabled || self.mirrors.is_empty() {
            Availability::Skip(AttemptErrorKind::NotConfigured)
        } else if request.doi.is_none() {
            Availability::Skip(AttemptErrorKind::MissingIdentifier)
        } else {
            Availability::Ready
        }
    }

    #[instrument(skip(self, request), fields(doi = request.doi.as_deref()))]
    async fn fetch(&self, request: &FetchRequest) -> Result<SourceContent> {
        let doi = request.doi.as_deref().ok_or(Error::InvalidInput {
            field: "doi".to_string(),
            reason: "sci-hub strategy requires a DOI".to_string(),
        })?;

        let mut last_err = None;
        for mirror in &self.mirrors {
            match self.try_mirror(mirror, doi).await {
                Ok(content) => return Ok(content),
                Err(err) => {
                    warn!("Mirror {} failed: {}", mirror, err);
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or(Error::TransientSource {
            source_name: "sci_hub".to_string(),
            reason: "no mirrors configured".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_pdf_url_variants() {
        let mirror = "https://sci-hub.se";

        let html = r#"<iframe id="pdf" src="//dacemirror.sci-hub.se/journal/paper.pdf"></iframe>"#;
        assert_eq!(
            extract_pdf_url(html, mirror).unwrap(),
            "https://dacemirror.sci-hub.se/journal/paper.pdf"
        );

        let html = r#"<embed id="pdf" src="/downloads/paper.pdf">"#;
        assert_eq!(
            extract_pdf_url(html, mirror).unwrap(),
            "https://sci-hub.se/downloads/paper.pdf"
        );

        let html = r#"<iframe src="https://cdn.example.org/paper.pdf"></iframe>"#;
        assert_eq!(
            extract_pdf_url(html, mirror).unwrap(),
            "https://cdn.example.org/paper.pdf"
        );

        assert!(extract_pdf_url("<html><body>captcha</body></html>", mirror).is_none());
    }

    #[test]
    fn test_disabled_by_default() {
        let source = SciHubSource::new(&Config::default(), reqwest::Client::new());
        let request = FetchRequest {
            doi: Some("10.1038/nature12373".to_string()),
            ..Default::default()
        };
        assert_eq!(
            source.availability(&request),
            Availability::Skip(AttemptErrorKind::NotConfigured)
        );
    }

    #[test]
    fn test_enabled_requires_doi() {
        let mut config = Config::default();
        config.sources.sci_hub.enabled = true;
        let source = SciHubSource::new(&config, reqwest::Client::new());
        assert_eq!(
            source.availability(&FetchRequest::default()),
            Availability::Skip(AttemptErrorKind::MissingIdentifier)
        );
    }
}
