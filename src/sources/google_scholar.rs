//! Google Scholar result scraping.
//!
//! Searches by title (plus DOI when known), collects the `[PDF]` links
//! from each result row, and downloads only those hosted on domains that
//! are plausibly open access (repositories, preprint servers, .edu
//! hosts). HTML result links are tried after the PDF candidates. Scholar
//! rate-limits aggressively; a 429 propagates as a rate-limit error so
//! the retry layer backs off.

use super::publisher::extract_by_selectors;
use super::{Availability, FetchRequest, SourceContent, SourceStrategy};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::resolver::result::AttemptErrorKind;
use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

const MAX_RESULTS: usize = 5;

/// Hosts where a scraped PDF link is worth downloading.
static OPEN_ACCESS_DOMAINS: &[&str] = &[
    "researchgate",
    "arxiv",
    "biorxiv",
    "ncbi.nlm.nih.gov",
    "europepmc.org",
    ".edu/",
    ".ac.",
    "repository.",
    "zenodo",
    "osf.io",
    "figshare",
    "preprints",
];

static HTML_SELECTORS: &[&str] = &["article", "div.article-body", "div.fulltext", "main"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScholarHit {
    pub link: String,
    pub pdf_link: Option<String>,
}

/// Parse the result rows out of a Scholar results page.
pub(crate) fn parse_results(html: &str) -> Vec<ScholarHit> {
    let document = Html::parse_document(html);
    let Ok(row_sel) = Selector::parse("div.gs_r") else {
        return Vec::new();
    };
    let Ok(title_link_sel) = Selector::parse("h3.gs_rt a") else {
        return Vec::new();
    };
    let Ok(pdf_sel) = Selector::parse("div.gs_ggs a") else {
        return Vec::new();
    };

    document
        .select(&row_sel)
        .filter_map(|row| {
            let link = row
                .select(&title_link_sel)
                .find_map(|a| a.value().attr("href"))?
                .to_string();
            let pdf_link = row
                .select(&pdf_sel)
                .find_map(|a| a.value().attr("href"))
                .map(str::to_string);
            Some(ScholarHit { link, pdf_link })
        })
        .take(MAX_RESULTS)
        .collect()
}

pub(crate) fn is_likely_open(url: &str) -> bool {
    let lower = url.to_lowercase();
    OPEN_ACCESS_DOMAINS.iter().any(|domain| lower.contains(domain))
}

pub struct GoogleScholarSource {
    enabled: bool,
    base_url: String,
    client: reqwest::Client,
}

impl GoogleScholarSource {
    #[must_use]
    pub fn new(config: &Config, client: reqwest::Client) -> Self {
        let scholar = &config.sources.google_scholar;
        Self {
            enabled: scholar.enabled,
            base_url: scholar.base_url.clone(),
            client,
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<ScholarHit>> {
        let url = format!(
            "{}/scholar?q={}&hl=en",
            self.base_url,
            urlencoding::encode(query)
        );
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::from_status("google_scholar", status.as_u16()));
        }
        let body = response.text().await?;
        Ok(parse_results(&body))
    }
}

#[async_trait]
impl SourceStrategy for GoogleScholarSource {
    fn name(&self) -> &'static str {
        "google_scholar"
    }

    fn availability(&self, request: &FetchRequest) -> Availability {
        if !self.enabled {
            Availability::Skip(AttemptErrorKind::NotConfigured)
        } else if request.title.is_none() && request.doi.is_none() {
            Availability::Skip(AttemptErrorKind::MissingIdentifier)
        } else {
            Availability::Ready
        }
    }

    #[instrument(skip(self, request), fields(title = request.title.as_deref()))]
    async fn fetch(&self, request: &FetchRequest) -> Result<SourceContent> {
        let mut query = request.title.clone().unwrap_or_default();
        if let Some(doi) = &request.doi {
            if !query.is_empty() {
                query.push(' ');
            }
            query.push_str(doi);
        }

        let hits = self.search(&query).await?;
        if hits.is_empty() {
            return Err(Error::NoContent {
                source_name: "google_scholar".to_string(),
            });
        }

        // PDF candidates on open hosts first
        for hit in hits.iter().filter_map(|h| h.pdf_link.as_deref()) {
            if !is_likely_open(hit) {
                continue;
            }
            debug!("Downloading Scholar PDF candidate {}", hit);
            match self.client.get(hit).send().await {
                Ok(response) if response.status().is_success() => {
                    if let Ok(bytes) = response.bytes().await {
                        return Ok(SourceContent::Pdf(bytes.to_vec()));
                    }
                }
                Ok(response) => debug!("PDF candidate returned {}", response.status()),
                Err(err) => debug!("PDF candidate failed: {}", err),
            }
        }

        // Then HTML result pages
        for hit in &hits {
            debug!("Scraping Scholar HTML candidate {}", hit.link);
            match self.client.get(&hit.link).send().await {
                Ok(response) if response.status().is_success() => {
                    if let Ok(body) = response.text().await {
                        if let Some(text) = extract_by_selectors(&body, HTML_SELECTORS) {
                            return Ok(SourceContent::Text(text));
                        }
                    }
                }
                Ok(response) => debug!("HTML candidate returned {}", response.status()),
                Err(err) => debug!("HTML candidate failed: {}", err),
            }
        }

        Err(Error::NoContent {
            source_name: "google_scholar".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_results() {
        let html = r#"<div class="gs_r">
            <div class="gs_ggs"><a href="https://arxiv.org/pdf/1234.5678.pdf">[PDF]</a></div>
            <div class="gs_ri"><h3 class="gs_rt"><a href="https://journal.example.org/a">A paper</a></h3></div>
        </div>
        <div class="gs_r">
            <div class="gs_ri"><h3 class="gs_rt"><a href="https://other.example.org/b">Another</a></h3></div>
        </div>"#;

        let hits = parse_results(html);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].link, "https://journal.example.org/a");
        assert_eq!(
            hits[0].pdf_link.as_deref(),
            Some("https://arxiv.org/pdf/1234.5678.pdf")
        );
        assert!(hits[1].pdf_link.is_none());
    }

    #[test]
    fn test_is_likely_open() {
        assert!(is_likely_open("https://arxiv.org/pdf/1234.5678.pdf"));
        assert!(is_likely_open("https://dspace.mit.edu/paper.pdf"));
        assert!(is_likely_open("https://repository.example.org/x.pdf"));
        assert!(!is_likely_open("https://www.sciencedirect.com/x.pdf"));
    }

    #[test]
    fn test_availability_requires_title_or_doi() {
        let source = GoogleScholarSource::new(&Config::default(), reqwest::Client::new());
        let request = FetchRequest {
            pmid: Some("23831765".to_string()),
            ..Default::default()
        };
        assert_eq!(
            source.availability(&request),
            Availability::Skip(AttemptErrorKind::MissingIdentifier)
        );
    }
}
