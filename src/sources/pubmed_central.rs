//! PubMed Central open-access retrieval.
//!
//! Resolution runs PMID/DOI through the NCBI ID converter to obtain a
//! PMCID, fetches the JATS XML through E-utilities efetch, and falls back
//! to scraping the PMC article page when the XML route yields nothing.

use super::publisher::extract_by_selectors;
use super::{Availability, FetchRequest, SourceContent, SourceStrategy};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::resolver::result::AttemptErrorKind;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct IdConvResponse {
    #[serde(default)]
    records: Vec<IdConvRecord>,
}

#[derive(Debug, Deserialize)]
struct IdConvRecord {
    pmcid: Option<String>,
}

static PMC_HTML_SELECTORS: &[&str] = &[
    "div.jig-ncbiinpagenav",
    "main.article",
    "div#content-block",
    "article",
    "div.tsec",
    "main",
];

pub struct PubmedCentralSource {
    enabled: bool,
    idconv_base: String,
    eutils_base: String,
    article_base: String,
    client: reqwest::Client,
}

impl PubmedCentralSource {
    #[must_use]
    pub fn new(config: &Config, client: reqwest::Client) -> Self {
        let pmc = &config.sources.pubmed_central;
        Self {
            enabled: pmc.enabled,
            idconv_base: pmc.idconv_base.clone(),
            eutils_base: pmc.eutils_base.clone(),
            article_base: pmc.article_base.clone(),
            client,
        }
    }

    /// PMID or DOI to bare PMCID (no `PMC` prefix). `Ok(None)` means the
    /// article simply isn't open access in PMC.
    async fn resolve_pmcid(&self, request: &FetchRequest) -> Result<Option<String>> {
        let mut targets = Vec::new();
        if let Some(pmid) = &request.pmid {
            targets.push((pmid.clone(), None));
        }
        if let Some(doi) = &request.doi {
            targets.push((doi.clone(), Some("doi")));
        }

        for (id, idtype) in targets {
            let mut url = format!(
                "{}/?tool=fulltext-engine&ids={}&format=json",
                self.idconv_base,
                urlencoding::encode(&id)
            );
            if let Some(idtype) = idtype {
                url.push_str(&format!("&idtype={idtype}"));
            }

            let response = self.client.get(&url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(Error::from_status("pubmed_central", status.as_u16()));
            }

            let body: IdConvResponse = response.json().await?;
            if let Some(pmcid) = body.records.into_iter().find_map(|r| r.pmcid) {
                return Ok(Some(pmcid.trim_start_matches("PMC").to_string()));
            }
        }
        Ok(None)
    }

    /// Fetch JATS XML via efetch and flatten the body text.
    async fn fetch_jats(&self, pmcid: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/efetch.fcgi?db=pmc&id={}&rettype=xml",
            self.eutils_base, pmcid
        );
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::from_status("pubmed_central", status.as_u16()));
        }

        let xml = response.text().await?;
        let document = roxmltree::Document::parse(&xml).map_err(|e| Error::Parse {
            context: "pmc efetch xml".to_string(),
            message: e.to_string(),
        })?;

        // Flatten everything under <body>; skip articles PMC withholds
        let body = document
            .descendants()
            .find(|node| node.has_tag_name("body"));
        let Some(body) = body else {
            return Ok(None);
        };

        let mut text = String::new();
        for node in body.descendants() {
            if node.is_text() {
                if let Some(chunk) = node.text() {
                    let chunk = chunk.trim();
                    if !chunk.is_empty() {
                        if !text.is_empty() {
                            text.push(' ');
                        }
                        text.push_str(chunk);
                    }
                }
            }
        }

        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }

    /// HTML fallback: scrape the article page directly.
    async fn fetch_article_html(&self, pmcid: &str) -> Result<Option<String>> {
        let url = format!("{}/PMC{}/", self.article_base, pmcid);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::from_status("pubmed_central", status.as_u16()));
        }
        let body = response.text().await?;
        Ok(extract_by_selectors(&body, PMC_HTML_SELECTORS))
    }
}

#[async_trait]
impl SourceStrategy for PubmedCentralSource {
    fn name(&self) -> &'static str {
        "pubmed_central"
    }

    fn availability(&self, request: &FetchRequest) -> Availability {
        if !self.enabled {
            Availability::Skip(AttemptErrorKind::NotConfigured)
        } else if request.pmid.is_none() && request.doi.is_none() {
            Availability::Skip(AttemptErrorKind::MissingIdentifier)
        } else {
            Availability::Ready
        }
    }

    #[instrument(skip(self, request), fields(pmid = request.pmid.as_deref()))]
    async fn fetch(&self, request: &FetchRequest) -> Result<SourceContent> {
        let pmcid = self.resolve_pmcid(request).await?.ok_or(Error::NoContent {
            source_name: "pubmed_central".to_string(),
        })?;
        debug!("Resolved PMCID PMC{}", pmcid);

        match self.fetch_jats(&pmcid).await {
            Ok(Some(text)) => return Ok(SourceContent::Text(text)),
            Ok(None) => debug!("No JATS body for PMC{}, trying HTML", pmcid),
            Err(err) => debug!("efetch failed for PMC{}: {}", pmcid, err),
        }

        match self.fetch_article_html(&pmcid).await? {
            Some(text) => Ok(SourceContent::Text(text)),
            None => Err(Error::NoContent {
                source_name: "pubmed_central".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_with_base(base: &str) -> PubmedCentralSource {
        let mut config = Config::default();
        config.sources.pubmed_central.idconv_base = format!("{base}/idconv");
        config.sources.pubmed_central.eutils_base = format!("{base}/eutils");
        config.sources.pubmed_central.article_base = format!("{base}/articles");
        PubmedCentralSource::new(&config, reqwest::Client::new())
    }

    #[test]
    fn test_availability() {
        let source = source_with_base("http://localhost:1");
        assert_eq!(
            source.availability(&FetchRequest::default()),
            Availability::Skip(AttemptErrorKind::MissingIdentifier)
        );
        let request = FetchRequest {
            pmid: Some("23831765".to_string()),
            ..Default::default()
        };
        assert_eq!(source.availability(&request), Availability::Ready);
    }

    #[test]
    fn test_idconv_parse() {
        let body = r#"{"status":"ok","records":[{"pmid":"23831765","pmcid":"PMC3737249"}]}"#;
        let parsed: IdConvResponse = serde_json::from_str(body).unwrap();
        let pmcid = parsed.records.into_iter().find_map(|r| r.pmcid).unwrap();
        assert_eq!(pmcid.trim_start_matches("PMC"), "3737249");
    }

    #[test]
    fn test_idconv_parse_no_record() {
        let body = r#"{"status":"ok","records":[{"pmid":"999"}]}"#;
        let parsed: IdConvResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.records.into_iter().find_map(|r| r.pmcid).is_none());
    }
}
