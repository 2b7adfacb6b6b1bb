//! Europe PMC REST retrieval.
//!
//! Primary route is the `{pmid}/fullTextXML` endpoint, whose JATS body is
//! flattened to text. When no full-text XML exists the strategy degrades
//! to the search endpoint's core result, returning the abstract so the
//! caller still gets something usable for downstream metadata.

use super::{Availability, FetchRequest, SourceContent, SourceStrategy};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::resolver::result::AttemptErrorKind;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    hit_count: u64,
    result_list: Option<ResultList>,
}

#[derive(Debug, Deserialize)]
struct ResultList {
    #[serde(default)]
    result: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    abstract_text: Option<String>,
}

pub struct EuropePmcSource {
    enabled: bool,
    base_url: String,
    client: reqwest::Client,
}

impl EuropePmcSource {
    #[must_use]
    pub fn new(config: &Config, client: reqwest::Client) -> Self {
        let epmc = &config.sources.europe_pmc;
        Self {
            enabled: epmc.enabled,
            base_url: epmc.base_url.clone(),
            client,
        }
    }

    async fn fetch_full_text_xml(&self, pmid: &str) -> Result<Option<String>> {
        let url = format!("{}/{}/fullTextXML", self.base_url, pmid);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        // 404 here means "no open full text", not a broken article
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::from_status("europe_pmc", status.as_u16()));
        }

        let xml = response.text().await?;
        if xml.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(flatten_jats(&xml)?))
    }

    async fn fetch_abstract(&self, pmid: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/search?query=EXT_ID:{}&resultType=core&format=json",
            self.base_url, pmid
        );
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::from_status("europe_pmc", status.as_u16()));
        }

        let body: SearchResponse = response.json().await?;
        if body.hit_count == 0 {
            return Ok(None);
        }
        Ok(body
            .result_list
            .and_then(|list| list.result.into_iter().next())
            .and_then(|result| result.abstract_text))
    }
}

/// Flatten a JATS document's `<body>` (or the whole document when no body
/// element exists) to whitespace-normalized text.
fn flatten_jats(xml: &str) -> Result<String> {
    let document = roxmltree::Document::parse(xml).map_err(|e| Error::Parse {
        context: "europe pmc fullTextXML".to_string(),
        message: e.to_string(),
    })?;

    let root = document
        .descendants()
        .find(|node| node.has_tag_name("body"))
        .unwrap_or_else(|| document.root_element());

    let mut text = String::new();
    for node in root.descendants() {
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
    Ok(text)
}

#[async_trait]
impl SourceStrategy for EuropePmcSource {
    fn name(&self) -> &'static str {
        "europe_pmc"
    }

    fn availability(&self, request: &FetchRequest) -> Availability {
        if !self.enabled {
            Availability::Skip(AttemptErrorKind::NotConfigured)
        } else if request.pmid.is_none() {
            Availability::Skip(AttemptErrorKind::MissingIdentifier)
        } else {
            Availability::Ready
        }
    }

    #[instrument(skip(self, request), fields(pmid = request.pmid.as_deref()))]
    async fn fetch(&self, request: &FetchRequest) -> Result<SourceContent> {
        let pmid = request.pmid.as_deref().ok_or(Error::InvalidInput {
            field: "pmid".to_string(),
            reason: "europe pmc strategy requires a PMID".to_string(),
        })?;

        if let Some(text) = self.fetch_full_text_xml(pmid).await? {
            if !text.is_empty() {
                return Ok(SourceContent::Text(text));
            }
        }

        debug!("No full-text XML for PMID {}, trying abstract", pmid);
        match self.fetch_abstract(pmid).await? {
            Some(abstract_text) if !abstract_text.is_empty() => {
                Ok(SourceContent::Text(abstract_text))
            }
            _ => Err(Error::NoContent {
                source_name: "europe_pmc".to_string(),
            }),
        }
    }
}
