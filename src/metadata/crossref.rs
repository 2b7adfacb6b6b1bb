//! CrossRef works API client.

use crate::config::MetadataConfig;
use crate::error::{Error, Result};
use crate::resolver::result::PaperMetadata;
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct WorksEnvelope {
    message: Work,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    message: SearchMessage,
}

#[derive(Debug, Deserialize)]
struct SearchMessage {
    #[serde(default)]
    items: Vec<Work>,
}

#[derive(Debug, Deserialize)]
struct Work {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<WorkAuthor>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    issued: Option<DateParts>,
    #[serde(rename = "abstract")]
    abstract_jats: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkAuthor {
    given: Option<String>,
    family: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DateParts {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<u32>>>,
}

fn jats_tag_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"</?jats:[^>]+>|</?[a-zA-Z][^>]*>").expect("valid regex"))
}

/// CrossRef abstracts arrive as JATS XML fragments; strip the markup.
fn strip_jats(raw: &str) -> String {
    let stripped = jats_tag_re().replace_all(raw, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Work {
    fn into_metadata(self) -> PaperMetadata {
        let authors = self
            .author
            .into_iter()
            .filter_map(|a| match (a.given, a.family) {
                (Some(given), Some(family)) => Some(format!("{given} {family}")),
                (None, Some(family)) => Some(family),
                (Some(given), None) => Some(given),
                (None, None) => None,
            })
            .collect();

        PaperMetadata {
            title: self.title.into_iter().next(),
            authors,
            abstract_text: self.abstract_jats.as_deref().map(strip_jats),
            journal: self.container_title.into_iter().next(),
            year: self
                .issued
                .and_then(|d| d.date_parts.into_iter().next())
                .and_then(|parts| parts.into_iter().next())
                .flatten(),
            doi: self.doi.map(|d| d.to_lowercase()),
            pmid: None,
            pmcid: None,
        }
    }
}

pub struct CrossrefClient {
    base_url: String,
    mailto: Option<String>,
    client: reqwest::Client,
}

impl CrossrefClient {
    #[must_use]
    pub fn new(config: &MetadataConfig, client: reqwest::Client) -> Self {
        Self {
            base_url: config.crossref_base.clone(),
            mailto: config.mailto.clone(),
            client,
        }
    }

    fn mailto_param(&self) -> String {
        self.mailto
            .as_deref()
            .map(|m| format!("?mailto={}", urlencoding::encode(m)))
            .unwrap_or_default()
    }

    /// Metadata for a known DOI. `Ok(None)` when CrossRef has no record.
    #[instrument(skip(self))]
    pub async fn fetch_by_doi(&self, doi: &str) -> Result<Option<PaperMetadata>> {
        let url = format!(
            "{}/works/{}{}",
            self.base_url,
            urlencoding::encode(doi),
            self.mailto_param()
        );
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::from_status("crossref", status.as_u16()));
        }

        let envelope: WorksEnvelope = response.json().await?;
        Ok(Some(envelope.message.into_metadata()))
    }

    /// Best-match DOI lookup for a title. Returns the top work's metadata.
    #[instrument(skip(self))]
    pub async fn search_by_title(&self, title: &str) -> Result<Option<PaperMetadata>> {
        let url = format!(
            "{}/works?query.title={}&rows=1",
            self.base_url,
            urlencoding::encode(title)
        );
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::from_status("crossref", status.as_u16()));
        }

        let envelope: SearchEnvelope = response.json().await?;
        let work = envelope.message.items.into_iter().next();
        debug!(found = work.is_some(), "CrossRef title search");
        Ok(work.map(Work::into_metadata))
    }
}
