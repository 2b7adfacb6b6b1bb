//! NCBI E-utilities client for PubMed metadata.
//!
//! efetch returns PubmedArticle XML; we pull the bibliographic fields and
//! the ArticleIdList (the cheapest PMID-to-DOI bridge available). esearch
//! backs title-to-PMID resolution.

use crate::config::MetadataConfig;
use crate::error::{Error, Result};
use crate::resolver::result::PaperMetadata;
use roxmltree::Node;
use serde::Deserialize;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct ESearchEnvelope {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

pub struct PubmedClient {
    eutils_base: String,
    client: reqwest::Client,
}

impl PubmedClient {
    #[must_use]
    pub fn new(config: &MetadataConfig, client: reqwest::Client) -> Self {
        Self {
            eutils_base: config.eutils_base.clone(),
            client,
        }
    }

    /// Full metadata for a PMID. `Ok(None)` when PubMed has no article.
    #[instrument(skip(self))]
    pub async fn fetch_by_pmid(&self, pmid: &str) -> Result<Option<PaperMetadata>> {
        let url = format!(
            "{}/efetch.fcgi?db=pubmed&id={}&retmode=xml",
            self.eutils_base, pmid
        );
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::from_status("pubmed", status.as_u16()));
        }

        let xml = response.text().await?;
        parse_pubmed_article(&xml, pmid)
    }

    /// Title search returning the top PMID, if any.
    #[instrument(skip(self))]
    pub async fn search_by_title(&self, title: &str) -> Result<Option<String>> {
        let term = format!("{}[Title]", title.split_whitespace().collect::<Vec<_>>().join(" "));
        let url = format!(
            "{}/esearch.fcgi?db=pubmed&term={}&retmax=1&retmode=json",
            self.eutils_base,
            urlencoding::encode(&term)
        );
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::from_status("pubmed", status.as_u16()));
        }

        let envelope: ESearchEnvelope = response.json().await?;
        let pmid = envelope.esearchresult.idlist.into_iter().next();
        debug!(found = pmid.is_some(), "PubMed title search");
        Ok(pmid)
    }
}

fn text_of<'a>(node: Node<'a, 'a>) -> String {
    let mut out = String::new();
    for descendant in node.descendants() {
        if descendant.is_text() {
            if let Some(chunk) = descendant.text() {
                let chunk = chunk.trim();
                if !chunk.is_empty() {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(chunk);
                }
            }
        }
    }
    out
}

fn parse_pubmed_article(xml: &str, pmid: &str) -> Result<Option<PaperMetadata>> {
    let document = roxmltree::Document::parse(xml).map_err(|e| Error::Parse {
        context: "pubmed efetch xml".to_string(),
        message: e.to_string(),
    })?;

    let Some(article) = document
        .descendants()
        .find(|n| n.has_tag_name("PubmedArticle"))
    else {
        return Ok(None);
    };

    let find_text = |tag: &str| {
        article
            .descendants()
            .find(|n| n.has_tag_name(tag))
            .map(text_of)
            .filter(|t| !t.is_empty())
    };

    let authors = article
        .descendants()
        .filter(|n| n.has_tag_name("Author"))
        .filter_map(|author| {
            let fore = author
                .children()
                .find(|n| n.has_tag_name("ForeName"))
                .and_then(|n| n.text());
            let last = author
                .children()
                .find(|n| n.has_tag_name("LastName"))
                .and_then(|n| n.text())?;
            Some(match fore {
                Some(fore) => format!("{fore} {last}"),
                None => last.to_string(),
            })
        })
        .collect();

    // ArticleIdList carries the DOI and PMCID when PubMed knows them
    let id_of = |idtype: &str| {
        article
            .descendants()
            .filter(|n| n.has_tag_name("ArticleId"))
            .find(|n| n.attribute("IdType") == Some(idtype))
            .and_then(|n| n.text())
            .map(str::to_string)
    };

    let year = article
        .descendants()
        .find(|n| n.has_tag_name("PubDate"))
        .and_then(|d| d.children().find(|n| n.has_tag_name("Year")))
        .and_then(|n| n.text())
        .and_then(|y| y.parse().ok());

    Ok(Some(PaperMetadata {
        title: find_text("ArticleTitle"),
        authors,
        abstract_text: find_text("AbstractText"),
        journal: find_text("Title"),
        year,
        doi: id_of("doi").map(|d| d.to_lowercase()),
        pmid: Some(pmid.to_string()),
        pmcid: id_of("pmc"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <Article>
        <Journal><Title>Nature</Title>
          <JournalIssue><PubDate><Year>2013</Year></PubDate></JournalIssue>
        </Journal>
        <ArticleTitle>Structure of a protein</ArticleTitle>
        <Abstract><AbstractText>We report the structure.</AbstractText></Abstract>
        <AuthorList>
          <Author><LastName>Smith</LastName><ForeName>Alice</ForeName></Author>
          <Author><LastName>Jones</LastName></Author>
        </AuthorList>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">23831765</ArticleId>
        <ArticleId IdType="doi">10.1038/NATURE12373</ArticleId>
        <ArticleId IdType="pmc">PMC3737249</ArticleId>
      </ArticleIdList>
    </PubmedData>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn test_parse_pubmed_article() {
        let meta = parse_pubmed_article(SAMPLE, "23831765").unwrap().unwrap();
        assert_eq!(meta.title.as_deref(), Some("Structure of a protein"));
        assert_eq!(meta.authors, vec!["Alice Smith", "Jones"]);
        assert_eq!(meta.abstract_text.as_deref(), Some("We report the structure."));
        assert_eq!(meta.journal.as_deref(), Some("Nature"));
        assert_eq!(meta.year, Some(2013));
        assert_eq!(meta.doi.as_deref(), Some("10.1038/nature12373"));
        assert_eq!(meta.pmid.as_deref(), Some("23831765"));
        assert_eq!(meta.pmcid.as_deref(), Some("PMC3737249"));
    }

    #[test]
    fn test_parse_empty_set() {
        let meta = parse_pubmed_article("<PubmedArticleSet/>", "1").unwrap();
        assert!(meta.is_none());
    }

    #[test]
    fn test_parse_malformed_xml() {
        assert!(matches!(
            parse_pubmed_article("<broken", "1"),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_esearch_parse() {
        let body = r#"{"esearchresult":{"idlist":["23831765"],"count":"1"}}"#;
        let envelope: ESearchEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.esearchresult.idlist, vec!["23831765"]);
    }
}
