//! Direct publisher-site retrieval keyed by DOI prefix.
//!
//! Each major publisher resolves DOIs to a predictable article URL and
//! renders the body under known CSS selectors. Longest matching prefix
//! wins so `10.1016/j.cell` can shadow the generic Elsevier entry. When
//! no registry entry matches, the strategy falls back to following the
//! doi.org redirect and scraping generic article selectors.

use super::{read_page_body, Availability, FetchRequest, PageBody, SourceContent, SourceStrategy};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::resolver::result::AttemptErrorKind;
use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

/// One publisher's access pattern.
struct PublisherEntry {
    doi_prefix: &'static str,
    name: &'static str,
    url_template: &'static str,
    selectors: &'static [&'static str],
}

/// Template placeholders: `{doi}` is the full DOI, `{doi_suffix}` the part
/// after the first slash (Nature article IDs, Elsevier PIIs).
static PUBLISHER_REGISTRY: &[PublisherEntry] = &[
    PublisherEntry {
        doi_prefix: "10.1158",
        name: "American Association for Cancer Research",
        url_template: "https://aacrjournals.org/cancerrescommun/article/doi/{doi}",
        selectors: &["div.article-body", "section.article__sections", "div.hlFld-Fulltext"],
    },
    PublisherEntry {
        doi_prefix: "10.1038",
        name: "Nature Publishing Group",
        url_template: "https://www.nature.com/articles/{doi_suffix}",
        selectors: &["div#article-body", "div.c-article-body", "article.article-body"],
    },
    PublisherEntry {
        doi_prefix: "10.1016/j.cell",
        name: "Cell Press",
        url_template: "https://www.cell.com/cell/fulltext/{doi_suffix}",
        selectors: &["div.article-body"],
    },
    PublisherEntry {
        doi_prefix: "10.1016",
        name: "Elsevier",
        url_template: "https://www.sciencedirect.com/science/article/pii/{doi_suffix}",
        selectors: &["div.article-body", "div.Body", "section.article-section"],
    },
    PublisherEntry {
        doi_prefix: "10.1002",
        name: "Wiley",
        url_template: "https://onlinelibrary.wiley.com/doi/full/{doi}",
        selectors: &["div.article__body", "article.article-body", "div.fulltext"],
    },
    PublisherEntry {
        doi_prefix: "10.1007",
        name: "Springer",
        url_template: "https://link.springer.com/article/{doi}",
        selectors: &["div.c-article-body", "div#article-body"],
    },
    PublisherEntry {
        doi_prefix: "10.1093",
        name: "Oxford University Press",
        url_template: "https://academic.oup.com/article/{doi}",
        selectors: &["div.article-body", "div.widget-PdfCanvas"],
    },
    PublisherEntry {
        doi_prefix: "10.1371",
        name: "Public Library of Science",
        url_template: "https://journals.plos.org/plosone/article?id={doi}",
        selectors: &["div#artText", "div.article-body"],
    },
    PublisherEntry {
        doi_prefix: "10.3389",
        name: "Frontiers",
        url_template: "https://www.frontiersin.org/articles/{doi}",
        selectors: &["div.JournalFullText", "div.AbstractText"],
    },
    PublisherEntry {
        doi_prefix: "10.1186",
        name: "BioMed Central",
        url_template: "https://bmcbioinformatics.biomedcentral.com/articles/{doi}",
        selectors: &["div#Fulltext", "article"],
    },
];

/// Selectors tried against arbitrary article pages (doi.org fallback and
/// pages reached through explicit URLs).
static GENERIC_SELECTORS: &[&str] = &[
    "article",
    "div.article-body",
    "div.fulltext",
    "div.c-article-body",
    "main",
];

fn lookup_publisher(doi: &str) -> Option<&'static PublisherEntry> {
    PUBLISHER_REGISTRY
        .iter()
        .filter(|entry| doi.starts_with(entry.doi_prefix))
        .max_by_key(|entry| entry.doi_prefix.len())
}

fn render_template(template: &str, doi: &str) -> String {
    let suffix = doi.split_once('/').map_or(doi, |(_, s)| s);
    template
        .replace("{doi}", doi)
        .replace("{doi_suffix}", suffix)
}

/// Pull visible text out of the first selector that matches anything.
pub(crate) fn extract_by_selectors(html: &str, selectors: &[&str]) -> Option<String> {
    let document = Html::parse_document(html);
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        let text: String = document
            .select(&selector)
            .flat_map(|el| el.text())
            .collect::<Vec<_>>()
            .join(" ");
        let text = normalize_ws(&text);
        if !text.is_empty() {
            return Some(text);
        }
    }
    None
}

/// Find an on-page PDF link, resolving relative hrefs against the page URL.
pub(crate) fn find_pdf_link(html: &str, page_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href*='.pdf'], a.pdf-link").ok()?;
    let href = document
        .select(&selector)
        .find_map(|el| el.value().attr("href"))?;
    if href.starts_with("http") {
        Some(href.to_string())
    } else {
        let base = url::Url::parse(page_url).ok()?;
        base.join(href).ok().map(|u| u.to_string())
    }
}

fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub struct PublisherSource {
    enabled: bool,
    client: reqwest::Client,
}

impl PublisherSource {
    #[must_use]
    pub fn new(config: &Config, client: reqwest::Client) -> Self {
        Self {
            enabled: config.sources.publisher.enabled,
            client,
        }
    }

    async fn fetch_pdf_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::from_status("publisher", status.as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn scrape(&self, url: &str, selectors: &[&str]) -> Result<SourceContent> {
        let response = self.client.get(url).send().await?;
        // Some routes (arXiv, repository deposits) serve the PDF directly
        let (body, final_url) = match read_page_body("publisher", response).await? {
            PageBody::Pdf(bytes) => return Ok(SourceContent::Pdf(bytes)),
            PageBody::Html { body, final_url } => (body, final_url),
        };

        if let Some(text) = extract_by_selectors(&body, selectors) {
            return Ok(SourceContent::Text(text));
        }

        // No article body in the markup; chase an on-page PDF link instead
        if let Some(pdf_url) = find_pdf_link(&body, &final_url) {
            debug!("Following PDF link {}", pdf_url);
            let bytes = self.fetch_pdf_bytes(&pdf_url).await?;
            return Ok(SourceContent::Pdf(bytes));
        }

        debug!("No article content found at {}", final_url);
        Err(Error::NoContent {
            source_name: "publisher".to_string(),
        })
    }
}

#[async_trait]
impl SourceStrategy for PublisherSource {
    fn name(&self) -> &'static str {
        "publisher"
    }

    fn availability(&self, request: &FetchRequest) -> Availability {
        if !self.enabled {
            Availability::Skip(AttemptErrorKind::NotConfigured)
        } else if request.doi.is_none() && request.url.is_none() {
            Availability::Skip(AttemptErrorKind::MissingIdentifier)
        } else {
            Availability::Ready
        }
    }

    #[instrument(skip(self, request), fields(doi = request.doi.as_deref()))]
    async fn fetch(&self, request: &FetchRequest) -> Result<SourceContent> {
        // Explicit URL inputs land here as well, scraped generically
        if let Some(url) = &request.url {
            return self.scrape(url, GENERIC_SELECTORS).await;
        }

        let doi = request.doi.as_deref().ok_or(Error::InvalidInput {
            field: "doi".to_string(),
            reason: "publisher strategy requires a DOI or URL".to_string(),
        })?;

        if let Some(entry) = lookup_publisher(doi) {
            let url = render_template(entry.url_template, doi);
            debug!("Trying {} at {}", entry.name, url);
            match self.scrape(&url, entry.selectors).await {
                Ok(content) => return Ok(content),
                Err(err) => debug!("{} route failed: {}", entry.name, err),
            }
        }

        // Unknown or failed prefix: follow the doi.org redirect to whatever
        // landing page the registrant serves
        let url = format!("https://doi.org/{doi}");
        self.scrape(&url, GENERIC_SELECTORS).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_prefix_wins() {
        let entry = lookup_publisher("10.1016/j.cell.2023.05.001").unwrap();
        assert_eq!(entry.name, "Cell Press");

        let entry = lookup_publisher("10.1016/j.jbc.2023.104123").unwrap();
        assert_eq!(entry.name, "Elsevier");
    }

    #[test]
    fn test_unknown_prefix() {
        assert!(lookup_publisher("10.9999/unknown.123").is_none());
    }

    #[test]
    fn test_render_template() {
        assert_eq!(
            render_template("https://www.nature.com/articles/{doi_suffix}", "10.1038/nature12373"),
            "https://www.nature.com/articles/nature12373"
        );
        assert_eq!(
            render_template("https://example.org/full/{doi}", "10.1002/abc.123"),
            "https://example.org/full/10.1002/abc.123"
        );
    }

    #[test]
    fn test_extract_by_selectors() {
        let html = r#"<html><body>
            <nav>Menu</nav>
            <div class="c-article-body"><p>Introduction text.</p><p>Methods text.</p></div>
        </body></html>"#;
        let text = extract_by_selectors(html, &["div#missing", "div.c-article-body"]).unwrap();
        assert!(text.contains("Introduction text."));
        assert!(text.contains("Methods text."));
        assert!(!text.contains("Menu"));
    }

    #[test]
    fn test_find_pdf_link_resolves_relative() {
        let html = r#"<a href="/content/paper.pdf">Download PDF</a>"#;
        let link = find_pdf_link(html, "https://journal.example.org/article/1").unwrap();
        assert_eq!(link, "https://journal.example.org/content/paper.pdf");
    }

    #[test]
    fn test_availability_requires_doi_or_url() {
        let config = Config::default();
        let client = reqwest::Client::new();
        let source = PublisherSource::new(&config, client);

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
