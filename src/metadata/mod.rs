//! Bibliographic metadata resolution.
//!
//! CrossRef and PubMed are consulted independently and merged into one
//! [`PaperMetadata`]. CrossRef's title is authoritative (PubMed titles
//! carry trailing punctuation and bracket markup); PubMed's abstract is
//! authoritative (CrossRef abstracts are sparsely populated JATS). Every
//! upstream call lands in the metadata attempt trail, separate from the
//! full-text trail.

pub mod crossref;
pub mod pubmed;

use crate::config::Config;
use crate::error::Result;
use crate::resolver::result::{AttemptErrorKind, PaperMetadata, SourceAttempt};
use chrono::Utc;
use crossref::CrossrefClient;
use pubmed::PubmedClient;
use std::time::Instant;
use tracing::{debug, instrument};

/// Identifiers recovered from a title search.
#[derive(Debug, Default, Clone)]
pub struct TitleResolution {
    pub doi: Option<String>,
    pub pmid: Option<String>,
}

pub struct MetadataResolver {
    enabled: bool,
    crossref: CrossrefClient,
    pubmed: PubmedClient,
}

impl MetadataResolver {
    #[must_use]
    pub fn new(config: &Config, client: reqwest::Client) -> Self {
        Self {
            enabled: config.metadata.enabled,
            crossref: CrossrefClient::new(&config.metadata, client.clone()),
            pubmed: PubmedClient::new(&config.metadata, client),
        }
    }

    /// Merge metadata from both upstreams, recording one attempt per
    /// consulted service. Metadata failures never abort resolution.
    #[instrument(skip(self, attempts))]
    pub async fn resolve(
        &self,
        doi: Option<&str>,
        pmid: Option<&str>,
        attempts: &mut Vec<SourceAttempt>,
    ) -> Option<PaperMetadata> {
        if !self.enabled {
            return None;
        }

        let mut merged: Option<PaperMetadata> = None;

        if let Some(doi) = doi {
            let fetched = self
                .record(attempts, "crossref", self.crossref.fetch_by_doi(doi))
                .await;
            if let Some(meta) = fetched {
                merged = Some(meta);
            }
        }

        if let Some(pmid) = pmid {
            let fetched = self
                .record(attempts, "pubmed", self.pubmed.fetch_by_pmid(pmid))
                .await;
            if let Some(pubmed_meta) = fetched {
                merged = Some(match merged {
                    Some(mut crossref_meta) => {
                        // PubMed abstract wins even when CrossRef had one
                        if pubmed_meta.abstract_text.is_some() {
                            crossref_meta.abstract_text = pubmed_meta.abstract_text.clone();
                        }
                        crossref_meta.supplement(pubmed_meta);
                        crossref_meta
                    }
                    None => pubmed_meta,
                });
            }
        }

        merged
    }

    /// Title to identifiers: PubMed esearch first, CrossRef as backup.
    #[instrument(skip(self, attempts))]
    pub async fn resolve_title(
        &self,
        title: &str,
        attempts: &mut Vec<SourceAttempt>,
    ) -> TitleResolution {
        let mut resolution = TitleResolution::default();
        if !self.enabled {
            return resolution;
        }

        let pmid = self
            .record(attempts, "pubmed", self.pubmed.search_by_title(title))
            .await;
        if let Some(pmid) = pmid {
            debug!("Title resolved to PMID {}", pmid);
            resolution.pmid = Some(pmid);
            return resolution;
        }

        let meta = self
            .record(attempts, "crossref", self.crossref.search_by_title(title))
            .await;
        if let Some(meta) = meta {
            resolution.doi = meta.doi;
        }
        resolution
    }

    /// Run one upstream call, append its attempt, and flatten errors and
    /// empty responses to `None`.
    async fn record<T>(
        &self,
        attempts: &mut Vec<SourceAttempt>,
        name: &str,
        call: impl std::future::Future<Output = Result<Option<T>>>,
    ) -> Option<T> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let latency_ms = |timer: Instant| timer.elapsed().as_millis() as u64;

        match call.await {
            Ok(Some(value)) => {
                attempts.push(SourceAttempt::success(name, started_at, 0, latency_ms(timer)));
                Some(value)
            }
            Ok(None) => {
                attempts.push(SourceAttempt::failure(
                    name,
                    started_at,
                    AttemptErrorKind::EmptyContent,
                    0,
                    latency_ms(timer),
                ));
                None
            }
            Err(err) => {
                debug!("Metadata call to {} failed: {}", name, err);
                attempts.push(SourceAttempt::failure(
                    name,
                    started_at,
                    AttemptErrorKind::from_error(&err),
                    0,
                    latency_ms(timer),
                ));
                None
            }
        }
    }
}
