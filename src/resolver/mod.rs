//! Resolution orchestrator.
//!
//! The resolver owns the strategy registry, metadata clients, PDF
//! pipeline, quality gate, retry policy, and result cache, and walks the
//! registry strictly in priority order. One attempt record per registered
//! strategy per resolution, successes and skips included, so the trail
//! always explains what was tried and why.

pub mod cache;
pub mod result;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::identifier::{detect_identifier, Identifier};
use crate::metadata::MetadataResolver;
use crate::pdf::PdfPipeline;
use crate::quality::QualityGate;
use crate::retry::RetryPolicy;
use crate::sources::{self, Availability, FetchRequest, SourceContent, SourceStrategy};
use cache::ResultCache;
use chrono::Utc;
use result::{AttemptErrorKind, PaperResult, SourceAttempt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

pub struct FullTextResolver {
    strategies: Vec<Arc<dyn SourceStrategy>>,
    metadata: MetadataResolver,
    pdf: PdfPipeline,
    quality: QualityGate,
    retry: RetryPolicy,
    cache: ResultCache,
    source_timeout: Duration,
}

impl FullTextResolver {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let client = sources::build_http_client(config)?;
        let strategies = sources::build_registry(config, client.clone());
        Self::with_strategies(config, strategies)
    }

    /// Construct with an explicit strategy list. The registry order given
    /// here is the resolution order.
    pub fn with_strategies(
        config: &Config,
        strategies: Vec<Arc<dyn SourceStrategy>>,
    ) -> Result<Self> {
        let client = sources::build_http_client(config)?;
        Ok(Self {
            strategies,
            metadata: MetadataResolver::new(config, client),
            pdf: PdfPipeline::new(config)?,
            quality: QualityGate::new(&config.quality),
            retry: RetryPolicy::new(&config.retry),
            cache: ResultCache::new(config.cache.max_entries),
            source_timeout: Duration::from_secs(config.resolver.source_timeout_secs),
        })
    }

    /// Resolve from a raw user-supplied string: detect the identifier
    /// kind, then resolve through the cache.
    pub async fn resolve_full_text(&self, raw: &str) -> Result<PaperResult> {
        let identifier = detect_identifier(raw)?;
        self.resolve_paper(&identifier, false).await
    }

    /// Resolve from already-separated identifier parts. A request may
    /// carry a DOI and a PMID at once; the most specific part present
    /// becomes the cache key.
    pub async fn resolve_components(
        &self,
        doi: Option<&str>,
        pmid: Option<&str>,
        title: Option<&str>,
        ignore_cache: bool,
    ) -> Result<PaperResult> {
        let identifier = if let Some(doi) = doi {
            Identifier::Doi(doi.to_string())
        } else if let Some(pmid) = pmid {
            Identifier::Pmid(pmid.to_string())
        } else if let Some(title) = title {
            Identifier::Title(title.to_string())
        } else {
            return Err(Error::InvalidInput {
                field: "identifier".to_string(),
                reason: "at least one of doi, pmid, title is required".to_string(),
            });
        };

        let mut request = build_request(&identifier);
        request.doi = doi.map(str::to_string);
        request.pmid = pmid.map(str::to_string);
        if request.title.is_none() {
            request.title = title.map(str::to_string);
        }

        self.resolve_cached(&identifier, request, ignore_cache).await
    }

    /// Resolve a normalized identifier. `ignore_cache` forces a fresh
    /// resolution and refreshes the stored entry.
    #[instrument(skip(self), fields(id = %identifier.canonical()))]
    pub async fn resolve_paper(
        &self,
        identifier: &Identifier,
        ignore_cache: bool,
    ) -> Result<PaperResult> {
        let request = build_request(identifier);
        self.resolve_cached(identifier, request, ignore_cache).await
    }

    async fn resolve_cached(
        &self,
        identifier: &Identifier,
        request: FetchRequest,
        ignore_cache: bool,
    ) -> Result<PaperResult> {
        let key = identifier.canonical();

        if !ignore_cache {
            if let Some(cached) = self.cache.get(&key).await {
                return Ok(cached);
            }
        }

        let result = self.resolve_uncached(identifier, request).await?;

        // Only resolutions that produced something are worth pinning;
        // failures stay re-attemptable without an explicit invalidation.
        // A bypassed lookup does not write back either, so the cached
        // entry set is untouched by `ignore_cache` calls.
        if !ignore_cache && result.has_content() {
            self.cache.insert(key, result.clone()).await;
        }
        Ok(result)
    }

    async fn resolve_uncached(
        &self,
        identifier: &Identifier,
        mut request: FetchRequest,
    ) -> Result<PaperResult> {
        let mut result = PaperResult::empty(identifier.clone());

        // Title inputs get a chance to become a real identifier first
        if request.title.is_some() && !request.has_any_identifier() {
            if let Some(title) = request.title.clone() {
                let resolution = self
                    .metadata
                    .resolve_title(&title, &mut result.metadata_attempts)
                    .await;
                request.doi = resolution.doi;
                request.pmid = resolution.pmid;
            }
        }

        // Metadata next: besides bibliographic fields it bridges PMID to
        // DOI (and vice versa), widening which strategies can run
        let metadata = self
            .metadata
            .resolve(
                request.doi.as_deref(),
                request.pmid.as_deref(),
                &mut result.metadata_attempts,
            )
            .await;
        if let Some(metadata) = &metadata {
            if request.doi.is_none() {
                request.doi = metadata.doi.clone();
            }
            if request.pmid.is_none() {
                request.pmid = metadata.pmid.clone();
            }
            if request.title.is_none() {
                request.title = metadata.title.clone();
            }
        }
        if let Some(metadata) = metadata {
            result.metadata = metadata;
        }

        for strategy in &self.strategies {
            let attempt = self.run_strategy(strategy.as_ref(), &request).await;
            match attempt {
                StrategyOutcome::Success { text, attempt } => {
                    info!(
                        source = strategy.name(),
                        chars = text.chars().count(),
                        "Full text retrieved"
                    );
                    result.primary_source = Some(strategy.name().to_string());
                    result.is_full_text = self.quality.is_full_text(&text);
                    result.full_text = Some(text);
                    result.attempts.push(attempt);
                    break;
                }
                StrategyOutcome::Miss(attempt) => result.attempts.push(attempt),
            }
        }

        // Remaining strategies were never consulted; the trail still
        // carries one entry each
        for strategy in self.strategies.iter().skip(result.attempts.len()) {
            result
                .attempts
                .push(SourceAttempt::skipped(strategy.name(), AttemptErrorKind::NotAttempted));
        }

        result.retrieved_at = Utc::now();
        Ok(result)
    }

    async fn run_strategy(
        &self,
        strategy: &dyn SourceStrategy,
        request: &FetchRequest,
    ) -> StrategyOutcome {
        let name = strategy.name();

        if let Availability::Skip(kind) = strategy.availability(request) {
            debug!("Skipping {}: {:?}", name, kind);
            return StrategyOutcome::Miss(SourceAttempt::skipped(name, kind));
        }

        let started_at = Utc::now();
        let timer = Instant::now();

        let fetched = self
            .retry
            .execute(name, || async {
                tokio::time::timeout(self.source_timeout, strategy.fetch(request))
                    .await
                    .map_err(|_| Error::Timeout {
                        timeout: self.source_timeout,
                    })?
            })
            .await;
        let latency_ms = timer.elapsed().as_millis() as u64;

        let content = match fetched {
            Ok(content) => content,
            Err(err) => {
                warn!("Source {} failed: {}", name, err);
                return StrategyOutcome::Miss(SourceAttempt::failure(
                    name,
                    started_at,
                    AttemptErrorKind::from_error(&err),
                    0,
                    latency_ms,
                ));
            }
        };

        let text = match content {
            SourceContent::Text(text) => Some(text),
            SourceContent::Pdf(bytes) => match self.pdf.extract(&bytes).await {
                Ok(text) => text,
                Err(err) => {
                    warn!("PDF from {} unusable: {}", name, err);
                    return StrategyOutcome::Miss(SourceAttempt::failure(
                        name,
                        started_at,
                        AttemptErrorKind::from_error(&err),
                        0,
                        latency_ms,
                    ));
                }
            },
        };

        // Attempt sizes are counted in characters, matching the quality
        // gate's unit, not in UTF-8 bytes
        match text {
            Some(text) if self.quality.accepts(&text) => {
                let chars = text.chars().count();
                let attempt = SourceAttempt::success(name, started_at, chars, latency_ms);
                StrategyOutcome::Success { text, attempt }
            }
            // A blank payload is an empty answer, not a quality verdict
            Some(text) if text.trim().is_empty() => StrategyOutcome::Miss(
                SourceAttempt::failure(name, started_at, AttemptErrorKind::EmptyContent, 0, latency_ms),
            ),
            Some(text) => {
                let chars = text.chars().count();
                debug!("Source {} output below quality bar ({} chars)", name, chars);
                StrategyOutcome::Miss(SourceAttempt::failure(
                    name,
                    started_at,
                    AttemptErrorKind::QualityRejected,
                    chars,
                    latency_ms,
                ))
            }
            None => StrategyOutcome::Miss(SourceAttempt::failure(
                name,
                started_at,
                AttemptErrorKind::EmptyContent,
                0,
                latency_ms,
            )),
        }
    }

    /// Diagnostic sweep: run every strategy once regardless of earlier
    /// successes, with no cache involvement, and report all attempts.
    pub async fn test_all_sources(&self, raw: &str) -> Result<Vec<SourceAttempt>> {
        let identifier = detect_identifier(raw)?;
        let mut request = build_request(&identifier);

        let mut metadata_attempts = Vec::new();
        if let Some(metadata) = self
            .metadata
            .resolve(
                request.doi.as_deref(),
                request.pmid.as_deref(),
                &mut metadata_attempts,
            )
            .await
        {
            if request.doi.is_none() {
                request.doi = metadata.doi;
            }
            if request.pmid.is_none() {
                request.pmid = metadata.pmid;
            }
            if request.title.is_none() {
                request.title = metadata.title;
            }
        }

        let mut attempts = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            let outcome = self.run_strategy(strategy.as_ref(), &request).await;
            attempts.push(match outcome {
                StrategyOutcome::Success { attempt, .. } => attempt,
                StrategyOutcome::Miss(attempt) => attempt,
            });
        }
        Ok(attempts)
    }

    /// Drop a cached resolution so the next lookup refetches.
    pub async fn invalidate(&self, identifier: &Identifier) -> bool {
        self.cache.invalidate(&identifier.canonical()).await
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.len().await
    }
}

enum StrategyOutcome {
    Success { text: String, attempt: SourceAttempt },
    Miss(SourceAttempt),
}

fn build_request(identifier: &Identifier) -> FetchRequest {
    match identifier {
        Identifier::Doi(doi) => FetchRequest {
            doi: Some(doi.clone()),
            ..Default::default()
        },
        Identifier::Pmid(pmid) => FetchRequest {
            pmid: Some(pmid.clone()),
            ..Default::default()
        },
        Identifier::Arxiv(id) => FetchRequest {
            url: Some(format!("https://arxiv.org/pdf/{id}")),
            ..Default::default()
        },
        Identifier::Url(url) => FetchRequest {
            url: Some(url.clone()),
            ..Default::default()
        },
        Identifier::Title(title) => FetchRequest {
            title: Some(title.clone()),
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_variants() {
        let request = build_request(&Identifier::Doi("10.1038/nature12373".to_string()));
        assert_eq!(request.doi.as_deref(), Some("10.1038/nature12373"));
        assert!(request.pmid.is_none());

        let request = build_request(&Identifier::Arxiv("2301.04567".to_string()));
        assert_eq!(request.url.as_deref(), Some("https://arxiv.org/pdf/2301.04567"));

        let request = build_request(&Identifier::Title("A paper".to_string()));
        assert!(!request.has_any_identifier());
    }
}
