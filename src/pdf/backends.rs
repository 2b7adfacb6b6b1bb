//! Individual PDF text extraction backends.

use crate::config::PdfConfig;
use crate::error::{Error, Result};
use crate::ratelimit::RateLimiter;
use std::time::Duration;
use tracing::debug;

/// Primary backend: full layout-aware extraction.
pub fn extract_with_pdf_extract(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| Error::Extraction {
        reason: format!("pdf-extract failed: {e}"),
    })
}

/// Secondary backend: walk pages with lopdf. Cruder text runs, but it
/// handles some malformed documents the primary backend rejects.
pub fn extract_with_lopdf(bytes: &[u8]) -> Result<String> {
    let document = lopdf::Document::load_mem(bytes).map_err(|e| Error::Extraction {
        reason: format!("lopdf load failed: {e}"),
    })?;

    let pages: Vec<u32> = document.get_pages().keys().copied().collect();
    if pages.is_empty() {
        return Err(Error::Extraction {
            reason: "PDF has no pages".to_string(),
        });
    }

    document.extract_text(&pages).map_err(|e| Error::Extraction {
        reason: format!("lopdf text extraction failed: {e}"),
    })
}

/// Last-resort backend: an external headless-browser rendering service
/// that accepts raw PDF bytes and returns plain text. Paced by a rate
/// limiter because each call spins up a browser on the remote end.
pub struct RenderServiceBackend {
    url: String,
    timeout: Duration,
    limiter: RateLimiter,
    client: reqwest::Client,
}

impl RenderServiceBackend {
    /// Returns `None` when no service URL is configured.
    pub fn from_config(config: &PdfConfig) -> Result<Option<Self>> {
        let Some(url) = config.render_service_url.clone() else {
            return Ok(None);
        };
        let timeout = Duration::from_secs(config.render_timeout_secs);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Some(Self {
            url,
            timeout,
            limiter: RateLimiter::new(Duration::from_secs(config.render_min_interval_secs)),
            client,
        }))
    }

    pub async fn extract(&self, bytes: &[u8]) -> Result<String> {
        self.limiter.acquire().await;
        debug!("Sending {} bytes to render service", bytes.len());

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/pdf")
            .timeout(self.timeout)
            .body(bytes.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::from_status("render_service", status.as_u16()));
        }
        Ok(response.text().await?)
    }
}
