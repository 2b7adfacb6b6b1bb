//! PDF-to-text pipeline.
//!
//! Backends run in a fixed cascade: pdf-extract, then a lopdf page walk,
//! then the external render service when one is configured. Each
//! candidate text is cleaned (line-break de-hyphenation, whitespace
//! normalization) and checked against the quality gate; the first
//! acceptable candidate wins. Exhausting the cascade without acceptable
//! text is `Ok(None)` so the caller can distinguish "unreadable PDF"
//! from transport failures.

pub mod backends;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::quality::QualityGate;
use backends::RenderServiceBackend;
use std::sync::OnceLock;
use tracing::{debug, instrument, warn};

const PDF_MAGIC: &[u8] = b"%PDF-";

fn hyphen_break_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"(\w)-\n(\w)").expect("valid regex"))
}

/// Undo line-break hyphenation and collapse whitespace runs.
pub fn clean_extracted_text(text: &str) -> String {
    let joined = hyphen_break_re().replace_all(text, "${1}${2}");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub struct PdfPipeline {
    quality: QualityGate,
    render_service: Option<RenderServiceBackend>,
}

impl PdfPipeline {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            quality: QualityGate::new(&config.quality),
            render_service: RenderServiceBackend::from_config(&config.pdf)?,
        })
    }

    /// Extract readable text from PDF bytes.
    ///
    /// Errors only on inputs that are not PDFs at all; a genuine PDF that
    /// yields no acceptable text returns `Ok(None)`.
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn extract(&self, bytes: &[u8]) -> Result<Option<String>> {
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(Error::Extraction {
                reason: "payload is not a PDF (missing %PDF- header)".to_string(),
            });
        }

        let local_backends: [(&str, fn(&[u8]) -> Result<String>); 2] = [
            ("pdf-extract", backends::extract_with_pdf_extract),
            ("lopdf", backends::extract_with_lopdf),
        ];

        for (name, backend) in local_backends {
            match backend(bytes) {
                Ok(raw) => {
                    let text = clean_extracted_text(&raw);
                    if self.quality.accepts(&text) {
                        debug!("Backend {} produced {} chars", name, text.len());
                        return Ok(Some(text));
                    }
                    debug!("Backend {} output rejected by quality gate", name);
                }
                Err(err) => warn!("Backend {} failed: {}", name, err),
            }
        }

        if let Some(render) = &self.render_service {
            match render.extract(bytes).await {
                Ok(raw) => {
                    let text = clean_extracted_text(&raw);
                    if self.quality.accepts(&text) {
                        debug!("Render service produced {} chars", text.len());
                        return Ok(Some(text));
                    }
                    debug!("Render service output rejected by quality gate");
                }
                Err(err) => warn!("Render service failed: {}", err),
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Build a real one-page PDF whose text clears the quality gate.
    fn sample_article_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
        ];
        for _ in 0..12 {
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(
                    "Introduction to the study of resolution across trials.",
                )],
            ));
            operations.push(Operation::new("Td", vec![0.into(), (-14).into()]));
        }
        operations.push(Operation::new("ET", vec![]));
        let content = Content { operations };

        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[tokio::test]
    async fn test_readable_pdf_extracts_text() {
        let pipeline = PdfPipeline::new(&Config::default()).unwrap();
        let bytes = sample_article_pdf();

        let text = pipeline.extract(&bytes).await.unwrap().unwrap();
        assert!(text.contains("Introduction to the study of resolution"));
        assert!(text.chars().count() >= 200);
    }

    #[test]
    fn test_clean_dehyphenates_line_breaks() {
        let raw = "The experi-\nment demonstrates   robust\nresults.";
        assert_eq!(
            clean_extracted_text(raw),
            "The experiment demonstrates robust results."
        );
    }

    #[test]
    fn test_clean_keeps_real_hyphens() {
        let raw = "state-of-the-art method";
        assert_eq!(clean_extracted_text(raw), "state-of-the-art method");
    }

    #[tokio::test]
    async fn test_non_pdf_payload_is_an_error() {
        let pipeline = PdfPipeline::new(&Config::default()).unwrap();
        let result = pipeline.extract(b"<html>not a pdf</html>").await;
        assert!(matches!(result, Err(Error::Extraction { .. })));
    }

    #[tokio::test]
    async fn test_unreadable_pdf_is_none() {
        let pipeline = PdfPipeline::new(&Config::default()).unwrap();
        // Valid magic, no readable content stream
        let result = pipeline.extract(b"%PDF-1.4\ngarbage").await.unwrap();
        assert!(result.is_none());
    }
}
