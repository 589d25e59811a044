//! Text extraction for uploaded documents.

use async_trait::async_trait;

use crate::error::StageError;

use super::{Artifact, ArtifactKind, Extractor};

/// Plain UTF-8 text files.
#[derive(Debug, Default)]
pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Extractor for TextExtractor {
    fn supports(&self, kind: ArtifactKind) -> bool {
        kind == ArtifactKind::Text
    }

    async fn extract(&self, artifact: &Artifact) -> Result<String, StageError> {
        let text = std::str::from_utf8(&artifact.bytes)
            .map_err(|e| StageError::ExtractionFailed(format!("text is not valid UTF-8: {}", e)))?;
        let text = text.trim_start_matches('\u{feff}').trim();
        if text.is_empty() {
            return Err(StageError::ExtractionFailed(
                "document contains no text".to_string(),
            ));
        }
        Ok(text.to_string())
    }
}

/// PDF text layer extraction with lopdf. Scanned PDFs without a text layer
/// fail rather than being OCR'd.
#[derive(Debug, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

fn extract_pdf_text(bytes: &[u8]) -> Result<String, StageError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| StageError::ExtractionFailed(format!("failed to load PDF: {}", e)))?;

    let mut text = String::new();
    for (page_num, _) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => log::debug!("Skipping PDF page {}: {}", page_num, e),
        }
    }

    let text = text.trim();
    if text.is_empty() {
        return Err(StageError::ExtractionFailed(
            "PDF has no extractable text".to_string(),
        ));
    }
    Ok(text.to_string())
}

#[async_trait]
impl Extractor for PdfExtractor {
    fn supports(&self, kind: ArtifactKind) -> bool {
        kind == ArtifactKind::Pdf
    }

    async fn extract(&self, artifact: &Artifact) -> Result<String, StageError> {
        tracing::debug!(key = %artifact.key, size = artifact.bytes.len(), "extracting PDF text");
        let bytes = artifact.bytes.clone();
        tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
            .await
            .map_err(|e| StageError::ExtractionFailed(format!("PDF extraction task failed: {}", e)))?
    }
}

#[cfg(test)]
pub(crate) fn blank_pdf(pages: usize) -> Vec<u8> {
    use lopdf::{dictionary, Document, Object};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            })
            .into()
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}
