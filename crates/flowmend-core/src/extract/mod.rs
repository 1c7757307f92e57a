//! Text-extraction collaborator for uploaded process documents.
//!
//! Real PDF/DOCX decoding lives outside this system; the shipped extractor
//! resolves the file kind from the extension and decodes the formats that
//! are already text. Binary formats degrade to a placeholder message rather
//! than an error, matching how the rest of the pipeline treats missing
//! context (the query alone still drives the run).

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Detected kind of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Docx,
    Bpmn,
    Unknown,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Bpmn => "bpmn",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "bpmn" | "xml" => Self::Bpmn,
            _ => Self::Unknown,
        }
    }
}

/// Turns an uploaded file into plain text plus its detected kind.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, filename: &str, content: &[u8]) -> Result<(String, FileKind), ServiceError>;
}

/// Extension-driven extractor: decodes text-bearing formats, reports a
/// placeholder for binary ones.
pub struct ExtensionExtractor;

impl TextExtractor for ExtensionExtractor {
    fn extract(&self, filename: &str, content: &[u8]) -> Result<(String, FileKind), ServiceError> {
        let ext = filename.rsplit('.').next().unwrap_or_default();
        let kind = FileKind::from_extension(ext);

        let text = match kind {
            FileKind::Bpmn => String::from_utf8_lossy(content).into_owned(),
            FileKind::Pdf => "PDF text extraction is not available.".to_string(),
            FileKind::Docx => "DOCX text extraction is not available.".to_string(),
            FileKind::Unknown => match std::str::from_utf8(content) {
                Ok(text) => text.to_string(),
                Err(_) => {
                    return Err(ServiceError::BadRequest(format!(
                        "Unsupported binary file: {}",
                        filename
                    )))
                }
            },
        };

        tracing::info!("Extracted {} bytes from {} ({})", text.len(), filename, kind.as_str());
        Ok((text, kind))
    }
}
