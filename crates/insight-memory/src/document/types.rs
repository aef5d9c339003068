use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Where a loaded page came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub source: String,
    pub content_type: String,
    /// 1-based page number within the source file.
    pub page_number: usize,
}

/// One page of extracted text.
#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_path: String,
    pub page_number: usize,
    /// Position of the chunk within its page.
    pub chunk_index: usize,
    /// blake3 hex digest of the chunk text.
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A contiguous span of page text, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    #[must_use]
    pub fn new(text: String, page: &DocumentMetadata, chunk_index: usize) -> Self {
        let content_hash = blake3::hash(text.as_bytes()).to_hex().to_string();
        Self {
            metadata: ChunkMetadata {
                source_path: page.source.clone(),
                page_number: page.page_number,
                chunk_index,
                content_hash,
                extra: BTreeMap::new(),
            },
            text,
        }
    }

    /// File name of the source, falling back to the full path.
    #[must_use]
    pub fn source_name(&self) -> &str {
        std::path::Path::new(&self.metadata.source_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.metadata.source_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> DocumentMetadata {
        DocumentMetadata {
            source: "/data/rpm/relatorio_2024.pdf".into(),
            content_type: "application/pdf".into(),
            page_number: 3,
        }
    }

    #[test]
    fn chunk_inherits_page_metadata() {
        let chunk = Chunk::new("taxa de juros".into(), &page(), 2);
        assert_eq!(chunk.metadata.source_path, "/data/rpm/relatorio_2024.pdf");
        assert_eq!(chunk.metadata.page_number, 3);
        assert_eq!(chunk.metadata.chunk_index, 2);
        assert_eq!(
            chunk.metadata.content_hash,
            blake3::hash(b"taxa de juros").to_hex().to_string()
        );
    }

    #[test]
    fn source_name_strips_directories() {
        let chunk = Chunk::new("x".into(), &page(), 0);
        assert_eq!(chunk.source_name(), "relatorio_2024.pdf");
    }

    #[test]
    fn empty_extra_is_omitted_from_json() {
        let chunk = Chunk::new("x".into(), &page(), 0);
        let json = serde_json::to_value(&chunk).unwrap();
        assert!(json["metadata"].get("extra").is_none());
        let back: Chunk = serde_json::from_value(json).unwrap();
        assert_eq!(back, chunk);
    }
}
