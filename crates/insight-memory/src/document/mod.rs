pub mod chunker;
pub mod error;
pub mod loader;
pub mod splitter;
pub mod types;

pub use chunker::{ChunkingReport, DirectoryChunker, chunk_documents};
pub use error::DocumentError;
pub use loader::{PdfLoader, TextLoader};
pub use splitter::{SplitterConfig, TextSplitter};
pub use types::{Chunk, ChunkMetadata, Document, DocumentMetadata};

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Turns one file into its pages.
pub trait DocumentLoader: Send + Sync {
    fn load(
        &self,
        path: &std::path::Path,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>,
    >;

    /// Lowercase extensions this loader accepts, without the dot.
    fn supported_extensions(&self) -> &[&str];
}
