//! Document chunking, batched embedding, and the persisted vector index.

pub mod batcher;
pub mod document;
pub mod vector_index;

pub use batcher::{BatchError, BatchOutcome, BatchReport, EmbeddingBatcher};
pub use document::{Chunk, ChunkMetadata, DocumentError};
pub use vector_index::{EmbeddedChunk, Metric, RetrievalResult, VectorIndex, VectorIndexError};
