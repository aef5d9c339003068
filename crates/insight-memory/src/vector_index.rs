//! Exact k-nearest-neighbour index over chunk embeddings, persisted as a
//! single JSON file inside the index directory.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::document::Chunk;

/// File name of the serialized index inside its directory.
pub const INDEX_FILE: &str = "index.json";

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum VectorIndexError {
    #[error("cannot build an index with no entries")]
    EmptyIndex,

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no index found at {0}")]
    NotFound(PathBuf),

    #[error("index at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A search hit. `score` is cosine similarity: higher is closer.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    format_version: u32,
    dimension: usize,
    metric: Metric,
    #[serde(skip_serializing_if = "Option::is_none")]
    embedding_model: Option<&'a str>,
    entry_count: usize,
    checksum: String,
    vectors: String,
    chunks: &'a [Chunk],
}

#[derive(Deserialize)]
struct IndexFile {
    format_version: u32,
    dimension: usize,
    metric: Metric,
    #[serde(default)]
    embedding_model: Option<String>,
    entry_count: usize,
    checksum: String,
    vectors: String,
    chunks: Vec<Chunk>,
}

/// Immutable once built. Vectors are stored row-major in one buffer.
pub struct VectorIndex {
    dimension: usize,
    metric: Metric,
    embedding_model: Option<String>,
    chunks: Vec<Chunk>,
    vectors: Vec<f32>,
    norms: Vec<f32>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimension", &self.dimension)
            .field("metric", &self.metric)
            .field("embedding_model", &self.embedding_model)
            .field("entries", &self.chunks.len())
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Build an index from embedded chunks, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns `EmptyIndex` for no entries, `DimensionMismatch` if vectors
    /// differ in length or are empty, and `InvalidArgument` if a vector holds
    /// a NaN or infinite component.
    pub fn build(entries: Vec<EmbeddedChunk>) -> Result<Self, VectorIndexError> {
        let dimension = entries
            .first()
            .map(|e| e.vector.len())
            .ok_or(VectorIndexError::EmptyIndex)?;
        if dimension == 0 {
            return Err(VectorIndexError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }

        let mut chunks = Vec::with_capacity(entries.len());
        let mut vectors = Vec::with_capacity(entries.len() * dimension);
        for entry in entries {
            if entry.vector.len() != dimension {
                return Err(VectorIndexError::DimensionMismatch {
                    expected: dimension,
                    actual: entry.vector.len(),
                });
            }
            if entry.vector.iter().any(|x| !x.is_finite()) {
                return Err(VectorIndexError::InvalidArgument(format!(
                    "vector {} has a non-finite component",
                    chunks.len()
                )));
            }
            vectors.extend_from_slice(&entry.vector);
            chunks.push(entry.chunk);
        }
        Ok(Self::from_parts(dimension, None, chunks, vectors))
    }

    fn from_parts(
        dimension: usize,
        embedding_model: Option<String>,
        chunks: Vec<Chunk>,
        vectors: Vec<f32>,
    ) -> Self {
        let norms = vectors
            .chunks_exact(dimension)
            .map(|v| v.iter().map(|x| x * x).sum::<f32>().sqrt())
            .collect();
        Self {
            dimension,
            metric: Metric::Cosine,
            embedding_model,
            chunks,
            vectors,
            norms,
        }
    }

    /// Record which embedding model produced the vectors.
    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    #[must_use]
    pub fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// The `min(k, len)` entries most similar to `query`, best first.
    /// Equal scores keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `k` is zero or `query` has the wrong
    /// dimension or a non-finite component.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievalResult>, VectorIndexError> {
        if k == 0 {
            return Err(VectorIndexError::InvalidArgument(
                "k must be greater than zero".into(),
            ));
        }
        if query.len() != self.dimension {
            return Err(VectorIndexError::InvalidArgument(format!(
                "query has dimension {}, index has {}",
                query.len(),
                self.dimension
            )));
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(VectorIndexError::InvalidArgument(
                "query has a non-finite component".into(),
            ));
        }

        let query_norm = query.iter().map(|x| x * x).sum::<f32>().sqrt();
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension)
            .zip(&self.norms)
            .map(|(v, &norm)| {
                if norm == 0.0 || query_norm == 0.0 {
                    return 0.0;
                }
                let dot: f32 = v.iter().zip(query).map(|(a, b)| a * b).sum();
                dot / (norm * query_norm)
            })
            .enumerate()
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| RetrievalResult {
                chunk: self.chunks[i].clone(),
                score,
            })
            .collect())
    }

    /// Write the index to `dir/index.json`, replacing any previous index atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file cannot
    /// be written and renamed into place.
    pub fn save(&self, dir: &Path) -> Result<(), VectorIndexError> {
        std::fs::create_dir_all(dir)?;

        let bytes: Vec<u8> = self.vectors.iter().flat_map(|x| x.to_le_bytes()).collect();
        let file = IndexFileRef {
            format_version: FORMAT_VERSION,
            dimension: self.dimension,
            metric: self.metric,
            embedding_model: self.embedding_model.as_deref(),
            entry_count: self.chunks.len(),
            checksum: blake3::hash(&bytes).to_hex().to_string(),
            vectors: STANDARD.encode(&bytes),
            chunks: &self.chunks,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, &file)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        let target = dir.join(INDEX_FILE);
        tmp.persist(&target).map_err(|e| e.error)?;

        tracing::info!(
            path = %target.display(),
            entries = self.chunks.len(),
            dimension = self.dimension,
            "vector index saved"
        );
        Ok(())
    }

    /// Load an index previously written by [`VectorIndex::save`].
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `dir` or its index file is missing and `Corrupt`
    /// if `dir` is not a directory or the file fails any consistency check.
    pub fn load(dir: &Path) -> Result<Self, VectorIndexError> {
        match std::fs::metadata(dir) {
            Ok(meta) if !meta.is_dir() => {
                return Err(VectorIndexError::Corrupt {
                    path: dir.to_path_buf(),
                    reason: "not a directory".into(),
                });
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VectorIndexError::NotFound(dir.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        }

        let path = dir.join(INDEX_FILE);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VectorIndexError::NotFound(dir.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        let corrupt = |reason: String| VectorIndexError::Corrupt {
            path: path.clone(),
            reason,
        };

        let file: IndexFile = serde_json::from_slice(&raw).map_err(|e| corrupt(e.to_string()))?;
        if file.format_version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {}",
                file.format_version
            )));
        }
        if file.dimension == 0 || file.entry_count == 0 {
            return Err(corrupt("index has no entries or zero dimension".into()));
        }
        if file.chunks.len() != file.entry_count {
            return Err(corrupt(format!(
                "entry_count is {} but {} chunks are stored",
                file.entry_count,
                file.chunks.len()
            )));
        }

        let bytes = STANDARD
            .decode(file.vectors.as_bytes())
            .map_err(|e| corrupt(format!("vector payload: {e}")))?;
        let expected_len = file
            .entry_count
            .checked_mul(file.dimension)
            .and_then(|n| n.checked_mul(4));
        if expected_len != Some(bytes.len()) {
            return Err(corrupt(format!(
                "vector payload has {} bytes, expected {} x {} floats",
                bytes.len(),
                file.entry_count,
                file.dimension
            )));
        }
        if blake3::hash(&bytes).to_hex().as_str() != file.checksum {
            return Err(corrupt("checksum mismatch".into()));
        }

        let vectors: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        if let Some(pos) = vectors.iter().position(|x| !x.is_finite()) {
            return Err(corrupt(format!(
                "vector {} has a non-finite component",
                pos / file.dimension
            )));
        }
        let index = Self::from_parts(file.dimension, file.embedding_model, file.chunks, vectors);
        tracing::debug!(
            path = %path.display(),
            entries = index.len(),
            dimension = index.dimension,
            "vector index loaded"
        );
        Ok(index)
    }
}
