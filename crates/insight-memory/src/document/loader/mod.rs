mod pdf;
mod text;

pub use pdf::PdfLoader;
pub use text::TextLoader;

use std::path::{Path, PathBuf};

use super::{Document, DocumentError, DocumentMetadata};

/// Canonicalize `path` and reject it when it exceeds `max_size` bytes.
async fn checked_path(path: &Path, max_size: u64) -> Result<PathBuf, DocumentError> {
    let path = tokio::fs::canonicalize(path).await?;
    let meta = tokio::fs::metadata(&path).await?;
    if meta.len() > max_size {
        return Err(DocumentError::FileTooLarge(meta.len()));
    }
    Ok(path)
}

/// One `Document` per page, numbered from 1, with trimmed text.
fn into_pages<I>(pages: I, source: &str, content_type: &str) -> Vec<Document>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    pages
        .into_iter()
        .enumerate()
        .map(|(i, page)| Document {
            content: page.as_ref().trim().to_owned(),
            metadata: DocumentMetadata {
                source: source.to_owned(),
                content_type: content_type.to_owned(),
                page_number: i + 1,
            },
        })
        .collect()
}
