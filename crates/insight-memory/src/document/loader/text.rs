use std::path::Path;
use std::pin::Pin;

use super::super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader};
use super::{checked_path, into_pages};

/// Pre-extracted text; form feeds (`\x0c`) separate pages.
pub struct TextLoader {
    pub max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for TextLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let path = checked_path(&path, max_size).await?;
            let content = tokio::fs::read_to_string(&path).await?;
            let source = path.display().to_string();
            Ok(into_pages(content.split('\x0c'), &source, "text/plain"))
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt"]
    }
}
