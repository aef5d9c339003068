use std::path::Path;
use std::pin::Pin;

use super::super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader};
use super::{checked_path, into_pages};

/// Extracts text page by page with `pdf-extract`.
pub struct PdfLoader {
    pub max_file_size: u64,
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for PdfLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let path = checked_path(&path, max_size).await?;
            let source = path.display().to_string();

            let path_buf = path.clone();
            let reason_source = source.clone();
            // The extractor panics on some malformed files; a panicked blocking
            // task surfaces as a JoinError and is reported like any parse failure.
            let pages = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_by_pages(&path_buf).map_err(|e| DocumentError::Pdf {
                    path: reason_source,
                    reason: e.to_string(),
                })
            })
            .await
            .map_err(|e| DocumentError::Pdf {
                path: source.clone(),
                reason: format!("extractor aborted: {e}"),
            })??;

            Ok(into_pages(pages, &source, "application/pdf"))
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["pdf"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pdf_supported() {
        assert_eq!(PdfLoader::default().supported_extensions(), &["pdf"]);
    }

    #[tokio::test]
    async fn corrupt_pdf_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.pdf");
        std::fs::write(&file, b"%PDF-1.4 this is not really a pdf").unwrap();

        let result = PdfLoader::default().load(&file).await;
        assert!(matches!(result, Err(DocumentError::Pdf { .. })), "{result:?}");
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let result = PdfLoader::default()
            .load(Path::new("/nonexistent/report.pdf"))
            .await;
        assert!(matches!(result, Err(DocumentError::Io(_))));
    }

    #[tokio::test]
    async fn oversize_file_rejected_before_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.pdf");
        std::fs::write(&file, b"xx").unwrap();

        let loader = PdfLoader { max_file_size: 1 };
        let result = loader.load(&file).await;
        assert!(matches!(result, Err(DocumentError::FileTooLarge(2))));
    }
}
