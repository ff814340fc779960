use crate::domain::capture::{
    capture_file_stem, parse_url_lines, CaptureReport, FailedCapture, PdfPageSetup, SavedCapture,
};
use crate::domain::case::CaseContext;
use crate::domain::error::{AppError, Result};
use crate::infrastructure::documents::pdf::page_count;
use crate::infrastructure::playwright::PagePrinter;
use crate::infrastructure::storage::ensure_investigation_dir;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ScreenshotPdfUseCase {
    printer: Arc<dyn PagePrinter + Send + Sync>,
    page_setup: PdfPageSetup,
}

impl ScreenshotPdfUseCase {
    pub fn new(printer: Arc<dyn PagePrinter + Send + Sync>) -> Self {
        Self {
            printer,
            page_setup: PdfPageSetup::default(),
        }
    }

    /// Prints every URL in the text box (one per line) to its own PDF.
    pub async fn execute(&self, case: &CaseContext, urls_text: &str) -> Result<CaptureReport> {
        let urls = parse_url_lines(urls_text);
        self.capture(case, &urls).await
    }

    /// Per-URL failures are collected in the report; only an empty URL
    /// list or an unusable printer fails the whole call.
    pub async fn capture(&self, case: &CaseContext, urls: &[String]) -> Result<CaptureReport> {
        let urls: Vec<&str> = urls
            .iter()
            .map(|url| url.trim())
            .filter(|url| !url.is_empty())
            .collect();
        if urls.is_empty() {
            return Err(AppError::ValidationError(
                "Please enter at least one URL.".to_string(),
            ));
        }

        self.printer.preflight().await?;
        let output_dir = ensure_investigation_dir(case)?;

        let mut report = CaptureReport {
            output_dir,
            ..Default::default()
        };

        for url in urls {
            match self.capture_one(case, url).await {
                Ok(saved) => {
                    info!(
                        url,
                        final_url = %saved.final_url,
                        title = %saved.title,
                        path = %saved.path.display(),
                        pages = saved.page_count,
                        "Saved page PDF"
                    );
                    report.saved.push(saved);
                }
                Err(err) => {
                    warn!(url, error = %err, "Failed to capture page");
                    report.failed.push(FailedCapture {
                        url: url.to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            saved = report.saved.len(),
            failed = report.failed.len(),
            "Screenshot batch finished"
        );
        Ok(report)
    }

    async fn capture_one(&self, case: &CaseContext, url: &str) -> Result<SavedCapture> {
        url::Url::parse(url)
            .map_err(|e| AppError::ValidationError(format!("Invalid URL '{}': {}", url, e)))?;
        let printed = self.printer.print_pdf(url, &self.page_setup).await?;
        let pages = page_count(&printed.pdf)?;

        let path: PathBuf = case.output_path(&format!("{}.pdf", capture_file_stem(url)));
        tokio::fs::write(&path, &printed.pdf).await.map_err(|e| {
            AppError::IoError(format!("Failed to write {}: {}", path.display(), e))
        })?;

        Ok(SavedCapture {
            url: url.to_string(),
            final_url: printed.final_url,
            title: printed.title,
            path,
            page_count: pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::documents::pdf::one_page_pdf;
    use crate::infrastructure::playwright::PrintedPage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubPrinter {
        printed: Mutex<Vec<String>>,
        offline: bool,
    }

    #[async_trait]
    impl PagePrinter for StubPrinter {
        async fn preflight(&self) -> Result<()> {
            if self.offline {
                return Err(AppError::BrowserError("Node.js not found".to_string()));
            }
            Ok(())
        }

        async fn print_pdf(&self, url: &str, _setup: &PdfPageSetup) -> Result<PrintedPage> {
            self.printed.lock().unwrap().push(url.to_string());
            if url.contains("timeout") {
                return Err(AppError::BrowserError("Navigation timed out".to_string()));
            }
            let pdf = if url.contains("garbage") {
                b"<html></html>".to_vec()
            } else {
                one_page_pdf()
            };
            Ok(PrintedPage {
                final_url: format!("{}/", url.trim_end_matches('/')),
                title: "Example Page".to_string(),
                pdf,
            })
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_batch() {
        let root = tempfile::tempdir().unwrap();
        let case = CaseContext::new("C1_Doe", root.path());
        let printer = Arc::new(StubPrinter::default());
        let use_case = ScreenshotPdfUseCase::new(printer.clone());

        let report = use_case
            .execute(
                &case,
                "https://example.com/a\n\n  https://timeout.example \nhttps://garbage.example/x\nhttps://news.example.org/story",
            )
            .await
            .unwrap();

        assert_eq!(printer.printed.lock().unwrap().len(), 4);
        assert_eq!(report.saved.len(), 2);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].url, "https://timeout.example");

        let expected = root.path().join("C1_Doe").join("C1_Doe_example.com.pdf");
        assert_eq!(report.saved[0].path, expected);
        assert!(expected.is_file());
        assert_eq!(report.saved[0].page_count, 1);
        assert_eq!(report.saved[0].final_url, "https://example.com/a/");
        assert_eq!(report.saved[0].title, "Example Page");
        assert!(!root.path().join("C1_Doe").join("C1_Doe_garbage.example.pdf").exists());
    }

    #[tokio::test]
    async fn test_requires_at_least_one_url() {
        let root = tempfile::tempdir().unwrap();
        let case = CaseContext::new("", root.path());
        let use_case = ScreenshotPdfUseCase::new(Arc::new(StubPrinter::default()));

        let err = use_case.execute(&case, " \n\t\n").await.unwrap_err();
        assert_eq!(err.message(), "Please enter at least one URL.");
        assert!(!root.path().join("Investigation_File").exists());
    }

    #[tokio::test]
    async fn test_unusable_printer_fails_the_batch() {
        let root = tempfile::tempdir().unwrap();
        let case = CaseContext::new("", root.path());
        let printer = StubPrinter {
            offline: true,
            ..Default::default()
        };
        let use_case = ScreenshotPdfUseCase::new(Arc::new(printer));

        let err = use_case.execute(&case, "https://example.com").await.unwrap_err();
        assert!(matches!(err, AppError::BrowserError(_)));
    }

    #[tokio::test]
    async fn test_unparseable_url_is_reported_without_printing() {
        let root = tempfile::tempdir().unwrap();
        let case = CaseContext::new("", root.path());
        let printer = Arc::new(StubPrinter::default());
        let use_case = ScreenshotPdfUseCase::new(printer.clone());

        let report = use_case
            .execute(&case, "example.com/about
https://example.com")
            .await
            .unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].url, "example.com/about");
        assert_eq!(report.saved.len(), 1);
        assert_eq!(printer.printed.lock().unwrap().len(), 1);
    }
}
