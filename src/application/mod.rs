pub mod use_cases;

pub use use_cases::alert_narrative::AlertNarrativeUseCase;
pub use use_cases::app_update::AppUpdateUseCase;
pub use use_cases::customer_summary::CustomerSummaryUseCase;
pub use use_cases::run_case::RunCaseUseCase;
pub use use_cases::screenshot_pdf::ScreenshotPdfUseCase;
pub use use_cases::transaction_report::TransactionReportUseCase;
