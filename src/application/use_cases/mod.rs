pub mod alert_narrative;
pub mod app_update;
pub mod customer_summary;
pub mod run_case;
pub mod screenshot_pdf;
pub mod transaction_report;
