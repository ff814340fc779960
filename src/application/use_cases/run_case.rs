use crate::application::use_cases::alert_narrative::AlertNarrativeUseCase;
use crate::application::use_cases::customer_summary::CustomerSummaryUseCase;
use crate::application::use_cases::screenshot_pdf::ScreenshotPdfUseCase;
use crate::application::use_cases::transaction_report::TransactionReportUseCase;
use crate::domain::case::{
    CaseContext, CaseDraft, CaseRunReport, Tab, TabRunOutcome, TabRunStatus, TabSelection,
};
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct RunCaseUseCase {
    screenshots: Arc<ScreenshotPdfUseCase>,
    summary: Arc<CustomerSummaryUseCase>,
    alerts: Arc<AlertNarrativeUseCase>,
    transactions: Arc<TransactionReportUseCase>,
}

impl RunCaseUseCase {
    pub fn new(
        screenshots: Arc<ScreenshotPdfUseCase>,
        summary: Arc<CustomerSummaryUseCase>,
        alerts: Arc<AlertNarrativeUseCase>,
        transactions: Arc<TransactionReportUseCase>,
    ) -> Self {
        Self {
            screenshots,
            summary,
            alerts,
            transactions,
        }
    }

    /// Runs every selected tab in tab order. A failing tab is recorded and
    /// the remaining tabs still run.
    pub async fn execute(
        &self,
        chat_config: &LLMConfig,
        case: &CaseContext,
        selection: &TabSelection,
        draft: &CaseDraft,
    ) -> Result<CaseRunReport> {
        if selection.is_empty() {
            return Err(AppError::ValidationError(
                "Please select one or more tabs before using 'Run Case'.".to_string(),
            ));
        }

        let run_id = Uuid::new_v4().to_string();
        info!(run_id = %run_id, prefix = %case.prefix, "Running case");

        let mut outcomes = Vec::new();
        for tab in selection.iter() {
            let outcome = match self.run_tab(tab, chat_config, case, draft).await {
                Ok(outcome) => outcome,
                Err(err) => TabRunOutcome {
                    tab,
                    status: TabRunStatus::Failed,
                    message: err.message().to_string(),
                    outputs: Vec::new(),
                },
            };
            match outcome.status {
                TabRunStatus::Failed => {
                    warn!(run_id = %run_id, tab = %tab, message = %outcome.message, "Tab failed")
                }
                _ => info!(run_id = %run_id, tab = %tab, status = ?outcome.status, "Tab finished"),
            }
            outcomes.push(outcome);
        }

        Ok(CaseRunReport {
            run_id,
            investigation_dir: case.investigation_dir(),
            outcomes,
        })
    }

    async fn run_tab(
        &self,
        tab: Tab,
        chat_config: &LLMConfig,
        case: &CaseContext,
        draft: &CaseDraft,
    ) -> Result<TabRunOutcome> {
        match tab {
            Tab::Screenshots => {
                let report = self.screenshots.capture(case, &draft.urls).await?;
                let total = report.saved.len() + report.failed.len();
                let status = if report.saved.is_empty() {
                    TabRunStatus::Failed
                } else {
                    TabRunStatus::Completed
                };
                let mut message = format!("Saved {} of {} page(s)", report.saved.len(), total);
                for failed in &report.failed {
                    message.push_str(&format!("; {}: {}", failed.url, failed.error));
                }
                Ok(TabRunOutcome {
                    tab,
                    status,
                    message,
                    outputs: report.saved.into_iter().map(|saved| saved.path).collect(),
                })
            }
            Tab::Research => {
                if draft.research_customer_id.trim().is_empty() {
                    return Ok(TabRunOutcome {
                        tab,
                        status: TabRunStatus::Skipped,
                        message: "No Customer ID entered".to_string(),
                        outputs: Vec::new(),
                    });
                }
                let summary = self
                    .summary
                    .execute(chat_config, case, &draft.research_customer_id)
                    .await?;
                Ok(completed(tab, "Customer summary saved", vec![summary.path]))
            }
            Tab::AlertTemplates => {
                let narrative = self.alerts.execute(
                    case,
                    draft.alert_template.as_deref(),
                    &draft.alert_fields,
                )?;
                Ok(completed(tab, "Narrative saved", vec![narrative.path]))
            }
            Tab::TransactionCsv => {
                // Workbook building is synchronous file I/O.
                let transactions = self.transactions.clone();
                let case = case.clone();
                let input = draft.transactions_file.clone();
                let export = tokio::task::spawn_blocking(move || {
                    transactions.execute(&case, input.as_deref())
                })
                .await
                .map_err(|e| AppError::Internal(format!("Worker failed: {}", e)))??;
                Ok(completed(tab, "Transaction summary saved", vec![export.path]))
            }
        }
    }
}

fn completed(tab: Tab, message: &str, outputs: Vec<std::path::PathBuf>) -> TabRunOutcome {
    TabRunOutcome {
        tab,
        status: TabRunStatus::Completed,
        message: message.to_string(),
        outputs,
    }
}
