use crate::application::{
    AlertNarrativeUseCase, AppUpdateUseCase, CustomerSummaryUseCase, RunCaseUseCase,
    ScreenshotPdfUseCase, TransactionReportUseCase,
};
use crate::domain::case::{CaseContext, CaseDraft, TabSelection};
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::config::{ConfigService, Settings};
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::playwright::PagePrinter;
use crate::infrastructure::releases::ReleaseSource;
use crate::infrastructure::templates::TemplateStore;
use crate::interfaces::http::LogEntry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// What the analyst has entered so far: case prefix, starred tabs and
/// per-tab inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSession {
    pub case: CaseContext,
    pub selection: TabSelection,
    pub draft: CaseDraft,
}

pub struct AppState {
    pub settings: Settings,
    pub config_service: ConfigService,
    pub session: Mutex<CaseSession>,
    pub templates: Arc<TemplateStore>,
    pub screenshot_use_case: Arc<ScreenshotPdfUseCase>,
    pub summary_use_case: Arc<CustomerSummaryUseCase>,
    pub alert_use_case: Arc<AlertNarrativeUseCase>,
    pub transaction_use_case: Arc<TransactionReportUseCase>,
    pub update_use_case: AppUpdateUseCase,
    pub run_case_use_case: RunCaseUseCase,
    pub logs: Arc<Mutex<Vec<LogEntry>>>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        app_data_dir: &Path,
        printer: Arc<dyn PagePrinter + Send + Sync>,
        llm_client: Arc<dyn LLMClient + Send + Sync>,
        release_source: Arc<dyn ReleaseSource + Send + Sync>,
        logs: Arc<Mutex<Vec<LogEntry>>>,
    ) -> Result<Self> {
        let templates = Arc::new(TemplateStore::open(settings.templates_dir())?);

        let screenshot_use_case = Arc::new(ScreenshotPdfUseCase::new(printer));
        let summary_use_case = Arc::new(CustomerSummaryUseCase::new(llm_client));
        let alert_use_case = Arc::new(AlertNarrativeUseCase::new(templates.clone()));
        let transaction_use_case = Arc::new(TransactionReportUseCase::new());
        let run_case_use_case = RunCaseUseCase::new(
            screenshot_use_case.clone(),
            summary_use_case.clone(),
            alert_use_case.clone(),
            transaction_use_case.clone(),
        );
        let update_use_case = AppUpdateUseCase::new(
            release_source,
            settings.updates.current_version.clone(),
            app_data_dir.join("updates"),
        );

        let mut case = CaseContext::new("", settings.output_root());
        case.set_prefix(&settings.case.prefix)?;
        let session = CaseSession {
            case,
            selection: TabSelection::new(),
            draft: CaseDraft::default(),
        };

        Ok(Self {
            settings,
            config_service: ConfigService::new(),
            session: Mutex::new(session),
            templates,
            screenshot_use_case,
            summary_use_case,
            alert_use_case,
            transaction_use_case,
            update_use_case,
            run_case_use_case,
            logs,
        })
    }

    pub fn chat_config(&self) -> LLMConfig {
        self.config_service.resolve_chat_config(&self.settings)
    }

    pub fn session(&self) -> Result<MutexGuard<'_, CaseSession>> {
        self.session
            .lock()
            .map_err(|_| AppError::Internal("Case session lock poisoned".to_string()))
    }

    /// Copy of the session, so no lock is held across an await.
    pub fn session_snapshot(&self) -> Result<CaseSession> {
        Ok(self.session()?.clone())
    }

    pub fn case(&self) -> Result<CaseContext> {
        Ok(self.session()?.case.clone())
    }
}
