use crate::domain::case::CaseContext;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::documents::write_docx;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::response::clean_llm_response;
use crate::infrastructure::storage::ensure_investigation_dir;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct CustomerSummary {
    pub customer_id: String,
    pub summary: String,
    pub path: PathBuf,
}

pub fn summary_prompt(customer_id: &str) -> String {
    format!(
        "Please provide a summary of customer ID {}. Tailor your response for an analyst on the Investigation Operations team.",
        customer_id
    )
}

pub struct CustomerSummaryUseCase {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
}

impl CustomerSummaryUseCase {
    pub fn new(llm_client: Arc<dyn LLMClient + Send + Sync>) -> Self {
        Self { llm_client }
    }

    pub async fn execute(
        &self,
        config: &LLMConfig,
        case: &CaseContext,
        customer_id: &str,
    ) -> Result<CustomerSummary> {
        let customer_id = customer_id.trim();
        if customer_id.is_empty() {
            return Err(AppError::ValidationError(
                "Please enter a Customer ID.".to_string(),
            ));
        }
        if customer_id.contains(['/', '\\']) {
            return Err(AppError::ValidationError(
                "Customer ID cannot contain path separators.".to_string(),
            ));
        }

        info!(customer_id, model = %config.model, "Requesting customer summary");
        let raw = self
            .llm_client
            .generate(config, "", &summary_prompt(customer_id))
            .await?;
        let summary = clean_llm_response(&raw);

        ensure_investigation_dir(case)?;
        let path = case.output_path(&format!("{}_Summary.docx", customer_id));
        let heading = format!("Customer Summary: {}", customer_id);
        write_docx(&path, Some(&heading), &summary)?;

        info!(customer_id, path = %path.display(), "Saved customer summary");
        Ok(CustomerSummary {
            customer_id: customer_id.to_string(),
            summary,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::documents::read_docx_paragraphs;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StubLLM {
        reply: Result<String>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl StubLLM {
        fn replying(reply: Result<String>) -> Self {
            Self {
                reply,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLMClient for StubLLM {
        async fn generate(&self, _config: &LLMConfig, system: &str, user: &str) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            self.reply.clone()
        }
    }

    #[tokio::test]
    async fn test_writes_summary_document() {
        let root = tempfile::tempdir().unwrap();
        let case = CaseContext::new("C9_Roe", root.path());
        let llm = Arc::new(StubLLM::replying(Ok(
            "<think>scratch</think>Customer opened the account in 2021.".to_string(),
        )));
        let use_case = CustomerSummaryUseCase::new(llm.clone());

        let result = use_case
            .execute(&LLMConfig::default(), &case, "  C9 ")
            .await
            .unwrap();

        let calls = llm.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "");
        assert_eq!(
            calls[0].1,
            "Please provide a summary of customer ID C9. Tailor your response for an analyst on the Investigation Operations team."
        );

        assert_eq!(result.summary, "Customer opened the account in 2021.");
        assert_eq!(result.path, root.path().join("C9_Roe").join("C9_Roe_C9_Summary.docx"));
        let text = read_docx_paragraphs(&result.path).unwrap();
        assert_eq!(text, "Customer Summary: C9\nCustomer opened the account in 2021.");
    }

    #[tokio::test]
    async fn test_blank_customer_id_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let case = CaseContext::new("", root.path());
        let llm = Arc::new(StubLLM::replying(Ok("unused".to_string())));
        let use_case = CustomerSummaryUseCase::new(llm.clone());

        let err = use_case
            .execute(&LLMConfig::default(), &case, "   ")
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Please enter a Customer ID.");
        assert!(llm.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_api_errors_propagate_without_output() {
        let root = tempfile::tempdir().unwrap();
        let case = CaseContext::new("", root.path());
        let llm = Arc::new(StubLLM::replying(Err(AppError::LLMError(
            "API error (401 Unauthorized): bad key".to_string(),
        ))));
        let use_case = CustomerSummaryUseCase::new(llm);

        let err = use_case
            .execute(&LLMConfig::default(), &case, "C1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LLMError(_)));
        assert!(!root.path().join("Investigation_File").exists());
    }
}
