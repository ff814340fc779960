use crate::domain::alert::AlertFields;
use crate::domain::case::CaseContext;
use crate::domain::error::{AppError, Result};
use crate::infrastructure::documents::write_docx;
use crate::infrastructure::storage::ensure_investigation_dir;
use crate::infrastructure::templates::TemplateStore;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

#[derive(Debug, Clone, Serialize)]
pub struct Narrative {
    pub template: String,
    pub content: String,
    pub path: PathBuf,
}

pub struct AlertNarrativeUseCase {
    store: Arc<TemplateStore>,
}

impl AlertNarrativeUseCase {
    pub fn new(store: Arc<TemplateStore>) -> Self {
        Self { store }
    }

    /// Fills the chosen template with the analyst's fields and writes the
    /// narrative document.
    pub fn execute(
        &self,
        case: &CaseContext,
        template: Option<&str>,
        fields: &AlertFields,
    ) -> Result<Narrative> {
        let template = template
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::ValidationError("Please select a template.".to_string()))?;

        let document = self.store.load(template)?;

        let fields = fields.trimmed();
        fields.validate().map_err(|_| {
            AppError::ValidationError("Please complete all fields.".to_string())
        })?;

        let content = fields.fill(&document.content);

        ensure_investigation_dir(case)?;
        let path = case.output_path("Narrative.docx");
        write_docx(&path, None, &content)?;

        info!(template = %document.full_name, path = %path.display(), "Saved narrative");
        Ok(Narrative {
            template: document.display_name,
            content,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::documents::read_docx_paragraphs;

    fn fields() -> AlertFields {
        AlertFields {
            customer_id: " 4411 ".to_string(),
            customer_name: "Acme LLC".to_string(),
            start_date: "01/01/2024".to_string(),
            end_date: "02/01/2024".to_string(),
            account_purpose: "Payroll".to_string(),
        }
    }

    fn setup() -> (tempfile::TempDir, AlertNarrativeUseCase, CaseContext) {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::open(dir.path().join("templates")).unwrap();
        store
            .save(
                "Structuring",
                "{customer_name} ({customer_id}) between {start_date} and {end_date}; \
                 purpose {account_purpose}. Ref {customer_id}. {case_ref}",
                None,
            )
            .unwrap();
        let case = CaseContext::new("4411_Acme", dir.path().join("out"));
        (dir, AlertNarrativeUseCase::new(Arc::new(store)), case)
    }

    #[test]
    fn test_generates_filled_narrative() {
        let (_dir, use_case, case) = setup();
        let narrative = use_case
            .execute(&case, Some("Structuring"), &fields())
            .unwrap();

        let expected = "Acme LLC (4411) between 01/01/2024 and 02/01/2024; \
                        purpose Payroll. Ref 4411. {case_ref}";
        assert_eq!(narrative.content, expected);
        assert!(narrative.path.ends_with("4411_Acme/4411_Acme_Narrative.docx"));
        assert_eq!(read_docx_paragraphs(&narrative.path).unwrap(), expected);
    }

    #[test]
    fn test_error_messages() {
        let (_dir, use_case, case) = setup();

        let err = use_case.execute(&case, None, &fields()).unwrap_err();
        assert_eq!(err.message(), "Please select a template.");

        let err = use_case.execute(&case, Some("Missing"), &fields()).unwrap_err();
        assert_eq!(err.message(), "Selected template not found.");

        let mut incomplete = fields();
        incomplete.account_purpose = "  ".to_string();
        let err = use_case
            .execute(&case, Some("Structuring"), &incomplete)
            .unwrap_err();
        assert_eq!(err.message(), "Please complete all fields.");
        assert!(!case.investigation_dir().exists());
    }
}
