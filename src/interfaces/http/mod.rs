use crate::domain::alert::{preview, AlertFields};
use crate::domain::case::{CaseDraft, Tab};
use crate::domain::error::AppError;
use crate::interfaces::state::AppState;
use actix_cors::Cors;
use actix_web::{
    delete, dev::Server, get, post, put, web, App, HttpResponse, HttpServer, Responder,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

const LOG_CAPACITY: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

pub struct HttpState {
    pub app_state: Arc<AppState>,
    pub logs: Arc<Mutex<Vec<LogEntry>>>,
}

#[derive(Deserialize)]
pub struct CaseRequest {
    pub prefix: String,
    #[serde(default)]
    pub output_root: Option<PathBuf>,
}

#[derive(Serialize)]
pub struct CaseResponse {
    pub prefix: String,
    pub file_prefix: String,
    pub output_root: PathBuf,
    pub investigation_dir: PathBuf,
}

#[derive(Serialize)]
pub struct TabView {
    pub tab: Tab,
    pub index: usize,
    pub label: String,
    pub selected: bool,
}

#[derive(Deserialize)]
pub struct ScreenshotRequest {
    pub urls: String,
}

#[derive(Deserialize)]
pub struct SummaryRequest {
    pub customer_id: String,
}

#[derive(Deserialize)]
pub struct SaveTemplateRequest {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub editing: Option<String>,
}

#[derive(Deserialize)]
pub struct PreviewRequest {
    pub content: String,
}

#[derive(Deserialize)]
pub struct AlertRequest {
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub fields: AlertFields,
}

#[derive(Deserialize)]
pub struct TransactionsRequest {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Serialize)]
pub struct AboutResponse {
    pub name: &'static str,
    pub version: String,
    pub description: &'static str,
}

/// Maps a use-case error to a response; validation messages are returned
/// verbatim.
fn error_response(data: &HttpState, context: &str, err: &AppError) -> HttpResponse {
    let level = match err {
        AppError::ValidationError(_) => "WARN",
        _ => "ERROR",
    };
    add_log(&data.logs, level, "HttpApi", &format!("{}: {}", context, err));

    match err {
        AppError::ValidationError(msg) => HttpResponse::BadRequest().body(msg.clone()),
        AppError::NotFound(msg) => HttpResponse::NotFound().body(msg.clone()),
        other => HttpResponse::InternalServerError().body(other.to_string()),
    }
}

#[get("/case")]
async fn get_case(data: web::Data<HttpState>) -> impl Responder {
    match data.app_state.case() {
        Ok(case) => HttpResponse::Ok().json(CaseResponse {
            prefix: case.prefix.clone(),
            file_prefix: case.file_prefix(),
            output_root: case.output_root().to_path_buf(),
            investigation_dir: case.investigation_dir(),
        }),
        Err(e) => error_response(&data, "Reading case failed", &e),
    }
}

#[put("/case")]
async fn update_case(data: web::Data<HttpState>, req: web::Json<CaseRequest>) -> impl Responder {
    let req = req.into_inner();
    let result = data.app_state.session().and_then(|mut session| {
        session.case.set_prefix(&req.prefix)?;
        if let Some(root) = req.output_root {
            session.case.output_root = root;
        }
        Ok(session.case.clone())
    });

    match result {
        Ok(case) => {
            add_log(
                &data.logs,
                "INFO",
                "HttpApi",
                &format!("Case prefix set to '{}'", case.prefix),
            );
            HttpResponse::Ok().json(CaseResponse {
                prefix: case.prefix.clone(),
                file_prefix: case.file_prefix(),
                output_root: case.output_root().to_path_buf(),
                investigation_dir: case.investigation_dir(),
            })
        }
        Err(e) => error_response(&data, "Updating case failed", &e),
    }
}

#[get("/tabs")]
async fn list_tabs(data: web::Data<HttpState>) -> impl Responder {
    match data.app_state.session() {
        Ok(session) => {
            let tabs: Vec<TabView> = Tab::ALL
                .iter()
                .map(|tab| TabView {
                    tab: *tab,
                    index: tab.index(),
                    label: session.selection.display_label(*tab),
                    selected: session.selection.is_selected(*tab),
                })
                .collect();
            HttpResponse::Ok().json(tabs)
        }
        Err(e) => error_response(&data, "Listing tabs failed", &e),
    }
}

#[post("/tabs/{tab}/toggle")]
async fn toggle_tab(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    let tab: Tab = match path.parse() {
        Ok(tab) => tab,
        Err(e) => return error_response(&data, "Toggling tab failed", &e),
    };

    match data.app_state.session() {
        Ok(mut session) => {
            let selected = session.selection.toggle(tab);
            HttpResponse::Ok().json(TabView {
                tab,
                index: tab.index(),
                label: session.selection.display_label(tab),
                selected,
            })
        }
        Err(e) => error_response(&data, "Toggling tab failed", &e),
    }
}

#[put("/case/draft")]
async fn update_draft(data: web::Data<HttpState>, req: web::Json<CaseDraft>) -> impl Responder {
    match data.app_state.session() {
        Ok(mut session) => {
            session.draft = req.into_inner();
            HttpResponse::Ok().json(&session.draft)
        }
        Err(e) => error_response(&data, "Updating draft failed", &e),
    }
}

#[post("/case/run")]
async fn run_case(data: web::Data<HttpState>) -> impl Responder {
    let session = match data.app_state.session_snapshot() {
        Ok(session) => session,
        Err(e) => return error_response(&data, "Run Case failed", &e),
    };
    add_log(
        &data.logs,
        "INFO",
        "HttpApi",
        &format!("Running case '{}'", session.case.prefix),
    );

    let chat_config = data.app_state.chat_config();
    match data
        .app_state
        .run_case_use_case
        .execute(&chat_config, &session.case, &session.selection, &session.draft)
        .await
    {
        Ok(report) => {
            for outcome in report.failures() {
                add_log(
                    &data.logs,
                    "ERROR",
                    "RunCase",
                    &format!("{}: {}", outcome.tab, outcome.message),
                );
            }
            HttpResponse::Ok().json(report)
        }
        Err(e) => error_response(&data, "Run Case failed", &e),
    }
}

#[post("/screenshots")]
async fn screenshots(
    data: web::Data<HttpState>,
    req: web::Json<ScreenshotRequest>,
) -> impl Responder {
    let urls = crate::domain::capture::parse_url_lines(&req.urls);
    let case = match data.app_state.session().map(|mut session| {
        session.draft.urls = urls.clone();
        session.case.clone()
    }) {
        Ok(case) => case,
        Err(e) => return error_response(&data, "Screenshots failed", &e),
    };

    add_log(
        &data.logs,
        "INFO",
        "HttpApi",
        &format!("Capturing {} page(s)", urls.len()),
    );
    match data.app_state.screenshot_use_case.capture(&case, &urls).await {
        Ok(report) => {
            for failed in &report.failed {
                add_log(
                    &data.logs,
                    "ERROR",
                    "Screenshots",
                    &format!("{}: {}", failed.url, failed.error),
                );
            }
            HttpResponse::Ok().json(report)
        }
        Err(e) => error_response(&data, "Screenshots failed", &e),
    }
}

#[post("/summary")]
async fn summary(data: web::Data<HttpState>, req: web::Json<SummaryRequest>) -> impl Responder {
    let case = match data.app_state.session().map(|mut session| {
        session.draft.research_customer_id = req.customer_id.trim().to_string();
        session.case.clone()
    }) {
        Ok(case) => case,
        Err(e) => return error_response(&data, "Summary failed", &e),
    };

    let config = data.app_state.chat_config();
    add_log(
        &data.logs,
        "INFO",
        "HttpApi",
        &format!("Summarizing customer (model={} base_url={})", config.model, config.base_url),
    );
    match data
        .app_state
        .summary_use_case
        .execute(&config, &case, &req.customer_id)
        .await
    {
        Ok(summary) => HttpResponse::Ok().json(summary),
        Err(e) => error_response(&data, "Summary failed", &e),
    }
}

#[get("/templates")]
async fn list_templates(data: web::Data<HttpState>) -> impl Responder {
    match data.app_state.templates.list() {
        Ok(entries) => HttpResponse::Ok().json(entries),
        Err(e) => error_response(&data, "Listing templates failed", &e),
    }
}

#[post("/templates")]
async fn save_template(
    data: web::Data<HttpState>,
    req: web::Json<SaveTemplateRequest>,
) -> impl Responder {
    match data
        .app_state
        .templates
        .save(&req.name, &req.content, req.editing.as_deref())
    {
        Ok(document) => {
            add_log(
                &data.logs,
                "INFO",
                "Templates",
                &format!("Saved template '{}'", document.display_name),
            );
            HttpResponse::Ok().json(document)
        }
        Err(e) => error_response(&data, "Saving template failed", &e),
    }
}

#[post("/templates/preview")]
async fn preview_template(req: web::Json<PreviewRequest>) -> impl Responder {
    HttpResponse::Ok().json(preview(&req.content))
}

#[get("/templates/{name}")]
async fn get_template(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    match data.app_state.templates.load(&path) {
        Ok(document) => HttpResponse::Ok().json(document),
        Err(e) => error_response(&data, "Loading template failed", &e),
    }
}

#[delete("/templates/{name}")]
async fn delete_template(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    match data.app_state.templates.delete(&path) {
        Ok(entry) => {
            add_log(
                &data.logs,
                "INFO",
                "Templates",
                &format!("Deleted template '{}'", entry.display_name),
            );
            HttpResponse::Ok().json(entry)
        }
        Err(e) => error_response(&data, "Deleting template failed", &e),
    }
}

#[post("/alerts")]
async fn generate_alert(data: web::Data<HttpState>, req: web::Json<AlertRequest>) -> impl Responder {
    let req = req.into_inner();
    let case = match data.app_state.session().map(|mut session| {
        session.draft.alert_template = req.template.clone();
        session.draft.alert_fields = req.fields.clone();
        session.case.clone()
    }) {
        Ok(case) => case,
        Err(e) => return error_response(&data, "Alert generation failed", &e),
    };

    match data
        .app_state
        .alert_use_case
        .execute(&case, req.template.as_deref(), &req.fields)
    {
        Ok(narrative) => HttpResponse::Ok().json(narrative),
        Err(e) => error_response(&data, "Alert generation failed", &e),
    }
}

#[post("/transactions")]
async fn transactions(
    data: web::Data<HttpState>,
    req: web::Json<TransactionsRequest>,
) -> impl Responder {
    let input = req.into_inner().path;
    let case = match data.app_state.session().map(|mut session| {
        session.draft.transactions_file = input.clone();
        session.case.clone()
    }) {
        Ok(case) => case,
        Err(e) => return error_response(&data, "Transaction summary failed", &e),
    };

    let use_case = data.app_state.transaction_use_case.clone();
    let result = web::block(move || use_case.execute(&case, input.as_deref()))
        .await
        .unwrap_or_else(|e| Err(AppError::Internal(format!("Worker failed: {}", e))));

    match result {
        Ok(export) => HttpResponse::Ok().json(export),
        Err(e) => error_response(&data, "Transaction summary failed", &e),
    }
}

#[get("/updates")]
async fn check_updates(data: web::Data<HttpState>) -> impl Responder {
    match data.app_state.update_use_case.check().await {
        Ok(check) => HttpResponse::Ok().json(check),
        Err(e) => error_response(&data, "Update check failed", &e),
    }
}

#[get("/about")]
async fn about(data: web::Data<HttpState>) -> impl Responder {
    HttpResponse::Ok().json(AboutResponse {
        name: "Trace",
        version: data.app_state.update_use_case.current_version().to_string(),
        description: env!("CARGO_PKG_DESCRIPTION"),
    })
}

#[get("/logs")]
async fn get_logs(data: web::Data<HttpState>) -> impl Responder {
    let logs = data
        .logs
        .lock()
        .map(|logs| logs.clone())
        .unwrap_or_default();
    HttpResponse::Ok().json(logs)
}

pub fn add_log_entry(
    logs: &Mutex<Vec<LogEntry>>,
    level: &str,
    source: &str,
    message: &str,
) -> LogEntry {
    let entry = LogEntry {
        time: Local::now().format("%H:%M:%S").to_string(),
        level: level.to_string(),
        source: source.to_string(),
        message: message.to_string(),
    };
    if let Ok(mut logs) = logs.lock() {
        logs.push(entry.clone());
        if logs.len() > LOG_CAPACITY {
            logs.remove(0);
        }
    }
    entry
}

pub fn add_log(logs: &Mutex<Vec<LogEntry>>, level: &str, source: &str, message: &str) {
    add_log_entry(logs, level, source, message);
}

/// Registers every `/api` route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(get_case)
            .service(update_case)
            .service(list_tabs)
            .service(toggle_tab)
            .service(update_draft)
            .service(run_case)
            .service(screenshots)
            .service(summary)
            .service(list_templates)
            .service(save_template)
            .service(preview_template)
            .service(get_template)
            .service(delete_template)
            .service(generate_alert)
            .service(transactions)
            .service(check_updates)
            .service(about)
            .service(get_logs),
    );
}

pub fn start_server(app_state: Arc<AppState>) -> std::io::Result<Server> {
    let host = app_state.settings.http.host.clone();
    let port = app_state.settings.http.port;
    let logs = app_state.logs.clone();
    let state = web::Data::new(HttpState { app_state, logs });

    let server = HttpServer::new(move || {
        let cors = Cors::permissive(); // Allow all origins for local tool

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((host.as_str(), port))?
    .run();

    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capture::PdfPageSetup;
    use crate::domain::error::Result;
    use crate::domain::llm_config::LLMConfig;
    use crate::domain::release::ReleaseInfo;
    use crate::infrastructure::config::Settings;
    use crate::infrastructure::documents::pdf::one_page_pdf;
    use crate::infrastructure::llm_clients::LLMClient;
    use crate::infrastructure::playwright::{PagePrinter, PrintedPage};
    use crate::infrastructure::releases::ReleaseSource;
    use actix_web::{http::StatusCode, test};
    use async_trait::async_trait;
    use std::path::Path;

    struct StubPrinter;

    #[async_trait]
    impl PagePrinter for StubPrinter {
        async fn preflight(&self) -> Result<()> {
            Ok(())
        }

        async fn print_pdf(&self, url: &str, _setup: &PdfPageSetup) -> Result<PrintedPage> {
            Ok(PrintedPage {
                final_url: url.to_string(),
                title: String::new(),
                pdf: one_page_pdf(),
            })
        }
    }

    struct StubLLM;

    #[async_trait]
    impl LLMClient for StubLLM {
        async fn generate(&self, _config: &LLMConfig, _system: &str, _user: &str) -> Result<String> {
            Ok("A long-standing retail customer.".to_string())
        }
    }

    struct StubReleases;

    #[async_trait]
    impl ReleaseSource for StubReleases {
        async fn latest_release(&self) -> Result<ReleaseInfo> {
            Ok(ReleaseInfo {
                tag_name: "v9.0.0".to_string(),
                body: Some("Notes".to_string()),
                assets: Vec::new(),
            })
        }

        async fn fetch_text(&self, _url: &str) -> Result<String> {
            Ok(String::new())
        }

        async fn download_to(&self, _url: &str, _dest: &Path) -> Result<u64> {
            Ok(0)
        }
    }

    fn http_state(dir: &Path) -> web::Data<HttpState> {
        let mut settings = Settings::default();
        settings.case.output_root = Some(dir.join("cases"));
        settings.templates.dir = Some(dir.join("templates"));
        settings.chat.api_key = Some("test-key".to_string());
        let logs = Arc::new(Mutex::new(Vec::new()));
        let app_state = AppState::new(
            settings,
            &dir.join("app"),
            Arc::new(StubPrinter),
            Arc::new(StubLLM),
            Arc::new(StubReleases),
            logs.clone(),
        )
        .unwrap();
        web::Data::new(HttpState {
            app_state: Arc::new(app_state),
            logs,
        })
    }

    #[actix_web::test]
    async fn test_case_prefix_and_tab_toggle() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(http_state(dir.path()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/api/case")
            .set_json(serde_json::json!({ "prefix": " 123_Jane " }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["prefix"], "123_Jane");
        assert_eq!(body["file_prefix"], "123_Jane_");

        let req = test::TestRequest::put()
            .uri("/api/case")
            .set_json(serde_json::json!({ "prefix": "../../etc" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let req = test::TestRequest::get().uri("/api/case").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["prefix"], "123_Jane");

        let req = test::TestRequest::post()
            .uri("/api/tabs/research/toggle")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["selected"], true);
        assert_eq!(body["label"], "★ 2) Research");

        let req = test::TestRequest::post()
            .uri("/api/tabs/settings/toggle")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_validation_errors_are_bad_requests() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(http_state(dir.path()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/case/run")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = test::read_body(resp).await;
        assert_eq!(
            body.as_ref(),
            "Please select one or more tabs before using 'Run Case'.".as_bytes()
        );

        let req = test::TestRequest::post()
            .uri("/api/summary")
            .set_json(serde_json::json!({ "customer_id": " " }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_template_crud_and_alert() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(http_state(dir.path()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/templates")
            .set_json(serde_json::json!({
                "name": "Structuring",
                "content": "{customer_name} ({customer_id})"
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["full_name"], "template_01_Structuring");

        let req = test::TestRequest::get().uri("/api/templates").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["display_name"], "Structuring");

        let req = test::TestRequest::post()
            .uri("/api/alerts")
            .set_json(serde_json::json!({
                "template": "Structuring",
                "fields": {
                    "customer_id": "42",
                    "customer_name": "Jane",
                    "start_date": "1/1/2024",
                    "end_date": "1/31/2024",
                    "account_purpose": "Savings"
                }
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["content"], "Jane (42)");

        let req = test::TestRequest::delete()
            .uri("/api/templates/Structuring")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let req = test::TestRequest::get()
            .uri("/api/templates/Structuring")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_screenshots_then_run_case_replays_draft() {
        let dir = tempfile::tempdir().unwrap();
        let state = http_state(dir.path());
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/screenshots")
            .set_json(serde_json::json!({ "urls": "https://example.com/a\n\n" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["saved"].as_array().unwrap().len(), 1);

        let req = test::TestRequest::post()
            .uri("/api/tabs/1/toggle")
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::post().uri("/api/case/run").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["outcomes"][0]["tab"], "screenshots");
        assert_eq!(body["outcomes"][0]["status"], "completed");

        let logs = state.logs.lock().unwrap();
        assert!(logs.iter().any(|entry| entry.message.contains("Capturing 1 page(s)")));
    }

    #[actix_web::test]
    async fn test_updates_and_about() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(http_state(dir.path()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/updates").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "available");
        assert_eq!(body["version"], "v9.0.0");

        let req = test::TestRequest::get().uri("/api/about").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["name"], "Trace");
    }

    #[actix_web::test]
    async fn test_log_ring_is_bounded() {
        let logs = Mutex::new(Vec::new());
        for i in 0..(LOG_CAPACITY + 5) {
            add_log(&logs, "INFO", "Test", &format!("entry {}", i));
        }
        let logs = logs.lock().unwrap();
        assert_eq!(logs.len(), LOG_CAPACITY);
        assert_eq!(logs[0].message, "entry 5");
    }
}
