use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use handlebars::Handlebars;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::downloader::{self, ExportFormat};
use crate::error::ReportError;
use crate::loader;
use crate::metrics::BetRule;
use crate::progress::LogProgress;
use crate::report::{DailyReport, Table, TableKind, build_report};

/// Multipart field carrying the uploaded spreadsheet
pub const FILE_FIELD: &str = "file";
const BET_RULE_FIELD: &str = "bet_rule";

/// Processed reports kept for the lifetime of the process, oldest evicted first
pub struct ReportStore {
    capacity: usize,
    order: VecDeque<Uuid>,
    reports: HashMap<Uuid, Arc<DailyReport>>,
}

impl ReportStore {
    pub fn new(capacity: usize) -> Self {
        ReportStore {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            reports: HashMap::new(),
        }
    }

    pub fn insert(&mut self, report: DailyReport) -> Uuid {
        while self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.reports.remove(&oldest);
            }
        }
        let id = Uuid::new_v4();
        self.order.push_back(id);
        self.reports.insert(id, Arc::new(report));
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<DailyReport>> {
        self.reports.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

pub struct AppState {
    config: ServerConfig,
    reports: Mutex<ReportStore>,
    templates: Handlebars<'static>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self, AppError> {
        let mut templates = Handlebars::new();
        templates.set_strict_mode(false);
        templates
            .register_template_string("upload", include_str!("./static/upload.hbs"))
            .map_err(|e| AppError::Internal(e.to_string()))?;
        templates
            .register_template_string("report", include_str!("./static/report.hbs"))
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(AppState {
            reports: Mutex::new(ReportStore::new(config.max_reports)),
            config,
            templates,
        })
    }

    fn store(&self) -> std::sync::MutexGuard<'_, ReportStore> {
        self.reports.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn report(&self, id: &Uuid) -> Result<Arc<DailyReport>, AppError> {
        self.store().get(id).ok_or(AppError::NotFound)
    }
}

#[derive(Debug)]
pub enum AppError {
    NotFound,
    BadUpload(String),
    Report(ReportError),
    Internal(String),
}

impl From<ReportError> for AppError {
    fn from(e: ReportError) -> Self {
        AppError::Report(e)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::NotFound => write!(f, "report not found"),
            AppError::BadUpload(msg) => write!(f, "bad upload: {}", msg),
            AppError::Report(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadUpload(_) => StatusCode::BAD_REQUEST,
            AppError::Report(ReportError::UnknownTable(_)) => StatusCode::NOT_FOUND,
            AppError::Report(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("{}", self);
        } else {
            warn!("{}", self);
        }
        (status, Json(ErrorResponse {
            status: "error".to_string(),
            message: self.to_string(),
        }))
            .into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    status: String,
    message: String,
}

#[derive(Deserialize)]
struct DownloadQuery {
    format: Option<ExportFormat>,
}

#[derive(Serialize)]
struct BetRuleOption {
    value: &'static str,
    label: &'static str,
    selected: bool,
}

#[derive(Serialize)]
struct TableView {
    report_id: String,
    slug: &'static str,
    file_stem: &'static str,
    title: String,
    row_count: usize,
    empty_message: Option<String>,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TableView {
    fn new(id: &Uuid, table: &Table) -> Self {
        TableView {
            report_id: id.to_string(),
            slug: table.kind.slug(),
            file_stem: table.kind.file_stem(),
            title: table.title.clone(),
            row_count: table.rows.len(),
            // tables without an empty message still render their headers
            empty_message: if table.is_empty() {
                table.empty_message.clone()
            } else {
                None
            },
            headers: table.headers.clone(),
            rows: table
                .rows
                .iter()
                .map(|row| row.iter().map(|v| v.display()).collect())
                .collect(),
        }
    }
}

fn bet_rule_slug(rule: BetRule) -> &'static str {
    match rule {
        BetRule::Flag => "flag",
        BetRule::Amount => "amount",
        BetRule::IdentifierDifference => "identifier-difference",
    }
}

fn parse_bet_rule(value: &str) -> Option<BetRule> {
    [BetRule::Flag, BetRule::Amount, BetRule::IdentifierDifference]
        .into_iter()
        .find(|rule| bet_rule_slug(*rule) == value.trim())
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let max_upload = state.config.max_upload_bytes();

    Router::new()
        .route("/", get(serve_upload))
        .route("/static/report.css", get(serve_css))
        .route("/report", post(upload_report))
        .route("/reports/:id", get(show_report))
        .route("/reports/:id/download/:table", get(download_table))
        .route("/api/reports/:id", get(report_json))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload))
        .with_state(state)
}

pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let address = config.bind_address();
    let app_state = Arc::new(AppState::new(config)?);
    let app = router(app_state);

    let listener = TcpListener::bind(&address).await?;
    info!("Listening on http://{}", address);
    axum::serve(listener, app).await?;

    Ok(())
}

fn render_upload(state: &AppState, error: Option<String>, status: StatusCode) -> Response {
    let bet_rules: Vec<BetRuleOption> = [
        (BetRule::Flag, "have_bet = yes"),
        (BetRule::Amount, "total_bet_amount > 0"),
        (BetRule::IdentifierDifference, "user_id entre apostadores"),
    ]
    .into_iter()
    .map(|(rule, label)| BetRuleOption {
        value: bet_rule_slug(rule),
        label,
        selected: rule == state.config.bet_rule,
    })
    .collect();

    let context = serde_json::json!({ "error": error, "bet_rules": bet_rules });
    match state.templates.render("upload", &context) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => AppError::Internal(e.to_string()).into_response(),
    }
}

fn render_report(state: &AppState, id: &Uuid, report: &DailyReport) -> Result<Response, AppError> {
    let tables = vec![
        TableView::new(id, &report.new_users),
        TableView::new(id, &report.login_without_bet),
    ];
    let context = serde_json::json!({
        "id": id.to_string(),
        "report": report,
        "tables": tables,
    });
    let html = state
        .templates
        .render("report", &context)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Html(html).into_response())
}

async fn serve_upload(State(state): State<Arc<AppState>>) -> Response {
    render_upload(&state, None, StatusCode::OK)
}

async fn serve_css() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        include_str!("./static/report.css"),
    )
}

async fn upload_report(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut rule = state.config.bet_rule;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadUpload(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FILE_FIELD) => {
                let file_name = field.file_name().unwrap_or("upload.xlsx").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadUpload(e.to_string()))?;
                upload = Some((file_name, data.to_vec()));
            }
            Some(BET_RULE_FIELD) => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadUpload(e.to_string()))?;
                rule = parse_bet_rule(&value).unwrap_or(rule);
            }
            _ => {}
        }
    }

    let (file_name, data) = match upload {
        Some((name, data)) if !data.is_empty() => (name, data),
        _ => {
            return Ok(render_upload(
                &state,
                Some("No se recibió ningún archivo.".to_string()),
                StatusCode::BAD_REQUEST,
            ));
        }
    };
    info!("processing upload '{}' ({} bytes)", file_name, data.len());

    let source = file_name.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let records = loader::load_records_from_bytes(&file_name, data)?;
        build_report(&file_name, &records, rule, &mut LogProgress)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?;

    match outcome {
        Ok(report) => {
            let id = state.store().insert(report);
            info!("report {} ready for '{}'", id, source);
            let report = state.report(&id)?;
            render_report(&state, &id, &report)
        }
        Err(e) => {
            warn!("failed to process '{}': {}", source, e);
            Ok(render_upload(
                &state,
                Some(format!("Error al procesar el archivo: {}", e)),
                StatusCode::UNPROCESSABLE_ENTITY,
            ))
        }
    }
}

// Ids that are not UUIDs can never name a stored report
fn parse_report_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::NotFound)
}

async fn show_report(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, AppError> {
    let id = parse_report_id(&id)?;
    let report = state.report(&id)?;
    render_report(&state, &id, &report)
}

async fn report_json(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DailyReport>, AppError> {
    let id = parse_report_id(&id)?;
    let report = state.report(&id)?;
    Ok(Json(report.as_ref().clone()))
}

async fn download_table(
    Path((id, table)): Path<(String, String)>,
    Query(query): Query<DownloadQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, AppError> {
    let id = parse_report_id(&id)?;
    let kind: TableKind = table.parse()?;
    let format = query.format.unwrap_or_default();
    let report = state.report(&id)?;
    let table = report.table(kind);

    let data = downloader::export(table, format)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        downloader::file_name(table, format)
    );

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::build_report;
    use crate::record::UserRecord;
    use chrono::NaiveDate;

    fn report() -> DailyReport {
        let records = vec![UserRecord {
            report_date: NaiveDate::from_ymd_opt(2024, 3, 7),
            user_id: "1".into(),
            logged_in_day: "yes".into(),
            have_bet: "no".into(),
            ..Default::default()
        }];
        build_report("d.csv", &records, BetRule::Flag, &mut LogProgress).unwrap()
    }

    #[test]
    fn store_evicts_oldest_first() {
        let mut store = ReportStore::new(2);
        let first = store.insert(report());
        let second = store.insert(report());
        let third = store.insert(report());

        assert_eq!(store.len(), 2);
        assert!(store.get(&first).is_none());
        assert!(store.get(&second).is_some());
        assert!(store.get(&third).is_some());
    }

    #[test]
    fn bet_rule_slugs_round_trip() {
        for rule in [BetRule::Flag, BetRule::Amount, BetRule::IdentifierDifference] {
            assert_eq!(parse_bet_rule(bet_rule_slug(rule)), Some(rule));
        }
        assert_eq!(parse_bet_rule("coin-flip"), None);
    }

    #[test]
    fn malformed_report_id_is_not_found() {
        assert!(matches!(parse_report_id("not-a-report"), Err(AppError::NotFound)));
        assert!(parse_report_id("00000000-0000-4000-8000-000000000000").is_ok());
    }
}
