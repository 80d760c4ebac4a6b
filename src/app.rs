use axum::{
    Form, Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::Query;
use handlebars::Handlebars;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::config::Settings;
use crate::dashboard::{self, ViewRequest};
use crate::downloader;
use crate::error::RepoError;
use crate::repository::Repository;
use crate::submission::{Submission, SubmissionSink};

pub struct AppState {
    repo: Arc<Repository>,
    sink: SubmissionSink,
    settings: Settings,
    templates: Handlebars<'static>,
}

impl AppState {
    pub fn new(settings: Settings, repo: Repository) -> Result<Self, RepoError> {
        let mut templates = Handlebars::new();
        templates
            .register_template_string("dashboard", include_str!("./static/dashboard.hbs"))
            .map_err(|e| RepoError::Config(format!("dashboard template: {}", e)))?;

        let repo = Arc::new(repo);
        Ok(AppState {
            sink: SubmissionSink::new(Arc::clone(&repo)),
            repo,
            settings,
            templates,
        })
    }
}

/// Filter parameters shared by the dashboard and the table endpoints
#[derive(Deserialize, Default)]
struct TableQuery {
    q: Option<String>,
    #[serde(default, rename = "type")]
    types: Vec<String>,
}

#[derive(Deserialize, Default)]
struct DashboardQuery {
    table: Option<String>,
    q: Option<String>,
    #[serde(default, rename = "type")]
    types: Vec<String>,
    submitted: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct SubmitForm {
    /// Category to show again after the redirect
    #[serde(default)]
    return_table: String,
    #[serde(flatten)]
    submission: Submission,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
}

#[derive(Serialize)]
struct TablesResponse {
    categories: Vec<String>,
    stored: Vec<String>,
    warning: Option<String>,
}

#[derive(Serialize)]
struct CategoryOption<'a> {
    name: &'a str,
    selected: bool,
}

#[derive(Serialize)]
struct DashboardPage<'a> {
    categories: Vec<CategoryOption<'a>>,
    view: dashboard::DashboardView,
    shown: usize,
    export_url: String,
    submission_table: &'a str,
    result: Option<StatusResponse>,
}

/// Error returned from API handlers, rendered as `{status, message}` JSON
struct ApiError(RepoError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RepoError::TableNotFound(_) => StatusCode::NOT_FOUND,
            RepoError::ValidationFailed(_) | RepoError::MalformedRow { .. } => {
                StatusCode::BAD_REQUEST
            }
            RepoError::SourceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RepoError::WriteConflict(_) => StatusCode::CONFLICT,
            RepoError::Export(_) | RepoError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = StatusResponse {
            status: "error".to_string(),
            message: Some(self.0.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        ApiError(err)
    }
}

/// Run blocking store work off the async executor
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, RepoError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError(RepoError::SourceUnavailable(format!("worker failed: {}", e))))?
        .map_err(ApiError)
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = state.settings.static_dir.clone();
    Router::new()
        .route("/", get(serve_dashboard))
        .route("/submit", post(handle_submit_form))
        .route("/api/tables", get(list_tables))
        .route("/api/tables/:name", get(get_table))
        .route("/api/tables/:name/export.csv", get(export_csv))
        .route("/api/tables/:name/export.xlsx", get(export_xlsx))
        .route("/api/tables/:name/refresh", post(refresh_table))
        .route("/api/submissions", post(submit_json))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

/// Open the configured store and serve the dashboard until the process stops
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let repo_settings = settings.clone();
    // The hosted store builds blocking HTTP clients, which must stay off the async runtime
    let repo = tokio::task::spawn_blocking(move || Repository::from_settings(&repo_settings)).await??;

    let bind = settings.bind.clone();
    let state = Arc::new(AppState::new(settings, repo)?);
    let app = router(state);

    let listener = TcpListener::bind(&bind).await?;
    info!("Listening on http://{}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}

fn view_request(table: String, query: TableQuery) -> ViewRequest {
    ViewRequest {
        table,
        query: query.q,
        selected: query.types,
    }
}

fn export_url(request: &ViewRequest) -> String {
    let mut url = format!(
        "/api/tables/{}/export.csv",
        urlencoding::encode(&request.table)
    );
    let mut params = Vec::new();
    if let Some(q) = request.query.as_deref().filter(|q| !q.trim().is_empty()) {
        params.push(format!("q={}", urlencoding::encode(q)));
    }
    for value in &request.selected {
        params.push(format!("type={}", urlencoding::encode(value)));
    }
    if !params.is_empty() {
        url.push('?');
        url.push_str(&params.join("&"));
    }
    url
}

async fn serve_dashboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DashboardQuery>,
) -> Response {
    let dashboard_settings = &state.settings.dashboard;
    let table = params
        .table
        .filter(|t| !t.is_empty())
        .or_else(|| dashboard_settings.categories.first().cloned())
        .unwrap_or_else(|| dashboard_settings.submission_table.clone());

    let request = view_request(
        table,
        TableQuery {
            q: params.q,
            types: params.types,
        },
    );

    let worker_state = Arc::clone(&state);
    let worker_request = request.clone();
    let view = match tokio::task::spawn_blocking(move || {
        dashboard::build_view(
            &worker_state.repo,
            &worker_state.settings.dashboard,
            &worker_request,
        )
    })
    .await
    {
        Ok(view) => view,
        Err(e) => {
            error!("dashboard worker failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Dashboard unavailable").into_response();
        }
    };

    let result = params.submitted.map(|submitted| StatusResponse {
        status: submitted,
        message: params.message,
    });

    let page = DashboardPage {
        categories: dashboard_settings
            .categories
            .iter()
            .map(|name| CategoryOption {
                name,
                selected: *name == request.table,
            })
            .collect(),
        export_url: export_url(&request),
        shown: view.cards.len(),
        view,
        submission_table: &dashboard_settings.submission_table,
        result,
    };

    match state.templates.render("dashboard", &page) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("failed to render dashboard: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render dashboard").into_response()
        }
    }
}

async fn handle_submit_form(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SubmitForm>,
) -> Redirect {
    let SubmitForm {
        return_table,
        submission,
    } = form;

    let worker_state = Arc::clone(&state);
    let outcome = blocking(move || {
        let table = worker_state.settings.dashboard.submission_table.clone();
        worker_state.sink.submit(&table, &submission)
    })
    .await;

    let status = match outcome {
        Ok(()) => "submitted=ok".to_string(),
        Err(ApiError(e)) => format!(
            "submitted=error&message={}",
            urlencoding::encode(&e.to_string())
        ),
    };

    Redirect::to(&format!(
        "/?table={}&{}",
        urlencoding::encode(&return_table),
        status
    ))
}

async fn list_tables(State(state): State<Arc<AppState>>) -> Json<TablesResponse> {
    let worker_state = Arc::clone(&state);
    let stored = blocking(move || worker_state.repo.table_names()).await;

    let categories = state.settings.dashboard.categories.clone();
    Json(match stored {
        Ok(stored) => TablesResponse {
            categories,
            stored,
            warning: None,
        },
        Err(ApiError(e)) => TablesResponse {
            categories,
            stored: Vec::new(),
            warning: Some(e.to_string()),
        },
    })
}

async fn get_table(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<TableQuery>,
) -> Result<Json<dashboard::DashboardView>, ApiError> {
    let request = view_request(name, query);
    let view = blocking(move || {
        Ok(dashboard::build_view(
            &state.repo,
            &state.settings.dashboard,
            &request,
        ))
    })
    .await?;
    Ok(Json(view))
}

async fn export_csv(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<TableQuery>,
) -> Result<Response, ApiError> {
    let request = view_request(name, query);
    let (file_name, body) = blocking(move || {
        let table = dashboard::filtered_table(&state.repo, &state.settings.dashboard, &request)?;
        Ok((
            downloader::export_file_name(&table, "csv"),
            downloader::to_csv(&table)?,
        ))
    })
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
        .into_response())
}

async fn export_xlsx(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<TableQuery>,
) -> Result<Response, ApiError> {
    let request = view_request(name, query);
    let (file_name, body) = blocking(move || {
        let table = dashboard::filtered_table(&state.repo, &state.settings.dashboard, &request)?;
        Ok((
            downloader::export_file_name(&table, "xlsx"),
            downloader::to_xlsx(&table)?,
        ))
    })
    .await?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
        .into_response())
}

async fn refresh_table(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Json<StatusResponse> {
    let was_cached = state.repo.refresh(&name);
    Json(StatusResponse {
        status: "ok".to_string(),
        message: Some(if was_cached {
            format!("'{}' will be reloaded on next request", name)
        } else {
            format!("'{}' was not cached", name)
        }),
    })
}

async fn submit_json(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<Submission>,
) -> Result<Json<StatusResponse>, ApiError> {
    // Anonymous submissions only ever land in the configured table
    let table = state.settings.dashboard.submission_table.clone();

    let message = format!("appended to '{}'", table);
    blocking(move || state.sink.submit(&table, &submission)).await?;

    Ok(Json(StatusResponse {
        status: "ok".to_string(),
        message: Some(message),
    }))
}
