//! HTTP API for the presentation layer.
//!
//! A browser front end (or any other client) renders the table and reports
//! user actions here. The server owns one [`Session`]; every request locks
//! it for its whole duration, so actions are processed strictly one after
//! another, including the outbound improvement call.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (version, improver) |
//! | `GET`    | `/rows` | Visible rows with pending edits and selection |
//! | `GET`    | `/facets` | Distinct values per categorical column, current filter |
//! | `PUT`    | `/filter` | Replace the filter |
//! | `PUT`    | `/selection` | Replace the selection (visible positions) |
//! | `PUT`    | `/rows/{id}/pending` | Stage an edit |
//! | `DELETE` | `/rows/{id}/pending` | Discard a staged edit |
//! | `POST`   | `/rows/{id}/improve` | Ask the improvement service, stage the answer |
//! | `POST`   | `/apply` | Commit staged edits of the selected rows |
//! | `POST`   | `/save` | Write the table to disk |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "row 12 is not selected" } }
//! ```
//!
//! Error codes: `bad_request` (400), `invalid_field` (400), `not_found`
//! (404), `commit_failed` (422), `io_error` (500), `service_error` (502).

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::EditorError;
use crate::filter::FilterSpec;
use crate::improve::{create_improver, Improver};
use crate::models::RowId;
use crate::session::{Applied, SelectionUpdate, Session};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<Session>>,
    improver: Arc<dyn Improver>,
}

/// Open the configured dataset and serve the API on `[server].bind`.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let session = Session::open(&config.dataset)?;
    let improver = create_improver(&config.improver)?;
    let bind_addr = config.server.bind.clone();

    let app = router(session, improver);

    log::info!(
        "serving {} on http://{}",
        config.dataset.path.display(),
        bind_addr
    );
    println!("Curator listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the API router around an open session.
pub fn router(session: Session, improver: Box<dyn Improver>) -> Router {
    let state = AppState {
        session: Arc::new(Mutex::new(session)),
        improver: Arc::from(improver),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/rows", get(handle_rows))
        .route("/facets", get(handle_facets))
        .route("/filter", put(handle_filter))
        .route("/selection", put(handle_selection))
        .route(
            "/rows/{id}/pending",
            put(handle_stage).delete(handle_discard),
        )
        .route("/rows/{id}/improve", post(handle_improve))
        .route("/apply", post(handle_apply))
        .route("/save", post(handle_save))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<EditorError> for AppError {
    fn from(err: EditorError) -> Self {
        let (status, code) = match &err {
            EditorError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            EditorError::InvalidField(_) => (StatusCode::BAD_REQUEST, "invalid_field"),
            EditorError::AmbiguousKey(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            EditorError::Service(_) => (StatusCode::BAD_GATEWAY, "service_error"),
            EditorError::Commit(_) => (StatusCode::UNPROCESSABLE_ENTITY, "commit_failed"),
            EditorError::Io { .. } | EditorError::Csv { .. } | EditorError::Malformed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "io_error")
            }
        };
        log::warn!("request failed ({}): {}", code, err);
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl AppError {
    fn bad_request(message: String) -> Self {
        log::warn!("request rejected (bad_request): {}", message);
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

/// Plain success acknowledgement for the user.
#[derive(Serialize)]
struct Message {
    message: String,
}

fn message(text: impl Into<String>) -> Json<Message> {
    Json(Message {
        message: text.into(),
    })
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    improver: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        improver: state.improver.name().to_string(),
    })
}

// ============ GET /rows ============

#[derive(Serialize)]
struct RowView {
    position: usize,
    id: RowId,
    selected: bool,
    values: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pending: Option<BTreeMap<String, String>>,
}

#[derive(Serialize)]
struct RowsResponse {
    columns: Vec<String>,
    total: usize,
    visible: usize,
    /// Display positions of the selected rows.
    selection: Vec<usize>,
    staged: usize,
    rows: Vec<RowView>,
}

fn rows_response(session: &Session) -> RowsResponse {
    let rows = session
        .visible_rows()
        .map(|r| RowView {
            position: r.position,
            id: r.row.id,
            selected: r.selected,
            values: r.row.to_json(),
            pending: r.pending.cloned(),
        })
        .collect();

    RowsResponse {
        columns: session.store().table().headers.clone(),
        total: session.store().len(),
        visible: session.visible().len(),
        selection: session.selection().positions(session.visible()),
        staged: session.editor().len(),
        rows,
    }
}

async fn handle_rows(State(state): State<AppState>) -> Json<RowsResponse> {
    let session = state.session.lock().await;
    Json(rows_response(&session))
}

// ============ GET /facets ============

#[derive(Serialize)]
struct FacetsResponse {
    facets: BTreeMap<String, BTreeSet<String>>,
    keyword_column: String,
    filter: FilterSpec,
}

async fn handle_facets(State(state): State<AppState>) -> Result<Json<FacetsResponse>, AppError> {
    let session = state.session.lock().await;
    Ok(Json(FacetsResponse {
        facets: session.facets()?,
        keyword_column: session.config().keyword_column.clone(),
        filter: session.filter().clone(),
    }))
}

// ============ PUT /filter ============

#[derive(Serialize)]
struct FilterResponse {
    update: SelectionUpdate,
    #[serde(flatten)]
    rows: RowsResponse,
}

async fn handle_filter(
    State(state): State<AppState>,
    payload: Result<Json<FilterSpec>, JsonRejection>,
) -> Result<Json<FilterResponse>, AppError> {
    let Json(spec) = payload?;
    let mut session = state.session.lock().await;
    let update = session.set_filter(spec)?;
    Ok(Json(FilterResponse {
        update,
        rows: rows_response(&session),
    }))
}

// ============ PUT /selection ============

#[derive(Deserialize)]
struct SelectionRequest {
    positions: Vec<usize>,
}

#[derive(Serialize)]
struct SelectionResponse {
    selected: Vec<RowId>,
    #[serde(flatten)]
    update: SelectionUpdate,
}

async fn handle_selection(
    State(state): State<AppState>,
    payload: Result<Json<SelectionRequest>, JsonRejection>,
) -> Result<Json<SelectionResponse>, AppError> {
    let Json(req) = payload?;
    let mut session = state.session.lock().await;
    let update = session.select(&req.positions);
    Ok(Json(SelectionResponse {
        selected: session.selection().ids().collect(),
        update,
    }))
}

// ============ /rows/{id}/pending ============

#[derive(Deserialize)]
struct StageRequest {
    #[serde(default)]
    field: Option<String>,
    value: String,
}

async fn handle_stage(
    State(state): State<AppState>,
    id: Result<Path<usize>, PathRejection>,
    payload: Result<Json<StageRequest>, JsonRejection>,
) -> Result<Json<Message>, AppError> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let mut session = state.session.lock().await;
    session.stage_edit(RowId(id), req.field.as_deref(), &req.value)?;
    Ok(message(format!("Row {} edit staged", id)))
}

async fn handle_discard(
    State(state): State<AppState>,
    id: Result<Path<usize>, PathRejection>,
) -> Result<Json<Message>, AppError> {
    let Path(id) = id?;
    let mut session = state.session.lock().await;
    session.discard_edit(RowId(id))?;
    Ok(message(format!("Row {} edit discarded", id)))
}

// ============ POST /rows/{id}/improve ============

#[derive(Serialize)]
struct ImproveResponse {
    improved_question: String,
    message: String,
}

async fn handle_improve(
    State(state): State<AppState>,
    id: Result<Path<usize>, PathRejection>,
) -> Result<Json<ImproveResponse>, AppError> {
    let Path(id) = id?;
    let mut session = state.session.lock().await;
    let improved = session
        .improve_row(RowId(id), state.improver.as_ref())
        .await?;
    Ok(Json(ImproveResponse {
        improved_question: improved,
        message: format!("Row {} updated with LLM response", id),
    }))
}

// ============ POST /apply ============

#[derive(Serialize)]
struct ApplyResponse {
    #[serde(flatten)]
    applied: Applied,
    message: String,
}

async fn handle_apply(State(state): State<AppState>) -> Result<Json<ApplyResponse>, AppError> {
    let mut session = state.session.lock().await;
    let applied = session.apply_selected()?;
    let message = if applied.committed.is_empty() {
        "No staged changes to apply".to_string()
    } else {
        format!("Manual changes applied to {} row(s)", applied.committed.len())
    };
    Ok(Json(ApplyResponse { applied, message }))
}

// ============ POST /save ============

#[derive(Serialize)]
struct SaveResponse {
    path: String,
    rows: usize,
    unapplied_edits: usize,
    saved_at: String,
    message: String,
}

async fn handle_save(State(state): State<AppState>) -> Result<Json<SaveResponse>, AppError> {
    let session = state.session.lock().await;
    let unapplied = session.save()?;
    let mut message = "Dataset saved successfully".to_string();
    if unapplied > 0 {
        message.push_str(&format!(
            " ({} staged edit(s) not applied and not saved)",
            unapplied
        ));
    }
    Ok(Json(SaveResponse {
        path: session.store().path().display().to_string(),
        rows: session.store().len(),
        unapplied_edits: unapplied,
        saved_at: chrono::Utc::now()
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string(),
        message,
    }))
}
