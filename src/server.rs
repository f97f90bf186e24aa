//! HTTP boundary for the registry engine
//!
//! Thin axum layer over [`SchemaRegistry`]: path parsing, numeric argument
//! validation, JSON envelopes and status-code selection live here; the
//! engine only ever produces domain results.
//!
//! ## Routes
//!
//! - `GET    /subjects` — sorted subject names
//! - `GET    /schemas/ids/:id` — `{"schema": ...}`
//! - `GET    /schemas/ids/:id/schema` — raw schema text
//! - `GET    /subjects/:subject/versions` — sorted version numbers
//! - `GET    /subjects/:subject/versions/:version` — subject/version/id/schema
//! - `GET    /subjects/:subject/versions/:version/schema` — raw schema text
//! - `POST   /subjects/:subject/versions` — register, returns `{"id": N}`
//! - `POST   /subjects/:subject` — check-only content lookup
//! - `DELETE /subjects/:subject` — removed version numbers
//! - `DELETE /subjects/:subject/versions/:version?permanent=bool` — the version
//! - `GET    /shutdown` — graceful stop, only when enabled

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

use crate::error::RegistryError;
use crate::record::VersionedSchema;
use crate::registry::SchemaRegistry;

/// Shared state behind every handler
pub struct AppState {
    registry: Arc<SchemaRegistry>,
    shutdown: watch::Sender<bool>,
}

/// Request and response body carrying just a schema
#[derive(Debug, Serialize, Deserialize)]
pub struct SchemaBody {
    pub schema: String,
}

/// Response with just the assigned id
#[derive(Debug, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: u64,
}

/// Response for a resolved subject version
#[derive(Debug, Serialize, Deserialize)]
pub struct SubjectVersionResponse {
    pub subject: String,
    pub version: u64,
    pub id: u64,
    pub schema: String,
}

/// Error envelope sent with every non-2xx response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_code: u16,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct DeleteParams {
    #[serde(default)]
    permanent: bool,
}

/// Build the router. Exposed separately from [`serve`] so tests can bind
/// their own listener.
pub fn router(registry: Arc<SchemaRegistry>, enable_shutdown: bool) -> Router {
    let (shutdown, _) = watch::channel(false);
    build(registry, shutdown, enable_shutdown)
}

/// Serve the registry until the process is killed or, when `enable_shutdown`
/// is set, until `GET /shutdown` is called.
pub async fn serve(
    registry: Arc<SchemaRegistry>,
    addr: SocketAddr,
    enable_shutdown: bool,
) -> std::io::Result<()> {
    let (shutdown, mut stop) = watch::channel(false);
    let app = build(registry, shutdown, enable_shutdown);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "schema registry listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            // pends forever unless the shutdown handler fires; the sender
            // lives in AppState so the channel never closes early
            let _ = stop.wait_for(|&stop| stop).await;
        })
        .await
}

fn build(registry: Arc<SchemaRegistry>, shutdown: watch::Sender<bool>, enable_shutdown: bool) -> Router {
    let state = Arc::new(AppState { registry, shutdown });
    let mut app = Router::new()
        .route("/subjects", get(list_subjects))
        .route("/schemas/ids/:id", get(schema_by_id))
        .route("/schemas/ids/:id/schema", get(schema_text_by_id))
        .route(
            "/subjects/:subject",
            axum::routing::post(check_schema).delete(delete_subject),
        )
        .route(
            "/subjects/:subject/versions",
            get(subject_versions).post(save_schema),
        )
        .route(
            "/subjects/:subject/versions/:version",
            get(subject_version).delete(delete_subject_version),
        )
        .route(
            "/subjects/:subject/versions/:version/schema",
            get(subject_version_schema),
        );
    if enable_shutdown {
        app = app.route("/shutdown", get(shutdown_handler));
    }
    app.with_state(state)
}

// -- handlers ---------------------------------------------------------------

async fn list_subjects(State(state): State<Arc<AppState>>) -> Response {
    match state.registry.lookup_subjects() {
        Ok(subjects) => Json(subjects).into_response(),
        Err(e) => engine_error(e),
    }
}

async fn schema_by_id(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let Some(id) = parse_number(&id) else {
        return bad_request(format!("bad schema-id number: {id}"));
    };
    match state.registry.lookup_schema_by_id(id) {
        Some(found) => Json(SchemaBody { schema: found.schema().to_string() }).into_response(),
        None => not_found(format!("schema-id {id} not found")),
    }
}

async fn schema_text_by_id(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let Some(id) = parse_number(&id) else {
        return bad_request(format!("bad schema-id number: {id}"));
    };
    match state.registry.lookup_schema_by_id(id) {
        Some(found) => found.schema().to_string().into_response(),
        None => not_found(format!("schema-id {id} not found")),
    }
}

async fn subject_versions(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
) -> Response {
    match state.registry.lookup_subject_versions(&subject) {
        Ok(Some(versions)) => Json(versions).into_response(),
        Ok(None) => not_found(format!("subject '{subject}' not found")),
        Err(e) => engine_error(e),
    }
}

async fn subject_version(
    State(state): State<Arc<AppState>>,
    Path((subject, version)): Path<(String, String)>,
) -> Response {
    let Some(version) = parse_number(&version) else {
        return bad_request(format!("bad version number: {version}"));
    };
    match state.registry.lookup_subject_version(&subject, version) {
        Ok(Some(found)) => Json(subject_version_response(&subject, &found)).into_response(),
        Ok(None) => not_found(format!(
            "subject '{subject}' and version {version} not found"
        )),
        Err(e) => engine_error(e),
    }
}

async fn subject_version_schema(
    State(state): State<Arc<AppState>>,
    Path((subject, version)): Path<(String, String)>,
) -> Response {
    let Some(version) = parse_number(&version) else {
        return bad_request(format!("bad version number: {version}"));
    };
    match state.registry.lookup_subject_version(&subject, version) {
        Ok(Some(found)) => found.schema().to_string().into_response(),
        Ok(None) => not_found(format!(
            "subject '{subject}' and version {version} not found"
        )),
        Err(e) => engine_error(e),
    }
}

async fn save_schema(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
    Json(body): Json<SchemaBody>,
) -> Response {
    match state.registry.save_schema(&subject, &body.schema) {
        Ok(saved) => Json(IdResponse { id: saved.id() }).into_response(),
        Err(e) => engine_error(e),
    }
}

async fn check_schema(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
    Json(body): Json<SchemaBody>,
) -> Response {
    match state.registry.lookup_schema(&subject, &body.schema) {
        Ok(Some(found)) => Json(subject_version_response(&subject, &found)).into_response(),
        Ok(None) => not_found(format!("subject '{subject}' schema not found")),
        Err(e) => engine_error(e),
    }
}

async fn delete_subject(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
) -> Response {
    match state.registry.delete_subject(&subject) {
        Ok(Some(versions)) => Json(versions).into_response(),
        Ok(None) => not_found(format!("subject '{subject}' not found")),
        Err(e) => engine_error(e),
    }
}

async fn delete_subject_version(
    State(state): State<Arc<AppState>>,
    Path((subject, version)): Path<(String, String)>,
    Query(params): Query<DeleteParams>,
) -> Response {
    let Some(version) = parse_number(&version) else {
        return bad_request(format!("bad version number: {version}"));
    };
    match state
        .registry
        .delete_subject_version(&subject, version, params.permanent)
    {
        // the registry protocol answers a version delete with the bare number
        Ok(Some(_)) => Json(version).into_response(),
        Ok(None) => not_found(format!(
            "subject '{subject}' version {version} not found"
        )),
        Err(e) => engine_error(e),
    }
}

async fn shutdown_handler(State(state): State<Arc<AppState>>) -> Response {
    info!("shutdown requested");
    let _ = state.shutdown.send(true);
    Json(ErrorBody {
        error_code: 200,
        message: "shutting down".to_string(),
    })
    .into_response()
}

// -- helpers ----------------------------------------------------------------

fn subject_version_response(subject: &str, found: &VersionedSchema) -> SubjectVersionResponse {
    SubjectVersionResponse {
        subject: subject.to_string(),
        // a check-only hit outside the subject carries no version
        version: found.version().unwrap_or(0),
        id: found.id(),
        schema: found.schema().to_string(),
    }
}

fn parse_number(s: &str) -> Option<u64> {
    s.parse::<u64>().ok()
}

fn error_response(status: StatusCode, message: String) -> Response {
    let body = ErrorBody {
        error_code: status.as_u16(),
        message,
    };
    (status, Json(body)).into_response()
}

fn not_found(message: String) -> Response {
    error_response(StatusCode::NOT_FOUND, message)
}

fn bad_request(message: String) -> Response {
    error_response(StatusCode::BAD_REQUEST, message)
}

fn engine_error(e: RegistryError) -> Response {
    let status =
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    error_response(status, e.to_string())
}
