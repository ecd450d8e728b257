//! HTTP API
//!
//! The inference endpoints are pure transforms over the request body and
//! never touch the store. Everything else reads one snapshot of the store per
//! request. Error bodies are always `{"message": ...}`.

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::affected::{resolve, AffectedQuery};
use crate::analysis::find_problems;
use crate::catalog::{Definition, Entity, Format};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result as CatalogResult};
use crate::export::{export, ExportFormat};
use crate::infer::{infer_postman, infer_swagger, InferredSchema};
use crate::store::FileStore;
use crate::validate::validate;

pub type AppState = Arc<FileStore>;

/// Error response with an HTTP status and a client-safe message
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        match &e {
            CatalogError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, e.to_string()),
            CatalogError::AlreadyExists { .. } => Self::new(StatusCode::CONFLICT, e.to_string()),
            _ if e.is_client_error() => Self::bad_request(e.to_string()),
            _ => {
                error!(error = %e, "request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Build the application router
pub fn router(store: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/affected", get(affected))
        .route("/api/process/postman", post(process_postman))
        .route("/api/process/swagger", post(process_swagger))
        .route("/api/import", post(import))
        .route("/api/validate", post(validate_document))
        .route("/api/problems", get(problems))
        .route("/api/export/{entity}", get(export_entity))
        .route("/api/search", get(search))
        .route("/api/changes", get(changes))
        .route("/api/formats", get(list_formats).post(create_format))
        .route("/api/formats/{name}", put(update_format).delete(delete_format))
        .route("/api/definitions", get(list_definitions).post(create_definition))
        .route("/api/definitions/{name}", put(update_definition).delete(delete_definition))
        .route("/api/entities", get(list_entities).post(create_entity))
        .route("/api/entities/{label}", put(update_entity).delete(delete_entity))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// Serve the API until ctrl-c
pub async fn serve(config: &CatalogConfig, store: FileStore) -> anyhow::Result<()> {
    let app = router(Arc::new(store), config.server.max_body_bytes);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "catalog server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}

/// Parse a JSON body ourselves so malformed input gets the usual error shape
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))
}

/// Run a store operation on the blocking pool; the store does file IO and
/// holds a std mutex while writing.
async fn with_store<T, F>(store: AppState, op: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&FileStore) -> CatalogResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || op(&*store))
        .await
        .map_err(|e| {
            error!(error = %e, "store task failed");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        })?
        .map_err(ApiError::from)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ========== Affected items ==========

async fn affected(
    State(store): State<AppState>,
    params: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = params?;
    let query = AffectedQuery::from_params(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
    let catalog = with_store(store, |store| store.snapshot()).await?;

    let result = resolve(&catalog, &query);
    if result.is_empty() {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("No usages found for {}", query.name),
        ));
    }
    Ok(Json(result).into_response())
}

// ========== Inference ==========

async fn process_postman(body: Bytes) -> ApiResult<Json<InferredSchema>> {
    let collection: Value = parse_body(&body)?;
    infer_postman(&collection)
        .map(Json)
        .ok_or_else(|| ApiError::bad_request("No parseable request bodies found in collection"))
}

async fn process_swagger(body: Bytes) -> ApiResult<Json<InferredSchema>> {
    let document: Value = parse_body(&body)?;
    if !document.is_object() {
        return Err(ApiError::bad_request("Swagger document must be a JSON object"));
    }
    let schema = infer_swagger(&document);
    if schema.is_empty() {
        return Err(ApiError::bad_request("No entities or definitions found in Swagger document"));
    }
    Ok(Json(schema))
}

async fn import(State(store): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let schema: InferredSchema = parse_body(&body)?;
    let report = with_store(store, move |store| store.import(&schema)).await?;
    Ok(Json(report).into_response())
}

// ========== Catalog views ==========

async fn validate_document(State(store): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let document: Value = parse_body(&body)?;
    let catalog = with_store(store, |store| store.snapshot()).await?;
    Ok(Json(validate(&document, &catalog)).into_response())
}

async fn problems(State(store): State<AppState>) -> ApiResult<Response> {
    let catalog = with_store(store, |store| store.snapshot()).await?;
    Ok(Json(find_problems(&catalog)).into_response())
}

#[derive(Debug, Deserialize)]
struct ExportParams {
    #[serde(rename = "as")]
    shape: Option<String>,
}

async fn export_entity(
    State(store): State<AppState>,
    Path(label): Path<String>,
    params: Result<Query<ExportParams>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(params) = params?;
    let format = match params.shape.as_deref() {
        Some(shape) => shape.parse::<ExportFormat>()?,
        None => ExportFormat::default(),
    };
    let catalog = with_store(store, |store| store.snapshot()).await?;
    Ok(Json(export(&catalog, &label, format)?))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: String,
    limit: Option<usize>,
}

async fn search(
    State(store): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = params?;
    let catalog = with_store(store, |store| store.snapshot()).await?;
    Ok(Json(catalog.search(&params.q, params.limit.unwrap_or(20))).into_response())
}

async fn changes(State(store): State<AppState>) -> ApiResult<Response> {
    Ok(Json(with_store(store, |store| store.changes()).await?).into_response())
}

// ========== CRUD ==========

#[derive(Debug, Serialize, Deserialize)]
struct NamedFormat {
    name: String,
    #[serde(flatten)]
    format: Format,
}

#[derive(Debug, Serialize, Deserialize)]
struct NamedDefinition {
    name: String,
    #[serde(flatten)]
    definition: Definition,
}

#[derive(Debug, Serialize, Deserialize)]
struct LabelledEntity {
    label: String,
    #[serde(flatten)]
    entity: Entity,
}

async fn list_formats(State(store): State<AppState>) -> ApiResult<Response> {
    Ok(Json(with_store(store, |store| store.get_formats()).await?).into_response())
}

async fn create_format(State(store): State<AppState>, body: Bytes) -> ApiResult<StatusCode> {
    let item: NamedFormat = parse_body(&body)?;
    with_store(store, move |store| store.add_format(&item.name, item.format)).await?;
    Ok(StatusCode::CREATED)
}

async fn update_format(State(store): State<AppState>, Path(name): Path<String>, body: Bytes) -> ApiResult<StatusCode> {
    let format: Format = parse_body(&body)?;
    with_store(store, move |store| store.update_format(&name, format)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_format(State(store): State<AppState>, Path(name): Path<String>) -> ApiResult<StatusCode> {
    with_store(store, move |store| store.delete_format(&name)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_definitions(State(store): State<AppState>) -> ApiResult<Response> {
    Ok(Json(with_store(store, |store| store.get_definitions()).await?).into_response())
}

async fn create_definition(State(store): State<AppState>, body: Bytes) -> ApiResult<StatusCode> {
    let item: NamedDefinition = parse_body(&body)?;
    with_store(store, move |store| store.add_definition(&item.name, item.definition)).await?;
    Ok(StatusCode::CREATED)
}

async fn update_definition(State(store): State<AppState>, Path(name): Path<String>, body: Bytes) -> ApiResult<StatusCode> {
    let definition: Definition = parse_body(&body)?;
    with_store(store, move |store| store.update_definition(&name, definition)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_definition(State(store): State<AppState>, Path(name): Path<String>) -> ApiResult<StatusCode> {
    with_store(store, move |store| store.delete_definition(&name)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_entities(State(store): State<AppState>) -> ApiResult<Response> {
    Ok(Json(with_store(store, |store| store.get_entities()).await?).into_response())
}

async fn create_entity(State(store): State<AppState>, body: Bytes) -> ApiResult<StatusCode> {
    let item: LabelledEntity = parse_body(&body)?;
    with_store(store, move |store| store.add_entity(&item.label, item.entity)).await?;
    Ok(StatusCode::CREATED)
}

async fn update_entity(State(store): State<AppState>, Path(label): Path<String>, body: Bytes) -> ApiResult<StatusCode> {
    let entity: Entity = parse_body(&body)?;
    with_store(store, move |store| store.update_entity(&label, entity)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_entity(State(store): State<AppState>, Path(label): Path<String>) -> ApiResult<StatusCode> {
    with_store(store, move |store| store.delete_entity(&label)).await?;
    Ok(StatusCode::NO_CONTENT)
}
