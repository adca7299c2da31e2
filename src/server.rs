//! HTTP API server.
//!
//! Exposes the document store, the passage retriever, and the Socratic
//! tutor over a JSON HTTP API for the browser client.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (version, LLM, knowledge size) |
//! | `GET`  | `/subjects` | Valid subject values |
//! | `GET`  | `/levels` | Valid level values |
//! | `POST` | `/documents` | Add a document from JSON text |
//! | `POST` | `/documents/upload` | Add a document from a multipart file upload |
//! | `GET`  | `/documents` | List document metadata (`?user_id=` filter) |
//! | `GET`  | `/documents/{id}` | Fetch a full document |
//! | `DELETE` | `/documents/{id}` | Delete a document |
//! | `POST` | `/documents/{id}/retrieve` | Top-k passages for a query |
//! | `POST` | `/knowledge/search` | Top-k knowledge-base passages, filtered by subject/level |
//! | `POST` | `/tutor` | Socratic response grounded in a document or the knowledge base |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "document not found: 42" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unsupported_file` (400),
//! `llm_disabled` (400), `not_found` (404), `payload_too_large` (413),
//! `llm_error` (502), `internal` (500). Rejected JSON bodies and query
//! strings use the same envelope.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support the
//! browser-based client.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use socratic_tutor_core::models::{Document, DocumentMetadata, Level, Subject};
use socratic_tutor_core::retriever::NewDocument;
use socratic_tutor_core::{RetrievalError, Retriever};

use crate::config::Config;
use crate::db;
use crate::extract::{apply_upload_rules, extract_text, ExtractError};
use crate::knowledge;
use crate::llm::{
    create_tutor, ContextPassage, SocraticResponse, TutorClient, TutorError, TutorRequest,
};
use crate::migrate;
use crate::sqlite_store::SqliteStore;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub retriever: Arc<Retriever>,
    pub tutor: Arc<dyn TutorClient>,
}

/// Starts the HTTP server.
///
/// Opens the database (creating the schema if needed), loads the knowledge
/// base, builds the retriever over a [`SqliteStore`], and serves until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let retriever = Retriever::new(
        Arc::new(SqliteStore::new(pool)),
        config.chunking.params(),
    )
    .with_knowledge(knowledge::load_from_config(config)?);
    let tutor: Arc<dyn TutorClient> = Arc::from(create_tutor(&config.llm)?);

    let state = AppState {
        config: Arc::new(config.clone()),
        retriever: Arc::new(retriever),
        tutor,
    };

    let bind_addr = config.server.bind.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(bind = %bind_addr, llm = %config.llm.provider, "server listening");
    println!("Socratic tutor server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Routes, body limit, and CORS around `state`.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_bytes = state.config.upload.max_bytes;

    Router::new()
        .route("/health", get(handle_health))
        .route("/subjects", get(handle_subjects))
        .route("/levels", get(handle_levels))
        .route("/documents", post(handle_create).get(handle_list))
        .route("/documents/upload", post(handle_upload))
        .route("/documents/{id}", get(handle_get).delete(handle_delete))
        .route("/documents/{id}/retrieve", post(handle_retrieve))
        .route("/knowledge/search", post(handle_knowledge_search))
        .route("/tutor", post(handle_tutor))
        .layer(DefaultBodyLimit::max(max_bytes))
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

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &str {
        self.code
    }
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn internal(message: impl Into<String>) -> AppError {
    let message = message.into();
    error!(error = %message, "internal error");
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<RetrievalError> for AppError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::NotFound(_) => {
                AppError::new(StatusCode::NOT_FOUND, "not_found", err.to_string())
            }
            RetrievalError::Storage(e) => internal(format!("storage error: {:#}", e)),
            other => bad_request(other.to_string()),
        }
    }
}

impl From<ExtractError> for AppError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Empty => bad_request(err.to_string()),
            other => AppError::new(StatusCode::BAD_REQUEST, "unsupported_file", other.to_string()),
        }
    }
}

impl From<TutorError> for AppError {
    fn from(err: TutorError) -> Self {
        match err {
            TutorError::Disabled => {
                AppError::new(StatusCode::BAD_REQUEST, "llm_disabled", err.to_string())
            }
            other => {
                warn!(error = %other, "tutor request failed");
                AppError::new(StatusCode::BAD_GATEWAY, "llm_error", other.to_string())
            }
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        let status = err.status();
        let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "payload_too_large"
        } else {
            "bad_request"
        };
        AppError::new(status, code, err.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::new(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", err.body_text())
        } else {
            bad_request(err.body_text())
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(err: QueryRejection) -> Self {
        bad_request(err.body_text())
    }
}

// ============ Shared helpers ============

fn parse_subject(raw: Option<&str>) -> Result<Subject, AppError> {
    match raw {
        Some(s) if !s.trim().is_empty() => Ok(s.parse()?),
        _ => Ok(Subject::default()),
    }
}

fn parse_level(raw: Option<&str>) -> Result<Level, AppError> {
    match raw {
        Some(s) if !s.trim().is_empty() => Ok(s.parse()?),
        _ => Ok(Level::default()),
    }
}

/// Knowledge filters: only values the caller actually sent restrict the search.
fn parse_filters(
    subject: Option<&str>,
    level: Option<&str>,
) -> Result<(Option<Subject>, Option<Level>), AppError> {
    let subject = match subject {
        Some(s) if !s.trim().is_empty() => Some(s.parse()?),
        _ => None,
    };
    let level = match level {
        Some(l) if !l.trim().is_empty() => Some(l.parse()?),
        _ => None,
    };
    Ok((subject, level))
}

#[derive(Serialize)]
struct CreatedResponse {
    message: String,
    document: DocumentMetadata,
}

async fn store_document(state: &AppState, new: NewDocument) -> Result<Response, AppError> {
    let added = state.retriever.add_document(new).await?;
    let body = CreatedResponse {
        message: format!("Document '{}' uploaded successfully", added.document.filename),
        document: added.metadata(),
    };
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    llm: String,
    knowledge_passages: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        llm: state.tutor.name().to_string(),
        knowledge_passages: state.retriever.knowledge().len(),
    })
}

// ============ GET /subjects, GET /levels ============

async fn handle_subjects() -> Json<serde_json::Value> {
    let subjects: Vec<&str> = Subject::ALL.iter().map(|s| s.as_str()).collect();
    Json(serde_json::json!({ "subjects": subjects }))
}

async fn handle_levels() -> Json<serde_json::Value> {
    let levels: Vec<&str> = Level::ALL.iter().map(|l| l.as_str()).collect();
    Json(serde_json::json!({ "levels": levels }))
}

// ============ POST /documents ============

#[derive(Deserialize)]
struct CreateDocumentRequest {
    filename: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    level: Option<String>,
    content: String,
    #[serde(default)]
    user_id: Option<String>,
}

async fn handle_create(
    State(state): State<AppState>,
    payload: Result<Json<CreateDocumentRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload?;
    if req.filename.trim().is_empty() {
        return Err(bad_request("filename must not be empty"));
    }
    let new = NewDocument {
        subject: parse_subject(req.subject.as_deref())?,
        level: parse_level(req.level.as_deref())?,
        content: apply_upload_rules(req.content, &state.config.upload)?,
        filename: req.filename,
        user_id: req.user_id,
    };
    store_document(&state, new).await
}

// ============ POST /documents/upload ============

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut subject = None;
    let mut level = None;
    let mut user_id = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| bad_request("file field is missing a filename"))?;
                let bytes = field.bytes().await?;
                file = Some((filename, bytes.to_vec()));
            }
            "subject" => subject = Some(field.text().await?),
            "level" => level = Some(field.text().await?),
            "user_id" => {
                let text = field.text().await?;
                if !text.trim().is_empty() {
                    user_id = Some(text);
                }
            }
            _ => {}
        }
    }

    let (filename, bytes) = file.ok_or_else(|| bad_request("missing 'file' field"))?;
    let subject = parse_subject(subject.as_deref())?;
    let level = parse_level(level.as_deref())?;

    let name = filename.clone();
    let text = tokio::task::spawn_blocking(move || extract_text(&name, &bytes))
        .await
        .map_err(|e| internal(format!("extraction task failed: {}", e)))??;

    info!(filename = %filename, chars = text.chars().count(), "file extracted");

    let new = NewDocument {
        filename,
        subject,
        level,
        content: apply_upload_rules(text, &state.config.upload)?,
        user_id,
    };
    store_document(&state, new).await
}

// ============ GET /documents ============

#[derive(Deserialize)]
struct ListParams {
    user_id: Option<String>,
}

#[derive(Serialize)]
struct ListResponse {
    documents: Vec<DocumentMetadata>,
}

async fn handle_list(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ListResponse>, AppError> {
    let Query(params) = params?;
    let documents = state
        .retriever
        .list_documents(params.user_id.as_deref())
        .await?;
    Ok(Json(ListResponse { documents }))
}

// ============ GET /documents/{id} ============

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    Ok(Json(state.retriever.get_document(&id).await?))
}

// ============ DELETE /documents/{id} ============

async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.retriever.delete_document(&id).await?;
    Ok(Json(serde_json::json!({
        "message": format!("Document {} deleted successfully", id)
    })))
}

// ============ POST /documents/{id}/retrieve ============

#[derive(Deserialize)]
struct RetrieveRequest {
    query: String,
    #[serde(default)]
    k: Option<i64>,
}

#[derive(Serialize)]
struct RetrieveHit {
    index: usize,
    offset: usize,
    text: String,
    score: f64,
}

#[derive(Serialize)]
struct RetrieveResponse {
    document_id: String,
    results: Vec<RetrieveHit>,
}

async fn handle_retrieve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<RetrieveRequest>, JsonRejection>,
) -> Result<Json<RetrieveResponse>, AppError> {
    let Json(req) = payload?;
    let k = resolve_k(req.k, &state.config)?;
    let results = state
        .retriever
        .retrieve(&id, &req.query, k)
        .await?
        .into_iter()
        .map(|s| RetrieveHit {
            index: s.passage.index,
            offset: s.passage.offset,
            text: s.passage.text,
            score: s.score,
        })
        .collect();
    Ok(Json(RetrieveResponse {
        document_id: id,
        results,
    }))
}

/// Default when absent, reject negatives, clamp to `retrieval.max_k`.
fn resolve_k(k: Option<i64>, config: &Config) -> Result<usize, AppError> {
    match k {
        None => Ok(config.retrieval.default_k),
        Some(k) if k < 0 => Err(bad_request("k must not be negative")),
        Some(k) => Ok((k as usize).min(config.retrieval.max_k)),
    }
}

// ============ POST /knowledge/search ============

#[derive(Deserialize)]
struct KnowledgeSearchRequest {
    query: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    k: Option<i64>,
}

#[derive(Serialize)]
struct KnowledgeHit {
    text: String,
    subject: Subject,
    level: Level,
    source: String,
    score: f64,
}

#[derive(Serialize)]
struct KnowledgeSearchResponse {
    results: Vec<KnowledgeHit>,
}

async fn handle_knowledge_search(
    State(state): State<AppState>,
    payload: Result<Json<KnowledgeSearchRequest>, JsonRejection>,
) -> Result<Json<KnowledgeSearchResponse>, AppError> {
    let Json(req) = payload?;
    let k = resolve_k(req.k, &state.config)?;
    let (subject, level) = parse_filters(req.subject.as_deref(), req.level.as_deref())?;
    let results = state
        .retriever
        .search_knowledge(&req.query, subject, level, k)?
        .into_iter()
        .map(|s| KnowledgeHit {
            text: s.passage.text,
            subject: s.passage.subject,
            level: s.passage.level,
            source: s.passage.source,
            score: s.score,
        })
        .collect();
    Ok(Json(KnowledgeSearchResponse { results }))
}

// ============ POST /tutor ============

#[derive(Deserialize)]
struct TutorBody {
    question: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    document_id: Option<String>,
}

async fn handle_tutor(
    State(state): State<AppState>,
    payload: Result<Json<TutorBody>, JsonRejection>,
) -> Result<Json<SocraticResponse>, AppError> {
    let Json(body) = payload?;
    if body.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let k = state.config.retrieval.default_k;
    let passages = match body.document_id.as_deref() {
        Some(id) => document_context(&state, id, &body.question, k).await?,
        None => {
            let (subject, level) =
                parse_filters(body.subject.as_deref(), body.level.as_deref())?;
            state
                .retriever
                .search_knowledge(&body.question, subject, level, k)?
                .into_iter()
                .map(|s| ContextPassage {
                    source: s.passage.source,
                    text: s.passage.text,
                })
                .collect()
        }
    };

    let request = TutorRequest {
        question: body.question,
        subject: parse_subject(body.subject.as_deref())?,
        level: parse_level(body.level.as_deref())?,
        passages,
    };

    info!(
        document_id = body.document_id.as_deref().unwrap_or("-"),
        passages = request.passages.len(),
        "tutor request"
    );

    Ok(Json(state.tutor.respond(&request).await?))
}

/// Top passages of one document, labelled `"{filename} (passage N)"`.
async fn document_context(
    state: &AppState,
    id: &str,
    question: &str,
    k: usize,
) -> Result<Vec<ContextPassage>, AppError> {
    let doc = state.retriever.get_document(id).await?;
    Ok(state
        .retriever
        .retrieve(id, question, k)
        .await?
        .into_iter()
        .map(|s| ContextPassage {
            source: format!("{} (passage {})", doc.filename, s.passage.index + 1),
            text: s.passage.text,
        })
        .collect())
}
