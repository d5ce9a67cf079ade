use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Query, State};
use axum::Json;
use pdf_rag_core::{Answer, UploadedFile};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::ApiError;
use super::state::AppState;

pub const DEFAULT_K: usize = 3;
pub const MAX_K: usize = 10;
pub const UPLOAD_SUCCESS_MESSAGE: &str = "File processed and embeddings stored successfully.";

const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    pub content_type: Option<String>,
    pub size: usize,
    pub chunks_created: usize,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub k: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default = "default_k")]
    pub k: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

fn default_k() -> usize {
    DEFAULT_K
}

fn check_k(k: usize) -> Result<usize, ApiError> {
    if (1..=MAX_K).contains(&k) {
        Ok(k)
    } else {
        Err(ApiError::InvalidInput(format!(
            "k must be between 1 and {MAX_K}, got {k}"
        )))
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST {prefix}/upload
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let file = read_file_field(multipart?).await?;
    let size = file.size();

    let chunks = state.processor.process(&file).await?;
    state.store.add(&chunks).await?;

    info!(filename = %file.filename, size, chunk_count = chunks.len(), "upload stored");
    Ok(Json(UploadResponse {
        filename: file.filename,
        content_type: file.content_type,
        size,
        chunks_created: chunks.len(),
        message: UPLOAD_SUCCESS_MESSAGE.to_string(),
    }))
}

async fn read_file_field(mut multipart: Multipart) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidInput("Uploaded file has no filename.".to_string()))?;
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?.to_vec();

        return Ok(UploadedFile {
            filename,
            content_type,
            bytes,
        });
    }

    Err(ApiError::InvalidInput(format!(
        "Missing multipart field '{FILE_FIELD}'."
    )))
}

/// POST {prefix}/search
pub async fn search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Query(params) = params?;
    let Json(request) = body?;
    let k = check_k(params.k.unwrap_or(DEFAULT_K))?;

    let results = state
        .store
        .search(&request.query, k)
        .await?
        .into_iter()
        .map(|chunk| chunk.text)
        .collect();

    Ok(Json(SearchResponse {
        query: request.query,
        results,
    }))
}

/// POST {prefix}/chat
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<Answer>, ApiError> {
    let Json(request) = body?;
    if request.query.is_empty() {
        return Err(ApiError::InvalidInput("query must not be empty".to_string()));
    }
    let k = check_k(request.k)?;

    let answer = state.generator.answer(&request.query, k).await?;
    Ok(Json(answer))
}
