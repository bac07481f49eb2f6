use std::sync::Arc;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use split_core::{ChunkRow, FileId, FileRecord, SplitError, SplitStore};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SplitStore>,
}

impl AppState {
    pub fn new(store: SplitStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/files", get(list_files))
        .route("/files/{id}", get(file_info))
        .route("/download/{id}", get(download))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Error body is always `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<SplitError> for ApiError {
    fn from(e: SplitError) -> Self {
        let status = match &e {
            SplitError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %e, "request failed");
        }
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

fn parse_id(raw: &str) -> Result<FileId, ApiError> {
    raw.parse::<FileId>()
        .map_err(|_| ApiError::bad_request(format!("invalid file id {raw:?}")))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: FileId,
    pub file_name: String,
    pub size: u64,
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .unwrap_or("upload")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("reading upload: {e}")))?;
        let size = data.len() as u64;
        let id = state.store.upload(&file_name, data).await?;
        info!(file_id = %id, file_name = %file_name, size, "upload accepted");
        return Ok(Json(UploadResponse {
            id,
            file_name,
            size,
        }));
    }
    warn!("upload without a file field");
    Err(ApiError::bad_request("multipart field \"file\" is required"))
}

async fn list_files(State(state): State<AppState>) -> Result<Json<Vec<FileRecord>>, ApiError> {
    Ok(Json(state.store.list().await?))
}

#[derive(Debug, Serialize)]
pub struct FileInfo {
    #[serde(flatten)]
    pub record: FileRecord,
    pub chunks: Vec<ChunkRow>,
}

async fn file_info(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<FileInfo>, ApiError> {
    let id = parse_id(&raw)?;
    let record = state.store.record(id).await?;
    let chunks = state.store.chunk_map(id).await?;
    Ok(Json(FileInfo { record, chunks }))
}

async fn download(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&raw)?;
    let dl = state.store.download(id).await?;
    info!(file_id = %id, size = dl.record.size, "download started");

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        header_safe_name(&dl.record.name)
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(dl.record.size)),
        ],
        Body::from_stream(dl.body),
    )
        .into_response())
}

/// Printable ASCII only; quotes and backslashes would end the quoted-string early.
fn header_safe_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}
