//! API request handlers
//!
//! Handlers for all REST API endpoints.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::error::ApiError;
use super::server::AppState;
use crate::archive::{self, SplitOutput};
use crate::excel::{extract, read_sheet_names, validate_selection, SourceFormat, SourceWorkbook};
use crate::naming;

/// RFC 5987 `attr-char` set: everything else is percent-encoded.
const FILENAME_STAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Standard API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            request_id: Uuid::new_v4().to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self
    where
        T: Default,
    {
        Self {
            success: false,
            request_id: Uuid::new_v4().to_string(),
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Root endpoint response
#[derive(Serialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Serialize)]
pub struct EndpointInfo {
    pub path: String,
    pub method: String,
    pub description: String,
}

impl EndpointInfo {
    fn new(method: &str, path: &str, description: &str) -> Self {
        Self {
            path: path.to_string(),
            method: method.to_string(),
            description: description.to_string(),
        }
    }
}

/// GET / - Root info
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = RootResponse {
        name: "Sheet Splitter".to_string(),
        version: state.version.clone(),
        description: "Split an Excel workbook into one workbook per sheet".to_string(),
        endpoints: vec![
            EndpointInfo::new("GET", "/api/health", "Health check endpoint"),
            EndpointInfo::new("POST", "/api/upload", "Upload an XLSX/XLS workbook"),
            EndpointInfo::new("POST", "/api/split", "Extract selected sheets"),
        ],
    };
    Json(ApiResponse::ok(response))
}

/// Health check response
#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

/// GET /api/health - Health check
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Upload response
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub session_id: String,
    pub temp_file: String,
    pub filename: String,
    pub sheets: Vec<String>,
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("File too large".to_string())
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

/// POST /api/upload - Store a workbook and list its sheets
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) = upload.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    if filename.is_empty() {
        return Err(ApiError::bad_request("No filename"));
    }
    if naming::extension(&filename)
        .and_then(|ext| SourceFormat::from_extension(&ext))
        .is_none()
    {
        return Err(ApiError::bad_request("Only XLSX or XLS files are supported"));
    }
    if bytes.len() > state.config.max_upload_bytes {
        return Err(ApiError::bad_request("File too large"));
    }

    // Dropping `staged` on any early return removes the directory.
    let staged = state.registry.stage(&filename)?;
    staged.write(&bytes)?;

    let path = staged.path().to_path_buf();
    let sheets = match tokio::task::spawn_blocking(move || read_sheet_names(&path)).await {
        Ok(Ok(sheets)) => sheets,
        Ok(Err(e)) => {
            warn!(filename = %filename, error = %e, "Rejected unreadable upload");
            return Err(ApiError::bad_request("Cannot read file"));
        }
        Err(e) => return Err(ApiError::internal(e)),
    };

    let temp_file = staged.path().to_string_lossy().into_owned();
    let session_id = staged.commit(&state.registry, &filename, sheets.clone())?;
    info!(
        session_id = %session_id,
        bytes = bytes.len(),
        sheets = ?sheets,
        "Upload accepted"
    );

    Ok(Json(UploadResponse {
        session_id,
        temp_file,
        filename,
        sheets,
    }))
}

/// Split request
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SplitRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub temp_file: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub sheets: Vec<String>,
}

/// POST /api/split - Extract the selected sheets
///
/// Every call ends with a sweep of expired sessions, whatever its outcome.
pub async fn split(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SplitRequest>,
) -> Result<Response, ApiError> {
    let result = run_split(&state, req).await;
    state.sweep_sessions().await;
    let output = result?;

    match &output {
        SplitOutput::Single(file) => info!(file = %file.name, "Returning single workbook"),
        SplitOutput::Archive { name, .. } => info!(file = %name, "Returning zip archive"),
    }

    let disposition =
        HeaderValue::from_str(&content_disposition(output.file_name())).map_err(ApiError::internal)?;
    let content_type = HeaderValue::from_static(output.content_type());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        output.into_bytes(),
    )
        .into_response())
}

async fn run_split(state: &AppState, req: SplitRequest) -> Result<SplitOutput, ApiError> {
    validate_selection(&req.sheets, state.config.max_sheets)?;

    // A live session wins over the client-supplied path.
    let session = req.session_id.as_deref().and_then(|id| state.registry.get(id));
    let (lease, path, filename) = match session {
        Some(session) => {
            let path = session.source_path.clone();
            let filename = session.original_filename.clone();
            (Some(session), path, filename)
        }
        None => {
            let path = req
                .temp_file
                .as_deref()
                .and_then(|temp_file| state.registry.resolve_upload_path(temp_file))
                .ok_or_else(|| ApiError::bad_request("File not found"))?;
            // The path may still back a registered session; lease it too.
            let lease = state.registry.lease_upload(&path);
            let filename = req
                .filename
                .clone()
                .filter(|name| !name.is_empty())
                .or_else(|| lease.as_ref().map(|s| s.original_filename.clone()))
                .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()))
                .unwrap_or_default();
            (lease, path, filename)
        }
    };
    if !path.is_file() {
        return Err(ApiError::bad_request("File not found"));
    }

    let base = naming::file_stem(&filename).to_string();
    let sheets = req.sheets;
    info!(file = %filename, sheets = ?sheets, "Split requested");

    let task = tokio::task::spawn_blocking(move || {
        // Held until extraction ends so a sweep cannot evict the source mid-read.
        let _lease = lease;
        let mut workbook = SourceWorkbook::open(&path)?;
        let extraction = extract(&mut workbook, &sheets, &base).require_output()?;
        archive::package(extraction, &base)
    });

    match tokio::time::timeout(state.config.split_budget, task).await {
        Ok(Ok(output)) => Ok(output?),
        Ok(Err(e)) => Err(ApiError::internal(e)),
        Err(_) => {
            warn!(budget_secs = state.config.split_budget.as_secs(), "Split exceeded its budget");
            Err(ApiError::Timeout)
        }
    }
}

/// `Content-Disposition` value with an ASCII fallback and, for non-ASCII
/// names, an RFC 5987 `filename*`.
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if fallback == filename {
        format!("attachment; filename=\"{}\"", filename)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            utf8_percent_encode(filename, FILENAME_STAR)
        )
    }
}
