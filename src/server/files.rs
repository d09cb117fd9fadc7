//! `/edition/{session}/...` - the session file API

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::session::SessionSandbox;

use super::error::ApiErr;
use super::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WriteQuery {
    /// Byte offset of the payload
    pub start: u64,
    /// `1` resets the file first; only valid with `start=0`
    pub truncate: u8,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

async fn open_sandbox(
    state: &AppState,
    headers: &HeaderMap,
    session: &str,
) -> Result<SessionSandbox, ApiErr> {
    Ok(state.files.open(bearer_token(headers), session).await?)
}

/// GET /edition/{session}/list
pub async fn list_files(
    State(state): State<AppState>,
    Path(session): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<String>>, ApiErr> {
    let sandbox = open_sandbox(&state, &headers, &session).await?;
    Ok(Json(sandbox.list().await?))
}

/// GET /edition/{session}/file/{*path} - streamed as opaque bytes
pub async fn read_file(
    State(state): State<AppState>,
    Path((session, path)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiErr> {
    let sandbox = open_sandbox(&state, &headers, &session).await?;
    let file = sandbox
        .read(&path)
        .await?
        .ok_or_else(|| ApiErr::not_found("file not found"))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

/// PUT /edition/{session}/file/{*path}?start=N&truncate=0|1
pub async fn write_file(
    State(state): State<AppState>,
    Path((session, path)): Path<(String, String)>,
    Query(query): Query<WriteQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiErr> {
    let sandbox = open_sandbox(&state, &headers, &session).await?;
    sandbox
        .write(&path, &body, query.start, query.truncate == 1)
        .await?;
    Ok(StatusCode::OK)
}

/// DELETE /edition/{session}/file/{*path}
pub async fn delete_file(
    State(state): State<AppState>,
    Path((session, path)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiErr> {
    let sandbox = open_sandbox(&state, &headers, &session).await?;
    if sandbox.delete(&path).await? {
        Ok(StatusCode::OK)
    } else {
        Err(ApiErr::not_found("file not found"))
    }
}
