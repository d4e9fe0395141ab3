use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::AppState;
use crate::capture::AuthCookie;
use crate::constants::{INDEX_FILE, SERVICE_VERSION};
use crate::fs_utils::resolve_within;
use crate::normalize::is_snapshot_id;
use crate::snapshot::{BatchRequest, SnapshotError, SnapshotRequest, SnapshotSummary};

/// Create the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/cache", post(cache))
        .route("/api/cache/batch", post(cache_batch))
        .route("/api/check/*url", get(check))
        .route("/api/content/:hash", get(content))
        .route("/api/inspect/:hash", get(inspect))
        .route("/cached/:hash", get(serve_snapshot_root))
        .route("/cached/:hash/", get(serve_snapshot_root))
        .route("/cached/:hash/*path", get(serve_snapshot_file))
}

async fn health() -> Response {
    Json(json!({
        "status": "ok",
        "version": SERVICE_VERSION,
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response()
}

// ========== Capture ==========

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheRequest {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    max_depth: Option<u32>,
    #[serde(default)]
    cookies: Vec<AuthCookie>,
}

#[derive(Debug, Serialize)]
struct CacheStats {
    pages: usize,
    assets: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheResponse {
    success: bool,
    message: String,
    cache_hash: String,
    url: String,
    stats: CacheStats,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<crate::store::PageError>,
}

impl From<SnapshotSummary> for CacheResponse {
    fn from(summary: SnapshotSummary) -> Self {
        let message = if summary.reused {
            "Existing snapshot reused".to_string()
        } else if summary.is_partial() {
            format!("Cached with {} page error(s)", summary.errors.len())
        } else {
            "Cached successfully".to_string()
        };
        Self {
            success: true,
            message,
            cache_hash: summary.cache_hash,
            url: summary.url,
            stats: CacheStats {
                pages: summary.pages,
                assets: summary.assets,
            },
            errors: summary.errors,
        }
    }
}

fn snapshot_error_response(error: &SnapshotError) -> Response {
    let status = match error {
        SnapshotError::Input(_) => StatusCode::BAD_REQUEST,
        SnapshotError::Blocked { .. } => StatusCode::BAD_GATEWAY,
        SnapshotError::NoContent { .. } | SnapshotError::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(json!({
            "success": false,
            "error": error.to_string(),
            "blocked": error.is_blocked(),
        })),
    )
        .into_response()
}

/// 400 with the `{success, error}` body every capture endpoint returns.
fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "error": message.into(), "blocked": false })),
    )
        .into_response()
}

fn json_rejection_response(rejection: &JsonRejection) -> Response {
    tracing::debug!(status = %rejection.status(), "Rejected request body: {rejection}");
    bad_request(format!("Invalid request body: {}", rejection.body_text()))
}

async fn cache(
    State(state): State<AppState>,
    body: Result<Json<CacheRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return json_rejection_response(&rejection),
    };
    let request = SnapshotRequest {
        url: request.url.unwrap_or_default(),
        max_depth: request.max_depth,
        cookies: request.cookies,
    };

    match state.engine.snapshot(request).await {
        Ok(summary) => Json(CacheResponse::from(summary)).into_response(),
        Err(e) => {
            if !e.is_input() {
                tracing::error!(error = %e, "Snapshot failed");
            }
            snapshot_error_response(&e)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheBatchRequest {
    #[serde(default)]
    urls: Vec<String>,
    #[serde(default)]
    max_depth: Option<u32>,
    #[serde(default)]
    concurrency: Option<usize>,
}

async fn cache_batch(
    State(state): State<AppState>,
    body: Result<Json<CacheBatchRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return json_rejection_response(&rejection),
    };
    if request.urls.is_empty() {
        return bad_request("urls must be a non-empty array");
    }

    let report = state
        .engine
        .snapshot_batch(BatchRequest {
            urls: request.urls,
            max_depth: request.max_depth,
            concurrency: request.concurrency,
        })
        .await;

    Json(json!({
        "success": true,
        "totalUrls": report.total,
        "successful": report.successful.len(),
        "failed": report.failed.len(),
        "results": report.successful,
        "errors": report.failed,
    }))
    .into_response()
}

// ========== Lookup ==========

async fn check(State(state): State<AppState>, Path(url): Path<String>) -> Response {
    match state.engine.check(&url).await {
        Ok((cache_hash, manifest)) => Json(json!({
            "cached": manifest.is_some(),
            "cacheHash": cache_hash,
            "manifest": manifest,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(url = %url, "Failed to read manifest: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read manifest").into_response()
        }
    }
}

async fn content(State(state): State<AppState>, Path(hash): Path<String>) -> Response {
    if !is_snapshot_id(&hash) {
        return not_found();
    }
    match state.engine.content(&hash).await {
        Ok(Some((markup, manifest))) => Json(json!({
            "success": true,
            "url": manifest.url,
            "content": markup,
            "manifest": manifest,
        }))
        .into_response(),
        Ok(None) => not_found(),
        Err(e) => {
            tracing::error!(cache_hash = %hash, "Failed to read snapshot: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read snapshot").into_response()
        }
    }
}

async fn inspect(State(state): State<AppState>, Path(hash): Path<String>) -> Response {
    if !is_snapshot_id(&hash) {
        return not_found();
    }
    match state.engine.inspect(&hash).await {
        Ok(Some(report)) => Json(report).into_response(),
        Ok(None) => not_found(),
        Err(e) => {
            tracing::error!(cache_hash = %hash, "Failed to inspect snapshot: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to inspect snapshot").into_response()
        }
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "error": "Cache not found" })),
    )
        .into_response()
}

// ========== Snapshot File Serving ==========

async fn serve_snapshot_root(State(state): State<AppState>, Path(hash): Path<String>) -> Response {
    serve_from_snapshot(&state, &hash, "").await
}

async fn serve_snapshot_file(
    State(state): State<AppState>,
    Path((hash, path)): Path<(String, String)>,
) -> Response {
    serve_from_snapshot(&state, &hash, &path).await
}

async fn serve_from_snapshot(state: &AppState, hash: &str, path: &str) -> Response {
    if !is_snapshot_id(hash) {
        return (StatusCode::NOT_FOUND, "File not found").into_response();
    }
    let root = state.engine.snapshot_dir(hash);

    let Some(mut file_path) = resolve_within(&root, path) else {
        tracing::warn!(cache_hash = %hash, path = %path, "Rejected path outside snapshot");
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    };

    if tokio::fs::metadata(&file_path)
        .await
        .is_ok_and(|m| m.is_dir())
    {
        file_path = file_path.join(INDEX_FILE);
    }

    let content = match tokio::fs::read(&file_path).await {
        Ok(bytes) => bytes,
        Err(_) => return (StatusCode::NOT_FOUND, "File not found").into_response(),
    };

    let mime_type = mime_guess::from_path(&file_path)
        .first_or_octet_stream()
        .to_string();

    // For HTML files, ensure charset is set
    let final_content_type = if mime_type.starts_with("text/html") {
        "text/html; charset=utf-8"
    } else {
        &mime_type
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, final_content_type)],
        content,
    )
        .into_response()
}
