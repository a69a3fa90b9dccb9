//! Bridge router and handlers.
//!
//! Responses are JSON throughout; failures carry an `{"error": ...}` body
//! with a matching status code. Community routes answer 503 when no catalog
//! client is configured.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::library::{Library, ThumbnailVariant};
use crate::models::{BrowseQuery, Entry, EntryKind};
use crate::sync::{SyncClient, SyncError};

/// State shared across bridge handlers.
#[derive(Clone)]
pub struct AppState {
    pub library: Arc<Mutex<Library>>,
    /// Absent when the app runs without a community catalog configured.
    pub sync: Option<Arc<SyncClient>>,
}

/// Builds the bridge router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/library/entries", get(list_entries))
        .route("/api/library/entries/{id}", get(get_entry))
        .route("/api/library/entries/{id}/thumbnail", get(get_thumbnail))
        .route("/api/library/save-item", post(save_item))
        .route("/api/library/save-zone", post(save_zone))
        .route("/api/library/save-layout", post(save_layout))
        .route("/api/library/save-theme", post(save_theme))
        .route("/api/library/update", post(update_entry))
        .route("/api/library/apply", post(apply_entry))
        .route("/api/library/delete", post(delete_entry))
        .route("/api/community/browse", get(browse))
        .route("/api/community/cached", get(cached))
        .route("/api/community/upload", post(upload))
        .route("/api/community/download", post(download))
        .route("/api/community/delete", post(community_delete))
        .route("/api/community/flag", post(flag))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn sync_or_unavailable(state: &AppState) -> Result<Arc<SyncClient>, Response> {
    state.sync.clone().ok_or_else(|| {
        error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Community sharing not available",
        )
    })
}

fn sync_error_response(e: SyncError) -> Response {
    let status = match &e {
        SyncError::NotFound(_) => StatusCode::NOT_FOUND,
        SyncError::Status { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        SyncError::Network(_) | SyncError::Import => StatusCode::BAD_GATEWAY,
        SyncError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

// --- Health ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// --- Library: listing and reads ---

#[derive(Deserialize, Default)]
struct ListParams {
    #[serde(rename = "type")]
    kind: Option<String>,
}

async fn list_entries(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    let kind = match params.kind.as_deref().filter(|k| !k.is_empty()) {
        Some(raw) => match EntryKind::from_str(raw) {
            Ok(kind) => Some(kind),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
        },
        None => None,
    };

    let library = state.library.lock().await;
    let entries: Vec<_> = match kind {
        Some(kind) => library
            .entries_by_kind(kind)
            .into_iter()
            .cloned()
            .collect(),
        None => library.entries().to_vec(),
    };
    Json(json!({ "entries": entries })).into_response()
}

async fn get_entry(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let library = state.library.lock().await;
    match library.read(&id) {
        Some(entry) => Json(entry).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Entry not found"),
    }
}

#[derive(Deserialize, Default)]
struct ThumbnailParams {
    variant: Option<String>,
}

async fn get_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ThumbnailParams>,
) -> Response {
    let variant = match params.variant.as_deref() {
        None | Some("") | Some("full") => ThumbnailVariant::Full,
        Some("compact") => ThumbnailVariant::Compact,
        Some(other) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Unknown thumbnail variant '{}'", other),
            )
        }
    };

    let library = state.library.lock().await;
    match library.read_thumbnail(&id, variant) {
        Some(png) => (
            [(header::CONTENT_TYPE, "image/png")],
            Bytes::from(png),
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Thumbnail not found"),
    }
}

// --- Library: saves ---

#[derive(Deserialize)]
struct SaveRequest {
    data: serde_json::Value,
    #[serde(default)]
    tags: Vec<String>,
}

async fn save_item(state: State<AppState>, body: Json<SaveRequest>) -> Response {
    save_entry(state, EntryKind::Item, body).await
}

async fn save_zone(state: State<AppState>, body: Json<SaveRequest>) -> Response {
    save_entry(state, EntryKind::Zone, body).await
}

async fn save_layout(state: State<AppState>, body: Json<SaveRequest>) -> Response {
    save_entry(state, EntryKind::Layout, body).await
}

async fn save_theme(state: State<AppState>, body: Json<SaveRequest>) -> Response {
    save_entry(state, EntryKind::Theme, body).await
}

async fn save_entry(
    State(state): State<AppState>,
    kind: EntryKind,
    Json(request): Json<SaveRequest>,
) -> Response {
    if request.data.is_null() {
        return error_response(StatusCode::BAD_REQUEST, "Missing data payload");
    }

    let entry = Entry::new(kind, request.data, request.tags);
    let mut library = state.library.lock().await;
    match library.save(&entry) {
        Some(id) => Json(json!({ "success": true, "entryId": id })).into_response(),
        None => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to save entry",
        ),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest {
    entry_id: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Metadata edit: overwrites the payload and/or tags of an existing entry
/// in place, keeping its id and creation timestamp (e.g. renaming a theme,
/// whose name lives inside the payload).
async fn update_entry(
    State(state): State<AppState>,
    Json(request): Json<UpdateRequest>,
) -> Response {
    if request.data.is_none() && request.tags.is_none() {
        return error_response(StatusCode::BAD_REQUEST, "Nothing to update");
    }
    if let Some(data) = &request.data {
        if data.is_null() {
            return error_response(StatusCode::BAD_REQUEST, "Missing data payload");
        }
    }

    let mut library = state.library.lock().await;
    let mut entry = match library.read(&request.entry_id) {
        Some(entry) => entry,
        None => return error_response(StatusCode::NOT_FOUND, "Entry not found"),
    };
    if let Some(data) = request.data {
        entry.data = data;
    }
    if let Some(tags) = request.tags {
        entry.tags = tags;
    }

    match library.save(&entry) {
        Some(id) => Json(json!({ "success": true, "entryId": id })).into_response(),
        None => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to save entry",
        ),
    }
}

// --- Library: apply and delete ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyRequest {
    entry_id: String,
    #[serde(default)]
    zone: Option<String>,
}

/// Hands the entry document back to the caller; interpreting the payload
/// (placing items, activating a theme) is the presentation layer's job.
async fn apply_entry(
    State(state): State<AppState>,
    Json(request): Json<ApplyRequest>,
) -> Response {
    let library = state.library.lock().await;
    match library.read(&request.entry_id) {
        Some(entry) => Json(json!({
            "success": true,
            "entry": entry,
            "zone": request.zone,
        }))
        .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Entry not found"),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryIdRequest {
    entry_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerIdRequest {
    server_id: String,
}

async fn delete_entry(
    State(state): State<AppState>,
    Json(request): Json<EntryIdRequest>,
) -> Response {
    let mut library = state.library.lock().await;
    if library.delete(&request.entry_id) {
        Json(json!({ "success": true })).into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, "Entry not found")
    }
}

// --- Community ---

#[derive(Deserialize, Default)]
struct BrowseParams {
    #[serde(rename = "type")]
    kind: Option<String>,
    variable: Option<String>,
    action: Option<String>,
    search: Option<String>,
    sort: Option<String>,
    page: Option<u32>,
    mine: Option<bool>,
    #[serde(rename = "perPage")]
    per_page: Option<u32>,
}

async fn browse(
    State(state): State<AppState>,
    Query(params): Query<BrowseParams>,
) -> Response {
    let sync = match sync_or_unavailable(&state) {
        Ok(sync) => sync,
        Err(response) => return response,
    };

    let kind = match params.kind.as_deref().filter(|k| !k.is_empty()) {
        Some(raw) => match EntryKind::from_str(raw) {
            Ok(kind) => Some(kind),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
        },
        None => None,
    };
    let query = BrowseQuery {
        kind,
        variable: params.variable,
        action: params.action,
        search: params.search,
        sort: params.sort,
        page: params.page.unwrap_or(1),
        mine: params.mine.unwrap_or(false),
        per_page: params.per_page,
    };

    match sync.browse(&query).await {
        Ok(result) => Json(json!({
            "entries": result.entries,
            "total": result.total,
        }))
        .into_response(),
        Err(e) => sync_error_response(e),
    }
}

/// The possibly-stale cached feed, served without touching the network so
/// the UI can paint immediately while a browse is in flight.
async fn cached(State(state): State<AppState>) -> Response {
    let sync = match sync_or_unavailable(&state) {
        Ok(sync) => sync,
        Err(response) => return response,
    };
    Json(sync.cached().await).into_response()
}

async fn upload(
    State(state): State<AppState>,
    Json(request): Json<EntryIdRequest>,
) -> Response {
    let sync = match sync_or_unavailable(&state) {
        Ok(sync) => sync,
        Err(response) => return response,
    };

    match sync.upload(&request.entry_id).await {
        Ok(outcome) => Json(json!({
            "success": true,
            "serverId": outcome.server_id,
            "alreadyPublished": outcome.already_published,
        }))
        .into_response(),
        Err(e) => sync_error_response(e),
    }
}

async fn download(
    State(state): State<AppState>,
    Json(request): Json<ServerIdRequest>,
) -> Response {
    let sync = match sync_or_unavailable(&state) {
        Ok(sync) => sync,
        Err(response) => return response,
    };

    match sync.download(&request.server_id).await {
        Ok(outcome) => Json(json!({
            "success": true,
            "localEntryId": outcome.local_id,
            "alreadyPresent": outcome.already_present,
        }))
        .into_response(),
        Err(e) => sync_error_response(e),
    }
}

async fn community_delete(
    State(state): State<AppState>,
    Json(request): Json<ServerIdRequest>,
) -> Response {
    let sync = match sync_or_unavailable(&state) {
        Ok(sync) => sync,
        Err(response) => return response,
    };

    match sync.delete(&request.server_id).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => sync_error_response(e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlagRequest {
    server_id: String,
    #[serde(default)]
    reason: Option<String>,
}

async fn flag(State(state): State<AppState>, Json(request): Json<FlagRequest>) -> Response {
    let sync = match sync_or_unavailable(&state) {
        Ok(sync) => sync,
        Err(response) => return response,
    };

    let reason = request.reason.as_deref().unwrap_or("inappropriate");
    sync.flag(&request.server_id, reason).await;
    Json(json!({ "success": true })).into_response()
}
