//! HTTP client for the community catalog.
//!
//! Auth is anonymous via the `X-Device-Id` header (stable UUID from config).
//! Upload converges the local entry onto the server-assigned id: both the
//! plain success and the content-conflict answer carry the authoritative id,
//! and the local store is renamed to it either way, so repeated uploads of
//! the same content from any device end up under one server identity.

use reqwest::header::USER_AGENT;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::cache::CommunityCache;
use super::error::SyncError;
use crate::library::{Library, ThumbnailVariant};
use crate::models::{BrowseQuery, RemoteEntry};

/// Result of an upload: the authoritative server id, and whether the server
/// already had byte-identical content (the conflict/convergence path).
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub server_id: String,
    pub already_published: bool,
}

/// Result of a download-and-import.
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub local_id: String,
    pub already_present: bool,
}

/// One page of community browse results.
#[derive(Debug, Clone)]
pub struct BrowseResult {
    pub entries: Vec<RemoteEntry>,
    pub total: i64,
}

/// Unfiltered feed page as returned by the catalog.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedResponse {
    #[serde(default)]
    entries: Vec<RemoteEntry>,
    #[serde(default)]
    total: Option<i64>,
    #[serde(default)]
    deleted_ids: Vec<String>,
}

/// Entry count of the featured (most popular) storefront strip.
const FEATURED_PAGE_SIZE: u32 = 10;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConflictResponse {
    existing_id: String,
}

/// Client for the community catalog service.
pub struct SyncClient {
    http: reqwest::Client,
    base_url: String,
    device_id: String,
    library: Arc<Mutex<Library>>,
    cache: Mutex<CommunityCache>,
    cache_path: PathBuf,
}

impl SyncClient {
    /// Creates a client for the catalog at `base_url` (e.g.
    /// `https://api.example.com/v1/library`), loading any persisted cache.
    pub fn new(
        base_url: impl Into<String>,
        device_id: impl Into<String>,
        library: Arc<Mutex<Library>>,
        cache_path: PathBuf,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let cache = CommunityCache::load(&cache_path);
        Self {
            http: reqwest::Client::new(),
            base_url,
            device_id: device_id.into(),
            library,
            cache: Mutex::new(cache),
            cache_path,
        }
    }

    /// Catalog base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn user_agent() -> String {
        format!("deckshare/{}", env!("CARGO_PKG_VERSION"))
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header(USER_AGENT, Self::user_agent())
            .header("X-Device-Id", &self.device_id)
    }

    /// Extracts the `{"error": ...}` body of a failed response, falling back
    /// to the bare status line.
    async fn status_error(response: reqwest::Response) -> SyncError {
        let status = response.status().as_u16();
        let message = match response.json::<serde_json::Value>().await {
            Ok(body) => body
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("request failed")
                .to_string(),
            Err(_) => "request failed".to_string(),
        };
        SyncError::Status { status, message }
    }

    // --- Upload ---

    /// Publishes a local entry (plus any stored thumbnails) as one multipart
    /// body and renames the local entry to the server-assigned id.
    pub async fn upload(&self, entry_id: &str) -> Result<UploadOutcome, SyncError> {
        let (entry_json, thumbnail, thumbnail_compact) = {
            let library = self.library.lock().await;
            let json = library
                .export(entry_id)
                .ok_or_else(|| SyncError::NotFound(entry_id.to_string()))?;
            (
                json,
                library.read_thumbnail(entry_id, ThumbnailVariant::Full),
                library.read_thumbnail(entry_id, ThumbnailVariant::Compact),
            )
        };

        let mut form = Form::new().part(
            "entry",
            Part::bytes(entry_json)
                .file_name("entry.json")
                .mime_str("application/json")
                .map_err(SyncError::from_reqwest)?,
        );
        if let Some(png) = thumbnail {
            form = form.part(
                "thumbnail",
                Part::bytes(png)
                    .file_name("thumbnail.png")
                    .mime_str("image/png")
                    .map_err(SyncError::from_reqwest)?,
            );
        }
        if let Some(png) = thumbnail_compact {
            form = form.part(
                "thumbnail_compact",
                Part::bytes(png)
                    .file_name("thumbnail_compact.png")
                    .mime_str("image/png")
                    .map_err(SyncError::from_reqwest)?,
            );
        }

        tracing::debug!("Uploading entry {}", entry_id);
        let response = self
            .request(self.http.post(self.url("/entries")))
            .multipart(form)
            .send()
            .await
            .map_err(SyncError::from_reqwest)?;

        let (server_id, already_published) = if response.status() == StatusCode::CONFLICT {
            let body: ConflictResponse =
                response.json().await.map_err(SyncError::from_reqwest)?;
            tracing::debug!("Entry already published as {}", body.existing_id);
            (body.existing_id, true)
        } else if response.status().is_success() {
            let body: UploadResponse =
                response.json().await.map_err(SyncError::from_reqwest)?;
            (body.id, false)
        } else {
            return Err(Self::status_error(response).await);
        };

        // Converge the local identity onto the authoritative id.
        {
            let mut library = self.library.lock().await;
            if !library.rename(entry_id, &server_id) {
                return Err(SyncError::Persistence(format!(
                    "could not rename {} to server id {}",
                    entry_id, server_id
                )));
            }
        }

        Ok(UploadOutcome {
            server_id,
            already_published,
        })
    }

    // --- Browse ---

    /// Queries the community feed. Unfiltered first-page queries go through
    /// the delta cache; everything else is a transient full query.
    pub async fn browse(&self, query: &BrowseQuery) -> Result<BrowseResult, SyncError> {
        if query.is_delta() {
            self.browse_delta(query).await
        } else {
            self.browse_full(query).await
        }
    }

    /// The possibly-stale cached feed view, served without network I/O.
    pub async fn cached(&self) -> CommunityCache {
        self.cache.lock().await.clone()
    }

    async fn browse_delta(&self, query: &BrowseQuery) -> Result<BrowseResult, SyncError> {
        let since = self.cache.lock().await.newest_created_at;

        let mut params = Self::query_params(query);
        if let Some(watermark) = since {
            params.push(("since", watermark.to_rfc3339()));
        }

        let response = self
            .request(self.http.get(self.url("/entries")))
            .query(&params)
            .send()
            .await
            .map_err(SyncError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }
        let feed: FeedResponse = response.json().await.map_err(SyncError::from_reqwest)?;

        let mut cache = self.cache.lock().await;
        cache.remove(&feed.deleted_ids);
        cache.merge(feed.entries);
        if let Err(e) = cache.persist(&self.cache_path) {
            tracing::warn!("Failed to persist community cache: {}", e);
        }

        let total = feed.total.unwrap_or(cache.entries.len() as i64);
        Ok(BrowseResult {
            entries: cache.entries.clone(),
            total,
        })
    }

    async fn browse_full(&self, query: &BrowseQuery) -> Result<BrowseResult, SyncError> {
        let response = self
            .request(self.http.get(self.url("/entries")))
            .query(&Self::query_params(query))
            .send()
            .await
            .map_err(SyncError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }
        let feed: FeedResponse = response.json().await.map_err(SyncError::from_reqwest)?;

        // Tombstones are authoritative whichever mode reported them; the
        // results themselves stay transient and are never merged.
        if !feed.deleted_ids.is_empty() {
            let mut cache = self.cache.lock().await;
            cache.remove(&feed.deleted_ids);
            if let Err(e) = cache.persist(&self.cache_path) {
                tracing::warn!("Failed to persist community cache: {}", e);
            }
        }

        let total = feed.total.unwrap_or(feed.entries.len() as i64);
        Ok(BrowseResult {
            entries: feed.entries,
            total,
        })
    }

    fn query_params(query: &BrowseQuery) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(kind) = query.kind {
            params.push(("type", kind.to_string()));
        }
        if let Some(v) = query.variable.as_deref().filter(|v| !v.is_empty()) {
            params.push(("variable", v.to_string()));
        }
        if let Some(a) = query.action.as_deref().filter(|a| !a.is_empty()) {
            params.push(("action", a.to_string()));
        }
        if let Some(s) = query.search.as_deref().filter(|s| !s.is_empty()) {
            params.push(("search", s.to_string()));
        }
        if let Some(sort) = query.sort.as_deref().filter(|s| !s.is_empty()) {
            params.push(("sort", sort.to_string()));
        }
        if query.mine {
            // The catalog resolves "mine" against the X-Device-Id header.
            params.push(("device_id", "mine".to_string()));
        }
        params.push(("page", query.page.max(1).to_string()));
        if let Some(per_page) = query.per_page {
            params.push(("per_page", per_page.to_string()));
        }
        params
    }

    /// One page of the entries this device published. The result is what the
    /// remote delete operation enumerates against.
    pub async fn my_uploads(&self, page: u32) -> Result<BrowseResult, SyncError> {
        self.browse(&BrowseQuery {
            mine: true,
            page,
            ..Default::default()
        })
        .await
    }

    /// Short most-downloaded list for the storefront view.
    pub async fn featured(&self) -> Result<BrowseResult, SyncError> {
        self.browse(&BrowseQuery {
            sort: Some("popular".to_string()),
            per_page: Some(FEATURED_PAGE_SIZE),
            page: 1,
            ..Default::default()
        })
        .await
    }

    // --- Download ---

    /// Fetches a community entry and imports it into the local library.
    ///
    /// Short-circuits when the id is already present locally instead of
    /// importing a duplicate.
    pub async fn download(&self, server_id: &str) -> Result<DownloadOutcome, SyncError> {
        {
            let library = self.library.lock().await;
            if library.get(server_id).is_some() {
                tracing::debug!("Entry {} already in local library", server_id);
                return Ok(DownloadOutcome {
                    local_id: server_id.to_string(),
                    already_present: true,
                });
            }
        }

        let response = self
            .request(self.http.get(self.url(&format!("/entries/{}", server_id))))
            .send()
            .await
            .map_err(SyncError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }
        let bytes = response.bytes().await.map_err(SyncError::from_reqwest)?;

        let local_id = {
            let mut library = self.library.lock().await;
            library.import(&bytes).ok_or(SyncError::Import)?
        };
        tracing::debug!("Downloaded {} imported as {}", server_id, local_id);

        self.record_download(server_id);

        Ok(DownloadOutcome {
            local_id,
            already_present: false,
        })
    }

    /// Fire-and-forget download acknowledgment. Its failure must never fail
    /// the user-visible download.
    fn record_download(&self, server_id: &str) {
        let request = self
            .request(
                self.http
                    .post(self.url(&format!("/entries/{}/download", server_id))),
            )
            .json(&serde_json::json!({}));
        tokio::spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => tracing::debug!(
                    "Failed to record download (non-critical): status {}",
                    response.status()
                ),
                Err(e) => tracing::debug!("Failed to record download (non-critical): {}", e),
            }
        });
    }

    // --- Delete ---

    /// Deletes an own entry from the catalog and purges it from the cache.
    pub async fn delete(&self, server_id: &str) -> Result<(), SyncError> {
        let response = self
            .request(
                self.http
                    .delete(self.url(&format!("/entries/{}", server_id))),
            )
            .send()
            .await
            .map_err(SyncError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let mut cache = self.cache.lock().await;
        cache.remove(&[server_id.to_string()]);
        if let Err(e) = cache.persist(&self.cache_path) {
            tracing::warn!("Failed to persist community cache: {}", e);
        }
        tracing::debug!("Deleted server entry {}", server_id);
        Ok(())
    }

    // --- Flag ---

    /// Reports an entry for moderation. Fire-and-forget: failures are only
    /// logged.
    pub async fn flag(&self, server_id: &str, reason: &str) {
        let result = self
            .request(
                self.http
                    .post(self.url(&format!("/entries/{}/flag", server_id))),
            )
            .json(&serde_json::json!({ "reason": reason }))
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Flagged entry {}", server_id);
            }
            Ok(response) => {
                tracing::warn!("Flag failed: status {}", response.status());
            }
            Err(e) => {
                tracing::warn!("Flag failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entry, EntryKind};
    use axum::extract::State;
    use axum::routing::{delete as axum_delete, get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    fn test_state(temp: &TempDir) -> (Arc<Mutex<Library>>, PathBuf) {
        let library = Arc::new(Mutex::new(Library::open(temp.path().join("library"))));
        let cache_path = temp.path().join("community_cache.json");
        (library, cache_path)
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_base_url_trimmed() {
        let temp = TempDir::new().unwrap();
        let (library, cache_path) = test_state(&temp);
        let client = SyncClient::new("http://localhost:9/v1/library/", "dev", library, cache_path);
        assert_eq!(client.base_url(), "http://localhost:9/v1/library");
        assert_eq!(
            client.url("/entries/x/flag"),
            "http://localhost:9/v1/library/entries/x/flag"
        );
    }

    #[test]
    fn test_query_params_skip_empty_filters() {
        let query = BrowseQuery {
            kind: Some(EntryKind::Item),
            variable: Some(String::new()),
            search: Some("clock".into()),
            sort: Some("newest".into()),
            page: 0,
            ..Default::default()
        };
        let params = SyncClient::query_params(&query);
        assert!(params.contains(&("type", "item".to_string())));
        assert!(params.contains(&("search", "clock".to_string())));
        assert!(params.contains(&("page", "1".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "variable"));
        assert!(!params.iter().any(|(k, _)| *k == "device_id"));
        assert!(!params.iter().any(|(k, _)| *k == "per_page"));
    }

    #[test]
    fn test_query_params_mine_and_page_size() {
        let query = BrowseQuery {
            mine: true,
            sort: Some("popular".into()),
            page: 1,
            per_page: Some(10),
            ..Default::default()
        };
        let params = SyncClient::query_params(&query);
        assert!(params.contains(&("device_id", "mine".to_string())));
        assert!(params.contains(&("per_page", "10".to_string())));
        assert!(params.contains(&("sort", "popular".to_string())));
    }

    /// Catalog stub that assigns ids by payload content: first sighting gets
    /// a fresh id via 200, any repeat answers 409 with the existing id.
    fn upload_stub() -> Router {
        type Seen = Arc<StdMutex<HashMap<String, String>>>;

        async fn entries(State(seen): State<Seen>, body: axum::body::Bytes) -> axum::response::Response {
            // Single-part multipart body: the entry JSON sits between the
            // part headers and the closing boundary.
            let text = String::from_utf8_lossy(&body);
            let start = text.find("\r\n\r\n").unwrap() + 4;
            let end = text[start..].find("\r\n--").unwrap() + start;
            let entry: serde_json::Value = serde_json::from_str(&text[start..end]).unwrap();
            let key = entry["data"].to_string();

            let mut seen = seen.lock().unwrap();
            if let Some(existing) = seen.get(&key) {
                let body = Json(json!({ "existingId": existing }));
                (StatusCode::CONFLICT, body).into_response()
            } else {
                let id = format!("srv-{}", seen.len() + 1);
                seen.insert(key, id.clone());
                Json(json!({ "id": id })).into_response()
            }
        }

        use axum::response::IntoResponse;
        let seen: Seen = Arc::new(StdMutex::new(HashMap::new()));
        Router::new()
            .route("/entries", post(entries))
            .with_state(seen)
    }

    #[tokio::test]
    async fn test_upload_convergence_across_stores() {
        let base = serve(upload_stub()).await;

        // Two independent stores with byte-identical payloads.
        let temp1 = TempDir::new().unwrap();
        let temp2 = TempDir::new().unwrap();
        let (library1, cache1) = test_state(&temp1);
        let (library2, cache2) = test_state(&temp2);

        let data = json!({"content": "%TEMP%", "color": "#abc"});
        let entry1 = Entry::new(EntryKind::Item, data.clone(), vec![]);
        let entry2 = Entry::new(EntryKind::Item, data, vec![]);
        library1.lock().await.save(&entry1).unwrap();
        library2.lock().await.save(&entry2).unwrap();

        let client1 = SyncClient::new(base.clone(), "device-1", library1.clone(), cache1);
        let client2 = SyncClient::new(base, "device-2", library2.clone(), cache2);

        let first = client1.upload(&entry1.id).await.unwrap();
        let second = client2.upload(&entry2.id).await.unwrap();

        assert!(!first.already_published);
        assert!(second.already_published);
        assert_eq!(first.server_id, second.server_id);

        // Both stores converged onto the one server identity.
        assert!(library1.lock().await.read(&first.server_id).is_some());
        assert!(library2.lock().await.read(&first.server_id).is_some());
        assert!(library1.lock().await.read(&entry1.id).is_none());
        assert!(library2.lock().await.read(&entry2.id).is_none());
    }

    #[tokio::test]
    async fn test_upload_missing_entry() {
        let temp = TempDir::new().unwrap();
        let (library, cache_path) = test_state(&temp);
        let client = SyncClient::new("http://127.0.0.1:9", "dev", library, cache_path);

        let err = client.upload("ghost").await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_download_short_circuits_when_present() {
        let temp = TempDir::new().unwrap();
        let (library, cache_path) = test_state(&temp);
        let entry = Entry::new(EntryKind::Zone, json!({"items": []}), vec![]);
        library.lock().await.save(&entry).unwrap();

        // Unreachable base URL: the short-circuit must not touch the network.
        let client = SyncClient::new("http://127.0.0.1:9", "dev", library, cache_path);
        let outcome = client.download(&entry.id).await.unwrap();
        assert!(outcome.already_present);
        assert_eq!(outcome.local_id, entry.id);
    }

    #[tokio::test]
    async fn test_download_imports_and_acknowledges() {
        use axum::response::IntoResponse;
        type Acks = Arc<StdMutex<usize>>;

        async fn entry_by_id() -> impl IntoResponse {
            Json(json!({
                "id": "srv-9",
                "type": "layout",
                "createdAt": "2024-01-05T00:00:00Z",
                "data": {"zones": {}}
            }))
        }
        async fn ack(State(acks): State<Acks>) -> impl IntoResponse {
            *acks.lock().unwrap() += 1;
            Json(json!({}))
        }

        let acks: Acks = Arc::new(StdMutex::new(0));
        let router = Router::new()
            .route("/entries/{id}", get(entry_by_id))
            .route("/entries/{id}/download", post(ack))
            .with_state(acks.clone());
        let base = serve(router).await;

        let temp = TempDir::new().unwrap();
        let (library, cache_path) = test_state(&temp);
        let client = SyncClient::new(base, "dev", library.clone(), cache_path);

        let outcome = client.download("srv-9").await.unwrap();
        assert!(!outcome.already_present);
        assert_eq!(outcome.local_id, "srv-9");

        let imported = library.lock().await.read("srv-9").unwrap();
        assert!(imported.imported_at.is_some());

        // The spawned acknowledgment lands shortly after the download.
        for _ in 0..50 {
            if *acks.lock().unwrap() > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(*acks.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_browse_delta_merges_and_applies_tombstones() {
        use axum::extract::Query;
        use axum::response::IntoResponse;

        async fn feed(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
            // First fetch has no watermark; the second asks since=... and
            // gets one newer entry plus a tombstone.
            if params.contains_key("since") {
                Json(json!({
                    "entries": [{
                        "id": "D",
                        "type": "item",
                        "createdAt": "2024-01-02T00:00:00Z",
                        "data": {}
                    }],
                    "total": 3,
                    "deletedIds": ["B"]
                }))
            } else {
                Json(json!({
                    "entries": [
                        {"id": "A", "type": "item", "createdAt": "2024-01-01T00:00:00Z", "data": {}},
                        {"id": "B", "type": "item", "createdAt": "2023-12-30T00:00:00Z", "data": {}},
                        {"id": "C", "type": "item", "createdAt": "2023-12-29T00:00:00Z", "data": {}}
                    ],
                    "total": 3,
                    "deletedIds": []
                }))
            }
        }

        let base = serve(Router::new().route("/entries", get(feed))).await;
        let temp = TempDir::new().unwrap();
        let (library, cache_path) = test_state(&temp);
        let client = SyncClient::new(base, "dev", library, cache_path.clone());

        let query = BrowseQuery::default();
        let first = client.browse(&query).await.unwrap();
        assert_eq!(first.entries.len(), 3);

        let second = client.browse(&query).await.unwrap();
        let ids: Vec<&str> = second.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["D", "A", "C"]);

        // Merged state survived persistence.
        let cache = CommunityCache::load(&cache_path);
        assert_eq!(cache.entries.len(), 3);
        assert_eq!(
            cache.newest_created_at.unwrap().to_rfc3339(),
            "2024-01-02T00:00:00+00:00"
        );
    }

    #[tokio::test]
    async fn test_browse_full_mode_never_merges() {
        use axum::response::IntoResponse;

        async fn feed() -> impl IntoResponse {
            Json(json!({
                "entries": [
                    {"id": "X", "type": "theme", "createdAt": "2024-02-01T00:00:00Z", "data": {}}
                ],
                "total": 41
            }))
        }

        let base = serve(Router::new().route("/entries", get(feed))).await;
        let temp = TempDir::new().unwrap();
        let (library, cache_path) = test_state(&temp);
        let client = SyncClient::new(base, "dev", library, cache_path);

        let query = BrowseQuery {
            kind: Some(EntryKind::Theme),
            ..Default::default()
        };
        let result = client.browse(&query).await.unwrap();
        assert_eq!(result.total, 41);
        assert_eq!(result.entries.len(), 1);

        // Transient: nothing entered the cache.
        assert!(client.cached().await.entries.is_empty());
    }

    #[tokio::test]
    async fn test_my_uploads_scoped_to_device() {
        use axum::extract::Query;
        use axum::response::IntoResponse;

        // Answers one entry only for own-uploads queries.
        async fn feed(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
            if params.get("device_id").map(String::as_str) == Some("mine") {
                Json(json!({
                    "entries": [{
                        "id": "own-1",
                        "type": "layout",
                        "createdAt": "2024-03-01T00:00:00Z",
                        "data": {}
                    }],
                    "total": 1
                }))
            } else {
                Json(json!({ "entries": [], "total": 0 }))
            }
        }

        let base = serve(Router::new().route("/entries", get(feed))).await;
        let temp = TempDir::new().unwrap();
        let (library, cache_path) = test_state(&temp);
        let client = SyncClient::new(base, "dev", library, cache_path);

        let result = client.my_uploads(1).await.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.entries[0].id, "own-1");

        // Own-uploads pages are transient, never merged into the feed cache.
        assert!(client.cached().await.entries.is_empty());
    }

    #[tokio::test]
    async fn test_featured_requests_popular_short_page() {
        use axum::extract::Query;
        use axum::response::IntoResponse;

        async fn feed(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
            assert_eq!(params.get("sort").map(String::as_str), Some("popular"));
            assert_eq!(params.get("per_page").map(String::as_str), Some("10"));
            Json(json!({
                "entries": [{
                    "id": "hot-1",
                    "type": "item",
                    "createdAt": "2024-03-01T00:00:00Z",
                    "data": {},
                    "downloads": 120
                }],
                "total": 57
            }))
        }

        let base = serve(Router::new().route("/entries", get(feed))).await;
        let temp = TempDir::new().unwrap();
        let (library, cache_path) = test_state(&temp);
        let client = SyncClient::new(base, "dev", library, cache_path);

        let result = client.featured().await.unwrap();
        assert_eq!(result.total, 57);
        assert_eq!(result.entries[0].downloads, Some(120));
        assert!(client.cached().await.entries.is_empty());
    }

    #[tokio::test]
    async fn test_delete_purges_cache() {
        use axum::response::IntoResponse;

        async fn ok() -> impl IntoResponse {
            Json(json!({"success": true}))
        }

        let base = serve(Router::new().route("/entries/{id}", axum_delete(ok))).await;
        let temp = TempDir::new().unwrap();
        let (library, cache_path) = test_state(&temp);

        // Pre-seed a cache containing the entry being deleted.
        let cache = CommunityCache {
            newest_created_at: Some("2024-01-01T00:00:00Z".parse().unwrap()),
            entries: vec![RemoteEntry {
                id: "gone".into(),
                kind: EntryKind::Item,
                created_at: "2024-01-01T00:00:00Z".parse().unwrap(),
                tags: vec![],
                data: json!({}),
                downloads: None,
            }],
        };
        cache.persist(&cache_path).unwrap();

        let client = SyncClient::new(base, "dev", library, cache_path.clone());
        client.delete("gone").await.unwrap();

        assert!(client.cached().await.entries.is_empty());
        assert!(CommunityCache::load(&cache_path).entries.is_empty());
    }
}
