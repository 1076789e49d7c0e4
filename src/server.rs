//! HTTP API server.
//!
//! Thin orchestration over the stores: every handler reads what it needs
//! from disk, calls into the core, and maps [`NavError`] onto a JSON error
//! body. The built front end and uploaded images are served statically.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `GET`  | `/api/users/verify` | yes | Token check |
//! | `POST` | `/api/contents/get` | no | Dataset, settings, tags, search, counters, layout |
//! | `POST` | `/api/contents/update` | yes | Write settings, dataset, or a raw file |
//! | `POST` | `/api/contents/create` | yes | Upload a base64 file |
//! | `POST` | `/api/spider` | no | Liveness crawl, streamed as chunked JSON |
//! | `POST` | `/api/collect/get` | yes | List collected items |
//! | `POST` | `/api/collect/delete` | yes | Delete collected items |
//! | `POST` | `/api/collect/save` | no | Collect an item |
//! | `POST` | `/api/web/info` | no | Scrape page metadata |
//! | `POST` | `/api/screenshot` | no | Forward to the remote service |
//! | `POST` | `/api/translate` | no | Translate text |
//! | `POST` | `/api/config/get` | yes | Read the YAML config |
//! | `POST` | `/api/config/update` | yes | Merge into the YAML config |
//!
//! # Error Contract
//!
//! ```json
//! { "message": "Failed to parse '/srv/nav/data/tag.json': ..." }
//! ```
//!
//! Authentication failures use `{ "status": 401, "message": "Bad credentials" }`;
//! a config update before `index.html` exists is answered with
//! `409 { "status": false, "message": ... }`.
//!
//! # Concurrency
//!
//! Requests share nothing but the filesystem. Two concurrent mutations of the
//! same store race and the last writer wins.

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use futures_util::stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{error, info, warn};

use crate::error::NavError;
use crate::files;
use crate::models::{ComponentLayout, Dataset, Tag, ViewCounts, Web};
use crate::notify::{LogNotifier, Notifier};
use crate::paths::Paths;
use crate::remote;
use crate::settings::Settings;
use crate::spider::{spider_webs, HttpProbe, Probe};
use crate::store::{NavStore, Visibility};
use crate::transform::{
    compute_view_counts, filter_login_data, set_webs, validate_dataset, validate_tags,
};

/// Uploads arrive base64-encoded inside JSON, so the default limit is far too small.
const BODY_LIMIT: usize = 512 * 1024 * 1024;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    store: Arc<NavStore>,
    /// Probe override; when unset each crawl builds an [`HttpProbe`] from settings.
    probe: Option<Arc<dyn Probe>>,
    notifier: Arc<dyn Notifier>,
    /// Client for the metadata and proxy collaborators.
    client: reqwest::Client,
}

impl AppState {
    pub fn new(paths: Paths) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("nav-server/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            store: Arc::new(NavStore::new(paths)),
            probe: None,
            notifier: Arc::new(LogNotifier),
            client,
        })
    }

    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn store(&self) -> &NavStore {
        &self.store
    }
}

/// Starts the HTTP server.
///
/// The config is loaded first; a missing or malformed config is fatal
/// because the listen port comes from it. `port` overrides the configured
/// port. Runs until the process is terminated.
pub async fn run_server(paths: Paths, port: Option<u16>) -> anyhow::Result<()> {
    let state = AppState::new(paths)?;
    let config = state.store.load_config().await?;
    if let Err(e) = state.store.ensure_collect_file().await {
        warn!(error = %e, "could not create collected items file");
    }

    let port = port.unwrap_or(config.port);
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Server is running on port :{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let paths = state.store.paths().clone();

    let protected = Router::new()
        .route("/api/users/verify", get(handle_verify))
        .route("/api/contents/update", post(handle_contents_update))
        .route("/api/contents/create", post(handle_contents_create))
        .route("/api/collect/get", post(handle_collect_get))
        .route("/api/collect/delete", post(handle_collect_delete))
        .route("/api/config/get", post(handle_config_get))
        .route("/api/config/update", post(handle_config_update))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    let open = Router::new()
        .route("/api/contents/get", post(handle_contents_get))
        .route("/api/collect/save", post(handle_collect_save))
        .route("/api/web/info", post(handle_web_info))
        .route("/api/screenshot", post(handle_screenshot))
        .route("/api/translate", post(handle_translate));

    let api = protected.merge(open).layer(CompressionLayer::new());

    // Kept uncompressed so progress fragments reach the client as they are written.
    let streaming = Router::new().route("/api/spider", post(handle_spider));

    let assets = Router::new()
        .nest_service("/images", ServeDir::new(&paths.upload))
        .fallback_service(ServeDir::new(&paths.dist).fallback(ServeFile::new(&paths.index_html)))
        .layer(CompressionLayer::new());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    api.merge(streaming)
        .merge(assets)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<NavError> for AppError {
    fn from(err: NavError) -> Self {
        let status = match &err {
            NavError::Auth => StatusCode::UNAUTHORIZED,
            NavError::Validation(_) => StatusCode::BAD_REQUEST,
            NavError::MissingIndexHtml => StatusCode::CONFLICT,
            NavError::TemplateMarkerMissing { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, message = %self.message, "request failed");
        }
        let body = match self.status {
            StatusCode::UNAUTHORIZED => json!({ "status": 401, "message": self.message }),
            StatusCode::CONFLICT => json!({ "status": false, "message": self.message }),
            _ => json!({ "message": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, AppError>;

// ============ Auth ============

/// Rejects requests whose `Authorization` header is not `token <password>`.
///
/// The config is re-read on every request, so a password change takes
/// effect immediately.
async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    match state.store.load_config().await {
        Ok(config) if config.accepts_token(header) => next.run(request).await,
        Ok(_) => AppError::from(NavError::Auth).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

async fn handle_verify() -> Json<Value> {
    Json(json!({}))
}

// ============ POST /api/contents/* ============

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody {
    #[serde(default)]
    is_login: bool,
}

#[derive(Serialize)]
struct ContentsResponse {
    webs: Dataset,
    settings: Settings,
    tags: Vec<Tag>,
    search: Vec<Value>,
    internal: ViewCounts,
    component: ComponentLayout,
}

/// View counters are totalled over the full dataset before filtering.
async fn handle_contents_get(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> ApiResult<Json<ContentsResponse>> {
    let store = &state.store;
    let webs = store.read_dataset(Visibility::Unfiltered).await?;
    let settings = store.load_settings().await?;
    let tags = store.read_tags().await?;
    let search = store.read_search_aliases().await?;
    let component = store.read_component_layout().await;

    let internal = compute_view_counts(&webs);
    let webs = filter_login_data(set_webs(webs, &settings, &tags), body.is_login);

    Ok(Json(ContentsResponse {
        webs,
        settings,
        tags,
        search,
        internal,
        component,
    }))
}

#[derive(Debug, Deserialize)]
struct UpdateBody {
    path: String,
    content: Value,
}

/// File contents arrive either as a JSON-encoded string or as a JSON value.
fn content_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_content<T: serde::de::DeserializeOwned>(text: &str, what: &str) -> Result<T, NavError> {
    serde_json::from_str(text).map_err(|e| NavError::validation(format!("invalid {}: {}", what, e)))
}

async fn handle_contents_update(
    State(state): State<AppState>,
    Json(body): Json<UpdateBody>,
) -> ApiResult<Json<Value>> {
    let store = &state.store;
    let text = content_text(&body.content);
    let file_name = Path::new(&body.path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    if file_name.ends_with("settings.json") {
        let settings: Settings = parse_content(&text, "settings")?;
        store.regenerate_index_html(&settings).await?;
        files::atomic_write(&store.paths().settings, text.as_bytes()).await?;
    } else if file_name.ends_with("db.json") {
        let raw: Dataset = parse_content(&text, "dataset")?;
        let settings = store.load_settings().await?;
        let tags = store.read_tags().await?;
        let webs = set_webs(raw, &settings, &tags);
        validate_dataset(&webs)?;
        store.write_dataset(&webs).await?;
    } else {
        let target = store.paths().resolve(&body.path)?;
        if target == store.paths().tags {
            let tags: Vec<Tag> = parse_content(&text, "tags")?;
            validate_tags(&tags)?;
        }
        files::atomic_write(&target, text.as_bytes()).await?;
    }

    info!(path = %body.path, "contents updated");
    Ok(Json(json!({ "status": true })))
}

#[derive(Debug, Deserialize)]
struct CreateBody {
    path: String,
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    image_path: String,
    full_image_path: String,
}

async fn handle_contents_create(
    State(state): State<AppState>,
    Json(body): Json<CreateBody>,
) -> ApiResult<Json<CreateResponse>> {
    let store = &state.store;
    let encoded = match body.content.split_once("base64,") {
        Some((_, data)) => data,
        None => body.content.as_str(),
    };
    let data = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| NavError::validation(format!("invalid base64 content: {}", e)))?;

    let target = store.paths().resolve_upload(&body.path)?;
    files::atomic_write(&target, &data).await?;

    let config = store.load_config().await?;
    let image_path = format!("/images/{}", body.path.trim_start_matches('/'));
    let full_image_path = format!("{}{}", config.address.trim_end_matches('/'), image_path);
    info!(path = %target.display(), bytes = data.len(), "file uploaded");

    Ok(Json(CreateResponse {
        image_path,
        full_image_path,
    }))
}

// ============ POST /api/spider ============

/// Streams crawl progress as a sequence of JSON fragments: one array of
/// reports per ready batch, then `{"time": <seconds>}`.
///
/// The crawl runs in its own task and covers the unfiltered dataset, so
/// persisting never drops login-only entries; their reports are withheld
/// from anonymous callers. If the client goes away, in-flight probes finish
/// but nothing is written.
async fn handle_spider(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> ApiResult<Response> {
    let store = state.store.clone();
    let webs = store.read_dataset(Visibility::Unfiltered).await?;
    let mut settings = store.load_settings().await?;
    let probe: Arc<dyn Probe> = match &state.probe {
        Some(probe) => probe.clone(),
        None => Arc::new(
            HttpProbe::new(Duration::from_secs(settings.spider_timeout.max(1)))
                .map_err(|e| AppError::internal(e.to_string()))?,
        ),
    };

    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let is_login = body.is_login;

    tokio::spawn(async move {
        let progress = tx.clone();
        let outcome = spider_webs(webs, &settings, probe, move |batch| {
            let visible: Vec<_> = batch
                .into_iter()
                .filter(|r| is_login || !r.login_only)
                .collect();
            if visible.is_empty() {
                return;
            }
            if let Ok(fragment) = serde_json::to_string(&visible) {
                let _ = progress.send(fragment);
            }
        })
        .await;

        if tx.is_closed() {
            warn!("spider client disconnected, results discarded");
            return;
        }

        let last = match store.record_crawl(&outcome, &mut settings).await {
            Ok(()) => json!({ "time": outcome.elapsed.as_secs() }),
            Err(e) => {
                error!(error = %e, "spider results not persisted");
                json!({ "message": e.to_string() })
            }
        };
        let _ = tx.send(last.to_string());
    });

    let body = stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|fragment| (Ok::<_, Infallible>(fragment), rx))
    });
    Ok((
        [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response())
}

// ============ POST /api/collect/* ============

#[derive(Debug, Deserialize)]
struct CollectSaveBody {
    data: Web,
}

#[derive(Debug, Deserialize)]
struct CollectDeleteBody {
    #[serde(default)]
    data: Vec<Web>,
}

async fn handle_collect_get(State(state): State<AppState>) -> Json<Value> {
    let items = state.store.read_collected().await;
    let count = items.len();
    Json(json!({ "data": items, "count": count }))
}

async fn handle_collect_delete(
    State(state): State<AppState>,
    Json(body): Json<CollectDeleteBody>,
) -> ApiResult<Json<Value>> {
    let items = state.store.delete_collected_items(&body.data).await?;
    Ok(Json(json!({ "data": items })))
}

/// Saves the item, then fires the notification without waiting for it.
async fn handle_collect_save(
    State(state): State<AppState>,
    Json(body): Json<CollectSaveBody>,
) -> ApiResult<Json<Value>> {
    let items = state.store.save_collected_item(body.data).await?;
    if let Some(saved) = items.into_iter().next() {
        let store = state.store.clone();
        let notifier = state.notifier.clone();
        tokio::spawn(async move {
            let sent = match (store.load_config().await, store.load_settings().await) {
                (Ok(config), Ok(settings)) => {
                    notifier.notify_collected(&config, &settings, &saved).await
                }
                (Err(e), _) | (_, Err(e)) => Err(e.into()),
            };
            if let Err(e) = sent {
                warn!(error = %e, "collect notification not sent");
            }
        });
    }
    Ok(Json(json!({ "message": "OK" })))
}

// ============ POST /api/web/info, /api/screenshot, /api/translate ============

#[derive(Debug, Deserialize)]
struct WebInfoBody {
    url: String,
}

async fn handle_web_info(
    State(state): State<AppState>,
    Json(body): Json<WebInfoBody>,
) -> Json<remote::WebInfo> {
    Json(remote::fetch_web_info(&state.client, &body.url).await)
}

async fn handle_screenshot(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let config = state.store.load_config().await?;
    Ok(Json(remote::screenshot(&state.client, &config, &body).await?))
}

async fn handle_translate(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let config = state.store.load_config().await?;
    Ok(Json(remote::translate(&state.client, &config, &body).await?))
}

// ============ POST /api/config/* ============

async fn handle_config_get(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let config = state.store.load_config().await?;
    serde_json::to_value(&config)
        .map(Json)
        .map_err(|e| AppError::internal(e.to_string()))
}

async fn handle_config_update(
    State(state): State<AppState>,
    Json(patch): Json<Value>,
) -> ApiResult<Json<Value>> {
    state.store.update_config(&patch).await?;
    Ok(Json(json!({ "status": true })))
}
