//! Browser-facing HTTP server.
//!
//! Renders the chat page and proxies every substantive operation to the
//! backend through the [`Backend`] trait.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Render the page (`?collection=<uuid>&document=<name>` selects the chat target) |
//! | `POST` | `/chat` | Ask a question (form: `collection`, `document`, `prompt`) |
//! | `POST` | `/upload` | Upload a PDF (multipart: `collection`, `file`, `submit`) |
//! | `POST` | `/upload/reset` | Clear the upload form's submitted flag |
//! | `POST` | `/session/end` | Drop the session and its transcript |
//! | `GET`  | `/api/collections` | Collection list as JSON (`?with_documents=true` for the tree) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Sessions
//!
//! Each browser gets a random session id in the `docchat_session` cookie.
//! The transcript and the upload flag live in the [`SessionStore`], never in
//! the request handlers.
//!
//! # Error Contract
//!
//! Backend failures never surface as HTTP errors: they degrade to an empty
//! sidebar or the generic assistant message. Only malformed requests to this
//! server produce an error body:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid multipart body" } }
//! ```

use axum::{
    extract::{DefaultBodyLimit, Form, Multipart, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::backend::{Backend, HttpBackend};
use crate::chat;
use crate::collections::list_collections;
use crate::config::Config;
use crate::models::{Citation, Collection};
use crate::session::{SessionId, SessionStore};
use crate::ui::{render_page, resolve_selection, PageView};
use crate::upload::{handle_upload, UploadOutcome, UploadRequest};
use crate::viewer::{render_sources, SourceView, ViewerError};

pub const SESSION_COOKIE: &str = "docchat_session";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    backend: Arc<dyn Backend>,
    sessions: SessionStore,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<dyn Backend>) -> Self {
        Self {
            config: Arc::new(config),
            backend,
            sessions: SessionStore::new(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

/// Build the router. Exposed separately from [`run_server`] for tests.
pub fn router(state: AppState) -> Router {
    let upload_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/", get(handle_index))
        .route("/chat", post(handle_chat))
        .route(
            "/upload",
            post(handle_upload_form).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/upload/reset", post(handle_upload_reset))
        .route("/session/end", post(handle_session_end))
        .route("/api/collections", get(handle_list_collections))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the HTTP server on `server.bind` and runs until Ctrl-C / SIGTERM.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let backend = HttpBackend::new(&config.backend)?;
    let state = AppState::new(config.clone(), Arc::new(backend));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("docchat listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
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
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ Sessions ============

/// Resolve the caller's session, issuing a new cookie when it has none or
/// its session is gone.
fn session_for(state: &AppState, jar: CookieJar) -> (CookieJar, SessionId) {
    let existing = jar
        .get(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
        .filter(|id| state.sessions.contains(id));

    match existing {
        Some(id) => (jar, id),
        None => {
            let id = state.sessions.create();
            let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax);
            (jar.add(cookie), id)
        }
    }
}

// ============ Page rendering ============

/// Per-request render inputs that are not part of the session.
#[derive(Default)]
struct RenderExtras {
    sources: Option<Vec<(Citation, Result<SourceView, ViewerError>)>>,
    notice: Option<String>,
}

fn render(
    state: &AppState,
    session: SessionId,
    collections: Option<&[Collection]>,
    collection: Option<&str>,
    document: Option<&str>,
    extras: RenderExtras,
) -> Html<String> {
    let snapshot = state.sessions.snapshot(&session);
    let (selected_collection, selected_document) =
        resolve_selection(collections.unwrap_or(&[]), collection, document);

    let view = PageView {
        collections,
        selected_collection,
        selected_document,
        transcript: snapshot.transcript(),
        sources: extras.sources.as_deref(),
        upload_submitted: snapshot.upload.is_submitted(),
        notice: extras.notice.as_deref(),
    };
    Html(render_page(&view))
}

// ============ GET / ============

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    collection: Option<String>,
    document: Option<String>,
}

async fn handle_index(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<PageQuery>,
) -> (CookieJar, Html<String>) {
    let (jar, session) = session_for(&state, jar);
    let collections = list_collections(state.backend.as_ref(), true).await;

    let page = render(
        &state,
        session,
        collections.as_deref(),
        query.collection.as_deref(),
        query.document.as_deref(),
        RenderExtras::default(),
    );
    (jar, page)
}

// ============ POST /chat ============

#[derive(Debug, Deserialize)]
struct ChatForm {
    #[serde(default)]
    collection: Option<String>,
    #[serde(default)]
    document: Option<String>,
    prompt: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<ChatForm>,
) -> (CookieJar, Html<String>) {
    let (jar, session) = session_for(&state, jar);
    let collections = list_collections(state.backend.as_ref(), true).await;
    let listed = collections.as_deref().unwrap_or(&[]);
    let (collection, document) =
        resolve_selection(listed, form.collection.as_deref(), form.document.as_deref());

    let prompt = form.prompt.trim();
    let mut extras = RenderExtras::default();

    if !prompt.is_empty() {
        match collection {
            Some(collection) => {
                let reply =
                    chat::answer(state.backend.as_ref(), collection, document, prompt).await;
                state
                    .sessions
                    .with_session(session, |s| s.record_exchange(prompt, &reply.text));

                extras.sources = reply
                    .citations
                    .as_ref()
                    .map(|citations| render_sources(citations, &state.config.uploads.dir));
            }
            None => {
                extras.notice =
                    Some("Select a collection before asking a question.".to_string());
            }
        }
    }

    let page = render(
        &state,
        session,
        collections.as_deref(),
        form.collection.as_deref(),
        form.document.as_deref(),
        extras,
    );
    (jar, page)
}

// ============ POST /upload ============

/// Parse the upload form. The flag reports whether the form's submit
/// button was part of the request.
async fn read_upload(mut multipart: Multipart) -> Result<(UploadRequest, bool), AppError> {
    let mut request = UploadRequest::default();
    let mut pressed = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("collection") => {
                request.collection = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("invalid collection field: {}", e)))?;
            }
            Some("file") => {
                request.file_name = field.file_name().unwrap_or_default().to_string();
                request.bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("invalid file field: {}", e)))?
                    .to_vec();
            }
            Some("submit") => pressed = true,
            _ => {}
        }
    }

    Ok((request, pressed))
}

async fn handle_upload_form(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<(CookieJar, Html<String>), AppError> {
    let (jar, session) = session_for(&state, jar);
    let (request, pressed) = read_upload(multipart).await?;

    // The flag stays set across requests until `/upload/reset`.
    let submitted = state.sessions.with_session(session, |s| {
        if pressed {
            s.upload.submit();
        }
        s.upload.is_submitted()
    });

    let collections = match handle_upload(state.backend.as_ref(), submitted, request).await {
        UploadOutcome::Uploaded { sidebar } => sidebar,
        UploadOutcome::Skipped | UploadOutcome::Failed(_) => {
            list_collections(state.backend.as_ref(), true).await
        }
    };

    let page = render(
        &state,
        session,
        collections.as_deref(),
        None,
        None,
        RenderExtras::default(),
    );
    Ok((jar, page))
}

// ============ POST /upload/reset, POST /session/end ============

async fn handle_upload_reset(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let (jar, session) = session_for(&state, jar);
    state.sessions.with_session(session, |s| s.upload.reset());
    (jar, Redirect::to("/"))
}

async fn handle_session_end(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(id) = jar
        .get(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
    {
        state.sessions.end(&id);
    }
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"));
    (jar, Redirect::to("/"))
}

// ============ GET /api/collections ============

#[derive(Debug, Default, Deserialize)]
struct CollectionsQuery {
    #[serde(default)]
    with_documents: bool,
}

async fn handle_list_collections(
    State(state): State<AppState>,
    Query(query): Query<CollectionsQuery>,
) -> Json<Option<Vec<Collection>>> {
    Json(list_collections(state.backend.as_ref(), query.with_documents).await)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
