//! Common test utilities: a scripted assistant backend on a local port.

#![allow(dead_code)]

use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpListener;

use sovereign::auth::CredentialStore;
use sovereign::client::AssistantClient;
use sovereign::session::{SessionController, StreamSettings};

/// What `/chat` answers once the bearer key is accepted.
pub enum Reply {
    /// Stream these chunks as the body, one write per chunk.
    Chunks(Vec<&'static str>),
    /// Fail with this status and a `{"detail": ...}` body.
    Status(StatusCode, &'static str),
}

pub struct Backend {
    pub api_key: String,
    pub reply: Reply,
    pub queries: Mutex<Vec<String>>,
}

impl Backend {
    pub fn new(api_key: &str, reply: Reply) -> Self {
        Self {
            api_key: api_key.to_string(),
            reply,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[derive(Deserialize)]
struct ChatBody {
    query: String,
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

async fn chat(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<ChatBody>,
) -> Response {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    if bearer != Some(backend.api_key.as_str()) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Invalid API Key" })))
            .into_response();
    }

    backend.queries.lock().unwrap().push(body.query);

    match &backend.reply {
        Reply::Chunks(chunks) => {
            let chunks = chunks.clone();
            let stream = futures::stream::iter(chunks.into_iter().map(Ok::<_, Infallible>));
            Body::from_stream(stream).into_response()
        }
        Reply::Status(status, detail) => {
            (*status, Json(json!({ "detail": detail }))).into_response()
        }
    }
}

/// Serve `backend` on an ephemeral local port. Returns its base URL.
pub async fn spawn_backend(backend: Backend) -> (String, Arc<Backend>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let backend = Arc::new(backend);

    let app = Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .with_state(backend.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), backend)
}

/// A credential store in a fresh temp directory, optionally holding a key.
pub fn credential_store(key: Option<&str>) -> (TempDir, CredentialStore) {
    let dir = TempDir::new().unwrap();
    let mut store = CredentialStore::open(dir.path().join("credentials.json")).unwrap();
    if let Some(key) = key {
        store.set_api_key(key).unwrap();
    }
    (dir, store)
}

pub fn controller(url: &str, store: CredentialStore) -> SessionController<AssistantClient> {
    SessionController::new(AssistantClient::new(url), store, StreamSettings::default())
}
