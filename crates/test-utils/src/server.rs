//! In-process stand-in for the community API.
//!
//! Routes:
//! - `POST /api/community/post/create`: records the JSON body, answers
//!   `OK` (or 500 when set to fail)
//! - `POST /api/uploadthing`: multipart upload, answers `[{ fileUrl }]`
//! - `GET /api/link?url=`: link preview metadata
//! - `GET /search?search=`: link autocomplete

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use agora_composer::ComposerConfig;
use axum::Json;
use axum::Router;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::mocks::REJECTION_BODY;
use crate::test_config;

/// A multipart upload as the server saw it.
#[derive(Debug, Clone)]
pub struct ReceivedUpload {
    pub route: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
}

#[derive(Default)]
struct ServerState {
    failing: AtomicBool,
    posts: Mutex<Vec<Value>>,
    uploads: Mutex<Vec<ReceivedUpload>>,
    origin: Mutex<String>,
}

/// A running server. Stops when dropped.
pub struct TestServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let state = Arc::new(ServerState::default());
        let app = Router::new()
            .route("/api/community/post/create", post(create_post))
            .route("/api/uploadthing", post(upload))
            .route("/api/link", get(link_meta))
            .route("/search", get(search))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        *state.origin.lock() = format!("http://{addr}");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Base URL, without trailing slash.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.url())
    }

    /// Composer configuration pointing every endpoint at this server.
    pub fn config(&self) -> ComposerConfig {
        let mut config = test_config(&self.url());
        config.link_search_url = self.endpoint("/search");
        config
    }

    /// Make post creation fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// JSON bodies received by the post endpoint.
    pub fn posts(&self) -> Vec<Value> {
        self.state.posts.lock().clone()
    }

    pub fn uploads(&self) -> Vec<ReceivedUpload> {
        self.state.uploads.lock().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn create_post(State(state): State<Arc<ServerState>>, Json(body): Json<Value>) -> Response {
    state.posts.lock().push(body);
    if state.failing.load(Ordering::SeqCst) {
        (StatusCode::INTERNAL_SERVER_ERROR, REJECTION_BODY).into_response()
    } else {
        (StatusCode::OK, "OK").into_response()
    }
}

async fn upload(State(state): State<Arc<ServerState>>, mut multipart: Multipart) -> Response {
    let mut received = ReceivedUpload {
        route: None,
        file_name: None,
        content_type: None,
        size: 0,
    };

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "route" => received.route = field.text().await.ok(),
            "file" => {
                received.file_name = field.file_name().map(str::to_string);
                received.content_type = field.content_type().map(str::to_string);
                received.size = field.bytes().await.map(|b| b.len()).unwrap_or_default();
            }
            _ => {}
        }
    }

    let Some(file_name) = received.file_name.clone() else {
        return (StatusCode::BAD_REQUEST, "missing file").into_response();
    };
    state.uploads.lock().push(received);

    let origin = state.origin.lock().clone();
    Json(json!([{ "fileUrl": format!("{origin}/f/{file_name}") }])).into_response()
}

async fn link_meta(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    match params.get("url") {
        Some(url) => Json(json!({
            "success": 1,
            "meta": {
                "title": format!("Title of {url}"),
                "description": "A linked page",
                "image": { "url": "https://example.com/og.png" },
            }
        })),
        None => Json(json!({ "success": 0 })),
    }
}

async fn search(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let query = params.get("search").cloned().unwrap_or_default();
    Json(json!([
        { "name": format!("{query} news"), "href": format!("https://example.com/{query}") },
        {
            "name": format!("{query} guide"),
            "href": format!("https://example.com/{query}/guide"),
            "description": "Guide"
        },
    ]))
}
