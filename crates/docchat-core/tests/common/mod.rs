//! In-process chat backend for integration tests.

#![allow(dead_code)]

use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, post};
use axum::{Json, Router};
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};

/// Session id issued by the fake backend.
pub const SESSION: &str = "test-session";

/// Bytes per body chunk; small enough to split frames and characters.
const CHUNK: usize = 5;

#[derive(Clone, Default)]
struct Recorded {
    requests: Arc<Mutex<Vec<String>>>,
}

impl Recorded {
    fn push(&self, line: String) {
        self.requests.lock().unwrap().push(line);
    }
}

pub struct TestServer {
    pub base_url: String,
    recorded: Recorded,
}

impl TestServer {
    /// Start a backend on an ephemeral port. It runs until the test process exits.
    pub fn start() -> Self {
        let recorded = Recorded::default();
        let app = router(recorded.clone());

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        listener.set_nonblocking(true).expect("set nonblocking");
        let addr = listener.local_addr().expect("local addr");

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .expect("build runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).expect("tokio listener");
                axum::serve(listener, app).await.expect("serve");
            });
        });

        Self {
            base_url: format!("http://{}/api/chat", addr),
            recorded,
        }
    }

    /// Request log, one `METHOD target` line per request.
    pub fn requests(&self) -> Vec<String> {
        self.recorded.requests.lock().unwrap().clone()
    }
}

/// A base URL nothing is listening on.
pub fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{}/api/chat", addr)
}

fn router(recorded: Recorded) -> Router {
    Router::new()
        .route("/api/chat/new", post(new_session))
        .route("/api/chat/{id}", delete(clear_session))
        .route("/api/chat/{id}/upload", post(upload))
        .route("/api/chat/{id}/message", post(message))
        .with_state(recorded)
}

async fn new_session(State(recorded): State<Recorded>) -> Json<Value> {
    recorded.push("POST new".to_string());
    Json(json!({ "sessionId": SESSION }))
}

async fn clear_session(State(recorded): State<Recorded>, Path(id): Path<String>) -> StatusCode {
    recorded.push(format!("DELETE {}", id));
    if id == SESSION {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn upload(
    State(recorded): State<Recorded>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    recorded.push(format!("UPLOAD {} {}", id, body.len()));
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with("multipart/form-data; boundary=") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Expected multipart/form-data" })),
        )
            .into_response();
    }

    let text = String::from_utf8_lossy(&body);
    let file_name = text
        .split("filename=\"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .unwrap_or_default()
        .to_string();
    if file_name.ends_with(".exe") {
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Json(json!({ "error": "Unsupported file type" })),
        )
            .into_response();
    }
    Json(json!({ "message": "File uploaded", "fileName": file_name })).into_response()
}

async fn message(
    State(recorded): State<Recorded>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let text = body["message"].as_str().unwrap_or_default().to_string();
    recorded.push(format!("MESSAGE {} {}", id, text));
    if id != SESSION {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Session not found" })),
        )
            .into_response();
    }

    match text.as_str() {
        "chart" => chunked(concat!(
            "event: chart\n",
            "data: {\"chartType\":\"pie\",\"labels\":[\"a\",\"b\"],\"datasets\":[{\"data\":[1,2]}]}\n\n",
            "event: complete\ndata: {\"message\":\"done\"}\n\n",
            "data: {\"type\":\"token\",\"data\":\"after complete\"}\n\n",
        )),
        "fail" => chunked("event: error\ndata: {\"message\":\"backend exploded\"}\n\n"),
        "hang" => {
            let first = stream::iter([Ok::<_, Infallible>(Bytes::from_static(
                b"data: {\"type\":\"token\",\"data\":\"wait\"}\n\n",
            ))]);
            event_stream(Body::from_stream(first.chain(stream::pending())))
        }
        "no-terminal" => chunked("data: {\"type\":\"token\",\"data\":\"cut off\"}"),
        _ => chunked(concat!(
            "data: {\"type\":\"token\",\"data\":\"Bonjour \"}\n\n",
            "data: {\"type\":\"token\",\"data\":\"café\"}\n\n",
            "event: complete\ndata: {}\n\n",
        )),
    }
}

fn chunked(body: &'static str) -> Response {
    let chunks: Vec<Result<Bytes, Infallible>> = body
        .as_bytes()
        .chunks(CHUNK)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    event_stream(Body::from_stream(stream::iter(chunks)))
}

fn event_stream(body: Body) -> Response {
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}
