//! Common test utilities for REST integration tests
//!
//! `MockApi` is a small axum server that records every request and answers
//! a handful of routes the way the chat API does, including 429s with a
//! `retry_after` body.

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use inkcord_rest::{RestClient, RestConfig};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

pub const TEST_TOKEN: &str = "rest-token";

/// One request as the server saw it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub at: Instant,
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Value,
}

/// How the message route answers
#[derive(Debug, Clone, Copy)]
pub struct MockOptions {
    /// Number of message posts answered with 429 before succeeding
    pub limited_first: usize,
    /// `retry_after` seconds in the 429 body
    pub retry_after: f64,
    /// Value of `X-RateLimit-Remaining` on successful message posts
    pub remaining: u32,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            limited_first: 0,
            retry_after: 0.1,
            remaining: 4,
        }
    }
}

struct MockState {
    options: MockOptions,
    requests: Mutex<Vec<Recorded>>,
    limited: Mutex<usize>,
}

pub struct MockApi {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockApi {
    pub async fn start(options: MockOptions) -> Self {
        let state = Arc::new(MockState {
            options,
            requests: Mutex::new(Vec::new()),
            limited: Mutex::new(0),
        });

        let app = Router::new()
            .fallback(handle)
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api/v10/", self.addr)
    }

    pub fn client(&self) -> RestClient {
        RestClient::with_config(
            TEST_TOKEN,
            RestConfig {
                base_url: self.base_url(),
                ..RestConfig::default()
            },
        )
        .unwrap()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri
        .path()
        .trim_start_matches("/api/v10/")
        .to_string();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    state.requests.lock().push(Recorded {
        at: Instant::now(),
        method: method.to_string(),
        path: path.clone(),
        query: uri.query().map(str::to_string),
        headers,
        body: body.clone(),
    });

    let segments: Vec<&str> = path.split('/').collect();
    match (method.as_str(), segments.as_slice()) {
        ("GET", ["gateway"]) => Json(json!({ "url": "wss://gateway.example.test" })).into_response(),

        ("POST", ["channels", _, "messages"]) => {
            let limited = {
                let mut count = state.limited.lock();
                if *count < state.options.limited_first {
                    *count += 1;
                    true
                } else {
                    false
                }
            };
            if limited {
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({
                        "message": "You are being rate limited.",
                        "retry_after": state.options.retry_after,
                        "global": false
                    })),
                )
                    .into_response();
            }
            (
                [
                    ("x-ratelimit-remaining", state.options.remaining.to_string()),
                    ("x-ratelimit-reset-after", "1.000".to_string()),
                    ("x-ratelimit-bucket", "msg-bucket".to_string()),
                ],
                Json(json!({ "id": "1", "content": body["content"] })),
            )
                .into_response()
        }

        ("GET", ["channels", id]) => Json(json!({ "id": id, "name": "general" })).into_response(),

        ("GET", ["guilds", ..]) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Unknown Guild", "code": 10004 })),
        )
            .into_response(),

        ("POST", ["interactions", _, _, "callback"]) => StatusCode::NO_CONTENT.into_response(),

        _ => (StatusCode::NOT_FOUND, Json(json!({ "message": "404: Not Found" }))).into_response(),
    }
}
