#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderMap, Request, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::post,
};
use canape_relay::{
    config::AppConfig,
    routes::{self, AppState},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const TOKEN: &str = "r8_test_token";

#[derive(Debug, Clone)]
pub struct Captured {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Captured {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("captured body is json")
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }
}

#[derive(Default)]
struct FakeState {
    replies: Mutex<VecDeque<(StatusCode, String)>>,
    captured: Mutex<Vec<Captured>>,
}

/// Stand-in for the Replicate API, serving canned replies in order.
pub struct FakeReplicate {
    pub base_url: String,
    state: Arc<FakeState>,
}

impl FakeReplicate {
    pub async fn start(replies: Vec<(StatusCode, &str)>) -> Self {
        let state = Arc::new(FakeState {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|(status, body)| (status, body.to_string()))
                    .collect(),
            ),
            captured: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/v1/models/{owner}/{name}/predictions", post(prediction))
            .route("/v1/uploads", post(upload))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}/v1"),
            state,
        }
    }

    pub fn captured(&self) -> Vec<Captured> {
        self.state.captured.lock().unwrap().clone()
    }
}

fn next_reply(state: &FakeState, path: String, headers: HeaderMap, body: Bytes) -> Response {
    state.captured.lock().unwrap().push(Captured {
        path,
        headers,
        body,
    });
    let (status, body) = state
        .replies
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((StatusCode::INTERNAL_SERVER_ERROR, "{\"detail\":\"no reply queued\"}".to_string()));
    (status, [(CONTENT_TYPE, "application/json")], body).into_response()
}

async fn prediction(
    State(state): State<Arc<FakeState>>,
    Path((owner, name)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    next_reply(&state, format!("/v1/models/{owner}/{name}/predictions"), headers, body)
}

async fn upload(State(state): State<Arc<FakeState>>, headers: HeaderMap, body: Bytes) -> Response {
    next_reply(&state, "/v1/uploads".to_string(), headers, body)
}

pub struct TestApp {
    pub router: Router,
    pub history_dir: TempDir,
}

pub fn app(api_base: Option<&str>, token: Option<&str>, extra: &[(&str, &str)]) -> TestApp {
    let history_dir = tempfile::tempdir().unwrap();
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert(
        "HISTORY_DIR".to_string(),
        history_dir.path().to_string_lossy().into_owned(),
    );
    if let Some(base) = api_base {
        vars.insert("REPLICATE_API_BASE".to_string(), base.to_string());
    }
    if let Some(token) = token {
        vars.insert("REPLICATE_API_TOKEN".to_string(), token.to_string());
    }
    for (key, value) in extra {
        vars.insert(key.to_string(), value.to_string());
    }
    let config = AppConfig::from_lookup(|key| vars.get(key).cloned());
    let state = Arc::new(AppState::new(config).unwrap());
    TestApp {
        router: routes::router(state),
        history_dir,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is json")
    }

    pub fn message(&self) -> String {
        self.json()["message"].as_str().unwrap_or_default().to_string()
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub const BOUNDARY: &str = "----canapeTestBoundary";

pub fn multipart_body(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn post_multipart(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
