//! In-process stand-in for the presign, storage, decision and token
//! endpoints. Every request is recorded in arrival order.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{post, put};
use axum::{Json, Router};
use facegate_config::ClientConfig;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone)]
pub struct Behavior {
    pub put_status: StatusCode,
    pub decision_status: StatusCode,
    pub is_match: bool,
    pub matched_employee: &'static str,
    pub valid_code: &'static str,
    /// Served verbatim by `/verify` in place of a match result.
    pub verify_body: Option<&'static str>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            put_status: StatusCode::OK,
            decision_status: StatusCode::OK,
            is_match: true,
            matched_employee: "E123",
            valid_code: "good-code",
            verify_body: None,
        }
    }
}

#[derive(Clone)]
struct AppState {
    base: String,
    behavior: Behavior,
    calls: Arc<Mutex<Vec<Recorded>>>,
}

impl AppState {
    fn record(&self, method: Method, uri: &Uri, headers: &HeaderMap, body: &[u8]) {
        let header = |name| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        self.calls.lock().unwrap().push(Recorded {
            method,
            path: uri.path().to_string(),
            authorization: header(AUTHORIZATION),
            content_type: header(CONTENT_TYPE),
            body: body.to_vec(),
        });
    }
}

pub struct TestBackend {
    pub base: String,
    calls: Arc<Mutex<Vec<Recorded>>>,
}

impl TestBackend {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let calls = Arc::new(Mutex::new(Vec::new()));
        let state = AppState {
            base: base.clone(),
            behavior,
            calls: Arc::clone(&calls),
        };

        let app = Router::new()
            .route("/presign-upload", post(presign))
            .route("/storage/*key", put(storage_put))
            .route("/enroll", post(enroll))
            .route("/verify", post(verify))
            .route("/oauth2/token", post(token))
            .with_state(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base, calls }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            api_base: self.base.clone(),
            gate_api_base: self.base.clone(),
            idp_domain: self.base.clone(),
            client_id: "test-client".into(),
            redirect_uri: "http://localhost:3000/admin/".into(),
            request_timeout: None,
            keyring_service: "facegate-test".into(),
        }
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.path).collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.calls().iter().filter(|call| call.path == path).count()
    }
}

async fn presign(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Response {
    state.record(Method::POST, &uri, &headers, &body);
    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let Some(key) = request.get("objectKey").and_then(Value::as_str) else {
        return (StatusCode::BAD_REQUEST, "objectKey required").into_response();
    };
    Json(json!({
        "uploadUrl": format!("{}/storage/{}", state.base, key),
        "bucket": "facegate-test",
        "expiresInSeconds": 300,
    }))
    .into_response()
}

async fn storage_put(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Response {
    state.record(Method::PUT, &uri, &headers, &body);
    state.behavior.put_status.into_response()
}

async fn enroll(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Response {
    state.record(Method::POST, &uri, &headers, &body);
    if !state.behavior.decision_status.is_success() {
        return (state.behavior.decision_status, "enroll rejected").into_response();
    }
    Json(json!({ "message": "enrolled", "faceId": "face-1" })).into_response()
}

async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Response {
    state.record(Method::POST, &uri, &headers, &body);
    if !state.behavior.decision_status.is_success() {
        return (state.behavior.decision_status, "verify rejected").into_response();
    }
    if let Some(raw) = state.behavior.verify_body {
        return (StatusCode::OK, raw).into_response();
    }
    let mut result = json!({ "isMatch": state.behavior.is_match });
    if state.behavior.is_match {
        result["employeeId"] = json!(state.behavior.matched_employee);
        result["similarity"] = json!(98.7);
        result["threshold"] = json!(90.0);
    }
    Json(result).into_response()
}

async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Response {
    state.record(Method::POST, &uri, &headers, &body);
    let form = String::from_utf8_lossy(&body).into_owned();
    let expected = format!("code={}", state.behavior.valid_code);
    if form.split('&').any(|pair| pair == expected) {
        Json(json!({ "id_token": "id-token-1", "token_type": "Bearer" })).into_response()
    } else {
        (StatusCode::BAD_REQUEST, r#"{"error":"invalid_grant"}"#).into_response()
    }
}

pub fn jpeg_blob() -> facegate_core::object::ImageBlob {
    facegate_core::object::ImageBlob::new(
        vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9],
        facegate_core::object::ContentType::jpeg(),
    )
}
