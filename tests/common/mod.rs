#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use url::Url;
use uuid::Uuid;

use atlas::app::feed::FeedState;
use atlas::config::decode_key_32;
use atlas::infra::memory::MemoryStore;
use atlas::infra::storage::MemoryBlobStore;
use atlas::AppState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

// "0123456789abcdef0123456789abcdef" (32 bytes), test-only
pub const TEST_SESSION_KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";
pub const BLOB_BASE: &str = "http://blobs.test/";
pub const UPLOAD_MAX_BYTES: usize = 64 * 1024;
const BOUNDARY: &str = "atlas-test-boundary";

// ---------------------------------------------------------------------------
// TestApp: one fresh in-memory backend per test
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body_bytes).into_owned()
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }
}

pub struct TestViewer {
    pub id: Uuid,
    pub name: String,
    pub token: String,
}

pub async fn app() -> TestApp {
    TestApp::setup()
}

impl TestApp {
    fn setup() -> Self {
        let store = Arc::new(MemoryStore::default());
        let blobs = Arc::new(MemoryBlobStore::new(
            Url::parse(BLOB_BASE).expect("valid blob base"),
        ));

        let state = AppState {
            store: store.clone(),
            blobs: blobs.clone(),
            feed: FeedState::new(),
            session_key: decode_key_32(TEST_SESSION_KEY).expect("valid session key"),
            session_ttl_hours: 1,
            upload_max_bytes: UPLOAD_MAX_BYTES,
        };

        let router = atlas::http::router(state.clone());

        TestApp {
            router,
            state,
            store,
            blobs,
        }
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<(&str, Vec<u8>)>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some((content_type, bytes)) => builder
                .header("content-type", content_type)
                .body(Body::from(bytes))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, path, None, token).await
    }

    pub async fn post_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let bytes = serde_json::to_vec(&body).unwrap();
        self.request(Method::POST, path, Some(("application/json", bytes)), token)
            .await
    }

    pub async fn post_empty(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::POST, path, None, token).await
    }

    pub async fn patch_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let bytes = serde_json::to_vec(&body).unwrap();
        self.request(Method::PATCH, path, Some(("application/json", bytes)), token)
            .await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, path, None, token).await
    }

    /// Sends a GET and hands back the response without draining the body,
    /// for endpoints that stream.
    pub async fn open_stream(&self, path: &str) -> Response {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header("host", "localhost")
            .body(Body::empty())
            .unwrap();

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed")
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &str, &[u8])>,
        token: Option<&str>,
    ) -> TestResponse {
        let content_type = format!("multipart/form-data; boundary={}", BOUNDARY);
        let body = multipart_body(fields, file);
        self.request(Method::POST, path, Some((content_type.as_str(), body)), token)
            .await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Anonymous sign-in through the API.
    pub async fn sign_in(&self, name: &str) -> TestViewer {
        let resp = self
            .post_json("/v1/session", json!({ "display_name": name }), None)
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "sign-in failed: {}", resp.text());
        let body = resp.json();

        TestViewer {
            id: body["viewer"]["id"].as_str().unwrap().parse().unwrap(),
            name: body["viewer"]["display_name"].as_str().unwrap().to_string(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    /// Uploads a small text file with the given metadata fields and returns
    /// the created resource.
    pub async fn upload(&self, fields: &[(&str, &str)], token: Option<&str>) -> Value {
        let resp = self
            .post_multipart(
                "/v1/resources",
                fields,
                Some(("notes.txt", "text/plain", b"lesson notes")),
                token,
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "upload failed: {}", resp.text());
        resp.json()
    }

    /// Shortcut for a resource with a title, a category and defaults for the
    /// rest.
    pub async fn create_resource(
        &self,
        title: &str,
        category: &str,
        token: Option<&str>,
    ) -> Uuid {
        let body = self
            .upload(
                &[
                    ("title", title),
                    ("description", "A shared resource"),
                    ("category", category),
                ],
                token,
            )
            .await;
        body["id"].as_str().unwrap().parse().unwrap()
    }
}

pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    if let Some((file_name, content_type, bytes)) = file {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
