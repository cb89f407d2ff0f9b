#![allow(dead_code)]

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path as AxumPath, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde_json::{Value as JsonValue, json};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use video_moderation::Config;

/// How the mock provider treats uploads and generation calls.
#[derive(Clone, Debug)]
pub struct MockBehavior {
    /// Status checks answered with `PROCESSING` before `final_state`.
    pub processing_polls: u32,
    pub final_state: &'static str,
    /// `Ok(text)` is returned as the model answer, `Err((status, message))`
    /// as a provider error.
    pub generation: Result<String, (u16, String)>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            processing_polls: 0,
            final_state: "ACTIVE",
            generation: Ok(r#"{"classification": "none", "severity": "low"}"#.to_string()),
        }
    }
}

#[derive(Default)]
pub struct MockRecord {
    pub uploads: u32,
    pub uploaded_bytes: Vec<usize>,
    pub display_names: Vec<String>,
    pub status_checks: u32,
    pub generate_requests: Vec<JsonValue>,
    pub api_keys: Vec<String>,
}

struct MockState {
    port: u16,
    behavior: MockBehavior,
    record: Mutex<MockRecord>,
}

/// In-process stand-in for the Gemini Files + generateContent API.
pub struct MockGemini {
    handle: JoinHandle<()>,
    pub port: u16,
    state: Arc<MockState>,
}

impl MockGemini {
    pub async fn start(behavior: MockBehavior) -> Self {
        let port = portpicker::pick_unused_port().expect("No available port for mock Gemini");
        let state = Arc::new(MockState {
            port,
            behavior,
            record: Mutex::new(MockRecord::default()),
        });

        let app = Router::new()
            .route("/upload/v1beta/files", post(start_upload))
            .route("/upload-session/{id}", post(finish_upload))
            .route("/v1beta/files/{id}", get(file_status))
            .route("/v1beta/models/{model_action}", post(generate))
            .with_state(state.clone());

        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .expect("Failed to bind mock Gemini");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockGemini {
            handle,
            port,
            state,
        }
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub async fn record<T>(&self, f: impl FnOnce(&MockRecord) -> T) -> T {
        f(&*self.state.record.lock().await)
    }
}

impl Drop for MockGemini {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn file_json(state: &MockState, id: &str, file_state: &str) -> JsonValue {
    json!({
        "name": format!("files/{id}"),
        "uri": format!("http://127.0.0.1:{}/v1beta/files/{id}", state.port),
        "mimeType": "video/mp4",
        "state": file_state,
    })
}

async fn start_upload(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };

    if header("x-goog-upload-command") != "start" || header("x-goog-upload-protocol") != "resumable"
    {
        return (StatusCode::BAD_REQUEST, "expected resumable start").into_response();
    }

    let mut record = state.record.lock().await;
    record.uploads += 1;
    record.api_keys.push(header("x-goog-api-key"));
    record.display_names.push(
        body["file"]["display_name"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
    );

    let upload_url = format!(
        "http://127.0.0.1:{}/upload-session/{}",
        state.port, record.uploads
    );
    (StatusCode::OK, [("x-goog-upload-url", upload_url)]).into_response()
}

async fn finish_upload(
    State(state): State<Arc<MockState>>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let command = headers
        .get("x-goog-upload-command")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if command != "upload, finalize" {
        return (StatusCode::BAD_REQUEST, "expected upload, finalize").into_response();
    }

    state.record.lock().await.uploaded_bytes.push(body.len());

    let file_state = if state.behavior.processing_polls > 0 {
        "PROCESSING"
    } else {
        state.behavior.final_state
    };
    Json(json!({ "file": file_json(&state, &id, file_state) })).into_response()
}

async fn file_status(
    State(state): State<Arc<MockState>>,
    AxumPath(id): AxumPath<String>,
) -> Json<JsonValue> {
    let mut record = state.record.lock().await;
    record.status_checks += 1;

    let file_state = if record.status_checks < state.behavior.processing_polls {
        "PROCESSING"
    } else {
        state.behavior.final_state
    };
    Json(file_json(&state, &id, file_state))
}

async fn generate(
    State(state): State<Arc<MockState>>,
    AxumPath(model_action): AxumPath<String>,
    Json(body): Json<JsonValue>,
) -> Response {
    if !model_action.ends_with(":generateContent") {
        return (StatusCode::NOT_FOUND, "unknown action").into_response();
    }
    state.record.lock().await.generate_requests.push(body);

    match &state.behavior.generation {
        Ok(text) => Json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        }))
        .into_response(),
        Err((status, message)) => (
            StatusCode::from_u16(*status).unwrap(),
            Json(json!({
                "error": { "code": status, "message": message, "status": "INTERNAL" }
            })),
        )
            .into_response(),
    }
}

/// The moderation server running against a [`MockGemini`].
pub struct TestServer {
    handle: JoinHandle<anyhow::Result<()>>,
    pub port: u16,
    pub workspace: PathBuf,
}

impl TestServer {
    pub async fn start(gemini: &MockGemini) -> Self {
        Self::start_with(gemini, |_| {}).await
    }

    pub async fn start_with(gemini: &MockGemini, tweak: impl FnOnce(&mut Config)) -> Self {
        // Only open when debugging
        // tracing_subscriber::fmt::init();

        let port = portpicker::pick_unused_port().expect("No available port");

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let workspace = std::env::temp_dir().join(format!("test-moderation-{port}-{now}"));

        let mut config = Config {
            listen_on_port: port,
            workspace: workspace.to_string_lossy().into_owned(),
            gemini_api_key: "test-api-key".to_string(),
            gemini_base_url: gemini.url(),
            poll_interval_secs: 1,
            poll_max_interval_secs: 1,
            ..Default::default()
        };
        tweak(&mut config);

        let handle = tokio::spawn(video_moderation::run(config));

        let server = TestServer {
            handle,
            port,
            workspace,
        };

        // Poll until server is ready
        let client = server.client();
        for _ in 0..200 {
            if let Ok(response) = client.get(server.url("/healthz")).send().await
                && response.status().is_success()
            {
                break;
            }

            sleep(Duration::from_millis(10)).await;
        }

        server
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }

    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap()
    }

    /// POST `data` as the `video` field of a multipart form.
    pub async fn analyze(&self, query: &str, data: Vec<u8>) -> reqwest::Response {
        let part = reqwest::multipart::Part::bytes(data)
            .file_name("clip.mp4")
            .mime_str("video/mp4")
            .unwrap();
        let form = reqwest::multipart::Form::new().part("video", part);

        self.client()
            .post(self.url(&format!("/analyze{query}")))
            .multipart(form)
            .send()
            .await
            .expect("analyze request failed")
    }

    /// Number of entries left in the staging root.
    pub fn staged_entries(&self) -> usize {
        std::fs::read_dir(&self.workspace)
            .map(|dir| dir.count())
            .unwrap_or(0)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
        let _ = std::fs::remove_dir_all(&self.workspace);
    }
}

pub fn sample_video() -> Vec<u8> {
    // ftyp box of an mp4 followed by filler; the mock never decodes it.
    let mut data = b"\x00\x00\x00\x18ftypmp42\x00\x00\x00\x00mp42isom".to_vec();
    data.extend(std::iter::repeat_n(0u8, 64 * 1024));
    data
}
