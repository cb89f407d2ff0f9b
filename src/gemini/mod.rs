pub mod types;

pub use types::{ApiStatus, AssetState, UploadedAsset};

use anyhow::{Context, Result};
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Body, Client, Response, Url};
use serde_json::json;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::debug;
use types::{
    ApiErrorBody, Content, FileData, GenerateContentRequest, GenerateContentResponse, Part,
    UploadFileResponse,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const STATUS_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the parts of the Gemini REST API used by moderation:
/// the Files API and `generateContent`.
///
/// Built once at startup and shared by every request.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl Debug for GeminiClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let parsed = Url::parse(&base_url).context("Invalid Gemini base URL")?;

        let mut builder = Client::builder().connect_timeout(CONNECT_TIMEOUT);
        // A local endpoint (mock or sidecar) must never go through a proxy.
        if matches!(
            parsed.host_str(),
            Some("127.0.0.1" | "localhost" | "[::1]")
        ) {
            builder = builder.no_proxy();
        }
        let http = builder
            .build()
            .context("Failed to create HTTP client for Gemini")?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Upload a local file with the resumable protocol and return the new asset.
    pub async fn upload_file(
        &self,
        path: &Path,
        display_name: &str,
        mime_type: &str,
    ) -> Result<UploadedAsset> {
        let size = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();

        let response = self
            .http
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .header("x-goog-upload-protocol", "resumable")
            .header("x-goog-upload-command", "start")
            .header("x-goog-upload-header-content-length", size)
            .header("x-goog-upload-header-content-type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .context("Failed to start Gemini file upload")?;
        let response = check_status(response, "Gemini upload start").await?;

        let upload_url = response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|value| value.to_str().ok())
            .context("Gemini upload start returned no upload URL")?
            .to_string();
        debug!(%display_name, size, "Resumable upload session opened");

        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let response = self
            .http
            .post(&upload_url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(CONTENT_LENGTH, size)
            .header("x-goog-upload-offset", 0)
            .header("x-goog-upload-command", "upload, finalize")
            .body(Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .context("Failed to send video bytes to Gemini")?;
        let response = check_status(response, "Gemini upload").await?;

        let uploaded: UploadFileResponse = response
            .json()
            .await
            .context("Failed to parse Gemini upload response")?;

        Ok(uploaded.file)
    }

    /// Fetch the current metadata of an asset by resource name (`files/<id>`).
    pub async fn get_file(&self, name: &str) -> Result<UploadedAsset> {
        let response = self
            .http
            .get(format!("{}/v1beta/{name}", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(STATUS_TIMEOUT)
            .send()
            .await
            .context("Failed to fetch Gemini file status")?;
        let response = check_status(response, "Gemini file status").await?;

        response
            .json()
            .await
            .context("Failed to parse Gemini file status")
    }

    /// Ask the model about a ready asset. Returns the raw response text.
    pub async fn generate_content(
        &self,
        asset: &UploadedAsset,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::FileData(FileData {
                        mime_type: &asset.mime_type,
                        file_uri: &asset.uri,
                    }),
                    Part::Text(prompt),
                ],
            }],
        };

        let response = self
            .http
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .context("Failed to call Gemini generateContent")?;
        let response = check_status(response, "Gemini generateContent").await?;

        let generated: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Gemini generateContent response")?;

        generated.text()
    }
}

/// Turn a non-2xx response into an error carrying the provider's message.
async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|body| body.error.message)
        .unwrap_or(body);

    Err(anyhow::anyhow!("{what} failed: {status} - {message}"))
}
