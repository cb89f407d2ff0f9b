use crate::AppState;
use crate::error::AnalyzeError;
use crate::moderation::{ModerationRequest, moderate};
use crate::policy::PromptPolicy;
use crate::staging::{StagedVideo, mime_type_for, sanitize_file_name};
use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::{Extension, Multipart, Query};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncWriteExt as _;
use tracing::{debug, error, info};

const VIDEO_FIELD: &str = "video";
const INDEX_HTML: &str = include_str!("../../static/index.html");

#[derive(Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub result: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeQuery {
    pub policy: Option<String>,
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// `POST /analyze`: stage the `video` field, run it through the model and
/// relay the raw answer. The staged file is removed on every path.
pub async fn analyze(
    Extension(state): Extension<AppState>,
    Query(query): Query<AnalyzeQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeResponse>, AnalyzeError> {
    let policy = match query.policy.as_deref() {
        Some(name) => name
            .parse::<PromptPolicy>()
            .map_err(|_| AnalyzeError::UnknownPolicy(name.to_string()))?,
        None => state.default_policy,
    };

    // Not a multipart body at all: there is no video field either.
    let mut multipart = multipart.map_err(|rejection| {
        debug!(%rejection, "Request body is not multipart");
        AnalyzeError::MissingVideo
    })?;

    let staged = loop {
        let Some(field) = multipart.next_field().await? else {
            return Err(AnalyzeError::MissingVideo);
        };
        if field.name() == Some(VIDEO_FIELD) {
            break stage_field(state.workspace(), field).await?;
        }
    };

    let outcome = moderate(&state, ModerationRequest::new(&staged, policy)).await;
    staged.remove().await;

    let result = outcome.inspect_err(|error| error!(%error, %policy, "Video analysis failed"))?;
    info!(%policy, len = result.len(), "Video analysis finished");

    Ok(Json(AnalyzeResponse { result }))
}

async fn stage_field(root: &Path, mut field: Field<'_>) -> Result<StagedVideo, AnalyzeError> {
    let file_name = sanitize_file_name(field.file_name());
    let mime_type = mime_type_for(&file_name, field.content_type());
    let (staged, mut file) = StagedVideo::create(root, file_name, mime_type).await?;

    let written = async {
        let mut size = 0u64;
        while let Some(chunk) = field.chunk().await? {
            size += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok::<_, AnalyzeError>(size)
    }
    .await;
    drop(file);

    match written {
        Ok(size) => {
            info!(
                file_name = staged.file_name(),
                mime_type = staged.mime_type(),
                size,
                "Video staged"
            );
            Ok(staged)
        }
        Err(error) => {
            error!(file_name = staged.file_name(), %error, "Failed to stage video");
            staged.remove().await;
            Err(error)
        }
    }
}
