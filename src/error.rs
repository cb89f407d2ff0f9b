use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

/// Everything that can end an `/analyze` request early.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("no video file")]
    MissingVideo,

    #[error("{}", .0.body_text())]
    Multipart(#[from] MultipartError),

    #[error("unknown policy: {0}")]
    UnknownPolicy(String),

    /// The provider reported the uploaded asset as `FAILED`.
    #[error("Video upload failed")]
    UploadFailed,

    #[error("Video processing did not finish after {attempts} status checks")]
    ProcessingTimeout { attempts: u32 },

    #[error("Request cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0:#}")]
    Remote(#[from] anyhow::Error),
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl AnalyzeError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingVideo | Self::UnknownPolicy(_) => StatusCode::BAD_REQUEST,
            Self::Multipart(error) => error.status(),
            Self::UploadFailed
            | Self::ProcessingTimeout { .. }
            | Self::Cancelled
            | Self::Io(_)
            | Self::Remote(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AnalyzeError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
