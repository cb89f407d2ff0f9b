pub mod poll;

pub use poll::{AssetSource, PollPolicy, wait_until_ready};

use crate::app_state::AppState;
use crate::error::AnalyzeError;
use crate::policy::PromptPolicy;
use crate::staging::StagedVideo;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// One video on its way to a verdict.
#[derive(Debug, Clone, Copy)]
pub struct ModerationRequest<'a> {
    pub path: &'a Path,
    pub display_name: &'a str,
    pub mime_type: &'a str,
    pub policy: PromptPolicy,
}

impl<'a> ModerationRequest<'a> {
    pub fn new(video: &'a StagedVideo, policy: PromptPolicy) -> Self {
        Self {
            path: video.path(),
            display_name: video.file_name(),
            mime_type: video.mime_type(),
            policy,
        }
    }

    pub fn prompt(&self) -> &'static str {
        self.policy.prompt()
    }

    pub fn timeout(&self) -> Duration {
        self.policy.generation_timeout()
    }
}

/// Upload the video, wait for the provider to process it, then ask the model.
/// Returns the model's text untouched.
pub async fn moderate(
    state: &AppState,
    request: ModerationRequest<'_>,
) -> Result<String, AnalyzeError> {
    let gemini = state.gemini.as_ref();
    let cancel = state.shutdown.child_token();

    let asset = gemini
        .upload_file(request.path, request.display_name, request.mime_type)
        .await?;
    info!(
        name = %asset.name,
        display_name = request.display_name,
        state = ?asset.state,
        "Video uploaded to Gemini"
    );

    let asset = wait_until_ready(gemini, asset, &state.poll_policy, &cancel).await?;

    info!(
        name = %asset.name,
        policy = %request.policy,
        model = gemini.model(),
        "Requesting moderation verdict"
    );
    let text = tokio::select! {
        _ = cancel.cancelled() => return Err(AnalyzeError::Cancelled),
        generated = gemini.generate_content(&asset, request.prompt(), request.timeout()) => generated?,
    };

    Ok(text)
}
