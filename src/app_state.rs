use crate::config::Config;
use crate::gemini::GeminiClient;
use crate::moderation::PollPolicy;
use crate::policy::PromptPolicy;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Process-wide state, built once at startup and shared read-only by every request.
#[derive(Clone)]
pub struct AppState {
    pub gemini: Arc<GeminiClient>,
    pub poll_policy: PollPolicy,
    pub default_policy: PromptPolicy,
    pub max_upload_bytes: usize,
    /// Fires on shutdown; in-flight requests stop waiting on the provider.
    pub shutdown: CancellationToken,

    workspace: PathBuf,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let workspace = PathBuf::from(&config.workspace);
        tokio::fs::create_dir_all(&workspace).await?;

        let gemini = GeminiClient::new(
            &config.gemini_base_url,
            &config.gemini_api_key,
            &config.model,
        )?;
        info!(
            workspace = %workspace.display(),
            model = %config.model,
            policy = %config.policy,
            "Application state initialized"
        );

        Ok(Self {
            gemini: Arc::new(gemini),
            poll_policy: config.poll_policy(),
            default_policy: config.policy,
            max_upload_bytes: config.max_upload_bytes(),
            shutdown: CancellationToken::new(),
            workspace,
        })
    }

    /// Root under which each request gets its own staging directory.
    pub fn workspace(&self) -> &Path {
        self.workspace.as_path()
    }
}
