use crate::error::AnalyzeError;
use crate::gemini::{AssetState, GeminiClient, UploadedAsset};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Bounds of the wait for a remote asset to leave its processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: u32,
    /// Maximum number of status checks before giving up.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(30),
            multiplier: 2,
            max_attempts: 120,
        }
    }
}

impl PollPolicy {
    fn next_interval(&self, current: Duration) -> Duration {
        current
            .saturating_mul(self.multiplier)
            .min(self.max_interval)
    }
}

/// Anything that can report the current state of an uploaded asset.
pub trait AssetSource {
    fn fetch_asset(
        &self,
        name: &str,
    ) -> impl Future<Output = anyhow::Result<UploadedAsset>> + Send;
}

impl AssetSource for GeminiClient {
    fn fetch_asset(
        &self,
        name: &str,
    ) -> impl Future<Output = anyhow::Result<UploadedAsset>> + Send {
        self.get_file(name)
    }
}

/// Poll `source` until `asset` reaches a terminal state.
///
/// `Ready` hands the asset back, `Failed` becomes [`AnalyzeError::UploadFailed`].
/// The wait gives up after `policy.max_attempts` status checks and stops as
/// soon as `cancel` fires.
pub async fn wait_until_ready<S: AssetSource>(
    source: &S,
    mut asset: UploadedAsset,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<UploadedAsset, AnalyzeError> {
    let mut attempts = 0;
    let mut interval = policy.initial_interval;

    loop {
        match asset.state {
            AssetState::Ready => {
                info!(name = %asset.name, attempts, "Remote asset ready");
                return Ok(asset);
            }
            AssetState::Failed => {
                warn!(
                    name = %asset.name,
                    reason = asset.error.as_ref().map(|e| e.message.as_str()).unwrap_or(""),
                    "Remote asset processing failed"
                );
                return Err(AnalyzeError::UploadFailed);
            }
            AssetState::Pending | AssetState::Processing => {}
        }

        if attempts >= policy.max_attempts {
            warn!(name = %asset.name, attempts, "Gave up waiting for remote asset");
            return Err(AnalyzeError::ProcessingTimeout { attempts });
        }

        debug!(name = %asset.name, state = ?asset.state, ?interval, "Asset still processing");
        tokio::select! {
            _ = cancel.cancelled() => return Err(AnalyzeError::Cancelled),
            _ = tokio::time::sleep(interval) => {}
        }

        let name = asset.name.clone();
        asset = tokio::select! {
            _ = cancel.cancelled() => return Err(AnalyzeError::Cancelled),
            fetched = source.fetch_asset(&name) => fetched?,
        };
        attempts += 1;
        interval = policy.next_interval(interval);
    }
}
