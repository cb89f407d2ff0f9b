use crate::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::moderation::PollPolicy;
use crate::policy::PromptPolicy;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure that can be loaded from CLI, config file, or environment
///
/// Example configuration file content
/// # Video Moderation Configuration
///
/// # Server configuration
/// listen_on_port = 3000
/// workspace = "/var/tmp/video-moderation"
/// max_upload_mb = 512
///
/// # Gemini configuration
/// gemini_api_key = "..."          # or GEMINI_API_KEY in the environment
/// gemini_base_url = "https://generativelanguage.googleapis.com"
/// model = "gemini-2.0-flash"
/// policy = "harmful-content"      # or "military-hate-speech"
///
/// # Waiting for uploaded videos to be processed
/// poll_interval_secs = 5
/// poll_max_interval_secs = 30
/// poll_max_attempts = 120
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[serde(default)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Port to listen on
    #[arg(short, long, default_value_t = 3000)]
    #[serde(default = "default_port")]
    pub listen_on_port: u16,

    /// Directory where uploads are staged while being analyzed
    #[arg(short = 'w', long, default_value_t = default_workspace())]
    #[serde(default = "default_workspace")]
    pub workspace: String,

    /// Configuration file path (overrides all other arguments)
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", default_value = "", hide_env_values = true)]
    #[serde(skip_serializing)]
    pub gemini_api_key: String,

    /// Gemini API base URL
    #[arg(long, default_value_t = default_base_url())]
    #[serde(default = "default_base_url")]
    pub gemini_base_url: String,

    /// Gemini model used for moderation
    #[arg(short, long, default_value_t = default_model())]
    #[serde(default = "default_model")]
    pub model: String,

    /// Moderation policy used when a request does not pick one
    #[arg(short, long, default_value_t = PromptPolicy::default())]
    pub policy: PromptPolicy,

    /// Seconds before the first status check of an uploaded video
    #[arg(long, default_value_t = 5)]
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Upper bound of the backoff between status checks, in seconds
    #[arg(long, default_value_t = 30)]
    #[serde(default = "default_poll_max_interval_secs")]
    pub poll_max_interval_secs: u64,

    /// Number of status checks before a request gives up
    #[arg(long, default_value_t = 120)]
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,

    /// Largest accepted request body, in MiB
    #[arg(long, default_value_t = 512)]
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_on_port: default_port(),
            workspace: default_workspace(),
            config: None,
            gemini_api_key: String::new(),
            gemini_base_url: default_base_url(),
            model: default_model(),
            policy: PromptPolicy::default(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_max_interval_secs: default_poll_max_interval_secs(),
            poll_max_attempts: default_poll_max_attempts(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl Config {
    /// Load configuration from CLI args, optionally merging with a config file
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Config::parse();

        if let Some(config_path) = &config.config {
            let file_config = Self::from_file(Path::new(config_path))?;
            config = config.merge_with_file(file_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merge with file config, CLI args take precedence
    fn merge_with_file(mut self, file_config: Config) -> Self {
        // If CLI value is default, use file value
        if self.listen_on_port == default_port() {
            self.listen_on_port = file_config.listen_on_port;
        }
        if self.workspace == default_workspace() {
            self.workspace = file_config.workspace;
        }
        if self.gemini_api_key.is_empty() {
            self.gemini_api_key = file_config.gemini_api_key;
        }
        if self.gemini_base_url == default_base_url() {
            self.gemini_base_url = file_config.gemini_base_url;
        }
        if self.model == default_model() {
            self.model = file_config.model;
        }
        if self.policy == PromptPolicy::default() {
            self.policy = file_config.policy;
        }
        if self.poll_interval_secs == default_poll_interval_secs() {
            self.poll_interval_secs = file_config.poll_interval_secs;
        }
        if self.poll_max_interval_secs == default_poll_max_interval_secs() {
            self.poll_max_interval_secs = file_config.poll_max_interval_secs;
        }
        if self.poll_max_attempts == default_poll_max_attempts() {
            self.poll_max_attempts = file_config.poll_max_attempts;
        }
        if self.max_upload_mb == default_max_upload_mb() {
            self.max_upload_mb = file_config.max_upload_mb;
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.gemini_api_key.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "Gemini API key is required (--gemini-api-key or GEMINI_API_KEY)"
            ));
        }

        if !self.gemini_base_url.starts_with("http://")
            && !self.gemini_base_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "Gemini base URL must start with http:// or https://"
            ));
        }

        if self.model.trim().is_empty() {
            return Err(anyhow::anyhow!("Model name cannot be empty"));
        }

        if self.workspace.is_empty() {
            return Err(anyhow::anyhow!("Workspace cannot be empty"));
        }

        if self.poll_interval_secs == 0 || self.poll_max_attempts == 0 {
            return Err(anyhow::anyhow!(
                "poll_interval_secs and poll_max_attempts must be greater than 0"
            ));
        }

        if self.poll_max_interval_secs < self.poll_interval_secs {
            return Err(anyhow::anyhow!(
                "poll_max_interval_secs must not be lower than poll_interval_secs"
            ));
        }

        if self.max_upload_mb == 0 {
            return Err(anyhow::anyhow!("max_upload_mb must be greater than 0"));
        }

        Ok(())
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            initial_interval: Duration::from_secs(self.poll_interval_secs),
            max_interval: Duration::from_secs(self.poll_max_interval_secs),
            max_attempts: self.poll_max_attempts,
            ..Default::default()
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

// Default value functions
fn default_port() -> u16 {
    3000
}

fn default_workspace() -> String {
    std::env::temp_dir()
        .join("video-moderation")
        .to_string_lossy()
        .into_owned()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_poll_max_interval_secs() -> u64 {
    30
}

fn default_poll_max_attempts() -> u32 {
    120
}

fn default_max_upload_mb() -> usize {
    512
}
