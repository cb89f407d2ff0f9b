use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const HARMFUL_CONTENT_PROMPT: &str = include_str!("prompts/harmful_content.txt");
const MILITARY_HATE_SPEECH_PROMPT: &str = include_str!("prompts/military_hate_speech.txt");

/// Moderation policy sent to the model along with the video.
///
/// Every variant is pure configuration data: a prompt and the time budget of
/// the generation call that uses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptPolicy {
    /// Hate speech, harassment and harmful acts, answered as a JSON verdict.
    #[default]
    HarmfulContent,
    /// Hate speech targeting TNI (Tentara Nasional Indonesia).
    MilitaryHateSpeech,
}

impl PromptPolicy {
    pub const ALL: [PromptPolicy; 2] = [Self::HarmfulContent, Self::MilitaryHateSpeech];

    pub fn name(self) -> &'static str {
        match self {
            Self::HarmfulContent => "harmful-content",
            Self::MilitaryHateSpeech => "military-hate-speech",
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Self::HarmfulContent => HARMFUL_CONTENT_PROMPT,
            Self::MilitaryHateSpeech => MILITARY_HATE_SPEECH_PROMPT,
        }
    }

    pub fn generation_timeout(self) -> Duration {
        match self {
            Self::HarmfulContent => Duration::from_secs(500),
            Self::MilitaryHateSpeech => Duration::from_secs(300),
        }
    }
}

impl fmt::Display for PromptPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PromptPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|policy| policy.name() == s)
            .ok_or_else(|| format!("unknown policy: {s}"))
    }
}
