use serde::{Deserialize, Serialize};
use std::fmt;

/// Upstream account namespace. Each provider speaks exactly one wire
/// dialect natively; the mapping lives in `lmgate-core`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    GeminiCli,
    AiStudio,
    ClaudeCode,
    Codex,
    Qwen,
    IFlow,
    Amp,
    /// Arbitrary OpenAI-compatible endpoint, keyed by the configured name.
    OpenAiCompat(String),
}

impl ProviderKind {
    pub fn as_str(&self) -> &str {
        match self {
            ProviderKind::GeminiCli => "gemini-cli",
            ProviderKind::AiStudio => "aistudio",
            ProviderKind::ClaudeCode => "claude-code",
            ProviderKind::Codex => "codex",
            ProviderKind::Qwen => "qwen",
            ProviderKind::IFlow => "iflow",
            ProviderKind::Amp => "amp",
            ProviderKind::OpenAiCompat(name) => name.as_str(),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
