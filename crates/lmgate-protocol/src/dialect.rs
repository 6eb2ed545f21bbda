use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire dialect spoken on one side of a translation edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    OpenAiChat,
    OpenAiResponses,
    ClaudeMessages,
    GeminiGenerate,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::OpenAiChat => "openai_chat",
            Dialect::OpenAiResponses => "openai_responses",
            Dialect::ClaudeMessages => "claude_messages",
            Dialect::GeminiGenerate => "gemini_generate",
        }
    }

    /// How streamed responses are framed on the wire for this dialect.
    pub fn framing(&self) -> StreamFraming {
        match self {
            Dialect::OpenAiChat => StreamFraming::SseDataOnly,
            Dialect::OpenAiResponses => StreamFraming::SseNamedEvent,
            Dialect::ClaudeMessages => StreamFraming::SseNamedEvent,
            Dialect::GeminiGenerate => StreamFraming::SseDataOnly,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFraming {
    /// `event: name` + `data: {...}` frames (Claude, OpenAI Responses).
    SseNamedEvent,
    /// `data: {...}` frames only; OpenAI Chat terminates with `[DONE]`.
    SseDataOnly,
}
