use lmgate_protocol::Dialect;
use serde_json::json;

/// Client-visible error taxonomy. Pool-level failures are retried
/// before one of these surfaces; translation failures are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    ModelUnknown,
    TranslationUnsupported,
    ThinkingInvalid,
    InvalidRequest,
    RateLimited,
    UpstreamError,
    Timeout,
}

impl ErrorKind {
    pub fn status(&self) -> u16 {
        match self {
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::ModelUnknown => 404,
            ErrorKind::TranslationUnsupported
            | ErrorKind::ThinkingInvalid
            | ErrorKind::InvalidRequest => 400,
            ErrorKind::RateLimited => 429,
            ErrorKind::UpstreamError => 502,
            ErrorKind::Timeout => 504,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::ModelUnknown => "model_unknown",
            ErrorKind::TranslationUnsupported => "translation_unsupported",
            ErrorKind::ThinkingInvalid => "thinking_invalid",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::UpstreamError => "upstream_error",
            ErrorKind::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{}: {message}", kind.as_str())]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn model_unknown(model: &str) -> Self {
        Self::new(ErrorKind::ModelUnknown, format!("unknown model {model:?}"))
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamError, message)
    }

    pub fn status(&self) -> u16 {
        self.kind.status()
    }

    /// Error body in the inbound dialect's shape.
    pub fn body(&self, dialect: Dialect) -> serde_json::Value {
        match dialect {
            Dialect::ClaudeMessages => json!({
                "type": "error",
                "error": {"type": self.kind.as_str(), "message": self.message},
            }),
            Dialect::GeminiGenerate => json!({
                "error": {
                    "code": self.status(),
                    "status": self.kind.as_str(),
                    "message": self.message,
                },
            }),
            Dialect::OpenAiChat | Dialect::OpenAiResponses => json!({
                "error": {
                    "type": self.kind.as_str(),
                    "code": self.kind.as_str(),
                    "message": self.message,
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_the_taxonomy() {
        assert_eq!(ErrorKind::Unauthorized.status(), 401);
        assert_eq!(ErrorKind::ModelUnknown.status(), 404);
        assert_eq!(ErrorKind::TranslationUnsupported.status(), 400);
        assert_eq!(ErrorKind::RateLimited.status(), 429);
        assert_eq!(ErrorKind::UpstreamError.status(), 502);
        assert_eq!(ErrorKind::Timeout.status(), 504);
    }

    #[test]
    fn claude_body_uses_the_error_envelope() {
        let err = GatewayError::model_unknown("x");
        let body = err.body(Dialect::ClaudeMessages);
        assert_eq!(body["type"], "error");
        assert_eq!(body["error"]["type"], "model_unknown");
    }
}
