//! Per-provider wire profiles: native dialect, endpoint, auth header
//! shape, and the payload tweaks each upstream requires.

use lmgate_common::{GatewayConfig, ModelMapping, ProviderKind};
use lmgate_pool::Credential;
use lmgate_protocol::Dialect;
use serde_json::Value;

const GEMINI_CLI_ENDPOINT: &str = "https://cloudcode-pa.googleapis.com/v1internal";
const AISTUDIO_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const CLAUDE_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const CODEX_ENDPOINT: &str = "https://chatgpt.com/backend-api/codex/responses";
const QWEN_ENDPOINT: &str = "https://portal.qwen.ai/v1/chat/completions";
const IFLOW_ENDPOINT: &str = "https://apis.iflow.cn/v1/chat/completions";

#[derive(Debug, Clone)]
pub struct ProviderProfile {
    pub kind: ProviderKind,
    pub dialect: Dialect,
    pub base_url: String,
    /// Pass unvalidated reasoning effort through for models the
    /// registry does not know.
    pub allow_compat_effort: bool,
    pub model_mappings: Vec<ModelMapping>,
}

impl ProviderProfile {
    pub fn for_kind(kind: &ProviderKind, config: &GatewayConfig) -> Option<Self> {
        let profile = match kind {
            ProviderKind::GeminiCli => Self {
                kind: kind.clone(),
                dialect: Dialect::GeminiGenerate,
                base_url: GEMINI_CLI_ENDPOINT.to_string(),
                allow_compat_effort: false,
                model_mappings: Vec::new(),
            },
            ProviderKind::AiStudio => Self {
                kind: kind.clone(),
                dialect: Dialect::GeminiGenerate,
                base_url: AISTUDIO_ENDPOINT.to_string(),
                allow_compat_effort: false,
                model_mappings: Vec::new(),
            },
            ProviderKind::ClaudeCode => Self {
                kind: kind.clone(),
                dialect: Dialect::ClaudeMessages,
                base_url: CLAUDE_ENDPOINT.to_string(),
                allow_compat_effort: false,
                model_mappings: Vec::new(),
            },
            ProviderKind::Codex => Self {
                kind: kind.clone(),
                dialect: Dialect::OpenAiResponses,
                base_url: CODEX_ENDPOINT.to_string(),
                allow_compat_effort: false,
                model_mappings: Vec::new(),
            },
            ProviderKind::Qwen => Self {
                kind: kind.clone(),
                dialect: Dialect::OpenAiChat,
                base_url: QWEN_ENDPOINT.to_string(),
                allow_compat_effort: false,
                model_mappings: Vec::new(),
            },
            ProviderKind::IFlow => Self {
                kind: kind.clone(),
                dialect: Dialect::OpenAiChat,
                base_url: IFLOW_ENDPOINT.to_string(),
                allow_compat_effort: false,
                model_mappings: Vec::new(),
            },
            ProviderKind::Amp => {
                let amp = config.ampcode.as_ref()?;
                Self {
                    kind: kind.clone(),
                    dialect: Dialect::OpenAiChat,
                    base_url: amp.upstream_url.clone()?,
                    allow_compat_effort: true,
                    model_mappings: amp.model_mappings.clone(),
                }
            }
            ProviderKind::OpenAiCompat(name) => {
                let entry = config
                    .openai_compatibility
                    .iter()
                    .find(|entry| &entry.name == name)?;
                Self {
                    kind: kind.clone(),
                    dialect: Dialect::OpenAiChat,
                    base_url: entry.base_url.trim_end_matches('/').to_string(),
                    allow_compat_effort: true,
                    model_mappings: entry.model_mappings.clone(),
                }
            }
        };
        Some(profile)
    }

    /// Substitute the wire model per configured mappings; identity when
    /// no mapping matches.
    pub fn map_model<'a>(&'a self, model: &'a str) -> &'a str {
        self.model_mappings
            .iter()
            .find(|mapping| mapping.from == model)
            .map(|mapping| mapping.to.as_str())
            .unwrap_or(model)
    }

    pub fn request_url(&self, model: &str, stream: bool) -> String {
        match self.kind {
            ProviderKind::GeminiCli => {
                let action = if stream {
                    "streamGenerateContent"
                } else {
                    "generateContent"
                };
                format!("{}:{action}?alt=sse", self.base_url)
            }
            ProviderKind::AiStudio => {
                let action = if stream {
                    "streamGenerateContent?alt=sse"
                } else {
                    "generateContent"
                };
                format!("{}/models/{model}:{action}", self.base_url)
            }
            ProviderKind::OpenAiCompat(_) | ProviderKind::Amp => {
                format!("{}/chat/completions", self.base_url)
            }
            _ => self.base_url.clone(),
        }
    }

    pub fn auth_headers(&self, credential: &Credential, config: &GatewayConfig) -> Vec<(String, String)> {
        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        match self.kind {
            ProviderKind::AiStudio => {
                if let Some(key) = &credential.api_key {
                    headers.push(("x-goog-api-key".to_string(), key.clone()));
                }
            }
            ProviderKind::ClaudeCode => {
                headers.push((
                    "anthropic-version".to_string(),
                    "2023-06-01".to_string(),
                ));
                if let Some(token) = &credential.access_token {
                    headers.push(("authorization".to_string(), format!("Bearer {token}")));
                } else if let Some(key) = &credential.api_key {
                    headers.push(("x-api-key".to_string(), key.clone()));
                }
            }
            ProviderKind::Amp => {
                let key = config
                    .ampcode
                    .as_ref()
                    .and_then(|amp| amp.upstream_api_key.clone())
                    .or_else(|| credential.api_key.clone());
                if let Some(key) = key {
                    headers.push(("authorization".to_string(), format!("Bearer {key}")));
                }
            }
            _ => {
                let token = credential
                    .access_token
                    .clone()
                    .or_else(|| credential.api_key.clone());
                if let Some(token) = token {
                    headers.push(("authorization".to_string(), format!("Bearer {token}")));
                }
            }
        }
        if self.dialect == Dialect::ClaudeMessages {
            headers.push(("accept".to_string(), "application/json".to_string()));
        }
        headers
    }

    /// Provider-specific payload normalization: stream flags, model
    /// override, account fields, request-shape quirks.
    pub fn postprocess(
        &self,
        payload: &mut Value,
        credential: &Credential,
        upstream_model: &str,
        stream: bool,
    ) {
        match self.kind {
            ProviderKind::GeminiCli => {
                // Cloud Code wraps the generate request in an envelope
                // carrying the model and the account's project id.
                let request = payload.clone();
                let mut wrapped = serde_json::Map::new();
                wrapped.insert("model".to_string(), Value::from(upstream_model));
                if let Some(project) = &credential.project_id {
                    wrapped.insert("project".to_string(), Value::from(project.clone()));
                }
                let mut request = request;
                if let Some(object) = request.as_object_mut() {
                    object.remove("model");
                }
                wrapped.insert("request".to_string(), request);
                *payload = Value::Object(wrapped);
            }
            ProviderKind::AiStudio => {
                if let Some(object) = payload.as_object_mut() {
                    object.remove("model");
                }
            }
            ProviderKind::Codex => {
                if let Some(object) = payload.as_object_mut() {
                    object.insert("model".to_string(), Value::from(upstream_model));
                    // Codex always streams and manages no response state.
                    object.insert("stream".to_string(), Value::from(true));
                    object.remove("previous_response_id");
                }
            }
            _ => {
                if let Some(object) = payload.as_object_mut() {
                    object.insert("model".to_string(), Value::from(upstream_model));
                    if stream {
                        object.insert("stream".to_string(), Value::from(true));
                    } else {
                        object.remove("stream");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> GatewayConfig {
        GatewayConfig::default()
    }

    #[test]
    fn gemini_cli_wraps_request_with_project() {
        let profile =
            ProviderProfile::for_kind(&ProviderKind::GeminiCli, &config()).unwrap();
        let mut credential =
            Credential::oauth(ProviderKind::GeminiCli, "a", "tok", None, None);
        credential.project_id = Some("proj-1".to_string());
        let mut payload = json!({"contents": [], "model": "ignored"});
        profile.postprocess(&mut payload, &credential, "gemini-2.5-pro", true);
        assert_eq!(payload["model"], "gemini-2.5-pro");
        assert_eq!(payload["project"], "proj-1");
        assert!(payload["request"].get("model").is_none());
        assert!(payload["request"]["contents"].is_array());
    }

    #[test]
    fn codex_forces_stream_and_drops_previous_response_id() {
        let profile = ProviderProfile::for_kind(&ProviderKind::Codex, &config()).unwrap();
        let credential = Credential::oauth(ProviderKind::Codex, "a", "tok", None, None);
        let mut payload = json!({
            "model": "gpt-5(high)",
            "previous_response_id": "resp_1",
            "input": [],
        });
        profile.postprocess(&mut payload, &credential, "gpt-5", false);
        assert_eq!(payload["model"], "gpt-5");
        assert_eq!(payload["stream"], true);
        assert!(payload.get("previous_response_id").is_none());
    }

    #[test]
    fn compat_profile_maps_models() {
        let mut config = config();
        config.openai_compatibility = vec![lmgate_common::OpenAiCompatConfig {
            name: "local".to_string(),
            base_url: "http://127.0.0.1:8000/v1/".to_string(),
            api_key_entries: Vec::new(),
            model_mappings: vec![ModelMapping {
                from: "my-model".to_string(),
                to: "served-model".to_string(),
            }],
        }];
        let profile = ProviderProfile::for_kind(
            &ProviderKind::OpenAiCompat("local".to_string()),
            &config,
        )
        .unwrap();
        assert_eq!(profile.map_model("my-model"), "served-model");
        assert_eq!(profile.map_model("other"), "other");
        assert_eq!(
            profile.request_url("m", true),
            "http://127.0.0.1:8000/v1/chat/completions"
        );
        assert!(profile.allow_compat_effort);
    }
}
