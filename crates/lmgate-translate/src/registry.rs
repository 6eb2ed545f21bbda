use std::collections::HashMap;
use std::sync::Arc;

use lmgate_protocol::claude::MessagesRequest;
use lmgate_protocol::gemini::{GenerateContentRequest, GenerateContentResponse};
use lmgate_protocol::openai::chat::{ChatCompletionRequest, ChatCompletionResponse};
use lmgate_protocol::openai::responses::{ResponsesRequest, ResponsesResponse};
use lmgate_protocol::Dialect;

use crate::edge::{Edge, StreamTranslator, TranslateError};
use crate::{
    claude2gemini, gemini2claude, gemini2openai_chat, openai_chat2gemini,
    openai_chat2openai_responses, openai_responses2openai_chat,
};

/// Owns the `(from, to)` edge table. Identity pairs resolve without
/// registration; registering an existing pair replaces it. Missing
/// pairs surface as [`TranslateError::UnsupportedPair`].
pub struct TranslatorRegistry {
    edges: HashMap<(Dialect, Dialect), Edge>,
}

impl TranslatorRegistry {
    pub fn new() -> Self {
        Self {
            edges: HashMap::new(),
        }
    }

    /// Registry with the full four-dialect matrix installed: six direct
    /// edges plus six composites built by function composition.
    pub fn with_default_edges() -> Self {
        let mut registry = Self::new();
        registry.register(edge_chat_to_gemini());
        registry.register(edge_gemini_to_chat());
        registry.register(edge_claude_to_gemini());
        registry.register(edge_gemini_to_claude());
        registry.register(edge_responses_to_chat());
        registry.register(edge_chat_to_responses());

        registry.register_composed(
            Dialect::OpenAiResponses,
            Dialect::OpenAiChat,
            Dialect::GeminiGenerate,
        );
        registry.register_composed(
            Dialect::GeminiGenerate,
            Dialect::OpenAiChat,
            Dialect::OpenAiResponses,
        );
        registry.register_composed(
            Dialect::ClaudeMessages,
            Dialect::GeminiGenerate,
            Dialect::OpenAiChat,
        );
        registry.register_composed(
            Dialect::OpenAiChat,
            Dialect::GeminiGenerate,
            Dialect::ClaudeMessages,
        );
        registry.register_composed(
            Dialect::ClaudeMessages,
            Dialect::OpenAiChat,
            Dialect::OpenAiResponses,
        );
        registry.register_composed(
            Dialect::OpenAiResponses,
            Dialect::OpenAiChat,
            Dialect::ClaudeMessages,
        );
        registry
    }

    pub fn register(&mut self, edge: Edge) {
        self.edges.insert((edge.from, edge.to), edge);
    }

    /// Builds `from -> to` by composing the already-registered
    /// `from -> via` and `via -> to` edges.
    pub fn register_composed(&mut self, from: Dialect, via: Dialect, to: Dialect) -> bool {
        let (Some(first), Some(second)) =
            (self.edges.get(&(from, via)), self.edges.get(&(via, to)))
        else {
            return false;
        };
        let composed = Edge::compose(first, second);
        self.edges.insert((from, to), composed);
        true
    }

    pub fn edge(&self, from: Dialect, to: Dialect) -> Result<Edge, TranslateError> {
        if from == to {
            return Ok(Edge::identity(from));
        }
        self.edges
            .get(&(from, to))
            .cloned()
            .ok_or(TranslateError::UnsupportedPair { from, to })
    }

    pub fn translate_request(
        &self,
        from: Dialect,
        to: Dialect,
        model: &str,
        raw: &[u8],
        stream: bool,
    ) -> Result<Vec<u8>, TranslateError> {
        let edge = self.edge(from, to)?;
        (edge.request)(model, raw, stream)
    }

    pub fn translate_response(
        &self,
        from: Dialect,
        to: Dialect,
        raw: &[u8],
    ) -> Result<Vec<u8>, TranslateError> {
        let edge = self.edge(from, to)?;
        (edge.response)(raw)
    }

    pub fn open_stream(
        &self,
        from: Dialect,
        to: Dialect,
    ) -> Result<Box<dyn StreamTranslator>, TranslateError> {
        let edge = self.edge(from, to)?;
        Ok((edge.stream)())
    }
}

impl Default for TranslatorRegistry {
    fn default() -> Self {
        Self::with_default_edges()
    }
}

fn parse<T: serde::de::DeserializeOwned>(
    dialect: Dialect,
    raw: &[u8],
) -> Result<T, TranslateError> {
    serde_json::from_slice(raw).map_err(|err| TranslateError::malformed(dialect, err))
}

fn render<T: serde::Serialize>(dialect: Dialect, value: &T) -> Result<Vec<u8>, TranslateError> {
    serde_json::to_vec(value).map_err(|err| TranslateError::malformed(dialect, err))
}

fn edge_chat_to_gemini() -> Edge {
    Edge {
        from: Dialect::OpenAiChat,
        to: Dialect::GeminiGenerate,
        request: Arc::new(|model, raw, _stream| {
            let req: ChatCompletionRequest = parse(Dialect::OpenAiChat, raw)?;
            let mut out = openai_chat2gemini::request::translate_request(req);
            out.model = Some(model.to_string());
            render(Dialect::GeminiGenerate, &out)
        }),
        response: Arc::new(|raw| {
            let resp: GenerateContentResponse = parse(Dialect::GeminiGenerate, raw)?;
            render(
                Dialect::OpenAiChat,
                &openai_chat2gemini::response::translate_response(resp),
            )
        }),
        stream: Arc::new(|| Box::new(openai_chat2gemini::stream::GeminiToChatStream::new())),
    }
}

fn edge_gemini_to_chat() -> Edge {
    Edge {
        from: Dialect::GeminiGenerate,
        to: Dialect::OpenAiChat,
        request: Arc::new(|model, raw, stream| {
            let req: GenerateContentRequest = parse(Dialect::GeminiGenerate, raw)?;
            let mut out = gemini2openai_chat::request::translate_request(req, model);
            out.stream = stream.then_some(true);
            render(Dialect::OpenAiChat, &out)
        }),
        response: Arc::new(|raw| {
            let resp: ChatCompletionResponse = parse(Dialect::OpenAiChat, raw)?;
            render(
                Dialect::GeminiGenerate,
                &gemini2openai_chat::response::translate_response(resp),
            )
        }),
        stream: Arc::new(|| Box::new(gemini2openai_chat::stream::ChatToGeminiStream::new())),
    }
}

fn edge_claude_to_gemini() -> Edge {
    Edge {
        from: Dialect::ClaudeMessages,
        to: Dialect::GeminiGenerate,
        request: Arc::new(|model, raw, _stream| {
            let req: MessagesRequest = parse(Dialect::ClaudeMessages, raw)?;
            let mut out = claude2gemini::request::translate_request(req);
            out.model = Some(model.to_string());
            render(Dialect::GeminiGenerate, &out)
        }),
        response: Arc::new(|raw| {
            let resp: GenerateContentResponse = parse(Dialect::GeminiGenerate, raw)?;
            render(
                Dialect::ClaudeMessages,
                &claude2gemini::response::translate_response(resp),
            )
        }),
        stream: Arc::new(|| Box::new(claude2gemini::stream::GeminiToClaudeStream::new())),
    }
}

fn edge_gemini_to_claude() -> Edge {
    Edge {
        from: Dialect::GeminiGenerate,
        to: Dialect::ClaudeMessages,
        request: Arc::new(|model, raw, stream| {
            let req: GenerateContentRequest = parse(Dialect::GeminiGenerate, raw)?;
            let mut out = gemini2claude::request::translate_request(req, model);
            out.stream = stream.then_some(true);
            render(Dialect::ClaudeMessages, &out)
        }),
        response: Arc::new(|raw| {
            let resp: lmgate_protocol::claude::MessagesResponse =
                parse(Dialect::ClaudeMessages, raw)?;
            render(
                Dialect::GeminiGenerate,
                &gemini2claude::response::translate_response(resp),
            )
        }),
        stream: Arc::new(|| Box::new(gemini2claude::stream::ClaudeToGeminiStream::new())),
    }
}

fn edge_responses_to_chat() -> Edge {
    Edge {
        from: Dialect::OpenAiResponses,
        to: Dialect::OpenAiChat,
        request: Arc::new(|model, raw, stream| {
            let req: ResponsesRequest = parse(Dialect::OpenAiResponses, raw)?;
            let mut out = openai_responses2openai_chat::request::translate_request(req);
            out.model = model.to_string();
            out.stream = stream.then_some(true);
            render(Dialect::OpenAiChat, &out)
        }),
        response: Arc::new(|raw| {
            let resp: ChatCompletionResponse = parse(Dialect::OpenAiChat, raw)?;
            render(
                Dialect::OpenAiResponses,
                &openai_responses2openai_chat::response::translate_response(resp),
            )
        }),
        stream: Arc::new(|| {
            Box::new(openai_responses2openai_chat::stream::ChatToResponsesStream::new())
        }),
    }
}

fn edge_chat_to_responses() -> Edge {
    Edge {
        from: Dialect::OpenAiChat,
        to: Dialect::OpenAiResponses,
        request: Arc::new(|model, raw, stream| {
            let req: ChatCompletionRequest = parse(Dialect::OpenAiChat, raw)?;
            let mut out = openai_chat2openai_responses::request::translate_request(req);
            out.model = model.to_string();
            out.stream = stream.then_some(true);
            render(Dialect::OpenAiResponses, &out)
        }),
        response: Arc::new(|raw| {
            let resp: ResponsesResponse = parse(Dialect::OpenAiResponses, raw)?;
            render(
                Dialect::OpenAiChat,
                &openai_chat2openai_responses::response::translate_response(resp),
            )
        }),
        stream: Arc::new(|| {
            Box::new(openai_chat2openai_responses::stream::ResponsesToChatStream::new())
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn registry() -> TranslatorRegistry {
        TranslatorRegistry::with_default_edges()
    }

    #[test]
    fn chat_to_gemini_maps_messages_system_and_tools() {
        let raw = json!({
            "model": "gemini-2.5-pro",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hi"},
            ],
            "tools": [{
                "type": "function",
                "function": {
                    "name": "get_weather",
                    "description": "Weather lookup",
                    "parameters": {"type": "object", "properties": {"city": {"type": "string"}}},
                },
            }],
        });
        let out = registry()
            .translate_request(
                Dialect::OpenAiChat,
                Dialect::GeminiGenerate,
                "gemini-2.5-pro",
                &serde_json::to_vec(&raw).unwrap(),
                true,
            )
            .unwrap();
        let out: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(out["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(out["contents"][0]["role"], "user");
        assert_eq!(out["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(
            out["tools"][0]["functionDeclarations"][0]["name"],
            "get_weather"
        );
        assert_eq!(out["model"], "gemini-2.5-pro");
    }

    #[test]
    fn chat_gemini_round_trip_preserves_content_and_tools() {
        let registry = registry();
        let original = json!({
            "model": "gemini-2.5-pro",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hi"},
            ],
            "tools": [{
                "type": "function",
                "function": {"name": "get_weather", "parameters": {"type": "object"}},
            }],
        });
        let there = registry
            .translate_request(
                Dialect::OpenAiChat,
                Dialect::GeminiGenerate,
                "gemini-2.5-pro",
                &serde_json::to_vec(&original).unwrap(),
                false,
            )
            .unwrap();
        let back = registry
            .translate_request(
                Dialect::GeminiGenerate,
                Dialect::OpenAiChat,
                "gemini-2.5-pro",
                &there,
                false,
            )
            .unwrap();
        let back: Value = serde_json::from_slice(&back).unwrap();
        assert_eq!(back["model"], "gemini-2.5-pro");
        assert_eq!(back["messages"][0]["role"], "system");
        assert_eq!(back["messages"][0]["content"], "be brief");
        assert_eq!(back["messages"][1]["role"], "user");
        assert_eq!(back["messages"][1]["content"], "hi");
        assert_eq!(back["tools"][0]["function"]["name"], "get_weather");
    }

    #[test]
    fn composite_responses_to_gemini_carries_inline_image() {
        let raw = json!({
            "model": "gemini-2.5-pro",
            "input": [{
                "role": "user",
                "content": [
                    {"type": "input_text", "text": "what is this"},
                    {"type": "input_image", "image_url": "data:image/png;base64,iVBORw0KGgo="},
                ],
            }],
        });
        let out = registry()
            .translate_request(
                Dialect::OpenAiResponses,
                Dialect::GeminiGenerate,
                "gemini-2.5-pro",
                &serde_json::to_vec(&raw).unwrap(),
                false,
            )
            .unwrap();
        let out: Value = serde_json::from_slice(&out).unwrap();
        let parts = &out["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "what is this");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "iVBORw0KGgo=");
    }

    #[test]
    fn claude_to_chat_composite_keeps_tool_round_trip() {
        let raw = json!({
            "model": "gpt-5",
            "max_tokens": 1024,
            "messages": [
                {"role": "user", "content": "weather in paris?"},
                {"role": "assistant", "content": [
                    {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"city": "Paris"}},
                ]},
                {"role": "user", "content": [
                    {"type": "tool_result", "tool_use_id": "toolu_1", "content": "sunny"},
                ]},
            ],
        });
        let out = registry()
            .translate_request(
                Dialect::ClaudeMessages,
                Dialect::OpenAiChat,
                "gpt-5",
                &serde_json::to_vec(&raw).unwrap(),
                true,
            )
            .unwrap();
        let out: Value = serde_json::from_slice(&out).unwrap();
        let messages = out["messages"].as_array().unwrap();
        assert_eq!(messages[0]["content"], "weather in paris?");
        assert_eq!(
            messages[1]["tool_calls"][0]["function"]["name"],
            "get_weather"
        );
        assert_eq!(messages[2]["role"], "tool");
        assert_eq!(messages[2]["tool_call_id"], "toolu_1");
    }

    #[test]
    fn gemini_stream_to_chat_rewrites_into_deltas() {
        let registry = registry();
        let mut stream = registry
            .open_stream(Dialect::OpenAiChat, Dialect::GeminiGenerate)
            .unwrap();
        let frames = stream.push(
            r#"{"candidates":[{"content":{"parts":[{"text":"he"}]}}],"modelVersion":"gemini-2.5-pro"}"#,
        );
        let chunk: Value = serde_json::from_str(&frames[0].data).unwrap();
        assert_eq!(chunk["object"], "chat.completion.chunk");
        assert_eq!(chunk["choices"][0]["delta"]["content"], "he");
    }

    #[test]
    fn composite_stream_claude_client_from_chat_upstream() {
        // claude -> openai_chat edge composes through gemini; chat chunks
        // must come out as claude events.
        let registry = registry();
        let mut stream = registry
            .open_stream(Dialect::ClaudeMessages, Dialect::OpenAiChat)
            .unwrap();
        let mut frames = stream.push(
            r#"{"id":"c1","object":"chat.completion.chunk","created":0,"model":"gpt-5","choices":[{"index":0,"delta":{"role":"assistant","content":"hi"}}]}"#,
        );
        frames.extend(stream.push(
            r#"{"id":"c1","object":"chat.completion.chunk","created":0,"model":"gpt-5","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
        ));
        frames.extend(stream.finish());
        let names: Vec<_> = frames
            .iter()
            .filter_map(|frame| frame.event.clone())
            .collect();
        assert!(names.contains(&"message_start".to_string()));
        assert!(names.contains(&"content_block_delta".to_string()));
        assert!(names.contains(&"message_stop".to_string()));
    }

    #[test]
    fn identity_edge_passes_payload_through() {
        let registry = registry();
        let raw = br#"{"model":"m","messages":[]}"#;
        let out = registry
            .translate_request(Dialect::OpenAiChat, Dialect::OpenAiChat, "m", raw, false)
            .unwrap();
        assert_eq!(out, raw.to_vec());
    }

    #[test]
    fn missing_edge_is_unsupported() {
        let registry = TranslatorRegistry::new();
        let err = registry
            .edge(Dialect::OpenAiChat, Dialect::GeminiGenerate)
            .unwrap_err();
        assert!(matches!(err, TranslateError::UnsupportedPair { .. }));
    }
}
