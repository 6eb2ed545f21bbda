//! OpenAI Chat chunk stream -> Gemini document translation.
//!
//! Tool-call argument deltas are accumulated until the choice finishes;
//! Gemini `functionCall` parts carry complete argument objects.

use std::collections::BTreeMap;

use lmgate_protocol::gemini::{
    GenerateContentResponse, GeminiCandidate, GeminiContent, GeminiFunctionCall, GeminiPart,
};
use lmgate_protocol::openai::chat::ChatCompletionChunk;
use lmgate_protocol::sse::SseFrame;

use super::response::{map_finish_reason, map_usage};
use crate::edge::StreamTranslator;
use crate::ids;

#[derive(Default)]
struct PendingCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

pub struct ChatToGeminiStream {
    model: String,
    response_id: Option<String>,
    pending_calls: BTreeMap<i64, PendingCall>,
    usage: Option<lmgate_protocol::gemini::GeminiUsage>,
}

impl ChatToGeminiStream {
    pub fn new() -> Self {
        Self {
            model: String::new(),
            response_id: None,
            pending_calls: BTreeMap::new(),
            usage: None,
        }
    }

    fn handle(&mut self, chunk: ChatCompletionChunk) -> Vec<GenerateContentResponse> {
        if !chunk.model.is_empty() {
            self.model = chunk.model.clone();
        }
        if self.response_id.is_none() && !chunk.id.is_empty() {
            self.response_id = Some(chunk.id.clone());
        }
        if let Some(usage) = &chunk.usage {
            self.usage = Some(map_usage(usage));
        }

        let mut out = Vec::new();
        for choice in &chunk.choices {
            if let Some(text) = &choice.delta.content {
                if !text.is_empty() {
                    out.push(self.document(vec![GeminiPart::text(text.clone())], None));
                }
            }
            for delta in choice.delta.tool_calls.iter().flatten() {
                let pending = self.pending_calls.entry(delta.index).or_default();
                if let Some(id) = &delta.id {
                    pending.id = Some(id.clone());
                }
                if let Some(function) = &delta.function {
                    if let Some(name) = &function.name {
                        pending.name.push_str(name);
                    }
                    if let Some(arguments) = &function.arguments {
                        pending.arguments.push_str(arguments);
                    }
                }
            }
            if let Some(reason) = &choice.finish_reason {
                let mut parts = Vec::new();
                for (index, pending) in std::mem::take(&mut self.pending_calls) {
                    parts.push(GeminiPart {
                        function_call: Some(GeminiFunctionCall {
                            id: Some(
                                pending
                                    .id
                                    .unwrap_or_else(|| ids::call_id(index as usize)),
                            ),
                            name: pending.name,
                            args: serde_json::from_str(&pending.arguments).ok(),
                        }),
                        ..Default::default()
                    });
                }
                out.push(self.document(parts, Some(map_finish_reason(reason))));
            }
        }
        out
    }

    fn document(
        &self,
        parts: Vec<GeminiPart>,
        finish_reason: Option<String>,
    ) -> GenerateContentResponse {
        GenerateContentResponse {
            candidates: vec![GeminiCandidate {
                content: GeminiContent {
                    role: Some("model".to_string()),
                    parts,
                },
                finish_reason: finish_reason.clone(),
                index: Some(0),
            }],
            usage_metadata: if finish_reason.is_some() {
                self.usage.clone()
            } else {
                None
            },
            model_version: (!self.model.is_empty()).then(|| self.model.clone()),
            response_id: self.response_id.clone(),
        }
    }
}

impl Default for ChatToGeminiStream {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTranslator for ChatToGeminiStream {
    fn push(&mut self, data: &str) -> Vec<SseFrame> {
        if data == "[DONE]" {
            return Vec::new();
        }
        let Ok(chunk) = serde_json::from_str::<ChatCompletionChunk>(data) else {
            return Vec::new();
        };
        self.handle(chunk)
            .into_iter()
            .filter_map(|doc| serde_json::to_string(&doc).ok())
            .map(SseFrame::data)
            .collect()
    }

    fn finish(&mut self) -> Vec<SseFrame> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_tool_arguments_until_finish() {
        let mut state = ChatToGeminiStream::new();
        state.push(
            r#"{"id":"c1","object":"chat.completion.chunk","created":0,"model":"m","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"get_weather","arguments":"{\"city\""}}]}}]}"#,
        );
        let frames = state.push(
            r#"{"id":"c1","object":"chat.completion.chunk","created":0,"model":"m","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":":\"Paris\"}"}}]},"finish_reason":"tool_calls"}]}"#,
        );
        assert_eq!(frames.len(), 1);
        let doc: serde_json::Value = serde_json::from_str(&frames[0].data).unwrap();
        let call = &doc["candidates"][0]["content"]["parts"][0]["functionCall"];
        assert_eq!(call["name"], "get_weather");
        assert_eq!(call["args"]["city"], "Paris");
    }
}
