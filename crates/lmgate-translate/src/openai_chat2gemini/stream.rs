//! Gemini stream -> OpenAI Chat chunk translation.

use std::collections::BTreeMap;

use lmgate_protocol::gemini::GenerateContentResponse;
use lmgate_protocol::openai::chat::{
    ChatChunkChoice, ChatCompletionChunk, ChatDelta, ChatFunctionCallDelta, ChatToolCallDelta,
    ChatUsage,
};
use lmgate_protocol::sse::SseFrame;

use super::response::{map_finish_reason, map_usage, strip_models_prefix};
use crate::edge::StreamTranslator;
use crate::ids;

/// Per-stream context: chunk identity, per-choice role bookkeeping and
/// tool-call index assignment.
pub struct GeminiToChatStream {
    id: String,
    model: String,
    role_sent: BTreeMap<i64, bool>,
    tool_counters: BTreeMap<i64, i64>,
    usage: Option<ChatUsage>,
}

impl GeminiToChatStream {
    pub fn new() -> Self {
        Self {
            id: "resp".to_string(),
            model: String::new(),
            role_sent: BTreeMap::new(),
            tool_counters: BTreeMap::new(),
            usage: None,
        }
    }

    fn handle(&mut self, resp: GenerateContentResponse) -> Vec<ChatCompletionChunk> {
        if let Some(id) = &resp.response_id {
            self.id = id.clone();
        }
        if let Some(model) = resp.model_version.clone() {
            self.model = strip_models_prefix(model);
        }
        if let Some(usage) = &resp.usage_metadata {
            self.usage = Some(map_usage(usage));
        }

        let mut chunks = Vec::new();
        for (idx, candidate) in resp.candidates.iter().enumerate() {
            let choice = candidate.index.unwrap_or(idx as i64);
            for part in &candidate.content.parts {
                if part.thought.unwrap_or(false) {
                    continue;
                }
                if let Some(text) = &part.text {
                    if !text.is_empty() {
                        let role = self.take_role(choice);
                        chunks.push(self.chunk(
                            choice,
                            ChatDelta {
                                role,
                                content: Some(text.clone()),
                                tool_calls: None,
                            },
                            None,
                        ));
                    }
                }
                if let Some(call) = &part.function_call {
                    let index = self.next_tool_index(choice);
                    let role = self.take_role(choice);
                    chunks.push(self.chunk(
                        choice,
                        ChatDelta {
                            role,
                            content: None,
                            tool_calls: Some(vec![ChatToolCallDelta {
                                index,
                                id: Some(
                                    call.id
                                        .clone()
                                        .unwrap_or_else(|| ids::call_id(index as usize)),
                                ),
                                call_type: Some("function".to_string()),
                                function: Some(ChatFunctionCallDelta {
                                    name: Some(call.name.clone()),
                                    arguments: Some(
                                        call.args
                                            .as_ref()
                                            .and_then(|args| serde_json::to_string(args).ok())
                                            .unwrap_or_else(|| "{}".to_string()),
                                    ),
                                }),
                            }]),
                        },
                        None,
                    ));
                }
            }
            if let Some(reason) = &candidate.finish_reason {
                let had_tools = self.tool_counters.get(&choice).copied().unwrap_or(0) > 0;
                let finish = if had_tools {
                    "tool_calls".to_string()
                } else {
                    map_finish_reason(reason)
                };
                let role = self.take_role(choice);
                chunks.push(self.chunk(
                    choice,
                    ChatDelta {
                        role,
                        content: None,
                        tool_calls: None,
                    },
                    Some(finish),
                ));
            }
        }
        chunks
    }

    fn chunk(
        &self,
        choice: i64,
        delta: ChatDelta,
        finish_reason: Option<String>,
    ) -> ChatCompletionChunk {
        let mut chunk = ChatCompletionChunk::new(self.id.clone(), self.model.clone());
        chunk.usage = finish_reason.is_some().then(|| self.usage.clone()).flatten();
        chunk.choices = vec![ChatChunkChoice {
            index: choice,
            delta,
            finish_reason,
        }];
        chunk
    }

    fn take_role(&mut self, choice: i64) -> Option<String> {
        if self.role_sent.get(&choice).copied().unwrap_or(false) {
            None
        } else {
            self.role_sent.insert(choice, true);
            Some("assistant".to_string())
        }
    }

    fn next_tool_index(&mut self, choice: i64) -> i64 {
        let counter = self.tool_counters.entry(choice).or_insert(0);
        let index = *counter;
        *counter += 1;
        index
    }
}

impl Default for GeminiToChatStream {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTranslator for GeminiToChatStream {
    fn push(&mut self, data: &str) -> Vec<SseFrame> {
        let Ok(resp) = serde_json::from_str::<GenerateContentResponse>(data) else {
            return Vec::new();
        };
        self.handle(resp)
            .into_iter()
            .filter_map(|chunk| serde_json::to_string(&chunk).ok())
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
    fn text_then_finish_produces_delta_and_stop() {
        let mut state = GeminiToChatStream::new();
        let frames = state.push(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"hi"}]}}],"modelVersion":"gemini-2.5-pro"}"#,
        );
        assert_eq!(frames.len(), 1);
        let chunk: serde_json::Value = serde_json::from_str(&frames[0].data).unwrap();
        assert_eq!(chunk["choices"][0]["delta"]["content"], "hi");
        assert_eq!(chunk["choices"][0]["delta"]["role"], "assistant");

        let frames = state.push(
            r#"{"candidates":[{"content":{"parts":[]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":2,"candidatesTokenCount":3,"totalTokenCount":5}}"#,
        );
        assert_eq!(frames.len(), 1);
        let chunk: serde_json::Value = serde_json::from_str(&frames[0].data).unwrap();
        assert_eq!(chunk["choices"][0]["finish_reason"], "stop");
        assert_eq!(chunk["usage"]["total_tokens"], 5);
    }

    #[test]
    fn function_call_becomes_tool_call_delta_with_monotonic_index() {
        let mut state = GeminiToChatStream::new();
        let frames = state.push(
            r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"a","args":{}}},{"functionCall":{"name":"b","args":{}}}]}}]}"#,
        );
        assert_eq!(frames.len(), 2);
        let first: serde_json::Value = serde_json::from_str(&frames[0].data).unwrap();
        let second: serde_json::Value = serde_json::from_str(&frames[1].data).unwrap();
        assert_eq!(first["choices"][0]["delta"]["tool_calls"][0]["index"], 0);
        assert_eq!(second["choices"][0]["delta"]["tool_calls"][0]["index"], 1);
    }
}
