//! OpenAI Responses event stream -> Chat chunk translation.

use std::collections::BTreeMap;

use lmgate_protocol::openai::chat::{
    ChatChunkChoice, ChatCompletionChunk, ChatDelta, ChatFunctionCallDelta, ChatToolCallDelta,
};
use lmgate_protocol::openai::responses::{ResponseOutputItem, ResponsesStreamEvent};
use lmgate_protocol::sse::SseFrame;

use super::response::map_usage;
use crate::edge::StreamTranslator;

pub struct ResponsesToChatStream {
    id: String,
    model: String,
    role_sent: bool,
    finished: bool,
    /// Responses `output_index` -> chat `tool_calls[*].index`.
    tool_indices: BTreeMap<i64, i64>,
    saw_tool_call: bool,
}

impl ResponsesToChatStream {
    pub fn new() -> Self {
        Self {
            id: "resp".to_string(),
            model: String::new(),
            role_sent: false,
            finished: false,
            tool_indices: BTreeMap::new(),
            saw_tool_call: false,
        }
    }

    fn handle(&mut self, event: ResponsesStreamEvent) -> Vec<ChatCompletionChunk> {
        if let Some(response) = &event.response {
            if !response.id.is_empty() {
                self.id = response.id.clone();
            }
            if !response.model.is_empty() {
                self.model = response.model.clone();
            }
        }

        match event.kind.as_str() {
            "response.output_text.delta" => {
                let Some(delta) = event.delta else {
                    return Vec::new();
                };
                let role = self.take_role();
                vec![self.chunk(
                    ChatDelta {
                        role,
                        content: Some(delta),
                        tool_calls: None,
                    },
                    None,
                    None,
                )]
            }
            "response.output_item.added" => match event.item {
                Some(ResponseOutputItem::FunctionCall {
                    call_id, name, ..
                }) => {
                    self.saw_tool_call = true;
                    let output_index = event.output_index.unwrap_or(0);
                    let next = self.tool_indices.len() as i64;
                    let index = *self.tool_indices.entry(output_index).or_insert(next);
                    let role = self.take_role();
                    vec![self.chunk(
                        ChatDelta {
                            role,
                            content: None,
                            tool_calls: Some(vec![ChatToolCallDelta {
                                index,
                                id: Some(call_id),
                                call_type: Some("function".to_string()),
                                function: Some(ChatFunctionCallDelta {
                                    name: Some(name),
                                    arguments: None,
                                }),
                            }]),
                        },
                        None,
                        None,
                    )]
                }
                _ => Vec::new(),
            },
            "response.function_call_arguments.delta" => {
                let Some(delta) = event.delta else {
                    return Vec::new();
                };
                let output_index = event.output_index.unwrap_or(0);
                let next = self.tool_indices.len() as i64;
                let index = *self.tool_indices.entry(output_index).or_insert(next);
                let role = self.take_role();
                vec![self.chunk(
                    ChatDelta {
                        role,
                        content: None,
                        tool_calls: Some(vec![ChatToolCallDelta {
                            index,
                            id: None,
                            call_type: None,
                            function: Some(ChatFunctionCallDelta {
                                name: None,
                                arguments: Some(delta),
                            }),
                        }]),
                    },
                    None,
                    None,
                )]
            }
            "response.completed" => {
                if self.finished {
                    return Vec::new();
                }
                self.finished = true;
                let usage = event
                    .response
                    .as_ref()
                    .and_then(|response| response.usage.as_ref())
                    .map(map_usage);
                let finish = if self.saw_tool_call {
                    "tool_calls"
                } else {
                    "stop"
                };
                let role = self.take_role();
                vec![self.chunk(
                    ChatDelta {
                        role,
                        content: None,
                        tool_calls: None,
                    },
                    Some(finish.to_string()),
                    usage,
                )]
            }
            "response.failed" | "response.incomplete" => {
                if self.finished {
                    return Vec::new();
                }
                self.finished = true;
                let role = self.take_role();
                vec![self.chunk(
                    ChatDelta {
                        role,
                        content: None,
                        tool_calls: None,
                    },
                    Some("stop".to_string()),
                    None,
                )]
            }
            _ => Vec::new(),
        }
    }

    fn chunk(
        &self,
        delta: ChatDelta,
        finish_reason: Option<String>,
        usage: Option<lmgate_protocol::openai::chat::ChatUsage>,
    ) -> ChatCompletionChunk {
        let mut chunk = ChatCompletionChunk::new(self.id.clone(), self.model.clone());
        chunk.usage = usage;
        chunk.choices = vec![ChatChunkChoice {
            index: 0,
            delta,
            finish_reason,
        }];
        chunk
    }

    fn take_role(&mut self) -> Option<String> {
        if self.role_sent {
            None
        } else {
            self.role_sent = true;
            Some("assistant".to_string())
        }
    }
}

impl Default for ResponsesToChatStream {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTranslator for ResponsesToChatStream {
    fn push(&mut self, data: &str) -> Vec<SseFrame> {
        let Ok(event) = serde_json::from_str::<ResponsesStreamEvent>(data) else {
            return Vec::new();
        };
        self.handle(event)
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
    fn maps_function_call_events_to_tool_call_deltas() {
        let mut state = ResponsesToChatStream::new();
        let frames = state.push(
            r#"{"type":"response.output_item.added","output_index":0,"item":{"type":"function_call","call_id":"call_9","name":"get_weather","arguments":""}}"#,
        );
        assert_eq!(frames.len(), 1);
        let chunk: serde_json::Value = serde_json::from_str(&frames[0].data).unwrap();
        let call = &chunk["choices"][0]["delta"]["tool_calls"][0];
        assert_eq!(call["index"], 0);
        assert_eq!(call["id"], "call_9");
        assert_eq!(call["function"]["name"], "get_weather");

        let frames = state.push(
            r#"{"type":"response.function_call_arguments.delta","output_index":0,"delta":"{\"city\":\"Paris\"}"}"#,
        );
        let chunk: serde_json::Value = serde_json::from_str(&frames[0].data).unwrap();
        assert_eq!(
            chunk["choices"][0]["delta"]["tool_calls"][0]["function"]["arguments"],
            "{\"city\":\"Paris\"}"
        );

        let frames = state.push(r#"{"type":"response.completed","response":{"id":"r1","object":"response","model":"gpt-5","output":[]}}"#);
        let chunk: serde_json::Value = serde_json::from_str(&frames[0].data).unwrap();
        assert_eq!(chunk["choices"][0]["finish_reason"], "tool_calls");
    }
}
