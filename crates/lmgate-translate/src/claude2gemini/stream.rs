//! Gemini stream -> Claude Messages event translation.
//!
//! Claude streaming is block-structured: a single `message_start`, one
//! content block per emitted part kind, explicit stops at tool-call
//! boundaries, then `message_delta` + `message_stop`.

use lmgate_protocol::claude::{
    ClaudeContentDelta, ClaudeMessageDelta, ClaudeStreamEvent, ClaudeUsage, MessagesResponse,
};
use lmgate_protocol::claude::ClaudeBlock;
use lmgate_protocol::gemini::GenerateContentResponse;
use lmgate_protocol::sse::SseFrame;

use super::response::{map_stop_reason, map_usage};
use crate::edge::StreamTranslator;
use crate::ids;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenBlock {
    None,
    Text,
    Thinking,
}

pub struct GeminiToClaudeStream {
    started: bool,
    finished: bool,
    open: OpenBlock,
    block_index: i64,
    tool_count: usize,
    saw_tool_use: bool,
    model: String,
    message_id: String,
    usage: Option<ClaudeUsage>,
}

impl GeminiToClaudeStream {
    pub fn new() -> Self {
        Self {
            started: false,
            finished: false,
            open: OpenBlock::None,
            block_index: -1,
            tool_count: 0,
            saw_tool_use: false,
            model: String::new(),
            message_id: "msg_stream".to_string(),
            usage: None,
        }
    }

    fn handle(&mut self, resp: GenerateContentResponse) -> Vec<ClaudeStreamEvent> {
        let mut events = Vec::new();

        if let Some(id) = &resp.response_id {
            self.message_id = id.clone();
        }
        if let Some(model) = &resp.model_version {
            self.model = model.clone();
        }
        if let Some(usage) = &resp.usage_metadata {
            self.usage = Some(map_usage(usage));
        }

        if !self.started {
            self.started = true;
            events.push(ClaudeStreamEvent::MessageStart {
                message: MessagesResponse {
                    id: self.message_id.clone(),
                    response_type: "message".to_string(),
                    role: "assistant".to_string(),
                    model: self.model.clone(),
                    content: Vec::new(),
                    stop_reason: None,
                    stop_sequence: None,
                    usage: Some(ClaudeUsage::default()),
                },
            });
        }

        let Some(candidate) = resp.candidates.first() else {
            return events;
        };

        for part in &candidate.content.parts {
            if let Some(text) = &part.text {
                if text.is_empty() {
                    continue;
                }
                let wanted = if part.thought.unwrap_or(false) {
                    OpenBlock::Thinking
                } else {
                    OpenBlock::Text
                };
                if self.open != wanted {
                    self.close_open(&mut events);
                    self.block_index += 1;
                    self.open = wanted;
                    events.push(ClaudeStreamEvent::ContentBlockStart {
                        index: self.block_index,
                        content_block: match wanted {
                            OpenBlock::Thinking => ClaudeBlock::Thinking {
                                thinking: String::new(),
                                signature: None,
                            },
                            _ => ClaudeBlock::Text {
                                text: String::new(),
                            },
                        },
                    });
                }
                events.push(ClaudeStreamEvent::ContentBlockDelta {
                    index: self.block_index,
                    delta: match wanted {
                        OpenBlock::Thinking => ClaudeContentDelta::ThinkingDelta {
                            thinking: text.clone(),
                        },
                        _ => ClaudeContentDelta::TextDelta { text: text.clone() },
                    },
                });
            }

            if let Some(call) = &part.function_call {
                self.close_open(&mut events);
                self.saw_tool_use = true;
                self.block_index += 1;
                let id = call
                    .id
                    .clone()
                    .unwrap_or_else(|| ids::tool_use_id(self.tool_count));
                self.tool_count += 1;
                events.push(ClaudeStreamEvent::ContentBlockStart {
                    index: self.block_index,
                    content_block: ClaudeBlock::ToolUse {
                        id,
                        name: call.name.clone(),
                        input: serde_json::json!({}),
                    },
                });
                let args = call
                    .args
                    .as_ref()
                    .and_then(|args| serde_json::to_string(args).ok())
                    .unwrap_or_else(|| "{}".to_string());
                events.push(ClaudeStreamEvent::ContentBlockDelta {
                    index: self.block_index,
                    delta: ClaudeContentDelta::InputJsonDelta { partial_json: args },
                });
                events.push(ClaudeStreamEvent::ContentBlockStop {
                    index: self.block_index,
                });
            }
        }

        if let Some(reason) = &candidate.finish_reason {
            self.close_open(&mut events);
            self.finished = true;
            events.push(ClaudeStreamEvent::MessageDelta {
                delta: ClaudeMessageDelta {
                    stop_reason: Some(map_stop_reason(reason, self.saw_tool_use)),
                    stop_sequence: None,
                },
                usage: self.usage.clone(),
            });
            events.push(ClaudeStreamEvent::MessageStop);
        }

        events
    }

    fn close_open(&mut self, events: &mut Vec<ClaudeStreamEvent>) {
        if self.open != OpenBlock::None {
            events.push(ClaudeStreamEvent::ContentBlockStop {
                index: self.block_index,
            });
            self.open = OpenBlock::None;
        }
    }

    fn encode(events: Vec<ClaudeStreamEvent>) -> Vec<SseFrame> {
        events
            .into_iter()
            .filter_map(|event| {
                let name = event.event_name().to_string();
                serde_json::to_string(&event)
                    .ok()
                    .map(|data| SseFrame::named(name, data))
            })
            .collect()
    }
}

impl Default for GeminiToClaudeStream {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTranslator for GeminiToClaudeStream {
    fn push(&mut self, data: &str) -> Vec<SseFrame> {
        let Ok(resp) = serde_json::from_str::<GenerateContentResponse>(data) else {
            return Vec::new();
        };
        let events = self.handle(resp);
        Self::encode(events)
    }

    fn finish(&mut self) -> Vec<SseFrame> {
        if !self.started || self.finished {
            return Vec::new();
        }
        self.finished = true;
        let mut events = Vec::new();
        self.close_open(&mut events);
        events.push(ClaudeStreamEvent::MessageDelta {
            delta: ClaudeMessageDelta {
                stop_reason: Some(map_stop_reason("STOP", self.saw_tool_use)),
                stop_sequence: None,
            },
            usage: self.usage.clone(),
        });
        events.push(ClaudeStreamEvent::MessageStop);
        Self::encode(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(frames: &[SseFrame]) -> Vec<String> {
        frames
            .iter()
            .map(|frame| frame.event.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn synthesizes_message_start_blocks_and_stop() {
        let mut state = GeminiToClaudeStream::new();
        let frames = state.push(
            r#"{"candidates":[{"content":{"parts":[{"text":"hello"}]}}],"responseId":"r1","modelVersion":"gemini-2.5-pro"}"#,
        );
        assert_eq!(
            names(&frames),
            vec!["message_start", "content_block_start", "content_block_delta"]
        );

        let frames = state.push(
            r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"get_weather","args":{"city":"Paris"}}}]},"finishReason":"STOP"}]}"#,
        );
        assert_eq!(
            names(&frames),
            vec![
                "content_block_stop",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop"
            ]
        );
        let delta: serde_json::Value = serde_json::from_str(&frames[2].data).unwrap();
        assert_eq!(delta["delta"]["type"], "input_json_delta");
        let message_delta: serde_json::Value = serde_json::from_str(&frames[4].data).unwrap();
        assert_eq!(message_delta["delta"]["stop_reason"], "tool_use");
    }
}
