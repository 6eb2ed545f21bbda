//! OpenAI Chat chunk stream -> Responses event translation.
//!
//! The Responses protocol is event-typed: a `response.created` opener,
//! `output_item.added` per output item, typed deltas, then
//! `response.completed` carrying the assembled response.

use std::collections::BTreeMap;

use lmgate_protocol::openai::chat::ChatCompletionChunk;
use lmgate_protocol::openai::responses::{
    ResponseContentPart, ResponseOutputItem, ResponsesResponse, ResponsesStreamEvent,
};
use lmgate_protocol::sse::SseFrame;

use super::response::map_usage;
use crate::edge::StreamTranslator;

#[derive(Debug, Default)]
struct PendingCall {
    output_index: i64,
    id: String,
    name: String,
    arguments: String,
    announced: bool,
}

pub struct ChatToResponsesStream {
    started: bool,
    completed: bool,
    response_id: String,
    model: String,
    text: String,
    text_item_announced: bool,
    next_output_index: i64,
    calls: BTreeMap<i64, PendingCall>,
    usage: Option<lmgate_protocol::openai::responses::ResponsesUsage>,
}

impl ChatToResponsesStream {
    pub fn new() -> Self {
        Self {
            started: false,
            completed: false,
            response_id: "resp".to_string(),
            model: String::new(),
            text: String::new(),
            text_item_announced: false,
            next_output_index: 0,
            calls: BTreeMap::new(),
            usage: None,
        }
    }

    fn handle(&mut self, chunk: ChatCompletionChunk) -> Vec<ResponsesStreamEvent> {
        let mut events = Vec::new();

        if !chunk.id.is_empty() {
            self.response_id = chunk.id.clone();
        }
        if !chunk.model.is_empty() {
            self.model = chunk.model.clone();
        }
        if let Some(usage) = &chunk.usage {
            self.usage = Some(map_usage(usage));
        }

        if !self.started {
            self.started = true;
            let mut created = ResponsesStreamEvent::new("response.created");
            created.response = Some(self.snapshot("in_progress"));
            events.push(created);
        }

        for choice in &chunk.choices {
            if let Some(text) = &choice.delta.content {
                if !text.is_empty() {
                    if !self.text_item_announced {
                        self.text_item_announced = true;
                        let mut added = ResponsesStreamEvent::new("response.output_item.added");
                        added.output_index = Some(self.next_output_index);
                        added.item = Some(ResponseOutputItem::Message {
                            id: None,
                            role: "assistant".to_string(),
                            content: Vec::new(),
                        });
                        self.next_output_index += 1;
                        events.push(added);
                    }
                    self.text.push_str(text);
                    let mut delta = ResponsesStreamEvent::new("response.output_text.delta");
                    delta.item_id = Some(self.response_id.clone());
                    delta.output_index = Some(0);
                    delta.content_index = Some(0);
                    delta.delta = Some(text.clone());
                    events.push(delta);
                }
            }

            for call_delta in choice.delta.tool_calls.iter().flatten() {
                let announced_needed = !self.calls.contains_key(&call_delta.index);
                if announced_needed {
                    let output_index = self.next_output_index;
                    self.next_output_index += 1;
                    self.calls.insert(
                        call_delta.index,
                        PendingCall {
                            output_index,
                            ..Default::default()
                        },
                    );
                }
                let pending = self
                    .calls
                    .get_mut(&call_delta.index)
                    .expect("pending call inserted above");
                if let Some(id) = &call_delta.id {
                    pending.id = id.clone();
                }
                if let Some(function) = &call_delta.function {
                    if let Some(name) = &function.name {
                        pending.name.push_str(name);
                    }
                    if let Some(arguments) = &function.arguments {
                        pending.arguments.push_str(arguments);
                        if pending.announced {
                            let mut delta = ResponsesStreamEvent::new(
                                "response.function_call_arguments.delta",
                            );
                            delta.item_id = Some(pending.id.clone());
                            delta.output_index = Some(pending.output_index);
                            delta.delta = Some(arguments.clone());
                            events.push(delta);
                        }
                    }
                }
                if !pending.announced && !pending.id.is_empty() && !pending.name.is_empty() {
                    pending.announced = true;
                    let mut added = ResponsesStreamEvent::new("response.output_item.added");
                    added.output_index = Some(pending.output_index);
                    added.item = Some(ResponseOutputItem::FunctionCall {
                        id: None,
                        call_id: pending.id.clone(),
                        name: pending.name.clone(),
                        arguments: String::new(),
                    });
                    events.push(added);
                    if !pending.arguments.is_empty() {
                        let mut delta =
                            ResponsesStreamEvent::new("response.function_call_arguments.delta");
                        delta.item_id = Some(pending.id.clone());
                        delta.output_index = Some(pending.output_index);
                        delta.delta = Some(pending.arguments.clone());
                        events.push(delta);
                    }
                }
            }

            if choice.finish_reason.is_some() && !self.completed {
                self.completed = true;
                for pending in self.calls.values() {
                    let mut done =
                        ResponsesStreamEvent::new("response.function_call_arguments.done");
                    done.item_id = Some(pending.id.clone());
                    done.output_index = Some(pending.output_index);
                    done.arguments = Some(pending.arguments.clone());
                    events.push(done);
                }
                if self.text_item_announced {
                    let mut done = ResponsesStreamEvent::new("response.output_text.done");
                    done.item_id = Some(self.response_id.clone());
                    done.output_index = Some(0);
                    done.content_index = Some(0);
                    done.text = Some(self.text.clone());
                    events.push(done);
                }
                let mut completed = ResponsesStreamEvent::new("response.completed");
                completed.response = Some(self.snapshot("completed"));
                events.push(completed);
            }
        }

        events
    }

    fn snapshot(&self, status: &str) -> ResponsesResponse {
        let mut output = Vec::new();
        if status == "completed" {
            if !self.text.is_empty() {
                output.push(ResponseOutputItem::Message {
                    id: None,
                    role: "assistant".to_string(),
                    content: vec![ResponseContentPart::OutputText {
                        text: self.text.clone(),
                    }],
                });
            }
            for pending in self.calls.values() {
                output.push(ResponseOutputItem::FunctionCall {
                    id: None,
                    call_id: pending.id.clone(),
                    name: pending.name.clone(),
                    arguments: pending.arguments.clone(),
                });
            }
        }
        ResponsesResponse {
            id: self.response_id.clone(),
            object: "response".to_string(),
            created_at: None,
            model: self.model.clone(),
            status: Some(status.to_string()),
            output,
            usage: if status == "completed" {
                self.usage.clone()
            } else {
                None
            },
        }
    }

    fn encode(events: Vec<ResponsesStreamEvent>) -> Vec<SseFrame> {
        events
            .into_iter()
            .filter_map(|event| {
                let name = event.kind.clone();
                serde_json::to_string(&event)
                    .ok()
                    .map(|data| SseFrame::named(name, data))
            })
            .collect()
    }
}

impl Default for ChatToResponsesStream {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTranslator for ChatToResponsesStream {
    fn push(&mut self, data: &str) -> Vec<SseFrame> {
        if data == "[DONE]" {
            return Vec::new();
        }
        let Ok(chunk) = serde_json::from_str::<ChatCompletionChunk>(data) else {
            return Vec::new();
        };
        Self::encode(self.handle(chunk))
    }

    fn finish(&mut self) -> Vec<SseFrame> {
        if !self.started || self.completed {
            return Vec::new();
        }
        self.completed = true;
        let mut completed = ResponsesStreamEvent::new("response.completed");
        completed.response = Some(self.snapshot("completed"));
        Self::encode(vec![completed])
    }
}
