//! Claude Messages event stream -> Gemini document translation.
//!
//! Tool-use input arrives as `input_json_delta` fragments; the complete
//! argument object is emitted as one `functionCall` part when the block
//! closes.

use std::collections::BTreeMap;

use lmgate_protocol::claude::{ClaudeBlock, ClaudeContentDelta, ClaudeStreamEvent};
use lmgate_protocol::gemini::{
    GenerateContentResponse, GeminiCandidate, GeminiContent, GeminiFunctionCall, GeminiPart,
    GeminiUsage,
};
use lmgate_protocol::sse::SseFrame;

use super::response::{map_finish_reason, map_usage};
use crate::edge::StreamTranslator;

#[derive(Debug, Default)]
struct PendingTool {
    id: Option<String>,
    name: String,
    partial_json: String,
}

pub struct ClaudeToGeminiStream {
    model: String,
    response_id: Option<String>,
    tools: BTreeMap<i64, PendingTool>,
    usage: Option<GeminiUsage>,
}

impl ClaudeToGeminiStream {
    pub fn new() -> Self {
        Self {
            model: String::new(),
            response_id: None,
            tools: BTreeMap::new(),
            usage: None,
        }
    }

    fn handle(&mut self, event: ClaudeStreamEvent) -> Vec<GenerateContentResponse> {
        match event {
            ClaudeStreamEvent::MessageStart { message } => {
                self.model = message.model;
                self.response_id = Some(message.id);
                Vec::new()
            }
            ClaudeStreamEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                if let ClaudeBlock::ToolUse { id, name, .. } = content_block {
                    self.tools.insert(
                        index,
                        PendingTool {
                            id: Some(id),
                            name,
                            partial_json: String::new(),
                        },
                    );
                }
                Vec::new()
            }
            ClaudeStreamEvent::ContentBlockDelta { index, delta } => match delta {
                ClaudeContentDelta::TextDelta { text } => {
                    vec![self.document(vec![GeminiPart::text(text)], None)]
                }
                ClaudeContentDelta::ThinkingDelta { thinking } => {
                    vec![self.document(
                        vec![GeminiPart {
                            text: Some(thinking),
                            thought: Some(true),
                            ..Default::default()
                        }],
                        None,
                    )]
                }
                ClaudeContentDelta::InputJsonDelta { partial_json } => {
                    if let Some(pending) = self.tools.get_mut(&index) {
                        pending.partial_json.push_str(&partial_json);
                    }
                    Vec::new()
                }
                ClaudeContentDelta::SignatureDelta { .. } => Vec::new(),
            },
            ClaudeStreamEvent::ContentBlockStop { index } => {
                let Some(pending) = self.tools.remove(&index) else {
                    return Vec::new();
                };
                let args = if pending.partial_json.is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(&pending.partial_json)
                        .unwrap_or_else(|_| serde_json::json!({}))
                };
                vec![self.document(
                    vec![GeminiPart {
                        function_call: Some(GeminiFunctionCall {
                            id: pending.id,
                            name: pending.name,
                            args: Some(args),
                        }),
                        ..Default::default()
                    }],
                    None,
                )]
            }
            ClaudeStreamEvent::MessageDelta { delta, usage } => {
                if let Some(usage) = usage.as_ref() {
                    self.usage = Some(map_usage(usage));
                }
                match delta.stop_reason.as_deref() {
                    Some(reason) => {
                        vec![self.document(Vec::new(), Some(map_finish_reason(reason)))]
                    }
                    None => Vec::new(),
                }
            }
            ClaudeStreamEvent::MessageStop
            | ClaudeStreamEvent::Ping
            | ClaudeStreamEvent::Error { .. } => Vec::new(),
        }
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

impl Default for ClaudeToGeminiStream {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTranslator for ClaudeToGeminiStream {
    fn push(&mut self, data: &str) -> Vec<SseFrame> {
        let Ok(event) = serde_json::from_str::<ClaudeStreamEvent>(data) else {
            return Vec::new();
        };
        self.handle(event)
            .into_iter()
            .filter_map(|doc| serde_json::to_string(&doc).ok())
            .map(SseFrame::data)
            .collect()
    }

    fn finish(&mut self) -> Vec<SseFrame> {
        Vec::new()
    }
}
