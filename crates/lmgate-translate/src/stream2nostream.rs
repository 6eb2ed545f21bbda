//! Collapses a client-dialect frame sequence into the dialect's unary
//! response document. Used when the client asked for a non-streaming
//! answer but the upstream only speaks SSE (Codex always streams).

use lmgate_protocol::claude::{ClaudeBlock, ClaudeContentDelta, ClaudeStreamEvent};
use lmgate_protocol::gemini::GenerateContentResponse;
use lmgate_protocol::openai::chat::{
    ChatChoice, ChatCompletionChunk, ChatCompletionResponse, ChatContent, ChatFunctionCall,
    ChatMessage, ChatToolCall,
};
use lmgate_protocol::openai::responses::ResponsesStreamEvent;
use lmgate_protocol::sse::SseFrame;
use lmgate_protocol::Dialect;
use serde_json::Value;

pub fn aggregate(dialect: Dialect, frames: &[SseFrame]) -> Option<Value> {
    match dialect {
        Dialect::OpenAiChat => aggregate_chat(frames),
        Dialect::OpenAiResponses => aggregate_responses(frames),
        Dialect::ClaudeMessages => aggregate_claude(frames),
        Dialect::GeminiGenerate => aggregate_gemini(frames),
    }
}

fn aggregate_chat(frames: &[SseFrame]) -> Option<Value> {
    let mut id = String::new();
    let mut model = String::new();
    let mut created = 0;
    let mut text = String::new();
    let mut finish_reason = None;
    let mut usage = None;
    let mut calls: Vec<(String, String, String)> = Vec::new();

    for frame in frames {
        if frame.data == "[DONE]" {
            continue;
        }
        let Ok(chunk) = serde_json::from_str::<ChatCompletionChunk>(&frame.data) else {
            continue;
        };
        if !chunk.id.is_empty() {
            id = chunk.id.clone();
        }
        if !chunk.model.is_empty() {
            model = chunk.model.clone();
        }
        if chunk.created != 0 {
            created = chunk.created;
        }
        if chunk.usage.is_some() {
            usage = chunk.usage.clone();
        }
        for choice in &chunk.choices {
            if let Some(content) = &choice.delta.content {
                text.push_str(content);
            }
            for delta in choice.delta.tool_calls.iter().flatten() {
                let index = delta.index as usize;
                while calls.len() <= index {
                    calls.push((String::new(), String::new(), String::new()));
                }
                if let Some(call_id) = &delta.id {
                    calls[index].0 = call_id.clone();
                }
                if let Some(function) = &delta.function {
                    if let Some(name) = &function.name {
                        calls[index].1.push_str(name);
                    }
                    if let Some(arguments) = &function.arguments {
                        calls[index].2.push_str(arguments);
                    }
                }
            }
            if choice.finish_reason.is_some() {
                finish_reason = choice.finish_reason.clone();
            }
        }
    }

    if id.is_empty() && text.is_empty() && calls.is_empty() {
        return None;
    }

    let tool_calls: Vec<ChatToolCall> = calls
        .into_iter()
        .filter(|(_, name, _)| !name.is_empty())
        .map(|(call_id, name, arguments)| ChatToolCall {
            id: call_id,
            call_type: "function".to_string(),
            function: ChatFunctionCall { name, arguments },
        })
        .collect();

    let response = ChatCompletionResponse {
        id,
        object: "chat.completion".to_string(),
        created,
        model,
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage {
                role: "assistant".to_string(),
                content: (!text.is_empty()).then_some(ChatContent::Text(text)),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                tool_call_id: None,
                name: None,
            },
            finish_reason: finish_reason.or_else(|| Some("stop".to_string())),
        }],
        usage,
    };
    serde_json::to_value(response).ok()
}

fn aggregate_responses(frames: &[SseFrame]) -> Option<Value> {
    // The completed event already carries the full response document.
    let mut last_response = None;
    for frame in frames {
        let Ok(event) = serde_json::from_str::<ResponsesStreamEvent>(&frame.data) else {
            continue;
        };
        if event.kind == "response.completed" {
            if let Some(response) = event.response {
                last_response = Some(response);
            }
        }
    }
    last_response.and_then(|response| serde_json::to_value(response).ok())
}

fn aggregate_claude(frames: &[SseFrame]) -> Option<Value> {
    let mut message = None;
    let mut blocks: Vec<ClaudeBlock> = Vec::new();
    let mut stop_reason = None;
    let mut usage = None;

    for frame in frames {
        let Ok(event) = serde_json::from_str::<ClaudeStreamEvent>(&frame.data) else {
            continue;
        };
        match event {
            ClaudeStreamEvent::MessageStart { message: start } => message = Some(start),
            ClaudeStreamEvent::ContentBlockStart { content_block, .. } => {
                blocks.push(content_block);
            }
            ClaudeStreamEvent::ContentBlockDelta { delta, .. } => match delta {
                ClaudeContentDelta::TextDelta { text } => {
                    if let Some(ClaudeBlock::Text { text: existing }) = blocks.last_mut() {
                        existing.push_str(&text);
                    } else {
                        blocks.push(ClaudeBlock::Text { text });
                    }
                }
                ClaudeContentDelta::ThinkingDelta { thinking } => {
                    if let Some(ClaudeBlock::Thinking {
                        thinking: existing, ..
                    }) = blocks.last_mut()
                    {
                        existing.push_str(&thinking);
                    }
                }
                ClaudeContentDelta::InputJsonDelta { partial_json } => {
                    if let Some(ClaudeBlock::ToolUse { input, .. }) = blocks.last_mut() {
                        let mut assembled = match input {
                            Value::String(existing) => existing.clone(),
                            _ => String::new(),
                        };
                        assembled.push_str(&partial_json);
                        *input = match serde_json::from_str(&assembled) {
                            Ok(parsed) => parsed,
                            Err(_) => Value::String(assembled),
                        };
                    }
                }
                ClaudeContentDelta::SignatureDelta { .. } => {}
            },
            ClaudeStreamEvent::MessageDelta {
                delta,
                usage: event_usage,
            } => {
                if delta.stop_reason.is_some() {
                    stop_reason = delta.stop_reason;
                }
                if event_usage.is_some() {
                    usage = event_usage;
                }
            }
            _ => {}
        }
    }

    let mut message = message?;
    message.content = blocks
        .into_iter()
        .map(|block| match block {
            // Unparsed partial json ends up as an empty object rather
            // than a string input.
            ClaudeBlock::ToolUse { id, name, input } => ClaudeBlock::ToolUse {
                id,
                name,
                input: if input.is_string() {
                    serde_json::json!({})
                } else {
                    input
                },
            },
            other => other,
        })
        .collect();
    message.stop_reason = stop_reason.or(Some("end_turn".to_string()));
    message.usage = usage.or(message.usage);
    serde_json::to_value(message).ok()
}

fn aggregate_gemini(frames: &[SseFrame]) -> Option<Value> {
    let mut merged: Option<GenerateContentResponse> = None;
    for frame in frames {
        let Ok(doc) = serde_json::from_str::<GenerateContentResponse>(&frame.data) else {
            continue;
        };
        match merged.as_mut() {
            None => merged = Some(doc),
            Some(accumulated) => {
                if let (Some(target), Some(source)) =
                    (accumulated.candidates.first_mut(), doc.candidates.first())
                {
                    for part in &source.content.parts {
                        // Consecutive text deltas merge; structured parts append.
                        if let (Some(text), Some(last)) = (
                            part.text.as_ref().filter(|_| part.function_call.is_none()),
                            target
                                .content
                                .parts
                                .last_mut()
                                .filter(|last| last.function_call.is_none()),
                        ) {
                            if let Some(existing) = last.text.as_mut() {
                                if last.thought == part.thought {
                                    existing.push_str(text);
                                    continue;
                                }
                            }
                        }
                        target.content.parts.push(part.clone());
                    }
                    if source.finish_reason.is_some() {
                        target.finish_reason = source.finish_reason.clone();
                    }
                }
                if doc.usage_metadata.is_some() {
                    accumulated.usage_metadata = doc.usage_metadata;
                }
                if doc.model_version.is_some() {
                    accumulated.model_version = doc.model_version;
                }
            }
        }
    }
    merged.and_then(|response| serde_json::to_value(response).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_frames_collapse_into_one_completion() {
        let frames = vec![
            SseFrame::data(
                r#"{"id":"c1","object":"chat.completion.chunk","created":1,"model":"m","choices":[{"index":0,"delta":{"role":"assistant","content":"he"}}]}"#,
            ),
            SseFrame::data(
                r#"{"id":"c1","object":"chat.completion.chunk","created":1,"model":"m","choices":[{"index":0,"delta":{"content":"llo"}}]}"#,
            ),
            SseFrame::data(
                r#"{"id":"c1","object":"chat.completion.chunk","created":1,"model":"m","choices":[{"index":0,"delta":{},"finish_reason":"stop"}],"usage":{"prompt_tokens":1,"completion_tokens":2,"total_tokens":3}}"#,
            ),
            SseFrame::data("[DONE]"),
        ];
        let value = aggregate(Dialect::OpenAiChat, &frames).unwrap();
        assert_eq!(value["choices"][0]["message"]["content"], "hello");
        assert_eq!(value["choices"][0]["finish_reason"], "stop");
        assert_eq!(value["usage"]["total_tokens"], 3);
    }

    #[test]
    fn claude_frames_rebuild_the_message() {
        let frames = vec![
            SseFrame::named(
                "message_start",
                r#"{"type":"message_start","message":{"id":"msg_1","type":"message","role":"assistant","model":"claude-sonnet-4","content":[]}}"#,
            ),
            SseFrame::named(
                "content_block_start",
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            ),
            SseFrame::named(
                "content_block_delta",
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"hey"}}"#,
            ),
            SseFrame::named(
                "message_delta",
                r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"input_tokens":1,"output_tokens":2}}"#,
            ),
            SseFrame::named("message_stop", r#"{"type":"message_stop"}"#),
        ];
        let value = aggregate(Dialect::ClaudeMessages, &frames).unwrap();
        assert_eq!(value["content"][0]["text"], "hey");
        assert_eq!(value["stop_reason"], "end_turn");
        assert_eq!(value["usage"]["output_tokens"], 2);
    }
}
