use lmgate_protocol::gemini::{GenerateContentRequest, GeminiPart};
use lmgate_protocol::openai::chat::{
    ChatCompletionRequest, ChatContent, ChatContentPart, ChatFunctionCall, ChatFunctionDef,
    ChatImageUrl, ChatMessage, ChatTool, ChatToolCall,
};
use serde_json::Value;

use crate::ids;
use crate::media::blob_to_data_url;

pub fn translate_request(req: GenerateContentRequest, model: &str) -> ChatCompletionRequest {
    let mut messages = Vec::new();

    if let Some(system) = &req.system_instruction {
        let text = joined_text(&system.parts);
        if !text.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(ChatContent::Text(text)),
                ..Default::default()
            });
        }
    }

    let mut generated_calls = 0usize;
    for content in &req.contents {
        let role = content.role.as_deref().unwrap_or("user");
        if role == "model" {
            let mut text = String::new();
            let mut tool_calls = Vec::new();
            for part in &content.parts {
                if let Some(part_text) = &part.text {
                    text.push_str(part_text);
                }
                if let Some(call) = &part.function_call {
                    let id = call.id.clone().unwrap_or_else(|| {
                        let id = ids::call_id(generated_calls);
                        generated_calls += 1;
                        id
                    });
                    tool_calls.push(ChatToolCall {
                        id,
                        call_type: "function".to_string(),
                        function: ChatFunctionCall {
                            name: call.name.clone(),
                            arguments: call
                                .args
                                .as_ref()
                                .and_then(|args| serde_json::to_string(args).ok())
                                .unwrap_or_else(|| "{}".to_string()),
                        },
                    });
                }
            }
            messages.push(ChatMessage {
                role: "assistant".to_string(),
                content: (!text.is_empty()).then_some(ChatContent::Text(text)),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                ..Default::default()
            });
            continue;
        }

        // User-side turns: tool results become `role:"tool"` messages,
        // everything else folds into one user message.
        let mut parts = Vec::new();
        for part in &content.parts {
            if let Some(function_response) = &part.function_response {
                messages.push(ChatMessage {
                    role: "tool".to_string(),
                    content: Some(ChatContent::Text(
                        serde_json::to_string(&function_response.response).unwrap_or_default(),
                    )),
                    tool_call_id: Some(
                        function_response
                            .id
                            .clone()
                            .unwrap_or_else(|| function_response.name.clone()),
                    ),
                    name: Some(function_response.name.clone()),
                    ..Default::default()
                });
                continue;
            }
            if let Some(text) = &part.text {
                parts.push(ChatContentPart::Text { text: text.clone() });
            }
            if let Some(blob) = &part.inline_data {
                parts.push(ChatContentPart::ImageUrl {
                    image_url: ChatImageUrl {
                        url: blob_to_data_url(blob),
                        detail: None,
                    },
                });
            }
        }
        if !parts.is_empty() {
            let content = if parts.len() == 1 {
                match &parts[0] {
                    ChatContentPart::Text { text } => ChatContent::Text(text.clone()),
                    _ => ChatContent::Parts(parts),
                }
            } else {
                ChatContent::Parts(parts)
            };
            messages.push(ChatMessage {
                role: "user".to_string(),
                content: Some(content),
                ..Default::default()
            });
        }
    }

    let tools = req.tools.as_ref().map(|tools| {
        tools
            .iter()
            .flat_map(|tool| &tool.function_declarations)
            .map(|declaration| ChatTool {
                tool_type: "function".to_string(),
                function: ChatFunctionDef {
                    name: declaration.name.clone(),
                    description: declaration.description.clone(),
                    parameters: declaration.parameters.clone(),
                },
            })
            .collect::<Vec<_>>()
    });

    let config = req.generation_config.as_ref();
    let reasoning_effort = config
        .and_then(|config| config.thinking_config.as_ref())
        .and_then(|thinking| thinking.thinking_budget)
        .and_then(budget_to_ladder_effort);

    ChatCompletionRequest {
        model: model.to_string(),
        messages,
        stream: None,
        tools,
        tool_choice: tool_choice(&req),
        reasoning_effort,
        max_tokens: config.and_then(|config| config.max_output_tokens),
        max_completion_tokens: None,
        temperature: config.and_then(|config| config.temperature),
        top_p: config.and_then(|config| config.top_p),
        stop: config.and_then(|config| {
            config
                .stop_sequences
                .as_ref()
                .map(|stops| Value::from(stops.clone()))
        }),
        stream_options: None,
    }
}

fn tool_choice(req: &GenerateContentRequest) -> Option<Value> {
    let mode = req
        .tool_config
        .as_ref()?
        .get("functionCallingConfig")?
        .get("mode")?
        .as_str()?;
    match mode {
        "NONE" => Some(Value::from("none")),
        "ANY" => Some(Value::from("required")),
        _ => Some(Value::from("auto")),
    }
}

fn budget_to_ladder_effort(budget: i64) -> Option<String> {
    if budget == -1 {
        return Some("auto".to_string());
    }
    if budget < -1 {
        return None;
    }
    if budget == 0 {
        return Some("none".to_string());
    }
    lmgate_registry::LEVEL_LADDER
        .iter()
        .find(|(_, level_budget)| *level_budget >= budget)
        .or(lmgate_registry::LEVEL_LADDER.last())
        .map(|(name, _)| name.to_string())
}

pub fn joined_text(parts: &[GeminiPart]) -> String {
    parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n")
}
