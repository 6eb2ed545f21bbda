use std::collections::HashMap;

use lmgate_protocol::gemini::{
    GenerateContentRequest, GenerationConfig, GeminiContent, GeminiFunctionCall,
    GeminiFunctionDeclaration, GeminiFunctionResponse, GeminiPart, GeminiTool, ThinkingConfig,
};
use lmgate_protocol::openai::chat::{ChatCompletionRequest, ChatContent, ChatContentPart};
use serde_json::Value;

use crate::media::data_url_to_blob;

pub fn translate_request(req: ChatCompletionRequest) -> GenerateContentRequest {
    let mut system_texts = Vec::new();
    let mut contents = Vec::new();
    // Tool results arrive keyed by call id; function names come from the
    // assistant turn that issued the call.
    let mut call_names: HashMap<String, String> = HashMap::new();

    for message in &req.messages {
        match message.role.as_str() {
            "system" | "developer" => {
                if let Some(text) = flatten_text(&message.content) {
                    system_texts.push(text);
                }
            }
            "assistant" => {
                let mut parts = Vec::new();
                if let Some(text) = flatten_text(&message.content) {
                    if !text.is_empty() {
                        parts.push(GeminiPart::text(text));
                    }
                }
                for call in message.tool_calls.iter().flatten() {
                    call_names.insert(call.id.clone(), call.function.name.clone());
                    parts.push(GeminiPart {
                        function_call: Some(GeminiFunctionCall {
                            id: Some(call.id.clone()),
                            name: call.function.name.clone(),
                            args: serde_json::from_str(&call.function.arguments).ok(),
                        }),
                        ..Default::default()
                    });
                }
                if !parts.is_empty() {
                    contents.push(GeminiContent {
                        role: Some("model".to_string()),
                        parts,
                    });
                }
            }
            "tool" => {
                let call_id = message.tool_call_id.clone().unwrap_or_default();
                let name = message
                    .name
                    .clone()
                    .or_else(|| call_names.get(&call_id).cloned())
                    .unwrap_or_else(|| call_id.clone());
                let response = flatten_text(&message.content)
                    .map(|text| {
                        serde_json::from_str::<Value>(&text)
                            .unwrap_or_else(|_| serde_json::json!({ "result": text }))
                    })
                    .unwrap_or_else(|| serde_json::json!({}));
                contents.push(GeminiContent {
                    role: Some("user".to_string()),
                    parts: vec![GeminiPart {
                        function_response: Some(GeminiFunctionResponse {
                            id: Some(call_id),
                            name,
                            response,
                        }),
                        ..Default::default()
                    }],
                });
            }
            _ => {
                let parts = user_parts(&message.content);
                if !parts.is_empty() {
                    contents.push(GeminiContent {
                        role: Some("user".to_string()),
                        parts,
                    });
                }
            }
        }
    }

    let system_instruction = (!system_texts.is_empty()).then(|| GeminiContent {
        role: None,
        parts: vec![GeminiPart::text(system_texts.join("\n"))],
    });

    let tools = req.tools.as_ref().map(|tools| {
        vec![GeminiTool {
            function_declarations: tools
                .iter()
                .map(|tool| GeminiFunctionDeclaration {
                    name: tool.function.name.clone(),
                    description: tool.function.description.clone(),
                    parameters: tool.function.parameters.clone(),
                })
                .collect(),
        }]
    });

    GenerateContentRequest {
        model: None,
        contents,
        system_instruction,
        tools,
        tool_config: None,
        generation_config: generation_config(&req),
        safety_settings: None,
    }
}

fn generation_config(req: &ChatCompletionRequest) -> Option<GenerationConfig> {
    let max_output_tokens = req.max_completion_tokens.or(req.max_tokens);
    let stop_sequences = req.stop.as_ref().map(|stop| match stop {
        Value::String(single) => vec![single.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(|s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    });
    let thinking_config = req.reasoning_effort.as_deref().and_then(effort_to_config);

    if req.temperature.is_none()
        && req.top_p.is_none()
        && max_output_tokens.is_none()
        && stop_sequences.is_none()
        && thinking_config.is_none()
    {
        return None;
    }
    Some(GenerationConfig {
        temperature: req.temperature,
        top_p: req.top_p,
        max_output_tokens,
        stop_sequences,
        thinking_config,
    })
}

/// Canonical ladder mapping; model-aware clamping happens later in the
/// executor's projection step.
fn effort_to_config(effort: &str) -> Option<ThinkingConfig> {
    let lowered = effort.trim().to_ascii_lowercase();
    let budget = match lowered.as_str() {
        "" => return None,
        "auto" => -1,
        "none" => 0,
        name => {
            lmgate_registry::LEVEL_LADDER
                .iter()
                .find(|(ladder_name, _)| *ladder_name == name)?
                .1
        }
    };
    Some(ThinkingConfig {
        thinking_budget: Some(budget),
        thinking_level: None,
        include_thoughts: None,
    })
}

fn flatten_text(content: &Option<ChatContent>) -> Option<String> {
    match content {
        Some(ChatContent::Text(text)) => Some(text.clone()),
        Some(ChatContent::Parts(parts)) => {
            let joined = parts
                .iter()
                .filter_map(|part| match part {
                    ChatContentPart::Text { text } => Some(text.as_str()),
                    ChatContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n");
            (!joined.is_empty()).then_some(joined)
        }
        None => None,
    }
}

fn user_parts(content: &Option<ChatContent>) -> Vec<GeminiPart> {
    match content {
        Some(ChatContent::Text(text)) => vec![GeminiPart::text(text.clone())],
        Some(ChatContent::Parts(parts)) => parts
            .iter()
            .map(|part| match part {
                ChatContentPart::Text { text } => GeminiPart::text(text.clone()),
                ChatContentPart::ImageUrl { image_url } => {
                    match data_url_to_blob(&image_url.url) {
                        Some(blob) => GeminiPart {
                            inline_data: Some(blob),
                            ..Default::default()
                        },
                        // Remote URLs cannot become inline blobs; keep
                        // the reference visible to the model.
                        None => GeminiPart::text(image_url.url.clone()),
                    }
                }
            })
            .collect(),
        None => Vec::new(),
    }
}
