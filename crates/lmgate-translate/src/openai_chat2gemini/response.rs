use lmgate_protocol::gemini::{GenerateContentResponse, GeminiUsage};
use lmgate_protocol::openai::chat::{
    ChatChoice, ChatCompletionResponse, ChatCompletionTokensDetails, ChatContent, ChatFunctionCall,
    ChatMessage, ChatToolCall, ChatUsage,
};

use crate::ids;

pub fn translate_response(resp: GenerateContentResponse) -> ChatCompletionResponse {
    let mut choices = Vec::new();
    for (idx, candidate) in resp.candidates.iter().enumerate() {
        let index = candidate.index.unwrap_or(idx as i64);
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in &candidate.content.parts {
            if part.thought.unwrap_or(false) {
                continue;
            }
            if let Some(part_text) = &part.text {
                text.push_str(part_text);
            }
            if let Some(call) = &part.function_call {
                tool_calls.push(ChatToolCall {
                    id: call
                        .id
                        .clone()
                        .unwrap_or_else(|| ids::call_id(tool_calls.len())),
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

        let finish_reason = if !tool_calls.is_empty() {
            Some("tool_calls".to_string())
        } else {
            candidate.finish_reason.as_deref().map(map_finish_reason)
        };

        choices.push(ChatChoice {
            index,
            message: ChatMessage {
                role: "assistant".to_string(),
                content: (!text.is_empty()).then_some(ChatContent::Text(text)),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                tool_call_id: None,
                name: None,
            },
            finish_reason,
        });
    }

    ChatCompletionResponse {
        id: resp.response_id.clone().unwrap_or_else(|| "resp".to_string()),
        object: "chat.completion".to_string(),
        created: 0,
        model: resp
            .model_version
            .clone()
            .map(strip_models_prefix)
            .unwrap_or_default(),
        choices,
        usage: resp.usage_metadata.as_ref().map(map_usage),
    }
}

pub fn map_finish_reason(reason: &str) -> String {
    match reason {
        "STOP" => "stop",
        "MAX_TOKENS" => "length",
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => "content_filter",
        "MALFORMED_FUNCTION_CALL" | "UNEXPECTED_TOOL_CALL" => "tool_calls",
        _ => "stop",
    }
    .to_string()
}

pub fn map_usage(usage: &GeminiUsage) -> ChatUsage {
    let prompt_tokens = usage.prompt_token_count.unwrap_or(0);
    let completion_tokens = usage.candidates_token_count.unwrap_or(0);
    ChatUsage {
        prompt_tokens,
        completion_tokens,
        total_tokens: usage
            .total_token_count
            .unwrap_or(prompt_tokens + completion_tokens),
        completion_tokens_details: usage.thoughts_token_count.map(|thoughts| {
            ChatCompletionTokensDetails {
                reasoning_tokens: Some(thoughts),
            }
        }),
    }
}

pub fn strip_models_prefix(model: String) -> String {
    model
        .strip_prefix("models/")
        .map(|rest| rest.to_string())
        .unwrap_or(model)
}
