use lmgate_protocol::claude::{ClaudeBlock, ClaudeUsage, MessagesResponse};
use lmgate_protocol::gemini::{GenerateContentResponse, GeminiUsage};

use crate::ids;

pub fn translate_response(resp: GenerateContentResponse) -> MessagesResponse {
    let mut content = Vec::new();
    let mut saw_tool_use = false;

    if let Some(candidate) = resp.candidates.first() {
        for part in &candidate.content.parts {
            if part.thought.unwrap_or(false) {
                if let Some(text) = &part.text {
                    content.push(ClaudeBlock::Thinking {
                        thinking: text.clone(),
                        signature: None,
                    });
                }
                continue;
            }
            if let Some(text) = &part.text {
                content.push(ClaudeBlock::Text { text: text.clone() });
            }
            if let Some(call) = &part.function_call {
                saw_tool_use = true;
                content.push(ClaudeBlock::ToolUse {
                    id: call
                        .id
                        .clone()
                        .unwrap_or_else(|| ids::tool_use_id(content.len())),
                    name: call.name.clone(),
                    input: call.args.clone().unwrap_or_else(|| serde_json::json!({})),
                });
            }
        }
    }

    let stop_reason = resp
        .candidates
        .first()
        .and_then(|candidate| candidate.finish_reason.as_deref())
        .map(|reason| map_stop_reason(reason, saw_tool_use));

    MessagesResponse {
        id: resp
            .response_id
            .clone()
            .unwrap_or_else(|| "msg".to_string()),
        response_type: "message".to_string(),
        role: "assistant".to_string(),
        model: resp.model_version.clone().unwrap_or_default(),
        content,
        stop_reason,
        stop_sequence: None,
        usage: resp.usage_metadata.as_ref().map(map_usage),
    }
}

pub fn map_stop_reason(reason: &str, saw_tool_use: bool) -> String {
    if saw_tool_use {
        return "tool_use".to_string();
    }
    match reason {
        "MAX_TOKENS" => "max_tokens",
        _ => "end_turn",
    }
    .to_string()
}

pub fn map_usage(usage: &GeminiUsage) -> ClaudeUsage {
    ClaudeUsage {
        input_tokens: usage.prompt_token_count.unwrap_or(0),
        output_tokens: usage.candidates_token_count.unwrap_or(0),
    }
}
