use lmgate_protocol::claude::{ClaudeBlock, ClaudeUsage, MessagesResponse};
use lmgate_protocol::gemini::{
    GenerateContentResponse, GeminiCandidate, GeminiContent, GeminiFunctionCall, GeminiPart,
    GeminiUsage,
};

pub fn translate_response(resp: MessagesResponse) -> GenerateContentResponse {
    let mut parts = Vec::new();
    for block in &resp.content {
        match block {
            ClaudeBlock::Text { text } => parts.push(GeminiPart::text(text.clone())),
            ClaudeBlock::Thinking { thinking, .. } => parts.push(GeminiPart {
                text: Some(thinking.clone()),
                thought: Some(true),
                ..Default::default()
            }),
            ClaudeBlock::ToolUse { id, name, input } => parts.push(GeminiPart {
                function_call: Some(GeminiFunctionCall {
                    id: Some(id.clone()),
                    name: name.clone(),
                    args: Some(input.clone()),
                }),
                ..Default::default()
            }),
            ClaudeBlock::Image { .. } | ClaudeBlock::ToolResult { .. } => {}
        }
    }

    GenerateContentResponse {
        candidates: vec![GeminiCandidate {
            content: GeminiContent {
                role: Some("model".to_string()),
                parts,
            },
            finish_reason: resp.stop_reason.as_deref().map(map_finish_reason),
            index: Some(0),
        }],
        usage_metadata: resp.usage.as_ref().map(map_usage),
        model_version: Some(resp.model.clone()),
        response_id: Some(resp.id.clone()),
    }
}

pub fn map_finish_reason(stop_reason: &str) -> String {
    match stop_reason {
        "max_tokens" => "MAX_TOKENS",
        _ => "STOP",
    }
    .to_string()
}

pub fn map_usage(usage: &ClaudeUsage) -> GeminiUsage {
    GeminiUsage {
        prompt_token_count: Some(usage.input_tokens),
        candidates_token_count: Some(usage.output_tokens),
        total_token_count: Some(usage.input_tokens + usage.output_tokens),
        thoughts_token_count: None,
    }
}
