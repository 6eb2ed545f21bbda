use lmgate_protocol::gemini::{
    GenerateContentResponse, GeminiCandidate, GeminiContent, GeminiFunctionCall, GeminiPart,
    GeminiUsage,
};
use lmgate_protocol::openai::chat::{ChatCompletionResponse, ChatContent, ChatUsage};

pub fn translate_response(resp: ChatCompletionResponse) -> GenerateContentResponse {
    let candidates = resp
        .choices
        .iter()
        .map(|choice| {
            let mut parts = Vec::new();
            if let Some(ChatContent::Text(text)) = &choice.message.content {
                if !text.is_empty() {
                    parts.push(GeminiPart::text(text.clone()));
                }
            }
            for call in choice.message.tool_calls.iter().flatten() {
                parts.push(GeminiPart {
                    function_call: Some(GeminiFunctionCall {
                        id: Some(call.id.clone()),
                        name: call.function.name.clone(),
                        args: serde_json::from_str(&call.function.arguments).ok(),
                    }),
                    ..Default::default()
                });
            }
            GeminiCandidate {
                content: GeminiContent {
                    role: Some("model".to_string()),
                    parts,
                },
                finish_reason: choice.finish_reason.as_deref().map(map_finish_reason),
                index: Some(choice.index),
            }
        })
        .collect();

    GenerateContentResponse {
        candidates,
        usage_metadata: resp.usage.as_ref().map(map_usage),
        model_version: Some(resp.model.clone()),
        response_id: Some(resp.id.clone()),
    }
}

pub fn map_finish_reason(reason: &str) -> String {
    match reason {
        "length" => "MAX_TOKENS",
        "content_filter" => "SAFETY",
        _ => "STOP",
    }
    .to_string()
}

pub fn map_usage(usage: &ChatUsage) -> GeminiUsage {
    GeminiUsage {
        prompt_token_count: Some(usage.prompt_tokens),
        candidates_token_count: Some(usage.completion_tokens),
        total_token_count: Some(usage.total_tokens),
        thoughts_token_count: usage
            .completion_tokens_details
            .as_ref()
            .and_then(|details| details.reasoning_tokens),
    }
}
