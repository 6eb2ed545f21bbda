use lmgate_protocol::openai::chat::{ChatCompletionResponse, ChatContent, ChatUsage};
use lmgate_protocol::openai::responses::{
    ResponseContentPart, ResponseOutputItem, ResponsesResponse, ResponsesUsage,
};

pub fn translate_response(resp: ChatCompletionResponse) -> ResponsesResponse {
    let mut output = Vec::new();
    for choice in &resp.choices {
        if let Some(ChatContent::Text(text)) = &choice.message.content {
            output.push(ResponseOutputItem::Message {
                id: None,
                role: "assistant".to_string(),
                content: vec![ResponseContentPart::OutputText { text: text.clone() }],
            });
        }
        for call in choice.message.tool_calls.iter().flatten() {
            output.push(ResponseOutputItem::FunctionCall {
                id: None,
                call_id: call.id.clone(),
                name: call.function.name.clone(),
                arguments: call.function.arguments.clone(),
            });
        }
    }

    ResponsesResponse {
        id: resp.id.clone(),
        object: "response".to_string(),
        created_at: Some(resp.created),
        model: resp.model.clone(),
        status: Some("completed".to_string()),
        output,
        usage: resp.usage.as_ref().map(map_usage),
    }
}

pub fn map_usage(usage: &ChatUsage) -> ResponsesUsage {
    ResponsesUsage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    }
}
