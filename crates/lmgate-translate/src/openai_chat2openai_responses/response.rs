use lmgate_protocol::openai::chat::{
    ChatChoice, ChatCompletionResponse, ChatContent, ChatFunctionCall, ChatMessage, ChatToolCall,
    ChatUsage,
};
use lmgate_protocol::openai::responses::{
    ResponseContentPart, ResponseOutputItem, ResponsesResponse, ResponsesUsage,
};

pub fn translate_response(resp: ResponsesResponse) -> ChatCompletionResponse {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for item in &resp.output {
        match item {
            ResponseOutputItem::Message { content, .. } => {
                for part in content {
                    if let ResponseContentPart::OutputText { text: part_text }
                    | ResponseContentPart::InputText { text: part_text } = part
                    {
                        text.push_str(part_text);
                    }
                }
            }
            ResponseOutputItem::FunctionCall {
                call_id,
                name,
                arguments,
                ..
            } => {
                tool_calls.push(ChatToolCall {
                    id: call_id.clone(),
                    call_type: "function".to_string(),
                    function: ChatFunctionCall {
                        name: name.clone(),
                        arguments: arguments.clone(),
                    },
                });
            }
            ResponseOutputItem::Reasoning { .. } => {}
        }
    }

    let finish_reason = if !tool_calls.is_empty() {
        "tool_calls"
    } else {
        "stop"
    };

    ChatCompletionResponse {
        id: resp.id.clone(),
        object: "chat.completion".to_string(),
        created: resp.created_at.unwrap_or(0),
        model: resp.model.clone(),
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage {
                role: "assistant".to_string(),
                content: (!text.is_empty()).then_some(ChatContent::Text(text)),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                tool_call_id: None,
                name: None,
            },
            finish_reason: Some(finish_reason.to_string()),
        }],
        usage: resp.usage.as_ref().map(map_usage),
    }
}

pub fn map_usage(usage: &ResponsesUsage) -> ChatUsage {
    ChatUsage {
        prompt_tokens: usage.input_tokens,
        completion_tokens: usage.output_tokens,
        total_tokens: usage.total_tokens,
        completion_tokens_details: None,
    }
}
