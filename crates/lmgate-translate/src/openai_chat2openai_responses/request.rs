use lmgate_protocol::openai::chat::{ChatCompletionRequest, ChatContent, ChatContentPart};
use lmgate_protocol::openai::responses::{
    ResponseContentPart, ResponseInputItem, ResponsesFunctionCall, ResponsesFunctionCallOutput,
    ResponsesMessage, ResponsesMessageContent, ResponsesReasoning, ResponsesRequest, ResponsesTool,
};

pub fn translate_request(req: ChatCompletionRequest) -> ResponsesRequest {
    let mut instructions = Vec::new();
    let mut input = Vec::new();

    for message in &req.messages {
        match message.role.as_str() {
            "system" | "developer" => {
                if let Some(ChatContent::Text(text)) = &message.content {
                    instructions.push(text.clone());
                }
            }
            "assistant" => {
                if let Some(ChatContent::Text(text)) = &message.content {
                    if !text.is_empty() {
                        input.push(ResponseInputItem::Message(ResponsesMessage {
                            item_type: Some("message".to_string()),
                            role: "assistant".to_string(),
                            content: ResponsesMessageContent::Parts(vec![
                                ResponseContentPart::OutputText { text: text.clone() },
                            ]),
                        }));
                    }
                }
                for call in message.tool_calls.iter().flatten() {
                    input.push(ResponseInputItem::FunctionCall(ResponsesFunctionCall {
                        item_type: "function_call".to_string(),
                        id: None,
                        call_id: call.id.clone(),
                        name: call.function.name.clone(),
                        arguments: call.function.arguments.clone(),
                    }));
                }
            }
            "tool" => {
                let output = match &message.content {
                    Some(ChatContent::Text(text)) => text.clone(),
                    _ => String::new(),
                };
                input.push(ResponseInputItem::FunctionCallOutput(
                    ResponsesFunctionCallOutput {
                        item_type: "function_call_output".to_string(),
                        call_id: message.tool_call_id.clone().unwrap_or_default(),
                        output,
                    },
                ));
            }
            _ => {
                let parts = match &message.content {
                    Some(ChatContent::Text(text)) => {
                        vec![ResponseContentPart::InputText { text: text.clone() }]
                    }
                    Some(ChatContent::Parts(parts)) => parts
                        .iter()
                        .map(|part| match part {
                            ChatContentPart::Text { text } => {
                                ResponseContentPart::InputText { text: text.clone() }
                            }
                            ChatContentPart::ImageUrl { image_url } => {
                                ResponseContentPart::InputImage {
                                    image_url: Some(image_url.url.clone()),
                                    detail: image_url.detail.clone(),
                                }
                            }
                        })
                        .collect(),
                    None => Vec::new(),
                };
                if !parts.is_empty() {
                    input.push(ResponseInputItem::Message(ResponsesMessage {
                        item_type: Some("message".to_string()),
                        role: "user".to_string(),
                        content: ResponsesMessageContent::Parts(parts),
                    }));
                }
            }
        }
    }

    let tools = req.tools.as_ref().map(|tools| {
        tools
            .iter()
            .map(|tool| ResponsesTool {
                tool_type: "function".to_string(),
                name: Some(tool.function.name.clone()),
                description: tool.function.description.clone(),
                parameters: tool.function.parameters.clone(),
            })
            .collect::<Vec<_>>()
    });

    ResponsesRequest {
        model: req.model.clone(),
        input,
        stream: req.stream,
        instructions: (!instructions.is_empty()).then(|| instructions.join("\n")),
        reasoning: req.reasoning_effort.as_ref().map(|effort| ResponsesReasoning {
            effort: Some(effort.clone()),
            summary: None,
        }),
        tools,
        tool_choice: req.tool_choice.clone(),
        max_output_tokens: req.max_completion_tokens.or(req.max_tokens),
        temperature: req.temperature,
        top_p: req.top_p,
        previous_response_id: None,
    }
}
