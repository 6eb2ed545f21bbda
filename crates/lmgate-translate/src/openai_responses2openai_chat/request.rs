use lmgate_protocol::openai::chat::{
    ChatCompletionRequest, ChatContent, ChatContentPart, ChatFunctionCall, ChatFunctionDef,
    ChatImageUrl, ChatMessage, ChatTool, ChatToolCall,
};
use lmgate_protocol::openai::responses::{
    ResponseContentPart, ResponseInputItem, ResponsesMessageContent, ResponsesRequest,
};

pub fn translate_request(req: ResponsesRequest) -> ChatCompletionRequest {
    let mut messages = Vec::new();

    if let Some(instructions) = &req.instructions {
        if !instructions.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(ChatContent::Text(instructions.clone())),
                ..Default::default()
            });
        }
    }

    for item in &req.input {
        match item {
            ResponseInputItem::Message(message) => {
                let content = match &message.content {
                    ResponsesMessageContent::Text(text) => ChatContent::Text(text.clone()),
                    ResponsesMessageContent::Parts(parts) => {
                        let mapped: Vec<ChatContentPart> = parts
                            .iter()
                            .filter_map(|part| match part {
                                ResponseContentPart::InputText { text }
                                | ResponseContentPart::OutputText { text } => {
                                    Some(ChatContentPart::Text { text: text.clone() })
                                }
                                ResponseContentPart::InputImage { image_url, .. } => {
                                    image_url.as_ref().map(|url| ChatContentPart::ImageUrl {
                                        image_url: ChatImageUrl {
                                            url: url.clone(),
                                            detail: None,
                                        },
                                    })
                                }
                            })
                            .collect();
                        match mapped.as_slice() {
                            [ChatContentPart::Text { text }] => ChatContent::Text(text.clone()),
                            _ => ChatContent::Parts(mapped),
                        }
                    }
                };
                messages.push(ChatMessage {
                    role: message.role.clone(),
                    content: Some(content),
                    ..Default::default()
                });
            }
            ResponseInputItem::FunctionCall(call) => {
                messages.push(ChatMessage {
                    role: "assistant".to_string(),
                    content: None,
                    tool_calls: Some(vec![ChatToolCall {
                        id: call.call_id.clone(),
                        call_type: "function".to_string(),
                        function: ChatFunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        },
                    }]),
                    ..Default::default()
                });
            }
            ResponseInputItem::FunctionCallOutput(output) => {
                messages.push(ChatMessage {
                    role: "tool".to_string(),
                    content: Some(ChatContent::Text(output.output.clone())),
                    tool_call_id: Some(output.call_id.clone()),
                    ..Default::default()
                });
            }
        }
    }

    let tools = req.tools.as_ref().map(|tools| {
        tools
            .iter()
            .filter(|tool| tool.tool_type == "function")
            .filter_map(|tool| {
                tool.name.as_ref().map(|name| ChatTool {
                    tool_type: "function".to_string(),
                    function: ChatFunctionDef {
                        name: name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                    },
                })
            })
            .collect::<Vec<_>>()
    });

    ChatCompletionRequest {
        model: req.model.clone(),
        messages,
        stream: req.stream,
        tools,
        tool_choice: req.tool_choice.clone(),
        reasoning_effort: req
            .reasoning
            .as_ref()
            .and_then(|reasoning| reasoning.effort.clone()),
        max_tokens: req.max_output_tokens,
        max_completion_tokens: None,
        temperature: req.temperature,
        top_p: req.top_p,
        stop: None,
        stream_options: None,
    }
}
