use lmgate_protocol::claude::{
    ClaudeBlock, ClaudeContent, ClaudeImageSource, ClaudeMessage, ClaudeSystem, ClaudeThinking,
    ClaudeTool, MessagesRequest, DEFAULT_MAX_TOKENS,
};
use lmgate_protocol::gemini::GenerateContentRequest;

use crate::gemini2openai_chat::request::joined_text;
use crate::ids;

pub fn translate_request(req: GenerateContentRequest, model: &str) -> MessagesRequest {
    let mut messages = Vec::new();
    let mut generated_tools = 0usize;

    for content in &req.contents {
        let role = if content.role.as_deref() == Some("model") {
            "assistant"
        } else {
            "user"
        };
        let mut blocks = Vec::new();
        for part in &content.parts {
            if let Some(text) = &part.text {
                if part.thought.unwrap_or(false) {
                    blocks.push(ClaudeBlock::Thinking {
                        thinking: text.clone(),
                        signature: None,
                    });
                } else {
                    blocks.push(ClaudeBlock::Text { text: text.clone() });
                }
            }
            if let Some(blob) = &part.inline_data {
                blocks.push(ClaudeBlock::Image {
                    source: ClaudeImageSource {
                        source_type: "base64".to_string(),
                        media_type: Some(blob.mime_type.clone()),
                        data: Some(blob.data.clone()),
                        url: None,
                    },
                });
            }
            if let Some(call) = &part.function_call {
                let id = call.id.clone().unwrap_or_else(|| {
                    let id = ids::tool_use_id(generated_tools);
                    generated_tools += 1;
                    id
                });
                blocks.push(ClaudeBlock::ToolUse {
                    id,
                    name: call.name.clone(),
                    input: call.args.clone().unwrap_or_else(|| serde_json::json!({})),
                });
            }
            if let Some(function_response) = &part.function_response {
                blocks.push(ClaudeBlock::ToolResult {
                    tool_use_id: function_response
                        .id
                        .clone()
                        .unwrap_or_else(|| function_response.name.clone()),
                    content: Some(function_response.response.clone()),
                    is_error: None,
                });
            }
        }
        if !blocks.is_empty() {
            messages.push(ClaudeMessage {
                role: role.to_string(),
                content: ClaudeContent::Blocks(blocks),
            });
        }
    }

    let system = req.system_instruction.as_ref().and_then(|instruction| {
        let text = joined_text(&instruction.parts);
        (!text.is_empty()).then_some(ClaudeSystem::Text(text))
    });

    let tools = req.tools.as_ref().map(|tools| {
        tools
            .iter()
            .flat_map(|tool| &tool.function_declarations)
            .map(|declaration| ClaudeTool {
                name: declaration.name.clone(),
                description: declaration.description.clone(),
                input_schema: declaration.parameters.clone(),
            })
            .collect::<Vec<_>>()
    });

    let config = req.generation_config.as_ref();
    let thinking = config
        .and_then(|config| config.thinking_config.as_ref())
        .and_then(|thinking| thinking.thinking_budget)
        .filter(|budget| *budget > 0)
        .map(ClaudeThinking::enabled);

    MessagesRequest {
        model: model.to_string(),
        max_tokens: config
            .and_then(|config| config.max_output_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS),
        messages,
        system,
        stream: None,
        tools,
        tool_choice: None,
        thinking,
        temperature: config.and_then(|config| config.temperature),
        top_p: config.and_then(|config| config.top_p),
        stop_sequences: config.and_then(|config| config.stop_sequences.clone()),
    }
}
