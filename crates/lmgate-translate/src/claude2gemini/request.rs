use std::collections::HashMap;

use lmgate_protocol::claude::{ClaudeBlock, ClaudeContent, MessagesRequest};
use lmgate_protocol::gemini::{
    GenerateContentRequest, GenerationConfig, GeminiBlob, GeminiContent, GeminiFunctionCall,
    GeminiFunctionDeclaration, GeminiFunctionResponse, GeminiPart, GeminiTool, ThinkingConfig,
};
use serde_json::Value;

pub fn translate_request(req: MessagesRequest) -> GenerateContentRequest {
    let mut contents = Vec::new();
    let mut tool_names: HashMap<String, String> = HashMap::new();

    for message in &req.messages {
        let role = if message.role == "assistant" {
            "model"
        } else {
            "user"
        };
        let mut parts = Vec::new();
        match &message.content {
            ClaudeContent::Text(text) => parts.push(GeminiPart::text(text.clone())),
            ClaudeContent::Blocks(blocks) => {
                for block in blocks {
                    match block {
                        ClaudeBlock::Text { text } => parts.push(GeminiPart::text(text.clone())),
                        ClaudeBlock::Image { source } => {
                            if let (Some(media_type), Some(data)) =
                                (source.media_type.clone(), source.data.clone())
                            {
                                parts.push(GeminiPart {
                                    inline_data: Some(GeminiBlob {
                                        mime_type: media_type,
                                        data,
                                    }),
                                    ..Default::default()
                                });
                            }
                        }
                        ClaudeBlock::ToolUse { id, name, input } => {
                            tool_names.insert(id.clone(), name.clone());
                            parts.push(GeminiPart {
                                function_call: Some(GeminiFunctionCall {
                                    id: Some(id.clone()),
                                    name: name.clone(),
                                    args: Some(input.clone()),
                                }),
                                ..Default::default()
                            });
                        }
                        ClaudeBlock::ToolResult {
                            tool_use_id,
                            content,
                            ..
                        } => {
                            let name = tool_names
                                .get(tool_use_id)
                                .cloned()
                                .unwrap_or_else(|| tool_use_id.clone());
                            parts.push(GeminiPart {
                                function_response: Some(GeminiFunctionResponse {
                                    id: Some(tool_use_id.clone()),
                                    name,
                                    response: tool_result_value(content),
                                }),
                                ..Default::default()
                            });
                        }
                        // Prior-turn reasoning is not replayed upstream.
                        ClaudeBlock::Thinking { .. } => {}
                    }
                }
            }
        }
        if !parts.is_empty() {
            contents.push(GeminiContent {
                role: Some(role.to_string()),
                parts,
            });
        }
    }

    let system_instruction = req.system.as_ref().map(|system| {
        GeminiContent {
            role: None,
            parts: vec![GeminiPart::text(system.joined())],
        }
    });

    let tools = req.tools.as_ref().map(|tools| {
        vec![GeminiTool {
            function_declarations: tools
                .iter()
                .map(|tool| GeminiFunctionDeclaration {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.input_schema.clone(),
                })
                .collect(),
        }]
    });

    let thinking_config = req.thinking.as_ref().and_then(|thinking| {
        if thinking.thinking_type != "enabled" {
            return None;
        }
        thinking.budget_tokens.map(|budget| ThinkingConfig {
            thinking_budget: Some(budget),
            thinking_level: None,
            include_thoughts: None,
        })
    });

    GenerateContentRequest {
        model: None,
        contents,
        system_instruction,
        tools,
        tool_config: None,
        generation_config: Some(GenerationConfig {
            temperature: req.temperature,
            top_p: req.top_p,
            max_output_tokens: (req.max_tokens > 0).then_some(req.max_tokens),
            stop_sequences: req.stop_sequences.clone(),
            thinking_config,
        }),
        safety_settings: None,
    }
}

fn tool_result_value(content: &Option<Value>) -> Value {
    match content {
        Some(Value::String(text)) => serde_json::json!({ "result": text }),
        Some(value) => {
            // Claude tool results may be a block list; fold text blocks
            // into one result string.
            if let Some(blocks) = value.as_array() {
                let joined = blocks
                    .iter()
                    .filter_map(|block| block.get("text").and_then(|text| text.as_str()))
                    .collect::<Vec<_>>()
                    .join("\n");
                if !joined.is_empty() {
                    return serde_json::json!({ "result": joined });
                }
            }
            value.clone()
        }
        None => serde_json::json!({}),
    }
}
