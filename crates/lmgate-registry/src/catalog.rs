//! Built-in model descriptors registered for each provider at startup.
//! OpenAI-compatible providers register their configured models
//! separately, usually without thinking metadata.

use lmgate_common::ProviderKind;

use crate::descriptor::{ModelDescriptor, ThinkingSupport};

pub fn builtin_gemini_models(provider: ProviderKind) -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor::new(
            "gemini-2.5-pro",
            "google",
            provider.clone(),
            ThinkingSupport::Budget {
                min: 128,
                max: 32768,
                default: -1,
            },
        ),
        ModelDescriptor::new(
            "gemini-2.5-flash",
            "google",
            provider.clone(),
            ThinkingSupport::Budget {
                min: 0,
                max: 24576,
                default: -1,
            },
        ),
        ModelDescriptor::new(
            "gemini-3-pro-preview",
            "google",
            provider.clone(),
            ThinkingSupport::ladder(&["low", "high"]),
        ),
        ModelDescriptor::new(
            "gemini-3-flash-preview",
            "google",
            provider,
            ThinkingSupport::ladder(&["minimal", "low", "medium", "high"]),
        ),
    ]
}

pub fn builtin_claude_models() -> Vec<ModelDescriptor> {
    let budget = ThinkingSupport::Budget {
        min: 1024,
        max: 32000,
        default: 0,
    };
    vec![
        ModelDescriptor::new(
            "claude-sonnet-4",
            "anthropic",
            ProviderKind::ClaudeCode,
            budget.clone(),
        ),
        ModelDescriptor::new(
            "claude-sonnet-4-5",
            "anthropic",
            ProviderKind::ClaudeCode,
            budget.clone(),
        ),
        ModelDescriptor::new(
            "claude-opus-4-5",
            "anthropic",
            ProviderKind::ClaudeCode,
            budget,
        ),
        ModelDescriptor::new(
            "claude-haiku-4-5",
            "anthropic",
            ProviderKind::ClaudeCode,
            ThinkingSupport::None,
        ),
    ]
}

pub fn builtin_openai_models() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor::new(
            "gpt-5",
            "openai",
            ProviderKind::Codex,
            ThinkingSupport::ladder(&["minimal", "low", "medium", "high"]),
        ),
        ModelDescriptor::new(
            "gpt-5-codex",
            "openai",
            ProviderKind::Codex,
            ThinkingSupport::ladder(&["low", "medium", "high"]),
        ),
        ModelDescriptor::new(
            "gpt-5.2",
            "openai",
            ProviderKind::Codex,
            ThinkingSupport::ladder(&["minimal", "low", "medium", "high", "xhigh"]),
        ),
    ]
}

pub fn builtin_qwen_models() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor::new(
            "qwen3-code-plus",
            "qwen",
            ProviderKind::Qwen,
            ThinkingSupport::None,
        ),
        ModelDescriptor::new(
            "qwen3-coder-flash",
            "qwen",
            ProviderKind::Qwen,
            ThinkingSupport::None,
        ),
    ]
}

pub fn builtin_iflow_models() -> Vec<ModelDescriptor> {
    vec![ModelDescriptor::new(
        "tstars2.0",
        "iflow",
        ProviderKind::IFlow,
        ThinkingSupport::None,
    )]
}
