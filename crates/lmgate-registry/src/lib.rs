mod catalog;
mod descriptor;
mod registry;
pub mod thinking;

pub use catalog::{
    builtin_claude_models, builtin_gemini_models, builtin_iflow_models, builtin_openai_models,
    builtin_qwen_models,
};
pub use descriptor::{ModelDescriptor, ThinkingSupport, LEVEL_LADDER};
pub use registry::ModelRegistry;
pub use thinking::{parse_model_suffix, ParsedModel, ThinkingDirective, ThinkingError};
