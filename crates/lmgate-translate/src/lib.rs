//! Translation edges between wire dialects.
//!
//! Module naming follows `src2dst`: `request` converts a src-dialect
//! request into dst form; `response` and `stream` convert dst-dialect
//! output back into src form.

mod edge;
mod registry;
pub mod stream2nostream;

pub mod claude2gemini;
pub mod gemini2claude;
pub mod gemini2openai_chat;
pub mod openai_chat2gemini;
pub mod openai_chat2openai_responses;
pub mod openai_responses2openai_chat;

mod ids;
mod media;

pub use edge::{Edge, StreamTranslator, TranslateError};
pub use registry::TranslatorRegistry;
