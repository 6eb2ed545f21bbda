//! Stable tool-call id generation for sources that omit them.
//! Ids are deterministic within one request/stream so the same call
//! keeps its id on the way out.

pub fn call_id(index: usize) -> String {
    format!("call_{index:04}")
}

pub fn tool_use_id(index: usize) -> String {
    format!("toolu_{index:04}")
}
