//! Model-field rewriting on streamed frames.
//!
//! Upstream payloads name the provider's base model id; every frame the
//! client sees must carry the id the client originally asked for,
//! thinking suffix included. Frames are patched one at a time so the
//! stream is never buffered.

use serde_json::Value;

const MODEL_PATHS: &[&[&str]] = &[
    &["model"],
    &["modelVersion"],
    &["response", "model"],
    &["response", "modelVersion"],
    &["message", "model"],
];

/// Overwrites every known model path that is present in `value`.
pub fn rewrite_model_fields(value: &mut Value, model: &str) {
    for path in MODEL_PATHS {
        patch_path(value, path, model);
    }
}

fn patch_path(value: &mut Value, path: &[&str], model: &str) {
    let mut cursor = value;
    for (pos, key) in path.iter().enumerate() {
        let Some(object) = cursor.as_object_mut() else {
            return;
        };
        if pos + 1 == path.len() {
            if let Some(slot) = object.get_mut(*key) {
                *slot = Value::String(model.to_string());
            }
            return;
        }
        match object.get_mut(*key) {
            Some(next) => cursor = next,
            None => return,
        }
    }
}

/// Patches one serialized SSE payload. Non-JSON payloads (`[DONE]`)
/// pass through untouched.
pub fn rewrite_frame_model(data: &str, model: &str) -> String {
    let Ok(mut value) = serde_json::from_str::<Value>(data) else {
        return data.to_string();
    };
    rewrite_model_fields(&mut value, model);
    serde_json::to_string(&value).unwrap_or_else(|_| data.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rewrites_top_level_and_nested_paths() {
        let mut value = json!({
            "model": "gemini-2.5-pro",
            "modelVersion": "gemini-2.5-pro-001",
            "response": {"modelVersion": "gemini-2.5-pro-001"},
            "message": {"model": "claude-sonnet-4"},
        });
        rewrite_model_fields(&mut value, "gemini-2.5-pro(8192)");
        assert_eq!(value["model"], "gemini-2.5-pro(8192)");
        assert_eq!(value["modelVersion"], "gemini-2.5-pro(8192)");
        assert_eq!(value["response"]["modelVersion"], "gemini-2.5-pro(8192)");
        assert_eq!(value["message"]["model"], "gemini-2.5-pro(8192)");
    }

    #[test]
    fn leaves_absent_paths_alone() {
        let mut value = json!({"choices": []});
        rewrite_model_fields(&mut value, "m");
        assert_eq!(value, json!({"choices": []}));
    }

    #[test]
    fn done_marker_passes_through() {
        assert_eq!(rewrite_frame_model("[DONE]", "m"), "[DONE]");
    }
}
