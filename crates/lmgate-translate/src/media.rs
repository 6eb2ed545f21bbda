//! Image payload conversion between `data:` URLs (OpenAI shapes) and
//! inline blobs (Gemini / Claude shapes).

use lmgate_protocol::gemini::GeminiBlob;

/// Splits a `data:<mime>;base64,<data>` URL. Returns `None` for plain
/// http(s) URLs — those are forwarded as-is by the callers that can.
pub fn data_url_to_blob(url: &str) -> Option<GeminiBlob> {
    let rest = url.strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    let mime_type = header
        .strip_suffix(";base64")
        .unwrap_or(header)
        .trim()
        .to_string();
    let mime_type = if mime_type.is_empty() {
        "application/octet-stream".to_string()
    } else {
        mime_type
    };
    Some(GeminiBlob {
        mime_type,
        data: data.to_string(),
    })
}

pub fn blob_to_data_url(blob: &GeminiBlob) -> String {
    format!("data:{};base64,{}", blob.mime_type, blob.data)
}
