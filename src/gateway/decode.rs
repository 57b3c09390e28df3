use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ApiResponse;

/// Best-effort JSON decode. `None` stands for "no usable body": empty, not JSON, or
/// not the expected shape.
pub fn read_json_safe<T: DeserializeOwned>(response: &ApiResponse) -> Option<T> {
    if response.body().iter().all(|b| b.is_ascii_whitespace()) {
        return None;
    }
    serde_json::from_slice(response.body()).ok()
}

/// Human-readable failure text: the body's `error` field, then `message`, then the raw
/// body when it is not JSON, then `fallback`.
pub fn read_error_message(response: &ApiResponse, fallback: &str) -> String {
    match read_json_safe::<Value>(response) {
        Some(v) => {
            for field in ["error", "message"] {
                if let Some(s) = v.get(field).and_then(|s| s.as_str()) {
                    if !s.is_empty() {
                        return s.to_string();
                    }
                }
            }
            fallback.to_string()
        }
        None => {
            let text = response.text();
            let text = text.trim();
            if text.is_empty() { fallback.to_string() } else { text.to_string() }
        }
    }
}
