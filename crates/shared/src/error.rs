use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error body returned by the fest API on non-2xx responses.
///
/// `detail` is usually a string; request validation failures carry a list of
/// `{loc, msg, type}` objects instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ApiErrorBody {
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Array(items) => {
                let messages: Vec<String> = items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.clone()),
                        Value::Object(map) => map
                            .get("msg")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        _ => None,
                    })
                    .collect();
                if messages.is_empty() {
                    None
                } else {
                    Some(messages.join("; "))
                }
            }
            _ => None,
        }
    }

    /// Parses a raw response body; anything that is not a JSON error object
    /// yields `None`.
    pub fn parse_message(raw: &[u8]) -> Option<String> {
        serde_json::from_slice::<ApiErrorBody>(raw)
            .ok()
            .and_then(|body| body.message())
    }
}
