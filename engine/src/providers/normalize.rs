//! Response normalization: turns a provider's reply payload into one
//! trimmed string.
//!
//! Providers answer either with a plain string or with a list of typed
//! content fragments (`[{"type": "text", "text": "..."}]`). Both shapes are
//! captured by [`RawReply`]; anything else becomes [`RawReply::Unsupported`]
//! and normalizes to `None`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One typed content fragment. Only the `text` field matters here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFragment {
    #[serde(default)]
    pub text: Option<String>,
}

impl ContentFragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

/// Closed set of reply shapes the normalizer understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawReply {
    Text(String),
    Fragments(Vec<ContentFragment>),
    Unsupported,
}

impl RawReply {
    /// Classify an arbitrary JSON value.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text.clone()),
            Value::Array(items) => Self::Fragments(
                items
                    .iter()
                    .map(|item| ContentFragment {
                        text: item.get("text").and_then(Value::as_str).map(str::to_string),
                    })
                    .collect(),
            ),
            _ => Self::Unsupported,
        }
    }
}

/// Collapse a reply to trimmed text, or `None` when nothing usable is left.
pub fn normalize(raw: &RawReply) -> Option<String> {
    let joined = match raw {
        RawReply::Text(text) => text.clone(),
        RawReply::Fragments(fragments) => fragments
            .iter()
            .map(|f| f.text.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("\n"),
        RawReply::Unsupported => return None,
    };

    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Shorthand for `normalize(&RawReply::from_value(value))`.
pub fn normalize_value(value: &Value) -> Option<String> {
    normalize(&RawReply::from_value(value))
}
