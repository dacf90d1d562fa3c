//! Error envelopes and message rendering
//!
//!     An [`ErrorEnvelope`] is the record a conversion pass leaves on a node
//!     when it cannot finish that node cleanly. It is a value object: equality
//!     compares key, fallback message and every parameter by value, and
//!     cloning deep-copies parameters through the codec.

use crate::codec::{optional_str, required_str, Codec, CodecValue, DecodeError, JsonCodecable};
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("error envelope key must not be empty")]
    EmptyKey,
}

/// A localizable description of a node-local conversion problem.
#[derive(Debug, PartialEq)]
pub struct ErrorEnvelope {
    key: String,
    message: Option<String>,
    params: Vec<CodecValue>,
}

impl ErrorEnvelope {
    pub fn new(key: impl Into<String>) -> Result<Self, EnvelopeError> {
        let key = key.into();
        if key.is_empty() {
            return Err(EnvelopeError::EmptyKey);
        }
        Ok(Self {
            key,
            message: None,
            params: Vec::new(),
        })
    }

    /// Envelope for a key known to be non-empty.
    pub(crate) fn builtin(key: &'static str) -> Self {
        debug_assert!(!key.is_empty());
        Self {
            key: key.to_string(),
            message: None,
            params: Vec::new(),
        }
    }

    /// Plain-text fallback used when the key has no localization.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_param(mut self, param: impl Into<CodecValue>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn with_params(mut self, params: impl IntoIterator<Item = CodecValue>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn params(&self) -> &[CodecValue] {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Vec<CodecValue> {
        &mut self.params
    }

    /// Render the envelope for display.
    ///
    /// The localized text for `key` wins, then the fallback message, then
    /// the bare key. `$1`..`$n` are replaced by the display text of the
    /// matching parameter; placeholders without a parameter are left as is.
    pub fn render(&self, localizer: &dyn Localizer) -> String {
        let template = localizer
            .lookup(&self.key)
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| self.key.clone());
        substitute_params(&template, &self.params)
    }
}

impl Clone for ErrorEnvelope {
    fn clone(&self) -> Self {
        let codec = Codec::new();
        let params = self
            .params
            .iter()
            .map(|param| codec.deep_copy(param).unwrap_or_else(|_| param.clone()))
            .collect();
        Self {
            key: self.key.clone(),
            message: self.message.clone(),
            params,
        }
    }
}

impl JsonCodecable for ErrorEnvelope {
    const TYPE_HINT: &'static str = "error";

    fn encode_fields(&self, codec: &Codec) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("key".to_string(), Value::from(self.key.clone()));
        if let Some(message) = &self.message {
            fields.insert("message".to_string(), Value::from(message.clone()));
        }
        if !self.params.is_empty() {
            let params = self.params.iter().map(|p| codec.encode_value(p)).collect();
            fields.insert("params".to_string(), Value::Array(params));
        }
        fields
    }

    fn decode_fields(
        fields: &Map<String, Value>,
        _version: u32,
        codec: &Codec,
    ) -> Result<Self, DecodeError> {
        let key = required_str(fields, "key")?;
        let mut envelope = ErrorEnvelope::new(key).map_err(|e| DecodeError::InvalidField {
            field: "key",
            reason: e.to_string(),
        })?;
        envelope.message = optional_str(fields, "message")?.map(str::to_string);
        if let Some(params) = fields.get("params") {
            let decoded = codec.decode_list_with(params, |p| codec.decode_value(p))?;
            envelope.params = decoded.value;
        }
        Ok(envelope)
    }
}

fn substitute_params(template: &str, params: &[CodecValue]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        let param = after[..digits]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| params.get(index));
        match param {
            Some(value) => {
                out.push_str(&value.to_display_text());
                rest = &after[digits..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Opaque message lookup.
pub trait Localizer: Send + Sync {
    fn lookup(&self, key: &str) -> Option<String>;
}

/// A fixed key → text table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageCatalog {
    messages: HashMap<String, String>,
}

impl MessageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, text: impl Into<String>) {
        self.messages.insert(key.into(), text.into());
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MessageCatalog {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            messages: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Localizer for MessageCatalog {
    fn lookup(&self, key: &str) -> Option<String> {
        self.messages.get(key).cloned()
    }
}
