//! The closed set of values an annotation can hold

use super::{json_kind, Codec, DecodeError, DecodeIssue, TYPE_KEY};
use crate::annotations::ErrorEnvelope;
use crate::title::PageTitle;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Any value that can be stored as an annotation or an error parameter.
///
/// Non-finite floats have no JSON form and encode as `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<CodecValue>),
    Map(BTreeMap<String, CodecValue>),
    Title(PageTitle),
    Error(Box<ErrorEnvelope>),
}

impl CodecValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CodecValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CodecValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[CodecValue]> {
        match self {
            CodecValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, CodecValue>> {
        match self {
            CodecValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_title(&self) -> Option<&PageTitle> {
        match self {
            CodecValue::Title(title) => Some(title),
            _ => None,
        }
    }

    /// Plain-text form used when substituting message parameters.
    pub fn to_display_text(&self) -> String {
        match self {
            CodecValue::Null => String::new(),
            CodecValue::Bool(b) => b.to_string(),
            CodecValue::Int(i) => i.to_string(),
            CodecValue::Float(f) => f.to_string(),
            CodecValue::String(s) => s.clone(),
            CodecValue::List(items) => items
                .iter()
                .map(CodecValue::to_display_text)
                .collect::<Vec<_>>()
                .join(", "),
            CodecValue::Map(entries) => entries
                .iter()
                .map(|(k, v)| format!("{k}: {}", v.to_display_text()))
                .collect::<Vec<_>>()
                .join(", "),
            CodecValue::Title(title) => title.text().to_string(),
            CodecValue::Error(envelope) => envelope.key().to_string(),
        }
    }

    pub(super) fn to_json(&self, codec: &Codec) -> Value {
        match self {
            CodecValue::Null => Value::Null,
            CodecValue::Bool(b) => Value::Bool(*b),
            CodecValue::Int(i) => Value::from(*i),
            CodecValue::Float(f) => Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CodecValue::String(s) => Value::String(s.clone()),
            CodecValue::List(items) => {
                Value::Array(items.iter().map(|item| item.to_json(codec)).collect())
            }
            CodecValue::Map(entries) => {
                let fields: Map<String, Value> = entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json(codec)))
                    .collect();
                if entries.contains_key(TYPE_KEY) {
                    let mut wrapper = Map::new();
                    wrapper.insert(TYPE_KEY.to_string(), Value::from("map"));
                    wrapper.insert("value".to_string(), Value::Object(fields));
                    Value::Object(wrapper)
                } else {
                    Value::Object(fields)
                }
            }
            CodecValue::Title(title) => codec.encode_hinted(title),
            CodecValue::Error(envelope) => codec.encode_hinted(envelope.as_ref()),
        }
    }

    /// Decode `tree`, appending skipped nested elements to `issues`.
    ///
    /// Issue locations are dotted paths from `tree`, e.g. `2.name.0`.
    pub(super) fn from_json(
        tree: &Value,
        codec: &Codec,
        issues: &mut Vec<DecodeIssue>,
    ) -> Result<Self, DecodeError> {
        match tree {
            Value::Null => Ok(CodecValue::Null),
            Value::Bool(b) => Ok(CodecValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(CodecValue::Int(i)),
                None => n
                    .as_f64()
                    .map(CodecValue::Float)
                    .ok_or(DecodeError::UnexpectedShape {
                        expected: "finite number",
                        found: "number",
                    }),
            },
            Value::String(s) => Ok(CodecValue::String(s.clone())),
            Value::Array(_) => {
                let mut nested = Vec::new();
                let mut index = 0;
                let decoded = codec.decode_list_with(tree, |item| {
                    let mut inner = Vec::new();
                    let result = Self::from_json(item, codec, &mut inner);
                    nested.extend(prefixed(&index.to_string(), inner));
                    index += 1;
                    result
                })?;
                issues.extend(decoded.issues);
                issues.extend(nested);
                Ok(CodecValue::List(decoded.value))
            }
            Value::Object(fields) => match fields.get(TYPE_KEY) {
                None => Ok(decode_plain_map(fields, codec, issues)),
                Some(Value::String(hint)) => match hint.as_str() {
                    "map" => match fields.get("value") {
                        Some(Value::Object(inner)) => {
                            let mut nested = Vec::new();
                            let value = decode_plain_map(inner, codec, &mut nested);
                            issues.extend(prefixed("value", nested));
                            Ok(value)
                        }
                        Some(other) => Err(DecodeError::UnexpectedShape {
                            expected: "object",
                            found: json_kind(other),
                        }),
                        None => Err(DecodeError::MissingField("value")),
                    },
                    "title" => codec.decode::<PageTitle>(tree).map(CodecValue::Title),
                    "error" => codec
                        .decode::<ErrorEnvelope>(tree)
                        .map(|envelope| CodecValue::Error(Box::new(envelope))),
                    other => Err(DecodeError::UnknownType(other.to_string())),
                },
                Some(_) => Err(DecodeError::InvalidField {
                    field: TYPE_KEY,
                    reason: "type hint must be a string".to_string(),
                }),
            },
        }
    }
}

fn decode_plain_map(
    fields: &Map<String, Value>,
    codec: &Codec,
    issues: &mut Vec<DecodeIssue>,
) -> CodecValue {
    let mut nested = Vec::new();
    let decoded = codec.decode_map_with(fields, |key, item| {
        let mut inner = Vec::new();
        let result = CodecValue::from_json(item, codec, &mut inner);
        nested.extend(prefixed(key, inner));
        result
    });
    issues.extend(decoded.issues);
    issues.extend(nested);
    CodecValue::Map(decoded.value)
}

fn prefixed(prefix: &str, issues: Vec<DecodeIssue>) -> impl Iterator<Item = DecodeIssue> + '_ {
    issues.into_iter().map(move |issue| DecodeIssue {
        location: format!("{prefix}.{}", issue.location),
        error: issue.error,
    })
}

impl From<&str> for CodecValue {
    fn from(value: &str) -> Self {
        CodecValue::String(value.to_string())
    }
}

impl From<String> for CodecValue {
    fn from(value: String) -> Self {
        CodecValue::String(value)
    }
}

impl From<i64> for CodecValue {
    fn from(value: i64) -> Self {
        CodecValue::Int(value)
    }
}

impl From<bool> for CodecValue {
    fn from(value: bool) -> Self {
        CodecValue::Bool(value)
    }
}

impl From<PageTitle> for CodecValue {
    fn from(value: PageTitle) -> Self {
        CodecValue::Title(value)
    }
}

impl From<ErrorEnvelope> for CodecValue {
    fn from(value: ErrorEnvelope) -> Self {
        CodecValue::Error(Box::new(value))
    }
}

impl From<Vec<CodecValue>> for CodecValue {
    fn from(value: Vec<CodecValue>) -> Self {
        CodecValue::List(value)
    }
}
