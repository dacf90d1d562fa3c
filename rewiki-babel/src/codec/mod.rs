//! JSON codec for annotation data
//!
//!     Everything that travels inside a page bundle (structural hints, semantic
//!     metadata, error envelopes and their parameters) is converted to and from
//!     a plain `serde_json::Value` tree by a [`Codec`].
//!
//! Type hints
//!
//!     Compound values written into a position whose type is not known at the
//!     decoding site carry a `_type_` discriminator (`"title"`, `"error"`,
//!     `"map"`). Values written into a typed position (e.g. the entries of a
//!     `data-mw.errors` array) omit it. An object whose `_type_` is not one of
//!     the closed set fails with [`DecodeError::UnknownType`] instead of being
//!     misread as a plain map; plain maps that happen to contain a `_type_` key
//!     are escaped as `{"_type_": "map", "value": {...}}`.
//!
//! Versions
//!
//!     A [`JsonCodecable`] type may bump its `VERSION`; encoders then add a
//!     `_v_` field and decoders refuse versions newer than they understand.
//!
//! Collections
//!
//!     Arrays and maps are decoded element by element. A bad element is
//!     skipped, logged and returned as a [`DecodeIssue`]; the rest of the
//!     collection survives.

mod value;

pub use value::CodecValue;

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Discriminator key for hinted objects.
pub const TYPE_KEY: &str = "_type_";

/// Shape version key, written only for versions above 1.
pub const VERSION_KEY: &str = "_v_";

/// Errors raised while turning a JSON tree back into a domain value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("expected {expected}, found {found}")]
    UnexpectedShape {
        expected: &'static str,
        found: &'static str,
    },
    #[error("unknown type hint '{0}'")]
    UnknownType(String),
    #[error("expected type '{expected}', found '{found}'")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
    #[error("'{type_hint}' version {version} is not supported (newest known is {supported})")]
    UnsupportedVersion {
        type_hint: &'static str,
        version: u64,
        supported: u32,
    },
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("malformed JSON: {0}")]
    Json(String),
}

/// A domain type with a JSON object representation.
pub trait JsonCodecable: Sized {
    /// Discriminator written under [`TYPE_KEY`] in hinted positions.
    const TYPE_HINT: &'static str;
    /// Shape version; bump when the field layout changes.
    const VERSION: u32 = 1;

    fn encode_fields(&self, codec: &Codec) -> Map<String, Value>;

    fn decode_fields(
        fields: &Map<String, Value>,
        version: u32,
        codec: &Codec,
    ) -> Result<Self, DecodeError>;
}

/// A value decoded from a collection, plus the elements that were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub issues: Vec<DecodeIssue>,
}

/// One skipped element of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeIssue {
    /// Index or key of the element inside its collection.
    pub location: String,
    pub error: DecodeError,
}

impl fmt::Display for DecodeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.error)
    }
}

/// Converts codecable values to and from JSON trees.
///
/// Nested values are always handled by the same instance, so container types
/// never need to know about the concrete types they hold.
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec;

impl Codec {
    pub fn new() -> Self {
        Codec
    }

    /// Encode a value for a position whose type the decoder already knows.
    pub fn encode<T: JsonCodecable>(&self, value: &T) -> Value {
        let mut fields = value.encode_fields(self);
        if T::VERSION > 1 {
            fields.insert(VERSION_KEY.to_string(), Value::from(T::VERSION));
        }
        Value::Object(fields)
    }

    /// Encode a value for a heterogeneous position, adding its type hint.
    pub fn encode_hinted<T: JsonCodecable>(&self, value: &T) -> Value {
        let mut tree = self.encode(value);
        if let Value::Object(fields) = &mut tree {
            fields.insert(TYPE_KEY.to_string(), Value::from(T::TYPE_HINT));
        }
        tree
    }

    /// Decode a value of a statically known type.
    ///
    /// A `_type_` hint is optional, but when present it must name `T`.
    pub fn decode<T: JsonCodecable>(&self, tree: &Value) -> Result<T, DecodeError> {
        let fields = tree.as_object().ok_or(DecodeError::UnexpectedShape {
            expected: "object",
            found: json_kind(tree),
        })?;
        if let Some(hint) = fields.get(TYPE_KEY) {
            let hint = hint.as_str().ok_or_else(|| DecodeError::InvalidField {
                field: TYPE_KEY,
                reason: "type hint must be a string".to_string(),
            })?;
            if hint != T::TYPE_HINT {
                return Err(DecodeError::TypeMismatch {
                    expected: T::TYPE_HINT,
                    found: hint.to_string(),
                });
            }
        }
        let version = read_version::<T>(fields)?;
        T::decode_fields(fields, version, self)
    }

    pub fn encode_value(&self, value: &CodecValue) -> Value {
        value.to_json(self)
    }

    /// Decode an untyped value; skipped nested elements are only logged.
    pub fn decode_value(&self, tree: &Value) -> Result<CodecValue, DecodeError> {
        self.decode_value_reporting(tree).map(|decoded| decoded.value)
    }

    /// Decode an untyped value and return every nested element that was
    /// skipped, located by its dotted path.
    pub fn decode_value_reporting(&self, tree: &Value) -> Result<Decoded<CodecValue>, DecodeError> {
        let mut issues = Vec::new();
        let value = CodecValue::from_json(tree, self, &mut issues)?;
        Ok(Decoded { value, issues })
    }

    /// Copy a value by encoding and decoding it.
    pub fn deep_copy(&self, value: &CodecValue) -> Result<CodecValue, DecodeError> {
        self.decode_value(&self.encode_value(value))
    }

    /// Decode every element of a JSON array with `decode_one`.
    ///
    /// Fails only when `tree` is not an array; failing elements are skipped
    /// and reported.
    pub fn decode_list_with<T>(
        &self,
        tree: &Value,
        mut decode_one: impl FnMut(&Value) -> Result<T, DecodeError>,
    ) -> Result<Decoded<Vec<T>>, DecodeError> {
        let items = tree.as_array().ok_or(DecodeError::UnexpectedShape {
            expected: "array",
            found: json_kind(tree),
        })?;
        let mut value = Vec::with_capacity(items.len());
        let mut issues = Vec::new();
        for (index, item) in items.iter().enumerate() {
            match decode_one(item) {
                Ok(decoded) => value.push(decoded),
                Err(error) => {
                    tracing::warn!(index, %error, "skipping undecodable list element");
                    issues.push(DecodeIssue {
                        location: index.to_string(),
                        error,
                    });
                }
            }
        }
        Ok(Decoded { value, issues })
    }

    /// Decode a JSON array of typed values.
    pub fn decode_list<T: JsonCodecable>(
        &self,
        tree: &Value,
    ) -> Result<Decoded<Vec<T>>, DecodeError> {
        self.decode_list_with(tree, |item| self.decode(item))
    }

    /// Decode every entry of a JSON object with `decode_one`, keeping key order.
    pub fn decode_map_with<T>(
        &self,
        fields: &Map<String, Value>,
        mut decode_one: impl FnMut(&str, &Value) -> Result<T, DecodeError>,
    ) -> Decoded<BTreeMap<String, T>> {
        let mut value = BTreeMap::new();
        let mut issues = Vec::new();
        for (key, item) in fields {
            match decode_one(key, item) {
                Ok(decoded) => {
                    value.insert(key.clone(), decoded);
                }
                Err(error) => {
                    tracing::warn!(key = %key, %error, "skipping undecodable map entry");
                    issues.push(DecodeIssue {
                        location: key.clone(),
                        error,
                    });
                }
            }
        }
        Decoded { value, issues }
    }

    /// Parse JSON text into a tree.
    pub fn parse_str(&self, json: &str) -> Result<Value, DecodeError> {
        serde_json::from_str(json).map_err(|e| DecodeError::Json(e.to_string()))
    }
}

fn read_version<T: JsonCodecable>(fields: &Map<String, Value>) -> Result<u32, DecodeError> {
    let Some(raw) = fields.get(VERSION_KEY) else {
        return Ok(1);
    };
    let version = raw.as_u64().ok_or_else(|| DecodeError::InvalidField {
        field: VERSION_KEY,
        reason: "version must be a positive integer".to_string(),
    })?;
    if version == 0 || version > u64::from(T::VERSION) {
        return Err(DecodeError::UnsupportedVersion {
            type_hint: T::TYPE_HINT,
            version,
            supported: T::VERSION,
        });
    }
    Ok(version as u32)
}

/// Short name of a JSON node kind, for error messages.
pub fn json_kind(tree: &Value) -> &'static str {
    match tree {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Read a required string field.
pub fn required_str<'a>(
    fields: &'a Map<String, Value>,
    name: &'static str,
) -> Result<&'a str, DecodeError> {
    match fields.get(name) {
        None => Err(DecodeError::MissingField(name)),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(DecodeError::InvalidField {
            field: name,
            reason: format!("expected string, found {}", json_kind(other)),
        }),
    }
}

/// Read an optional string field; `null` counts as absent.
pub fn optional_str<'a>(
    fields: &'a Map<String, Value>,
    name: &'static str,
) -> Result<Option<&'a str>, DecodeError> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(DecodeError::InvalidField {
            field: name,
            reason: format!("expected string, found {}", json_kind(other)),
        }),
    }
}
