//! Page title normalization
//!
//! Titles arrive from three places: request paths, link targets inside
//! wikitext and `href` attributes of edited HTML. All of them go through
//! [`PageTitle::new`] so that `"main_page"`, `" Main  page "` and
//! `"Main Page"` resolve to the same stored page.

use crate::codec::{required_str, Codec, DecodeError, JsonCodecable};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Longest title accepted, in bytes of the normalized form.
pub const MAX_TITLE_BYTES: usize = 255;

/// Characters that can never appear in a title.
const ILLEGAL_CHARS: &[char] = &['<', '>', '[', ']', '{', '}', '|', '#'];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TitleError {
    #[error("title is empty")]
    Empty,
    #[error("title contains illegal character '{0}'")]
    IllegalChar(char),
    #[error("title exceeds {MAX_TITLE_BYTES} bytes")]
    TooLong,
}

/// A normalized page title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageTitle {
    text: String,
}

impl PageTitle {
    /// Normalize a raw title.
    ///
    /// Underscores become spaces, runs of whitespace collapse to a single
    /// space, the result is trimmed and its first character upper-cased.
    pub fn new(raw: &str) -> Result<Self, TitleError> {
        if let Some(c) = raw.chars().find(|c| ILLEGAL_CHARS.contains(c) || c.is_control()) {
            return Err(TitleError::IllegalChar(c));
        }

        let spaced = raw.replace('_', " ");
        let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return Err(TitleError::Empty);
        }

        let mut chars = collapsed.chars();
        let text = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => return Err(TitleError::Empty),
        };
        if text.len() > MAX_TITLE_BYTES {
            return Err(TitleError::TooLong);
        }
        Ok(Self { text })
    }

    /// Human-readable form, e.g. `Main Page`.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Storage key form, e.g. `Main_Page`.
    pub fn db_key(&self) -> String {
        self.text.replace(' ', "_")
    }

    /// Relative link target used in `href` attributes, e.g. `./Main_Page`.
    pub fn href(&self) -> String {
        format!("./{}", percent_encode(&self.db_key()))
    }

    /// Inverse of [`PageTitle::href`].
    pub fn from_href(href: &str) -> Result<Self, TitleError> {
        let path = href.strip_prefix("./").unwrap_or(href);
        Self::new(&percent_decode(path))
    }
}

impl fmt::Display for PageTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl JsonCodecable for PageTitle {
    const TYPE_HINT: &'static str = "title";

    fn encode_fields(&self, _codec: &Codec) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("text".to_string(), Value::from(self.text.clone()));
        fields
    }

    fn decode_fields(
        fields: &Map<String, Value>,
        _version: u32,
        _codec: &Codec,
    ) -> Result<Self, DecodeError> {
        let text = required_str(fields, "text")?;
        PageTitle::new(text).map_err(|e| DecodeError::InvalidField {
            field: "text",
            reason: e.to_string(),
        })
    }
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'.'
            | b'_'
            | b'~'
            | b':'
            | b'/'
            | b'!'
            | b'$'
            | b'('
            | b')'
            | b'*'
            | b','
            | b';'
            | b'@' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
            if let Ok(value) = u8::from_str_radix(hex, 16) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
