//! Text transport normalization.
//!
//! Tokens often travel as text: a compact token is text already, while
//! archives and blocks are sent base64 or hex encoded. [`normalize`] turns
//! such text back into the bytes the decoder expects.

use base64::prelude::*;
use std::str::FromStr;
use thiserror::Error;
use tracing::trace;

/// How token text is encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    /// Standard base64 when the text is valid base64, hex when it is `0x`
    /// prefixed or otherwise valid hex, else the text itself.
    #[default]
    Auto,
    /// Standard base64.
    Base64,
    /// Hex, with or without a `0x` prefix.
    Hex,
    /// The text itself.
    Raw,
}

impl FromStr for TextEncoding {
    type Err = NormalizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(TextEncoding::Auto),
            "base64" => Ok(TextEncoding::Base64),
            "hex" => Ok(TextEncoding::Hex),
            "raw" => Ok(TextEncoding::Raw),
            other => Err(NormalizeError::UnsupportedEncoding(other.to_string())),
        }
    }
}

/// Failure to normalize token text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// Nothing but whitespace.
    #[error("Token cannot be empty")]
    Empty,

    /// Not valid base64.
    #[error("Invalid base64 token: {0}")]
    InvalidBase64(String),

    /// Not valid hex.
    #[error("Invalid hex token: {0}")]
    InvalidHex(String),

    /// Unknown encoding name.
    #[error("Unsupported format: {0}. Supported formats: auto, base64, hex, raw")]
    UnsupportedEncoding(String),
}

/// Turn token text into bytes.
///
/// Surrounding whitespace is ignored.
///
/// # Errors
///
/// [`NormalizeError::Empty`] for blank text, and a decoding error when an
/// explicit encoding does not apply.
pub fn normalize(text: &str, encoding: TextEncoding) -> Result<Vec<u8>, NormalizeError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(NormalizeError::Empty);
    }

    match encoding {
        TextEncoding::Raw => Ok(text.as_bytes().to_vec()),
        TextEncoding::Base64 => BASE64_STANDARD
            .decode(text)
            .map_err(|error| NormalizeError::InvalidBase64(error.to_string())),
        TextEncoding::Hex => hex::decode(strip_hex_prefix(text))
            .map_err(|error| NormalizeError::InvalidHex(error.to_string())),
        TextEncoding::Auto => Ok(detect(text)),
    }
}

fn detect(text: &str) -> Vec<u8> {
    if let Some(digits) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        if let Ok(bytes) = hex::decode(digits) {
            trace!("normalized hex text");
            return bytes;
        }
    }
    if is_base64(text) {
        if let Ok(bytes) = BASE64_STANDARD.decode(text) {
            trace!("normalized base64 text");
            return bytes;
        }
    }
    if let Ok(bytes) = hex::decode(text) {
        trace!("normalized hex text");
        return bytes;
    }
    text.as_bytes().to_vec()
}

fn strip_hex_prefix(text: &str) -> &str {
    text.strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text)
}

fn is_base64(text: &str) -> bool {
    text.bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
}
