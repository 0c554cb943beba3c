//! Compact token decoding: `<header>.<payload>.<signature>`, each segment
//! base64url with or without padding. Header and payload are JSON objects.

use base64::{
    Engine as _,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use tracing::trace;

use super::{Format, Token};
use crate::{
    claims::Claims,
    error::DecodeError,
    signature::{Algorithm, Seal},
    value::{Value, ValueMap},
};

/// base64url that accepts segments with or without padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode `bytes` as a compact token.
///
/// # Errors
///
/// Once the input splits into three base64url segments, a segment that does
/// not decode is reported as [`DecodeError::MalformedSegment`], and a payload
/// without principals as [`DecodeError::NoRecognizableClaims`].
pub fn decode(bytes: &[u8]) -> Result<Option<Token>, DecodeError> {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return Ok(None);
    };
    let text = text.trim();

    let segments: Vec<&str> = text.split('.').collect();
    let &[header, payload, signature] = segments.as_slice() else {
        trace!(segments = segments.len(), "not a compact token");
        return Ok(None);
    };
    if header.is_empty() || payload.is_empty() || !segments.iter().all(|s| is_base64url(s)) {
        return Ok(None);
    }

    let header = object("header", header)?;
    let payload_map = object("payload", payload)?;
    let signature = URL_SAFE_LENIENT
        .decode(signature)
        .map_err(|error| DecodeError::malformed("signature", error))?;

    let claims = Claims::scan(&payload_map);
    if !claims.is_recognizable() {
        return Err(DecodeError::NoRecognizableClaims {
            format: Format::Compact,
        });
    }

    let algorithm = header
        .get("alg")
        .and_then(Value::as_str)
        .map_or(Algorithm::Unknown, Algorithm::from_jwt);
    let signed = text
        .rsplit_once('.')
        .map(|(signed, _)| signed.as_bytes().to_vec())
        .unwrap_or_default();

    Ok(Some(Token {
        format: Format::Compact,
        claims,
        header,
        seal: Seal {
            algorithm,
            signature,
            payload: signed,
        },
        source: text.as_bytes().to_vec(),
    }))
}

fn is_base64url(segment: &str) -> bool {
    segment
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'='))
}

fn object(segment: &'static str, encoded: &str) -> Result<ValueMap, DecodeError> {
    let bytes = URL_SAFE_LENIENT
        .decode(encoded)
        .map_err(|error| DecodeError::malformed(segment, error))?;
    let json: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|error| DecodeError::malformed(segment, error))?;
    match Value::from(json) {
        Value::Map(map) => Ok(map),
        _ => Err(DecodeError::malformed(segment, "expected a JSON object")),
    }
}
