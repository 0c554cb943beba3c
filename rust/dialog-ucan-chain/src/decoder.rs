//! Wire format detection and decoding.
//!
//! Three strategies are tried in order: content-addressed [`archive`]s,
//! raw DAG-CBOR [`block`]s and [`compact`] (JWT style) tokens. Each one
//! reports `Ok(None)` when the input is not in its format at all, so that
//! detection can move on, and an error once it has recognized its container
//! but cannot make sense of what is inside.

pub mod archive;
pub mod block;
pub mod compact;

pub use archive::Archive;

use crate::{
    claims::Claims,
    config::InspectorConfig,
    error::DecodeError,
    signature::Seal,
    value::ValueMap,
};
use std::{fmt, str::FromStr};
use tracing::{debug, trace};

/// Wire encodings, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// CAR archive holding a delegation and its proofs.
    Archive,
    /// A single DAG-CBOR block.
    Block,
    /// Three base64url segments separated by dots.
    Compact,
}

impl Format {
    /// Every format, in detection order.
    pub const ALL: [Format; 3] = [Format::Archive, Format::Block, Format::Compact];
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Archive => "archive",
            Format::Block => "block",
            Format::Compact => "compact",
        })
    }
}

impl FromStr for Format {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "archive" | "car" => Ok(Format::Archive),
            "block" | "cbor" | "dag-cbor" => Ok(Format::Block),
            "compact" | "jwt" => Ok(Format::Compact),
            _ => Err(DecodeError::UnrecognizedFormat),
        }
    }
}

/// A token decoded from a single block or a compact string.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Encoding it was read from.
    pub format: Format,
    /// Canonical claims.
    pub claims: Claims,
    /// Header fields, if the encoding has a header.
    pub header: ValueMap,
    /// Signature material.
    pub seal: Seal,
    /// The exact input the token was decoded from.
    pub source: Vec<u8>,
}

/// Result of a successful decode.
#[derive(Debug, Clone)]
pub enum Decoded {
    /// A native delegation with the block store it came with.
    Archive(Archive),
    /// Canonical claims without a block store.
    Token(Token),
}

impl Decoded {
    /// Encoding the input was read from.
    #[must_use]
    pub fn format(&self) -> Format {
        match self {
            Decoded::Archive(_) => Format::Archive,
            Decoded::Token(token) => token.format,
        }
    }
}

/// Decodes tokens according to an [`InspectorConfig`].
#[derive(Debug, Clone)]
pub struct Decoder {
    max_input_bytes: usize,
    verify_block_integrity: bool,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(&InspectorConfig::default())
    }
}

impl Decoder {
    /// Creates a decoder with the limits from `config`.
    #[must_use]
    pub fn new(config: &InspectorConfig) -> Self {
        Self {
            max_input_bytes: config.max_input_bytes,
            verify_block_integrity: config.verify_block_integrity,
        }
    }

    /// Detect the encoding of `bytes` and decode it.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::InputTooLarge`] above the size limit.
    /// - [`DecodeError::NoRecognizableClaims`] when some strategy recognized
    ///   its container but found no issuer or audience, and none succeeded.
    /// - [`DecodeError::UnrecognizedFormat`] otherwise.
    pub fn decode(&self, bytes: &[u8]) -> Result<Decoded, DecodeError> {
        self.check_size(bytes)?;

        let mut recognized = None;
        for format in Format::ALL {
            match self.attempt(format, bytes) {
                Ok(Some(decoded)) => {
                    debug!(%format, "decoded token");
                    return Ok(decoded);
                }
                Ok(None) => trace!(%format, "not this format"),
                Err(DecodeError::NoRecognizableClaims { format }) => {
                    debug!(%format, "container recognized without claims");
                    recognized.get_or_insert(format);
                }
                Err(error) => debug!(%format, %error, "strategy failed"),
            }
        }

        Err(recognized.map_or(DecodeError::UnrecognizedFormat, |format| {
            DecodeError::NoRecognizableClaims { format }
        }))
    }

    /// Decode `bytes` as `format`, skipping detection.
    ///
    /// # Errors
    ///
    /// Any error of the chosen strategy is returned as is;
    /// [`DecodeError::UnrecognizedFormat`] if the input is not in that format.
    pub fn decode_as(&self, format: Format, bytes: &[u8]) -> Result<Decoded, DecodeError> {
        self.check_size(bytes)?;
        self.attempt(format, bytes)?
            .ok_or(DecodeError::UnrecognizedFormat)
    }

    fn check_size(&self, bytes: &[u8]) -> Result<(), DecodeError> {
        if bytes.len() > self.max_input_bytes {
            return Err(DecodeError::InputTooLarge {
                size: bytes.len(),
                max: self.max_input_bytes,
            });
        }
        Ok(())
    }

    fn attempt(&self, format: Format, bytes: &[u8]) -> Result<Option<Decoded>, DecodeError> {
        Ok(match format {
            Format::Archive => {
                archive::decode(bytes, self.verify_block_integrity)?.map(Decoded::Archive)
            }
            Format::Block => block::decode(bytes)?.map(Decoded::Token),
            Format::Compact => compact::decode(bytes)?.map(Decoded::Token),
        })
    }
}
