//! Error types.
//!
//! Normalizing text, decoding and resolving chains can fail. Validation
//! never does; its findings are reported as
//! [`ValidationIssue`](crate::ValidationIssue)s. For callers that answer
//! over HTTP, every [`InspectError`] maps to an [`ErrorCode`] with a status.

use crate::{decoder::Format, normalize::NormalizeError};
use serde::Serialize;
use thiserror::Error;

/// Failure to turn input bytes into a token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// No decoding strategy accepted the input.
    #[error("Input is not a recognized token encoding")]
    UnrecognizedFormat,

    /// The container was recognized but carries neither an issuer nor an
    /// audience.
    #[error("No issuer or audience found in {format} token")]
    NoRecognizableClaims {
        /// The format whose container was recognized.
        format: Format,
    },

    /// A segment of the input could not be decoded.
    #[error("Malformed {segment}: {reason}")]
    MalformedSegment {
        /// Which segment failed (`header`, `payload`, `signature`, `archive`, ...).
        segment: &'static str,
        /// What went wrong.
        reason: String,
    },

    /// Input exceeds the configured size limit.
    #[error("Input of {size} bytes exceeds the limit of {max} bytes")]
    InputTooLarge {
        /// Input length in bytes.
        size: usize,
        /// Configured limit.
        max: usize,
    },
}

impl DecodeError {
    /// Convenience constructor for [`DecodeError::MalformedSegment`].
    pub fn malformed(segment: &'static str, reason: impl ToString) -> Self {
        DecodeError::MalformedSegment {
            segment,
            reason: reason.to_string(),
        }
    }
}

/// Failure to materialize a proof chain.
///
/// Proofs that cannot be found are not errors; they are left out of the
/// chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A proof sits deeper than the configured depth.
    #[error("Proof chain depth {depth} exceeds the limit of {max}")]
    ChainTooDeep {
        /// Level of the offending proof.
        depth: usize,
        /// Configured limit.
        max: usize,
    },

    /// The chain holds more links than allowed.
    #[error("Proof chain of {links} links exceeds the limit of {max}")]
    ChainTooLarge {
        /// Number of links reached.
        links: usize,
        /// Configured limit.
        max: usize,
    },
}

/// Any failure of an [`Inspector`](crate::Inspector) operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InspectError {
    /// Decoding failed.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Token text could not be turned into bytes.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// Error codes for inspection failures.
///
/// Each code maps to an HTTP status code via [`ErrorCode::status_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // 400 Bad Request
    /// Token text is not in the stated encoding
    InvalidEncoding,
    /// No decoder accepted the input
    UnrecognizedFormat,
    /// Container recognized, claims missing
    NoRecognizableClaims,
    /// A segment failed to decode
    MalformedSegment,

    // 413 Payload Too Large
    /// Input exceeds the size limit
    InputTooLarge,

    // 422 Unprocessable Entity
    /// Proof chain exceeds the depth limit
    ChainTooDeep,
    /// Proof chain exceeds the link limit
    ChainTooLarge,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCode::InvalidEncoding
            | ErrorCode::UnrecognizedFormat
            | ErrorCode::NoRecognizableClaims
            | ErrorCode::MalformedSegment => 400,

            ErrorCode::InputTooLarge => 413,

            ErrorCode::ChainTooDeep | ErrorCode::ChainTooLarge => 422,
        }
    }
}

impl From<&InspectError> for ErrorCode {
    fn from(error: &InspectError) -> Self {
        match error {
            InspectError::Decode(DecodeError::UnrecognizedFormat) => ErrorCode::UnrecognizedFormat,
            InspectError::Decode(DecodeError::NoRecognizableClaims { .. }) => {
                ErrorCode::NoRecognizableClaims
            }
            InspectError::Decode(DecodeError::MalformedSegment { .. }) => {
                ErrorCode::MalformedSegment
            }
            InspectError::Decode(DecodeError::InputTooLarge { .. }) => ErrorCode::InputTooLarge,
            InspectError::Resolve(ResolveError::ChainTooDeep { .. }) => ErrorCode::ChainTooDeep,
            InspectError::Resolve(ResolveError::ChainTooLarge { .. }) => ErrorCode::ChainTooLarge,
            InspectError::Normalize(_) => ErrorCode::InvalidEncoding,
        }
    }
}

/// Error body for service responses.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceError {
    /// The error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
}

impl ServiceError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        self.code.status_code()
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ServiceError {}

impl From<InspectError> for ServiceError {
    fn from(error: InspectError) -> Self {
        ServiceError {
            code: ErrorCode::from(&error),
            message: error.to_string(),
        }
    }
}
