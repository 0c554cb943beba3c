//! Signature metadata.
//!
//! This crate never checks signatures itself. Decoders capture what was
//! signed and by which algorithm in a [`Seal`]; the embedding service may
//! supply a [`Verifier`] whose verdict is recorded in [`SignatureInfo`].

use serde::Serialize;
use std::fmt;

/// Varsig header prefix.
const VARSIG_PREFIX: u64 = 0x34;

/// Signature algorithm as far as it can be told from the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Algorithm {
    /// Ed25519.
    #[serde(rename = "EdDSA")]
    EdDsa,
    /// ECDSA over P-256 with SHA-256.
    #[serde(rename = "ES256")]
    Es256,
    /// ECDSA over secp256k1 with SHA-256.
    #[serde(rename = "ES256K")]
    Es256k,
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    #[serde(rename = "RS256")]
    Rs256,
    /// Not recognized.
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl Algorithm {
    /// From a compact token header `alg` value.
    #[must_use]
    pub fn from_jwt(alg: &str) -> Self {
        match alg {
            "EdDSA" | "Ed25519" => Algorithm::EdDsa,
            "ES256" => Algorithm::Es256,
            "ES256K" => Algorithm::Es256k,
            "RS256" => Algorithm::Rs256,
            _ => Algorithm::Unknown,
        }
    }

    /// From the multicodec key code used inside a varsig header.
    #[must_use]
    pub const fn from_key_code(code: u64) -> Self {
        match code {
            0xed => Algorithm::EdDsa,
            0x1200 => Algorithm::Es256,
            0xe7 => Algorithm::Es256k,
            0x1205 => Algorithm::Rs256,
            _ => Algorithm::Unknown,
        }
    }

    /// From the signature code that prefixes a legacy `s` field
    /// (`0xd000` plus the key code).
    #[must_use]
    pub const fn from_signature_code(code: u64) -> Self {
        match code {
            0xd0ed => Algorithm::EdDsa,
            0xd01200 => Algorithm::Es256,
            0xd0e7 => Algorithm::Es256k,
            0xd01205 => Algorithm::Rs256,
            _ => Algorithm::Unknown,
        }
    }

    /// Read the algorithm out of varsig header bytes.
    #[must_use]
    pub fn from_varsig_header(bytes: &[u8]) -> Self {
        let mut cursor = bytes;
        match leb128::read::unsigned(&mut cursor) {
            Ok(VARSIG_PREFIX) => {}
            _ => return Algorithm::Unknown,
        }
        // Skip the varsig version when present.
        let mut code = leb128::read::unsigned(&mut cursor).unwrap_or_default();
        if code == 1 {
            code = leb128::read::unsigned(&mut cursor).unwrap_or_default();
        }
        Algorithm::from_key_code(code)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Algorithm::EdDsa => "EdDSA",
            Algorithm::Es256 => "ES256",
            Algorithm::Es256k => "ES256K",
            Algorithm::Rs256 => "RS256",
            Algorithm::Unknown => "unknown",
        })
    }
}

/// Signature material captured by a decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Seal {
    /// Detected algorithm.
    pub algorithm: Algorithm,
    /// Raw signature bytes, empty when none was found.
    pub signature: Vec<u8>,
    /// The bytes the signature covers, as far as the wire form allows.
    ///
    /// For compact tokens this is `header.payload`; for envelopes it is the
    /// re-encoded signature payload; for legacy blocks it is the block.
    pub payload: Vec<u8>,
}

impl Seal {
    /// Split a legacy `s` field (`<sig code><length><raw>`) into its parts.
    #[must_use]
    pub fn from_varsig_signature(bytes: &[u8], payload: Vec<u8>) -> Self {
        let mut cursor = bytes;
        let parsed = leb128::read::unsigned(&mut cursor).and_then(|code| {
            let length = leb128::read::unsigned(&mut cursor)?;
            Ok((code, length))
        });
        match parsed {
            Ok((code, length)) if length as usize == cursor.len() => Seal {
                algorithm: Algorithm::from_signature_code(code),
                signature: cursor.to_vec(),
                payload,
            },
            _ => Seal {
                algorithm: Algorithm::Unknown,
                signature: bytes.to_vec(),
                payload,
            },
        }
    }
}

/// What a [`Verifier`] is asked to check.
#[derive(Debug, Clone, Copy)]
pub struct Signed<'a> {
    /// Issuer DID that is supposed to have signed.
    pub issuer: &'a str,
    /// Detected algorithm.
    pub algorithm: Algorithm,
    /// Raw signature bytes.
    pub signature: &'a [u8],
    /// Signed bytes.
    pub payload: &'a [u8],
}

/// External signature verification.
///
/// Returns `None` when the verifier cannot judge the signature (unknown key
/// type, missing key material), otherwise whether it is valid.
pub trait Verifier {
    /// Check a signature.
    fn verify(&self, signed: &Signed<'_>) -> Option<bool>;
}

/// A [`Verifier`] that never judges anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unverified;

impl Verifier for Unverified {
    fn verify(&self, _signed: &Signed<'_>) -> Option<bool> {
        None
    }
}

impl<F> Verifier for F
where
    F: Fn(&Signed<'_>) -> Option<bool>,
{
    fn verify(&self, signed: &Signed<'_>) -> Option<bool> {
        self(signed)
    }
}

/// Signature metadata reported with every link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureInfo {
    /// Detected algorithm.
    pub algorithm: Algorithm,
    /// Whether a verifier judged this signature.
    pub verified: bool,
    /// Whether the verifier accepted it. Always `false` when unverified.
    pub valid: bool,
    /// Why the signature could not be judged or was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SignatureInfo {
    /// Ask `verifier` about `seal` and record the outcome.
    pub fn check<V: Verifier + ?Sized>(verifier: &V, issuer: &str, seal: &Seal) -> Self {
        if seal.signature.is_empty() {
            return SignatureInfo {
                algorithm: seal.algorithm,
                verified: false,
                valid: false,
                error: Some("no signature present".to_string()),
            };
        }

        let signed = Signed {
            issuer,
            algorithm: seal.algorithm,
            signature: &seal.signature,
            payload: &seal.payload,
        };
        match verifier.verify(&signed) {
            Some(valid) => SignatureInfo {
                algorithm: seal.algorithm,
                verified: true,
                valid,
                error: (!valid).then(|| "signature rejected by verifier".to_string()),
            },
            None => SignatureInfo {
                algorithm: seal.algorithm,
                verified: false,
                valid: false,
                error: None,
            },
        }
    }
}
