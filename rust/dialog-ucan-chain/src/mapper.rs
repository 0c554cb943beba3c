//! Mapping decoded tokens to [`DelegationLink`]s.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::{
    claims::{Claims, RawCapability},
    decoder::{Decoded, Token},
    delegation::Delegation,
    link::{Capability, DelegationLink, ProofReference},
    signature::{Seal, SignatureInfo, Unverified, Verifier},
};

/// Hex digits of the input digest kept in a fallback content id.
const FALLBACK_ID_HEX_LEN: usize = 40;

/// Turns decoded tokens into links, recording signature verdicts from a
/// [`Verifier`].
#[derive(Clone, Copy)]
pub struct Mapper<'a> {
    verifier: &'a dyn Verifier,
}

impl Default for Mapper<'_> {
    fn default() -> Self {
        Self {
            verifier: &Unverified,
        }
    }
}

impl<'a> Mapper<'a> {
    /// Creates a mapper that asks `verifier` about signatures.
    pub fn new(verifier: &'a dyn Verifier) -> Self {
        Self { verifier }
    }

    /// Map whatever the decoder produced.
    #[must_use]
    pub fn map(&self, decoded: &Decoded, level: usize) -> DelegationLink {
        match decoded {
            Decoded::Archive(archive) => self.map_delegation(&archive.root, level),
            Decoded::Token(token) => self.map_token(token, level),
        }
    }

    /// Map a native delegation. Zero timestamps are absent.
    #[must_use]
    pub fn map_delegation(&self, delegation: &Delegation, level: usize) -> DelegationLink {
        DelegationLink {
            issuer: delegation.issuer().to_string(),
            audience: delegation.audience().to_string(),
            capabilities: capabilities(delegation.capabilities()),
            proofs: delegation
                .proofs()
                .iter()
                .enumerate()
                .map(|(index, cid)| ProofReference::new(cid.to_string(), index))
                .collect(),
            expiration: native_time(delegation.expiration()),
            not_before: native_time(delegation.not_before()),
            facts: delegation.facts().to_vec(),
            nonce: delegation.nonce().map(str::to_string),
            signature: self.signature(delegation.issuer(), delegation.seal()),
            content_id: delegation.link().to_string(),
            level,
        }
    }

    /// Map canonical claims. A token without its own content id is given
    /// one derived from its source bytes.
    #[must_use]
    pub fn map_token(&self, token: &Token, level: usize) -> DelegationLink {
        let Claims {
            issuer,
            audience,
            expiration,
            not_before,
            nonce,
            facts,
            proofs,
            capabilities: raw,
            content_id,
            ..
        } = &token.claims;

        let content_id = content_id.clone().unwrap_or_else(|| {
            let fallback = fallback_content_id(&token.source);
            trace!(%fallback, "token carries no content id");
            fallback
        });

        DelegationLink {
            issuer: issuer.clone(),
            audience: audience.clone(),
            capabilities: capabilities(raw),
            proofs: proofs
                .iter()
                .enumerate()
                .map(|(index, cid)| ProofReference::new(cid.clone(), index))
                .collect(),
            expiration: expiration.and_then(time),
            not_before: not_before.and_then(time),
            facts: facts.clone(),
            nonce: nonce.clone(),
            signature: self.signature(issuer, &token.seal),
            content_id,
            level,
        }
    }

    fn signature(&self, issuer: &str, seal: &Seal) -> SignatureInfo {
        SignatureInfo::check(self.verifier, issuer, seal)
    }
}

/// Deterministic content id for inputs that do not carry one: `b` followed
/// by the first 40 hex digits of the SHA-256 of `source`.
#[must_use]
pub fn fallback_content_id(source: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(source));
    format!("b{}", &digest[..FALLBACK_ID_HEX_LEN])
}

fn capabilities(raw: &[RawCapability]) -> Vec<Capability> {
    raw.iter().map(Capability::from_raw).collect()
}

/// `0000-01-01T00:00:00Z`.
const EARLIEST: i64 = -62_167_219_200;
/// `9999-12-31T23:59:59Z`.
const LATEST: i64 = 253_402_300_799;

/// Timestamps past either end of the four-digit-year range are clamped to
/// it.
fn time(seconds: i64) -> Option<DateTime<Utc>> {
    let clamped = seconds.clamp(EARLIEST, LATEST);
    if clamped != seconds {
        trace!(seconds, clamped, "clamping out-of-range timestamp");
    }
    DateTime::from_timestamp(clamped, 0)
}

fn native_time(seconds: u64) -> Option<DateTime<Utc>> {
    if seconds == 0 {
        return None;
    }
    time(i64::try_from(seconds).unwrap_or(i64::MAX))
}
