//! Native delegation view over an archive block.
//!
//! Timestamps follow the convention of native delegation objects: a missing
//! `exp` or `nbf` reads as `0`.

use ipld_core::cid::Cid;
use tracing::trace;

use crate::{
    claims::{Claims, RawCapability},
    decoder::{Format, block},
    error::DecodeError,
    signature::Seal,
    value::{Value, ValueMap},
};

/// A delegation read from a content-addressed block.
#[derive(Debug, Clone, PartialEq)]
pub struct Delegation {
    link: Cid,
    claims: Claims,
    header: ValueMap,
    seal: Seal,
}

impl Delegation {
    /// Decode the block stored under `link`.
    ///
    /// # Errors
    ///
    /// [`DecodeError::MalformedSegment`] if the block is not a delegation
    /// shape, [`DecodeError::NoRecognizableClaims`] if it has no principals.
    pub fn decode(link: Cid, bytes: &[u8]) -> Result<Self, DecodeError> {
        let envelope = block::read(bytes)
            .ok_or_else(|| DecodeError::malformed("block", format!("{link} is not a delegation")))?;
        if !envelope.claims.is_recognizable() {
            trace!(%link, "block has no principals");
            return Err(DecodeError::NoRecognizableClaims {
                format: Format::Block,
            });
        }

        Ok(Self {
            link,
            claims: envelope.claims,
            header: envelope.header,
            seal: envelope.seal,
        })
    }

    /// Content id of the block this delegation was read from.
    #[must_use]
    pub const fn link(&self) -> &Cid {
        &self.link
    }

    /// Getter for the `issuer` field.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.claims.issuer
    }

    /// Getter for the `audience` field.
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.claims.audience
    }

    /// Getter for the `capabilities` field.
    #[must_use]
    pub fn capabilities(&self) -> &[RawCapability] {
        &self.claims.capabilities
    }

    /// Proof links. Entries that are not valid CIDs are skipped.
    #[must_use]
    pub fn proofs(&self) -> Vec<Cid> {
        self.claims
            .proofs
            .iter()
            .filter_map(|proof| match Cid::try_from(proof.as_str()) {
                Ok(cid) => Some(cid),
                Err(error) => {
                    trace!(%proof, %error, "skipping proof that is not a CID");
                    None
                }
            })
            .collect()
    }

    /// Expiration in seconds since the epoch, `0` when absent.
    #[must_use]
    pub fn expiration(&self) -> u64 {
        timestamp(self.claims.expiration)
    }

    /// Not-before in seconds since the epoch, `0` when absent.
    #[must_use]
    pub fn not_before(&self) -> u64 {
        timestamp(self.claims.not_before)
    }

    /// Getter for the `nonce` field.
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.claims.nonce.as_deref()
    }

    /// Getter for the `facts` field.
    #[must_use]
    pub fn facts(&self) -> &[Value] {
        &self.claims.facts
    }

    /// Header fields.
    #[must_use]
    pub const fn header(&self) -> &ValueMap {
        &self.header
    }

    /// Signature material.
    #[must_use]
    pub const fn seal(&self) -> &Seal {
        &self.seal
    }

    /// Payload version, when the block names one.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.claims.version.as_deref()
    }
}

fn timestamp(seconds: Option<i64>) -> u64 {
    seconds
        .and_then(|seconds| u64::try_from(seconds).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::content_id;
    use ipld_core::ipld::Ipld;
    use std::collections::BTreeMap;
    use testresult::TestResult;

    fn legacy_block(proof: Cid) -> TestResult<Vec<u8>> {
        let mut issuer = vec![0xed, 0x01];
        issuer.extend([1u8; 32]);
        let mut signature = Vec::new();
        leb128::write::unsigned(&mut signature, 0xd0ed)?;
        leb128::write::unsigned(&mut signature, 64)?;
        signature.extend([2u8; 64]);

        let mut capability = BTreeMap::new();
        capability.insert("with".to_string(), Ipld::String("storage:alice".into()));
        capability.insert("can".to_string(), Ipld::String("store/add".into()));

        let mut block = BTreeMap::new();
        block.insert("v".to_string(), Ipld::String("0.9.1".into()));
        block.insert("iss".to_string(), Ipld::Bytes(issuer));
        block.insert("aud".to_string(), Ipld::String("did:key:bob".into()));
        block.insert("att".to_string(), Ipld::List(vec![Ipld::Map(capability)]));
        block.insert("prf".to_string(), Ipld::List(vec![Ipld::Link(proof)]));
        block.insert("exp".to_string(), Ipld::Null);
        block.insert("nbf".to_string(), Ipld::Integer(1_700_000_000));
        block.insert("s".to_string(), Ipld::Bytes(signature));
        Ok(serde_ipld_dagcbor::to_vec(&Ipld::Map(block))?)
    }

    #[test]
    fn it_reads_legacy_blocks() -> TestResult {
        let proof = content_id(b"proof").ok_or("no cid")?;
        let bytes = legacy_block(proof)?;
        let link = content_id(&bytes).ok_or("no cid")?;

        let delegation = Delegation::decode(link, &bytes)?;
        assert!(delegation.issuer().starts_with("did:key:z6Mk"));
        assert_eq!(delegation.audience(), "did:key:bob");
        assert_eq!(delegation.capabilities().len(), 1);
        assert_eq!(delegation.proofs(), vec![proof]);
        assert_eq!(delegation.expiration(), 0);
        assert_eq!(delegation.not_before(), 1_700_000_000);
        assert_eq!(delegation.version(), Some("0.9.1"));
        assert_eq!(delegation.seal().signature, vec![2u8; 64]);
        Ok(())
    }

    #[test]
    fn it_rejects_blocks_that_are_not_delegations() -> TestResult {
        let bytes = serde_ipld_dagcbor::to_vec(&Ipld::String("hello".into()))?;
        let link = content_id(&bytes).ok_or("no cid")?;
        assert!(matches!(
            Delegation::decode(link, &bytes),
            Err(DecodeError::MalformedSegment { segment: "block", .. })
        ));
        Ok(())
    }
}
