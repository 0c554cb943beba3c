//! Content-addressed block stores.
//!
//! Only archives carry a store. It is built once from the archive bytes and
//! dropped with the request.

use std::{collections::HashMap, hash::BuildHasher};

use ipld_core::cid::{Cid, multihash::Multihash};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{trace, warn};

/// Multicodec code for DAG-CBOR.
pub const DAG_CBOR_CODE: u64 = 0x71;

/// Multihash code for SHA2-256.
pub const SHA2_256_CODE: u64 = 0x12;

/// Read access to blocks by CID.
pub trait Blocks {
    /// Retrieves a block by its CID.
    fn block(&self, cid: &Cid) -> Option<&[u8]>;

    /// Retrieves a block, reporting a missing one as an error.
    ///
    /// # Errors
    ///
    /// Returns [`Missing`] if no block with this CID is held.
    fn require(&self, cid: &Cid) -> Result<&[u8], Missing> {
        self.block(cid).ok_or(Missing(*cid))
    }
}

/// An in-memory block store.
#[derive(Debug, Clone, Default)]
pub struct BlockStore {
    blocks: HashMap<Cid, Vec<u8>>,
}

impl BlockStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a block under `cid`, replacing any previous block.
    pub fn insert(&mut self, cid: Cid, bytes: Vec<u8>) {
        self.blocks.insert(cid, bytes);
    }

    /// Inserts a block only if its bytes hash to `cid`.
    ///
    /// Returns `false` and drops the block when the digest does not match.
    /// Blocks addressed with a hash other than SHA2-256 cannot be checked
    /// and are kept.
    pub fn insert_verified(&mut self, cid: Cid, bytes: Vec<u8>) -> bool {
        match integrity(&cid, &bytes) {
            Some(false) => {
                warn!(%cid, "block does not match its content id, discarding");
                false
            }
            checked => {
                if checked.is_none() {
                    trace!(%cid, code = cid.hash().code(), "cannot check block hash");
                }
                self.insert(cid, bytes);
                true
            }
        }
    }

    /// Number of blocks held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` when no blocks are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterates over every block.
    pub fn iter(&self) -> impl Iterator<Item = (&Cid, &[u8])> {
        self.blocks.iter().map(|(cid, bytes)| (cid, bytes.as_slice()))
    }
}

impl Blocks for BlockStore {
    fn block(&self, cid: &Cid) -> Option<&[u8]> {
        self.blocks.get(cid).map(Vec::as_slice)
    }
}

impl<H: BuildHasher> Blocks for HashMap<Cid, Vec<u8>, H> {
    fn block(&self, cid: &Cid) -> Option<&[u8]> {
        self.get(cid).map(Vec::as_slice)
    }
}

/// A block referenced by CID was not found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("missing block {0}")]
pub struct Missing(pub Cid);

/// Compute the CIDv1 (DAG-CBOR, SHA2-256) of `bytes`.
#[must_use]
pub fn content_id(bytes: &[u8]) -> Option<Cid> {
    let digest = Sha256::digest(bytes);
    Multihash::<64>::wrap(SHA2_256_CODE, &digest)
        .ok()
        .map(|hash| Cid::new_v1(DAG_CBOR_CODE, hash))
}

/// Check `bytes` against the digest in `cid`.
///
/// `None` when the CID uses a hash function other than SHA2-256.
#[must_use]
pub fn integrity(cid: &Cid, bytes: &[u8]) -> Option<bool> {
    let hash = cid.hash();
    (hash.code() == SHA2_256_CODE).then(|| hash.digest() == Sha256::digest(bytes).as_slice())
}
