//! CAR archive decoding.
//!
//! A CARv1 stream is a varint-prefixed DAG-CBOR header `{roots, version}`
//! followed by sections of `<varint length><cid><block>`. CARv2 wraps a v1
//! stream behind a fixed pragma and a 40 byte header locating it.
//!
//! The first root is the delegation, or a variant `{"ucan@<version>": link}`
//! pointing at it. Every block in the archive lands in a [`BlockStore`] so
//! that proofs can be resolved later.

use ipld_core::{cid::Cid, ipld::Ipld};
use tracing::{debug, trace};

use super::Format;
use crate::{
    delegation::Delegation,
    error::DecodeError,
    store::{BlockStore, Blocks},
};

/// CARv2 pragma: varint length 10, then `{"version": 2}`.
const V2_PRAGMA: [u8; 11] = [
    0x0a, 0xa1, 0x67, 0x76, 0x65, 0x72, 0x73, 0x69, 0x6f, 0x6e, 0x02,
];

/// Characteristics (16) plus data offset, data size and index offset (8 each).
const V2_HEADER_LEN: usize = 40;

/// A delegation decoded from an archive, with every block it shipped with.
#[derive(Debug, Clone)]
pub struct Archive {
    /// The root delegation.
    pub root: Delegation,
    /// All blocks of the archive, the root included.
    pub store: BlockStore,
}

/// Decode `bytes` as a CAR archive.
///
/// # Errors
///
/// Once a CAR header has been read, truncated sections, a missing or
/// undecodable root block are reported as [`DecodeError::MalformedSegment`],
/// and a root without principals as [`DecodeError::NoRecognizableClaims`].
pub fn decode(bytes: &[u8], verify_integrity: bool) -> Result<Option<Archive>, DecodeError> {
    let v1 = match bytes.strip_prefix(&V2_PRAGMA[..]) {
        Some(rest) => match unwrap_v2(rest, bytes.len()) {
            Some(v1) => v1,
            None => return Err(DecodeError::malformed("archive", "invalid CARv2 header")),
        },
        None => bytes,
    };

    let Some((roots, mut sections)) = read_header(v1) else {
        return Ok(None);
    };
    let Some(root) = roots.first().copied() else {
        return Err(DecodeError::malformed("archive", "no roots"));
    };
    debug!(%root, roots = roots.len(), "reading archive");

    let mut store = BlockStore::new();
    while !sections.is_empty() {
        let length = leb128::read::unsigned(&mut sections)
            .map_err(|error| DecodeError::malformed("archive", error))?;
        let length = usize::try_from(length)
            .ok()
            .filter(|length| *length <= sections.len())
            .ok_or_else(|| DecodeError::malformed("archive", "truncated section"))?;
        let (mut section, rest) = sections.split_at(length);
        sections = rest;

        let cid = Cid::read_bytes(&mut section)
            .map_err(|error| DecodeError::malformed("archive", error))?;
        if verify_integrity {
            store.insert_verified(cid, section.to_vec());
        } else {
            store.insert(cid, section.to_vec());
        }
    }
    trace!(blocks = store.len(), "archive blocks loaded");

    let cid = variant_target(&store, &root).unwrap_or(root);
    let block = store
        .require(&cid)
        .map_err(|error| DecodeError::malformed("archive", error))?;
    let root = Delegation::decode(cid, block).map_err(|error| match error {
        DecodeError::NoRecognizableClaims { .. } => DecodeError::NoRecognizableClaims {
            format: Format::Archive,
        },
        other => other,
    })?;

    Ok(Some(Archive { root, store }))
}

/// Locate the v1 payload behind a v2 pragma.
fn unwrap_v2(rest: &[u8], total: usize) -> Option<&[u8]> {
    let header = rest.get(..V2_HEADER_LEN)?;
    let field = |at: usize| -> Option<usize> {
        let bytes: [u8; 8] = header.get(at..at + 8)?.try_into().ok()?;
        usize::try_from(u64::from_le_bytes(bytes)).ok()
    };
    let offset = field(16)?;
    let size = field(24)?;
    let end = offset.checked_add(size).filter(|end| *end <= total)?;

    // Offsets count from the start of the whole stream.
    let start = offset.checked_sub(V2_PRAGMA.len())?;
    rest.get(start..end - V2_PRAGMA.len())
}

/// Read the v1 header. `None` if `bytes` does not start with one.
fn read_header(bytes: &[u8]) -> Option<(Vec<Cid>, &[u8])> {
    let mut cursor = bytes;
    let length = usize::try_from(leb128::read::unsigned(&mut cursor).ok()?).ok()?;
    if length == 0 || length > cursor.len() {
        return None;
    }
    let (header, sections) = cursor.split_at(length);

    let Ipld::Map(header) = serde_ipld_dagcbor::from_slice::<Ipld>(header).ok()? else {
        return None;
    };
    match header.get("version") {
        Some(Ipld::Integer(1)) => {}
        _ => return None,
    }
    let Some(Ipld::List(roots)) = header.get("roots") else {
        return None;
    };
    let roots = roots
        .iter()
        .filter_map(|root| match root {
            Ipld::Link(cid) => Some(*cid),
            _ => None,
        })
        .collect();

    Some((roots, sections))
}

/// If `root` is a variant `{"ucan@<version>": link}`, the link it points at.
fn variant_target(store: &BlockStore, root: &Cid) -> Option<Cid> {
    let block = store.block(root)?;
    let Ipld::Map(map) = serde_ipld_dagcbor::from_slice::<Ipld>(block).ok()? else {
        return None;
    };
    if map.len() != 1 {
        return None;
    }
    map.iter().find_map(|(key, value)| match value {
        Ipld::Link(cid) if key.starts_with("ucan@") => {
            debug!(%key, %cid, "following archive variant");
            Some(*cid)
        }
        _ => None,
    })
}
