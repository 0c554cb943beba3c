//! DAG-CBOR block decoding.
//!
//! Three block shapes are understood:
//!
//! - a legacy map carrying the claims directly, with a varsig-prefixed
//!   signature under `s`,
//! - an envelope list `[signature, {"h": <varsig header>, "ucan/<tag>": payload}]`,
//! - a list `[header?, payload, signature]` in any order.
//!
//! Payloads may be nested inside any number of `ucan/…` or `ucan@…` keyed
//! wrappers.

use std::collections::BTreeMap;

use ipld_core::ipld::Ipld;
use tracing::{debug, trace};

use super::{Format, Token};
use crate::{
    claims::{Claims, ClaimsScanner},
    error::DecodeError,
    signature::{Algorithm, Seal},
    value::{Value, ValueMap},
};

type IpldMap = BTreeMap<String, Ipld>;

/// Length of a raw Ed25519 or ECDSA signature.
const SIGNATURE_LEN: usize = 64;

/// Nested wrappers followed before giving up.
const MAX_WRAPPERS: usize = 8;

/// Claims, header and signature read out of a block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    /// Canonical claims.
    pub claims: Claims,
    /// Header fields; `h` holds a varsig header when there is one.
    pub header: ValueMap,
    /// Signature material.
    pub seal: Seal,
}

/// Decode `bytes` as a single block.
///
/// # Errors
///
/// [`DecodeError::NoRecognizableClaims`] when the block has a token shape
/// but neither issuer nor audience.
pub fn decode(bytes: &[u8]) -> Result<Option<Token>, DecodeError> {
    let Some(envelope) = read(bytes) else {
        return Ok(None);
    };
    if !envelope.claims.is_recognizable() {
        return Err(DecodeError::NoRecognizableClaims {
            format: Format::Block,
        });
    }

    Ok(Some(Token {
        format: Format::Block,
        claims: envelope.claims,
        header: envelope.header,
        seal: envelope.seal,
        source: bytes.to_vec(),
    }))
}

/// Read an [`Envelope`] from block bytes.
///
/// `None` when the bytes are not DAG-CBOR, or decode to something other than
/// a map or a list holding a map.
pub fn read(bytes: &[u8]) -> Option<Envelope> {
    let node: Ipld = match serde_ipld_dagcbor::from_slice(bytes) {
        Ok(node) => node,
        Err(error) => {
            trace!(%error, "not a DAG-CBOR block");
            return None;
        }
    };

    match &node {
        Ipld::Map(map) => Some(from_map(map)),
        Ipld::List(items) => from_list(items),
        _ => None,
    }
}

fn from_map(map: &IpldMap) -> Envelope {
    let mut header = ValueMap::new();
    let (payload, version) = unwrap(map, &mut header);
    let claims = scan(payload, version);

    let seal = match map.get("s") {
        Some(Ipld::Bytes(signature)) => {
            let mut unsigned = map.clone();
            unsigned.remove("s");
            Seal::from_varsig_signature(signature, encode(&Ipld::Map(unsigned)))
        }
        _ => Seal {
            algorithm: algorithm(&header),
            ..Seal::default()
        },
    };

    Envelope {
        claims,
        header,
        seal,
    }
}

fn from_list(items: &[Ipld]) -> Option<Envelope> {
    let signature = items.iter().find_map(|item| match item {
        Ipld::Bytes(bytes) if bytes.len() == SIGNATURE_LEN => Some(bytes.clone()),
        _ => None,
    });

    let maps: Vec<&Ipld> = items
        .iter()
        .filter(|item| matches!(item, Ipld::Map(_)))
        .collect();

    // The payload is the map that carries principals once unwrapped; failing
    // that, the last map, so the caller can report missing claims.
    let position = maps
        .iter()
        .position(|item| match item {
            Ipld::Map(map) => {
                let mut ignored = ValueMap::new();
                let (payload, _) = unwrap(map, &mut ignored);
                ["iss", "aud", "cmd", "sub"]
                    .iter()
                    .any(|key| payload.contains_key(*key))
            }
            _ => false,
        })
        .or_else(|| maps.len().checked_sub(1))?;

    let signed = maps[position];
    let Ipld::Map(map) = signed else {
        return None;
    };

    let mut header = ValueMap::new();
    let (payload, version) = unwrap(map, &mut header);
    let claims = scan(payload, version);

    if let Some(Ipld::Map(explicit)) = maps
        .iter()
        .enumerate()
        .find_map(|(index, item)| (index != position).then_some(*item))
    {
        for (key, value) in explicit {
            header.entry(key.clone()).or_insert_with(|| Value::from(value));
        }
    }

    let seal = Seal {
        algorithm: algorithm(&header),
        signature: signature.unwrap_or_default(),
        payload: encode(signed),
    };

    Some(Envelope {
        claims,
        header,
        seal,
    })
}

/// Follow version wrappers down to the payload, collecting any varsig
/// header met on the way. Returns the payload and the version named by the
/// innermost wrapper key.
fn unwrap<'a>(map: &'a IpldMap, header: &mut ValueMap) -> (&'a IpldMap, Option<String>) {
    let mut current = map;
    let mut version = None;

    for _ in 0..MAX_WRAPPERS {
        if let Some(Ipld::Bytes(varsig)) = current.get("h") {
            header.insert("h".to_string(), Value::Bytes(varsig.clone()));
        }

        let wrapped = current.iter().find_map(|(key, value)| match value {
            Ipld::Map(inner) if key.starts_with("ucan/") || key.starts_with("ucan@") => {
                Some((key, inner))
            }
            _ => None,
        });
        let Some((key, inner)) = wrapped else {
            break;
        };

        debug!(%key, "unwrapping payload");
        if let Some((_, tag)) = key.split_once('@') {
            version = Some(tag.to_string());
        }
        current = inner;
    }

    (current, version)
}

fn scan(payload: &IpldMap, version: Option<String>) -> Claims {
    let mut scanner = ClaimsScanner::default();
    for (key, value) in payload {
        scanner.field(key, &Value::from(value));
    }
    let mut claims = scanner.finish();
    if claims.version.is_none() {
        claims.version = version;
    }
    claims
}

fn algorithm(header: &ValueMap) -> Algorithm {
    if let Some(alg) = header.get("alg").and_then(Value::as_str) {
        return Algorithm::from_jwt(alg);
    }
    header
        .get("h")
        .and_then(Value::as_bytes)
        .map_or(Algorithm::Unknown, Algorithm::from_varsig_header)
}

fn encode(node: &Ipld) -> Vec<u8> {
    serde_ipld_dagcbor::to_vec(node).unwrap_or_default()
}
