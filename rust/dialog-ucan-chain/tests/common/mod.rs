//! Token fixtures shared by the integration tests.
//!
//! Signatures are zero bytes: nothing in this crate checks them.

#![allow(dead_code)]

use std::collections::BTreeMap;

use base64::prelude::*;
use ipld_core::{cid::Cid, ipld::Ipld};
use sha2::{Digest, Sha256};

/// Current unix time in seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A single-capability delegation to mint.
#[derive(Clone, Debug)]
pub struct Grant {
    pub issuer: String,
    pub audience: String,
    pub resource: String,
    pub ability: String,
    pub caveats: BTreeMap<String, Ipld>,
    pub expiration: Option<i64>,
    pub proofs: Vec<Cid>,
    /// Set for `sub/cmd/pol` delegations.
    pub policy: Option<Vec<Ipld>>,
}

impl Grant {
    pub fn new(issuer: &str, audience: &str) -> Self {
        Self {
            issuer: format!("did:key:{issuer}"),
            audience: format!("did:key:{audience}"),
            resource: "storage:alice".into(),
            ability: "store/add".into(),
            caveats: BTreeMap::new(),
            expiration: Some(now() + 7 * 24 * 60 * 60),
            proofs: Vec::new(),
            policy: None,
        }
    }

    pub fn capability(mut self, resource: &str, ability: &str) -> Self {
        self.resource = resource.into();
        self.ability = ability.into();
        self
    }

    pub fn caveat(mut self, key: &str, value: Ipld) -> Self {
        self.caveats.insert(key.into(), value);
        self
    }

    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.expiration = Some(now() + seconds);
        self
    }

    pub fn proof(mut self, cid: Cid) -> Self {
        self.proofs.push(cid);
        self
    }

    /// Switch to a `sub/cmd/pol` payload carrying `statements`, with the
    /// resource as subject and the ability as command.
    pub fn policy(mut self, statements: Vec<Ipld>) -> Self {
        self.policy = Some(statements);
        self
    }

    /// The payload map: legacy `iss/aud/att/prf`, or `sub/cmd/pol` once a
    /// policy is set.
    pub fn payload(&self) -> Ipld {
        if let Some(statements) = &self.policy {
            return self.command_payload(statements);
        }

        let mut capability = BTreeMap::new();
        capability.insert("with".to_string(), Ipld::String(self.resource.clone()));
        capability.insert("can".to_string(), Ipld::String(self.ability.clone()));
        if !self.caveats.is_empty() {
            capability.insert("nb".to_string(), Ipld::Map(self.caveats.clone()));
        }

        let mut payload = BTreeMap::new();
        payload.insert("iss".to_string(), Ipld::String(self.issuer.clone()));
        payload.insert("aud".to_string(), Ipld::String(self.audience.clone()));
        payload.insert("att".to_string(), Ipld::List(vec![Ipld::Map(capability)]));
        payload.insert(
            "prf".to_string(),
            Ipld::List(self.proofs.iter().copied().map(Ipld::Link).collect()),
        );
        if let Some(expiration) = self.expiration {
            payload.insert("exp".to_string(), Ipld::Integer(expiration.into()));
        }
        Ipld::Map(payload)
    }

    fn command_payload(&self, statements: &[Ipld]) -> Ipld {
        let mut payload = BTreeMap::new();
        payload.insert("iss".to_string(), Ipld::String(self.issuer.clone()));
        payload.insert("aud".to_string(), Ipld::String(self.audience.clone()));
        payload.insert("sub".to_string(), Ipld::String(self.resource.clone()));
        payload.insert("cmd".to_string(), Ipld::String(self.ability.clone()));
        payload.insert("pol".to_string(), Ipld::List(statements.to_vec()));
        payload.insert(
            "prf".to_string(),
            Ipld::List(self.proofs.iter().copied().map(Ipld::Link).collect()),
        );
        if let Some(expiration) = self.expiration {
            payload.insert("exp".to_string(), Ipld::Integer(expiration.into()));
        }
        Ipld::Map(payload)
    }

    /// The payload as a DAG-CBOR block and its CID.
    pub fn block(&self) -> (Cid, Vec<u8>) {
        let bytes = serde_ipld_dagcbor::to_vec(&self.payload()).expect("encodes");
        (cid(&bytes), bytes)
    }

    /// A `[signature, {"h": varsig, "ucan/dlg@1.0.0-rc.1": payload}]` envelope.
    pub fn envelope(&self) -> Vec<u8> {
        let mut signed = BTreeMap::new();
        signed.insert("h".to_string(), Ipld::Bytes(vec![0x34, 0xed, 0x01, 0xed, 0x01, 0x13, 0x71]));
        signed.insert("ucan/dlg@1.0.0-rc.1".to_string(), self.payload());
        serde_ipld_dagcbor::to_vec(&Ipld::List(vec![
            Ipld::Bytes(vec![0; 64]),
            Ipld::Map(signed),
        ]))
        .expect("encodes")
    }

    /// The envelope as a block and its CID.
    pub fn sealed(&self) -> (Cid, Vec<u8>) {
        let bytes = self.envelope();
        (cid(&bytes), bytes)
    }

    /// A `header.payload.signature` compact token.
    pub fn compact(&self) -> String {
        let mut capability = serde_json::json!({
            "with": self.resource,
            "can": self.ability,
        });
        if let Some(Ipld::Integer(size)) = self.caveats.get("size") {
            capability["nb"] = serde_json::json!({ "size": *size as i64 });
        }
        let payload = serde_json::json!({
            "iss": self.issuer,
            "aud": self.audience,
            "exp": self.expiration,
            "att": [capability],
            "prf": self.proofs.iter().map(Cid::to_string).collect::<Vec<_>>(),
        });
        let header = serde_json::json!({ "alg": "EdDSA", "typ": "JWT", "ucv": "0.10.0" });

        format!(
            "{}.{}.{}",
            BASE64_URL_SAFE_NO_PAD.encode(header.to_string()),
            BASE64_URL_SAFE_NO_PAD.encode(payload.to_string()),
            BASE64_URL_SAFE_NO_PAD.encode([0u8; 64]),
        )
    }
}

/// CIDv1 DAG-CBOR SHA2-256 of `bytes`.
pub fn cid(bytes: &[u8]) -> Cid {
    dialog_ucan_chain::store::content_id(bytes).expect("sha2-256 fits a multihash")
}

/// A CARv1 archive with `root` and `blocks`.
pub fn car(root: Cid, blocks: &[(Cid, Vec<u8>)]) -> Vec<u8> {
    let mut header = BTreeMap::new();
    header.insert("roots".to_string(), Ipld::List(vec![Ipld::Link(root)]));
    header.insert("version".to_string(), Ipld::Integer(1));
    let header = serde_ipld_dagcbor::to_vec(&Ipld::Map(header)).expect("encodes");

    let mut out = Vec::new();
    leb128::write::unsigned(&mut out, header.len() as u64).expect("writes");
    out.extend(header);
    for (cid, data) in blocks {
        let cid = cid.to_bytes();
        leb128::write::unsigned(&mut out, (cid.len() + data.len()) as u64).expect("writes");
        out.extend(cid);
        out.extend(data);
    }
    out
}

/// Mint `grant` alone into an archive.
pub fn archive(grant: &Grant) -> Vec<u8> {
    let (root, block) = grant.block();
    car(root, &[(root, block)])
}

/// A `[op, selector, value]` policy statement.
pub fn statement(op: &str, selector: &str, value: Ipld) -> Ipld {
    Ipld::List(vec![Ipld::String(op.into()), Ipld::String(selector.into()), value])
}

/// Hex digest, for comparing against fallback content ids.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
