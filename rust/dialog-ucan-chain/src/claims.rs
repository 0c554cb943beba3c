//! Canonical claims.
//!
//! Every wire shape (legacy `iss/aud/att/prf/...` payloads, modern
//! `cmd/sub/pol` payloads, compact tokens) is reduced to a single
//! [`Claims`] value. Fields are collected first by [`ClaimsScanner`]; the
//! capability synthesized from `cmd`/`sub`/`pol` is only produced in
//! [`ClaimsScanner::finish`], once every key has been seen.

use crate::value::{Value, ValueMap};
use base58::ToBase58;
use tracing::debug;

/// Multicodec code used by principals that embed a full DID string.
const DID_CORE_CODE: u64 = 0x0d1d;

/// A raw capability entry as it appeared on the wire (`with`, `can`, `nb`).
pub type RawCapability = ValueMap;

/// The canonical claim set of a single token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claims {
    /// Issuer principal, empty when absent.
    pub issuer: String,
    /// Audience principal, empty when absent.
    pub audience: String,
    /// `exp` in seconds since the epoch.
    pub expiration: Option<i64>,
    /// `nbf` in seconds since the epoch.
    pub not_before: Option<i64>,
    /// `nnc` / `nonce`.
    pub nonce: Option<String>,
    /// `fct` entries, plus `meta` and `pol` when present.
    pub facts: Vec<Value>,
    /// `prf` entries as content id strings.
    pub proofs: Vec<String>,
    /// Capabilities in wire order.
    pub capabilities: Vec<RawCapability>,
    /// Content id carried in the payload itself, if any.
    pub content_id: Option<String>,
    /// Payload version (`v` / `ucv`).
    pub version: Option<String>,
}

impl Claims {
    /// Claims are usable when at least an issuer or an audience was found.
    #[must_use]
    pub fn is_recognizable(&self) -> bool {
        !self.issuer.is_empty() || !self.audience.is_empty()
    }

    /// Scan a payload map into claims.
    #[must_use]
    pub fn scan(payload: &ValueMap) -> Self {
        let mut scanner = ClaimsScanner::default();
        for (key, value) in payload {
            scanner.field(key, value);
        }
        scanner.finish()
    }
}

/// Field-by-field collector for [`Claims`].
#[derive(Debug, Default)]
pub struct ClaimsScanner {
    claims: Claims,
    command: Option<String>,
    subject: Option<String>,
    policy: Option<Value>,
}

impl ClaimsScanner {
    /// Record a single payload field. Unknown keys and ill-typed values are
    /// ignored.
    pub fn field(&mut self, key: &str, value: &Value) {
        let claims = &mut self.claims;
        match key {
            "iss" => {
                if let Some(principal) = principal(value) {
                    claims.issuer = principal;
                }
            }
            "aud" => {
                if let Some(principal) = principal(value) {
                    claims.audience = principal;
                }
            }
            "exp" => claims.expiration = value.as_i64(),
            "nbf" => claims.not_before = value.as_i64(),
            "nnc" | "nonce" => {
                claims.nonce = match value {
                    Value::String(s) if !s.is_empty() => Some(s.clone()),
                    Value::Bytes(b) if !b.is_empty() => Some(hex::encode(b)),
                    _ => None,
                }
            }
            "fct" => match value {
                Value::List(items) => claims.facts.extend(items.iter().cloned()),
                Value::Map(_) => claims.facts.push(value.clone()),
                _ => {}
            },
            "meta" => {
                if value.as_map().is_some_and(|m| !m.is_empty()) {
                    claims.facts.push(value.clone());
                }
            }
            "prf" => {
                if let Some(items) = value.as_list() {
                    claims
                        .proofs
                        .extend(items.iter().filter_map(Value::as_str).map(str::to_string));
                }
            }
            "att" | "capabilities" | "caps" => match value {
                Value::List(items) => claims
                    .capabilities
                    .extend(items.iter().filter_map(Value::as_map).cloned()),
                Value::Map(resources) => claims.capabilities.extend(flatten(resources)),
                _ => {}
            },
            "cmd" => self.command = value.as_str().map(str::to_string),
            "sub" => {
                self.subject = match value {
                    // A null subject delegates over any resource.
                    Value::Null => Some("*".to_string()),
                    other => principal(other),
                }
            }
            "pol" => {
                self.policy = Some(value.clone());
                let mut fact = ValueMap::new();
                fact.insert("pol".to_string(), value.clone());
                claims.facts.push(Value::Map(fact));
            }
            "cid" => claims.content_id = value.as_str().map(str::to_string),
            "v" | "ucv" => claims.version = value.as_str().map(str::to_string),
            _ => {}
        }
    }

    /// Finish scanning. When no `att` entries were seen but a `cmd` was, a
    /// single capability is synthesized from `cmd`, `sub` and `pol`.
    #[must_use]
    pub fn finish(self) -> Claims {
        let ClaimsScanner {
            mut claims,
            command,
            subject,
            policy,
        } = self;

        if let Some(command) = command.filter(|_| claims.capabilities.is_empty()) {
            debug!(%command, "synthesizing capability from command");
            let mut capability = RawCapability::new();
            capability.insert("can".to_string(), Value::String(command));
            capability.insert(
                "with".to_string(),
                Value::String(subject.unwrap_or_default()),
            );
            if let Some(policy) = policy {
                let mut caveats = ValueMap::new();
                caveats.insert("policy".to_string(), policy);
                capability.insert("nb".to_string(), Value::Map(caveats));
            }
            claims.capabilities.push(capability);
        }

        claims
    }
}

/// Flatten an object-shaped `att` (`{resource: {ability: [caveat, ...]}}`)
/// into one capability per caveat.
fn flatten(resources: &ValueMap) -> Vec<RawCapability> {
    let mut capabilities = Vec::new();
    for (resource, abilities) in resources {
        let Some(abilities) = abilities.as_map() else {
            continue;
        };
        for (ability, caveats) in abilities {
            let caveats: Vec<&ValueMap> = caveats
                .as_list()
                .map(|items| items.iter().filter_map(Value::as_map).collect())
                .unwrap_or_default();

            let entry = |nb: Option<&ValueMap>| {
                let mut capability = RawCapability::new();
                capability.insert("with".to_string(), Value::from(resource.as_str()));
                capability.insert("can".to_string(), Value::from(ability.as_str()));
                if let Some(nb) = nb.filter(|nb| !nb.is_empty()) {
                    capability.insert("nb".to_string(), Value::Map(nb.clone()));
                }
                capability
            };

            if caveats.is_empty() {
                capabilities.push(entry(None));
            } else {
                capabilities.extend(caveats.into_iter().map(|nb| entry(Some(nb))));
            }
        }
    }
    capabilities
}

/// Read a principal from either a DID string or multicodec-prefixed bytes.
#[must_use]
pub fn principal(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Bytes(bytes) => did_from_bytes(bytes),
        _ => None,
    }
}

/// Render principal bytes as a DID.
///
/// Bytes tagged with the did-core multicodec carry the DID string itself;
/// anything else is a multicodec-tagged public key and becomes `did:key`.
#[must_use]
pub fn did_from_bytes(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    let mut cursor = bytes;
    if let Ok(DID_CORE_CODE) = leb128::read::unsigned(&mut cursor) {
        return std::str::from_utf8(cursor)
            .ok()
            .map(|rest| format!("did:{rest}"));
    }
    Some(format!("did:key:z{}", bytes.to_base58()))
}
