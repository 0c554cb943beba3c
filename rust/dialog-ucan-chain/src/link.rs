//! The delegation link model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    signature::SignatureInfo,
    value::{Value, ValueMap},
};

/// Ability substrings that mark a capability as an invocation.
pub const INVOKE_PATTERNS: [&str; 5] = ["invoke", "execute", "run", "call", "perform"];

/// Returns `true` when `ability` reads as an invocation.
#[must_use]
pub fn is_invoke_ability(ability: &str) -> bool {
    let ability = ability.to_lowercase();
    INVOKE_PATTERNS
        .iter()
        .any(|pattern| ability.contains(pattern))
}

/// Coarse grouping of abilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// `store…`
    Storage,
    /// `space…`
    Space,
    /// `upload…`
    Upload,
    /// `blob…`
    Blob,
    /// `index…`
    Index,
    /// Any ability that names an invocation.
    Invocation,
    /// Everything else.
    General,
}

impl Category {
    /// Derive the category of an ability. Prefix rules for `store`, `space`
    /// and `upload` win over invocation patterns, which win over `blob` and
    /// `index`.
    #[must_use]
    pub fn of(ability: &str) -> Self {
        if ability.starts_with("store") {
            Category::Storage
        } else if ability.starts_with("space") {
            Category::Space
        } else if ability.starts_with("upload") {
            Category::Upload
        } else if is_invoke_ability(ability) {
            Category::Invocation
        } else if ability.starts_with("blob") {
            Category::Blob
        } else if ability.starts_with("index") {
            Category::Index
        } else {
            Category::General
        }
    }
}

/// A single granted capability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Capability {
    #[serde(rename = "with")]
    resource: String,
    #[serde(rename = "can")]
    ability: String,
    #[serde(rename = "nb")]
    caveats: ValueMap,
    category: Category,
}

impl Capability {
    /// Creates a capability, deriving its category from `ability`.
    pub fn new(resource: impl Into<String>, ability: impl Into<String>, caveats: ValueMap) -> Self {
        let ability = ability.into();
        Self {
            category: Category::of(&ability),
            resource: resource.into(),
            ability,
            caveats,
        }
    }

    /// Read a capability from its wire map. Missing or ill-typed `with` and
    /// `can` read as empty strings, a missing `nb` as no caveats.
    #[must_use]
    pub fn from_raw(raw: &ValueMap) -> Self {
        let text = |key: &str| {
            raw.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let caveats = raw
            .get("nb")
            .and_then(Value::as_map)
            .cloned()
            .unwrap_or_default();
        Self::new(text("with"), text("can"), caveats)
    }

    /// The resource (`with`).
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The ability (`can`).
    #[must_use]
    pub fn ability(&self) -> &str {
        &self.ability
    }

    /// The caveats (`nb`).
    #[must_use]
    pub const fn caveats(&self) -> &ValueMap {
        &self.caveats
    }

    /// The derived category.
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }
}

/// Reference from a link to one of its proofs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProofReference {
    /// Content id of the proof.
    pub cid: String,
    /// Position in the link's proof list.
    pub index: usize,
    /// Always `"delegation"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl ProofReference {
    /// Creates a reference to the proof at `index`.
    pub fn new(cid: impl Into<String>, index: usize) -> Self {
        Self {
            cid: cid.into(),
            index,
            kind: "delegation",
        }
    }
}

/// One delegation in a chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationLink {
    /// Issuer principal.
    pub issuer: String,
    /// Audience principal.
    pub audience: String,
    /// Granted capabilities, in wire order.
    pub capabilities: Vec<Capability>,
    /// Proofs, in wire order.
    pub proofs: Vec<ProofReference>,
    /// Expiry, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
    /// Start of validity, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    /// Facts.
    pub facts: Vec<Value>,
    /// Nonce, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Signature metadata.
    pub signature: SignatureInfo,
    /// Content id of the token.
    pub content_id: String,
    /// Distance from the presented token.
    pub level: usize,
}

impl DelegationLink {
    /// The first capability, if any.
    #[must_use]
    pub fn primary_capability(&self) -> Option<&Capability> {
        self.capabilities.first()
    }

    /// Content ids of this link's proofs.
    pub fn proof_ids(&self) -> impl Iterator<Item = &str> {
        self.proofs.iter().map(|proof| proof.cid.as_str())
    }
}

/// A resolved chain, presented token first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Chain(Vec<DelegationLink>);

impl Chain {
    /// The links, in discovery order.
    #[must_use]
    pub fn links(&self) -> &[DelegationLink] {
        &self.0
    }

    /// The presented token.
    #[must_use]
    pub fn root(&self) -> Option<&DelegationLink> {
        self.0.first()
    }

    /// Number of links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when the chain holds no links.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the links in discovery order.
    pub fn iter(&self) -> std::slice::Iter<'_, DelegationLink> {
        self.0.iter()
    }

    /// Finds a link by content id.
    #[must_use]
    pub fn find(&self, content_id: &str) -> Option<&DelegationLink> {
        self.0.iter().find(|link| link.content_id == content_id)
    }

    pub(crate) fn push(&mut self, link: DelegationLink) {
        self.0.push(link);
    }
}

impl From<DelegationLink> for Chain {
    fn from(link: DelegationLink) -> Self {
        Chain(vec![link])
    }
}

impl IntoIterator for Chain {
    type Item = DelegationLink;
    type IntoIter = std::vec::IntoIter<DelegationLink>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Chain {
    type Item = &'a DelegationLink;
    type IntoIter = std::slice::Iter<'a, DelegationLink>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
