//! Validation findings.

use serde::Serialize;
use std::fmt;

use crate::value::{Value, ValueMap};

/// What a finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Expiry is in the past.
    Expired,
    /// Expiry is within the warning window.
    ExpiringSoon,
    /// Not-before is in the future.
    NotYetValid,
    /// The link grants nothing.
    NoCapabilities,
    /// A verifier rejected the signature.
    InvalidSignature,
    /// A resource is not covered by any proof.
    ResourceMismatch,
    /// An ability is not covered by any proof.
    CapabilityEscalation,
    /// A caveat is looser than the proof's.
    CaveatEscalation,
    /// The link carries proofs.
    HasProofs,
    /// The link carries a nonce.
    HasNonce,
    /// The link carries facts.
    HasFacts,
}

impl IssueKind {
    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            IssueKind::Expired => "expired",
            IssueKind::ExpiringSoon => "expiring_soon",
            IssueKind::NotYetValid => "not_yet_valid",
            IssueKind::NoCapabilities => "no_capabilities",
            IssueKind::InvalidSignature => "invalid_signature",
            IssueKind::ResourceMismatch => "resource_mismatch",
            IssueKind::CapabilityEscalation => "capability_escalation",
            IssueKind::CaveatEscalation => "caveat_escalation",
            IssueKind::HasProofs => "has_proofs",
            IssueKind::HasNonce => "has_nonce",
            IssueKind::HasFacts => "has_facts",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much a finding matters. Only errors invalidate a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Invalidates the link.
    Error,
    /// Worth attention.
    Warning,
    /// Informational.
    Info,
}

/// A single finding about a link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    /// What the finding is about.
    #[serde(rename = "type")]
    pub kind: IssueKind,
    /// Human readable description.
    pub message: String,
    /// How much it matters.
    pub severity: Severity,
    /// Values involved.
    #[serde(skip_serializing_if = "ValueMap::is_empty")]
    pub context: ValueMap,
}

impl ValidationIssue {
    /// Creates a finding without context.
    pub fn new(kind: IssueKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            severity,
            context: ValueMap::new(),
        }
    }

    /// An error finding.
    pub fn error(kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Error, message)
    }

    /// A warning finding.
    pub fn warning(kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Warning, message)
    }

    /// An informational finding.
    pub fn info(kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Info, message)
    }

    /// Adds a context entry.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    /// Returns `true` for error severity.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}
