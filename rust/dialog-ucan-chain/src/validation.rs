//! Chain validation.
//!
//! Every link is checked on its own (time bounds, capabilities, signature
//! verdict), and, when enabled, against the proofs it resolved to. Failing
//! checks never abort validation; they become [`ValidationIssue`]s and a
//! link is valid as long as none of its issues is an error.

pub mod attenuation;
pub mod issue;

pub use issue::{IssueKind, Severity, ValidationIssue};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;
use tracing::debug;

use crate::{
    config::InspectorConfig,
    link::{Capability, Chain, DelegationLink},
    value::ValueMap,
};

/// Validates chains according to an [`InspectorConfig`].
#[derive(Debug, Clone)]
pub struct Validator {
    expiring_soon: Duration,
    audit_attenuation: bool,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(&InspectorConfig::default())
    }
}

impl Validator {
    /// Creates a validator with the settings from `config`.
    #[must_use]
    pub fn new(config: &InspectorConfig) -> Self {
        Self {
            expiring_soon: Duration::seconds(config.expiring_soon_window_secs),
            audit_attenuation: config.audit_attenuation,
        }
    }

    /// Validate `chain` against the current time.
    #[must_use]
    pub fn validate(&self, chain: &Chain) -> ValidationResult {
        self.validate_at(chain, Utc::now())
    }

    /// Validate `chain` as of `now`.
    #[must_use]
    pub fn validate_at(&self, chain: &Chain, now: DateTime<Utc>) -> ValidationResult {
        let audits = if self.audit_attenuation {
            attenuation::audit(chain)
        } else {
            Vec::new()
        };
        let mut audits = audits.into_iter();

        let links: Vec<ChainLink> = chain
            .iter()
            .map(|link| {
                let mut issues = self.check(link, now);
                issues.extend(audits.next().unwrap_or_default());
                ChainLink::new(link, issues)
            })
            .collect();

        let root_cause = links.iter().find_map(|link| {
            link.issues
                .iter()
                .find(|issue| issue.is_error())
                .map(|issue| RootCause {
                    kind: issue.kind,
                    message: issue.message.clone(),
                    link: Parties {
                        issuer: link.issuer.clone(),
                        audience: link.audience.clone(),
                    },
                })
        });

        let summary = ValidationSummary::of(&links);
        debug!(
            links = summary.total_links,
            invalid = summary.invalid_links,
            warnings = summary.warning_count,
            "validated chain"
        );

        ValidationResult {
            valid: summary.invalid_links == 0,
            chain: links,
            root_cause,
            summary,
        }
    }

    /// Checks that concern `link` alone.
    #[must_use]
    pub fn check(&self, link: &DelegationLink, now: DateTime<Utc>) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if let Some(expiration) = link.expiration {
            if expiration < now {
                issues.push(
                    ValidationIssue::error(
                        IssueKind::Expired,
                        format!("UCAN expired {} ago", format_duration(now - expiration)),
                    )
                    .with("expiration", rfc3339(expiration)),
                );
            } else if expiration < now + self.expiring_soon {
                issues.push(
                    ValidationIssue::warning(
                        IssueKind::ExpiringSoon,
                        format!("UCAN expires in {}", format_duration(expiration - now)),
                    )
                    .with("expiration", rfc3339(expiration)),
                );
            }
        }

        if let Some(not_before) = link.not_before.filter(|not_before| *not_before > now) {
            issues.push(
                ValidationIssue::error(
                    IssueKind::NotYetValid,
                    format!("UCAN not valid until {}", rfc3339(not_before)),
                )
                .with("notBefore", rfc3339(not_before)),
            );
        }

        if link.capabilities.is_empty() {
            issues.push(ValidationIssue::warning(
                IssueKind::NoCapabilities,
                "Delegation has no capabilities",
            ));
        }

        if link.signature.verified && !link.signature.valid {
            issues.push(
                ValidationIssue::error(IssueKind::InvalidSignature, "Signature is invalid")
                    .with("algorithm", link.signature.algorithm.to_string()),
            );
        }

        if !link.proofs.is_empty() {
            issues.push(
                ValidationIssue::info(
                    IssueKind::HasProofs,
                    format!("Delegation references {} proof(s)", link.proofs.len()),
                )
                .with("count", link.proofs.len() as i64),
            );
        }
        if link.nonce.is_some() {
            issues.push(ValidationIssue::info(IssueKind::HasNonce, "Delegation carries a nonce"));
        }
        if !link.facts.is_empty() {
            issues.push(ValidationIssue::info(
                IssueKind::HasFacts,
                format!("Delegation carries {} fact(s)", link.facts.len()),
            ));
        }

        issues
    }
}

/// Render a duration as `45m`, `3h 5m` or `2d 4h`. Partial minutes are
/// dropped.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let minutes = duration.num_minutes().max(0);
    if minutes < 60 {
        return format!("{minutes}m");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h {}m", minutes % 60);
    }
    format!("{}d {}h", hours / 24, hours % 24)
}

fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Validation outcome for one link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainLink {
    /// Distance from the presented token.
    pub level: usize,
    /// Content id.
    pub cid: String,
    /// Issuer principal.
    pub issuer: String,
    /// Audience principal.
    pub audience: String,
    /// The first capability, or an empty one.
    pub capability: Capability,
    /// Expiry, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
    /// Start of validity, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    /// `true` when no issue is an error.
    pub valid: bool,
    /// Findings, in check order.
    pub issues: Vec<ValidationIssue>,
}

impl ChainLink {
    fn new(link: &DelegationLink, issues: Vec<ValidationIssue>) -> Self {
        Self {
            level: link.level,
            cid: link.content_id.clone(),
            issuer: link.issuer.clone(),
            audience: link.audience.clone(),
            capability: link
                .primary_capability()
                .cloned()
                .unwrap_or_else(|| Capability::new("", "", ValueMap::new())),
            expiration: link.expiration,
            not_before: link.not_before,
            valid: !issues.iter().any(ValidationIssue::is_error),
            issues,
        }
    }

    /// Number of warnings.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Warning)
            .count()
    }
}

/// Issuer and audience of the link a root cause belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parties {
    /// Issuer principal.
    pub issuer: String,
    /// Audience principal.
    pub audience: String,
}

/// The first error in the chain, closest to the presented token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RootCause {
    /// Kind of the error.
    #[serde(rename = "type")]
    pub kind: IssueKind,
    /// Its message.
    pub message: String,
    /// The link it was found on.
    pub link: Parties,
}

/// Counts over a validated chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    /// Links validated.
    pub total_links: usize,
    /// Links without errors.
    pub valid_links: usize,
    /// Links with at least one error.
    pub invalid_links: usize,
    /// Warnings across all links.
    pub warning_count: usize,
}

impl ValidationSummary {
    fn of(links: &[ChainLink]) -> Self {
        let valid_links = links.iter().filter(|link| link.valid).count();
        Self {
            total_links: links.len(),
            valid_links,
            invalid_links: links.len() - valid_links,
            warning_count: links.iter().map(ChainLink::warning_count).sum(),
        }
    }
}

/// Outcome of validating a chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// `true` when every link is valid.
    pub valid: bool,
    /// Per-link outcomes, in chain order.
    pub chain: Vec<ChainLink>,
    /// The first error, if any.
    pub root_cause: Option<RootCause>,
    /// Counts.
    pub summary: ValidationSummary,
}
