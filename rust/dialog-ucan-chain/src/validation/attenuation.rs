//! Attenuation: a delegated capability may only narrow what its proof
//! grants.

use std::collections::HashSet;

use regex::Regex;

use super::issue::{IssueKind, ValidationIssue};
use crate::{
    link::{Capability, Chain},
    value::{Value, ValueMap},
};

/// Returns `true` when `parent` covers `child`. Every `*` in `parent`
/// matches any run of characters and every other character is literal;
/// exact equality always matches.
#[must_use]
pub fn resource_matches(parent: &str, child: &str) -> bool {
    if parent == child {
        return true;
    }
    if !parent.contains('*') {
        return false;
    }

    let pattern = parent
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("(?s)^{pattern}$")).is_ok_and(|compiled| compiled.is_match(child))
}

/// Returns `true` when ability `parent` covers `child`.
///
/// `ns/*` covers every ability under `ns/`, and a bare `*` covers
/// everything.
#[must_use]
pub fn ability_matches(parent: &str, child: &str) -> bool {
    if parent == child || parent == "*" {
        return true;
    }
    match parent.strip_suffix("/*") {
        Some(namespace) => child
            .strip_prefix(namespace)
            .is_some_and(|rest| rest.starts_with('/')),
        None => false,
    }
}

/// Caveats the child loosens relative to the parent.
///
/// A `policy` caveat is a conjunction of predicates: the child must keep
/// every statement of the parent's and may add its own. For any other key
/// present on both sides a numeric bound escalates when the child's is
/// larger, and a list escalates unless the child's is a subset of the
/// parent's. Other caveats the child omits are not escalations.
#[must_use]
pub fn caveat_issues(parent: &ValueMap, child: &ValueMap) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for (key, parent_value) in parent {
        if key == POLICY {
            issues.extend(policy_issue(parent_value, child.get(key)));
            continue;
        }
        let Some(child_value) = child.get(key) else {
            continue;
        };

        match (parent_value, child_value) {
            (Value::List(allowed), Value::List(requested)) => {
                if !is_subset(requested, allowed) {
                    issues.push(
                        ValidationIssue::error(
                            IssueKind::CaveatEscalation,
                            format!("Child {key} values exceed parent restrictions"),
                        )
                        .with("caveat", key.as_str())
                        .with("parent", parent_value.clone())
                        .with("child", child_value.clone()),
                    );
                }
            }
            _ => {
                let (Some(bound), Some(requested)) = (parent_value.as_f64(), child_value.as_f64())
                else {
                    continue;
                };
                if requested > bound {
                    issues.push(
                        ValidationIssue::error(
                            IssueKind::CaveatEscalation,
                            format!(
                                "Child {key} limit ({}) exceeds parent ({})",
                                number(child_value),
                                number(parent_value)
                            ),
                        )
                        .with("caveat", key.as_str())
                        .with("parent", parent_value.clone())
                        .with("child", child_value.clone()),
                    );
                }
            }
        }
    }
    issues
}

const POLICY: &str = "policy";

fn policy_issue(parent: &Value, child: Option<&Value>) -> Option<ValidationIssue> {
    let Value::List(required) = parent else {
        return None;
    };
    let kept: &[Value] = match child {
        Some(Value::List(statements)) => statements,
        _ => &[],
    };

    let dropped: Vec<Value> = required
        .iter()
        .filter(|statement| !kept.contains(statement))
        .cloned()
        .collect();
    if dropped.is_empty() {
        return None;
    }

    Some(
        ValidationIssue::error(
            IssueKind::CaveatEscalation,
            format!("Child policy drops {} parent statement(s)", dropped.len()),
        )
        .with("caveat", POLICY)
        .with("parent", parent.clone())
        .with("child", child.cloned().unwrap_or(Value::Null))
        .with("dropped", Value::List(dropped)),
    )
}

/// Every way `child` exceeds `parent`.
#[must_use]
pub fn check(parent: &Capability, child: &Capability) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if !resource_matches(parent.resource(), child.resource()) {
        issues.push(
            ValidationIssue::error(
                IssueKind::ResourceMismatch,
                format!(
                    "Child resource '{}' not covered by parent '{}'",
                    child.resource(),
                    parent.resource()
                ),
            )
            .with("parent", parent.resource())
            .with("child", child.resource()),
        );
    }

    if !ability_matches(parent.ability(), child.ability()) {
        issues.push(
            ValidationIssue::error(
                IssueKind::CapabilityEscalation,
                format!(
                    "Child ability '{}' exceeds parent '{}'",
                    child.ability(),
                    parent.ability()
                ),
            )
            .with("parent", parent.ability())
            .with("child", child.ability()),
        );
    }

    issues.extend(caveat_issues(parent.caveats(), child.caveats()));
    issues
}

/// Check `child` against every capability its proofs grant.
///
/// Nothing is reported when some parent covers the child outright, or when
/// there are no parents to compare with. Otherwise the findings against the
/// closest parent are reported: the first whose resource and ability both
/// match, else the first one.
#[must_use]
pub fn covered_by(parents: &[&Capability], child: &Capability) -> Vec<ValidationIssue> {
    let Some(first) = parents.first() else {
        return Vec::new();
    };
    if parents.iter().any(|parent| check(parent, child).is_empty()) {
        return Vec::new();
    }

    let closest = parents
        .iter()
        .find(|parent| {
            resource_matches(parent.resource(), child.resource())
                && ability_matches(parent.ability(), child.ability())
        })
        .unwrap_or(first);
    check(closest, child)
}

/// Attenuation findings for every link of `chain`, by position.
///
/// Each link is compared with the links in the chain that its proofs
/// resolved to. Links whose proofs did not resolve are left alone.
#[must_use]
pub fn audit(chain: &Chain) -> Vec<Vec<ValidationIssue>> {
    chain
        .iter()
        .map(|link| {
            let proofs: HashSet<&str> = link.proof_ids().collect();
            let parents: Vec<&Capability> = chain
                .iter()
                .filter(|candidate| proofs.contains(candidate.content_id.as_str()))
                .flat_map(|candidate| candidate.capabilities.iter())
                .collect();

            link.capabilities
                .iter()
                .flat_map(|capability| covered_by(&parents, capability))
                .collect()
        })
        .collect()
}

fn is_subset(child: &[Value], parent: &[Value]) -> bool {
    child.iter().all(|item| parent.contains(item))
}

fn number(value: &Value) -> String {
    match value.as_i64() {
        Some(integer) => integer.to_string(),
        None => value.as_f64().map(|f| f.to_string()).unwrap_or_default(),
    }
}
