//! Validating decoded chains end to end.

mod common;

use common::{Grant, archive, car, statement};
use dialog_ucan_chain::{
    Category, InspectError, Inspector, InspectorConfig, IssueKind, Severity, TaskType,
    ValidationResult,
};
use ipld_core::ipld::Ipld;
use pretty_assertions::assert_eq;
use testresult::TestResult;

fn inspector() -> Inspector {
    Inspector::new(InspectorConfig::default())
}

/// Validate `child` presented with `parent` as its only proof.
fn delegate(parent: Grant, child: Grant) -> Result<ValidationResult, InspectError> {
    delegate_with(InspectorConfig::default(), parent, child)
}

fn delegate_with(
    config: InspectorConfig,
    parent: Grant,
    child: Grant,
) -> Result<ValidationResult, InspectError> {
    let (parent_cid, parent_block) = parent.block();
    let (child_cid, child_block) = child.proof(parent_cid).block();
    let archive = car(
        child_cid,
        &[(child_cid, child_block), (parent_cid, parent_block)],
    );
    Inspector::new(config).validate(&archive, None)
}

fn kinds(result: &ValidationResult, level: usize) -> Vec<IssueKind> {
    result.chain[level]
        .issues
        .iter()
        .filter(|issue| issue.severity == Severity::Error)
        .map(|issue| issue.kind)
        .collect()
}

#[test_log::test]
fn it_rejects_expired_delegations() -> TestResult {
    let grant = Grant::new("alice", "bob").expires_in(-24 * 60 * 60);
    let result = inspector().validate(&archive(&grant), None)?;

    assert!(!result.valid);
    let root_cause = result.root_cause.ok_or("no root cause")?;
    assert_eq!(root_cause.kind, IssueKind::Expired);
    assert!(root_cause.message.starts_with("UCAN expired"));
    assert_eq!(root_cause.link.issuer, "did:key:alice");
    assert_eq!(result.summary.invalid_links, 1);
    Ok(())
}

#[test]
fn it_warns_about_delegations_expiring_soon() -> TestResult {
    let grant = Grant::new("alice", "bob").expires_in(12 * 60 * 60);
    let result = inspector().validate(&archive(&grant), None)?;

    assert!(result.valid);
    assert_eq!(result.root_cause, None);
    assert_eq!(result.chain[0].issues[0].kind, IssueKind::ExpiringSoon);
    assert_eq!(result.summary.warning_count, 1);
    Ok(())
}

#[test]
fn it_accepts_a_healthy_chain() -> TestResult {
    let result = delegate(
        Grant::new("alice", "bob").capability("storage:*", "store/*"),
        Grant::new("bob", "carol").capability("storage:alice/photos", "store/add"),
    )?;

    assert!(result.valid);
    assert_eq!(result.summary.total_links, 2);
    assert_eq!(result.summary.valid_links, 2);
    assert_eq!(result.chain[0].issues[0].kind, IssueKind::HasProofs);
    Ok(())
}

#[test_log::test]
fn it_catches_resource_widening() -> TestResult {
    let result = delegate(
        Grant::new("alice", "bob").capability("storage:alice/*", "store/add"),
        Grant::new("bob", "carol").capability("storage:bob/photos", "store/add"),
    )?;

    assert!(!result.valid);
    assert_eq!(kinds(&result, 0), vec![IssueKind::ResourceMismatch]);
    assert!(kinds(&result, 1).is_empty());

    let root_cause = result.root_cause.ok_or("no root cause")?;
    assert_eq!(root_cause.kind, IssueKind::ResourceMismatch);
    assert_eq!(root_cause.link.issuer, "did:key:bob");
    assert_eq!(root_cause.link.audience, "did:key:carol");
    Ok(())
}

#[test]
fn it_catches_ability_escalation() -> TestResult {
    let result = delegate(
        Grant::new("alice", "bob").capability("storage:alice", "store/add"),
        Grant::new("bob", "carol").capability("storage:alice", "store/remove"),
    )?;

    assert!(!result.valid);
    assert_eq!(kinds(&result, 0), vec![IssueKind::CapabilityEscalation]);
    Ok(())
}

#[test]
fn it_catches_caveat_escalation() -> TestResult {
    let result = delegate(
        Grant::new("alice", "bob").caveat("size", Ipld::Integer(1024)),
        Grant::new("bob", "carol").caveat("size", Ipld::Integer(4096)),
    )?;

    assert!(!result.valid);
    assert_eq!(kinds(&result, 0), vec![IssueKind::CaveatEscalation]);
    assert_eq!(
        result.chain[0].issues.last().map(|issue| issue.message.as_str()),
        Some("Child size limit (4096) exceeds parent (1024)")
    );
    Ok(())
}

/// Validate a `sub/cmd/pol` chain of envelopes: `child` presented with
/// `parent` as its proof.
fn delegate_policy(parent: Grant, child: Grant) -> Result<ValidationResult, InspectError> {
    let (parent_cid, parent_block) = parent.sealed();
    let (child_cid, child_block) = child.proof(parent_cid).sealed();
    let archive = car(
        child_cid,
        &[(child_cid, child_block), (parent_cid, parent_block)],
    );
    inspector().validate(&archive, None)
}

fn command(issuer: &str, audience: &str) -> Grant {
    Grant::new(issuer, audience).capability("did:key:space", "/storage/put")
}

#[test_log::test]
fn it_accepts_policies_that_add_statements() -> TestResult {
    let size = statement("<", ".size", Ipld::Integer(100));
    let kind = statement("==", ".type", Ipld::Integer(1));
    let result = delegate_policy(
        command("alice", "bob").policy(vec![size.clone()]),
        command("bob", "carol").policy(vec![size, kind]),
    )?;

    assert_eq!(result.summary.total_links, 2);
    assert!(kinds(&result, 0).is_empty());
    assert!(result.valid);
    Ok(())
}

#[test]
fn it_catches_policies_that_drop_statements() -> TestResult {
    let size = statement("<", ".size", Ipld::Integer(100));
    let kind = statement("==", ".type", Ipld::Integer(1));
    let result = delegate_policy(
        command("alice", "bob").policy(vec![size, kind.clone()]),
        command("bob", "carol").policy(vec![kind]),
    )?;

    assert!(!result.valid);
    assert_eq!(kinds(&result, 0), vec![IssueKind::CaveatEscalation]);
    Ok(())
}

#[test]
fn it_rejects_expirations_before_any_representable_date() -> TestResult {
    let mut grant = Grant::new("alice", "bob");
    grant.expiration = Some(-1_000_000_000_000_000);
    let result = inspector().validate(&archive(&grant), None)?;

    assert!(!result.valid);
    assert!(result.chain[0].expiration.is_some());
    assert_eq!(kinds(&result, 0), vec![IssueKind::Expired]);
    Ok(())
}

#[test]
fn it_skips_the_audit_when_disabled() -> TestResult {
    let config = InspectorConfig {
        audit_attenuation: false,
        ..InspectorConfig::default()
    };
    let result = delegate_with(
        config,
        Grant::new("alice", "bob").capability("storage:alice", "store/add"),
        Grant::new("bob", "carol").capability("storage:bob", "store/remove"),
    )?;

    assert!(result.valid);
    Ok(())
}

#[test]
fn it_pins_the_root_cause_closest_to_the_presented_token() -> TestResult {
    let result = delegate(
        Grant::new("alice", "bob").expires_in(-60 * 60),
        Grant::new("bob", "carol").capability("storage:alice", "store/remove"),
    )?;

    assert_eq!(kinds(&result, 1), vec![IssueKind::Expired]);
    let root_cause = result.root_cause.ok_or("no root cause")?;
    assert_eq!(root_cause.kind, IssueKind::CapabilityEscalation);
    assert_eq!(root_cause.link.issuer, "did:key:bob");
    assert_eq!(result.summary.invalid_links, 2);
    Ok(())
}

#[test]
fn it_serializes_results() -> TestResult {
    let grant = Grant::new("alice", "bob").expires_in(-60);
    let result = inspector().validate(&archive(&grant), None)?;
    let json = serde_json::to_value(&result)?;

    assert_eq!(json["valid"], false);
    assert_eq!(json["rootCause"]["type"], "expired");
    assert_eq!(json["rootCause"]["link"]["issuer"], "did:key:alice");
    assert_eq!(json["chain"][0]["issues"][0]["severity"], "error");
    assert_eq!(json["summary"]["totalLinks"], 1);
    Ok(())
}

#[test]
fn it_analyzes_invocations() -> TestResult {
    let token = Grant::new("alice", "worker")
        .capability("did:web:worker", "task/execute")
        .caveat("size", Ipld::Integer(10))
        .compact();
    let report = inspector().analyze(token.as_bytes(), None)?;

    assert!(report.is_invocation);
    assert_eq!(report.invocation_analysis.task_type, TaskType::Invocation);
    assert_eq!(report.invocation_analysis.invoke_patterns, vec!["task/execute"]);
    assert_eq!(report.capability_analysis.invoke_count, 1);
    assert!(
        report
            .capability_analysis
            .categories
            .contains_key(&Category::Invocation)
    );

    let task = report.task.ok_or("no task")?;
    assert_eq!(task.action, "task/execute");
    assert_eq!(task.resource, "did:web:worker");
    assert_eq!(task.target, "did:key:worker");
    assert!(task.constraints.contains_key("size"));
    Ok(())
}

#[test]
fn it_analyzes_plain_delegations() -> TestResult {
    let report = inspector().analyze(&archive(&Grant::new("alice", "bob")), None)?;

    assert_eq!(report.invocation_analysis.task_type, TaskType::Delegation);
    assert_eq!(report.invocation_analysis.primary_action, "store/add");
    assert_eq!(report.capability_analysis.delegate_count, 1);
    assert_eq!(report.capability_analysis.permissions, vec!["store/add"]);
    Ok(())
}
