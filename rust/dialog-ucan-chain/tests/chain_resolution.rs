//! Resolving proof chains out of archives.

mod common;

use common::{Grant, car, cid};
use dialog_ucan_chain::{InspectError, Inspector, InspectorConfig, ResolveError};
use pretty_assertions::assert_eq;
use testresult::TestResult;

fn inspector() -> Inspector {
    Inspector::new(InspectorConfig::default())
}

#[test_log::test]
fn it_resolves_a_two_link_chain() -> TestResult {
    let (ab, ab_block) = Grant::new("alice", "bob").block();
    let (bc, bc_block) = Grant::new("bob", "carol").proof(ab).block();
    let archive = car(bc, &[(bc, bc_block), (ab, ab_block)]);

    let chain = inspector().chain(&archive, None)?;
    assert_eq!(chain.len(), 2);

    let presented = chain.find(&bc.to_string()).ok_or("missing B to C")?;
    let proof = chain.find(&ab.to_string()).ok_or("missing A to B")?;
    assert_eq!(presented.issuer, "did:key:bob");
    assert_eq!(proof.issuer, "did:key:alice");
    assert!(proof.level > presented.level);
    assert_eq!(chain.root().map(|link| link.level), Some(0));
    Ok(())
}

#[test]
fn it_keeps_discovery_order() -> TestResult {
    let (root, root_block) = Grant::new("root", "a").block();
    let (left, left_block) = Grant::new("a", "b").proof(root).block();
    let (right, right_block) = Grant::new("root", "b").block();
    let (top, top_block) = Grant::new("b", "c").proof(left).proof(right).block();
    let archive = car(
        top,
        &[
            (right, right_block),
            (root, root_block),
            (top, top_block),
            (left, left_block),
        ],
    );

    let chain = inspector().chain(&archive, None)?;
    let order: Vec<(String, usize)> = chain
        .iter()
        .map(|link| (link.content_id.clone(), link.level))
        .collect();
    assert_eq!(
        order,
        vec![
            (top.to_string(), 0),
            (left.to_string(), 1),
            (root.to_string(), 2),
            (right.to_string(), 1),
        ]
    );
    Ok(())
}

#[test_log::test]
fn it_drops_proofs_missing_from_the_archive() -> TestResult {
    let missing = cid(b"never shipped");
    let (bc, bc_block) = Grant::new("bob", "carol").proof(missing).block();
    let archive = car(bc, &[(bc, bc_block)]);

    let chain = inspector().chain(&archive, None)?;
    assert_eq!(chain.len(), 1);
    assert_eq!(chain.links()[0].issuer, "did:key:bob");
    assert_eq!(chain.links()[0].proofs[0].cid, missing.to_string());
    Ok(())
}

#[test]
fn it_fails_closed_past_the_depth_limit() -> TestResult {
    let mut blocks = Vec::new();
    let (mut tip, block) = Grant::new("p0", "p1").block();
    blocks.push((tip, block));
    for n in 1..6 {
        let (next, block) = Grant::new(&format!("p{n}"), &format!("p{}", n + 1))
            .proof(tip)
            .block();
        blocks.push((next, block));
        tip = next;
    }
    let archive = car(tip, &blocks);

    let config = InspectorConfig {
        max_chain_depth: 3,
        ..InspectorConfig::default()
    };
    let result = Inspector::new(config).chain(&archive, None);
    assert_eq!(
        result,
        Err(InspectError::Resolve(ResolveError::ChainTooDeep { depth: 4, max: 3 }))
    );

    assert_eq!(inspector().chain(&archive, None)?.len(), 6);
    Ok(())
}

#[test]
fn it_treats_compact_tokens_as_single_links() -> TestResult {
    let (ab, _) = Grant::new("alice", "bob").block();
    let token = Grant::new("bob", "carol").proof(ab).compact();

    let chain = inspector().chain(token.as_bytes(), None)?;
    assert_eq!(chain.len(), 1);
    assert_eq!(chain.links()[0].proofs.len(), 1);
    assert_eq!(chain.links()[0].proofs[0].cid, ab.to_string());
    Ok(())
}
