//! Proof chain resolution.
//!
//! Proofs are walked depth first with an explicit stack, so a hostile proof
//! graph fails with a [`ResolveError`] instead of exhausting the call stack.
//! Links appear in discovery order: a link is followed directly by its own
//! proofs, in the order they are listed.

use ipld_core::cid::Cid;
use tracing::{debug, trace, warn};

use crate::{
    config::InspectorConfig,
    decoder::Decoded,
    delegation::Delegation,
    error::ResolveError,
    link::Chain,
    mapper::Mapper,
    store::Blocks,
};

/// Materializes [`Chain`]s from decoded tokens.
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    mapper: Mapper<'a>,
    max_depth: usize,
    max_links: usize,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver with the limits from `config`.
    pub fn new(config: &InspectorConfig, mapper: Mapper<'a>) -> Self {
        Self {
            mapper,
            max_depth: config.max_chain_depth,
            max_links: config.max_chain_links,
        }
    }

    /// Resolve the chain of a decoded token.
    ///
    /// Only archives carry proofs that can be resolved; every other token
    /// yields a chain of one link.
    ///
    /// # Errors
    ///
    /// See [`Resolver::resolve_delegation`].
    pub fn resolve(&self, decoded: &Decoded) -> Result<Chain, ResolveError> {
        match decoded {
            Decoded::Archive(archive) => self.resolve_delegation(&archive.root, &archive.store),
            Decoded::Token(token) => Ok(Chain::from(self.mapper.map_token(token, 0))),
        }
    }

    /// Resolve `root` and its proofs against `blocks`.
    ///
    /// Proofs that are missing from `blocks` or do not decode are left out.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::ChainTooDeep`] when a proof sits deeper than the
    ///   depth limit.
    /// - [`ResolveError::ChainTooLarge`] when the chain grows past the link
    ///   limit.
    pub fn resolve_delegation<B: Blocks + ?Sized>(
        &self,
        root: &Delegation,
        blocks: &B,
    ) -> Result<Chain, ResolveError> {
        let mut chain = Chain::from(self.mapper.map_delegation(root, 0));
        let mut pending: Vec<(Cid, usize)> = Vec::new();
        schedule(&mut pending, root, 1);

        while let Some((cid, level)) = pending.pop() {
            let bytes = match blocks.require(&cid) {
                Ok(bytes) => bytes,
                Err(error) => {
                    trace!(%error, level, "dropping unresolvable proof");
                    continue;
                }
            };
            let delegation = match Delegation::decode(cid, bytes) {
                Ok(delegation) => delegation,
                Err(error) => {
                    trace!(%cid, %error, level, "dropping undecodable proof");
                    continue;
                }
            };

            if level > self.max_depth {
                warn!(%cid, level, max = self.max_depth, "proof chain too deep");
                return Err(ResolveError::ChainTooDeep {
                    depth: level,
                    max: self.max_depth,
                });
            }
            if chain.len() >= self.max_links {
                warn!(links = chain.len() + 1, max = self.max_links, "proof chain too large");
                return Err(ResolveError::ChainTooLarge {
                    links: chain.len() + 1,
                    max: self.max_links,
                });
            }

            schedule(&mut pending, &delegation, level + 1);
            chain.push(self.mapper.map_delegation(&delegation, level));
        }

        debug!(links = chain.len(), "resolved proof chain");
        Ok(chain)
    }
}

/// Push the proofs of `delegation` so that the first listed is popped first.
fn schedule(pending: &mut Vec<(Cid, usize)>, delegation: &Delegation, level: usize) {
    pending.extend(delegation.proofs().into_iter().rev().map(|cid| (cid, level)));
}
