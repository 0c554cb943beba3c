//! UCAN delegation chain inspection.
//!
//! This crate decodes capability-delegation tokens, reconstructs the chain
//! of proofs behind them and reports whether that chain holds up.
//!
//! # Overview
//!
//! Data flows one way:
//!
//! 1. The [`Decoder`] detects the wire format (CAR archive, DAG-CBOR block
//!    or compact token) and produces either a native [`Delegation`] with
//!    its block store, or canonical [`Claims`]
//! 2. The [`Mapper`] turns either into a [`DelegationLink`]
//! 3. The [`Resolver`] walks proof references through the block store and
//!    assembles a [`Chain`]
//! 4. The [`Validator`] checks every link and the attenuation between links
//!
//! Everything happens in memory and nothing outlives a call. Signatures are
//! never checked here; an embedding service may pass a [`Verifier`].
//!
//! # Example
//!
//! ```ignore
//! use dialog_ucan_chain::{Inspector, InspectorConfig};
//!
//! let inspector = Inspector::new(InspectorConfig::default());
//! let result = inspector.validate(&token_bytes, None)?;
//! if let Some(root_cause) = result.root_cause {
//!     eprintln!("{}: {}", root_cause.kind, root_cause.message);
//! }
//! ```

pub mod analysis;
pub mod claims;
pub mod config;
pub mod decoder;
pub mod delegation;
pub mod error;
pub mod link;
pub mod mapper;
pub mod normalize;
pub mod resolver;
pub mod signature;
pub mod store;
pub mod validation;
pub mod value;

pub use analysis::{CapabilityAnalysis, InvocationAnalysis, InvocationReport, Task, TaskType};
pub use claims::Claims;
pub use config::InspectorConfig;
pub use decoder::{Decoded, Decoder, Format, Token};
pub use delegation::Delegation;
pub use error::{DecodeError, ErrorCode, InspectError, ResolveError, ServiceError};
pub use link::{Capability, Category, Chain, DelegationLink, ProofReference};
pub use mapper::Mapper;
pub use normalize::{TextEncoding, normalize};
pub use resolver::Resolver;
pub use signature::{Algorithm, SignatureInfo, Signed, Unverified, Verifier};
pub use validation::{
    ChainLink, IssueKind, RootCause, Severity, ValidationIssue, ValidationResult,
    ValidationSummary, Validator,
};
pub use value::{Value, ValueMap};

use chrono::{DateTime, Utc};

/// Decodes, resolves and validates tokens with one configuration.
///
/// `hint` arguments skip format detection when set.
#[derive(Debug, Clone)]
pub struct Inspector<V = Unverified> {
    config: InspectorConfig,
    verifier: V,
}

impl Inspector<Unverified> {
    /// Creates an inspector that leaves signatures unverified.
    #[must_use]
    pub fn new(config: InspectorConfig) -> Self {
        Self::with_verifier(config, Unverified)
    }
}

impl Default for Inspector<Unverified> {
    fn default() -> Self {
        Self::new(InspectorConfig::default())
    }
}

impl<V: Verifier> Inspector<V> {
    /// Creates an inspector that asks `verifier` about signatures.
    pub fn with_verifier(config: InspectorConfig, verifier: V) -> Self {
        Self { config, verifier }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &InspectorConfig {
        &self.config
    }

    /// Decode `bytes`.
    ///
    /// # Errors
    ///
    /// Any [`DecodeError`].
    pub fn decode(&self, bytes: &[u8], hint: Option<Format>) -> Result<Decoded, InspectError> {
        let decoder = Decoder::new(&self.config);
        Ok(match hint {
            Some(format) => decoder.decode_as(format, bytes)?,
            None => decoder.decode(bytes)?,
        })
    }

    /// Decode `bytes` into the link of the presented token.
    ///
    /// # Errors
    ///
    /// Any [`DecodeError`].
    pub fn parse(&self, bytes: &[u8], hint: Option<Format>) -> Result<DelegationLink, InspectError> {
        let decoded = self.decode(bytes, hint)?;
        Ok(self.mapper().map(&decoded, 0))
    }

    /// Decode `bytes` and resolve its proof chain.
    ///
    /// # Errors
    ///
    /// Any [`DecodeError`] or [`ResolveError`].
    pub fn chain(&self, bytes: &[u8], hint: Option<Format>) -> Result<Chain, InspectError> {
        let decoded = self.decode(bytes, hint)?;
        Ok(Resolver::new(&self.config, self.mapper()).resolve(&decoded)?)
    }

    /// Decode, resolve and validate `bytes` against the current time.
    ///
    /// # Errors
    ///
    /// Any [`DecodeError`] or [`ResolveError`]. Validation findings are part
    /// of the result, never errors.
    pub fn validate(
        &self,
        bytes: &[u8],
        hint: Option<Format>,
    ) -> Result<ValidationResult, InspectError> {
        self.validate_at(bytes, hint, Utc::now())
    }

    /// Decode, resolve and validate `bytes` as of `now`.
    ///
    /// # Errors
    ///
    /// See [`Inspector::validate`].
    pub fn validate_at(
        &self,
        bytes: &[u8],
        hint: Option<Format>,
        now: DateTime<Utc>,
    ) -> Result<ValidationResult, InspectError> {
        let chain = self.chain(bytes, hint)?;
        Ok(Validator::new(&self.config).validate_at(&chain, now))
    }

    /// Decode `bytes` and analyze it as an invocation.
    ///
    /// # Errors
    ///
    /// Any [`DecodeError`].
    pub fn analyze(
        &self,
        bytes: &[u8],
        hint: Option<Format>,
    ) -> Result<InvocationReport, InspectError> {
        Ok(InvocationReport::new(self.parse(bytes, hint)?))
    }

    fn mapper(&self) -> Mapper<'_> {
        Mapper::new(&self.verifier)
    }
}
