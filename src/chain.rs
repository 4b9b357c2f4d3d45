//! Capability seams between the cache and the real credential machinery.
//!
//! Production wires these to the cloud SDK (see the `aws` feature);
//! tests wire them to deterministic stubs (see the `mock` feature).

use crate::{CallerIdentity, CredentialSet, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// A constructed provider chain that can produce credentials.
///
/// Resolution may be slow (file reads, network round-trips) and fallible.
/// Implementations must be `Send + Sync`; the cache shares them across
/// logically concurrent callers.
#[async_trait]
pub trait ProviderChain: Send + Sync {
    /// Resolves a fresh credential set.
    async fn credentials(&self) -> Result<CredentialSet>;
}

impl std::fmt::Debug for dyn ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn ProviderChain")
    }
}

/// Builds provider chains.
///
/// Construction is the expensive step the provider cache memoizes; the built
/// chain is then re-invoked on every access. `profile` of `None` means the
/// ambient chain.
#[async_trait]
pub trait ChainBuilder: Send + Sync {
    /// Constructs a chain for the given profile and region.
    async fn build(
        &self,
        profile: Option<&str>,
        region: Option<&str>,
    ) -> Result<Arc<dyn ProviderChain>>;
}

/// The minimal identity-check call.
///
/// Used only by credential validation; a response missing any field is
/// rejected by the caller, not here.
#[async_trait]
pub trait IdentityCheck: Send + Sync {
    /// Asks the cloud who these credentials belong to.
    async fn caller_identity(
        &self,
        credentials: &CredentialSet,
        region: Option<&str>,
    ) -> Result<CallerIdentity>;
}
