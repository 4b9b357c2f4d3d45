//! Deterministic stubs for the capability seams.
//!
//! These carry error injection and call counting so tests can assert not
//! just what was returned but how many times the expensive construction and
//! resolution steps ran.

use crate::chain::{ChainBuilder, IdentityCheck, ProviderChain};
use crate::{CallerIdentity, CloudCredError, CredentialSet, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A chain that always yields the same credential set.
pub struct StaticChain {
    credentials: CredentialSet,
}

impl StaticChain {
    /// Creates a chain around a fixed credential set.
    pub fn new(credentials: CredentialSet) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl ProviderChain for StaticChain {
    async fn credentials(&self) -> Result<CredentialSet> {
        Ok(self.credentials.clone())
    }
}

/// Counting chain handed out by [`MockChainBuilder`].
///
/// Shares its failure countdown and call counter with the builder, so a
/// rebuilt chain continues the same injected failure schedule.
pub struct MockChain {
    credentials: CredentialSet,
    fail_remaining: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ProviderChain for MockChain {
    async fn credentials(&self) -> Result<CredentialSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CloudCredError::Other(anyhow::anyhow!(
                "injected chain failure"
            )));
        }

        Ok(self.credentials.clone())
    }
}

/// Chain builder stub with error injection and call recording.
///
/// # Example
///
/// ```
/// use cloudcred::chains::mock::MockChainBuilder;
/// use cloudcred::chain::{ChainBuilder, ProviderChain};
/// use cloudcred::CredentialSet;
///
/// #[tokio::main]
/// async fn main() -> cloudcred::Result<()> {
///     let builder = MockChainBuilder::new(CredentialSet::long_lived("k", "s"));
///     let chain = builder.build(Some("dev"), Some("us-east-1")).await?;
///     chain.credentials().await?;
///
///     assert_eq!(builder.build_calls(), 1);
///     assert_eq!(builder.chain_calls(), 1);
///     assert_eq!(builder.last_profile(), Some("dev".to_string()));
///     Ok(())
/// }
/// ```
pub struct MockChainBuilder {
    credentials: CredentialSet,
    /// Error message to return from `build()`, if set
    pub build_error: RwLock<Option<String>>,
    fail_remaining: Arc<AtomicUsize>,
    builds: AtomicUsize,
    chain_calls: Arc<AtomicUsize>,
    last_args: std::sync::Mutex<Option<(Option<String>, Option<String>)>>,
}

impl MockChainBuilder {
    /// Creates a builder whose chains yield the given credentials.
    pub fn new(credentials: CredentialSet) -> Self {
        Self {
            credentials,
            build_error: RwLock::new(None),
            fail_remaining: Arc::new(AtomicUsize::new(0)),
            builds: AtomicUsize::new(0),
            chain_calls: Arc::new(AtomicUsize::new(0)),
            last_args: std::sync::Mutex::new(None),
        }
    }

    /// Makes the next `n` chain invocations fail, across rebuilds.
    pub fn fail_next_invocations(&self, n: usize) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// How many times `build()` ran.
    pub fn build_calls(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// How many times any built chain was invoked.
    pub fn chain_calls(&self) -> usize {
        self.chain_calls.load(Ordering::SeqCst)
    }

    /// The profile the most recent `build()` received.
    pub fn last_profile(&self) -> Option<String> {
        self.last_args
            .lock()
            .expect("mock lock poisoned")
            .as_ref()
            .and_then(|(profile, _)| profile.clone())
    }

    /// The region the most recent `build()` received.
    pub fn last_region(&self) -> Option<String> {
        self.last_args
            .lock()
            .expect("mock lock poisoned")
            .as_ref()
            .and_then(|(_, region)| region.clone())
    }
}

#[async_trait]
impl ChainBuilder for MockChainBuilder {
    async fn build(
        &self,
        profile: Option<&str>,
        region: Option<&str>,
    ) -> Result<Arc<dyn ProviderChain>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        *self.last_args.lock().expect("mock lock poisoned") =
            Some((profile.map(str::to_string), region.map(str::to_string)));

        if let Some(msg) = self.build_error.read().await.clone() {
            return Err(CloudCredError::Other(anyhow::anyhow!(msg)));
        }

        Ok(Arc::new(MockChain {
            credentials: self.credentials.clone(),
            fail_remaining: self.fail_remaining.clone(),
            calls: self.chain_calls.clone(),
        }))
    }
}

/// Identity-check stub returning a canned caller identity.
pub struct MockIdentityCheck {
    identity: CallerIdentity,
    /// Error message to return instead of the identity, if set
    pub check_error: RwLock<Option<String>>,
    calls: AtomicUsize,
}

impl MockIdentityCheck {
    /// Creates a check that answers with the given identity.
    pub fn new(identity: CallerIdentity) -> Self {
        Self {
            identity,
            check_error: RwLock::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// How many times the check ran.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityCheck for MockIdentityCheck {
    async fn caller_identity(
        &self,
        _credentials: &CredentialSet,
        _region: Option<&str>,
    ) -> Result<CallerIdentity> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(msg) = self.check_error.read().await.clone() {
            return Err(CloudCredError::Other(anyhow::anyhow!(msg)));
        }

        Ok(self.identity.clone())
    }
}
