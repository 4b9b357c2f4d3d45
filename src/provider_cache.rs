//! Caching layer over credential provider chains.

use crate::chain::{ChainBuilder, IdentityCheck, ProviderChain};
use crate::{CloudCredError, CredentialSet, Identity, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Configuration for a [`CredentialProviderCache`].
///
/// Everything the cache consults is an explicit field here; nothing is read
/// from the ambient environment at call time, so parallel tests with
/// different configurations never interfere.
///
/// ```
/// use cloudcred::CacheConfig;
///
/// let config = CacheConfig::new()
///     .with_default_profile("dev")
///     .with_default_region("us-east-1");
/// assert_eq!(config.default_profile.as_deref(), Some("dev"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Ambient static credentials. When present they win over any profile.
    pub ambient_credentials: Option<CredentialSet>,
    /// Profile used when a call supplies none
    pub default_profile: Option<String>,
    /// Region used when a call supplies none
    pub default_region: Option<String>,
}

impl CacheConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures configuration from process environment variables.
    ///
    /// Static credentials (`AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`,
    /// optionally `AWS_SESSION_TOKEN`) become the ambient credential set;
    /// `AWS_PROFILE` the default profile; `AWS_REGION` falling back to
    /// `AWS_DEFAULT_REGION` the default region. The environment is read once,
    /// here, never again.
    pub fn from_env() -> Self {
        let ambient_credentials = match (
            std::env::var("AWS_ACCESS_KEY_ID"),
            std::env::var("AWS_SECRET_ACCESS_KEY"),
        ) {
            (Ok(key), Ok(secret)) if !key.is_empty() && !secret.is_empty() => {
                let mut creds = CredentialSet::long_lived(key, secret);
                if let Ok(token) = std::env::var("AWS_SESSION_TOKEN") {
                    if !token.is_empty() {
                        creds.session_token = Some(token);
                    }
                }
                Some(creds)
            }
            _ => None,
        };

        Self {
            ambient_credentials,
            default_profile: std::env::var("AWS_PROFILE").ok().filter(|p| !p.is_empty()),
            default_region: std::env::var("AWS_REGION")
                .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
                .ok()
                .filter(|r| !r.is_empty()),
        }
    }

    /// Sets the ambient static credentials.
    pub fn with_ambient_credentials(mut self, credentials: CredentialSet) -> Self {
        self.ambient_credentials = Some(credentials);
        self
    }

    /// Sets the default profile.
    pub fn with_default_profile(mut self, profile: impl Into<String>) -> Self {
        self.default_profile = Some(profile.into());
        self
    }

    /// Sets the default region.
    pub fn with_default_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = Some(region.into());
        self
    }
}

type CacheKey = (Identity, Option<String>);

/// Caches constructed provider chains keyed by `(identity, region)`.
///
/// Chain construction is the expensive step; the chain itself is re-invoked
/// on every [`resolve`](Self::resolve) so the underlying provider decides
/// freshness. An entry whose invocation fails is removed before the error is
/// surfaced, guaranteeing the next call rebuilds from scratch instead of
/// replaying a broken chain.
///
/// Logically concurrent resolves for one key may both observe a miss and both
/// build; the second store wins. Chains are pure with respect to their key,
/// so nothing depends on a single instance existing.
pub struct CredentialProviderCache {
    builder: Arc<dyn ChainBuilder>,
    config: CacheConfig,
    active_profile: RwLock<Option<String>>,
    chains: RwLock<HashMap<CacheKey, Arc<dyn ProviderChain>>>,
}

impl CredentialProviderCache {
    /// Creates a cache over the given chain builder.
    pub fn new(builder: Arc<dyn ChainBuilder>, config: CacheConfig) -> Self {
        Self {
            builder,
            config,
            active_profile: RwLock::new(None),
            chains: RwLock::new(HashMap::new()),
        }
    }

    /// The configured default region, if any.
    pub fn default_region(&self) -> Option<&str> {
        self.config.default_region.as_deref()
    }

    /// Sets (or clears) the active-profile override consulted when a call
    /// supplies no profile of its own.
    pub async fn set_active_profile(&self, profile: Option<String>) {
        *self.active_profile.write().await = profile;
    }

    /// The current active-profile override.
    pub async fn active_profile(&self) -> Option<String> {
        self.active_profile.read().await.clone()
    }

    /// Resolves credentials for an identity.
    ///
    /// Ambient static credentials, when configured, win unconditionally; the
    /// supplied identity is ignored entirely for that call and no chain is
    /// built or invoked. Otherwise the supplied profile is used, falling back
    /// to the active-profile override, then the configured default.
    ///
    /// # Errors
    ///
    /// Returns [`CloudCredError::Authentication`] carrying the effective
    /// identity when chain construction or invocation fails. The failed
    /// entry is already evicted by the time the error is returned.
    pub async fn resolve(
        &self,
        identity: &Identity,
        region: Option<&str>,
    ) -> Result<CredentialSet> {
        if let Some(creds) = &self.config.ambient_credentials {
            if let Identity::Named(profile) = identity {
                debug!(profile = %profile, "ambient static credentials override requested profile");
            }
            return Ok(creds.clone());
        }

        let effective = self.effective_identity(identity).await;
        let region = region
            .map(str::to_string)
            .or_else(|| self.config.default_region.clone());
        let key: CacheKey = (effective.clone(), region.clone());

        let chain = {
            let chains = self.chains.read().await;
            chains.get(&key).cloned()
        };

        let chain = match chain {
            Some(chain) => chain,
            None => {
                debug!(identity = %effective, region = ?region, "constructing provider chain");
                let built = self
                    .builder
                    .build(effective.profile(), region.as_deref())
                    .await
                    .map_err(|e| CloudCredError::authentication(effective.to_string(), e))?;
                let mut chains = self.chains.write().await;
                // A concurrent resolve may have stored its own chain between
                // our miss and this store; last write wins.
                chains.insert(key.clone(), built.clone());
                built
            }
        };

        match chain.credentials().await {
            Ok(creds) => Ok(creds),
            Err(e) => {
                let mut chains = self.chains.write().await;
                chains.remove(&key);
                warn!(identity = %effective, "provider chain failed, entry evicted");
                Err(CloudCredError::authentication(effective.to_string(), e))
            }
        }
    }

    /// Resolves and verifies credentials against the identity-check call.
    ///
    /// A response missing any of account id, principal id, or principal ARN
    /// is treated as failure; an incomplete identity is untrustworthy.
    pub async fn validate(
        &self,
        identity: &Identity,
        region: Option<&str>,
        check: &dyn IdentityCheck,
    ) -> Result<crate::CallerIdentity> {
        let credentials = self.resolve(identity, region).await?;
        let effective = self.effective_identity(identity).await;

        let caller = check
            .caller_identity(&credentials, region.or(self.config.default_region.as_deref()))
            .await
            .map_err(|e| CloudCredError::authentication(effective.to_string(), e))?;

        if !caller.is_complete() {
            return Err(CloudCredError::authentication(
                effective.to_string(),
                anyhow::anyhow!("identity check returned an incomplete caller identity"),
            ));
        }

        Ok(caller)
    }

    /// Drops the cached chain for one `(identity, region)` key.
    pub async fn invalidate(&self, identity: &Identity, region: Option<&str>) {
        let effective = self.effective_identity(identity).await;
        let region = region
            .map(str::to_string)
            .or_else(|| self.config.default_region.clone());
        let mut chains = self.chains.write().await;
        chains.remove(&(effective, region));
    }

    /// Drops every cached chain.
    pub async fn invalidate_all(&self) {
        let mut chains = self.chains.write().await;
        chains.clear();
    }

    async fn effective_identity(&self, identity: &Identity) -> Identity {
        match identity {
            Identity::Named(_) => identity.clone(),
            Identity::Ambient => {
                if let Some(active) = self.active_profile.read().await.clone() {
                    Identity::Named(active)
                } else if let Some(default) = &self.config.default_profile {
                    Identity::Named(default.clone())
                } else {
                    Identity::Ambient
                }
            }
        }
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::chains::mock::{MockChainBuilder, MockIdentityCheck};
    use crate::CallerIdentity;

    fn creds() -> CredentialSet {
        CredentialSet::long_lived("AKIATEST", "secret")
    }

    #[tokio::test]
    async fn test_resolve_builds_chain_once() {
        let builder = Arc::new(MockChainBuilder::new(creds()));
        let cache = CredentialProviderCache::new(builder.clone(), CacheConfig::new());

        let identity = Identity::Named("dev".to_string());
        cache.resolve(&identity, Some("us-east-1")).await.unwrap();
        cache.resolve(&identity, Some("us-east-1")).await.unwrap();

        // One construction, two invocations.
        assert_eq!(builder.build_calls(), 1);
        assert_eq!(builder.chain_calls(), 2);
    }

    #[tokio::test]
    async fn test_distinct_regions_get_distinct_chains() {
        let builder = Arc::new(MockChainBuilder::new(creds()));
        let cache = CredentialProviderCache::new(builder.clone(), CacheConfig::new());

        let identity = Identity::Named("dev".to_string());
        cache.resolve(&identity, Some("us-east-1")).await.unwrap();
        cache.resolve(&identity, Some("eu-west-1")).await.unwrap();

        assert_eq!(builder.build_calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_invocation_evicts_entry() {
        let builder = Arc::new(MockChainBuilder::new(creds()));
        builder.fail_next_invocations(1);
        let cache = CredentialProviderCache::new(builder.clone(), CacheConfig::new());

        let identity = Identity::Named("dev".to_string());
        let err = cache.resolve(&identity, None).await.unwrap_err();
        assert!(matches!(err, CloudCredError::Authentication { .. }));
        assert!(err.to_string().contains("dev"));

        // The broken chain was evicted; the next resolve rebuilds.
        cache.resolve(&identity, None).await.unwrap();
        assert_eq!(builder.build_calls(), 2);
    }

    #[tokio::test]
    async fn test_ambient_credentials_override_profile() {
        let ambient = CredentialSet::long_lived("AKIAAMBIENT", "env-secret");
        let builder = Arc::new(MockChainBuilder::new(creds()));
        let cache = CredentialProviderCache::new(
            builder.clone(),
            CacheConfig::new().with_ambient_credentials(ambient.clone()),
        );

        let resolved = cache
            .resolve(&Identity::Named("some-profile".to_string()), None)
            .await
            .unwrap();

        assert_eq!(resolved, ambient);
        // The chain never saw the profile; it was never even built.
        assert_eq!(builder.build_calls(), 0);
        assert_eq!(builder.chain_calls(), 0);
    }

    #[tokio::test]
    async fn test_ambient_identity_falls_back_to_active_then_default() {
        let builder = Arc::new(MockChainBuilder::new(creds()));
        let cache = CredentialProviderCache::new(
            builder.clone(),
            CacheConfig::new().with_default_profile("default-prof"),
        );

        cache.resolve(&Identity::Ambient, None).await.unwrap();
        assert_eq!(builder.last_profile(), Some("default-prof".to_string()));

        cache.set_active_profile(Some("override-prof".to_string())).await;
        cache.resolve(&Identity::Ambient, None).await.unwrap();
        assert_eq!(builder.last_profile(), Some("override-prof".to_string()));
    }

    #[tokio::test]
    async fn test_default_region_fills_missing_region() {
        let builder = Arc::new(MockChainBuilder::new(creds()));
        let cache = CredentialProviderCache::new(
            builder.clone(),
            CacheConfig::new().with_default_region("ap-southeast-2"),
        );

        cache
            .resolve(&Identity::Named("dev".to_string()), None)
            .await
            .unwrap();
        assert_eq!(builder.last_region(), Some("ap-southeast-2".to_string()));
    }

    #[tokio::test]
    async fn test_invalidate_forces_rebuild() {
        let builder = Arc::new(MockChainBuilder::new(creds()));
        let cache = CredentialProviderCache::new(builder.clone(), CacheConfig::new());
        let identity = Identity::Named("dev".to_string());

        cache.resolve(&identity, None).await.unwrap();
        cache.invalidate(&identity, None).await;
        cache.resolve(&identity, None).await.unwrap();

        assert_eq!(builder.build_calls(), 2);
    }

    #[tokio::test]
    async fn test_validate_rejects_incomplete_identity() {
        let builder = Arc::new(MockChainBuilder::new(creds()));
        let cache = CredentialProviderCache::new(builder, CacheConfig::new());
        let identity = Identity::Named("dev".to_string());

        let check = MockIdentityCheck::new(CallerIdentity {
            account_id: Some("123456789012".to_string()),
            user_id: Some("AIDATEST".to_string()),
            arn: None,
        });

        let err = cache.validate(&identity, None, &check).await.unwrap_err();
        assert!(matches!(err, CloudCredError::Authentication { .. }));
    }

    #[tokio::test]
    async fn test_validate_accepts_complete_identity() {
        let builder = Arc::new(MockChainBuilder::new(creds()));
        let cache = CredentialProviderCache::new(builder, CacheConfig::new());

        let check = MockIdentityCheck::new(CallerIdentity {
            account_id: Some("123456789012".to_string()),
            user_id: Some("AIDATEST".to_string()),
            arn: Some("arn:aws:iam::123456789012:user/dev".to_string()),
        });

        let caller = cache
            .validate(&Identity::Named("dev".to_string()), None, &check)
            .await
            .unwrap();
        assert!(caller.is_complete());
    }
}
