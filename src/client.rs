//! Client factory: the composition root every service module goes through.
//!
//! Service modules never touch the credential chain directly; they ask the
//! factory for a configured [`ApiClient`] and wrap each outbound call with
//! [`RetryPolicy::invoke`](crate::retry::RetryPolicy::invoke).

use crate::chain::ChainBuilder;
use crate::provider_cache::{CacheConfig, CredentialProviderCache};
use crate::{CloudCredError, CredentialSet, Identity, Result};
use std::str::FromStr;
use std::sync::Arc;

/// The resource domains the CLI can build clients for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKind {
    /// Virtual machine fleet management
    Compute,
    /// Serverless function management
    Functions,
    /// Container orchestration
    Containers,
    /// Key-value table storage
    KeyValueTables,
    /// Configuration parameter store
    ParameterStore,
    /// Log aggregation
    Logs,
}

impl std::fmt::Display for ClientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compute => write!(f, "compute"),
            Self::Functions => write!(f, "functions"),
            Self::Containers => write!(f, "containers"),
            Self::KeyValueTables => write!(f, "kv-tables"),
            Self::ParameterStore => write!(f, "parameter-store"),
            Self::Logs => write!(f, "logs"),
        }
    }
}

impl FromStr for ClientKind {
    type Err = CloudCredError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "compute" => Ok(Self::Compute),
            "functions" => Ok(Self::Functions),
            "containers" => Ok(Self::Containers),
            "kv-tables" => Ok(Self::KeyValueTables),
            "parameter-store" => Ok(Self::ParameterStore),
            "logs" => Ok(Self::Logs),
            other => Err(CloudCredError::client_construction(
                other,
                anyhow::anyhow!("unsupported client kind"),
            )),
        }
    }
}

/// Per-client configuration overrides.
///
/// ```
/// use cloudcred::ClientConfig;
///
/// let config = ClientConfig::new()
///     .with_profile("dev")
///     .with_region("us-west-2")
///     .with_endpoint("https://localhost:4566");
/// assert_eq!(config.region.as_deref(), Some("us-west-2"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Profile to resolve credentials for; `None` means ambient
    pub profile: Option<String>,
    /// Region override; falls back to the cache's default region
    pub region: Option<String>,
    /// Explicit endpoint override (testing, private link)
    pub endpoint: Option<String>,
}

impl ClientConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the profile.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Sets the region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets the endpoint override.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

/// A configured API client for one resource domain.
///
/// Carries resolved credentials plus the explicit region/endpoint the call
/// sites need; the wire protocol itself lives with the service modules.
#[derive(Debug, Clone)]
pub struct ApiClient {
    kind: ClientKind,
    credentials: CredentialSet,
    region: String,
    endpoint: Option<String>,
}

impl ApiClient {
    /// The resource domain this client serves.
    pub fn kind(&self) -> ClientKind {
        self.kind
    }

    /// The resolved credentials.
    pub fn credentials(&self) -> &CredentialSet {
        &self.credentials
    }

    /// The region calls are signed for.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// The endpoint override, if any.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }
}

/// Builds configured API clients.
///
/// The factory owns its [`CredentialProviderCache`]; its lifetime is the
/// caller's to control and two factories never share cached chains.
///
/// # Example
///
/// ```no_run
/// use cloudcred::{CacheConfig, ClientConfig, ClientFactory, ClientKind};
/// use cloudcred::chains::mock::MockChainBuilder;
/// use cloudcred::CredentialSet;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> cloudcred::Result<()> {
///     let builder = Arc::new(MockChainBuilder::new(CredentialSet::long_lived("k", "s")));
///     let factory = ClientFactory::new(builder, CacheConfig::from_env());
///
///     let client = factory
///         .get_client(ClientKind::Logs, &ClientConfig::new().with_region("us-east-1"))
///         .await?;
///     assert_eq!(client.region(), "us-east-1");
///     Ok(())
/// }
/// ```
pub struct ClientFactory {
    cache: CredentialProviderCache,
}

impl ClientFactory {
    /// Creates a factory over the given chain builder and configuration.
    pub fn new(builder: Arc<dyn ChainBuilder>, config: CacheConfig) -> Self {
        Self {
            cache: CredentialProviderCache::new(builder, config),
        }
    }

    /// The provider cache this factory owns.
    ///
    /// Exposed for explicit invalidation and for `validate`-style commands.
    pub fn provider_cache(&self) -> &CredentialProviderCache {
        &self.cache
    }

    /// Builds a client of the requested kind.
    ///
    /// # Errors
    ///
    /// - [`CloudCredError::Authentication`] when credential resolution fails.
    /// - [`CloudCredError::ClientConstruction`] naming the kind when the
    ///   configuration is malformed (no region anywhere, non-HTTP endpoint).
    ///   Nothing is silently defaulted.
    pub async fn get_client(&self, kind: ClientKind, config: &ClientConfig) -> Result<ApiClient> {
        let identity = Identity::from_profile(config.profile.as_deref());
        let credentials = self.cache.resolve(&identity, config.region.as_deref()).await?;

        let region = config
            .region
            .clone()
            .or_else(|| self.cache.default_region().map(str::to_string))
            .ok_or_else(|| {
                CloudCredError::client_construction(
                    kind.to_string(),
                    anyhow::anyhow!("no region supplied and no default configured"),
                )
            })?;

        if let Some(endpoint) = &config.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(CloudCredError::client_construction(
                    kind.to_string(),
                    anyhow::anyhow!("endpoint override is not an http(s) URL: {endpoint}"),
                ));
            }
        }

        Ok(ApiClient {
            kind,
            credentials,
            region,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_kind_display_roundtrip() {
        for kind in [
            ClientKind::Compute,
            ClientKind::Functions,
            ClientKind::Containers,
            ClientKind::KeyValueTables,
            ClientKind::ParameterStore,
            ClientKind::Logs,
        ] {
            assert_eq!(kind.to_string().parse::<ClientKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unsupported_kind_is_a_construction_error() {
        let err = "blockchain".parse::<ClientKind>().unwrap_err();
        assert!(matches!(err, CloudCredError::ClientConstruction { .. }));
        assert!(err.to_string().contains("blockchain"));
    }
}

#[cfg(all(test, feature = "mock"))]
mod factory_tests {
    use super::*;
    use crate::chains::mock::MockChainBuilder;

    fn factory_with(config: CacheConfig) -> (Arc<MockChainBuilder>, ClientFactory) {
        let builder = Arc::new(MockChainBuilder::new(CredentialSet::long_lived(
            "AKIATEST", "secret",
        )));
        let factory = ClientFactory::new(builder.clone(), config);
        (builder, factory)
    }

    #[tokio::test]
    async fn test_get_client_carries_overrides() {
        let (_, factory) = factory_with(CacheConfig::new());
        let client = factory
            .get_client(
                ClientKind::KeyValueTables,
                &ClientConfig::new()
                    .with_profile("dev")
                    .with_region("eu-central-1")
                    .with_endpoint("https://localhost:4566"),
            )
            .await
            .unwrap();

        assert_eq!(client.kind(), ClientKind::KeyValueTables);
        assert_eq!(client.region(), "eu-central-1");
        assert_eq!(client.endpoint(), Some("https://localhost:4566"));
        assert_eq!(client.credentials().access_key_id, "AKIATEST");
    }

    #[tokio::test]
    async fn test_get_client_requires_some_region() {
        let (_, factory) = factory_with(CacheConfig::new());
        let err = factory
            .get_client(ClientKind::Compute, &ClientConfig::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CloudCredError::ClientConstruction { .. }));
        assert!(err.to_string().contains("compute"));
    }

    #[tokio::test]
    async fn test_get_client_falls_back_to_default_region() {
        let (_, factory) = factory_with(CacheConfig::new().with_default_region("us-east-2"));
        let client = factory
            .get_client(ClientKind::Logs, &ClientConfig::new())
            .await
            .unwrap();
        assert_eq!(client.region(), "us-east-2");
    }

    #[tokio::test]
    async fn test_get_client_rejects_malformed_endpoint() {
        let (_, factory) = factory_with(CacheConfig::new());
        let err = factory
            .get_client(
                ClientKind::Functions,
                &ClientConfig::new()
                    .with_region("us-east-1")
                    .with_endpoint("localhost:4566"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CloudCredError::ClientConstruction { .. }));
        assert!(err.to_string().contains("functions"));
    }

    #[tokio::test]
    async fn test_factory_reuses_cached_chain() {
        let (builder, factory) = factory_with(CacheConfig::new());
        let config = ClientConfig::new().with_profile("dev").with_region("us-east-1");

        factory.get_client(ClientKind::Compute, &config).await.unwrap();
        factory.get_client(ClientKind::Logs, &config).await.unwrap();

        assert_eq!(builder.build_calls(), 1);
    }
}
