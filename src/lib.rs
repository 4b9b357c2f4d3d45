//! Cloudcred - credential and SSO token lifecycle for cloud-management CLIs.
//!
//! Every command a cloud CLI runs sits on top of the same four pieces, and
//! this crate is those pieces:
//!
//! - **Token cache inspection**: [`TokenCacheReader`] reads the SSO token
//!   files an external browser login flow leaves on disk and classifies
//!   validity and time-to-expiry.
//! - **Provider caching**: [`CredentialProviderCache`] memoizes constructed
//!   credential provider chains per `(identity, region)` and evicts broken
//!   entries so a failure never replays.
//! - **Retry**: [`retry::RetryPolicy`] wraps any outbound call in bounded
//!   exponential backoff with jitter.
//! - **Client factory**: [`ClientFactory`] is the composition root service
//!   modules depend on; none of them touch the credential chain directly.
//!
//! # Quick Start
//!
//! ```no_run
//! use cloudcred::{CacheConfig, ClientConfig, ClientFactory, ClientKind, CredentialSet};
//! use cloudcred::chains::mock::MockChainBuilder;
//! use cloudcred::retry::RetryPolicy;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> cloudcred::Result<()> {
//!     let builder = Arc::new(MockChainBuilder::new(CredentialSet::long_lived("key", "secret")));
//!     let factory = ClientFactory::new(builder, CacheConfig::from_env());
//!
//!     let client = factory
//!         .get_client(
//!             ClientKind::Functions,
//!             &ClientConfig::new().with_profile("dev").with_region("us-east-1"),
//!         )
//!         .await?;
//!
//!     let policy: RetryPolicy<cloudcred::CloudCredError> = RetryPolicy::new(3);
//!     let region = policy
//!         .invoke(|| async { Ok(client.region().to_string()) })
//!         .await?;
//!     println!("calling {}", region);
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! | Feature | Default | Provides |
//! |---------|---------|----------|
//! | `mock` | yes | Deterministic stubs with error injection and call counts |
//! | `aws` | no | SDK-backed chain builder and STS identity check |
//!
//! Real SDK wiring stays behind the `aws` feature so library consumers and
//! tests build without the SDK dependency tree.

pub mod chain;
pub mod chains;
pub mod client;
pub mod error;
pub mod identity;
pub mod provider_cache;
pub mod retry;
pub mod token_cache;

pub use chain::{ChainBuilder, IdentityCheck, ProviderChain};
pub use client::{ApiClient, ClientConfig, ClientFactory, ClientKind};
pub use error::{CloudCredError, Result};
pub use identity::{CallerIdentity, CredentialSet, Identity};
pub use provider_cache::{CacheConfig, CredentialProviderCache};
pub use retry::{FailureClass, RetryPolicy};
pub use token_cache::{TokenCacheReader, TokenInfo, TokenRecord, TokenStatus};
