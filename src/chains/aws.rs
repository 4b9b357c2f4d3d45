//! AWS SDK adapters for the capability seams.
//!
//! `SdkChainBuilder` constructs the SDK's default provider chain (env, shared
//! config/credentials files, SSO, IMDS) for a profile/region pair;
//! `StsIdentityCheck` performs the minimal `GetCallerIdentity` call used by
//! credential validation.

use crate::chain::{ChainBuilder, IdentityCheck, ProviderChain};
use crate::{CallerIdentity, CredentialSet, Result};
use async_trait::async_trait;
use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_config::Region;
use aws_sdk_sts::config::ProvideCredentials;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Provider chain backed by the SDK's default credentials chain.
pub struct SdkChain {
    chain: DefaultCredentialsChain,
}

#[async_trait]
impl ProviderChain for SdkChain {
    async fn credentials(&self) -> Result<CredentialSet> {
        let creds = self
            .chain
            .provide_credentials()
            .await
            .map_err(|e| anyhow::anyhow!(e).context("sdk credential chain"))?;

        Ok(CredentialSet {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().map(str::to_string),
            expires_at: creds.expiry().map(DateTime::<Utc>::from),
        })
    }
}

/// Builds [`SdkChain`]s.
///
/// Chain construction loads shared config files and is the step worth
/// memoizing; the built chain is cheap to re-invoke and the SDK refreshes
/// expiring credentials internally.
#[derive(Debug, Clone, Default)]
pub struct SdkChainBuilder;

#[async_trait]
impl ChainBuilder for SdkChainBuilder {
    async fn build(
        &self,
        profile: Option<&str>,
        region: Option<&str>,
    ) -> Result<Arc<dyn ProviderChain>> {
        let mut builder = DefaultCredentialsChain::builder();
        if let Some(profile) = profile {
            builder = builder.profile_name(profile);
        }
        if let Some(region) = region {
            builder = builder.region(Region::new(region.to_string()));
        }

        Ok(Arc::new(SdkChain {
            chain: builder.build().await,
        }))
    }
}

/// `GetCallerIdentity` over the STS SDK.
#[derive(Debug, Clone, Default)]
pub struct StsIdentityCheck;

#[async_trait]
impl IdentityCheck for StsIdentityCheck {
    async fn caller_identity(
        &self,
        credentials: &CredentialSet,
        region: Option<&str>,
    ) -> Result<CallerIdentity> {
        let sdk_creds = aws_sdk_sts::config::Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            credentials.session_token.clone(),
            None,
            "cloudcred",
        );

        let mut config = aws_sdk_sts::config::Builder::new()
            .behavior_version(aws_sdk_sts::config::BehaviorVersion::latest())
            .credentials_provider(sdk_creds);
        if let Some(region) = region {
            config = config.region(aws_sdk_sts::config::Region::new(region.to_string()));
        }

        let client = aws_sdk_sts::Client::from_conf(config.build());
        let output = client
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(e).context("sts get-caller-identity"))?;

        Ok(CallerIdentity {
            account_id: output.account().map(str::to_string),
            user_id: output.user_id().map(str::to_string),
            arn: output.arn().map(str::to_string),
        })
    }
}
