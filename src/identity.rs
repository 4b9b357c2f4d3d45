//! Identity and credential data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The identity a call runs as: a named profile, or whatever the ambient
/// environment provides.
///
/// Immutable for the duration of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Identity {
    /// A locally-configured, named profile.
    Named(String),
    /// No profile selected; the ambient credential chain decides.
    #[default]
    Ambient,
}

impl Identity {
    /// Creates an identity from an optional profile name.
    pub fn from_profile(profile: Option<&str>) -> Self {
        match profile {
            Some(name) => Self::Named(name.to_string()),
            None => Self::Ambient,
        }
    }

    /// Returns the profile name, if any.
    pub fn profile(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Ambient => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{}", name),
            Self::Ambient => write!(f, "ambient"),
        }
    }
}

/// Temporary secret material presented to the cloud API.
///
/// A refresh produces a new `CredentialSet`; an existing one is never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialSet {
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Session token, present for temporary credentials
    pub session_token: Option<String>,
    /// Absolute expiry, absent for long-lived keys
    pub expires_at: Option<DateTime<Utc>>,
}

impl CredentialSet {
    /// Creates a long-lived credential set (no session token, no expiry).
    pub fn long_lived(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            expires_at: None,
        }
    }

    /// Creates a temporary credential set with a session token and expiry.
    pub fn temporary(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: Some(session_token.into()),
            expires_at: Some(expires_at),
        }
    }
}

// Secrets never reach logs, even through {:?}.
impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Raw response of the minimal identity-check call.
///
/// Fields are optional because the wire allows omitting them; callers that
/// need a trustworthy identity must reject any incomplete response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Account id
    pub account_id: Option<String>,
    /// Principal (user) id
    pub user_id: Option<String>,
    /// Principal ARN
    pub arn: Option<String>,
}

impl CallerIdentity {
    /// True when every field the check requires is present.
    pub fn is_complete(&self) -> bool {
        self.account_id.is_some() && self.user_id.is_some() && self.arn.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_profile() {
        assert_eq!(
            Identity::from_profile(Some("dev")),
            Identity::Named("dev".to_string())
        );
        assert_eq!(Identity::from_profile(None), Identity::Ambient);
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(Identity::Named("prod".into()).to_string(), "prod");
        assert_eq!(Identity::Ambient.to_string(), "ambient");
    }

    #[test]
    fn test_credentials_debug_redacts_secrets() {
        let creds = CredentialSet::temporary("AKIAEXAMPLE", "s3cr3t", "session-tok", Utc::now());
        let dump = format!("{:?}", creds);
        assert!(dump.contains("AKIAEXAMPLE"));
        assert!(!dump.contains("s3cr3t"));
        assert!(!dump.contains("session-tok"));
    }

    #[test]
    fn test_caller_identity_completeness() {
        let full = CallerIdentity {
            account_id: Some("123456789012".into()),
            user_id: Some("AIDAEXAMPLE".into()),
            arn: Some("arn:aws:iam::123456789012:user/dev".into()),
        };
        assert!(full.is_complete());

        let partial = CallerIdentity {
            arn: None,
            ..full
        };
        assert!(!partial.is_complete());
    }
}
