//! Federated SSO token cache inspection.
//!
//! An external browser login flow writes bearer tokens to a cache directory,
//! one JSON file per session. This module only ever reads (and, for
//! [`TokenCacheReader::purge_expired`], deletes) those files; it never
//! creates or refreshes them.

use crate::{CloudCredError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// One parsed token cache file.
///
/// File names are opaque; the start URL is the identifying key. Files missing
/// any of the required fields fail deserialization and are skipped by the
/// reader, never surfaced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    /// Bearer token presented to the cloud API
    pub access_token: String,
    /// Absolute expiry instant
    pub expires_at: DateTime<Utc>,
    /// SSO portal the token was issued by; join key to profiles
    pub start_url: String,
    /// Issuing region
    #[serde(default)]
    pub region: Option<String>,
    /// OIDC client id, when the login flow recorded one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// OIDC client secret, when the login flow recorded one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

/// A token record plus point-in-time validity facts.
///
/// The derived fields are computed fresh for every query and must not be
/// stored; they are stale the moment they are read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    /// The underlying record
    pub record: TokenRecord,
    /// True while the expiry lies in the future
    pub is_valid: bool,
    /// True once remaining life is at or below the warning threshold.
    ///
    /// Expired tokens are near-expiry too; reporting relies on the subset
    /// relation, so this is deliberately not a disjoint state.
    pub is_near_expiry: bool,
    /// Signed remaining life; negative once expired
    pub time_until_expiry: Duration,
}

impl TokenInfo {
    /// Classifies a record against `now` and a warning threshold.
    pub fn classify(record: TokenRecord, now: DateTime<Utc>, threshold: Duration) -> Self {
        let remaining = record.expires_at - now;
        Self {
            is_valid: remaining > Duration::zero(),
            is_near_expiry: remaining <= threshold,
            time_until_expiry: remaining,
            record,
        }
    }
}

/// Per-profile token status, as shown by `sso status`-style commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStatus {
    /// Profile name the status was requested for
    pub profile: String,
    /// The matching session token, if one is cached
    pub token: Option<TokenInfo>,
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.token {
            None => write!(f, "{}: no token", self.profile),
            Some(info) if !info.is_valid => write!(f, "{}: expired", self.profile),
            Some(info) if info.is_near_expiry => write!(
                f,
                "{}: valid, expires in {}m",
                self.profile,
                info.time_until_expiry.num_minutes()
            ),
            Some(_) => write!(f, "{}: valid", self.profile),
        }
    }
}

/// Reads and classifies cached SSO tokens.
///
/// The cache directory is externally written and may change under the reader
/// at any time; a file appearing, disappearing, or being rewritten mid-read
/// degrades to an ordinary per-file parse failure and is skipped. A missing
/// directory means SSO simply is not in use and every query returns empty
/// results.
///
/// # Example
///
/// ```no_run
/// use cloudcred::TokenCacheReader;
///
/// #[tokio::main]
/// async fn main() -> cloudcred::Result<()> {
///     let reader = TokenCacheReader::new("/home/u/.cloud/sso/cache");
///     for token in reader.list_tokens().await? {
///         println!("{} valid={}", token.record.start_url, token.is_valid);
///     }
///     Ok(())
/// }
/// ```
pub struct TokenCacheReader {
    cache_dir: PathBuf,
    warning_threshold: Duration,
}

impl TokenCacheReader {
    /// Creates a reader over the given cache directory with the default
    /// 15-minute near-expiry warning threshold.
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            warning_threshold: Duration::minutes(15),
        }
    }

    /// Overrides the near-expiry warning threshold.
    pub fn with_warning_threshold(mut self, threshold: Duration) -> Self {
        self.warning_threshold = threshold;
        self
    }

    /// Lists every well-formed cached token, classified against now.
    ///
    /// # Errors
    ///
    /// Returns [`CloudCredError::TokenCache`] only when the directory itself
    /// cannot be read (permissions, disk error). A missing directory yields
    /// an empty list; a corrupt file is skipped.
    pub async fn list_tokens(&self) -> Result<Vec<TokenInfo>> {
        let now = Utc::now();
        let records = self.scan().await?;
        Ok(records
            .into_iter()
            .map(|(_, r)| TokenInfo::classify(r, now, self.warning_threshold))
            .collect())
    }

    /// Finds the cached token for an SSO portal by exact start URL.
    ///
    /// Multiple profiles may share one session; the start URL is the join key.
    pub async fn find_token(&self, start_url: &str) -> Result<Option<TokenInfo>> {
        let now = Utc::now();
        let records = self.scan().await?;
        Ok(records
            .into_iter()
            .map(|(_, r)| r)
            .find(|r| r.start_url == start_url)
            .map(|r| TokenInfo::classify(r, now, self.warning_threshold)))
    }

    /// Reports token status for a profile.
    ///
    /// Without a start URL there is nothing to join on, so the status is
    /// "no token".
    pub async fn status_for(
        &self,
        profile: &str,
        start_url: Option<&str>,
    ) -> Result<TokenStatus> {
        let token = match start_url {
            Some(url) => self.find_token(url).await?,
            None => None,
        };
        Ok(TokenStatus {
            profile: profile.to_string(),
            token,
        })
    }

    /// Lists tokens at or past the warning threshold, expired ones included.
    pub async fn expiring(&self, threshold_override: Option<Duration>) -> Result<Vec<TokenInfo>> {
        let threshold = threshold_override.unwrap_or(self.warning_threshold);
        let now = Utc::now();
        let records = self.scan().await?;
        Ok(records
            .into_iter()
            .map(|(_, r)| TokenInfo::classify(r, now, threshold))
            .filter(|info| info.is_near_expiry)
            .collect())
    }

    /// Deletes cache files whose token has expired and returns how many were
    /// removed.
    ///
    /// A file the external login flow already removed counts as purged; any
    /// other per-file deletion failure is skipped like a parse failure.
    pub async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let records = self.scan().await?;
        let mut purged = 0;

        for (path, record) in records {
            if record.expires_at > now {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => purged += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => purged += 1,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "could not remove expired token file");
                }
            }
        }

        Ok(purged)
    }

    /// Enumerates the directory and parses every readable, well-formed file.
    async fn scan(&self) -> Result<Vec<(PathBuf, TokenRecord)>> {
        let mut entries = match fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CloudCredError::token_cache(
                    self.cache_dir.display().to_string(),
                    e,
                ))
            }
        };

        let mut records = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(CloudCredError::token_cache(
                        self.cache_dir.display().to_string(),
                        e,
                    ))
                }
            };

            let path = entry.path();
            let data = match fs::read(&path).await {
                Ok(data) => data,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unreadable cache file");
                    continue;
                }
            };

            match serde_json::from_slice::<TokenRecord>(&data) {
                Ok(record) => records.push((path, record)),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping malformed cache file");
                }
            }
        }

        Ok(records)
    }
}
