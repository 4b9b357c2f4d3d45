//! Error types for credential and token operations.

use std::error::Error as StdError;
use thiserror::Error;

/// Result type alias using [`CloudCredError`].
pub type Result<T> = std::result::Result<T, CloudCredError>;

/// Errors that can occur in the credential/token subsystem.
///
/// All errors implement `std::error::Error` and can be chained with `source()`.
/// Per-file parse failures inside the token cache never surface here; they are
/// recovered where they occur.
#[derive(Debug, Error)]
pub enum CloudCredError {
    /// An identity could not be resolved or validated.
    #[error("authentication failed for {identity}: {source}")]
    Authentication {
        /// The identity that failed to resolve ("ambient" when no profile)
        identity: String,
        /// Underlying error
        #[source]
        source: anyhow::Error,
    },

    /// The token cache directory itself could not be read.
    ///
    /// Distinct from a single malformed cache file, which is skipped silently.
    #[error("token cache unreadable at {path}: {source}")]
    TokenCache {
        /// Cache directory path
        path: String,
        /// Underlying error
        #[source]
        source: anyhow::Error,
    },

    /// A client could not be built for the requested resource kind.
    #[error("cannot construct {kind} client: {source}")]
    ClientConstruction {
        /// The client kind that failed (e.g. "compute", "logs")
        kind: String,
        /// Underlying error
        #[source]
        source: anyhow::Error,
    },

    /// Other error (catch-all).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CloudCredError {
    /// Creates an authentication error carrying the identity that failed.
    pub fn authentication(
        identity: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Authentication {
            identity: identity.into(),
            source: source.into(),
        }
    }

    /// Creates a token cache error for a directory-level read failure.
    pub fn token_cache(path: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::TokenCache {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Creates a client construction error naming the failing kind.
    pub fn client_construction(
        kind: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::ClientConstruction {
            kind: kind.into(),
            source: source.into(),
        }
    }
}

/// Renders an error for display at the subsystem boundary.
///
/// The one-line form comes from the variant's `Display`. In verbose mode the
/// full chain of causes is appended, one per line, so nothing below the top
/// error is lost.
///
/// # Example
///
/// ```
/// use cloudcred::error::{render, CloudCredError};
///
/// let err = CloudCredError::authentication("dev", anyhow::anyhow!("no such profile"));
/// assert_eq!(render(&err, false), "authentication failed for dev: no such profile");
/// assert!(render(&err, true).contains("caused by: no such profile"));
/// ```
pub fn render(err: &CloudCredError, verbose: bool) -> String {
    // Exhaustive so a new variant cannot slip past the boundary unformatted.
    let headline = match err {
        CloudCredError::Authentication { .. }
        | CloudCredError::TokenCache { .. }
        | CloudCredError::ClientConstruction { .. }
        | CloudCredError::Other(_) => err.to_string(),
    };

    if !verbose {
        return headline;
    }

    let mut out = headline;
    let mut cause = err.source();
    while let Some(c) = cause {
        out.push_str("\n  caused by: ");
        out.push_str(&c.to_string());
        cause = c.source();
    }
    out
}
