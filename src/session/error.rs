//! Error types for the INLabs session.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while logging in or fetching bundles.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The HTTP client could not be constructed.
    #[error("cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Network-level error (DNS, connection refused/reset, TLS).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The request URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The request URL.
        url: String,
    },

    /// A configured or derived URL does not parse.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// No session cookie is held, so no bundle may be requested.
    #[error(
        "no INLabs session cookie; check the e-mail and password\n  Suggestion: log in again or verify the credentials on the portal"
    )]
    NotAuthenticated,

    /// The portal refused a bundle request made with the session cookie.
    #[error("[AUTH] session rejected (HTTP {status}) requesting {url}")]
    AuthRejected {
        /// The request URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// A bundle could not be written to disk.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl SessionError {
    /// Creates a network error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid-URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Maps a failed `send()` into a timeout or network error.
    pub(crate) fn from_request(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::timeout(url)
        } else {
            Self::network(url, error)
        }
    }
}
