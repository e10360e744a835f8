//! Error types for credential handling and provider calls

/// Errors from the crypto primitives and the provider HTTP client.
///
/// Credential errors (`MalformedCredential`, `DecryptionFailed`) are kept
/// apart from transport errors so a tampered cookie is never mistaken for a
/// flaky network.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed credential: {0}")]
    MalformedCredential(&'static str),

    #[error("credential decryption failed")]
    DecryptionFailed,

    #[error("credential encryption failed")]
    Encryption,

    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("invalid provider endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("upstream request timed out: {0}")]
    Timeout(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token endpoint returned {status}: {body}")]
    TokenEndpoint { status: u16, body: String },

    #[error("resource endpoint returned {status}: {body}")]
    Resource { status: u16, body: String },

    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Classify a reqwest failure, separating timeouts from other transport errors.
    pub(crate) fn transport(context: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(format!("{context}: {err}"))
        } else {
            Error::Http(format!("{context}: {err}"))
        }
    }

    /// True for errors caused by the upstream not answering in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
