//! Per-request flow errors and their HTTP mapping
//!
//! Every failure in the login, callback, and profile routes ends up here and
//! is turned into a status code at the route boundary. Errors that put the
//! stored credential in doubt also delete the credential cookie, so a broken
//! session can never outlive the request that discovered it.

use axum::http::{StatusCode, header};
use axum::response::{AppendHeaders, IntoResponse, Response};
use pkce_auth::clear_cookie;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum FlowError {
    /// Query `state` missing, cookie `state` missing, or the two differ
    #[error("state parameter missing or does not match")]
    InvalidState,

    /// Callback without `code`, or without the `code_verifier` cookie
    #[error("authorization code or code verifier missing")]
    MissingCredentials,

    /// Provider rejected the code exchange. `status` is the provider's own
    /// status when it answered; `None` for unusable success responses.
    #[error("token exchange failed (status {status:?}): {body}")]
    TokenExchangeFailed { status: Option<u16>, body: String },

    /// No credential cookie on a protected route
    #[error("no credential cookie")]
    Unauthorized,

    #[error("credential cookie is malformed: {0}")]
    MalformedCredential(String),

    #[error("credential cookie failed authentication")]
    DecryptionFailed,

    #[error("refresh token exchange failed: {0}")]
    RefreshFailed(String),

    #[error("profile fetch failed: {0}")]
    ResourceFetchFailed(String),

    #[error("upstream timed out: {0}")]
    UpstreamTimeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FlowError {
    pub fn status(&self) -> StatusCode {
        match self {
            FlowError::InvalidState | FlowError::MissingCredentials => StatusCode::BAD_REQUEST,
            FlowError::TokenExchangeFailed { status, .. } => status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            FlowError::Unauthorized => StatusCode::UNAUTHORIZED,
            FlowError::MalformedCredential(_)
            | FlowError::DecryptionFailed
            | FlowError::RefreshFailed(_)
            | FlowError::ResourceFetchFailed(_)
            | FlowError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FlowError::UpstreamTimeout(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Whether the credential cookie must be deleted when this error ends a
    /// request that used it.
    pub fn clears_credential(&self) -> bool {
        matches!(
            self,
            FlowError::MalformedCredential(_)
                | FlowError::DecryptionFailed
                | FlowError::RefreshFailed(_)
                | FlowError::ResourceFetchFailed(_)
                | FlowError::UpstreamTimeout(_)
        )
    }

    /// Short label for logs and the `error_type` metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            FlowError::InvalidState => "invalid_state",
            FlowError::MissingCredentials => "missing_credentials",
            FlowError::TokenExchangeFailed { .. } => "token_exchange_failed",
            FlowError::Unauthorized => "unauthorized",
            FlowError::MalformedCredential(_) => "malformed_credential",
            FlowError::DecryptionFailed => "decryption_failed",
            FlowError::RefreshFailed(_) => "refresh_failed",
            FlowError::ResourceFetchFailed(_) => "resource_fetch_failed",
            FlowError::UpstreamTimeout(_) => "upstream_timeout",
            FlowError::Internal(_) => "internal",
        }
    }

    /// Body text shown to the browser. Upstream detail is only echoed for a
    /// rejected code exchange; everything else stays generic.
    fn body(&self) -> String {
        match self {
            FlowError::InvalidState => "Invalid state.".into(),
            FlowError::MissingCredentials => "Missing code or verifier.".into(),
            FlowError::TokenExchangeFailed { body, .. } => format!("Token exchange failed: {body}"),
            FlowError::Unauthorized => "Unauthorized.".into(),
            FlowError::UpstreamTimeout(_) => "Upstream timed out.".into(),
            _ => "An error occurred.".into(),
        }
    }

    /// Build the HTTP response. When `credential_cookie` is given and the
    /// error puts the credential in doubt, the response deletes that cookie.
    pub fn into_response_clearing(self, credential_cookie: Option<&str>) -> Response {
        let clear = credential_cookie
            .filter(|_| self.clears_credential())
            .map(|name| (header::SET_COOKIE, clear_cookie(name)));

        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            AppendHeaders(clear),
            self.body(),
        )
            .into_response()
    }

    /// Map a code exchange failure.
    pub fn from_exchange(err: pkce_auth::Error) -> Self {
        match err {
            pkce_auth::Error::TokenEndpoint { status, body } => FlowError::TokenExchangeFailed {
                status: Some(status),
                body,
            },
            pkce_auth::Error::Timeout(msg) => FlowError::UpstreamTimeout(msg),
            other => {
                // Transport detail (URLs, resolver errors) stays in the log.
                warn!(error = %other, "code exchange did not reach the provider");
                FlowError::TokenExchangeFailed {
                    status: None,
                    body: "provider request failed".into(),
                }
            }
        }
    }

    /// Map a credential decryption failure.
    pub fn from_credential(err: pkce_auth::Error) -> Self {
        match err {
            pkce_auth::Error::MalformedCredential(reason) => {
                FlowError::MalformedCredential(reason.to_owned())
            }
            pkce_auth::Error::DecryptionFailed => FlowError::DecryptionFailed,
            other => FlowError::Internal(other.to_string()),
        }
    }

    /// Map a refresh-token grant failure.
    pub fn from_refresh(err: pkce_auth::Error) -> Self {
        match err {
            pkce_auth::Error::Timeout(msg) => FlowError::UpstreamTimeout(msg),
            other => FlowError::RefreshFailed(other.to_string()),
        }
    }

    /// Map a profile fetch failure.
    pub fn from_resource(err: pkce_auth::Error) -> Self {
        match err {
            pkce_auth::Error::Timeout(msg) => FlowError::UpstreamTimeout(msg),
            other => FlowError::ResourceFetchFailed(other.to_string()),
        }
    }
}

impl IntoResponse for FlowError {
    fn into_response(self) -> Response {
        self.into_response_clearing(None)
    }
}
