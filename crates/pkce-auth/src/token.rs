//! Provider token endpoint and profile resource calls
//!
//! Three upstream interactions, none of them retried:
//! 1. Authorization code exchange (callback, one-time `code`)
//! 2. Refresh token grant (every `/api/me`)
//! 3. Profile fetch with the fresh bearer token
//!
//! Both grants POST form-encoded bodies to the token endpoint and include
//! the client secret (confidential web client).

use std::fmt;

use serde::Deserialize;
use tracing::debug;

use crate::client::OAuthClient;
use crate::error::{Error, Result};

/// Token endpoint response for both grants.
///
/// Every field is optional at the wire level; callers decide which ones they
/// require (the callback needs `refresh_token`, a refresh needs
/// `access_token`).
#[derive(Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// A short-lived access token, held only for the duration of one request.
pub struct AccessGrant {
    pub access_token: String,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

const REDACTED: &str = "[REDACTED]";

fn redact(token: &Option<String>) -> Option<&'static str> {
    token.as_ref().map(|_| REDACTED)
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .finish()
    }
}

impl fmt::Debug for AccessGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessGrant")
            .field("access_token", &REDACTED)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Exchange an authorization code for tokens.
///
/// A non-2xx answer becomes [`Error::TokenEndpoint`] carrying the
/// provider's status and body so the caller can surface them unchanged.
pub async fn exchange_code(
    http: &reqwest::Client,
    client: &OAuthClient,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse> {
    let response = http
        .post(client.endpoints.token.clone())
        .timeout(client.timeout)
        .form(&[
            ("client_id", client.client_id.as_str()),
            ("scope", client.scope.as_str()),
            ("code", code),
            ("redirect_uri", client.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
            ("code_verifier", verifier),
            ("client_secret", client.client_secret.expose().as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::transport("token exchange request failed", e))?;

    let tokens = read_token_response(response, "token exchange").await?;
    debug!(
        has_refresh_token = tokens.refresh_token.is_some(),
        "authorization code exchanged"
    );
    Ok(tokens)
}

/// Trade a refresh token for a fresh access token.
pub async fn refresh_access_token(
    http: &reqwest::Client,
    client: &OAuthClient,
    refresh_token: &str,
) -> Result<AccessGrant> {
    let response = http
        .post(client.endpoints.token.clone())
        .timeout(client.timeout)
        .form(&[
            ("client_id", client.client_id.as_str()),
            ("scope", client.scope.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
            ("client_secret", client.client_secret.expose().as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::transport("token refresh request failed", e))?;

    let tokens = read_token_response(response, "token refresh").await?;
    let access_token = tokens
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::InvalidResponse("refresh response has no access_token".into()))?;

    Ok(AccessGrant {
        access_token,
        expires_in: tokens.expires_in,
        scope: tokens.scope,
    })
}

/// Fetch the user's profile document with a bearer token.
///
/// Returns the body text unchanged after checking it parses as JSON.
pub async fn fetch_profile(
    http: &reqwest::Client,
    client: &OAuthClient,
    grant: &AccessGrant,
) -> Result<String> {
    let response = http
        .get(client.endpoints.profile.clone())
        .timeout(client.timeout)
        .bearer_auth(&grant.access_token)
        .send()
        .await
        .map_err(|e| Error::transport("profile request failed", e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::transport("reading profile response", e))?;

    if !status.is_success() {
        return Err(Error::Resource {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str::<serde_json::Value>(&body)
        .map_err(|e| Error::InvalidResponse(format!("profile is not JSON: {e}")))?;
    Ok(body)
}

async fn read_token_response(response: reqwest::Response, context: &str) -> Result<TokenResponse> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(context, e))?;
        return Err(Error::TokenEndpoint {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(format!("{context}: {e}"))
            } else {
                Error::InvalidResponse(format!("{context}: {e}"))
            }
        })
}
