//! OAuth flow engine
//!
//! The per-browser session moves through
//! `Anonymous -> Pending(state, code_verifier) -> Exchanging -> Authenticated`
//! and back to `Anonymous` on logout or an unrecoverable failure. None of it
//! is stored here: the cookie jar is the only record, so each function below
//! reads what it needs from the request and writes the next state back as
//! `Set-Cookie` directives.
//!
//! Handlers get everything explicitly (a [`FlowConfig`] and the shared HTTP
//! client) so they can be exercised against stub providers.

use axum::http::{StatusCode, header};
use axum::response::{AppendHeaders, IntoResponse, Response};
use pkce_auth::{
    CREDENTIAL_COOKIE_TTL_SECS, CookieMap, EncryptionKey, OAuthClient, PENDING_COOKIE_TTL_SECS,
    STATE_COOKIE, VERIFIER_COOKIE, build_authorization_url, build_set_cookie, clear_cookie,
    code_challenge, decrypt, encrypt, exchange_code, fetch_profile, generate_state,
    generate_verifier, refresh_access_token, state_matches,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::FlowError;

/// Everything a flow handler needs, validated at startup.
#[derive(Debug)]
pub struct FlowConfig {
    pub oauth: OAuthClient,
    /// Application origin without trailing slash; final redirect target
    pub app_origin: String,
    pub encryption_key: EncryptionKey,
    pub credential_cookie: String,
}

/// Query parameters the provider appends to the callback URL.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set instead of `code` when the user declined or the provider failed
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Where a browser is in the flow, judged from its cookies alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Anonymous,
    Pending,
    Authenticated,
}

impl SessionPhase {
    /// A login in progress takes precedence over an existing credential,
    /// since the callback will replace it.
    pub fn of(cookies: &CookieMap, credential_cookie: &str) -> Self {
        if cookies.get_non_empty(STATE_COOKIE).is_some() {
            SessionPhase::Pending
        } else if cookies.get_non_empty(credential_cookie).is_some() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Anonymous
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Anonymous => "anonymous",
            SessionPhase::Pending => "pending",
            SessionPhase::Authenticated => "authenticated",
        }
    }
}

/// 302 with any number of `Set-Cookie` directives.
fn redirect(location: &str, cookies: Vec<String>) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, location.to_owned())],
        AppendHeaders(cookies.into_iter().map(|c| (header::SET_COOKIE, c))),
    )
        .into_response()
}

/// GET /auth/login: start a PKCE attempt.
///
/// The fresh `state` and verifier go to the browser as 5-minute cookies;
/// the challenge goes to the provider in the redirect URL.
pub fn begin_login(config: &FlowConfig) -> Response {
    let state = generate_state();
    let verifier = generate_verifier();
    let challenge = code_challenge(&verifier);
    let url = build_authorization_url(&config.oauth, &state, &challenge);

    info!("redirecting to provider for authorization");
    redirect(
        url.as_str(),
        vec![
            build_set_cookie(STATE_COOKIE, &state, PENDING_COOKIE_TTL_SECS),
            build_set_cookie(VERIFIER_COOKIE, &verifier, PENDING_COOKIE_TTL_SECS),
        ],
    )
}

/// GET /auth/callback: verify `state`, exchange the code, and store the
/// sealed refresh token.
pub async fn complete_callback(
    config: &FlowConfig,
    http: &reqwest::Client,
    query: &CallbackQuery,
    cookies: &CookieMap,
) -> Result<Response, FlowError> {
    let returned_state = query.state.as_deref().filter(|s| !s.is_empty());
    let expected_state = cookies.get_non_empty(STATE_COOKIE);
    match (returned_state, expected_state) {
        (Some(returned), Some(expected)) if state_matches(returned, expected) => {}
        (returned, expected) => {
            warn!(
                query_state_present = returned.is_some(),
                cookie_state_present = expected.is_some(),
                "callback state check failed"
            );
            return Err(FlowError::InvalidState);
        }
    }

    if let Some(error) = &query.error {
        warn!(
            error = %error,
            description = query.error_description.as_deref().unwrap_or(""),
            "provider returned an authorization error"
        );
    }

    let code = query.code.as_deref().filter(|c| !c.is_empty());
    let verifier = cookies.get_non_empty(VERIFIER_COOKIE);
    let (Some(code), Some(verifier)) = (code, verifier) else {
        return Err(FlowError::MissingCredentials);
    };

    let tokens = exchange_code(http, &config.oauth, code, verifier)
        .await
        .map_err(FlowError::from_exchange)?;

    let refresh_token = tokens
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| FlowError::TokenExchangeFailed {
            status: None,
            body: "token response did not include a refresh_token".into(),
        })?;

    let sealed = encrypt(&refresh_token, &config.encryption_key)
        .map_err(|e| FlowError::Internal(e.to_string()))?;

    info!("authorization code exchanged, credential issued");
    Ok(redirect(
        &config.app_origin,
        vec![
            build_set_cookie(&config.credential_cookie, &sealed, CREDENTIAL_COOKIE_TTL_SECS),
            clear_cookie(STATE_COOKIE),
            clear_cookie(VERIFIER_COOKIE),
        ],
    ))
}

/// GET /api/me: decrypt the credential, refresh, and fetch the profile.
///
/// The profile body is returned exactly as the resource API sent it.
pub async fn fetch_me(
    config: &FlowConfig,
    http: &reqwest::Client,
    cookies: &CookieMap,
) -> Result<Response, FlowError> {
    let sealed = cookies
        .get_non_empty(&config.credential_cookie)
        .ok_or(FlowError::Unauthorized)?;

    let refresh_token =
        decrypt(sealed, &config.encryption_key).map_err(FlowError::from_credential)?;

    let grant = refresh_access_token(http, &config.oauth, &refresh_token)
        .await
        .map_err(FlowError::from_refresh)?;
    debug!(expires_in = ?grant.expires_in, "access token refreshed");

    let profile = fetch_profile(http, &config.oauth, &grant)
        .await
        .map_err(FlowError::from_resource)?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        profile,
    )
        .into_response())
}

/// GET /auth/logout: forget the credential. No provider-side revocation.
pub fn logout(config: &FlowConfig) -> Response {
    info!("credential cleared by logout");
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_owned()),
            (header::SET_COOKIE, clear_cookie(&config.credential_cookie)),
        ],
        "Logged out.",
    )
        .into_response()
}
