//! OAuth client registration and provider endpoints

use std::time::Duration;

use common::Secret;
use reqwest::Url;

use crate::constants::{AUTHORIZE_ENDPOINT, DEFAULT_SCOPE, PROFILE_ENDPOINT, TOKEN_ENDPOINT};
use crate::error::{Error, Result};

/// The three upstream URLs the gateway talks to.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub authorize: Url,
    pub token: Url,
    pub profile: Url,
}

impl ProviderEndpoints {
    /// Parse and validate endpoint URLs. Only `http` and `https` are accepted.
    pub fn parse(authorize: &str, token: &str, profile: &str) -> Result<Self> {
        Ok(Self {
            authorize: parse_endpoint(authorize)?,
            token: parse_endpoint(token)?,
            profile: parse_endpoint(profile)?,
        })
    }

    /// Microsoft identity platform and Microsoft Graph.
    pub fn microsoft() -> Self {
        Self::parse(AUTHORIZE_ENDPOINT, TOKEN_ENDPOINT, PROFILE_ENDPOINT)
            .expect("built-in provider endpoints are valid URLs")
    }
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self::microsoft()
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::InvalidEndpoint {
        url: raw.to_owned(),
        reason: e.to_string(),
    })?;
    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(Error::InvalidEndpoint {
            url: raw.to_owned(),
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    Ok(url)
}

/// Everything needed to speak to the provider on behalf of this application.
///
/// `timeout` bounds every individual upstream call; nothing is retried.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// Absolute callback URL registered with the provider
    pub redirect_uri: String,
    /// Space-separated scopes, requested at login and reused on refresh
    pub scope: String,
    pub endpoints: ProviderEndpoints,
    pub timeout: Duration,
}

impl OAuthClient {
    /// Client with the default scope and provider endpoints.
    pub fn new(client_id: String, client_secret: Secret<String>, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            scope: DEFAULT_SCOPE.to_owned(),
            endpoints: ProviderEndpoints::default(),
            timeout: Duration::from_secs(10),
        }
    }
}
