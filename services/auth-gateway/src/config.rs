//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client secret and the cookie encryption key are loaded from the
//! CLIENT_SECRET / ENCRYPTION_KEY env vars or from `*_file` paths, never
//! stored in the TOML directly to avoid leaking secrets.
//!
//! Everything is validated once in [`Config::load`]; handlers only ever see
//! the resulting [`FlowConfig`].

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::resolve_secret;
use pkce_auth::{
    AUTHORIZE_ENDPOINT, DEFAULT_CREDENTIAL_COOKIE, DEFAULT_SCOPE, EncryptionKey, OAuthClient,
    PROFILE_ENDPOINT, ProviderEndpoints, STATE_COOKIE, TOKEN_ENDPOINT, VERIFIER_COOKIE,
};
use reqwest::Url;
use serde::Deserialize;

use crate::flow::FlowConfig;

/// Env var holding the OAuth client secret
pub const CLIENT_SECRET_ENV: &str = "CLIENT_SECRET";

/// Env var holding the cookie encryption key
pub const ENCRYPTION_KEY_ENV: &str = "ENCRYPTION_KEY";

/// Raw TOML layout
#[derive(Debug, Deserialize)]
struct FileConfig {
    gateway: GatewaySection,
    oauth: OAuthSection,
    #[serde(default)]
    provider: ProviderSection,
}

#[derive(Debug, Deserialize)]
struct GatewaySection {
    listen_addr: SocketAddr,
    /// Public origin of the application, e.g. `https://app.example.com`
    app_origin: String,
    #[serde(default = "default_timeout")]
    upstream_timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    max_connections: usize,
    /// Separate listener for /health and /metrics; disabled when absent
    #[serde(default)]
    admin_listen_addr: Option<SocketAddr>,
}

#[derive(Debug, Deserialize)]
struct OAuthSection {
    client_id: String,
    #[serde(default)]
    client_secret_file: Option<PathBuf>,
    #[serde(default)]
    encryption_key_file: Option<PathBuf>,
    #[serde(default = "default_scope")]
    scope: String,
    #[serde(default = "default_credential_cookie")]
    credential_cookie: String,
}

/// Upstream endpoints. The defaults are the Microsoft identity platform;
/// overriding them is meant for national clouds and test doubles.
#[derive(Debug, Deserialize)]
struct ProviderSection {
    #[serde(default = "default_authorize_endpoint")]
    authorize_endpoint: String,
    #[serde(default = "default_token_endpoint")]
    token_endpoint: String,
    #[serde(default = "default_profile_endpoint")]
    profile_endpoint: String,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            authorize_endpoint: default_authorize_endpoint(),
            token_endpoint: default_token_endpoint(),
            profile_endpoint: default_profile_endpoint(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}

fn default_max_connections() -> usize {
    1000
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_owned()
}

fn default_credential_cookie() -> String {
    DEFAULT_CREDENTIAL_COOKIE.to_owned()
}

fn default_authorize_endpoint() -> String {
    AUTHORIZE_ENDPOINT.to_owned()
}

fn default_token_endpoint() -> String {
    TOKEN_ENDPOINT.to_owned()
}

fn default_profile_endpoint() -> String {
    PROFILE_ENDPOINT.to_owned()
}

/// Validated runtime configuration
#[derive(Debug)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub admin_listen_addr: Option<SocketAddr>,
    pub max_connections: usize,
    pub flow: FlowConfig,
}

impl Config {
    /// Load configuration from a TOML file, then resolve secrets from the
    /// environment or their files.
    ///
    /// Secret resolution order (each):
    /// 1. env var (CLIENT_SECRET / ENCRYPTION_KEY)
    /// 2. `oauth.client_secret_file` / `oauth.encryption_key_file`
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| common::Error::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig = toml::from_str(&contents)?;
        Self::from_file(file)
    }

    fn from_file(file: FileConfig) -> common::Result<Self> {
        let app_origin = validate_origin(&file.gateway.app_origin)?;

        if file.gateway.upstream_timeout_secs == 0 {
            return Err(common::Error::Config(
                "upstream_timeout_secs must be greater than 0".into(),
            ));
        }

        if file.gateway.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        let client_id = file.oauth.client_id.trim().to_owned();
        if client_id.is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }

        validate_cookie_name(&file.oauth.credential_cookie)?;

        let endpoints = ProviderEndpoints::parse(
            &file.provider.authorize_endpoint,
            &file.provider.token_endpoint,
            &file.provider.profile_endpoint,
        )
        .map_err(|e| common::Error::Config(e.to_string()))?;

        let client_secret =
            resolve_secret(CLIENT_SECRET_ENV, file.oauth.client_secret_file.as_deref())?
                .ok_or(common::Error::MissingSecret {
                    name: "client_secret",
                    env_var: CLIENT_SECRET_ENV,
                    file_key: "oauth.client_secret_file",
                })?;

        let key_text =
            resolve_secret(ENCRYPTION_KEY_ENV, file.oauth.encryption_key_file.as_deref())?
                .ok_or(common::Error::MissingSecret {
                    name: "encryption_key",
                    env_var: ENCRYPTION_KEY_ENV,
                    file_key: "oauth.encryption_key_file",
                })?;
        let encryption_key = EncryptionKey::parse(key_text.expose())
            .map_err(|e| common::Error::Config(e.to_string()))?;

        let oauth = OAuthClient {
            client_id,
            client_secret,
            redirect_uri: format!("{app_origin}/auth/callback"),
            scope: file.oauth.scope,
            endpoints,
            timeout: Duration::from_secs(file.gateway.upstream_timeout_secs),
        };

        Ok(Config {
            listen_addr: file.gateway.listen_addr,
            admin_listen_addr: file.gateway.admin_listen_addr,
            max_connections: file.gateway.max_connections,
            flow: FlowConfig {
                oauth,
                app_origin,
                encryption_key,
                credential_cookie: file.oauth.credential_cookie,
            },
        })
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("auth-gateway.toml")
    }
}

/// Check `app_origin` is an absolute http(s) origin and return it without a
/// trailing slash.
fn validate_origin(raw: &str) -> common::Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(common::Error::Config(format!(
            "app_origin must start with http:// or https://, got: {raw}"
        )));
    }
    let url = Url::parse(trimmed)
        .map_err(|e| common::Error::Config(format!("app_origin is not a valid URL: {e}")))?;
    if url.query().is_some() || url.fragment().is_some() {
        return Err(common::Error::Config(format!(
            "app_origin must not carry a query or fragment, got: {raw}"
        )));
    }
    Ok(trimmed.to_owned())
}

/// Cookie names are RFC 6265 tokens and must not collide with the
/// gateway's own login cookies.
fn validate_cookie_name(name: &str) -> common::Result<()> {
    let valid_token = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b));
    if !valid_token {
        return Err(common::Error::Config(format!(
            "credential_cookie is not a valid cookie name: {name:?}"
        )));
    }
    if name == STATE_COOKIE || name == VERIFIER_COOKIE {
        return Err(common::Error::Config(format!(
            "credential_cookie must not reuse the reserved name {name:?}"
        )));
    }
    Ok(())
}
