//! PKCE authorization-code flow primitives
//!
//! Everything the gateway needs that is not HTTP routing: random tokens and
//! S256 challenges, AES-256-GCM sealing of the refresh token, the cookie
//! codec, and the provider token/profile client. The crate keeps no state;
//! callers pass an [`OAuthClient`] and a `reqwest::Client` explicitly.
//!
//! Flow:
//! 1. Login: [`generate_state`] + [`generate_verifier`] + [`code_challenge`],
//!    redirect to [`build_authorization_url`]
//! 2. Callback: [`exchange_code`], then [`encrypt`] the refresh token into
//!    the credential cookie
//! 3. Each profile request: [`decrypt`], [`refresh_access_token`],
//!    [`fetch_profile`]

pub mod client;
pub mod constants;
pub mod cookie;
pub mod crypto;
pub mod error;
pub mod pkce;
pub mod token;

pub use client::{OAuthClient, ProviderEndpoints};
pub use constants::*;
pub use cookie::{CookieMap, build_set_cookie, clear_cookie, session_cookie};
pub use crypto::{EncryptionKey, decrypt, encrypt};
pub use error::{Error, Result};
pub use pkce::{
    build_authorization_url, code_challenge, generate_state, generate_verifier, state_matches,
};
pub use token::{AccessGrant, TokenResponse, exchange_code, fetch_profile, refresh_access_token};
