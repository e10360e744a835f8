//! Provider defaults and cookie contract
//!
//! Endpoints default to the Microsoft identity platform (`common` tenant)
//! and Microsoft Graph for the profile. The cookie names and lifetimes are
//! part of the browser contract: changing them logs every user out.

/// Authorization endpoint the browser is redirected to at login
pub const AUTHORIZE_ENDPOINT: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";

/// Token endpoint for code exchange and refresh
pub const TOKEN_ENDPOINT: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Resource endpoint returning the signed-in user's profile
pub const PROFILE_ENDPOINT: &str = "https://graph.microsoft.com/v1.0/me";

/// Scopes requested at login and reused on every refresh.
/// `offline_access` is what makes the provider issue a refresh token.
pub const DEFAULT_SCOPE: &str = "User.Read Files.ReadWrite offline_access";

/// Cookie carrying the CSRF state between login and callback
pub const STATE_COOKIE: &str = "state";

/// Cookie carrying the PKCE verifier between login and callback
pub const VERIFIER_COOKIE: &str = "code_verifier";

/// Default name of the cookie holding the encrypted refresh token
pub const DEFAULT_CREDENTIAL_COOKIE: &str = "refresh_token";

/// Lifetime of the `state` and `code_verifier` cookies (5 minutes)
pub const PENDING_COOKIE_TTL_SECS: u64 = 300;

/// Lifetime of the encrypted credential cookie (30 days)
pub const CREDENTIAL_COOKIE_TTL_SECS: u64 = 2_592_000;

/// Length of the CSRF `state` value
pub const STATE_LENGTH: usize = 16;

/// Length of the PKCE code verifier (RFC 7636 upper bound)
pub const VERIFIER_LENGTH: usize = 128;
