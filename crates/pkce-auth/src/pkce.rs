//! PKCE (Proof Key for Code Exchange) implementation per RFC 7636
//!
//! Generates the CSRF `state`, the code verifier, and the S256 challenge
//! used during the authorization flow. Nothing here is stored server-side:
//! the gateway hands `state` and the verifier to the browser in short-lived
//! cookies and gets them back at the callback.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::client::OAuthClient;
use crate::constants::{STATE_LENGTH, VERIFIER_LENGTH};

/// Alphabet for random tokens: `A-Z`, `a-z`, `0-9`.
/// Every character is an RFC 7636 "unreserved" character and cookie-safe.
const ALPHABET: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random alphanumeric string of `length` characters.
///
/// Draws uniformly from the 62-character alphabet using the thread-local
/// CSPRNG (ChaCha, seeded from the OS).
pub fn random_string(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect()
}

/// Generate the CSRF `state` parameter.
pub fn generate_state() -> String {
    random_string(STATE_LENGTH)
}

/// Generate a PKCE code verifier (128 characters, the RFC maximum).
pub fn generate_verifier() -> String {
    random_string(VERIFIER_LENGTH)
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))` without padding.
pub fn code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Build the provider authorization URL for a new login attempt.
pub fn build_authorization_url(client: &OAuthClient, state: &str, challenge: &str) -> Url {
    let mut url = client.endpoints.authorize.clone();
    url.query_pairs_mut()
        .append_pair("client_id", &client.client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", &client.redirect_uri)
        .append_pair("scope", &client.scope)
        .append_pair("state", state)
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", "S256");
    url
}

/// Compare the callback `state` with the cookie `state` in constant time.
///
/// Both sides are hashed first so the comparison runs over 32 bytes
/// whatever their lengths, and the loop never exits early.
pub fn state_matches(returned: &str, expected: &str) -> bool {
    let a = Sha256::digest(returned.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
