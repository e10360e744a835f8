//! Authenticated encryption of the refresh token cookie
//!
//! The refresh token lives in the browser, so it is sealed with AES-256-GCM
//! under a key only the gateway holds. Wire form:
//!
//! ```text
//! base64(nonce) "." base64(ciphertext || tag)
//! ```
//!
//! Standard base64 with padding is used for both halves. The nonce is 96
//! random bits, fresh for every call to [`encrypt`].

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::Secret;
use rand::RngExt;

use crate::error::{Error, Result};

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Server-held AES-256 key. Redacted in logs, zeroized on drop.
#[derive(Clone)]
pub struct EncryptionKey(Secret<[u8; KEY_LEN]>);

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Secret::new(bytes))
    }

    /// Parse a key from its configured text form.
    ///
    /// Accepts standard base64 decoding to exactly 32 bytes, or a raw string
    /// of exactly 32 bytes whose UTF-8 bytes are the key. Anything else is
    /// rejected rather than stretched or truncated.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if let Ok(decoded) = STANDARD.decode(text)
            && let Ok(bytes) = <[u8; KEY_LEN]>::try_from(decoded.as_slice())
        {
            return Ok(Self::from_bytes(bytes));
        }
        if let Ok(bytes) = <[u8; KEY_LEN]>::try_from(text.as_bytes()) {
            return Ok(Self::from_bytes(bytes));
        }
        Err(Error::InvalidKey(format!(
            "expected base64 of {KEY_LEN} bytes or a {KEY_LEN}-byte string, got {} characters",
            text.len()
        )))
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.0.expose()))
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EncryptionKey").field(&self.0).finish()
    }
}

/// Encrypt `plaintext` into the `nonce.ciphertext` credential form.
pub fn encrypt(plaintext: &str, key: &EncryptionKey) -> Result<String> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rng().fill(&mut nonce_bytes);

    let ciphertext = key
        .cipher()
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|_| Error::Encryption)?;

    Ok(format!(
        "{}.{}",
        STANDARD.encode(nonce_bytes),
        STANDARD.encode(ciphertext)
    ))
}

/// Decrypt a credential produced by [`encrypt`].
///
/// Structural problems (no separator, empty halves, bad base64, wrong nonce
/// size) are `MalformedCredential`; a failed tag check or non-UTF-8
/// plaintext is `DecryptionFailed`.
pub fn decrypt(credential: &str, key: &EncryptionKey) -> Result<String> {
    let (nonce_b64, ciphertext_b64) = credential
        .split_once('.')
        .ok_or(Error::MalformedCredential("missing '.' separator"))?;
    if nonce_b64.is_empty() || ciphertext_b64.is_empty() {
        return Err(Error::MalformedCredential("empty nonce or ciphertext"));
    }

    let nonce_bytes = STANDARD
        .decode(nonce_b64)
        .map_err(|_| Error::MalformedCredential("nonce is not valid base64"))?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(Error::MalformedCredential("nonce must be 12 bytes"));
    }
    let ciphertext = STANDARD
        .decode(ciphertext_b64)
        .map_err(|_| Error::MalformedCredential("ciphertext is not valid base64"))?;

    let plaintext = key
        .cipher()
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
        .map_err(|_| Error::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| Error::DecryptionFailed)
}
