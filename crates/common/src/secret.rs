//! Secret wrapper for sensitive values

use std::fmt;
use std::path::Path;

use zeroize::Zeroize;

use crate::error::{Error, Result};

/// Sensitive value: redacted in Debug/Display, wiped from memory on drop.
///
/// Used for the OAuth client secret and the cookie encryption key. Neither
/// may ever reach a log line.
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// Resolve a secret from an environment variable, falling back to a file.
///
/// The env var wins when set and non-empty. File contents are trimmed; a
/// whitespace-only file counts as absent. A file path that cannot be read is
/// an error even though the caller may treat absence as fatal anyway, so the
/// operator sees which path was wrong.
pub fn resolve_secret(env_var: &str, file: Option<&Path>) -> Result<Option<Secret<String>>> {
    if let Ok(value) = std::env::var(env_var) {
        let value = value.trim().to_owned();
        if !value.is_empty() {
            return Ok(Some(Secret::new(value)));
        }
    }

    let Some(path) = file else {
        return Ok(None);
    };

    let contents = std::fs::read_to_string(path).map_err(|source| Error::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let value = contents.trim().to_owned();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(Secret::new(value)))
}
