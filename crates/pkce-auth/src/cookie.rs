//! Cookie header codec
//!
//! Parsing and `Set-Cookie` rendering go through `axum_extra`'s cookie
//! types. The jar rules on top are fixed so every code path sees the same
//! values:
//!
//! - entries are split on `;`, name and value on the first `=`, both trimmed
//! - a repeated name keeps the last value
//! - entries without `=` or with an empty name are skipped

use std::collections::HashMap;

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Parsed `Cookie` request header(s).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieMap(HashMap<String, String>);

impl CookieMap {
    /// Parse a single `Cookie` header value.
    pub fn parse(header: &str) -> Self {
        let mut map = Self::default();
        map.extend_from_header(header);
        map
    }

    /// Parse several `Cookie` header values in order; later values win.
    pub fn parse_all<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let mut map = Self::default();
        for header in headers {
            map.extend_from_header(header);
        }
        map
    }

    fn extend_from_header(&mut self, header: &str) {
        for cookie in Cookie::split_parse(header).filter_map(Result::ok) {
            self.0
                .insert(cookie.name().to_owned(), cookie.value().to_owned());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Like [`get`](Self::get), but an empty value counts as absent.
    ///
    /// Deleted cookies may still be echoed back as `name=` by some clients.
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A cookie with the attributes every gateway cookie carries:
/// HttpOnly, Secure, SameSite=Lax, Path=/.
pub fn session_cookie(name: &str, value: &str, max_age: Duration) -> Cookie<'static> {
    Cookie::build((name.to_owned(), value.to_owned()))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

/// Render a `Set-Cookie` header value for a session cookie.
///
/// ```
/// use pkce_auth::cookie::build_set_cookie;
///
/// let directive = build_set_cookie("state", "abc", 300);
/// assert!(directive.starts_with("state=abc;"));
/// assert!(directive.contains("Max-Age=300"));
/// ```
pub fn build_set_cookie(name: &str, value: &str, max_age_secs: u64) -> String {
    let secs = i64::try_from(max_age_secs).unwrap_or(i64::MAX);
    session_cookie(name, value, Duration::seconds(secs)).to_string()
}

/// Render a `Set-Cookie` value that deletes `name` (empty value, `Max-Age=0`).
pub fn clear_cookie(name: &str) -> String {
    session_cookie(name, "", Duration::ZERO).to_string()
}
