//! Shared building blocks for the PKCE auth gateway workspace
//!
//! Holds the secret wrapper used for client secrets and encryption keys, and
//! the configuration error type every crate reports startup failures with.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::{Secret, resolve_secret};
