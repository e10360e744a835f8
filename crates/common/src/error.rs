//! Configuration and startup error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading and validating configuration.
///
/// All of these are fatal at startup; none are produced while serving
/// requests.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("missing required secret `{name}`: set the {env_var} env var or `{file_key}`")]
    MissingSecret {
        name: &'static str,
        env_var: &'static str,
        file_key: &'static str,
    },

    #[error("failed to read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;
