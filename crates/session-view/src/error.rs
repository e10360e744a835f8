use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid gateway origin {origin}: {reason}")]
    InvalidOrigin { origin: String, reason: String },
}
